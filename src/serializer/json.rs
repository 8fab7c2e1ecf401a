use anyhow::{
    Error,
    Result,
};

use crate::{
    core::types::List,
    message::message::Message,
    serializer::serializer::Serializer,
};

/// A serializer implemented for JavaScript Object Notation.
#[derive(Debug, Default)]
pub struct JsonSerializer {}

impl Serializer for JsonSerializer {
    fn serialize(&self, message: &Message) -> Result<Vec<u8>> {
        serde_json::to_vec(&message.encode()).map_err(Error::new)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Message> {
        let fields = serde_json::from_slice::<List>(bytes).map_err(Error::new)?;
        Ok(Message::decode(fields)?)
    }
}

#[cfg(test)]
mod json_serializer_test {
    use crate::{
        core::{
            id::Id,
            types::{
                Dictionary,
                List,
                Value,
            },
            uri::Uri,
        },
        message::message::{
            CallMessage,
            Message,
        },
        serializer::{
            json::JsonSerializer,
            serializer::Serializer,
        },
    };

    #[test]
    fn serializes_message_to_json_array() {
        let serializer = JsonSerializer::default();
        let message = Message::Call(CallMessage {
            request: Id::try_from(2).unwrap(),
            options: Dictionary::default(),
            procedure: Uri::try_from("com.example.add").unwrap(),
            arguments: List::from_iter([Value::Integer(2), Value::Integer(3)]),
            arguments_keyword: Dictionary::default(),
        });
        assert_matches::assert_matches!(serializer.serialize(&message), Ok(bytes) => {
            assert_eq!(
                String::from_utf8(bytes).unwrap(),
                r#"[48,2,{},"com.example.add",[2,3]]"#
            );
        });
    }

    #[test]
    fn deserializes_message_from_json_array() {
        let serializer = JsonSerializer::default();
        assert_matches::assert_matches!(
            serializer.deserialize(br#"[50, 2, {}, [5]]"#),
            Ok(Message::Result(message)) => {
                assert_eq!(message.call_request, Id::try_from(2).unwrap());
                assert_eq!(message.arguments, List::from_iter([Value::Integer(5)]));
                assert!(message.arguments_keyword.is_empty());
            }
        );
    }

    #[test]
    fn fails_deserialization_of_malformed_input() {
        let serializer = JsonSerializer::default();
        assert_matches::assert_matches!(serializer.deserialize(br#"{"not": "an array"}"#), Err(_));
        assert_matches::assert_matches!(serializer.deserialize(br#"[999, 1]"#), Err(_));
    }
}
