use anyhow::{
    Error,
    Result,
};

use crate::{
    core::types::List,
    message::message::Message,
    serializer::serializer::Serializer,
};

/// A serializer implemented for MessagePack.
#[derive(Debug, Default)]
pub struct MessagePackSerializer {}

impl Serializer for MessagePackSerializer {
    fn serialize(&self, message: &Message) -> Result<Vec<u8>> {
        rmp_serde::to_vec(&message.encode()).map_err(Error::new)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Message> {
        let fields = rmp_serde::from_slice::<List>(bytes).map_err(Error::new)?;
        Ok(Message::decode(fields)?)
    }
}

#[cfg(test)]
mod message_pack_serializer_test {
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
            EventMessage,
            Message,
        },
        serializer::{
            message_pack::MessagePackSerializer,
            serializer::Serializer,
        },
    };

    #[test]
    fn round_trips_message_through_message_pack() {
        let serializer = MessagePackSerializer::default();
        let message = Message::Event(EventMessage {
            subscription: Id::try_from(777).unwrap(),
            publication: Id::try_from(1).unwrap(),
            details: Dictionary::from_iter([(
                "topic".to_owned(),
                Value::String(Uri::try_from("com.chan").unwrap().into()),
            )]),
            arguments: List::from_iter([Value::from("hi")]),
            arguments_keyword: Dictionary::default(),
        });
        assert_matches::assert_matches!(serializer.serialize(&message), Ok(bytes) => {
            assert_matches::assert_matches!(serializer.deserialize(&bytes), Ok(deserialized) => {
                pretty_assertions::assert_eq!(deserialized, message);
            });
        });
    }
}
