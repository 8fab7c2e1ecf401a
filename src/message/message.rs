use thiserror::Error;

use crate::core::{
    id::Id,
    types::{
        Dictionary,
        Integer,
        List,
        Value,
    },
    uri::Uri,
};

/// Error produced while decoding a message from its wire-level field array.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("empty message")]
    Empty,
    #[error("message type must be an integer")]
    InvalidTag,
    #[error("unknown message type {0}")]
    UnknownTag(Integer),
    #[error("{message} message is missing the {field} field")]
    MissingField {
        message: &'static str,
        field: &'static str,
    },
    #[error("{message} message has an invalid {field} field (expected {expected})")]
    InvalidField {
        message: &'static str,
        field: &'static str,
        expected: &'static str,
    },
    #[error("{message} message has unexpected trailing fields")]
    TrailingFields { message: &'static str },
}

/// Reads typed fields out of a message's wire-level array, in order.
struct FieldReader {
    message: &'static str,
    fields: std::vec::IntoIter<Value>,
}

impl FieldReader {
    fn new(message: &'static str, fields: std::vec::IntoIter<Value>) -> Self {
        Self { message, fields }
    }

    fn missing(&self, field: &'static str) -> MessageError {
        MessageError::MissingField {
            message: self.message,
            field,
        }
    }

    fn invalid(&self, field: &'static str, expected: &'static str) -> MessageError {
        MessageError::InvalidField {
            message: self.message,
            field,
            expected,
        }
    }

    fn next(&mut self, field: &'static str) -> Result<Value, MessageError> {
        self.fields.next().ok_or_else(|| self.missing(field))
    }

    fn integer(&mut self, field: &'static str) -> Result<Integer, MessageError> {
        match self.next(field)? {
            Value::Integer(value) => Ok(value),
            _ => Err(self.invalid(field, "integer")),
        }
    }

    fn id(&mut self, field: &'static str) -> Result<Id, MessageError> {
        Id::try_from(self.integer(field)?).map_err(|_| self.invalid(field, "id"))
    }

    fn string(&mut self, field: &'static str) -> Result<String, MessageError> {
        match self.next(field)? {
            Value::String(value) => Ok(value),
            _ => Err(self.invalid(field, "string")),
        }
    }

    fn uri(&mut self, field: &'static str) -> Result<Uri, MessageError> {
        Uri::try_from(self.string(field)?).map_err(|_| self.invalid(field, "uri"))
    }

    fn dictionary(&mut self, field: &'static str) -> Result<Dictionary, MessageError> {
        match self.next(field)? {
            Value::Dictionary(value) => Ok(value),
            _ => Err(self.invalid(field, "dictionary")),
        }
    }

    /// An optional trailing list field; elided fields decode to an empty list.
    fn optional_list(&mut self, field: &'static str) -> Result<List, MessageError> {
        match self.fields.next() {
            None => Ok(List::default()),
            Some(Value::List(value)) => Ok(value),
            Some(_) => Err(self.invalid(field, "list")),
        }
    }

    /// An optional trailing dictionary field; elided fields decode to an empty dictionary.
    fn optional_dictionary(&mut self, field: &'static str) -> Result<Dictionary, MessageError> {
        match self.fields.next() {
            None => Ok(Dictionary::default()),
            Some(Value::Dictionary(value)) => Ok(value),
            Some(_) => Err(self.invalid(field, "dictionary")),
        }
    }

    fn finish(mut self) -> Result<(), MessageError> {
        if self.fields.next().is_some() {
            Err(MessageError::TrailingFields {
                message: self.message,
            })
        } else {
            Ok(())
        }
    }
}

/// Appends the trailing payload fields of a message.
///
/// WAMP elides trailing payload fields: the keyword arguments are omitted when empty, and the
/// positional arguments are omitted only when the keyword arguments are omitted as well. An empty
/// positional list is still emitted when keyword arguments are present.
fn encode_payload(fields: &mut List, arguments: &List, arguments_keyword: &Dictionary) {
    if !arguments_keyword.is_empty() {
        fields.push(Value::List(arguments.clone()));
        fields.push(Value::Dictionary(arguments_keyword.clone()));
    } else if !arguments.is_empty() {
        fields.push(Value::List(arguments.clone()));
    }
}

/// A HELLO message for a peer to initiate a WAMP session in a realm.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HelloMessage {
    pub realm: Uri,
    pub details: Dictionary,
}

impl HelloMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            realm: reader.uri("realm")?,
            details: reader.dictionary("details")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::String(self.realm.as_ref().to_owned()));
        fields.push(Value::Dictionary(self.details.clone()));
    }
}

/// A WELCOME message for a router to confirm a peer's WAMP session in a realm.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WelcomeMessage {
    pub session: Id,
    pub details: Dictionary,
}

impl WelcomeMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            session: reader.id("session")?,
            details: reader.dictionary("details")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.session.value()));
        fields.push(Value::Dictionary(self.details.clone()));
    }
}

/// An ABORT message for quickly terminating a WAMP session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AbortMessage {
    pub details: Dictionary,
    pub reason: Uri,
}

impl AbortMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            details: reader.dictionary("details")?,
            reason: reader.uri("reason")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Dictionary(self.details.clone()));
        fields.push(Value::String(self.reason.as_ref().to_owned()));
    }
}

/// A CHALLENGE message for a router to demand authentication before WELCOME.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChallengeMessage {
    pub auth_method: String,
    pub extra: Dictionary,
}

impl ChallengeMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            auth_method: reader.string("auth_method")?,
            extra: reader.dictionary("extra")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::String(self.auth_method.clone()));
        fields.push(Value::Dictionary(self.extra.clone()));
    }
}

/// An AUTHENTICATE message answering a CHALLENGE.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuthenticateMessage {
    pub signature: String,
    pub extra: Dictionary,
}

impl AuthenticateMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            signature: reader.string("signature")?,
            extra: reader.dictionary("extra")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::String(self.signature.clone()));
        fields.push(Value::Dictionary(self.extra.clone()));
    }
}

/// A GOODBYE message for ending a WAMP session with a two-way handshake.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GoodbyeMessage {
    pub details: Dictionary,
    pub reason: Uri,
}

impl GoodbyeMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            details: reader.dictionary("details")?,
            reason: reader.uri("reason")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Dictionary(self.details.clone()));
        fields.push(Value::String(self.reason.as_ref().to_owned()));
    }
}

/// An ERROR message for communicating an error in response to a single request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub request_type: Integer,
    pub request: Id,
    pub details: Dictionary,
    pub error: Uri,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

impl ErrorMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            request_type: reader.integer("request_type")?,
            request: reader.id("request")?,
            details: reader.dictionary("details")?,
            error: reader.uri("error")?,
            arguments: reader.optional_list("arguments")?,
            arguments_keyword: reader.optional_dictionary("arguments_keyword")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.request_type));
        fields.push(Value::Integer(self.request.value()));
        fields.push(Value::Dictionary(self.details.clone()));
        fields.push(Value::String(self.error.as_ref().to_owned()));
        encode_payload(fields, &self.arguments, &self.arguments_keyword);
    }
}

/// A PUBLISH message for publishing an event to a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishMessage {
    pub request: Id,
    pub options: Dictionary,
    pub topic: Uri,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

impl PublishMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            request: reader.id("request")?,
            options: reader.dictionary("options")?,
            topic: reader.uri("topic")?,
            arguments: reader.optional_list("arguments")?,
            arguments_keyword: reader.optional_dictionary("arguments_keyword")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.request.value()));
        fields.push(Value::Dictionary(self.options.clone()));
        fields.push(Value::String(self.topic.as_ref().to_owned()));
        encode_payload(fields, &self.arguments, &self.arguments_keyword);
    }
}

/// A PUBLISHED message for confirming an event was published.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub publish_request: Id,
    pub publication: Id,
}

impl PublishedMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            publish_request: reader.id("publish_request")?,
            publication: reader.id("publication")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.publish_request.value()));
        fields.push(Value::Integer(self.publication.value()));
    }
}

/// A SUBSCRIBE message for subscribing to a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubscribeMessage {
    pub request: Id,
    pub options: Dictionary,
    pub topic: Uri,
}

impl SubscribeMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            request: reader.id("request")?,
            options: reader.dictionary("options")?,
            topic: reader.uri("topic")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.request.value()));
        fields.push(Value::Dictionary(self.options.clone()));
        fields.push(Value::String(self.topic.as_ref().to_owned()));
    }
}

/// A SUBSCRIBED message for confirming a peer has subscribed to a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubscribedMessage {
    pub subscribe_request: Id,
    pub subscription: Id,
}

impl SubscribedMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            subscribe_request: reader.id("subscribe_request")?,
            subscription: reader.id("subscription")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.subscribe_request.value()));
        fields.push(Value::Integer(self.subscription.value()));
    }
}

/// An UNSUBSCRIBE message for unsubscribing from a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnsubscribeMessage {
    pub request: Id,
    pub subscription: Id,
}

impl UnsubscribeMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            request: reader.id("request")?,
            subscription: reader.id("subscription")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.request.value()));
        fields.push(Value::Integer(self.subscription.value()));
    }
}

/// An UNSUBSCRIBED message for confirming a peer has unsubscribed from a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnsubscribedMessage {
    pub unsubscribe_request: Id,
}

impl UnsubscribedMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            unsubscribe_request: reader.id("unsubscribe_request")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.unsubscribe_request.value()));
    }
}

/// An EVENT message for relaying a published event to subscribers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventMessage {
    pub subscription: Id,
    pub publication: Id,
    pub details: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

impl EventMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            subscription: reader.id("subscription")?,
            publication: reader.id("publication")?,
            details: reader.dictionary("details")?,
            arguments: reader.optional_list("arguments")?,
            arguments_keyword: reader.optional_dictionary("arguments_keyword")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.subscription.value()));
        fields.push(Value::Integer(self.publication.value()));
        fields.push(Value::Dictionary(self.details.clone()));
        encode_payload(fields, &self.arguments, &self.arguments_keyword);
    }
}

/// A CALL message for invoking a procedure.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallMessage {
    pub request: Id,
    pub options: Dictionary,
    pub procedure: Uri,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

impl CallMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            request: reader.id("request")?,
            options: reader.dictionary("options")?,
            procedure: reader.uri("procedure")?,
            arguments: reader.optional_list("arguments")?,
            arguments_keyword: reader.optional_dictionary("arguments_keyword")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.request.value()));
        fields.push(Value::Dictionary(self.options.clone()));
        fields.push(Value::String(self.procedure.as_ref().to_owned()));
        encode_payload(fields, &self.arguments, &self.arguments_keyword);
    }
}

/// A RESULT message for sending the result of a call back to the caller.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResultMessage {
    pub call_request: Id,
    pub details: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

impl ResultMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            call_request: reader.id("call_request")?,
            details: reader.dictionary("details")?,
            arguments: reader.optional_list("arguments")?,
            arguments_keyword: reader.optional_dictionary("arguments_keyword")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.call_request.value()));
        fields.push(Value::Dictionary(self.details.clone()));
        encode_payload(fields, &self.arguments, &self.arguments_keyword);
    }
}

/// A REGISTER message for registering a procedure in the realm.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegisterMessage {
    pub request: Id,
    pub options: Dictionary,
    pub procedure: Uri,
}

impl RegisterMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            request: reader.id("request")?,
            options: reader.dictionary("options")?,
            procedure: reader.uri("procedure")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.request.value()));
        fields.push(Value::Dictionary(self.options.clone()));
        fields.push(Value::String(self.procedure.as_ref().to_owned()));
    }
}

/// A REGISTERED message for confirming a procedure has been registered.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegisteredMessage {
    pub register_request: Id,
    pub registration: Id,
}

impl RegisteredMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            register_request: reader.id("register_request")?,
            registration: reader.id("registration")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.register_request.value()));
        fields.push(Value::Integer(self.registration.value()));
    }
}

/// An UNREGISTER message for removing a procedure registration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnregisterMessage {
    pub request: Id,
    pub registration: Id,
}

impl UnregisterMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            request: reader.id("request")?,
            registration: reader.id("registration")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.request.value()));
        fields.push(Value::Integer(self.registration.value()));
    }
}

/// An UNREGISTERED message for confirming a procedure has been unregistered.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnregisteredMessage {
    pub unregister_request: Id,
}

impl UnregisteredMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            unregister_request: reader.id("unregister_request")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.unregister_request.value()));
    }
}

/// An INVOCATION message for invoking a procedure on its callee.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvocationMessage {
    pub request: Id,
    pub registration: Id,
    pub details: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

impl InvocationMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            request: reader.id("request")?,
            registration: reader.id("registration")?,
            details: reader.dictionary("details")?,
            arguments: reader.optional_list("arguments")?,
            arguments_keyword: reader.optional_dictionary("arguments_keyword")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.request.value()));
        fields.push(Value::Integer(self.registration.value()));
        fields.push(Value::Dictionary(self.details.clone()));
        encode_payload(fields, &self.arguments, &self.arguments_keyword);
    }
}

/// A YIELD message for returning the result of an invocation from the callee.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct YieldMessage {
    pub invocation_request: Id,
    pub options: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

impl YieldMessage {
    fn decode(reader: &mut FieldReader) -> Result<Self, MessageError> {
        Ok(Self {
            invocation_request: reader.id("invocation_request")?,
            options: reader.dictionary("options")?,
            arguments: reader.optional_list("arguments")?,
            arguments_keyword: reader.optional_dictionary("arguments_keyword")?,
        })
    }

    fn encode(&self, fields: &mut List) {
        fields.push(Value::Integer(self.invocation_request.value()));
        fields.push(Value::Dictionary(self.options.clone()));
        encode_payload(fields, &self.arguments, &self.arguments_keyword);
    }
}

/// A WAMP message.
///
/// On the wire, a message is an ordered array whose first element is the integer type tag and
/// whose remaining elements are the variant's fields. [`Message::encode`] and [`Message::decode`]
/// translate between the typed representation and that array; a
/// [`Serializer`][`crate::serializer::serializer::Serializer`] then translates the array to and
/// from bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello(HelloMessage),
    Welcome(WelcomeMessage),
    Abort(AbortMessage),
    Challenge(ChallengeMessage),
    Authenticate(AuthenticateMessage),
    Goodbye(GoodbyeMessage),
    Error(ErrorMessage),
    Publish(PublishMessage),
    Published(PublishedMessage),
    Subscribe(SubscribeMessage),
    Subscribed(SubscribedMessage),
    Unsubscribe(UnsubscribeMessage),
    Unsubscribed(UnsubscribedMessage),
    Event(EventMessage),
    Call(CallMessage),
    Result(ResultMessage),
    Register(RegisterMessage),
    Registered(RegisteredMessage),
    Unregister(UnregisterMessage),
    Unregistered(UnregisteredMessage),
    Invocation(InvocationMessage),
    Yield(YieldMessage),
}

impl Message {
    pub const HELLO_TAG: Integer = 1;
    pub const WELCOME_TAG: Integer = 2;
    pub const ABORT_TAG: Integer = 3;
    pub const CHALLENGE_TAG: Integer = 4;
    pub const AUTHENTICATE_TAG: Integer = 5;
    pub const GOODBYE_TAG: Integer = 6;
    pub const ERROR_TAG: Integer = 8;
    pub const PUBLISH_TAG: Integer = 16;
    pub const PUBLISHED_TAG: Integer = 17;
    pub const SUBSCRIBE_TAG: Integer = 32;
    pub const SUBSCRIBED_TAG: Integer = 33;
    pub const UNSUBSCRIBE_TAG: Integer = 34;
    pub const UNSUBSCRIBED_TAG: Integer = 35;
    pub const EVENT_TAG: Integer = 36;
    pub const CALL_TAG: Integer = 48;
    pub const RESULT_TAG: Integer = 50;
    pub const REGISTER_TAG: Integer = 64;
    pub const REGISTERED_TAG: Integer = 65;
    pub const UNREGISTER_TAG: Integer = 66;
    pub const UNREGISTERED_TAG: Integer = 67;
    pub const INVOCATION_TAG: Integer = 68;
    pub const YIELD_TAG: Integer = 70;

    /// The message's integer type tag.
    pub fn tag(&self) -> Integer {
        match self {
            Self::Hello(_) => Self::HELLO_TAG,
            Self::Welcome(_) => Self::WELCOME_TAG,
            Self::Abort(_) => Self::ABORT_TAG,
            Self::Challenge(_) => Self::CHALLENGE_TAG,
            Self::Authenticate(_) => Self::AUTHENTICATE_TAG,
            Self::Goodbye(_) => Self::GOODBYE_TAG,
            Self::Error(_) => Self::ERROR_TAG,
            Self::Publish(_) => Self::PUBLISH_TAG,
            Self::Published(_) => Self::PUBLISHED_TAG,
            Self::Subscribe(_) => Self::SUBSCRIBE_TAG,
            Self::Subscribed(_) => Self::SUBSCRIBED_TAG,
            Self::Unsubscribe(_) => Self::UNSUBSCRIBE_TAG,
            Self::Unsubscribed(_) => Self::UNSUBSCRIBED_TAG,
            Self::Event(_) => Self::EVENT_TAG,
            Self::Call(_) => Self::CALL_TAG,
            Self::Result(_) => Self::RESULT_TAG,
            Self::Register(_) => Self::REGISTER_TAG,
            Self::Registered(_) => Self::REGISTERED_TAG,
            Self::Unregister(_) => Self::UNREGISTER_TAG,
            Self::Unregistered(_) => Self::UNREGISTERED_TAG,
            Self::Invocation(_) => Self::INVOCATION_TAG,
            Self::Yield(_) => Self::YIELD_TAG,
        }
    }

    /// The message name, mostly for logging.
    pub fn message_name(&self) -> &'static str {
        match self {
            Self::Hello(_) => "HELLO",
            Self::Welcome(_) => "WELCOME",
            Self::Abort(_) => "ABORT",
            Self::Challenge(_) => "CHALLENGE",
            Self::Authenticate(_) => "AUTHENTICATE",
            Self::Goodbye(_) => "GOODBYE",
            Self::Error(_) => "ERROR",
            Self::Publish(_) => "PUBLISH",
            Self::Published(_) => "PUBLISHED",
            Self::Subscribe(_) => "SUBSCRIBE",
            Self::Subscribed(_) => "SUBSCRIBED",
            Self::Unsubscribe(_) => "UNSUBSCRIBE",
            Self::Unsubscribed(_) => "UNSUBSCRIBED",
            Self::Event(_) => "EVENT",
            Self::Call(_) => "CALL",
            Self::Result(_) => "RESULT",
            Self::Register(_) => "REGISTER",
            Self::Registered(_) => "REGISTERED",
            Self::Unregister(_) => "UNREGISTER",
            Self::Unregistered(_) => "UNREGISTERED",
            Self::Invocation(_) => "INVOCATION",
            Self::Yield(_) => "YIELD",
        }
    }

    /// Encodes the message into its wire-level field array.
    pub fn encode(&self) -> List {
        let mut fields = List::from_iter([Value::Integer(self.tag())]);
        match self {
            Self::Hello(message) => message.encode(&mut fields),
            Self::Welcome(message) => message.encode(&mut fields),
            Self::Abort(message) => message.encode(&mut fields),
            Self::Challenge(message) => message.encode(&mut fields),
            Self::Authenticate(message) => message.encode(&mut fields),
            Self::Goodbye(message) => message.encode(&mut fields),
            Self::Error(message) => message.encode(&mut fields),
            Self::Publish(message) => message.encode(&mut fields),
            Self::Published(message) => message.encode(&mut fields),
            Self::Subscribe(message) => message.encode(&mut fields),
            Self::Subscribed(message) => message.encode(&mut fields),
            Self::Unsubscribe(message) => message.encode(&mut fields),
            Self::Unsubscribed(message) => message.encode(&mut fields),
            Self::Event(message) => message.encode(&mut fields),
            Self::Call(message) => message.encode(&mut fields),
            Self::Result(message) => message.encode(&mut fields),
            Self::Register(message) => message.encode(&mut fields),
            Self::Registered(message) => message.encode(&mut fields),
            Self::Unregister(message) => message.encode(&mut fields),
            Self::Unregistered(message) => message.encode(&mut fields),
            Self::Invocation(message) => message.encode(&mut fields),
            Self::Yield(message) => message.encode(&mut fields),
        }
        fields
    }

    /// Decodes a message from its wire-level field array, validating the array's shape for the
    /// variant selected by the leading type tag.
    pub fn decode(fields: List) -> Result<Self, MessageError> {
        let mut fields = fields.into_iter();
        let tag = match fields.next() {
            Some(Value::Integer(tag)) => tag,
            Some(_) => return Err(MessageError::InvalidTag),
            None => return Err(MessageError::Empty),
        };
        let (message, reader) = match tag {
            Self::HELLO_TAG => {
                let mut reader = FieldReader::new("HELLO", fields);
                (Self::Hello(HelloMessage::decode(&mut reader)?), reader)
            }
            Self::WELCOME_TAG => {
                let mut reader = FieldReader::new("WELCOME", fields);
                (Self::Welcome(WelcomeMessage::decode(&mut reader)?), reader)
            }
            Self::ABORT_TAG => {
                let mut reader = FieldReader::new("ABORT", fields);
                (Self::Abort(AbortMessage::decode(&mut reader)?), reader)
            }
            Self::CHALLENGE_TAG => {
                let mut reader = FieldReader::new("CHALLENGE", fields);
                (
                    Self::Challenge(ChallengeMessage::decode(&mut reader)?),
                    reader,
                )
            }
            Self::AUTHENTICATE_TAG => {
                let mut reader = FieldReader::new("AUTHENTICATE", fields);
                (
                    Self::Authenticate(AuthenticateMessage::decode(&mut reader)?),
                    reader,
                )
            }
            Self::GOODBYE_TAG => {
                let mut reader = FieldReader::new("GOODBYE", fields);
                (Self::Goodbye(GoodbyeMessage::decode(&mut reader)?), reader)
            }
            Self::ERROR_TAG => {
                let mut reader = FieldReader::new("ERROR", fields);
                (Self::Error(ErrorMessage::decode(&mut reader)?), reader)
            }
            Self::PUBLISH_TAG => {
                let mut reader = FieldReader::new("PUBLISH", fields);
                (Self::Publish(PublishMessage::decode(&mut reader)?), reader)
            }
            Self::PUBLISHED_TAG => {
                let mut reader = FieldReader::new("PUBLISHED", fields);
                (
                    Self::Published(PublishedMessage::decode(&mut reader)?),
                    reader,
                )
            }
            Self::SUBSCRIBE_TAG => {
                let mut reader = FieldReader::new("SUBSCRIBE", fields);
                (
                    Self::Subscribe(SubscribeMessage::decode(&mut reader)?),
                    reader,
                )
            }
            Self::SUBSCRIBED_TAG => {
                let mut reader = FieldReader::new("SUBSCRIBED", fields);
                (
                    Self::Subscribed(SubscribedMessage::decode(&mut reader)?),
                    reader,
                )
            }
            Self::UNSUBSCRIBE_TAG => {
                let mut reader = FieldReader::new("UNSUBSCRIBE", fields);
                (
                    Self::Unsubscribe(UnsubscribeMessage::decode(&mut reader)?),
                    reader,
                )
            }
            Self::UNSUBSCRIBED_TAG => {
                let mut reader = FieldReader::new("UNSUBSCRIBED", fields);
                (
                    Self::Unsubscribed(UnsubscribedMessage::decode(&mut reader)?),
                    reader,
                )
            }
            Self::EVENT_TAG => {
                let mut reader = FieldReader::new("EVENT", fields);
                (Self::Event(EventMessage::decode(&mut reader)?), reader)
            }
            Self::CALL_TAG => {
                let mut reader = FieldReader::new("CALL", fields);
                (Self::Call(CallMessage::decode(&mut reader)?), reader)
            }
            Self::RESULT_TAG => {
                let mut reader = FieldReader::new("RESULT", fields);
                (Self::Result(ResultMessage::decode(&mut reader)?), reader)
            }
            Self::REGISTER_TAG => {
                let mut reader = FieldReader::new("REGISTER", fields);
                (
                    Self::Register(RegisterMessage::decode(&mut reader)?),
                    reader,
                )
            }
            Self::REGISTERED_TAG => {
                let mut reader = FieldReader::new("REGISTERED", fields);
                (
                    Self::Registered(RegisteredMessage::decode(&mut reader)?),
                    reader,
                )
            }
            Self::UNREGISTER_TAG => {
                let mut reader = FieldReader::new("UNREGISTER", fields);
                (
                    Self::Unregister(UnregisterMessage::decode(&mut reader)?),
                    reader,
                )
            }
            Self::UNREGISTERED_TAG => {
                let mut reader = FieldReader::new("UNREGISTERED", fields);
                (
                    Self::Unregistered(UnregisteredMessage::decode(&mut reader)?),
                    reader,
                )
            }
            Self::INVOCATION_TAG => {
                let mut reader = FieldReader::new("INVOCATION", fields);
                (
                    Self::Invocation(InvocationMessage::decode(&mut reader)?),
                    reader,
                )
            }
            Self::YIELD_TAG => {
                let mut reader = FieldReader::new("YIELD", fields);
                (Self::Yield(YieldMessage::decode(&mut reader)?), reader)
            }
            tag => return Err(MessageError::UnknownTag(tag)),
        };
        reader.finish()?;
        Ok(message)
    }
}
