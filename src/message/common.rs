use crate::{
    core::{
        close::CloseReason,
        error::WampError,
        id::Id,
        types::{
            Dictionary,
            List,
            Value,
        },
    },
    message::message::{
        ErrorMessage,
        GoodbyeMessage,
        Message,
        YieldMessage,
    },
};

pub fn goodbye_with_close_reason(close_reason: CloseReason) -> Message {
    Message::Goodbye(GoodbyeMessage {
        details: Dictionary::default(),
        reason: close_reason.uri(),
    })
}

pub fn goodbye_and_out() -> Message {
    goodbye_with_close_reason(CloseReason::GoodbyeAndOut)
}

/// Shapes an invocation handler's return value into a YIELD message.
///
/// A dictionary becomes the keyword arguments, a list becomes the positional arguments, and any
/// other value is wrapped into a single-element positional list.
pub fn yield_for_value(invocation_request: Id, value: Value) -> Message {
    let (arguments, arguments_keyword) = match value {
        Value::Dictionary(arguments_keyword) => (List::default(), arguments_keyword),
        Value::List(arguments) => (arguments, Dictionary::default()),
        value => (List::from_iter([value]), Dictionary::default()),
    };
    Message::Yield(YieldMessage {
        invocation_request,
        options: Dictionary::default(),
        arguments,
        arguments_keyword,
    })
}

/// Reports a failed invocation back to the router.
pub fn error_for_invocation(invocation_request: Id, error: &WampError) -> Message {
    Message::Error(ErrorMessage {
        request_type: Message::INVOCATION_TAG,
        request: invocation_request,
        details: Dictionary::from_iter([(
            "message".to_owned(),
            Value::String(error.message().to_owned()),
        )]),
        error: error.reason().clone(),
        arguments: error.arguments().clone(),
        arguments_keyword: error.arguments_keyword().clone(),
    })
}
