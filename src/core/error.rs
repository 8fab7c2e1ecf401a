use thiserror::Error;

use crate::core::{
    types::{
        Dictionary,
        List,
        Value,
    },
    uri::Uri,
};

/// An application-visible WAMP error.
///
/// Covers ERROR replies correlated to a request, ABORT reasons, and errors synthesized by the
/// client itself (such as cancellation on transport loss). The reason URI is the stable,
/// machine-readable part; everything else is advisory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}: {message}")]
pub struct WampError {
    reason: Uri,
    message: String,
    details: Dictionary,
    arguments: List,
    arguments_keyword: Dictionary,
}

impl WampError {
    /// Creates a new error from a reason URI and a human-readable message.
    pub fn new<S>(reason: Uri, message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            reason,
            message: message.into(),
            details: Dictionary::default(),
            arguments: List::default(),
            arguments_keyword: Dictionary::default(),
        }
    }

    /// An error correlated to a request, built from the reply's reason URI, details, and payload.
    pub(crate) fn from_reply(
        reason: Uri,
        details: Dictionary,
        arguments: List,
        arguments_keyword: Dictionary,
    ) -> Self {
        Self {
            message: message_from_details(&details).to_owned(),
            reason,
            details,
            arguments,
            arguments_keyword,
        }
    }

    /// The synthetic error delivered to every outstanding continuation when the transport is lost.
    pub(crate) fn transport_closed() -> Self {
        Self::new(
            Uri::from_known("wamp.error.canceled"),
            "cancelled: transport closed",
        )
    }

    /// The error reason URI.
    pub fn reason(&self) -> &Uri {
        &self.reason
    }

    /// The human-readable error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The details of the ERROR reply, if any.
    pub fn details(&self) -> &Dictionary {
        &self.details
    }

    /// Positional arguments attached to the error.
    pub fn arguments(&self) -> &List {
        &self.arguments
    }

    /// Keyword arguments attached to the error.
    pub fn arguments_keyword(&self) -> &Dictionary {
        &self.arguments_keyword
    }
}

/// Extracts the conventional `message` entry from a details dictionary.
pub(crate) fn message_from_details(details: &Dictionary) -> &str {
    details
        .get("message")
        .and_then(Value::string)
        .unwrap_or("unknown error")
}
