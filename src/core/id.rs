use std::fmt::Display;

use serde::{
    Deserialize,
    Serialize,
    de::{
        Unexpected,
        Visitor,
    },
};
use thiserror::Error;

use crate::core::types::Integer;

/// An identifier for a WAMP resource, such as a session, request, subscription, registration, or
/// publication.
///
/// Identifiers are integers in a range routers and peers of all serialization formats can
/// represent exactly.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Id(u64);

impl Id {
    pub const MIN: u64 = 1;
    pub const MAX: u64 = 1 << 53;

    /// The identifier's integer value.
    pub fn value(&self) -> Integer {
        self.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Error for an integer that does not fit the identifier range.
#[derive(Debug, Error)]
#[error("{value} is out of range for IDs")]
pub struct IdOutOfRange {
    value: u64,
}

impl TryFrom<u64> for Id {
    type Error = IdOutOfRange;
    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value < Self::MIN || value > Self::MAX {
            Err(IdOutOfRange { value })
        } else {
            Ok(Id(value))
        }
    }
}

struct IdVisitor;

impl<'de> Visitor<'de> for IdVisitor {
    type Value = Id;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            formatter,
            "an unsigned integer in the range [{}, {}]",
            Id::MIN,
            Id::MAX
        )
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Id::try_from(v).map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_u64(IdVisitor)
    }
}

/// A generator of request identifiers for a single session.
///
/// Identifiers increase strictly within the session. The counter starts at 1 and is incremented
/// before each allocation, so the first issued identifier is 2. Uniqueness is only required
/// relative to outstanding requests, so the counter wraps around at the top of the identifier
/// range.
#[derive(Debug)]
pub(crate) struct RequestIdSequence {
    last: u64,
}

impl RequestIdSequence {
    pub fn new() -> Self {
        Self { last: Id::MIN }
    }

    /// Allocates the next request identifier.
    pub fn next(&mut self) -> Id {
        if self.last >= Id::MAX {
            self.last = Id::MIN;
        }
        self.last += 1;
        Id(self.last)
    }
}

#[cfg(test)]
mod id_test {
    use crate::core::id::{
        Id,
        RequestIdSequence,
    };

    #[test]
    fn fails_deserialization_out_of_range() {
        assert_matches::assert_matches!(serde_json::from_str::<Id>(r#"0"#), Err(err) => {
            assert!(err.to_string().contains("expected an unsigned integer in the range"));
        });
        assert_matches::assert_matches!(serde_json::from_str::<Id>(r#"9007199254740993"#), Err(err) => {
            assert!(err.to_string().contains("expected an unsigned integer in the range"));
        });
    }

    #[test]
    fn first_issued_request_id_is_two() {
        let mut request_ids = RequestIdSequence::new();
        assert_eq!(request_ids.next().value(), 2);
        assert_eq!(request_ids.next().value(), 3);
        assert_eq!(request_ids.next().value(), 4);
    }

    #[test]
    fn request_ids_wrap_around_at_range_top() {
        let mut request_ids = RequestIdSequence::new();
        request_ids.last = Id::MAX;
        assert_eq!(request_ids.next().value(), 2);
    }
}
