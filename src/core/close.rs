use crate::core::uri::Uri;

/// The reason for closing a WAMP session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer is leaving the realm.
    #[default]
    CloseRealm,
    /// Acknowledgement of the other side's GOODBYE.
    GoodbyeAndOut,
    /// The peer is shutting down.
    SystemShutdown,
}

impl CloseReason {
    fn uri_component(&self) -> &str {
        match self {
            Self::CloseRealm => "close_realm",
            Self::GoodbyeAndOut => "goodbye_and_out",
            Self::SystemShutdown => "system_shutdown",
        }
    }

    /// URI for the close reason.
    pub fn uri(&self) -> Uri {
        Uri::from_known(format!("wamp.error.{}", self.uri_component()))
    }
}
