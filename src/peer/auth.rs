use anyhow::Result;
use async_trait::async_trait;

use crate::core::types::Dictionary;

/// An application-supplied handler for router authentication challenges.
///
/// The client itself does not compute credentials. When a CHALLENGE arrives during session
/// establishment, the handler is asked for the signature string to send back in AUTHENTICATE. If
/// no handler is installed, the session is aborted.
#[async_trait]
pub trait ChallengeHandler: Send + Sync {
    /// Produces the signature answering a challenge of the given authentication method.
    async fn handle_challenge(&self, auth_method: &str, extra: &Dictionary) -> Result<String>;
}

/// Authentication-related details advertised in HELLO.
#[derive(Debug, Default, Clone)]
pub struct AuthOptions {
    /// Authentication methods the peer is willing to use (`authmethods`).
    pub methods: Vec<String>,
    /// The authentication ID to request, such as a username (`authid`).
    pub id: Option<String>,
    /// The authentication role to request (`authrole`).
    pub role: Option<String>,
    /// Extra application-defined authentication data (`authextra`).
    pub extra: Dictionary,
}
