use std::fmt;

use crate::Subscription;

/// Opaque account identifier handed out by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("anonymous sign-in is disabled for this project")]
    AnonymousDisabled,
    #[error("sign-in token was rejected: {0}")]
    InvalidToken(String),
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Hands out user identities. At most one identity is signed in at a time, and an identity keeps the
/// same id across reconnects.
#[allow(async_fn_in_trait)]
pub trait IdentityProvider {
    async fn sign_in_anonymously(&self) -> Result<UserId, ProviderError>;

    async fn sign_in_with_token(&self, token: &str) -> Result<UserId, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// `listener` is called with the current identity right away and again whenever it changes.
    fn on_state_change(&self, listener: Box<dyn Fn(Option<UserId>)>) -> Subscription;
}
