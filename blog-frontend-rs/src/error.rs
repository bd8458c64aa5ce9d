use std::time::Duration;

use docsync::{PathError, ProviderError, StoreError};

use crate::post_form::Field;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),
    #[error("invalid configuration value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("could not parse configuration: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("sign-in rejected: {0}")]
    Rejected(#[from] ProviderError),
    #[error("sign-in did not complete within {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    #[error("could not listen to posts: {0}")]
    Refused(StoreError),
    #[error("live updates stopped: {0}")]
    Broken(StoreError),
    #[error("invalid posts collection: {0}")]
    Path(#[from] PathError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(Field),
    #[error("you must be signed in to do that")]
    NotAuthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("the store rejected the change: {0}")]
    Rejected(#[from] StoreError),
    #[error("the store did not answer within {0:?}")]
    TimedOut(Duration),
    #[error("invalid post path: {0}")]
    Path(#[from] PathError),
}

/// Failure of something the user asked for: submitting the form or deleting a post.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Everything the app reports to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error("unknown post {0}")]
    UnknownPost(String),
    #[error("could not read intent: {0}")]
    Intent(String),
}

impl From<ActionError> for AppError {
    fn from(error: ActionError) -> Self {
        match error {
            ActionError::Validation(e) => AppError::Validation(e),
            ActionError::Write(e) => AppError::Write(e),
        }
    }
}
