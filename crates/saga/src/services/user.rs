//! User service client.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::UserId;

use super::ClientError;

/// Response to a user validation request.
#[derive(Debug, Clone)]
pub struct ValidateUserResponse {
    /// The user exists.
    pub is_valid: bool,
    /// The user's account is active.
    pub is_active: bool,
    /// Optional human-readable detail.
    pub message: Option<String>,
}

/// Client for the user service.
#[async_trait]
pub trait UserClient: Send + Sync {
    /// Checks that a user exists and is active.
    async fn validate_user(&self, user_id: UserId) -> Result<ValidateUserResponse, ClientError>;
}

#[derive(Debug, Default)]
struct DirectoryState {
    users: HashMap<UserId, bool>,
    unavailable: bool,
}

/// In-memory user directory for tests and the demo binary.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl InMemoryUserDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user; `active` controls the account flag.
    pub fn register_user(&self, user_id: UserId, active: bool) {
        self.state.write().unwrap().users.insert(user_id, active);
    }

    /// Simulates an outage of the user service.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }
}

#[async_trait]
impl UserClient for InMemoryUserDirectory {
    async fn validate_user(&self, user_id: UserId) -> Result<ValidateUserResponse, ClientError> {
        let state = self.state.read().unwrap();
        if state.unavailable {
            return Err(ClientError::Unavailable(
                "user service unreachable".to_string(),
            ));
        }

        match state.users.get(&user_id) {
            Some(&active) => Ok(ValidateUserResponse {
                is_valid: true,
                is_active: active,
                message: (!active).then(|| "account is suspended".to_string()),
            }),
            None => Ok(ValidateUserResponse {
                is_valid: false,
                is_active: false,
                message: Some(format!("unknown user: {user_id}")),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_active_user_validates() {
        let directory = InMemoryUserDirectory::new();
        let user_id = UserId::new();
        directory.register_user(user_id, true);

        let response = directory.validate_user(user_id).await.unwrap();
        assert!(response.is_valid);
        assert!(response.is_active);
    }

    #[tokio::test]
    async fn suspended_user_is_valid_but_inactive() {
        let directory = InMemoryUserDirectory::new();
        let user_id = UserId::new();
        directory.register_user(user_id, false);

        let response = directory.validate_user(user_id).await.unwrap();
        assert!(response.is_valid);
        assert!(!response.is_active);
        assert!(response.message.is_some());
    }

    #[tokio::test]
    async fn unknown_user_is_invalid() {
        let directory = InMemoryUserDirectory::new();
        let response = directory.validate_user(UserId::new()).await.unwrap();
        assert!(!response.is_valid);
    }

    #[tokio::test]
    async fn outage_surfaces_as_transport_error() {
        let directory = InMemoryUserDirectory::new();
        directory.set_unavailable(true);

        let err = directory.validate_user(UserId::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::Unavailable(_)));
    }
}
