// crates/core/src/user.rs
//! Caller identity attached to every job.

use serde::{Deserialize, Serialize};

/// Identity of the user who submitted a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl UserInfo {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `other` is the same user. Roles do not take part.
    pub fn is_same_user(&self, other: &UserInfo) -> bool {
        self.user_id == other.user_id
    }
}
