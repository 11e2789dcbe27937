//! User model

use serde::{Deserialize, Serialize};

/// An account on the server, as embedded in statuses and friend lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Numeric user ID
    pub id: u64,
    /// Login name, without the `@`
    pub screen_name: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Avatar URL
    #[serde(default)]
    pub profile_image_url: Option<String>,
    /// Free-form location
    #[serde(default)]
    pub location: Option<String>,
    /// Profile description
    #[serde(default)]
    pub description: Option<String>,
    /// Homepage
    #[serde(default)]
    pub url: Option<String>,
    /// Whether the account's updates are private
    #[serde(default)]
    pub protected: bool,
    /// Number of followers
    #[serde(default)]
    pub followers_count: u32,
}

impl User {
    /// `Name (screen_name)` label used by front-ends
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.screen_name.clone()
        } else {
            format!("{} ({})", self.name, self.screen_name)
        }
    }
}
