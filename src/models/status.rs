//! Status (post) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;
use crate::timestamp::{TimestampError, parse_server_time};

/// A status update, with its date parsed and text unescaped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Numeric status ID
    pub id: u64,
    /// Text of the update
    pub text: String,
    /// When the update was posted
    pub created_at: Option<DateTime<Utc>>,
    /// Client that posted the update (may contain HTML)
    pub source: Option<String>,
    /// Status this one replies to
    pub in_reply_to_status_id: Option<u64>,
    /// Author of the status this one replies to
    pub in_reply_to_screen_name: Option<String>,
    /// Whether the authenticated user favorited it
    pub favorited: bool,
    /// Whether the server cut the text short
    pub truncated: bool,
    /// Author
    pub user: Option<User>,
}

impl Status {
    /// Whether this status is a reply
    pub const fn is_reply(&self) -> bool {
        self.in_reply_to_status_id.is_some()
    }

    /// Screen name of the author, if known
    pub fn author(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.screen_name.as_str())
    }
}

/// Status as sent by the server
#[derive(Debug, Deserialize)]
pub(crate) struct WireStatus {
    id: u64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    in_reply_to_status_id: Option<u64>,
    #[serde(default)]
    in_reply_to_screen_name: Option<String>,
    #[serde(default)]
    favorited: bool,
    #[serde(default)]
    truncated: bool,
    #[serde(default)]
    user: Option<User>,
}

impl WireStatus {
    /// Convert, parsing the date. Timeline entries also get their text
    /// unescaped.
    pub(crate) fn into_status(self, unescape: bool) -> Result<Status, TimestampError> {
        let created_at = self.created_at.as_deref().map(parse_server_time).transpose()?;

        let text = if unescape {
            unescape_text(&self.text)
        } else {
            self.text
        };

        Ok(Status {
            id: self.id,
            text,
            created_at,
            source: self.source,
            in_reply_to_status_id: self.in_reply_to_status_id,
            in_reply_to_screen_name: self.in_reply_to_screen_name,
            favorited: self.favorited,
            truncated: self.truncated,
            user: self.user,
        })
    }
}

/// Undo percent-escapes and HTML entities in a status text
fn unescape_text(text: &str) -> String {
    let decoded = urlencoding::decode(text).map_or_else(|_| text.to_string(), |t| t.into_owned());
    html_escape::decode_html_entities(&decoded).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn wire(json: &str) -> WireStatus {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_into_status_parses_date_and_text() {
        let status = wire(
            r#"{"id": 42, "text": "fish &amp; chips 100%25",
                "created_at": "Tue Mar 13 00:12:41 +0000 2007",
                "user": {"id": 7, "screen_name": "julio", "name": "Julio"}}"#,
        )
        .into_status(true)
        .unwrap();

        assert_eq!(status.id, 42);
        assert_eq!(status.text, "fish & chips 100%");
        assert_eq!(status.created_at.unwrap().year(), 2007);
        assert_eq!(status.author(), Some("julio"));
        assert!(!status.is_reply());
    }

    #[test]
    fn test_into_status_without_unescape() {
        let status = wire(r#"{"id": 1, "text": "a &amp; b"}"#)
            .into_status(false)
            .unwrap();
        assert_eq!(status.text, "a &amp; b");
        assert!(status.created_at.is_none());
    }

    #[test]
    fn test_bad_date_is_an_error() {
        let result = wire(r#"{"id": 1, "text": "x", "created_at": "yesterday"}"#).into_status(true);
        assert!(result.is_err());
    }

    #[test]
    fn test_unescape_keeps_invalid_escapes() {
        assert_eq!(unescape_text("100%zz &lt;3"), "100%zz <3");
    }
}
