use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

impl NotificationKind {
    /// Success and error end a sign-in attempt; info is progress
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// A one-shot message delivered to the subscribers of a ticket
///
/// Wire form: `{"type": "info", "ticket": "...", "data": {...}, "message": "..."}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub ticket: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(rename = "message")]
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let msg = NotificationMessage {
            ticket: "t1".to_string(),
            kind: NotificationKind::Success,
            payload: Some(json!({"token": "abc"})),
            text: "login succeeded".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "ticket": "t1",
                "type": "success",
                "data": {"token": "abc"},
                "message": "login succeeded",
            })
        );
    }

    #[test]
    fn test_info_without_payload() {
        let msg = NotificationMessage {
            ticket: "t1".to_string(),
            kind: NotificationKind::Info,
            payload: None,
            text: "scanned".to_string(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("data").is_none());
        assert!(!msg.kind.is_terminal());
    }
}
