//! Notification codes and presence checks
//!
//! Every level of a recommendation document carries a `notifications` map
//! keyed by a numeric code. The "not enough data" code is the single gate that
//! decides whether a block is expected to hold a recommendation at all.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ViolationKind;

pub const NOT_ENOUGH_DATA_MSG: &str = "There is not enough data available to generate a recommendation.";
pub const RECOMMENDATIONS_AVAILABLE_MSG: &str = "Recommendations Are Available";
pub const RUNTIMES_RECOMMENDATIONS_AVAILABLE_MSG: &str = "Runtimes Recommendations Available";

/// Notification code as reported by the service
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationCode {
    RecommendationsAvailable,
    ShortTermRecommendationsAvailable,
    MediumTermRecommendationsAvailable,
    LongTermRecommendationsAvailable,
    CostRecommendationsAvailable,
    PerformanceRecommendationsAvailable,
    RuntimesRecommendationsAvailable,
    NotEnoughData,
    NumberOfPodsCannotBeZero,
    CpuUsageLessThanMillicore,
    CpuRecordsMissing,
    MemoryRecordsMissing,
    /// A code outside the known enumeration, kept verbatim
    Unrecognized(String),
}

static KNOWN_CODES: [(NotificationCode, &str); 12] = [
    (NotificationCode::RecommendationsAvailable, "111000"),
    (NotificationCode::ShortTermRecommendationsAvailable, "111101"),
    (NotificationCode::MediumTermRecommendationsAvailable, "111102"),
    (NotificationCode::LongTermRecommendationsAvailable, "111103"),
    (NotificationCode::CostRecommendationsAvailable, "112101"),
    (NotificationCode::PerformanceRecommendationsAvailable, "112102"),
    (NotificationCode::RuntimesRecommendationsAvailable, "112103"),
    (NotificationCode::NotEnoughData, "120001"),
    (NotificationCode::NumberOfPodsCannotBeZero, "221001"),
    (NotificationCode::CpuUsageLessThanMillicore, "323001"),
    (NotificationCode::CpuRecordsMissing, "323004"),
    (NotificationCode::MemoryRecordsMissing, "324003"),
];

impl NotificationCode {
    pub fn code(&self) -> &str {
        if let NotificationCode::Unrecognized(raw) = self {
            return raw;
        }
        KNOWN_CODES
            .iter()
            .find(|(known, _)| known == self)
            .map(|(_, code)| *code)
            .unwrap_or_default()
    }

    /// Message the service is expected to attach to this code
    pub fn canonical_message(&self) -> Option<&'static str> {
        let message = match self {
            NotificationCode::RecommendationsAvailable => RECOMMENDATIONS_AVAILABLE_MSG,
            NotificationCode::ShortTermRecommendationsAvailable => "Short Term Recommendations Available",
            NotificationCode::MediumTermRecommendationsAvailable => "Medium Term Recommendations Available",
            NotificationCode::LongTermRecommendationsAvailable => "Long Term Recommendations Available",
            NotificationCode::CostRecommendationsAvailable => "Cost Recommendations Available",
            NotificationCode::PerformanceRecommendationsAvailable => "Performance Recommendations Available",
            NotificationCode::RuntimesRecommendationsAvailable => RUNTIMES_RECOMMENDATIONS_AVAILABLE_MSG,
            NotificationCode::NotEnoughData => NOT_ENOUGH_DATA_MSG,
            NotificationCode::NumberOfPodsCannotBeZero => "Number of pods cannot be zero",
            NotificationCode::CpuUsageLessThanMillicore => {
                "CPU Usage is less than a millicore, No CPU Recommendations can be generated"
            }
            NotificationCode::CpuRecordsMissing => "CPU metrics are missing",
            NotificationCode::MemoryRecordsMissing => "Memory metrics are missing",
            NotificationCode::Unrecognized(_) => return None,
        };
        Some(message)
    }

    /// Category a known code belongs to
    pub fn category(&self) -> Option<NotificationKind> {
        match self {
            NotificationCode::NumberOfPodsCannotBeZero => Some(NotificationKind::Error),
            NotificationCode::CpuUsageLessThanMillicore => Some(NotificationKind::Warning),
            NotificationCode::CpuRecordsMissing | NotificationCode::MemoryRecordsMissing => {
                Some(NotificationKind::Critical)
            }
            NotificationCode::Unrecognized(_) => None,
            _ => Some(NotificationKind::Info),
        }
    }
}

impl From<&str> for NotificationCode {
    fn from(value: &str) -> Self {
        KNOWN_CODES
            .iter()
            .find(|(_, code)| *code == value)
            .map(|(known, _)| known.clone())
            .unwrap_or_else(|| NotificationCode::Unrecognized(value.to_string()))
    }
}

impl From<String> for NotificationCode {
    fn from(value: String) -> Self {
        NotificationCode::from(value.as_str())
    }
}

impl From<NotificationCode> for String {
    fn from(value: NotificationCode) -> Self {
        value.code().to_string()
    }
}

impl fmt::Display for NotificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Warning,
    Critical,
    Error,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationKind::Info => "info",
            NotificationKind::Warning => "warning",
            NotificationKind::Critical => "critical",
            NotificationKind::Error => "error",
            NotificationKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}

pub type Notifications = BTreeMap<NotificationCode, Notification>;

/// A document level that carries a notifications map
pub trait NotificationBlock {
    fn notifications(&self) -> &Notifications;
}

/// False when the block reports "not enough data"
pub fn recommendations_present<B: NotificationBlock + ?Sized>(block: &B) -> bool {
    !block
        .notifications()
        .contains_key(&NotificationCode::NotEnoughData)
}

/// The code must be present with exactly `expected_message`
pub fn assert_notification_pair(
    notifications: &Notifications,
    code: &NotificationCode,
    expected_message: &str,
) -> Result<(), ViolationKind> {
    let Some(notification) = notifications.get(code) else {
        return Err(ViolationKind::Notification {
            code: code.to_string(),
            reason: "expected code is missing".to_string(),
            notifications: describe(notifications),
        });
    };
    if notification.message != expected_message {
        return Err(ViolationKind::Notification {
            code: code.to_string(),
            reason: format!(
                "message mismatch: expected {:?}, found {:?}",
                expected_message, notification.message
            ),
            notifications: describe(notifications),
        });
    }
    Ok(())
}

/// [`assert_notification_pair`] with the code's canonical message
pub fn assert_canonical_notification(
    notifications: &Notifications,
    code: &NotificationCode,
) -> Result<(), ViolationKind> {
    match code.canonical_message() {
        Some(message) => assert_notification_pair(notifications, code, message),
        None if notifications.contains_key(code) => Ok(()),
        None => Err(ViolationKind::Notification {
            code: code.to_string(),
            reason: "expected code is missing".to_string(),
            notifications: describe(notifications),
        }),
    }
}

/// Codes whose entry is typed `error`
pub fn error_notifications(notifications: &Notifications) -> Vec<&NotificationCode> {
    notifications
        .iter()
        .filter(|(_, n)| n.kind == NotificationKind::Error)
        .map(|(code, _)| code)
        .collect()
}

/// Fail if any error-typed notification is present
pub fn reject_error_notifications(notifications: &Notifications) -> Result<(), ViolationKind> {
    match error_notifications(notifications).first() {
        Some(code) => Err(ViolationKind::Notification {
            code: code.to_string(),
            reason: "error-typed notification present alongside recommendation data".to_string(),
            notifications: describe(notifications),
        }),
        None => Ok(()),
    }
}

/// One-line rendering of a notifications map for violation messages
pub fn describe(notifications: &Notifications) -> String {
    if notifications.is_empty() {
        return "{}".to_string();
    }
    notifications
        .iter()
        .map(|(code, n)| format!("{}({}): {}", code, n.kind, n.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Block(Notifications);

    impl NotificationBlock for Block {
        fn notifications(&self) -> &Notifications {
            &self.0
        }
    }

    fn parse(value: serde_json::Value) -> Notifications {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_codes_round_trip() {
        assert_eq!(NotificationCode::from("120001"), NotificationCode::NotEnoughData);
        assert_eq!(NotificationCode::NotEnoughData.code(), "120001");
        assert_eq!(
            NotificationCode::from("999999"),
            NotificationCode::Unrecognized("999999".to_string())
        );
        assert_eq!(NotificationCode::from("999999").code(), "999999");
    }

    #[test]
    fn test_every_known_code_has_message_and_category() {
        for (code, _) in KNOWN_CODES.iter() {
            assert!(code.canonical_message().is_some(), "{} has no message", code);
            assert!(code.category().is_some(), "{} has no category", code);
        }
    }

    #[test]
    fn test_not_enough_data_gates_presence() {
        let absent = Block(parse(json!({
            "120001": {"type": "info", "message": NOT_ENOUGH_DATA_MSG, "code": 120001}
        })));
        assert!(!recommendations_present(&absent));

        let present = Block(parse(json!({
            "111000": {"type": "info", "message": RECOMMENDATIONS_AVAILABLE_MSG, "code": 111000}
        })));
        assert!(recommendations_present(&present));
        assert!(recommendations_present(&Block(Notifications::new())));
    }

    #[test]
    fn test_notification_pair_requires_exact_message() {
        let notifications = parse(json!({
            "111000": {"type": "info", "message": "Recommendations are available"}
        }));
        let err = assert_notification_pair(
            &notifications,
            &NotificationCode::RecommendationsAvailable,
            RECOMMENDATIONS_AVAILABLE_MSG,
        )
        .unwrap_err();
        assert_eq!(err.label(), "notification");

        assert!(assert_notification_pair(
            &notifications,
            &NotificationCode::RecommendationsAvailable,
            "Recommendations are available"
        )
        .is_ok());
    }

    #[test]
    fn test_missing_code_names_full_map() {
        let notifications = parse(json!({
            "112101": {"type": "info", "message": "Cost Recommendations Available"}
        }));
        let err = assert_canonical_notification(
            &notifications,
            &NotificationCode::RuntimesRecommendationsAvailable,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("112103"));
        assert!(msg.contains("Cost Recommendations Available"));
    }

    #[test]
    fn test_error_typed_notifications_rejected() {
        let notifications = parse(json!({
            "221001": {"type": "error", "message": "Number of pods cannot be zero"},
            "111000": {"type": "info", "message": RECOMMENDATIONS_AVAILABLE_MSG}
        }));
        assert_eq!(
            error_notifications(&notifications),
            vec![&NotificationCode::NumberOfPodsCannotBeZero]
        );
        assert!(reject_error_notifications(&notifications).is_err());
    }

    #[test]
    fn test_unknown_type_is_tolerated() {
        let notifications = parse(json!({"400001": {"type": "notice", "message": "x"}}));
        let (_, n) = notifications.iter().next().unwrap();
        assert_eq!(n.kind, NotificationKind::Unknown);
    }
}
