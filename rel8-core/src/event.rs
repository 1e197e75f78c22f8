//! Outreach-event types.
//!
//! These types describe an outreach task the way the calendar sync sees it:
//! a priority, a channel with its channel-specific details, and the derived
//! display fields (summary, location) that end up in the ICS invitation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::constants::UID_DOMAIN;

/// Outreach task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// iCalendar PRIORITY value (inverted scale: 1 is the most urgent).
    pub fn ics_rank(&self) -> u8 {
        match self {
            Priority::Low => 9,
            Priority::Medium => 5,
            Priority::High => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// The kind of calendar update being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    Update,
    Reschedule,
    Cancel,
}

impl UpdateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::Update => "update",
            UpdateType::Reschedule => "reschedule",
            UpdateType::Cancel => "cancel",
        }
    }

    /// Email subject prefix for this update kind.
    pub fn subject_prefix(&self) -> &'static str {
        match self {
            UpdateType::Update => "Updated",
            UpdateType::Reschedule => "Rescheduled",
            UpdateType::Cancel => "Cancelled",
        }
    }

    pub fn method(&self) -> InviteMethod {
        match self {
            UpdateType::Cancel => InviteMethod::Cancel,
            _ => InviteMethod::Request,
        }
    }
}

/// How the outreach is supposed to happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutreachChannel {
    Text,
    Call,
    Email,
    Dm,
    Meeting,
    Irl,
}

impl FromStr for OutreachChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutreachChannel::Text),
            "call" => Ok(OutreachChannel::Call),
            "email" => Ok(OutreachChannel::Email),
            "dm" => Ok(OutreachChannel::Dm),
            "meeting" => Ok(OutreachChannel::Meeting),
            "irl" => Ok(OutreachChannel::Irl),
            other => Err(format!("unknown outreach channel: {}", other)),
        }
    }
}

/// Channel-specific details, one variant per channel.
///
/// The database stores these as a loose JSON bag next to the channel column;
/// `from_raw` narrows the bag down to the fields the channel actually uses,
/// so nothing downstream ever looks at a field that belongs to another
/// channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelDetails {
    Text { phone: Option<String> },
    Call { phone: Option<String> },
    Email { email: Option<String> },
    Dm { platform: Option<String>, handle: Option<String> },
    Meeting { platform: Option<String>, link: Option<String> },
    Irl { address: Option<String> },
}

fn str_field(raw: &serde_json::Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

impl ChannelDetails {
    /// Narrow a raw details bag down to the channel's own fields.
    pub fn from_raw(channel: OutreachChannel, raw: &serde_json::Value) -> Self {
        match channel {
            OutreachChannel::Text => ChannelDetails::Text {
                phone: str_field(raw, "phone"),
            },
            OutreachChannel::Call => ChannelDetails::Call {
                phone: str_field(raw, "phone"),
            },
            OutreachChannel::Email => ChannelDetails::Email {
                email: str_field(raw, "email"),
            },
            OutreachChannel::Dm => ChannelDetails::Dm {
                platform: str_field(raw, "platform"),
                handle: str_field(raw, "handle"),
            },
            OutreachChannel::Meeting => ChannelDetails::Meeting {
                platform: str_field(raw, "meetingPlatform"),
                link: str_field(raw, "link"),
            },
            OutreachChannel::Irl => ChannelDetails::Irl {
                address: str_field(raw, "address"),
            },
        }
    }

    /// The event LOCATION for this channel, with a fixed fallback per
    /// channel when details are missing.
    pub fn location(&self) -> String {
        match self {
            ChannelDetails::Text { phone } => match phone {
                Some(p) => p.clone(),
                None => "Text message".to_string(),
            },
            ChannelDetails::Call { phone } => match phone {
                Some(p) => p.clone(),
                None => "Phone call".to_string(),
            },
            ChannelDetails::Email { email } => match email {
                Some(e) => e.clone(),
                None => "Email".to_string(),
            },
            ChannelDetails::Dm { platform, handle } => match (platform, handle) {
                (Some(p), Some(h)) => format!("{}: @{}", p, h),
                (Some(p), None) => p.clone(),
                _ => "Direct message".to_string(),
            },
            ChannelDetails::Meeting { platform, link } => match (link, platform) {
                (Some(l), _) => l.clone(),
                (None, Some(p)) => p.clone(),
                _ => "Online meeting".to_string(),
            },
            ChannelDetails::Irl { address } => match address {
                Some(a) => a.clone(),
                None => "In person".to_string(),
            },
        }
    }
}

/// Location shown when the task has no outreach channel at all.
pub const DEFAULT_LOCATION: &str = "Outreach task";

/// Which ICS method the invitation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteMethod {
    Request,
    Cancel,
}

impl InviteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteMethod::Request => "REQUEST",
            InviteMethod::Cancel => "CANCEL",
        }
    }
}

/// One calendar invitation, ready to be encoded as ICS text.
#[derive(Debug, Clone)]
pub struct CalendarInvite {
    pub uid: String,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
    /// iCalendar PRIORITY value (1, 5 or 9)
    pub priority_rank: u8,
    /// iCalendar SEQUENCE value
    pub sequence: i64,
    pub method: InviteMethod,
    pub organizer_email: String,
    pub attendee_emails: Vec<String>,
}

/// Stable UID for the event created from an outreach task.
pub fn invite_uid(outreach_id: &str) -> String {
    format!("outreach-{}@{}", outreach_id, UID_DOMAIN)
}

/// Event summary shown in the recipient's calendar.
pub fn event_summary(title: &str, outreach_id: &str) -> String {
    format!("Reminder set: {} #{}", title, short_id(outreach_id))
}

/// Get a short version of the task ID for display
pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_ics_rank_mapping() {
        assert_eq!(Priority::Low.ics_rank(), 9);
        assert_eq!(Priority::Medium.ics_rank(), 5);
        assert_eq!(Priority::High.ics_rank(), 1);
    }

    #[test]
    fn test_priority_parses_from_column_value() {
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_update_type_subject_prefixes() {
        assert_eq!(UpdateType::Update.subject_prefix(), "Updated");
        assert_eq!(UpdateType::Reschedule.subject_prefix(), "Rescheduled");
        assert_eq!(UpdateType::Cancel.subject_prefix(), "Cancelled");
    }

    #[test]
    fn test_only_cancel_maps_to_cancel_method() {
        assert_eq!(UpdateType::Cancel.method(), InviteMethod::Cancel);
        assert_eq!(UpdateType::Update.method(), InviteMethod::Request);
        assert_eq!(UpdateType::Reschedule.method(), InviteMethod::Request);
    }

    #[test]
    fn test_location_uses_channel_details() {
        let details = ChannelDetails::from_raw(
            OutreachChannel::Irl,
            &json!({"address": "123 Main St"}),
        );
        assert_eq!(details.location(), "123 Main St");

        let details = ChannelDetails::from_raw(
            OutreachChannel::Dm,
            &json!({"platform": "Instagram", "handle": "someone"}),
        );
        assert_eq!(details.location(), "Instagram: @someone");

        let details = ChannelDetails::from_raw(
            OutreachChannel::Meeting,
            &json!({"meetingPlatform": "Zoom", "link": "https://zoom.us/j/1"}),
        );
        assert_eq!(details.location(), "https://zoom.us/j/1");
    }

    #[test]
    fn test_location_falls_back_per_channel() {
        let empty = json!({});
        assert_eq!(
            ChannelDetails::from_raw(OutreachChannel::Call, &empty).location(),
            "Phone call"
        );
        assert_eq!(
            ChannelDetails::from_raw(OutreachChannel::Text, &empty).location(),
            "Text message"
        );
        assert_eq!(
            ChannelDetails::from_raw(OutreachChannel::Meeting, &empty).location(),
            "Online meeting"
        );
        assert_eq!(
            ChannelDetails::from_raw(OutreachChannel::Irl, &empty).location(),
            "In person"
        );
    }

    #[test]
    fn test_from_raw_ignores_other_channels_fields() {
        // A bag polluted with fields from another channel must not leak
        let raw = json!({"phone": "+1555", "address": "123 Main St"});
        let details = ChannelDetails::from_raw(OutreachChannel::Call, &raw);
        assert_eq!(details, ChannelDetails::Call { phone: Some("+1555".into()) });
    }

    #[test]
    fn test_event_summary_includes_short_id() {
        let summary = event_summary("Coffee chat", "abcdef01-2345-6789");
        assert_eq!(summary, "Reminder set: Coffee chat #abcdef01");
    }

    #[test]
    fn test_invite_uid_is_stable() {
        assert_eq!(invite_uid("abc"), "outreach-abc@rel8.app");
    }
}
