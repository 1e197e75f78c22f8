//! Shared constants.

/// Calendar events created from outreach tasks are always one hour long.
pub const EVENT_DURATION_MINUTES: i64 = 60;

/// Display alarm fires this many minutes before the event starts.
pub const ALARM_LEAD_MINUTES: i64 = 15;

/// Domain used to build stable event UIDs.
pub const UID_DOMAIN: &str = "rel8.app";
