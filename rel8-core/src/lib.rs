//! Core types for the REL8 calendar sync service.
//!
//! This crate provides the pieces shared between the server and any future
//! tooling:
//! - `event` types for outreach tasks and calendar invitations
//! - `ics` for generating iCalendar (RFC 5545) invitation text
//! - `formula` for the scoring-weight configuration resolver

pub mod constants;
pub mod error;
pub mod event;
pub mod formula;
pub mod ics;

// Re-export the common types at crate root for convenience
pub use error::{SyncError, SyncResult};
pub use event::*;
