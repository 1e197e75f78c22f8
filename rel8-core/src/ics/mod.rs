//! ICS invitation generation.
//!
//! This module renders calendar invitations as iCalendar (RFC 5545) text.
//! The output is the wire format calendar clients reconcile on, so the
//! escaping, folding and property layout are fixed.

mod generate;

pub use generate::generate_invite;
