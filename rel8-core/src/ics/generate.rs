//! ICS text generation.

use chrono::{DateTime, Duration, Utc};

use crate::constants::ALARM_LEAD_MINUTES;
use crate::event::{CalendarInvite, InviteMethod};

/// Generate the full VCALENDAR text for one invitation.
///
/// `dtstamp` is passed in rather than read from the system clock so that
/// output is byte-identical for identical inputs. All lines are CRLF
/// terminated, including the last one.
pub fn generate_invite(invite: &CalendarInvite, dtstamp: DateTime<Utc>) -> String {
    let end = invite.start + Duration::minutes(invite.duration_minutes);

    let status = match invite.method {
        InviteMethod::Request => "CONFIRMED",
        InviteMethod::Cancel => "CANCELLED",
    };

    let mut lines: Vec<String> = Vec::with_capacity(30);
    lines.push("BEGIN:VCALENDAR".to_string());
    lines.push("VERSION:2.0".to_string());
    lines.push("PRODID:-//REL8//Outreach Task//EN".to_string());
    lines.push("CALSCALE:GREGORIAN".to_string());
    lines.push(format!("METHOD:{}", invite.method.as_str()));
    lines.push("X-WR-CALNAME:REL8 - Outreach Tasks".to_string());
    lines.push("X-WR-TIMEZONE:UTC".to_string());
    lines.push("BEGIN:VEVENT".to_string());
    lines.push(format!("UID:{}", invite.uid));
    lines.push(format!("DTSTAMP:{}", format_utc(dtstamp)));
    lines.push(format!("DTSTART:{}", format_utc(invite.start)));
    lines.push(format!("DTEND:{}", format_utc(end)));
    lines.push(format!("SUMMARY:{}", escape_text(&invite.summary)));
    lines.push(format!("DESCRIPTION:{}", escape_text(&invite.description)));
    lines.push(format!("LOCATION:{}", escape_text(&invite.location)));
    lines.push(format!("STATUS:{}", status));
    lines.push(format!("SEQUENCE:{}", invite.sequence));
    lines.push(format!("PRIORITY:{}", invite.priority_rank));
    lines.push(format!(
        "ORGANIZER;CN=REL8 Notifications:mailto:{}",
        invite.organizer_email
    ));
    lines.push(format!(
        "ATTENDEE;CN=REL8 Notification System;ROLE=NON-PARTICIPANT;PARTSTAT=NEEDS-ACTION;RSVP=TRUE:mailto:{}",
        invite.organizer_email
    ));
    for attendee in &invite.attendee_emails {
        lines.push(format!(
            "ATTENDEE;CN=User;ROLE=REQ-PARTICIPANT;PARTSTAT=NEEDS-ACTION;RSVP=TRUE:mailto:{}",
            attendee
        ));
    }

    // Cancellations carry no alarm
    if invite.method != InviteMethod::Cancel {
        lines.push("BEGIN:VALARM".to_string());
        lines.push(format!("TRIGGER:-PT{}M", ALARM_LEAD_MINUTES));
        lines.push("ACTION:DISPLAY".to_string());
        lines.push(format!("DESCRIPTION:{}", escape_text(&invite.summary)));
        lines.push("END:VALARM".to_string());
    }

    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());

    let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 4).sum());
    for line in &lines {
        out.push_str(&fold_line(line));
        out.push_str("\r\n");
    }
    out
}

/// UTC basic format required by the invitation: `YYYYMMDDThhmmssZ`.
fn format_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Escape a property value per RFC 5545.
///
/// Backslash is escaped first so later substitutions never double-escape:
/// `\` → `\\`, `;` → `\;`, `,` → `\,`, newline → `\n`.
///
/// Line endings are normalized before escaping: a CRLF pair becomes one
/// escaped newline and a bare CR is treated as a newline too. CR cannot
/// survive into a content line anyway (it would break the CRLF framing),
/// so unescaping yields the LF-normalized form of the input, not the
/// original byte sequence.
fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\\n");
            }
            _ => out.push(c),
        }
    }
    out
}

/// Fold a content line longer than 75 octets.
///
/// The first segment carries up to 75 octets; each continuation is CRLF,
/// one space, then up to 74 more octets, so every physical line stays
/// within 75 octets after the space. Splits land on char boundaries, never
/// inside a multi-byte character.
fn fold_line(line: &str) -> String {
    if line.len() <= 75 {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len() + line.len() / 64 + 8);
    let mut budget = 75;
    let mut used = 0;
    for c in line.chars() {
        let width = c.len_utf8();
        if used + width > budget {
            out.push_str("\r\n ");
            budget = 74;
            used = 0;
        }
        out.push(c);
        used += width;
    }
    out
}
