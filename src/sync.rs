//! Calendar update orchestration.
//!
//! One run per request: load the task, reserve the next SEQUENCE, encode the
//! invitation, send it, then record what happened. The sequence is reserved
//! in the database *before* the send, so the durable record never claims a
//! lower revision than what a recipient's calendar has seen; a failed send
//! consumes the reservation and shows up in the audit log as `failed`.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};

use rel8_core::constants::EVENT_DURATION_MINUTES;
use rel8_core::ics;
use rel8_core::{
    event_summary, invite_uid, short_id, CalendarInvite, SyncError, SyncResult, UpdateType,
};

use crate::mailer::{InviteEmail, Mailer};
use crate::store::{OutreachTask, SyncLogEntry};

/// One calendar update request.
#[derive(Debug, Clone)]
pub struct CalendarUpdate {
    pub outreach_id: String,
    pub update_type: UpdateType,
    pub recipient_email: String,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct CalendarUpdateOutcome {
    pub sequence: i64,
    pub email_id: Option<String>,
}

fn persistence(e: sqlx::Error) -> SyncError {
    SyncError::Persistence(e.to_string())
}

/// Run one calendar update end to end.
pub async fn run_calendar_update(
    pool: &SqlitePool,
    mailer: &dyn Mailer,
    default_organizer: &str,
    update: CalendarUpdate,
) -> SyncResult<CalendarUpdateOutcome> {
    let task = OutreachTask::find_by_id(pool, &update.outreach_id)
        .await
        .map_err(persistence)?
        .ok_or_else(|| SyncError::TaskNotFound(update.outreach_id.clone()))?;

    let contacts = OutreachTask::contact_names(pool, &task.id)
        .await
        .map_err(persistence)?;

    // Reserve before sending; a crash or send failure after this point
    // leaves a numbering gap, never a duplicate.
    let sequence = OutreachTask::reserve_next_sequence(pool, &task.id)
        .await
        .map_err(persistence)?
        .ok_or_else(|| SyncError::TaskNotFound(task.id.clone()))?;

    let organizer = task
        .system_email
        .as_deref()
        .unwrap_or(default_organizer)
        .to_string();
    let location = task.location();

    let invite = CalendarInvite {
        uid: invite_uid(&task.id),
        summary: event_summary(&task.title, &task.id),
        description: build_description(task.description.as_deref(), &contacts),
        location: location.clone(),
        start: task.due_date,
        duration_minutes: EVENT_DURATION_MINUTES,
        priority_rank: task.priority().ics_rank(),
        sequence,
        method: update.update_type.method(),
        organizer_email: organizer,
        attendee_emails: vec![update.recipient_email.clone()],
    };
    let ics_text = ics::generate_invite(&invite, Utc::now());

    let email = InviteEmail {
        to: update.recipient_email.clone(),
        subject: format!("{}: {}", update.update_type.subject_prefix(), task.title),
        html_body: render_email_body(&task, update.update_type, &location),
        ics: ics_text.clone(),
        attachment_name: format!("outreach-{}.ics", short_id(&task.id)),
    };

    let change = format!("{} (sequence {})", update.update_type.as_str(), sequence);

    match mailer.send(&email).await {
        Ok(email_id) => {
            info!(
                outreach_id = %task.id,
                sequence,
                email_id = %email_id,
                "calendar update delivered"
            );

            // Best-effort: the email is already out, so failures here are
            // logged and the request still succeeds.
            if let Err(e) = OutreachTask::record_sent_invite(pool, &task.id, &ics_text, Utc::now()).await
            {
                warn!(outreach_id = %task.id, error = %e, "failed to persist sent invite");
            }
            if let Err(e) = SyncLogEntry::append(pool, &task.id, sequence, "sent", &change).await {
                warn!(outreach_id = %task.id, error = %e, "failed to append sync log");
            }

            Ok(CalendarUpdateOutcome {
                sequence,
                email_id: Some(email_id),
            })
        }
        Err(e) => {
            warn!(outreach_id = %task.id, sequence, error = %e, "calendar update delivery failed");

            if let Err(log_err) =
                SyncLogEntry::append(pool, &task.id, sequence, "failed", &change).await
            {
                warn!(outreach_id = %task.id, error = %log_err, "failed to append sync log");
            }

            Err(e)
        }
    }
}

fn build_description(description: Option<&str>, contacts: &[String]) -> String {
    let mut out = description.unwrap_or_default().to_string();
    if !contacts.is_empty() {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str("Contacts: ");
        out.push_str(&contacts.join(", "));
    }
    out
}

fn render_email_body(task: &OutreachTask, update_type: UpdateType, location: &str) -> String {
    let heading = match update_type {
        UpdateType::Cancel => "This outreach reminder has been cancelled.",
        UpdateType::Reschedule => "This outreach reminder has been rescheduled.",
        UpdateType::Update => "This outreach reminder has been updated.",
    };

    format!(
        "<p>{}</p>\
         <p><strong>{}</strong></p>\
         <p>When: {}<br>Where: {}</p>\
         <p>The attached calendar file will update the event in your calendar.</p>",
        heading,
        task.title,
        task.due_date.format("%Y-%m-%d %H:%M UTC"),
        location
    )
}
