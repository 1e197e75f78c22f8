//! Transactional email delivery.
//!
//! Invitations go out through the Resend HTTP API with the ICS text attached
//! as a base64-encoded file. The trait seam exists so the orchestrator can be
//! exercised in tests without network access.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use rel8_core::{SyncError, SyncResult};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// One invitation email, ready to send.
#[derive(Debug, Clone)]
pub struct InviteEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    /// Raw ICS text; attached base64-encoded
    pub ics: String,
    pub attachment_name: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one email, returning the provider's message id.
    async fn send(&self, email: &InviteEmail) -> SyncResult<String>;
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    attachments: Vec<ResendAttachment>,
}

#[derive(Serialize)]
struct ResendAttachment {
    filename: String,
    content: String,
}

#[derive(Deserialize)]
struct ResendResponse {
    id: String,
}

/// Mailer backed by the Resend API.
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(api_key: String, from: String) -> Self {
        ResendMailer {
            client: reqwest::Client::new(),
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &InviteEmail) -> SyncResult<String> {
        let request = ResendRequest {
            from: &self.from,
            to: vec![email.to.as_str()],
            subject: &email.subject,
            html: &email.html_body,
            attachments: vec![ResendAttachment {
                filename: email.attachment_name.clone(),
                content: BASE64.encode(email.ics.as_bytes()),
            }],
        };

        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SyncError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Delivery(format!(
                "Resend returned {}: {}",
                status, body
            )));
        }

        let parsed: ResendResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Delivery(e.to_string()))?;

        Ok(parsed.id)
    }
}
