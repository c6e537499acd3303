use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::info;

use crate::config::AppConfig;

/// Outbound mail seam. Handlers never talk to the provider directly so
/// tests can substitute a recording fake.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()>;
}

/// Resend-compatible HTTP mailer.
pub struct ResendMailer {
    client: Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let api_key = config.resend_api_key.clone()?;
        Some(Self {
            client: Client::new(),
            endpoint: config.resend_endpoint.clone(),
            api_key,
            from: config.email_from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let payload = json!({
            "from": self.from,
            "to": [to],
            "subject": subject,
            "html": html,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("mail provider returned {status}: {body}"));
        }

        Ok(())
    }
}

/// Stands in when no API key is configured; logs instead of sending.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<()> {
        info!(%to, %subject, "email delivery disabled; dropping message");
        Ok(())
    }
}

pub fn render_invitation_email(name: &str, inviter_name: &str, setup_url: &str) -> String {
    format!(
        "<html><body>\
         <h1>Dev Tracker</h1>\
         <p>Hi {name},</p>\
         <p>{inviter_name} invited you to join their team on Dev Tracker.</p>\
         <p><a href=\"{setup_url}\">Set up your password</a> to get started. \
         The link expires in 7 days.</p>\
         </body></html>"
    )
}

pub fn render_comment_email(
    assignee_name: &str,
    author: &str,
    feature_task: &str,
    content: &str,
    task_url: &str,
) -> String {
    format!(
        "<html><body>\
         <h1>Dev Tracker</h1>\
         <p>Hi {assignee_name},</p>\
         <p>{author} commented on <strong>{feature_task}</strong>:</p>\
         <blockquote>{content}</blockquote>\
         <p><a href=\"{task_url}\">View the task</a></p>\
         </body></html>"
    )
}
