//! Outbound e-mail. Delivery runs from the background worker, never from
//! a request handler; handlers enqueue `TaskKind::SendEmail` instead.

pub mod templates;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mail gateway rejected message (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Posts messages as JSON to an HTTP e-mail gateway.
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct GatewayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: Option<String>, from: String) -> Result<Self, MailError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            api_url,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let mut request = self.client.post(&self.api_url).json(&GatewayMessage {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            text: &email.body,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

/// Writes messages to the log instead of sending them. Used when no gateway is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        info!(
            to = %email.to,
            subject = %email.subject,
            "E-mail (log only):\n{}",
            email.body
        );
        Ok(())
    }
}

/// Picks the gateway mailer when `MAIL_API_URL` is set, else the log mailer.
pub fn build_mailer(config: &MailConfig) -> Result<Box<dyn Mailer>, MailError> {
    match &config.api_url {
        Some(url) => Ok(Box::new(HttpMailer::new(
            url.clone(),
            config.api_key.clone(),
            config.from.clone(),
        )?)),
        None => Ok(Box::new(LogMailer)),
    }
}

/// Sends `email` and records the outcome in `email_log`.
pub async fn deliver(mailer: &dyn Mailer, pool: &PgPool, email: &Email) -> Result<(), MailError> {
    let result = mailer.send(email).await;

    let (status, error) = match &result {
        Ok(()) => ("sent", None),
        Err(e) => ("failed", Some(e.to_string())),
    };
    let logged = sqlx::query(
        "INSERT INTO email_log (id, recipient, subject, status, error) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(&email.to)
    .bind(&email.subject)
    .bind(status)
    .bind(error)
    .execute(pool)
    .await;
    if let Err(e) = logged {
        warn!("Failed to record e-mail to {} in email_log: {e}", email.to);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        let email = Email {
            to: "a@b.co".into(),
            subject: "s".into(),
            body: "b".into(),
        };
        assert!(LogMailer.send(&email).await.is_ok());
    }

    #[test]
    fn test_build_mailer_without_gateway() {
        let config = MailConfig {
            api_url: None,
            api_key: None,
            from: "no-reply@syncem.local".into(),
        };
        assert!(build_mailer(&config).is_ok());
    }

    #[test]
    fn test_gateway_message_shape() {
        let value = serde_json::to_value(GatewayMessage {
            from: "f@x.co",
            to: "t@x.co",
            subject: "s",
            text: "body",
        })
        .unwrap();
        assert_eq!(value["from"], "f@x.co");
        assert_eq!(value["text"], "body");
    }
}
