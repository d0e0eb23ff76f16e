// src/services/email.rs
//! Outbound email via AWS SES.
//!
//! Handlers depend on the [`Mailer`] trait; [`SesMailer`] is the production
//! implementation. Message bodies are built here so the templates live next
//! to the transport.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sesv2::types::{Body as SesBody, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;
use thiserror::Error;
use tracing::{error, info};

use crate::common::helpers::safe_email_log;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("SES from address not configured")]
    NotConfigured,

    #[error("SES operation failed: {0}")]
    SesError(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), EmailError>;
}

pub struct SesMailer {
    client: SesClient,
    from_email: String,
}

impl SesMailer {
    /// Build an SES client from the ambient AWS environment
    /// (AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_REGION).
    pub async fn from_env(from_email: String) -> Result<Self, EmailError> {
        if from_email.trim().is_empty() {
            return Err(EmailError::NotConfigured);
        }

        let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;

        Ok(Self {
            client: SesClient::new(&aws_config),
            from_email,
        })
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), EmailError> {
        let destination = Destination::builder().to_addresses(to).build();

        let subject_content = Content::builder()
            .data(subject)
            .charset("UTF-8")
            .build()
            .map_err(|e| EmailError::SesError(format!("Failed to build subject: {}", e)))?;

        let body_content = Content::builder()
            .data(html_body)
            .charset("UTF-8")
            .build()
            .map_err(|e| EmailError::SesError(format!("Failed to build body: {}", e)))?;

        let message = Message::builder()
            .subject(subject_content)
            .body(SesBody::builder().html(body_content).build())
            .build();

        let result = self
            .client
            .send_email()
            .from_email_address(&self.from_email)
            .destination(destination)
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, to = %safe_email_log(to), "Failed to send email via SES");
                EmailError::SesError(format!("Send failed: {}", e))
            })?;

        info!(
            to = %safe_email_log(to),
            message_id = ?result.message_id(),
            "Email sent successfully via SES"
        );

        Ok(())
    }
}

// ---- Message kinds and templates ----

/// Every email this service ever sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Verification,
    SignUpMagicLink,
    LoginMagicLink,
}

impl EmailKind {
    pub fn subject(&self) -> &'static str {
        match self {
            EmailKind::Verification => "Verify your email address",
            EmailKind::SignUpMagicLink => "Finish creating your account",
            EmailKind::LoginMagicLink => "Your sign-in link",
        }
    }

    /// HTML body with the callback `link` embedded.
    pub fn render(&self, link: &str) -> String {
        match self {
            EmailKind::Verification => format!(
                r#"<html>
  <body>
    <p>Welcome! Please confirm your email address by clicking the link below.</p>
    <p><a href="{link}">Verify my email</a></p>
    <p>This link is valid for 24 hours. If you did not create an account, you can ignore this email.</p>
  </body>
</html>"#
            ),
            EmailKind::SignUpMagicLink => format!(
                r#"<html>
  <body>
    <p>Click the link below to create your account and sign in.</p>
    <p><a href="{link}">Create my account</a></p>
    <p>This link is valid for 10 minutes. If you did not request it, you can ignore this email.</p>
  </body>
</html>"#
            ),
            EmailKind::LoginMagicLink => format!(
                r#"<html>
  <body>
    <p>Click the link below to sign in.</p>
    <p><a href="{link}">Sign in</a></p>
    <p>This link is valid for 10 minutes. If you did not request it, you can ignore this email.</p>
  </body>
</html>"#
            ),
        }
    }
}
