//! SMTP email channel built on lettre.
//!
//! The transport is built lazily on first send and reused for every
//! later dispatch. TLS mode follows the configured port: the standard
//! secure SMTP port gets implicit TLS, everything else requires a
//! STARTTLS upgrade.

use super::{EmailMessage, EmailTransport, SentMessage};
use crate::error::{NotificationError, NotificationResult};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Standard implicit-TLS SMTP port.
const SMTPS_PORT: u16 = 465;

/// SMTP configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server host.
    pub host: String,
    /// SMTP server port; 465 selects implicit TLS, anything else
    /// requires a STARTTLS upgrade.
    pub port: u16,
    /// Sender email address.
    pub from_email: String,
    /// Sender display name.
    pub from_name: String,
    /// SMTP username (optional for dev relays).
    pub username: Option<String>,
    /// SMTP password (optional for dev relays).
    pub password: Option<String>,
    /// Allow a plaintext connection. Dev/test relays only.
    pub allow_insecure: bool,
}

impl SmtpConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        from_email: impl Into<String>,
        from_name: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            from_email: from_email.into(),
            from_name: from_name.into(),
            username: None,
            password: None,
            allow_insecure: false,
        }
    }

    /// Load the channel configuration from the environment.
    ///
    /// - `EMAIL_HOST` (required)
    /// - `EMAIL_PORT` (default 587)
    /// - `EMAIL_USER` / `EMAIL_PASS` (optional credentials)
    /// - `EMAIL_FROM` (defaults to `EMAIL_USER`)
    /// - `EMAIL_FROM_NAME` (default "Campus Notifications")
    /// - `EMAIL_ALLOW_INSECURE` (default false)
    pub fn from_env() -> NotificationResult<Self> {
        let host = std::env::var("EMAIL_HOST")
            .map_err(|_| NotificationError::Config("EMAIL_HOST is required".to_string()))?;

        let port: u16 = std::env::var("EMAIL_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse()
            .map_err(|e| NotificationError::Config(format!("invalid EMAIL_PORT: {}", e)))?;

        let username = std::env::var("EMAIL_USER").ok();
        let password = std::env::var("EMAIL_PASS").ok();

        let from_email = std::env::var("EMAIL_FROM")
            .ok()
            .or_else(|| username.clone())
            .unwrap_or_else(|| "noreply@localhost".to_string());
        let from_name = std::env::var("EMAIL_FROM_NAME")
            .unwrap_or_else(|_| "Campus Notifications".to_string());

        let allow_insecure = std::env::var("EMAIL_ALLOW_INSECURE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            host,
            port,
            from_email,
            from_name,
            username,
            password,
            allow_insecure,
        })
    }

    /// Builder method to set credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Builder method to allow plaintext connections (dev/test relays).
    pub fn with_allow_insecure(mut self, allow: bool) -> Self {
        self.allow_insecure = allow;
        self
    }
}

/// SMTP email channel with a single long-lived transport.
pub struct SmtpChannel {
    config: Arc<SmtpConfig>,
    transport: OnceCell<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpChannel {
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            config: Arc::new(config),
            transport: OnceCell::new(),
        }
    }

    /// Create a channel configured from the environment.
    pub fn from_env() -> NotificationResult<Self> {
        Ok(Self::new(SmtpConfig::from_env()?))
    }

    /// Get the shared transport, building it on first use.
    fn transport(&self) -> NotificationResult<&AsyncSmtpTransport<Tokio1Executor>> {
        self.transport
            .get_or_try_init(|| Self::build_transport(&self.config))
    }

    /// Build the SMTP transport based on configuration.
    fn build_transport(
        config: &SmtpConfig,
    ) -> NotificationResult<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder = if config.allow_insecure {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        } else if config.port == SMTPS_PORT {
            // Implicit TLS on the standard secure port
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host).map_err(|e| {
                NotificationError::Config(format!("Failed to create SMTP relay: {}", e))
            })?
        } else {
            // Mandatory opportunistic upgrade everywhere else
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host).map_err(|e| {
                NotificationError::Config(format!("Failed to create STARTTLS relay: {}", e))
            })?
        };

        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }

    /// Build a lettre Message from an EmailMessage.
    fn build_message(&self, email: &EmailMessage) -> NotificationResult<Message> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| NotificationError::Config(format!("Invalid from address: {}", e)))?;

        let to: Mailbox = email.to.parse()?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html.clone()),
                    ),
            )?;

        Ok(message)
    }
}

#[async_trait]
impl EmailTransport for SmtpChannel {
    async fn send(&self, message: &EmailMessage) -> NotificationResult<SentMessage> {
        debug!(
            to = %message.to,
            subject = %message.subject,
            host = %self.config.host,
            port = %self.config.port,
            "Sending email via SMTP"
        );

        let mail = self.build_message(message)?;

        let response = self.transport()?.send(mail).await.map_err(|e| {
            error!(
                to = %message.to,
                error = %e,
                "Failed to send email via SMTP"
            );
            NotificationError::Delivery(format!("SMTP send failed: {}", e))
        })?;

        let message_id = response.message().next().map(|s| s.to_string());

        info!(
            to = %message.to,
            message_id = ?message_id,
            "Email sent successfully via SMTP"
        );

        Ok(SentMessage { message_id })
    }

    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn health_check(&self) -> NotificationResult<bool> {
        self.transport()?
            .test_connection()
            .await
            .map_err(|e| NotificationError::Delivery(format!("SMTP health check failed: {}", e)))
    }
}

// The transport itself is not Clone; clones share the config and build
// their own transport lazily.
impl Clone for SmtpChannel {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            transport: OnceCell::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smtp_config_new() {
        let config = SmtpConfig::new("mail.example.com", 587, "noreply@example.com", "Campus");
        assert_eq!(config.host, "mail.example.com");
        assert_eq!(config.port, 587);
        assert!(!config.allow_insecure);
        assert!(config.username.is_none());
    }

    #[test]
    fn test_smtp_config_builders() {
        let config = SmtpConfig::new("localhost", 1025, "noreply@localhost", "Dev")
            .with_credentials("user", "pass")
            .with_allow_insecure(true);

        assert_eq!(config.username.as_deref(), Some("user"));
        assert_eq!(config.password.as_deref(), Some("pass"));
        assert!(config.allow_insecure);
    }

    #[test]
    fn test_smtp_config_from_env() {
        temp_env::with_vars(
            [
                ("EMAIL_HOST", Some("smtp.campus.test")),
                ("EMAIL_PORT", Some("465")),
                ("EMAIL_USER", Some("mailer@campus.test")),
                ("EMAIL_PASS", Some("secret")),
                ("EMAIL_FROM", None),
                ("EMAIL_FROM_NAME", None),
            ],
            || {
                let config = SmtpConfig::from_env().unwrap();
                assert_eq!(config.host, "smtp.campus.test");
                assert_eq!(config.port, 465);
                // from falls back to the authenticated user
                assert_eq!(config.from_email, "mailer@campus.test");
                assert_eq!(config.from_name, "Campus Notifications");
                assert!(!config.allow_insecure);
            },
        );
    }

    #[test]
    fn test_smtp_config_from_env_requires_host() {
        temp_env::with_var_unset("EMAIL_HOST", || {
            let err = SmtpConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("EMAIL_HOST"));
        });
    }

    #[test]
    fn test_smtp_config_from_env_rejects_bad_port() {
        temp_env::with_vars(
            [
                ("EMAIL_HOST", Some("smtp.campus.test")),
                ("EMAIL_PORT", Some("not-a-port")),
            ],
            || {
                assert!(SmtpConfig::from_env().is_err());
            },
        );
    }

    #[test]
    fn test_build_message_has_subject_and_recipient() {
        let channel = SmtpChannel::new(SmtpConfig::new(
            "localhost",
            1025,
            "noreply@campus.test",
            "Campus",
        ));

        let message = channel
            .build_message(&EmailMessage {
                to: "student@campus.test".to_string(),
                subject: "Assignment graded".to_string(),
                text: "Your assignment has been graded".to_string(),
                html: "<p>Your assignment has been graded</p>".to_string(),
            })
            .unwrap();

        let rendered = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(rendered.contains("Subject: Assignment graded"));
        assert!(rendered.contains("student@campus.test"));
    }

    #[test]
    fn test_build_message_rejects_invalid_recipient() {
        let channel = SmtpChannel::new(SmtpConfig::new(
            "localhost",
            1025,
            "noreply@campus.test",
            "Campus",
        ));

        let result = channel.build_message(&EmailMessage {
            to: "not-an-address".to_string(),
            ..Default::default()
        });

        assert!(matches!(
            result,
            Err(NotificationError::InvalidRecipient(_))
        ));
    }
}
