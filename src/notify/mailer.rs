//! SMTP mail sender shared by the error notifier and request handlers.

use anyhow::{anyhow, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use tracing::info;

use crate::core::config::MailConfig;

#[derive(Clone)]
pub struct Mailer {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl Mailer {
    pub fn new(
        server: &str,
        port: u16,
        use_tls: bool,
        credentials: Option<(String, String)>,
        from: &str,
    ) -> Result<Self> {
        let builder = if use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(server)
        };
        let builder = builder.port(port);
        let builder = match credentials {
            Some((username, password)) => builder.credentials(Credentials::new(username, password)),
            None => builder,
        };

        let from: Mailbox = from
            .parse()
            .map_err(|e| anyhow!("Invalid sender address {}: {}", from, e))?;

        info!(host = %server, port = port, tls = use_tls, "Mail sender initialized");
        Ok(Self {
            transport: Arc::new(builder.build()),
            from,
        })
    }

    /// `None` when no mail server is configured.
    pub fn from_config(config: &MailConfig) -> Result<Option<Self>> {
        let Some(server) = config.server.as_deref() else {
            return Ok(None);
        };
        Self::new(
            server,
            config.port,
            config.use_tls,
            config.credentials(),
            &config.sender(),
        )
        .map(Some)
    }

    pub async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<()> {
        let recipients: Vec<Mailbox> = to.iter().filter_map(|s| s.parse().ok()).collect();
        if recipients.is_empty() {
            return Err(anyhow!("No valid recipient addresses"));
        }

        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for mailbox in recipients {
            builder = builder.to(mailbox);
        }
        let email = builder
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        self.transport.send(email).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail_config(server: Option<&str>) -> MailConfig {
        MailConfig {
            server: server.map(str::to_string),
            port: 25,
            use_tls: false,
            username: None,
            password: None,
        }
    }

    #[test]
    fn no_server_means_no_mailer() {
        assert!(Mailer::from_config(&mail_config(None)).unwrap().is_none());
    }

    #[tokio::test]
    async fn server_builds_a_mailer() {
        assert!(Mailer::from_config(&mail_config(Some("localhost"))).unwrap().is_some());
    }

    #[tokio::test]
    async fn non_address_login_still_builds_a_mailer() {
        let config = MailConfig {
            username: Some("apikey".to_string()),
            password: Some("secret".to_string()),
            ..mail_config(Some("smtp.sendgrid.net"))
        };
        let mailer = Mailer::from_config(&config).unwrap().unwrap();
        assert_eq!(mailer.from.email.to_string(), "no-reply@localhost");
    }

    #[tokio::test]
    async fn invalid_recipients_are_rejected_before_sending() {
        let mailer = Mailer::from_config(&mail_config(Some("localhost"))).unwrap().unwrap();
        let err = mailer
            .send(&["not an address".to_string()], "subject", "body")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No valid recipient"));
    }
}
