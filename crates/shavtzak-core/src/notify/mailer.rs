use std::future::Future;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

use crate::models::ReportSettings;

/// Port for implicit TLS; any other port negotiates STARTTLS.
const SMTPS_PORT: u16 = 465;

/// Maximum messages in flight when mailing several recipients.
const MAX_CONCURRENT_SENDS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sender mailbox, e.g. `Shavtzak <roster@unit.il>`
    pub from: String,
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse()
        .with_context(|| format!("Invalid email address '{}'", address))
}

pub fn report_subject(settings: &ReportSettings) -> String {
    format!("{} - {}", settings.title, settings.date.format("%d/%m/%Y"))
}

pub fn report_message(from: &Mailbox, to: &str, settings: &ReportSettings, body: &str) -> Result<Message> {
    Message::builder()
        .from(from.clone())
        .to(parse_mailbox(to)?)
        .subject(report_subject(settings))
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .context("Failed to build report email")
}

pub fn verification_message(from: &Mailbox, to: &str, code: &str) -> Result<Message> {
    Message::builder()
        .from(from.clone())
        .to(parse_mailbox(to)?)
        .subject("Shavtzak verification code")
        .header(ContentType::TEXT_PLAIN)
        .body(format!(
            "Your verification code is: {}\nThis code will expire in 10 minutes.",
            code
        ))
        .context("Failed to build verification email")
}

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let builder = if settings.port == SMTPS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
        }
        .with_context(|| format!("Failed to set up SMTP relay {}", settings.host))?
        .port(settings.port);

        let builder = match (&settings.username, &settings.password) {
            (Some(user), Some(password)) => {
                builder.credentials(Credentials::new(user.clone(), password.clone()))
            }
            _ => {
                debug!(host = %settings.host, "SMTP without credentials");
                builder
            }
        };

        Ok(Self {
            transport: builder.build(),
            from: parse_mailbox(&settings.from)?,
        })
    }

    pub fn sender(&self) -> &Mailbox {
        &self.from
    }

    async fn send(&self, message: Message) -> Result<()> {
        self.transport
            .send(message)
            .await
            .context("SMTP send failed")?;
        Ok(())
    }

    /// Mail the report to every recipient. Returns how many were sent;
    /// fails only if none went out. A malformed address counts as a failure
    /// for that recipient alone.
    pub async fn send_report(
        &self,
        recipients: &[String],
        settings: &ReportSettings,
        body: &str,
    ) -> Result<usize> {
        self.send_report_with(recipients, settings, body, |message| self.send(message))
            .await
    }

    async fn send_report_with<F, Fut>(
        &self,
        recipients: &[String],
        settings: &ReportSettings,
        body: &str,
        send: F,
    ) -> Result<usize>
    where
        F: Fn(Message) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        if recipients.is_empty() {
            anyhow::bail!("No report recipients configured");
        }

        let sends: Vec<_> = recipients
            .iter()
            .map(|to| {
                let message = report_message(&self.from, to, settings, body);
                let send = &send;
                async move {
                    let result = match message {
                        Ok(message) => send(message).await,
                        Err(e) => Err(e),
                    };
                    (to.as_str(), result)
                }
            })
            .collect();
        let results: Vec<(&str, Result<()>)> = stream::iter(sends)
            .buffer_unordered(MAX_CONCURRENT_SENDS)
            .collect()
            .await;

        let mut sent = 0;
        let mut last_error = None;
        for (to, result) in results {
            match result {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(to, error = %e, "Failed to send report");
                    last_error = Some(e);
                }
            }
        }

        match (sent, last_error) {
            (0, Some(e)) => Err(e),
            _ => {
                info!(sent, total = recipients.len(), "Report emailed");
                Ok(sent)
            }
        }
    }

    pub async fn send_verification_code(&self, to: &str, code: &str) -> Result<()> {
        let message = verification_message(&self.from, to, code)?;
        self.send(message).await?;
        info!(to, "Verification code sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sender() -> Mailbox {
        "Shavtzak <roster@unit.il>".parse().unwrap()
    }

    #[test]
    fn test_report_message() {
        let settings = ReportSettings::for_date(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        let message = report_message(&sender(), " cmd@unit.il ", &settings, "body").unwrap();

        let to: Vec<String> = message.envelope().to().iter().map(|a| a.to_string()).collect();
        assert_eq!(to, vec!["cmd@unit.il"]);
        assert_eq!(
            message.envelope().from().map(|a| a.to_string()).as_deref(),
            Some("roster@unit.il")
        );
        assert_eq!(report_subject(&settings), "שבצ״ק - 07/03/2024");
    }

    #[test]
    fn test_verification_message() {
        let message = verification_message(&sender(), "dana@unit.il", "042137").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("042137"));
        assert!(raw.contains("Subject: Shavtzak verification code"));
    }

    fn mailer() -> Mailer {
        Mailer::new(&SmtpSettings {
            host: "localhost".to_string(),
            port: 2525,
            username: None,
            password: None,
            from: "Shavtzak <roster@unit.il>".to_string(),
        })
        .unwrap()
    }

    fn accept(_: Message) -> std::future::Ready<Result<()>> {
        std::future::ready(Ok(()))
    }

    #[tokio::test]
    async fn test_bad_address_does_not_stop_other_recipients() {
        let settings = ReportSettings::for_date(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        let recipients = vec!["not-an-address".to_string(), "cmd@unit.il".to_string()];
        let delivered = std::sync::Mutex::new(Vec::new());

        let sent = mailer()
            .send_report_with(&recipients, &settings, "body", |message| {
                let to: Vec<String> =
                    message.envelope().to().iter().map(|a| a.to_string()).collect();
                delivered.lock().unwrap().extend(to);
                async { Ok::<(), anyhow::Error>(()) }
            })
            .await
            .unwrap();

        assert_eq!(sent, 1);
        assert_eq!(*delivered.lock().unwrap(), vec!["cmd@unit.il".to_string()]);
    }

    #[tokio::test]
    async fn test_report_fails_when_nothing_sent() {
        let settings = ReportSettings::for_date(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        let recipients = vec!["not-an-address".to_string()];

        let err = mailer()
            .send_report_with(&recipients, &settings, "body", accept)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid email address"));

        let err = mailer()
            .send_report_with(&[], &settings, "body", accept)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No report recipients"));
    }

    #[test]
    fn test_invalid_recipient() {
        let err = verification_message(&sender(), "not-an-address", "1").unwrap_err();
        assert!(err.to_string().contains("Invalid email address"));
    }
}
