use anyhow::Context;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use uuid::Uuid;

use crate::config::Config;
use crate::models::menu::MenuCorpus;
use crate::services::digest::{self, DigestMailer};

pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    base_url: String,
}

impl EmailService {
    /// Returns None if SMTP is not configured. Credentials are optional.
    pub fn new(config: &Config) -> Option<Self> {
        let host = config.smtp_host.as_deref()?;
        let from_addr = config.smtp_from.as_deref()?;
        let port = config.smtp_port.unwrap_or(587);

        let creds = match (&config.smtp_username, &config.smtp_password) {
            (Some(user), Some(pass)) => Some(Credentials::new(user.clone(), pass.clone())),
            _ => None,
        };

        let mut builder = match port {
            465 => AsyncSmtpTransport::<Tokio1Executor>::relay(host).ok()?,
            25 => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
            _ => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host).ok()?,
        }
        .port(port);
        if let Some(creds) = creds {
            builder = builder.credentials(creds);
        }

        let from: Mailbox = from_addr.parse().ok()?;

        Some(Self {
            transport: builder.build(),
            from,
            base_url: config.app_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn new_message_id(&self) -> String {
        format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain())
    }

    async fn send_text(&self, to_email: &str, subject: &str, text: &str) -> anyhow::Result<()> {
        let to: Mailbox = to_email
            .parse()
            .with_context(|| format!("Invalid recipient address {to_email}"))?;

        let email = Message::builder()
            .message_id(Some(self.new_message_id()))
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(text.to_string())
            .context("Failed to build email message")?;

        self.transport
            .send(email)
            .await
            .context("Failed to send email")?;

        Ok(())
    }

    pub fn login_url(&self, email: &str, key: &str) -> String {
        format!("{}/login/{email}/{key}", self.base_url)
    }

    pub fn delete_url(&self, email: &str, del_key: &str) -> String {
        format!("{}/del/{email}/{del_key}", self.base_url)
    }

    pub async fn send_login(&self, email: &str, key: &str) -> anyhow::Result<()> {
        let text = format!("{}\n", self.login_url(email, key));
        let subject = format!("Login link for {}", self.base_url);
        self.send_text(email, &subject, &text).await
    }

    pub async fn send_delete(&self, email: &str, del_key: &str) -> anyhow::Result<()> {
        let text = format!("{}\n", self.delete_url(email, del_key));
        let subject = format!("Deletion link for {}", self.base_url);
        self.send_text(email, &subject, &text).await
    }
}

impl DigestMailer for EmailService {
    async fn send_results(&self, email: &str, results: &MenuCorpus) -> anyhow::Result<()> {
        let text = digest::compose(email, results);
        self.send_text(email, digest::SUBJECT, &text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let mut config = crate::test_support::test_config(std::path::Path::new("./data"));
        config.smtp_host = Some("smtp.example.org".into());
        config.smtp_port = Some(587);
        config.smtp_from = Some("Mensa <mensa@example.org>".into());
        config
    }

    #[test]
    fn test_not_configured_without_host() {
        let mut config = config();
        config.smtp_host = None;
        assert!(EmailService::new(&config).is_none());
    }

    #[test]
    fn test_links() {
        let email = EmailService::new(&config()).unwrap();
        assert_eq!(
            email.login_url("alice@example.com", "abc"),
            "https://mensa.example.org/login/alice@example.com/abc"
        );
        assert_eq!(
            email.delete_url("alice@example.com", "xyz"),
            "https://mensa.example.org/del/alice@example.com/xyz"
        );
        assert!(email.new_message_id().ends_with("@example.org>"));
    }
}
