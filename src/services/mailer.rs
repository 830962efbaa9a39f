use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::{config::MailConfig, error::AppResult};

/// Outgoing notification emails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mail {
    Verification { to: String, link: String },
    TwoFactorCode { to: String, code: String },
    RequestApproved { to: String, room_title: String },
}

impl Mail {
    pub fn to(&self) -> &str {
        match self {
            Mail::Verification { to, .. }
            | Mail::TwoFactorCode { to, .. }
            | Mail::RequestApproved { to, .. } => to,
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Mail::Verification { .. } => "Confirma tu correo",
            Mail::TwoFactorCode { .. } => "Código de verificación",
            Mail::RequestApproved { .. } => "Tu solicitud fue aprobada",
        }
    }

    pub fn html(&self) -> String {
        match self {
            Mail::Verification { link, .. } => format!(
                "<p>Haz click <a href=\"{}\">aquí</a> para confirmar tu correo.</p>",
                escape_html(link)
            ),
            Mail::TwoFactorCode { code, .. } => {
                format!("<p>Tu código de verificación es: {}</p>", escape_html(code))
            }
            Mail::RequestApproved { room_title, .. } => format!(
                "<p>El arrendador aprobó tu solicitud para <strong>{}</strong>. Ya puedes chatear con él.</p>",
                escape_html(room_title)
            ),
        }
    }
}

/// Escapes text interpolated into mail bodies; room titles are written by
/// landlords and read by tenants.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: Mail) -> AppResult<()>;
}

/// Writes mail to the log. Used in development so codes can be read from
/// the server output.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: Mail) -> AppResult<()> {
        match &mail {
            Mail::Verification { to, link } => {
                tracing::info!(to = %to, link = %link, "verification email");
            }
            Mail::TwoFactorCode { to, code } => {
                tracing::info!(to = %to, code = %code, "two-factor email");
            }
            Mail::RequestApproved { to, room_title } => {
                tracing::info!(to = %to, room = %room_title, "request approved email");
            }
        }
        Ok(())
    }
}

/// Delivers mail through the HTTP mail relay at `MAIL_SERVICE_URL`.
pub struct HttpMailer {
    http: reqwest::Client,
    url: String,
    sender: String,
}

impl HttpMailer {
    pub fn new(url: String, sender: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            sender,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: Mail) -> AppResult<()> {
        let body = json!({
            "from": self.sender,
            "to": mail.to(),
            "subject": mail.subject(),
            "html": mail.html(),
        });

        self.http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| anyhow::anyhow!("Failed to send email: {}", e))?;

        tracing::debug!(to = %mail.to(), subject = mail.subject(), "email sent");
        Ok(())
    }
}

pub fn from_config(config: &MailConfig, development: bool) -> Arc<dyn Mailer> {
    match &config.service_url {
        Some(url) if !development => {
            Arc::new(HttpMailer::new(url.clone(), config.sender.clone()))
        }
        _ => Arc::new(LogMailer),
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<Mail>>,
    }

    impl RecordingMailer {
        pub async fn sent(&self) -> Vec<Mail> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, mail: Mail) -> AppResult<()> {
            self.sent.lock().await.push(mail);
            Ok(())
        }
    }
}
