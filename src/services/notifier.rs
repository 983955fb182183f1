use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use thiserror::Error;

use crate::models::StoredListing;

/// Errors that can occur while delivering alerts
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("No recipients configured for agent {0}")]
    NoRecipients(String),

    #[error("Invalid email address {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    MessageError(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    SmtpError(#[from] lettre::transport::smtp::Error),
}

/// Newly persisted matches for one agent, best score first
#[derive(Debug, Clone, Serialize)]
pub struct AlertBatch {
    pub agent_id: String,
    pub agent_name: String,
    pub recipients: Vec<String>,
    pub listings: Vec<StoredListing>,
}

impl AlertBatch {
    pub fn new(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        recipients: Vec<String>,
        mut listings: Vec<StoredListing>,
    ) -> Self {
        listings.sort_by(|a, b| {
            b.match_score
                .partial_cmp(&a.match_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            recipients,
            listings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn subject(&self) -> String {
        format!(
            "New Matches for {}: {} vehicles found",
            self.agent_name,
            self.listings.len()
        )
    }

    /// One human-readable line per listing
    pub fn summary_lines(&self) -> Vec<String> {
        self.listings
            .iter()
            .map(|l| {
                let price = l
                    .price
                    .map(|p| format!("${:.0}", p))
                    .unwrap_or_else(|| "Contact for Price".to_string());
                let mileage = l
                    .mileage
                    .map(|m| format!("{} miles", m))
                    .unwrap_or_else(|| "N/A".to_string());
                format!(
                    "[{:.1}] {} | {} | {} | {} | {}",
                    l.match_score, l.title, price, mileage, l.source, l.url
                )
            })
            .collect()
    }

    /// HTML body with one entry per listing
    pub fn html_body(&self) -> String {
        let mut html = format!("<h2>New Vehicle Matches for {}</h2><ul>", escape_html(&self.agent_name));
        for l in &self.listings {
            let year = l.year.map(|y| format!("{} ", y)).unwrap_or_default();
            let price = l
                .price
                .map(|p| format!("${:.2}", p))
                .unwrap_or_else(|| "Contact for Price".to_string());
            let mileage = l
                .mileage
                .map(|m| format!("{} miles", m))
                .unwrap_or_else(|| "N/A".to_string());
            html.push_str(&format!(
                "<li><strong>{}{}</strong><br>Price: {} | Mileage: {}<br>Source: {}<br><a href=\"{}\">View Listing</a></li><hr>",
                year,
                escape_html(&l.title),
                price,
                mileage,
                escape_html(&l.source),
                escape_html(&l.url),
            ));
        }
        html.push_str("</ul>");
        html
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Delivery channel for new-match alerts
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, batch: &AlertBatch) -> Result<(), NotifyError>;
}

/// Delivers alerts as structured log events
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, batch: &AlertBatch) -> Result<(), NotifyError> {
        if batch.recipients.is_empty() {
            return Err(NotifyError::NoRecipients(batch.agent_id.clone()));
        }

        tracing::info!(
            agent_id = %batch.agent_id,
            recipients = ?batch.recipients,
            count = batch.listings.len(),
            "{}",
            batch.subject()
        );
        for line in batch.summary_lines() {
            tracing::info!(agent_id = %batch.agent_id, "{}", line);
        }

        Ok(())
    }
}

/// Emails alerts through an SMTP relay
///
/// Port 465 uses implicit TLS, 587 uses STARTTLS and anything else talks
/// plain SMTP (local relays and test servers).
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(host: &str, port: u16, username: &str, password: &str) -> Result<Self, NotifyError> {
        let from = parse_mailbox(username)?;
        let credentials = Credentials::new(username.to_string(), password.to_string());

        let builder = match port {
            465 => AsyncSmtpTransport::<Tokio1Executor>::relay(host)?,
            587 => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?,
            _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        };

        Ok(Self {
            transport: builder.port(port).credentials(credentials).build(),
            from,
        })
    }

    /// Render a batch into a multipart (plain + HTML) message
    pub fn build_message(&self, batch: &AlertBatch) -> Result<Message, NotifyError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(batch.subject());
        for recipient in &batch.recipients {
            builder = builder.to(parse_mailbox(recipient)?);
        }

        let plain = batch.summary_lines().join("\n");
        Ok(builder.multipart(MultiPart::alternative_plain_html(plain, batch.html_body()))?)
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .trim()
        .parse()
        .map_err(|_| NotifyError::InvalidAddress(address.to_string()))
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, batch: &AlertBatch) -> Result<(), NotifyError> {
        if batch.recipients.is_empty() {
            return Err(NotifyError::NoRecipients(batch.agent_id.clone()));
        }
        if batch.is_empty() {
            return Ok(());
        }

        let message = self.build_message(batch)?;
        self.transport.send(message).await?;

        tracing::info!(
            agent_id = %batch.agent_id,
            to = ?batch.recipients,
            count = batch.listings.len(),
            "Alert email sent"
        );
        Ok(())
    }
}
