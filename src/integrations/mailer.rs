use crate::config::EmailConfig;
use crate::db::models::{DbContact, DbTestDrive, DbTransaction};
use crate::error::StoreError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sesv2::Client as SesClient;
use aws_sdk_sesv2::config::Region;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), StoreError>;
}

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), StoreError> {
        info!(to = ?email.to, subject = %email.subject, "email suppressed (delivery disabled)");
        debug!(body = %email.text);
        Ok(())
    }
}

/// AWS SES v2 sender; credentials come from the default AWS provider chain.
pub struct SesMailer {
    client: SesClient,
    from: String,
}

impl SesMailer {
    pub async fn from_env(cfg: &EmailConfig) -> Self {
        let aws_cfg = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .load()
            .await;
        Self {
            client: SesClient::new(&aws_cfg),
            from: cfg.from.clone(),
        }
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, email: Email) -> Result<(), StoreError> {
        let subject = Content::builder()
            .data(&email.subject)
            .charset("UTF-8")
            .build()
            .map_err(|e| StoreError::Email(e.to_string()))?;
        let text = Content::builder()
            .data(&email.text)
            .charset("UTF-8")
            .build()
            .map_err(|e| StoreError::Email(e.to_string()))?;
        let message = Message::builder()
            .subject(subject)
            .body(Body::builder().text(text).build())
            .build();

        let out = self
            .client
            .send_email()
            .from_email_address(&self.from)
            .destination(
                Destination::builder()
                    .set_to_addresses(Some(email.to.clone()))
                    .build(),
            )
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| StoreError::Email(format!("{e:?}")))?;
        info!(
            to = ?email.to,
            message_id = out.message_id().unwrap_or("-"),
            "email sent via SES"
        );
        Ok(())
    }
}

fn money(amount: i64, currency: &str) -> String {
    format!("{currency} {}.{:02}", amount / 100, amount % 100)
}

pub fn contact_notification(to: &[String], c: &DbContact) -> Email {
    Email {
        to: to.to_vec(),
        subject: format!("New enquiry from {}", c.name),
        text: format!(
            "Name: {}\nEmail: {}\nPhone: {}\nCity: {}\nSource: {}\n\n{}\n\nReceived: {}",
            c.name,
            c.email,
            c.phone,
            c.city.as_deref().unwrap_or("-"),
            c.source.as_deref().unwrap_or("-"),
            c.message,
            c.created_at.to_rfc3339(),
        ),
    }
}

pub fn contact_ack(c: &DbContact) -> Email {
    Email {
        to: vec![c.email.clone()],
        subject: "We received your enquiry".to_string(),
        text: format!(
            "Hi {},\n\nThanks for getting in touch. Our team will call you on {} shortly.\n\nReference: C-{}",
            c.name, c.phone, c.id
        ),
    }
}

pub fn test_ride_notification(to: &[String], t: &DbTestDrive, dealer: Option<&str>) -> Email {
    Email {
        to: to.to_vec(),
        subject: format!("Test ride request: {} ({})", t.name, t.city),
        text: format!(
            "Name: {}\nEmail: {}\nPhone: {}\nCity: {}\nDealership: {}\nVariant: {}\nDate: {}\nSlot: {}",
            t.name,
            t.email,
            t.phone,
            t.city,
            dealer.unwrap_or("-"),
            t.variant.map(|v| v.code()).unwrap_or("-"),
            t.preferred_date,
            t.preferred_slot.as_deref().unwrap_or("any"),
        ),
    }
}

pub fn test_ride_ack(t: &DbTestDrive) -> Email {
    Email {
        to: vec![t.email.clone()],
        subject: "Your test ride request".to_string(),
        text: format!(
            "Hi {},\n\nYour test ride for {} in {} is requested. We will confirm the slot on {}.\n\nReference: T-{}",
            t.name, t.preferred_date, t.city, t.phone, t.id
        ),
    }
}

pub fn booking_notification(to: &[String], tx: &DbTransaction) -> Email {
    Email {
        to: to.to_vec(),
        subject: format!("Booking paid: {} {} ({})", tx.variant, tx.colour, tx.order_ref),
        text: format!(
            "Order: {}\nPayment: {}\nAmount: {}\nName: {}\nEmail: {}\nPhone: {}\nCity: {} {}\nVariant: {}\nColour: {}",
            tx.order_ref,
            tx.payment_id.as_deref().unwrap_or("-"),
            money(tx.amount, &tx.currency),
            tx.name,
            tx.email,
            tx.phone,
            tx.city,
            tx.pincode,
            tx.variant,
            tx.colour,
        ),
    }
}

pub fn booking_confirmation(tx: &DbTransaction) -> Email {
    Email {
        to: vec![tx.email.clone()],
        subject: format!("Booking confirmed: {}", tx.order_ref),
        text: format!(
            "Hi {},\n\nYour {} in {} is booked. We received {}.\n\nOrder reference: {}\nPayment id: {}",
            tx.name,
            tx.variant.display_name(),
            tx.colour,
            money(tx.amount, &tx.currency),
            tx.order_ref,
            tx.payment_id.as_deref().unwrap_or("-"),
        ),
    }
}
