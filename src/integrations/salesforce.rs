use crate::config::SalesforceConfig;
use crate::db::models::{DbContact, DbTestDrive, DbTransaction, LeadKind};
use crate::error::StoreError;
use crate::integrations::default_retry_policy;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::time::Duration;
use tracing::{info, warn};

/// Flattened view of any lead row, as the CRM sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadRecord {
    pub kind: LeadKind,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: Option<String>,
    pub description: String,
    /// Logical attribute name -> value; mapped to Salesforce field ids via config.
    pub attributes: Vec<(&'static str, String)>,
}

impl LeadRecord {
    pub fn from_contact(c: &DbContact) -> Self {
        let mut attributes = vec![("form", LeadKind::Contact.label().to_string())];
        if let Some(source) = &c.source {
            attributes.push(("source", source.clone()));
        }
        Self {
            kind: LeadKind::Contact,
            name: c.name.clone(),
            email: c.email.clone(),
            phone: c.phone.clone(),
            city: c.city.clone(),
            description: c.message.clone(),
            attributes,
        }
    }

    pub fn from_test_drive(t: &DbTestDrive, dealer: Option<&str>) -> Self {
        let mut attributes = vec![
            ("form", LeadKind::TestRide.label().to_string()),
            ("preferred_date", t.preferred_date.to_string()),
        ];
        if let Some(v) = t.variant {
            attributes.push(("variant", v.code().to_string()));
        }
        if let Some(slot) = &t.preferred_slot {
            attributes.push(("preferred_slot", slot.clone()));
        }
        if let Some(dealer) = dealer {
            attributes.push(("dealership", dealer.to_string()));
        }
        Self {
            kind: LeadKind::TestRide,
            name: t.name.clone(),
            email: t.email.clone(),
            phone: t.phone.clone(),
            city: Some(t.city.clone()),
            description: format!("Test ride requested for {}", t.preferred_date),
            attributes,
        }
    }

    pub fn from_transaction(tx: &DbTransaction, dealer: Option<&str>) -> Self {
        let mut attributes = vec![
            ("form", LeadKind::Booking.label().to_string()),
            ("variant", tx.variant.code().to_string()),
            ("colour", tx.colour.clone()),
            ("order_ref", tx.order_ref.clone()),
            ("pincode", tx.pincode.clone()),
        ];
        if let Some(dealer) = dealer {
            attributes.push(("dealership", dealer.to_string()));
        }
        Self {
            kind: LeadKind::Booking,
            name: tx.name.clone(),
            email: tx.email.clone(),
            phone: tx.phone.clone(),
            city: Some(tx.city.clone()),
            description: format!(
                "Paid booking {} for {} ({})",
                tx.order_ref, tx.variant, tx.colour
            ),
            attributes,
        }
    }
}

#[async_trait]
pub trait CrmSink: Send + Sync {
    async fn submit(&self, lead: &LeadRecord) -> Result<(), StoreError>;
}

/// Salesforce Web-to-Lead form poster.
pub struct WebToLead {
    client: reqwest::Client,
    cfg: SalesforceConfig,
    retry_policy: ExponentialBuilder,
}

impl WebToLead {
    pub fn new(client: reqwest::Client, cfg: SalesforceConfig) -> Self {
        Self {
            client,
            cfg,
            retry_policy: default_retry_policy(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: ExponentialBuilder) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    async fn post_once(&self, form: &[(String, String)]) -> Result<(), StoreError> {
        let resp = self
            .client
            .post(self.cfg.endpoint.clone())
            .form(form)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(StoreError::UpstreamStatus {
                service: "salesforce",
                status,
            });
        }
        Ok(())
    }
}

/// Web-to-Lead needs `last_name`; a single-word name goes there.
pub fn split_name(full: &str) -> (&str, &str) {
    let full = full.trim();
    match full.rsplit_once(' ') {
        Some((first, last)) => (first.trim(), last),
        None => ("", full),
    }
}

pub fn build_form(cfg: &SalesforceConfig, lead: &LeadRecord) -> Vec<(String, String)> {
    let (first, last) = split_name(&lead.name);
    let mut form: Vec<(String, String)> = vec![
        ("oid".into(), cfg.oid.clone()),
        ("first_name".into(), first.to_string()),
        ("last_name".into(), last.to_string()),
        ("email".into(), lead.email.clone()),
        ("mobile".into(), lead.phone.clone()),
        ("lead_source".into(), cfg.lead_source.clone()),
        ("description".into(), lead.description.clone()),
    ];
    if let Some(city) = &lead.city {
        form.push(("city".into(), city.clone()));
    }
    for (key, value) in &lead.attributes {
        if let Some(field_id) = cfg.custom_fields.get(*key) {
            form.push((field_id.clone(), value.clone()));
        }
    }
    form
}

#[async_trait]
impl CrmSink for WebToLead {
    async fn submit(&self, lead: &LeadRecord) -> Result<(), StoreError> {
        let form = build_form(&self.cfg, lead);
        (|| async { self.post_once(&form).await })
            .retry(self.retry_policy.clone())
            .when(|e: &StoreError| e.is_retryable())
            .notify(|err, dur: Duration| {
                warn!("Web-to-Lead retrying after error {}, sleeping {:?}", err, dur);
            })
            .await?;
        info!(kind = ?lead.kind, phone = %lead.phone, "lead forwarded to Salesforce");
        Ok(())
    }
}
