use crate::config::{EmailConfig, LeadsConfig};
use crate::db::models::{CrmStatus, LeadKind, TransactionStatus};
use crate::db::sqlite::Storage;
use crate::error::StoreError;
use crate::integrations::mailer::{self, Email, Mailer};
use crate::integrations::salesforce::{CrmSink, LeadRecord};
use futures::stream::StreamExt;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadJob {
    pub kind: LeadKind,
    pub id: i64,
}

impl LeadJob {
    pub fn contact(id: i64) -> Self {
        Self {
            kind: LeadKind::Contact,
            id,
        }
    }

    pub fn test_ride(id: i64) -> Self {
        Self {
            kind: LeadKind::TestRide,
            id,
        }
    }

    pub fn booking(id: i64) -> Self {
        Self {
            kind: LeadKind::Booking,
            id,
        }
    }
}

/// Everything a dispatch job needs besides the job itself.
#[derive(Clone)]
pub struct DispatchContext {
    pub storage: Storage,
    pub crm: Option<Arc<dyn CrmSink>>,
    pub mailer: Arc<dyn Mailer>,
    pub email: EmailConfig,
}

/// Queue front for the background CRM/email pipeline.
#[derive(Clone)]
pub struct LeadDispatcher {
    job_tx: mpsc::Sender<LeadJob>,
}

impl LeadDispatcher {
    /// Spawn the worker and return the queue handle.
    pub fn spawn(ctx: DispatchContext, cfg: &LeadsConfig) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<LeadJob>(1000);
        let concurrency = cfg.dispatch_concurrency.max(1);
        let per_minute = NonZeroU32::new(cfg.crm_rate_per_minute).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));
        let ctx = Arc::new(ctx);

        tokio::spawn(async move {
            info!(
                "Lead dispatch pipeline started: Concurrency={}, RateLimit={}/min",
                concurrency, per_minute
            );

            let mut pipeline = ReceiverStream::new(job_rx)
                .map(|job| {
                    let lim = limiter.clone();
                    let ctx = ctx.clone();
                    async move {
                        lim.until_ready().await;
                        (job, process_job(&ctx, job).await)
                    }
                })
                .buffer_unordered(concurrency);

            while let Some((job, outcome)) = pipeline.next().await {
                match outcome {
                    Ok(Some(status)) => debug!(kind = ?job.kind, id = job.id, ?status, "lead dispatched"),
                    Ok(None) => debug!(kind = ?job.kind, id = job.id, "lead not ready for dispatch"),
                    Err(e) => error!(kind = ?job.kind, id = job.id, error = %e, "lead dispatch failed"),
                }
            }
            info!("Lead dispatch pipeline stopped");
        });

        Self { job_tx }
    }

    /// Queue a job without blocking the caller.
    pub fn enqueue(&self, job: LeadJob) {
        let tx = self.job_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tx.send(job).await {
                warn!("Failed to queue lead job (channel closed): {}", e);
            }
        });
    }
}

/// Forward one lead to the CRM and send its emails, then record the CRM outcome.
///
/// `Ok(None)` means the row is not dispatchable yet (an unpaid booking).
pub async fn process_job(
    ctx: &DispatchContext,
    job: LeadJob,
) -> Result<Option<CrmStatus>, StoreError> {
    let notify_to = &ctx.email.notify_to;
    let (record, mut emails) = match job.kind {
        LeadKind::Contact => {
            let c = ctx.storage.get_contact(job.id).await?;
            let mut emails = vec![mailer::contact_ack(&c)];
            if !notify_to.is_empty() {
                emails.push(mailer::contact_notification(notify_to, &c));
            }
            (LeadRecord::from_contact(&c), emails)
        }
        LeadKind::TestRide => {
            let t = ctx.storage.get_test_drive(job.id).await?;
            let dealer = dealer_name(ctx, t.dealership_id).await;
            let mut emails = vec![mailer::test_ride_ack(&t)];
            if !notify_to.is_empty() {
                emails.push(mailer::test_ride_notification(
                    notify_to,
                    &t,
                    dealer.as_deref(),
                ));
            }
            (LeadRecord::from_test_drive(&t, dealer.as_deref()), emails)
        }
        LeadKind::Booking => {
            let tx = ctx.storage.get_transaction(job.id).await?;
            if tx.status != TransactionStatus::Paid {
                return Ok(None);
            }
            let dealer = dealer_name(ctx, tx.dealership_id).await;
            let mut emails = vec![mailer::booking_confirmation(&tx)];
            if !notify_to.is_empty() {
                emails.push(mailer::booking_notification(notify_to, &tx));
            }
            (LeadRecord::from_transaction(&tx, dealer.as_deref()), emails)
        }
    };

    // first entry is always the customer-facing message
    if !ctx.email.send_customer_ack {
        emails.remove(0);
    }

    let status = match &ctx.crm {
        None => CrmStatus::Skipped,
        Some(crm) => match crm.submit(&record).await {
            Ok(()) => CrmStatus::Synced,
            Err(e) => {
                warn!(kind = ?job.kind, id = job.id, error = %e, "CRM forwarding failed");
                CrmStatus::Failed
            }
        },
    };
    ctx.storage.set_crm_status(job.kind, job.id, status).await?;

    for email in emails {
        send_logged(ctx.mailer.as_ref(), email).await;
    }
    Ok(Some(status))
}

async fn dealer_name(ctx: &DispatchContext, id: Option<i64>) -> Option<String> {
    let id = id?;
    match ctx.storage.get_dealership(id).await {
        Ok(d) => Some(format!("{} ({})", d.name, d.city)),
        Err(e) => {
            warn!(dealership_id = id, error = %e, "dealership lookup failed");
            None
        }
    }
}

async fn send_logged(mailer: &dyn Mailer, email: Email) {
    let subject = email.subject.clone();
    if let Err(e) = mailer.send(email).await {
        warn!(subject = %subject, error = %e, "email delivery failed");
    }
}
