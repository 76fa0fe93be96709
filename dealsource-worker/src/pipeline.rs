/// Pipeline service
///
/// Runs the vendor contact loop: every `poll_interval_secs` one tick works
/// through three steps in order.
///
/// 1. **Initial contact**: claim due `new_lead` vendors, move them to
///    `contacted` and send the intro SMS. A refused send puts the vendor
///    back in `new_lead` with `next_contact_at = now + retry_delay`.
/// 2. **Follow-up**: silent `contacted` vendors past the quiet period get
///    the next follow-up, until `max_follow_ups` have gone out.
/// 3. **Give up**: silent vendors with no follow-ups left move to
///    `unresponsive`.
///
/// Every message, sent or failed, is appended to the vendor's SMS log.
/// Vendors in a claimed batch are handled one by one; a failure on one
/// is logged and the batch carries on.
///
/// # Shutdown
///
/// [`PipelineService::stop`] cancels the loop between ticks; a tick already
/// running is allowed to finish.
///
/// # Example
///
/// ```no_run
/// use dealsource_worker::config::PipelineConfig;
/// use dealsource_worker::pipeline::PipelineService;
/// use dealsource_shared::notify::sms::LogSmsGateway;
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example(pool: PgPool) -> anyhow::Result<()> {
/// let service = PipelineService::new(pool, PipelineConfig::default(), Arc::new(LogSmsGateway));
/// let handle = service.start();
///
/// tokio::signal::ctrl_c().await?;
/// service.stop();
/// handle.await?;
/// # Ok(())
/// # }
/// ```

use crate::config::PipelineConfig;
use crate::messages;
use crate::queue::{FollowUpRule, QueueError, VendorQueue};
use chrono::{DateTime, Utc};
use dealsource_shared::models::sms_message::{NewSmsMessage, SmsMessage};
use dealsource_shared::models::vendor::{SmsDirection, SmsStatus, Vendor};
use dealsource_shared::notify::sms::{
    HttpSmsGateway, LogSmsGateway, SmsConfig, SmsError, SmsGateway, SmsReceipt,
};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("SMS gateway error: {0}")]
    Gateway(#[from] SmsError),
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub contacted: usize,
    pub retry_scheduled: usize,
    pub followed_up: usize,
    pub send_failures: usize,
    pub gave_up: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        *self == TickReport::default()
    }
}

/// Uses the HTTP gateway when `SMS_*` credentials are complete, otherwise a
/// gateway that only logs
pub fn gateway_from_config(config: &SmsConfig) -> Result<Arc<dyn SmsGateway>, SmsError> {
    match HttpSmsGateway::from_config(config)? {
        Some(gateway) => {
            tracing::info!("Sending SMS through the HTTP gateway");
            Ok(Arc::new(gateway))
        }
        None => {
            tracing::warn!("SMS credentials not configured, messages will only be logged");
            Ok(Arc::new(LogSmsGateway))
        }
    }
}

struct Pipeline {
    db: PgPool,
    queue: VendorQueue,
    gateway: Arc<dyn SmsGateway>,
    config: PipelineConfig,
}

pub struct PipelineService {
    inner: Arc<Pipeline>,
    shutdown: CancellationToken,
}

impl PipelineService {
    pub fn new(db: PgPool, config: PipelineConfig, gateway: Arc<dyn SmsGateway>) -> Self {
        PipelineService {
            inner: Arc::new(Pipeline {
                queue: VendorQueue::new(db.clone()),
                db,
                gateway,
                config,
            }),
            shutdown: CancellationToken::new(),
        }
    }

    /// Used by signal handlers to stop the loop from elsewhere
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawns the polling loop
    pub fn start(&self) -> JoinHandle<()> {
        let pipeline = self.inner.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            tracing::info!(
                poll_interval_secs = pipeline.config.poll_interval_secs,
                batch_size = pipeline.config.batch_size,
                "Pipeline service started"
            );

            loop {
                match pipeline.tick(Utc::now()).await {
                    Ok(report) if report.is_idle() => tracing::debug!("Pipeline tick: nothing to do"),
                    Ok(report) => tracing::info!(
                        contacted = report.contacted,
                        retry_scheduled = report.retry_scheduled,
                        followed_up = report.followed_up,
                        send_failures = report.send_failures,
                        gave_up = report.gave_up,
                        "Pipeline tick complete"
                    ),
                    Err(e) => tracing::error!(error = %e, "Pipeline tick failed"),
                }

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(pipeline.config.poll_interval()) => {}
                }
            }

            tracing::info!("Pipeline service stopped");
        })
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Runs one tick as if the clock read `now`
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, PipelineError> {
        self.inner.tick(now).await
    }
}

impl Pipeline {
    fn follow_up_rule(&self) -> FollowUpRule {
        FollowUpRule {
            quiet_period: self.config.follow_up_after(),
            max_follow_ups: self.config.max_follow_ups,
        }
    }

    async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, PipelineError> {
        let mut report = TickReport::default();

        self.contact_new_leads(now, &mut report).await?;
        self.send_follow_ups(now, &mut report).await?;

        report.gave_up = self
            .queue
            .give_up(self.follow_up_rule(), self.config.batch_size, now)
            .await?
            .len();

        Ok(report)
    }

    async fn contact_new_leads(
        &self,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<(), PipelineError> {
        let vendors = self.queue.claim_new_leads(self.config.batch_size, now).await?;

        for vendor in vendors {
            let body = messages::intro(&vendor);

            match self.send(&vendor, &body).await {
                Ok(_) => report.contacted += 1,
                Err(e) => {
                    let retry_at = now + self.config.retry_delay();
                    tracing::warn!(
                        vendor_id = %vendor.id,
                        error = %e,
                        retry_at = %retry_at,
                        "Intro SMS failed, vendor returned to queue"
                    );

                    report.send_failures += 1;
                    match self.queue.release_failed(vendor.id, retry_at).await {
                        Ok(true) => report.retry_scheduled += 1,
                        Ok(false) => tracing::debug!(
                            vendor_id = %vendor.id,
                            "Vendor moved elsewhere before release"
                        ),
                        // keep going; the rest of the batch still needs sending
                        Err(e) => tracing::error!(
                            vendor_id = %vendor.id,
                            error = %e,
                            "Failed to return vendor to queue"
                        ),
                    }
                }
            }
        }

        Ok(())
    }

    async fn send_follow_ups(
        &self,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<(), PipelineError> {
        let vendors = self
            .queue
            .claim_follow_ups(self.follow_up_rule(), self.config.batch_size, now)
            .await?;

        for vendor in vendors {
            // the claim already counted this attempt
            let body = messages::follow_up(&vendor, vendor.follow_up_count);

            match self.send(&vendor, &body).await {
                Ok(_) => report.followed_up += 1,
                Err(e) => {
                    tracing::warn!(vendor_id = %vendor.id, error = %e, "Follow-up SMS failed");
                    report.send_failures += 1;
                }
            }
        }

        Ok(())
    }

    /// Sends `body`, logs it, and records the outcome on the vendor
    ///
    /// Gateway failures come back as `Err`; database failures while logging
    /// are only reported since the message may already be on its way.
    async fn send(&self, vendor: &Vendor, body: &str) -> Result<SmsReceipt, SmsError> {
        let phone = vendor
            .phone
            .as_deref()
            .ok_or_else(|| SmsError::InvalidNumber(String::new()))?;

        let outcome = self.gateway.send(phone, body).await;

        let (status, provider_message_id, error) = match &outcome {
            Ok(receipt) => (SmsStatus::Sent, receipt.provider_message_id.clone(), None),
            Err(e) => (SmsStatus::Failed, None, Some(e.to_string())),
        };

        let logged = SmsMessage::create(
            &self.db,
            NewSmsMessage {
                vendor_id: vendor.id,
                direction: SmsDirection::Outbound,
                body: body.to_string(),
                status,
                provider_message_id,
                error,
            },
        )
        .await;

        if let Err(e) = logged {
            tracing::error!(vendor_id = %vendor.id, error = %e, "Failed to log outbound SMS");
        }

        if let Err(e) = self.queue.record_delivery(vendor.id, status).await {
            tracing::error!(vendor_id = %vendor.id, error = %e, "Failed to record SMS status");
        }

        outcome
    }
}
