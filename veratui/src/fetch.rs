//! Background execution of session fetches.
//!
//! The session never awaits. Requests taken from its outbox are spawned onto
//! the runtime, bounded by a semaphore, and each finished request comes back
//! as a [`Completion`] on an unbounded channel that the event loop drains
//! between frames.

use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use veracode_api::validation::MAX_PAGE_SIZE;
use veracode_api::{
    AnnotationsApi, ApplicationsApi, FindingsApi, FindingsQuery, IdentityApi, ScanType, Transport,
    VeracodeError,
};

use crate::session::{Completion, FetchOutcome, FetchRequest, FindingCounts, Identity};

/// Default number of fetches allowed in flight at once.
pub const DEFAULT_WORKERS: usize = 4;

/// Executes one fetch against the platform.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn execute(&self, request: FetchRequest) -> Result<FetchOutcome, VeracodeError>;
}

#[async_trait]
impl<T> Backend for T
where
    T: Transport + ?Sized,
{
    async fn execute(&self, request: FetchRequest) -> Result<FetchOutcome, VeracodeError> {
        match request {
            FetchRequest::Applications { query, .. } => {
                let page = ApplicationsApi::new(self).get_applications(&query).await?;
                Ok(FetchOutcome::Applications(page))
            }
            FetchRequest::Sandboxes {
                application_guid, ..
            } => {
                let page = ApplicationsApi::new(self)
                    .get_sandboxes(&application_guid, None, Some(MAX_PAGE_SIZE))
                    .await?;
                Ok(FetchOutcome::Sandboxes(page.into_items()))
            }
            FetchRequest::Findings {
                application_guid,
                query,
                ..
            } => {
                let page = FindingsApi::new(self)
                    .get_findings(&application_guid, &query)
                    .await?;
                Ok(FetchOutcome::Findings(page))
            }
            FetchRequest::StaticFlawInfo {
                application_guid,
                issue_id,
                ..
            } => {
                let info = FindingsApi::new(self)
                    .get_static_flaw_info(&application_guid, issue_id)
                    .await?;
                Ok(FetchOutcome::StaticFlawInfo(info))
            }
            FetchRequest::FindingCounts {
                application_guid,
                context,
                ..
            } => {
                let guid = application_guid.as_str();
                let context = context.as_deref();
                let (static_count, dynamic_count, sca_count) = tokio::try_join!(
                    finding_total(self, guid, context, ScanType::Static),
                    finding_total(self, guid, context, ScanType::Dynamic),
                    finding_total(self, guid, context, ScanType::Sca),
                )?;
                debug!("Finding totals: {static_count} static, {dynamic_count} dynamic, {sca_count} SCA");
                Ok(FetchOutcome::FindingCounts(FindingCounts {
                    static_count,
                    dynamic_count,
                    sca_count,
                }))
            }
            FetchRequest::Principal { .. } => {
                let identity = IdentityApi::new(self);
                let principal = identity.get_principal().await?;
                // Key metadata is optional; the header falls back to the name alone.
                let credentials = match identity.get_api_credentials().await {
                    Ok(credentials) => Some(credentials),
                    Err(e) => {
                        warn!("Could not read API credential metadata: {e}");
                        None
                    }
                };
                Ok(FetchOutcome::Identity(Identity {
                    principal,
                    credentials,
                }))
            }
            FetchRequest::CreateAnnotation {
                application_guid,
                annotation,
                context,
                ..
            } => {
                let response = AnnotationsApi::new(self)
                    .create_annotation(&application_guid, &annotation, context.as_deref())
                    .await?;
                Ok(FetchOutcome::Annotation(response))
            }
        }
    }
}

/// Total findings of one scan type, read from a single-item page.
async fn finding_total<T>(
    transport: &T,
    application_guid: &str,
    context: Option<&str>,
    scan_type: ScanType,
) -> Result<u64, VeracodeError>
where
    T: Transport + ?Sized,
{
    let mut query = FindingsQuery::new().with_scan_type(scan_type).with_size(1);
    if let Some(context) = context {
        query = query.with_context(context);
    }
    let page = FindingsApi::new(transport)
        .get_findings(application_guid, &query)
        .await?;
    Ok(page.total_elements())
}

/// Spawns fetches and collects their completions.
pub struct FetchDispatcher {
    backend: Arc<dyn Backend>,
    permits: Arc<Semaphore>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl FetchDispatcher {
    /// Create a dispatcher running at most `workers` fetches concurrently.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, workers: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            tx,
            rx,
        }
    }

    /// Spawn a fetch. Must be called from within a Tokio runtime.
    pub fn submit(&self, request: FetchRequest) {
        let backend = Arc::clone(&self.backend);
        let permits = Arc::clone(&self.permits);
        let tx = self.tx.clone();
        let ticket = request.ticket();
        debug!("Dispatching fetch {ticket}");

        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let result = backend.execute(request).await;
            if let Err(e) = &result {
                debug!("Fetch {ticket} failed: {e}");
            }
            // The receiver only goes away on shutdown.
            let _ = tx.send(Completion::new(ticket, result));
        });
    }

    /// Next finished fetch, without waiting.
    pub fn try_recv(&mut self) -> Option<Completion> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next finished fetch.
    pub async fn recv(&mut self) -> Option<Completion> {
        self.rx.recv().await
    }
}
