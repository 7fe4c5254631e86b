//! Client orchestration layer.
//!
//! Drives the billing workflow over HTTP: session resolution, the plan
//! catalog, subscription and invoice actions, the mock webhook and the
//! Subscribe & Pay saga. Every orchestrator receives a [`ClientContext`]
//! carrying the transport, the notification sink and the in-flight guard.
//!
//! Reads never notify; writes always report success or failure through the
//! [`Notifier`]. Nothing is retried automatically.

mod catalog;
mod error;
mod inflight;
mod invoices;
mod notify;
mod overview;
mod registration;
mod saga;
mod session;
mod subscriptions;
mod transport;
mod webhooks;

pub use catalog::PlanCatalog;
pub use error::{ClientError, ClientResult, FALLBACK_MESSAGE, format_error};
pub use inflight::{InFlight, InFlightGuard};
pub use invoices::{InvoiceClient, PayOptions, generate_idempotency_key};
pub use notify::{Notice, NoticeKind, NoopNotifier, Notifier, RecordingNotifier, TracingNotifier};
pub use overview::{BillingOverview, OverviewLeg};
pub use registration::{RegistrationClient, RegistrationForm, is_tenant_uuid};
pub use saga::{SagaOutcome, SagaReport, SagaState, SagaStep, SubscribeAndPay};
pub use session::{AdminProbe, AuthState, SessionResolver};
pub use subscriptions::SubscriptionClient;
pub use transport::{ApiClient, Credentials, Replayable, SessionState};
pub use webhooks::WebhookSimulator;

use std::future::Future;
use std::sync::Arc;

/// Shared dependencies of every orchestrator.
#[derive(Clone)]
pub struct ClientContext {
    api: ApiClient,
    notifier: Arc<dyn Notifier>,
    in_flight: InFlight,
}

impl ClientContext {
    pub fn new(api: ApiClient, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            notifier,
            in_flight: InFlight::new(),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Same transport and guard, but notices are dropped. Composite flows
    /// use this for their inner steps and report once themselves.
    pub fn silenced(&self) -> Self {
        Self {
            api: self.api.clone(),
            notifier: Arc::new(NoopNotifier),
            in_flight: self.in_flight.clone(),
        }
    }

    /// Run a write action: refuse it while `key` is busy, then notify the
    /// outcome.
    pub(crate) async fn write<T, F>(&self, key: Option<String>, success: &str, action: F) -> ClientResult<T>
    where
        F: Future<Output = ClientResult<T>>,
    {
        let _guard = match key {
            Some(key) => match self.in_flight.acquire(key) {
                Ok(guard) => Some(guard),
                Err(err) => {
                    self.notifier.error(&err.to_string());
                    return Err(err);
                }
            },
            None => None,
        };

        match action.await {
            Ok(value) => {
                self.notifier.success(success);
                Ok(value)
            }
            Err(err) => {
                self.notifier.error(&err.to_string());
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext").field("api", &self.api).finish_non_exhaustive()
    }
}
