//! Subscribe & Pay: subscribe (or switch plan), invoice, pay.
//!
//! The flow is not transactional. Each step is recorded in
//! [`SagaState::completed`] so a failed run can be resumed without repeating
//! the steps that already took effect; the payment step always reuses the
//! recorded idempotency key.

use super::ClientContext;
use super::error::{ClientError, ClientResult};
use super::invoices::{InvoiceClient, PayOptions, generate_idempotency_key};
use super::subscriptions::SubscriptionClient;
use crate::billing::{Invoice, PayReceipt, Subscription, active_subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SagaStep {
    Subscribe,
    CreateInvoice,
    Pay,
}

impl SagaStep {
    pub const ALL: [SagaStep; 3] = [SagaStep::Subscribe, SagaStep::CreateInvoice, SagaStep::Pay];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::CreateInvoice => "create_invoice",
            Self::Pay => "pay",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaOutcome {
    Completed,
    /// Nothing was created; no invoice exists.
    SubscribeFailed,
    /// The subscription exists; retry invoice creation.
    InvoiceFailed,
    /// An unpaid invoice exists; retry payment with the same key.
    PaymentFailed,
}

impl SagaOutcome {
    fn failed_at(step: SagaStep) -> Self {
        match step {
            SagaStep::Subscribe => Self::SubscribeFailed,
            SagaStep::CreateInvoice => Self::InvoiceFailed,
            SagaStep::Pay => Self::PaymentFailed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SagaState {
    pub plan_id: i64,
    pub idempotency_key: String,
    pub simulate_fail: bool,
    pub subscription: Option<Subscription>,
    /// An existing active subscription was switched instead of creating one.
    pub reused_subscription: bool,
    pub invoice: Option<Invoice>,
    pub receipt: Option<PayReceipt>,
    pub completed: Vec<SagaStep>,
}

impl SagaState {
    pub fn new(plan_id: i64, options: PayOptions) -> Self {
        Self {
            plan_id,
            idempotency_key: options.idempotency_key.unwrap_or_else(generate_idempotency_key),
            simulate_fail: options.simulate_fail,
            subscription: None,
            reused_subscription: false,
            invoice: None,
            receipt: None,
            completed: Vec::new(),
        }
    }

    pub fn is_complete(&self, step: SagaStep) -> bool {
        self.completed.contains(&step)
    }

    pub fn next_step(&self) -> Option<SagaStep> {
        SagaStep::ALL.into_iter().find(|step| !self.is_complete(*step))
    }

    fn complete(&mut self, step: SagaStep) {
        if !self.is_complete(step) {
            self.completed.push(step);
        }
    }

    /// Forget `step` and everything after it.
    fn reset_from(&mut self, step: SagaStep) {
        match step {
            SagaStep::Subscribe => {
                self.subscription = None;
                self.reused_subscription = false;
                self.invoice = None;
                self.receipt = None;
            }
            SagaStep::CreateInvoice => {
                self.invoice = None;
                self.receipt = None;
            }
            SagaStep::Pay => self.receipt = None,
        }
        let cutoff = SagaStep::ALL.iter().position(|s| *s == step).unwrap_or(0);
        self.completed
            .retain(|done| SagaStep::ALL.iter().position(|s| s == done).unwrap_or(0) < cutoff);
    }
}

#[derive(Debug, Clone)]
pub struct SagaReport {
    pub outcome: SagaOutcome,
    pub state: SagaState,
    pub error: Option<ClientError>,
}

impl SagaReport {
    pub fn is_completed(&self) -> bool {
        self.outcome == SagaOutcome::Completed
    }
}

pub struct SubscribeAndPay {
    ctx: ClientContext,
    subscriptions: SubscriptionClient,
    invoices: InvoiceClient,
}

impl SubscribeAndPay {
    pub fn new(ctx: ClientContext) -> Self {
        let quiet = ctx.silenced();
        Self {
            subscriptions: SubscriptionClient::new(quiet.clone()),
            invoices: InvoiceClient::new(quiet),
            ctx,
        }
    }

    pub async fn run(&self, plan_id: i64, options: PayOptions) -> SagaReport {
        self.drive(SagaState::new(plan_id, options)).await
    }

    /// Re-check what a previous run created, then run only the steps that
    /// have not taken effect.
    ///
    /// A failed re-check keeps the recorded state and is reported at the
    /// step still pending.
    pub async fn resume(&self, mut state: SagaState) -> SagaReport {
        if state.next_step().is_none() {
            return self.finish(state, SagaOutcome::Completed, None);
        }

        if let Some(recorded) = state.subscription.as_ref().map(|s| s.id) {
            match self.subscriptions.list().await {
                Ok(list) => match list.into_iter().find(|s| s.id == recorded) {
                    Some(current) => state.subscription = Some(current),
                    None => {
                        tracing::info!(subscription_id = recorded, "recorded subscription is gone");
                        state.reset_from(SagaStep::Subscribe);
                    }
                },
                Err(err) => return self.check_failed(state, err),
            }
        }

        if let Some(recorded) = state.invoice.as_ref().map(|i| i.id) {
            match self.invoices.list().await {
                Ok(list) => match list.into_iter().find(|i| i.id == recorded) {
                    Some(current) => {
                        if current.is_paid() {
                            state.complete(SagaStep::Pay);
                        }
                        state.invoice = Some(current);
                    }
                    None => {
                        tracing::info!(invoice_id = recorded, "recorded invoice is gone");
                        state.reset_from(SagaStep::CreateInvoice);
                    }
                },
                Err(err) => return self.check_failed(state, err),
            }
        }

        self.drive(state).await
    }

    async fn drive(&self, mut state: SagaState) -> SagaReport {
        while let Some(step) = state.next_step() {
            let result = match step {
                SagaStep::Subscribe => self.subscribe(&mut state).await,
                SagaStep::CreateInvoice => self.create_invoice(&mut state).await,
                SagaStep::Pay => self.pay(&mut state).await,
            };
            match result {
                Ok(()) => {
                    state.complete(step);
                    tracing::debug!(step = step.as_str(), plan_id = state.plan_id, "saga step completed");
                }
                Err(err) => {
                    tracing::info!(step = step.as_str(), error = %err, "saga step failed");
                    return self.finish(state, SagaOutcome::failed_at(step), Some(err));
                }
            }
        }
        self.finish(state, SagaOutcome::Completed, None)
    }

    async fn subscribe(&self, state: &mut SagaState) -> ClientResult<()> {
        let existing = self.subscriptions.list().await?;
        let subscription = match active_subscription(&existing) {
            Some(active) => {
                let changed = self.subscriptions.change_plan(active.id, state.plan_id).await?;
                state.reused_subscription = true;
                changed
            }
            None => self.subscriptions.create(state.plan_id).await?,
        };
        state.subscription = Some(subscription);
        Ok(())
    }

    async fn create_invoice(&self, state: &mut SagaState) -> ClientResult<()> {
        let subscription_id = state
            .subscription
            .as_ref()
            .map(|s| s.id)
            .ok_or_else(|| ClientError::Invalid("No subscription to invoice".to_string()))?;
        state.invoice = Some(self.invoices.create(subscription_id).await?);
        Ok(())
    }

    async fn pay(&self, state: &mut SagaState) -> ClientResult<()> {
        let invoice_id = state
            .invoice
            .as_ref()
            .map(|i| i.id)
            .ok_or_else(|| ClientError::Invalid("No invoice to pay".to_string()))?;
        let options = PayOptions {
            simulate_fail: state.simulate_fail,
            idempotency_key: Some(state.idempotency_key.clone()),
            amount_cents: None,
        };
        let outcome = self.invoices.pay(invoice_id, options).await?;
        state.invoice = Some(outcome.receipt.invoice.clone());
        state.receipt = Some(outcome.receipt);
        Ok(())
    }

    fn check_failed(&self, state: SagaState, err: ClientError) -> SagaReport {
        let outcome = state
            .next_step()
            .map_or(SagaOutcome::Completed, SagaOutcome::failed_at);
        tracing::info!(pending = ?state.next_step(), error = %err, "saga resume check failed");
        self.finish(state, outcome, Some(err))
    }

    fn finish(&self, state: SagaState, outcome: SagaOutcome, error: Option<ClientError>) -> SagaReport {
        let notifier = self.ctx.notifier();
        match (&outcome, &error) {
            (SagaOutcome::Completed, _) => notifier.success("Subscribed and paid"),
            (SagaOutcome::SubscribeFailed, Some(err)) => notifier.error(&format!("Subscription failed: {err}")),
            (SagaOutcome::InvoiceFailed, Some(err)) => {
                notifier.error(&format!("Subscribed, but invoice creation failed: {err}"))
            }
            (SagaOutcome::PaymentFailed, Some(err)) => {
                notifier.error(&format!("Invoice created, but payment failed: {err}"))
            }
            (_, None) => {}
        }
        SagaReport { outcome, state, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_mints_key_when_missing() {
        let state = SagaState::new(3, PayOptions::default());
        assert!(state.idempotency_key.starts_with("subpay-"));
        assert_eq!(state.next_step(), Some(SagaStep::Subscribe));

        let state = SagaState::new(3, PayOptions::with_key("mine"));
        assert_eq!(state.idempotency_key, "mine");
    }

    #[test]
    fn test_next_step_follows_completion_log() {
        let mut state = SagaState::new(1, PayOptions::default());
        state.complete(SagaStep::Subscribe);
        assert_eq!(state.next_step(), Some(SagaStep::CreateInvoice));
        state.complete(SagaStep::CreateInvoice);
        state.complete(SagaStep::CreateInvoice);
        assert_eq!(state.completed.len(), 2);
        state.complete(SagaStep::Pay);
        assert_eq!(state.next_step(), None);
    }

    #[test]
    fn test_reset_drops_later_steps() {
        let mut state = SagaState::new(1, PayOptions::default());
        for step in SagaStep::ALL {
            state.complete(step);
        }
        state.reset_from(SagaStep::CreateInvoice);
        assert_eq!(state.completed, vec![SagaStep::Subscribe]);

        state.reset_from(SagaStep::Subscribe);
        assert!(state.completed.is_empty());
        assert!(state.subscription.is_none());
    }

    #[test]
    fn test_failed_step_maps_to_outcome() {
        assert_eq!(SagaOutcome::failed_at(SagaStep::Subscribe), SagaOutcome::SubscribeFailed);
        assert_eq!(SagaOutcome::failed_at(SagaStep::CreateInvoice), SagaOutcome::InvoiceFailed);
        assert_eq!(SagaOutcome::failed_at(SagaStep::Pay), SagaOutcome::PaymentFailed);
    }
}
