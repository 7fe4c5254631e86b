use super::ClientContext;
use super::error::{ClientError, ClientResult};
use crate::billing::{Invoice, Plan, Subscription, active_subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverviewLeg {
    Plans,
    Subscriptions,
    Invoices,
}

/// Plans, subscriptions and invoices loaded together.
///
/// A failed leg is empty and listed in `failed`; the others still load.
#[derive(Debug, Clone, Default)]
pub struct BillingOverview {
    pub plans: Vec<Plan>,
    pub subscriptions: Vec<Subscription>,
    pub invoices: Vec<Invoice>,
    pub failed: Vec<OverviewLeg>,
}

impl BillingOverview {
    /// Fetch the three collections concurrently. 401 and 403 failures are
    /// silent; any other failure produces one error notice.
    pub async fn load(ctx: &ClientContext) -> Self {
        let api = ctx.api();
        let (plans, subscriptions, invoices) = tokio::join!(
            api.get::<Vec<Plan>>("/plans/"),
            api.get::<Vec<Subscription>>("/subscriptions/"),
            api.get::<Vec<Invoice>>("/billing/"),
        );

        let mut overview = Self::default();
        let mut surfaced = Vec::new();
        overview.plans = overview.settle(OverviewLeg::Plans, plans, &mut surfaced);
        overview.subscriptions = overview.settle(OverviewLeg::Subscriptions, subscriptions, &mut surfaced);
        overview.invoices = overview.settle(OverviewLeg::Invoices, invoices, &mut surfaced);

        if let Some(first) = surfaced.first() {
            ctx.notifier()
                .error(&format!("Some billing data could not be loaded: {first}"));
        }
        overview
    }

    fn settle<T>(&mut self, leg: OverviewLeg, result: ClientResult<Vec<T>>, surfaced: &mut Vec<ClientError>) -> Vec<T> {
        match result {
            Ok(items) => items,
            Err(err) => {
                tracing::debug!(leg = ?leg, error = %err, "overview leg failed");
                self.failed.push(leg);
                if !err.is_auth() {
                    surfaced.push(err);
                }
                Vec::new()
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn plan(&self, plan_id: i64) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id == plan_id)
    }

    pub fn plan_name(&self, plan_id: i64) -> Option<&str> {
        self.plan(plan_id).map(|p| p.name.as_str())
    }

    pub fn active_subscription(&self) -> Option<&Subscription> {
        active_subscription(&self.subscriptions)
    }

    pub fn invoices_for(&self, subscription_id: i64) -> Vec<&Invoice> {
        self.invoices
            .iter()
            .filter(|i| i.subscription_id == subscription_id)
            .collect()
    }

    pub fn unpaid_invoices(&self) -> Vec<&Invoice> {
        self.invoices.iter().filter(|i| !i.is_paid()).collect()
    }
}
