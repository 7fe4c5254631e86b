use super::ClientContext;
use super::error::{ClientError, ClientResult};
use super::inflight::subscription_key;
use crate::billing::{ChangePlan, ChangeStatus, CreateSubscription, Subscription, SubscriptionStatus};
use uuid::Uuid;

const CREATE_KEY: &str = "subscription:new";

/// Subscription actions for the current session.
#[derive(Debug, Clone)]
pub struct SubscriptionClient {
    ctx: ClientContext,
}

impl SubscriptionClient {
    pub fn new(ctx: ClientContext) -> Self {
        Self { ctx }
    }

    /// Subscriptions visible to the caller, newest first.
    pub async fn list(&self) -> ClientResult<Vec<Subscription>> {
        self.ctx.api().get("/subscriptions/").await
    }

    /// Subscribe the caller's own tenant to `plan_id`.
    pub async fn create(&self, plan_id: i64) -> ClientResult<Subscription> {
        self.submit(CreateSubscription::for_plan(plan_id)).await
    }

    /// Admin form: subscribe a named tenant with an initial status.
    pub async fn create_for(&self, tenant: Uuid, plan_id: i64, status: SubscriptionStatus) -> ClientResult<Subscription> {
        self.submit(CreateSubscription {
            plan: plan_id,
            tenant: Some(tenant),
            status: Some(status),
        })
        .await
    }

    async fn submit(&self, body: CreateSubscription) -> ClientResult<Subscription> {
        let api = self.ctx.api();
        self.ctx
            .write(Some(CREATE_KEY.to_string()), "Subscription created", async move {
                api.post("/subscriptions/", &body).await
            })
            .await
    }

    pub async fn change_plan(&self, subscription_id: i64, plan_id: i64) -> ClientResult<Subscription> {
        let api = self.ctx.api();
        let path = format!("/subscriptions/{subscription_id}/change-plan/");
        self.ctx
            .write(Some(subscription_key(subscription_id)), "Plan changed", async move {
                api.post(&path, &ChangePlan { plan: plan_id }).await
            })
            .await
    }

    /// Admin only. The server enforces which statuses may coexist; no
    /// transition graph is checked here.
    pub async fn change_status(&self, subscription_id: i64, status: SubscriptionStatus) -> ClientResult<Subscription> {
        let api = self.ctx.api();
        let path = format!("/subscriptions/{subscription_id}/change-status/");
        self.ctx
            .write(Some(subscription_key(subscription_id)), "Status updated", async move {
                api.post(&path, &ChangeStatus { status }).await
            })
            .await
    }

    /// Hard delete. `confirm` must return `true` before anything is sent.
    pub async fn delete<C>(&self, subscription_id: i64, confirm: C) -> ClientResult<()>
    where
        C: FnOnce(i64) -> bool,
    {
        if !confirm(subscription_id) {
            return Err(ClientError::NotConfirmed);
        }
        let api = self.ctx.api();
        let path = format!("/subscriptions/{subscription_id}/");
        self.ctx
            .write(Some(subscription_key(subscription_id)), "Subscription deleted", async move {
                api.delete(&path).await
            })
            .await
    }
}
