//! Subscription lifecycle.
//!
//! A tenant holds at most one `active` subscription. Every mutation runs
//! under the tenant lock so that rule holds under concurrent requests.

use super::audit::{BillingAuditEvent, BillingAuditLogger};
use super::error::BillingError;
use super::locks::LockRegistry;
use super::storage::{BillingStore, NewSubscription};
use crate::accounts::AccountStore;
use crate::auth::Principal;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Subscription status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    #[default]
    Active,
    Incomplete,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::Incomplete => "incomplete",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
        }
    }

    /// Statuses a successful payment brings back to `active`.
    pub fn is_reactivatable(&self) -> bool {
        matches!(self, Self::PastDue | Self::Incomplete)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tenant's subscription to a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    #[serde(rename = "tenant")]
    pub tenant_id: Uuid,
    #[serde(rename = "plan")]
    pub plan_id: i64,
    pub status: SubscriptionStatus,
    pub started_at: DateTime<Utc>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }
}

/// Body of `POST /subscriptions/`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSubscription {
    pub plan: i64,
    /// Honoured for tenant and platform admins only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SubscriptionStatus>,
}

impl CreateSubscription {
    pub fn for_plan(plan: i64) -> Self {
        Self {
            plan,
            tenant: None,
            status: None,
        }
    }
}

/// Body of `POST /subscriptions/{id}/change-plan/`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChangePlan {
    pub plan: i64,
}

/// Body of `POST /subscriptions/{id}/change-status/`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChangeStatus {
    pub status: SubscriptionStatus,
}

/// Subscription management operations.
pub struct SubscriptionManager {
    store: Arc<dyn BillingStore>,
    accounts: Arc<dyn AccountStore>,
    locks: Arc<LockRegistry>,
    audit: Arc<dyn BillingAuditLogger>,
}

impl SubscriptionManager {
    pub fn new(
        store: Arc<dyn BillingStore>,
        accounts: Arc<dyn AccountStore>,
        locks: Arc<LockRegistry>,
        audit: Arc<dyn BillingAuditLogger>,
    ) -> Self {
        Self {
            store,
            accounts,
            locks,
            audit,
        }
    }

    /// Subscriptions visible to the caller, newest first.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<Subscription>> {
        self.store.list_subscriptions(principal.tenant_scope()).await
    }

    /// Fetch a subscription the caller may see.
    pub async fn get(&self, principal: &Principal, subscription_id: i64) -> Result<Subscription> {
        self.store
            .get_subscription(subscription_id)
            .await?
            .filter(|s| principal.can_access_tenant(s.tenant_id))
            .ok_or_else(|| BillingError::SubscriptionNotFound { subscription_id }.into())
    }

    pub async fn create(&self, principal: &Principal, req: CreateSubscription) -> Result<Subscription> {
        let (tenant_id, status) = if principal.is_tenant_admin() {
            let tenant_id = req.tenant.unwrap_or(principal.tenant_id);
            if !principal.can_access_tenant(tenant_id) {
                return Err(BillingError::TenantNotAllowed { tenant_id }.into());
            }
            (tenant_id, req.status.unwrap_or_default())
        } else {
            (principal.tenant_id, SubscriptionStatus::Active)
        };

        if self.accounts.get_tenant(tenant_id).await?.is_none() {
            return Err(BillingError::TenantNotFound { tenant_id }.into());
        }
        self.require_active_plan(req.plan).await?;

        let _guard = self.locks.tenant(tenant_id).await;

        if status == SubscriptionStatus::Active && self.active_for(tenant_id, None).await?.is_some() {
            return Err(BillingError::ActiveSubscriptionExists { tenant_id }.into());
        }

        let subscription = self
            .store
            .insert_subscription(NewSubscription {
                tenant_id,
                plan_id: req.plan,
                status,
            })
            .await?;

        tracing::info!(
            subscription_id = subscription.id,
            tenant_id = %tenant_id,
            plan_id = subscription.plan_id,
            status = %subscription.status,
            "Subscription created"
        );
        self.audit
            .log(BillingAuditEvent::SubscriptionCreated {
                tenant_id,
                subscription_id: subscription.id,
                plan_id: subscription.plan_id,
            })
            .await;

        Ok(subscription)
    }

    /// Move a subscription to another active plan. Same plan is a no-op.
    pub async fn change_plan(&self, principal: &Principal, subscription_id: i64, plan_id: i64) -> Result<Subscription> {
        let current = self.get(principal, subscription_id).await?;
        self.require_active_plan(plan_id).await?;

        let _guard = self.locks.tenant(current.tenant_id).await;
        let mut subscription = self.reload(subscription_id).await?;
        if subscription.plan_id == plan_id {
            return Ok(subscription);
        }

        let previous = subscription.plan_id;
        subscription.plan_id = plan_id;
        subscription.updated_at = Utc::now();
        self.store.save_subscription(&subscription).await?;

        tracing::info!(subscription_id, from_plan = previous, to_plan = plan_id, "Subscription plan changed");
        self.audit
            .log(BillingAuditEvent::SubscriptionPlanChanged {
                tenant_id: subscription.tenant_id,
                subscription_id,
                from_plan: previous,
                to_plan: plan_id,
            })
            .await;

        Ok(subscription)
    }

    /// Set any status; only the single-active rule is enforced.
    pub async fn change_status(
        &self,
        principal: &Principal,
        subscription_id: i64,
        status: SubscriptionStatus,
    ) -> Result<Subscription> {
        require_tenant_admin(principal)?;
        let current = self.get(principal, subscription_id).await?;

        let _guard = self.locks.tenant(current.tenant_id).await;
        let mut subscription = self.reload(subscription_id).await?;
        if subscription.status == status {
            return Ok(subscription);
        }

        if status == SubscriptionStatus::Active
            && self
                .active_for(subscription.tenant_id, Some(subscription_id))
                .await?
                .is_some()
        {
            return Err(BillingError::ActiveSubscriptionExists {
                tenant_id: subscription.tenant_id,
            }
            .into());
        }

        let previous = subscription.status;
        subscription.status = status;
        subscription.updated_at = Utc::now();
        self.store.save_subscription(&subscription).await?;

        tracing::info!(subscription_id, from = %previous, to = %status, "Subscription status changed");
        self.audit
            .log(BillingAuditEvent::SubscriptionStatusChanged {
                tenant_id: subscription.tenant_id,
                subscription_id,
                from: previous,
                to: status,
            })
            .await;

        Ok(subscription)
    }

    /// Delete a subscription together with its invoices.
    pub async fn delete(&self, principal: &Principal, subscription_id: i64) -> Result<()> {
        require_tenant_admin(principal)?;
        let subscription = self.get(principal, subscription_id).await?;

        let _guard = self.locks.tenant(subscription.tenant_id).await;
        let removed_invoices = self.store.delete_subscription(subscription_id).await?;

        tracing::info!(subscription_id, removed_invoices, "Subscription deleted");
        self.audit
            .log(BillingAuditEvent::SubscriptionDeleted {
                tenant_id: subscription.tenant_id,
                subscription_id,
            })
            .await;
        Ok(())
    }

    async fn reload(&self, subscription_id: i64) -> Result<Subscription> {
        self.store
            .get_subscription(subscription_id)
            .await?
            .ok_or_else(|| BillingError::SubscriptionNotFound { subscription_id }.into())
    }

    async fn require_active_plan(&self, plan_id: i64) -> Result<()> {
        match self.store.get_plan(plan_id).await? {
            Some(plan) if plan.active => Ok(()),
            Some(_) => Err(BillingError::PlanInactive { plan_id }.into()),
            None => Err(BillingError::PlanNotFound { plan_id }.into()),
        }
    }

    async fn active_for(&self, tenant_id: Uuid, except: Option<i64>) -> Result<Option<Subscription>> {
        Ok(self
            .store
            .list_subscriptions(Some(tenant_id))
            .await?
            .into_iter()
            .find(|s| s.is_active() && Some(s.id) != except))
    }
}

pub(crate) fn require_tenant_admin(principal: &Principal) -> Result<()> {
    if principal.is_tenant_admin() {
        Ok(())
    } else {
        Err(BillingError::TenantAdminRequired.into())
    }
}

/// First subscription in `active` status.
///
/// Tenants are kept to one active subscription, so the first match is the
/// only match.
pub fn active_subscription(subscriptions: &[Subscription]) -> Option<&Subscription> {
    subscriptions.iter().find(|s| s.is_active())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(id: i64, status: SubscriptionStatus) -> Subscription {
        let now = Utc::now();
        Subscription {
            id,
            tenant_id: Uuid::nil(),
            plan_id: 1,
            status,
            started_at: now,
            current_period_end: None,
            cancel_at_period_end: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&SubscriptionStatus::PastDue).unwrap(), "\"past_due\"");
        let parsed: SubscriptionStatus = serde_json::from_str("\"trialing\"").unwrap();
        assert_eq!(parsed, SubscriptionStatus::Trialing);
        assert!(serde_json::from_str::<SubscriptionStatus>("\"paused\"").is_err());
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(subscription(4, SubscriptionStatus::Active)).unwrap();
        assert_eq!(json["plan"], 1);
        assert_eq!(json["tenant"], Uuid::nil().to_string());
        assert!(json.get("plan_id").is_none());
    }

    #[test]
    fn test_active_subscription_is_first_match() {
        let subs = vec![
            subscription(3, SubscriptionStatus::Canceled),
            subscription(2, SubscriptionStatus::Active),
            subscription(1, SubscriptionStatus::Active),
        ];
        assert_eq!(active_subscription(&subs).map(|s| s.id), Some(2));
        assert!(active_subscription(&subs[..1]).is_none());
    }

    #[test]
    fn test_reactivatable_statuses() {
        assert!(SubscriptionStatus::PastDue.is_reactivatable());
        assert!(SubscriptionStatus::Incomplete.is_reactivatable());
        assert!(!SubscriptionStatus::Canceled.is_reactivatable());
    }
}
