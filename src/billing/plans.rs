//! Plan catalog.
//!
//! Plans are public to read and managed by platform admins. A plan that any
//! subscription references cannot be deleted.

use super::error::BillingError;
use super::storage::BillingStore;
use crate::accounts::require_platform_admin;
use crate::auth::Principal;
use crate::error::Result;
use crate::validation::validate_features;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Billing interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanInterval {
    #[default]
    Monthly,
    Yearly,
}

impl PlanInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::fmt::Display for PlanInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A subscription plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    #[serde(default)]
    pub interval: PlanInterval,
    /// Seat limit for tenants on this plan.
    pub max_users: u32,
    #[serde(default)]
    pub features: serde_json::Value,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    /// Price for display, e.g. `$12.00`.
    pub fn display_price(&self) -> String {
        format_cents(self.price_cents)
    }
}

/// Render an amount of cents as dollars without floating point.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}

/// Body of plan create and update requests.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlanInput {
    #[validate(length(min = 1, max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub price_cents: i64,
    #[serde(default)]
    pub interval: PlanInterval,
    #[serde(default = "default_max_users")]
    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    pub max_users: u32,
    #[serde(default = "default_features")]
    #[validate(custom(function = "validate_features"))]
    pub features: serde_json::Value,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_max_users() -> u32 {
    1
}

fn default_features() -> serde_json::Value {
    serde_json::json!({})
}

fn default_active() -> bool {
    true
}

impl PlanInput {
    pub fn new(name: impl Into<String>, price_cents: i64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            price_cents,
            interval: PlanInterval::Monthly,
            max_users: default_max_users(),
            features: default_features(),
            active: true,
        }
    }

    pub fn max_users(mut self, max_users: u32) -> Self {
        self.max_users = max_users;
        self
    }

    pub fn interval(mut self, interval: PlanInterval) -> Self {
        self.interval = interval;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Plan catalog operations.
pub struct PlanManager {
    store: Arc<dyn BillingStore>,
}

impl PlanManager {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    /// Active plans, cheapest first.
    pub async fn list(&self) -> Result<Vec<Plan>> {
        self.store.list_plans(false).await
    }

    /// Every plan including retired ones.
    pub async fn list_all(&self, principal: &Principal) -> Result<Vec<Plan>> {
        require_platform_admin(principal)?;
        self.store.list_plans(true).await
    }

    /// Inactive plans are only visible to platform admins.
    pub async fn get(&self, caller: Option<&Principal>, plan_id: i64) -> Result<Plan> {
        let include_inactive = caller.is_some_and(Principal::is_platform_admin);
        self.store
            .get_plan(plan_id)
            .await?
            .filter(|plan| plan.active || include_inactive)
            .ok_or_else(|| BillingError::PlanNotFound { plan_id }.into())
    }

    pub async fn create(&self, principal: &Principal, input: PlanInput) -> Result<Plan> {
        require_platform_admin(principal)?;
        let plan = self.store.insert_plan(input).await?;
        tracing::info!(plan_id = plan.id, name = %plan.name, price_cents = plan.price_cents, "Plan created");
        Ok(plan)
    }

    pub async fn update(&self, principal: &Principal, plan_id: i64, input: PlanInput) -> Result<Plan> {
        require_platform_admin(principal)?;
        let plan = self.store.update_plan(plan_id, input).await?;
        tracing::info!(plan_id = plan.id, active = plan.active, "Plan updated");
        Ok(plan)
    }

    pub async fn delete(&self, principal: &Principal, plan_id: i64) -> Result<()> {
        require_platform_admin(principal)?;
        if self.store.get_plan(plan_id).await?.is_none() {
            return Err(BillingError::PlanNotFound { plan_id }.into());
        }
        if self.store.plan_in_use(plan_id).await? {
            return Err(BillingError::PlanInUse { plan_id }.into());
        }
        self.store.delete_plan(plan_id).await?;
        tracing::info!(plan_id, "Plan deleted");
        Ok(())
    }
}
