use crate::accounts::{AccountStore, NewUser, Tenant, User};
use crate::billing::{
    BillingError, BillingStore, Invoice, InvoiceStatus, NewInvoice, NewPayment, NewSubscription, PayRecord,
    Payment, Plan, PlanInput, Subscription,
};
use crate::error::{EshtarekError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory store for development and tests.
///
/// Wraps data in Arc for cheap cloning.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    tenants: RwLock<HashMap<Uuid, Tenant>>,
    users: RwLock<HashMap<i64, User>>,
    plans: RwLock<HashMap<i64, Plan>>,
    subscriptions: RwLock<HashMap<i64, Subscription>>,
    invoices: RwLock<HashMap<i64, Invoice>>,
    payments: RwLock<HashMap<i64, Vec<Payment>>>,
    pay_records: RwLock<HashMap<String, PayRecord>>,
    processed_events: RwLock<HashMap<String, DateTime<Utc>>>,
    next_user_id: AtomicI64,
    next_plan_id: AtomicI64,
    next_subscription_id: AtomicI64,
    next_invoice_id: AtomicI64,
    next_payment_id: AtomicI64,
}

fn next_id(counter: &AtomicI64) -> i64 {
    counter.fetch_add(1, Ordering::SeqCst) + 1
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event ids marked as processed.
    pub async fn processed_events(&self) -> Vec<String> {
        self.inner.processed_events.read().await.keys().cloned().collect()
    }

    async fn with_payments(&self, mut invoice: Invoice) -> Invoice {
        invoice.payments = self
            .inner
            .payments
            .read()
            .await
            .get(&invoice.id)
            .cloned()
            .unwrap_or_default();
        invoice
    }
}

fn plan_from_input(id: i64, input: PlanInput, created_at: DateTime<Utc>) -> Plan {
    Plan {
        id,
        name: input.name,
        description: input.description,
        price_cents: input.price_cents,
        interval: input.interval,
        max_users: input.max_users,
        features: input.features,
        active: input.active,
        created_at,
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        let mut tenants: Vec<Tenant> = self.inner.tenants.read().await.values().cloned().collect();
        tenants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tenants)
    }

    async fn get_tenant(&self, id: Uuid) -> Result<Option<Tenant>> {
        Ok(self.inner.tenants.read().await.get(&id).cloned())
    }

    async fn find_tenant_by_name(&self, name: &str) -> Result<Option<Tenant>> {
        Ok(self
            .inner
            .tenants
            .read()
            .await
            .values()
            .find(|t| t.name == name)
            .cloned())
    }

    async fn create_tenant(&self, name: &str) -> Result<Tenant> {
        let mut tenants = self.inner.tenants.write().await;
        if tenants.values().any(|t| t.name == name) {
            return Err(EshtarekError::field("name", "tenant with this name already exists."));
        }
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: name.to_string(),
            active: true,
            created_at: Utc::now(),
        };
        tenants.insert(tenant.id, tenant.clone());
        Ok(tenant)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.inner.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .inner
            .users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(&self, new: NewUser) -> Result<User> {
        let mut users = self.inner.users.write().await;
        if users.values().any(|u| u.username == new.username) {
            return Err(EshtarekError::field("username", "Username already exists"));
        }
        let user = User {
            id: next_id(&self.inner.next_user_id),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            is_active: true,
            tenant_id: new.tenant_id,
            role: new.role,
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn count_tenant_users(&self, tenant_id: Uuid) -> Result<usize> {
        Ok(self
            .inner
            .users
            .read()
            .await
            .values()
            .filter(|u| u.tenant_id == tenant_id)
            .count())
    }
}

#[async_trait]
impl BillingStore for InMemoryStore {
    async fn list_plans(&self, include_inactive: bool) -> Result<Vec<Plan>> {
        let mut plans: Vec<Plan> = self
            .inner
            .plans
            .read()
            .await
            .values()
            .filter(|p| include_inactive || p.active)
            .cloned()
            .collect();
        plans.sort_by(|a, b| a.price_cents.cmp(&b.price_cents).then_with(|| a.name.cmp(&b.name)));
        Ok(plans)
    }

    async fn get_plan(&self, plan_id: i64) -> Result<Option<Plan>> {
        Ok(self.inner.plans.read().await.get(&plan_id).cloned())
    }

    async fn insert_plan(&self, input: PlanInput) -> Result<Plan> {
        let mut plans = self.inner.plans.write().await;
        if plans.values().any(|p| p.name == input.name) {
            return Err(BillingError::PlanNameTaken { name: input.name }.into());
        }
        let plan = plan_from_input(next_id(&self.inner.next_plan_id), input, Utc::now());
        plans.insert(plan.id, plan.clone());
        Ok(plan)
    }

    async fn update_plan(&self, plan_id: i64, input: PlanInput) -> Result<Plan> {
        let mut plans = self.inner.plans.write().await;
        let created_at = plans
            .get(&plan_id)
            .map(|p| p.created_at)
            .ok_or(BillingError::PlanNotFound { plan_id })?;
        if plans.values().any(|p| p.id != plan_id && p.name == input.name) {
            return Err(BillingError::PlanNameTaken { name: input.name }.into());
        }
        let plan = plan_from_input(plan_id, input, created_at);
        plans.insert(plan_id, plan.clone());
        Ok(plan)
    }

    async fn delete_plan(&self, plan_id: i64) -> Result<()> {
        self.inner
            .plans
            .write()
            .await
            .remove(&plan_id)
            .map(|_| ())
            .ok_or_else(|| BillingError::PlanNotFound { plan_id }.into())
    }

    async fn plan_in_use(&self, plan_id: i64) -> Result<bool> {
        Ok(self
            .inner
            .subscriptions
            .read()
            .await
            .values()
            .any(|s| s.plan_id == plan_id))
    }

    async fn list_subscriptions(&self, tenant_id: Option<Uuid>) -> Result<Vec<Subscription>> {
        let mut subscriptions: Vec<Subscription> = self
            .inner
            .subscriptions
            .read()
            .await
            .values()
            .filter(|s| tenant_id.is_none_or(|t| s.tenant_id == t))
            .cloned()
            .collect();
        subscriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(subscriptions)
    }

    async fn get_subscription(&self, subscription_id: i64) -> Result<Option<Subscription>> {
        Ok(self.inner.subscriptions.read().await.get(&subscription_id).cloned())
    }

    async fn insert_subscription(&self, new: NewSubscription) -> Result<Subscription> {
        let now = Utc::now();
        let subscription = Subscription {
            id: next_id(&self.inner.next_subscription_id),
            tenant_id: new.tenant_id,
            plan_id: new.plan_id,
            status: new.status,
            started_at: now,
            current_period_end: None,
            cancel_at_period_end: false,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .subscriptions
            .write()
            .await
            .insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn save_subscription(&self, subscription: &Subscription) -> Result<()> {
        let mut subscriptions = self.inner.subscriptions.write().await;
        match subscriptions.get_mut(&subscription.id) {
            Some(existing) => {
                *existing = subscription.clone();
                Ok(())
            }
            None => Err(BillingError::SubscriptionNotFound {
                subscription_id: subscription.id,
            }
            .into()),
        }
    }

    async fn delete_subscription(&self, subscription_id: i64) -> Result<usize> {
        let mut subscriptions = self.inner.subscriptions.write().await;
        if subscriptions.remove(&subscription_id).is_none() {
            return Err(BillingError::SubscriptionNotFound { subscription_id }.into());
        }

        let mut invoices = self.inner.invoices.write().await;
        let removed: HashSet<i64> = invoices
            .values()
            .filter(|i| i.subscription_id == subscription_id)
            .map(|i| i.id)
            .collect();
        invoices.retain(|id, _| !removed.contains(id));

        let mut payments = self.inner.payments.write().await;
        payments.retain(|invoice_id, _| !removed.contains(invoice_id));

        Ok(removed.len())
    }

    async fn list_invoices(&self, tenant_id: Option<Uuid>) -> Result<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .inner
            .invoices
            .read()
            .await
            .values()
            .filter(|i| tenant_id.is_none_or(|t| i.tenant_id == t))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.issued_at.cmp(&a.issued_at).then_with(|| b.id.cmp(&a.id)));

        let payments = self.inner.payments.read().await;
        for invoice in &mut invoices {
            invoice.payments = payments.get(&invoice.id).cloned().unwrap_or_default();
        }
        Ok(invoices)
    }

    async fn get_invoice(&self, invoice_id: i64) -> Result<Option<Invoice>> {
        let invoice = self.inner.invoices.read().await.get(&invoice_id).cloned();
        match invoice {
            Some(invoice) => Ok(Some(self.with_payments(invoice).await)),
            None => Ok(None),
        }
    }

    async fn insert_invoice(&self, new: NewInvoice) -> Result<Invoice> {
        if !self
            .inner
            .subscriptions
            .read()
            .await
            .contains_key(&new.subscription_id)
        {
            return Err(BillingError::SubscriptionNotFound {
                subscription_id: new.subscription_id,
            }
            .into());
        }

        let now = Utc::now();
        let invoice = Invoice {
            id: next_id(&self.inner.next_invoice_id),
            tenant_id: new.tenant_id,
            subscription_id: new.subscription_id,
            amount_cents: new.amount_cents,
            currency: new.currency,
            status: InvoiceStatus::Due,
            period_start: new.period_start,
            period_end: None,
            issued_at: now,
            paid_at: None,
            created_at: now,
            updated_at: now,
            payments: Vec::new(),
        };
        self.inner.invoices.write().await.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    async fn save_invoice(&self, invoice: &Invoice) -> Result<()> {
        let mut invoices = self.inner.invoices.write().await;
        match invoices.get_mut(&invoice.id) {
            Some(existing) => {
                *existing = Invoice {
                    payments: Vec::new(),
                    ..invoice.clone()
                };
                Ok(())
            }
            None => Err(BillingError::InvoiceNotFound {
                invoice_id: invoice.id,
            }
            .into()),
        }
    }

    async fn record_payment(&self, invoice_id: i64, new: NewPayment) -> Result<Payment> {
        if !self.inner.invoices.read().await.contains_key(&invoice_id) {
            return Err(BillingError::InvoiceNotFound { invoice_id }.into());
        }
        let payment = Payment {
            id: next_id(&self.inner.next_payment_id),
            amount_cents: new.amount_cents,
            status: new.status,
            provider_ref: new.provider_ref,
            source: new.source,
            created_at: Utc::now(),
        };
        self.inner
            .payments
            .write()
            .await
            .entry(invoice_id)
            .or_default()
            .push(payment.clone());
        Ok(payment)
    }

    async fn get_pay_record(&self, key: &str) -> Result<Option<PayRecord>> {
        Ok(self.inner.pay_records.read().await.get(key).cloned())
    }

    async fn save_pay_record(&self, key: &str, record: PayRecord) -> Result<()> {
        self.inner
            .pay_records
            .write()
            .await
            .insert(key.to_string(), record);
        Ok(())
    }

    async fn is_event_processed(&self, event_id: &str) -> Result<bool> {
        Ok(self.inner.processed_events.read().await.contains_key(event_id))
    }

    async fn mark_event_processed(&self, event_id: &str) -> Result<()> {
        self.inner
            .processed_events
            .write()
            .await
            .insert(event_id.to_string(), Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::billing::{PaymentSource, SubscriptionStatus};

    async fn seeded() -> (InMemoryStore, Tenant, Plan) {
        let store = InMemoryStore::new();
        let tenant = store.create_tenant("Acme").await.unwrap();
        let plan = store.insert_plan(PlanInput::new("Basic", 1000)).await.unwrap();
        (store, tenant, plan)
    }

    async fn subscribe(store: &InMemoryStore, tenant: &Tenant, plan: &Plan) -> Subscription {
        store
            .insert_subscription(NewSubscription {
                tenant_id: tenant.id,
                plan_id: plan.id,
                status: SubscriptionStatus::Active,
            })
            .await
            .unwrap()
    }

    async fn invoice_for(store: &InMemoryStore, subscription: &Subscription) -> Invoice {
        store
            .insert_invoice(NewInvoice {
                tenant_id: subscription.tenant_id,
                subscription_id: subscription.id,
                amount_cents: 1000,
                currency: "USD".to_string(),
                period_start: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_unique_names() {
        let (store, _, _) = seeded().await;
        assert!(store.create_tenant("Acme").await.is_err());
        let err = store.insert_plan(PlanInput::new("Basic", 5)).await.unwrap_err();
        assert!(matches!(err, EshtarekError::Validation(_)));
    }

    #[tokio::test]
    async fn test_plans_ordered_by_price_then_name() {
        let store = InMemoryStore::new();
        store.insert_plan(PlanInput::new("Pro", 5000)).await.unwrap();
        store.insert_plan(PlanInput::new("Zeta", 1000)).await.unwrap();
        store.insert_plan(PlanInput::new("Alpha", 1000)).await.unwrap();
        store.insert_plan(PlanInput::new("Legacy", 10).inactive()).await.unwrap();

        let names: Vec<String> = store.list_plans(false).await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Alpha", "Zeta", "Pro"]);
        assert_eq!(store.list_plans(true).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_users_counted_per_tenant() {
        let (store, tenant, _) = seeded().await;
        for name in ["a", "b"] {
            store
                .create_user(NewUser {
                    username: name.to_string(),
                    email: String::new(),
                    password_hash: "x".to_string(),
                    tenant_id: tenant.id,
                    role: Role::TenantUser,
                })
                .await
                .unwrap();
        }
        assert_eq!(store.count_tenant_users(tenant.id).await.unwrap(), 2);
        assert_eq!(store.count_tenant_users(Uuid::new_v4()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_subscription_cascades_invoices() {
        let (store, tenant, plan) = seeded().await;
        let subscription = subscribe(&store, &tenant, &plan).await;
        let invoice = invoice_for(&store, &subscription).await;
        store
            .record_payment(invoice.id, NewPayment::failed(1000, "mock_txn_failed", PaymentSource::Direct))
            .await
            .unwrap();

        assert!(store.plan_in_use(plan.id).await.unwrap());
        assert_eq!(store.delete_subscription(subscription.id).await.unwrap(), 1);
        assert!(store.get_invoice(invoice.id).await.unwrap().is_none());
        assert!(!store.plan_in_use(plan.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_save_invoice_keeps_ledger() {
        let (store, tenant, plan) = seeded().await;
        let subscription = subscribe(&store, &tenant, &plan).await;
        let invoice = invoice_for(&store, &subscription).await;

        store
            .record_payment(invoice.id, NewPayment::succeeded(1000, "mock_txn", PaymentSource::Direct))
            .await
            .unwrap();
        let mut paid = invoice.clone();
        paid.status = InvoiceStatus::Paid;
        store.save_invoice(&paid).await.unwrap();

        let stored = store.get_invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvoiceStatus::Paid);
        assert_eq!(stored.payments.len(), 1);
    }

    #[tokio::test]
    async fn test_invoice_requires_subscription() {
        let store = InMemoryStore::new();
        let result = store
            .insert_invoice(NewInvoice {
                tenant_id: Uuid::new_v4(),
                subscription_id: 99,
                amount_cents: 1,
                currency: "USD".to_string(),
                period_start: None,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_processed_events() {
        let store = InMemoryStore::new();
        assert!(!store.is_event_processed("evt_1").await.unwrap());
        store.mark_event_processed("evt_1").await.unwrap();
        assert!(store.is_event_processed("evt_1").await.unwrap());
        assert_eq!(store.processed_events().await, vec!["evt_1".to_string()]);
    }
}
