use crate::accounts::{AccountService, AccountStore};
use crate::auth::{JwtIssuer, JwtIssuerConfig, PasswordHasher};
use crate::billing::{
    BillingAuditLogger, BillingStore, InvoiceManager, LockRegistry, PlanManager, Settlement,
    SubscriptionManager, TracingAuditLogger, WebhookHandler,
};
use crate::config::Config;
use crate::error::{EshtarekError, Result};
use crate::storage::InMemoryStore;
use std::sync::Arc;

/// Application context shared by every request handler.
///
/// Holds the JWT issuer and the services, each behind an `Arc` so cloning
/// the context is cheap.
#[derive(Clone)]
pub struct AppContext {
    pub jwt: Arc<JwtIssuer>,
    pub accounts: Arc<AccountService>,
    pub plans: Arc<PlanManager>,
    pub subscriptions: Arc<SubscriptionManager>,
    pub invoices: Arc<InvoiceManager>,
    pub webhooks: Arc<WebhookHandler>,
}

impl AppContext {
    /// Builder pattern for constructing AppContext
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::new()
    }

    /// Context backed by `store` with auth settings from `config`.
    pub fn from_config(config: &Config, store: InMemoryStore) -> Result<Self> {
        let jwt = JwtIssuer::new(JwtIssuerConfig::from_auth_config(&config.auth)?);
        Self::builder().with_jwt(jwt).with_store(store).build()
    }
}

/// Builder for AppContext with fluent API
#[must_use = "builder does nothing until you call build()"]
#[derive(Default)]
pub struct AppContextBuilder {
    jwt: Option<JwtIssuer>,
    accounts: Option<Arc<dyn AccountStore>>,
    billing: Option<Arc<dyn BillingStore>>,
    hasher: Option<PasswordHasher>,
    audit: Option<Arc<dyn BillingAuditLogger>>,
}

impl AppContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jwt(mut self, jwt: JwtIssuer) -> Self {
        self.jwt = Some(jwt);
        self
    }

    /// Use one in-memory store for accounts and billing.
    pub fn with_store(self, store: InMemoryStore) -> Self {
        self.with_stores(Arc::new(store.clone()), Arc::new(store))
    }

    pub fn with_stores(mut self, accounts: Arc<dyn AccountStore>, billing: Arc<dyn BillingStore>) -> Self {
        self.accounts = Some(accounts);
        self.billing = Some(billing);
        self
    }

    pub fn with_password_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = Some(hasher);
        self
    }

    pub fn with_audit_logger(mut self, audit: Arc<dyn BillingAuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn build(self) -> Result<AppContext> {
        let jwt = Arc::new(
            self.jwt
                .ok_or_else(|| EshtarekError::internal("JWT issuer not configured"))?,
        );

        let (accounts_store, billing_store) = match (self.accounts, self.billing) {
            (Some(accounts), Some(billing)) => (accounts, billing),
            (None, None) => {
                let store = InMemoryStore::new();
                let accounts: Arc<dyn AccountStore> = Arc::new(store.clone());
                let billing: Arc<dyn BillingStore> = Arc::new(store);
                (accounts, billing)
            }
            _ => return Err(EshtarekError::internal("Account and billing stores must be configured together")),
        };

        let audit = self.audit.unwrap_or_else(|| Arc::new(TracingAuditLogger));
        let locks = Arc::new(LockRegistry::new());
        let settlement = Arc::new(Settlement::new(billing_store.clone(), locks.clone(), audit.clone()));

        let accounts = AccountService::new(
            accounts_store.clone(),
            billing_store.clone(),
            self.hasher.unwrap_or_default(),
            jwt.clone(),
            locks.clone(),
        );
        let plans = PlanManager::new(billing_store.clone());
        let subscriptions = SubscriptionManager::new(
            billing_store.clone(),
            accounts_store,
            locks.clone(),
            audit.clone(),
        );
        let invoices = InvoiceManager::new(
            billing_store.clone(),
            locks.clone(),
            settlement.clone(),
            audit.clone(),
        );
        let webhooks = WebhookHandler::new(billing_store, locks, settlement, audit);

        Ok(AppContext {
            jwt,
            accounts: Arc::new(accounts),
            plans: Arc::new(plans),
            subscriptions: Arc::new(subscriptions),
            invoices: Arc::new(invoices),
            webhooks: Arc::new(webhooks),
        })
    }
}
