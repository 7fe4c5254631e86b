//! Seeded in-memory world for endpoint and client tests.

use super::scenario::{self, Scenario};
use crate::accounts::{AccountStore, NewUser, Role, Tenant, User};
use crate::app::AppContext;
use crate::auth::{JwtIssuer, JwtIssuerConfig, PasswordConfig, PasswordHasher, TokenSubject};
use crate::billing::{
    BillingStore, DEFAULT_CURRENCY, Invoice, NewInvoice, NewSubscription, Plan, PlanInput, RecordingAuditLogger,
    Subscription, SubscriptionStatus,
};
use crate::client::{ApiClient, ClientContext, RecordingNotifier};
use crate::config::{Config, ConfigBuilder};
use crate::core::{API_PREFIX, App};
use crate::storage::InMemoryStore;
use axum::Router;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const TEST_JWT_SECRET: &str = "eshtarek-test-secret-0123456789abcdef";
pub const TEST_ISSUER: &str = "eshtarek-test";
/// Password of every seeded user.
pub const TEST_PASSWORD: &str = "password123";

/// Three tenants, four users and two plans.
///
/// `admin` is the platform admin. Acme has a tenant admin and a tenant user;
/// Globex has a tenant admin. Nobody is subscribed yet.
pub struct TestWorld {
    pub store: InMemoryStore,
    pub context: AppContext,
    pub config: Config,
    pub audit: Arc<RecordingAuditLogger>,
    pub platform: Tenant,
    pub acme: Tenant,
    pub globex: Tenant,
    pub admin: User,
    pub acme_admin: User,
    pub acme_user: User,
    pub globex_admin: User,
    /// $9.99 monthly, 5 seats.
    pub basic: Plan,
    /// $29.99 monthly, 20 seats.
    pub pro: Plan,
}

impl TestWorld {
    pub async fn new() -> Self {
        let store = InMemoryStore::new();
        let audit = Arc::new(RecordingAuditLogger::new());
        let hasher = PasswordHasher::new(PasswordConfig::fast());
        let config = ConfigBuilder::new()
            .with_host("127.0.0.1")
            .with_jwt_secret(TEST_JWT_SECRET)
            .build()
            .expect("test config");

        let context = AppContext::builder()
            .with_jwt(JwtIssuer::new(JwtIssuerConfig::with_secret(TEST_JWT_SECRET, TEST_ISSUER)))
            .with_store(store.clone())
            .with_password_hasher(hasher.clone())
            .with_audit_logger(audit.clone())
            .build()
            .expect("test context");

        let platform = store.create_tenant("Platform").await.unwrap();
        let acme = store.create_tenant("Acme").await.unwrap();
        let globex = store.create_tenant("Globex").await.unwrap();

        let password_hash = hasher.hash(TEST_PASSWORD).unwrap();
        let user = |username: &str, tenant: &Tenant, role: Role| NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: password_hash.clone(),
            tenant_id: tenant.id,
            role,
        };
        let admin = store.create_user(user("admin", &platform, Role::Admin)).await.unwrap();
        let acme_admin = store
            .create_user(user("acme_admin", &acme, Role::TenantAdmin))
            .await
            .unwrap();
        let acme_user = store
            .create_user(user("acme_user", &acme, Role::TenantUser))
            .await
            .unwrap();
        let globex_admin = store
            .create_user(user("globex_admin", &globex, Role::TenantAdmin))
            .await
            .unwrap();

        let basic = store
            .insert_plan(PlanInput::new("Basic", 999).max_users(5))
            .await
            .unwrap();
        let pro = store
            .insert_plan(PlanInput::new("Pro", 2999).max_users(20))
            .await
            .unwrap();

        Self {
            store,
            context,
            config,
            audit,
            platform,
            acme,
            globex,
            admin,
            acme_admin,
            acme_user,
            globex_admin,
            basic,
            pro,
        }
    }

    pub fn router(&self) -> Router {
        App::new(self.config.clone(), self.context.clone()).into_router()
    }

    /// Access token for a seeded user.
    pub fn token(&self, user: &User) -> String {
        let subject = TokenSubject {
            user_id: user.id,
            tenant_id: user.tenant_id,
            role: user.role,
        };
        self.context.jwt.issue_access_token(&subject).unwrap().0
    }

    pub fn get(&self, uri: &str) -> Scenario {
        scenario::get(self.router(), uri)
    }

    pub fn post(&self, uri: &str) -> Scenario {
        scenario::post(self.router(), uri)
    }

    pub fn put(&self, uri: &str) -> Scenario {
        scenario::put(self.router(), uri)
    }

    pub fn delete(&self, uri: &str) -> Scenario {
        scenario::delete(self.router(), uri)
    }

    /// Insert a subscription directly, bypassing the API rules.
    pub async fn subscribe(&self, tenant: &Tenant, plan: &Plan, status: SubscriptionStatus) -> Subscription {
        self.store
            .insert_subscription(NewSubscription {
                tenant_id: tenant.id,
                plan_id: plan.id,
                status,
            })
            .await
            .unwrap()
    }

    /// Insert a due invoice for the subscription's plan price.
    pub async fn invoice(&self, subscription: &Subscription) -> Invoice {
        let plan = self.store.get_plan(subscription.plan_id).await.unwrap().unwrap();
        self.store
            .insert_invoice(NewInvoice {
                tenant_id: subscription.tenant_id,
                subscription_id: subscription.id,
                amount_cents: plan.price_cents,
                currency: DEFAULT_CURRENCY.to_string(),
                period_start: Some(chrono::Utc::now()),
            })
            .await
            .unwrap()
    }

    pub async fn get_invoice(&self, invoice_id: i64) -> Invoice {
        self.store.get_invoice(invoice_id).await.unwrap().unwrap()
    }

    /// Serve the full app on an ephemeral local port.
    pub async fn spawn(&self) -> TestServer {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, signal) = oneshot::channel::<()>();
        let app = App::new(self.config.clone(), self.context.clone());
        let handle = tokio::spawn(async move {
            let shutdown = async move {
                let _ = signal.await;
            };
            let _ = app.serve_with_listener(listener, shutdown).await;
        });

        TestServer {
            base_url: format!("http://{addr}"),
            shutdown: Some(shutdown),
            handle,
        }
    }
}

/// A running server; shuts down on drop.
pub struct TestServer {
    pub base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub fn api_url(&self) -> String {
        format!("{}{}", self.base_url, API_PREFIX)
    }

    pub fn api_client(&self) -> ApiClient {
        ApiClient::new(self.api_url())
    }

    /// A client logged in as `username` over HTTP.
    pub async fn login(&self, username: &str) -> ApiClient {
        let client = self.api_client();
        client.login(username, TEST_PASSWORD).await.unwrap();
        client
    }

    /// Client context with a recording notifier, logged in as `username`.
    pub async fn context_for(&self, username: &str) -> (ClientContext, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = ClientContext::new(self.login(username).await, notifier.clone());
        (ctx, notifier)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.handle.abort();
    }
}
