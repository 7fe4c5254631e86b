//! HTTP transport shared by every client orchestrator.
//!
//! Attaches the bearer token, decodes error bodies and discards the stored
//! credentials on any 401, publishing [`SessionState::LoggedOut`] so
//! observers can react the same way regardless of which call failed.

use super::error::{ClientError, ClientResult};
use crate::accounts::LoginResponse;
use crate::billing::{IDEMPOTENCY_KEY_HEADER, IDEMPOTENT_REPLAYED_HEADER};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};

const USER_AGENT: &str = concat!("eshtarek-client/", env!("CARGO_PKG_VERSION"));

/// Token pair returned by login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access: String,
    pub refresh: String,
}

impl From<&LoginResponse> for Credentials {
    fn from(login: &LoginResponse) -> Self {
        Self {
            access: login.access.clone(),
            refresh: login.refresh.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
    /// Credentials were discarded after a 401.
    LoggedOut,
}

/// A decoded success body plus whether the server replayed it from an
/// earlier idempotent request.
#[derive(Debug, Clone)]
pub struct Replayable<T> {
    pub body: T,
    pub replayed: bool,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<RwLock<Option<Credentials>>>,
    session: Arc<watch::Sender<SessionState>>,
}

impl ApiClient {
    /// `base_url` includes the API prefix, e.g. `http://127.0.0.1:8000/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let (session, _) = watch::channel(SessionState::Anonymous);

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: Arc::new(RwLock::new(None)),
            session: Arc::new(session),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.write().await = Some(credentials);
        self.session.send_replace(SessionState::Authenticated);
    }

    pub async fn credentials(&self) -> Option<Credentials> {
        self.credentials.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.credentials.read().await.is_some()
    }

    /// Drop the stored credentials.
    pub async fn logout(&self) {
        self.credentials.write().await.take();
        self.session.send_replace(SessionState::Anonymous);
    }

    pub fn session_state(&self) -> SessionState {
        *self.session.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    /// `POST /auth/token/`, storing the returned token pair.
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<LoginResponse> {
        let body = serde_json::json!({"username": username, "password": password});
        let login: LoginResponse = self.post("/auth/token/", &body).await?;
        self.set_credentials(Credentials::from(&login)).await;
        tracing::debug!(username, role = %login.role, "logged in");
        Ok(login)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.dispatch(self.request(Method::GET, path)).await?;
        decode(response).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.dispatch(self.request(Method::POST, path).json(body)).await?;
        decode(response).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.dispatch(self.request(Method::PUT, path).json(body)).await?;
        decode(response).await
    }

    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        self.dispatch(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    /// POST with an optional `Idempotency-Key` header.
    pub async fn post_idempotent<B, T>(&self, path: &str, body: &B, key: Option<&str>) -> ClientResult<Replayable<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.request(Method::POST, path).json(body);
        if let Some(key) = key {
            request = request.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        let response = self.dispatch(request).await?;
        let replayed = response
            .headers()
            .get(IDEMPOTENT_REPLAYED_HEADER)
            .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(b"true"));
        Ok(Replayable {
            body: decode(response).await?,
            replayed,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    async fn dispatch(&self, request: RequestBuilder) -> ClientResult<Response> {
        let token = self.credentials.read().await.as_ref().map(|c| c.access.clone());
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(ClientError::network)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            self.force_logout().await;
        }
        tracing::debug!(path = %url, status = status.as_u16(), "request failed");
        Err(ClientError::from_response(status.as_u16(), &body))
    }

    async fn force_logout(&self) {
        if self.credentials.write().await.take().is_some() {
            tracing::info!("credentials rejected; logging out");
            self.session.send_replace(SessionState::LoggedOut);
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("session", &*self.session.borrow())
            .finish()
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let bytes = response.bytes().await.map_err(ClientError::network)?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}
