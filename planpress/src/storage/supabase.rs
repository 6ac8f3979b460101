//! Supabase storage backend.
//!
//! Speaks the storage REST API (`/storage/v1/*`) with a service-account
//! session obtained through the password grant (`/auth/v1/token`). The session
//! is owned by a [`SessionManager`] and re-established shortly before its
//! token expires, so no request ever rides on a single long-lived token.

use super::{ObjectInfo, ObjectStore, Result, StorageError, UploadOptions};
use crate::config::SupabaseSettings;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Tokens are considered stale this long before their reported expiry.
const EXPIRY_MARGIN_SECS: u64 = 30;

#[derive(Debug)]
struct Session {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl Session {
    fn is_fresh(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

/// Owns the authenticated storage session.
///
/// Reads go through an [`ArcSwapOption`] so concurrent requests share the
/// current token without locking; the mutex only serializes re-authentication
/// so an expired token triggers exactly one new password-grant request.
#[derive(Debug)]
pub struct SessionManager {
    client: Client,
    token_url: String,
    anon_key: String,
    email: String,
    password: String,
    current: ArcSwapOption<Session>,
    refresh_lock: tokio::sync::Mutex<()>,
}

#[derive(Debug, Deserialize)]
struct AuthTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

impl SessionManager {
    fn new(client: Client, base_url: &str, settings: &SupabaseSettings) -> Self {
        Self {
            client,
            token_url: format!("{base_url}/auth/v1/token?grant_type=password"),
            anon_key: settings.anon_key.clone(),
            email: settings.email.clone(),
            password: settings.password.clone(),
            current: ArcSwapOption::empty(),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Current bearer token, signing in again if the session expired.
    async fn bearer(&self) -> Result<String> {
        if let Some(session) = self.current.load_full() {
            if session.is_fresh() {
                return Ok(session.access_token.clone());
            }
        }

        let _guard = self.refresh_lock.lock().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(session) = self.current.load_full() {
            if session.is_fresh() {
                return Ok(session.access_token.clone());
            }
        }

        let session = self.sign_in().await?;
        let token = session.access_token.clone();
        self.current.store(Some(Arc::new(session)));
        Ok(token)
    }

    async fn sign_in(&self) -> Result<Session> {
        let response = self
            .client
            .post(&self.token_url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": self.email, "password": self.password }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = error_message(response).await;
            return Err(StorageError::Auth(format!("sign-in failed (HTTP {status}): {message}")));
        }

        let token: AuthTokenResponse = response.json().await?;
        let lifetime = token.expires_in.saturating_sub(EXPIRY_MARGIN_SECS);
        let session = Session {
            access_token: token.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(lifetime as i64),
        };
        tracing::debug!(expires_at = %session.expires_at, "established storage session");
        Ok(session)
    }
}

#[derive(Debug)]
pub struct SupabaseStore {
    client: Client,
    storage_url: String,
    anon_key: String,
    session: SessionManager,
}

impl SupabaseStore {
    /// Connect to a Supabase project and establish the service session.
    ///
    /// Signing in eagerly means bad credentials fail at startup rather than on
    /// the first request.
    pub async fn connect(settings: &SupabaseSettings) -> Result<Self> {
        let client = Client::builder().timeout(settings.request_timeout).build()?;
        let base_url = settings.url.as_str().trim_end_matches('/').to_string();

        let session = SessionManager::new(client.clone(), &base_url, settings);
        session.bearer().await?;

        Ok(Self {
            client,
            storage_url: format!("{base_url}/storage/v1"),
            anon_key: settings.anon_key.clone(),
            session,
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/object/{bucket}/{key}", self.storage_url)
    }
}

/// Parsed entry from the storage list endpoint.
#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    updated_at: Option<DateTime<Utc>>,
    metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

/// Best-effort extraction of the `message` field from an error body.
async fn error_message(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(body)
}

async fn service_error(response: reqwest::Response) -> StorageError {
    let status = response.status().as_u16();
    let message = error_message(response).await;
    let lowered = message.to_ascii_lowercase();
    match status {
        404 => StorageError::NotFound,
        // The storage API reports missing objects as 400 not_found in some paths
        400 if lowered.contains("not_found") || lowered.contains("not found") => StorageError::NotFound,
        401 | 403 => StorageError::Auth(message),
        409 => StorageError::AlreadyExists,
        _ => StorageError::Service { status, message },
    }
}

#[async_trait]
impl ObjectStore for SupabaseStore {
    async fn upload(&self, bucket: &str, key: &str, content: Bytes, options: &UploadOptions) -> Result<()> {
        let token = self.session.bearer().await?;

        let mut request = self
            .client
            .post(self.object_url(bucket, key))
            .bearer_auth(token)
            .header("apikey", &self.anon_key)
            .header("x-upsert", if options.upsert { "true" } else { "false" });
        if let Some(content_type) = &options.content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if let Some(cache_control) = &options.cache_control {
            request = request.header(reqwest::header::CACHE_CONTROL, cache_control);
        }

        let response = request.body(content).send().await?;
        if !response.status().is_success() {
            return Err(service_error(response).await);
        }
        Ok(())
    }

    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let token = self.session.bearer().await?;

        let response = self
            .client
            .get(self.object_url(bucket, key))
            .bearer_auth(token)
            .header("apikey", &self.anon_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }
        Ok(response.bytes().await?)
    }

    async fn list(&self, bucket: &str) -> Result<Vec<ObjectInfo>> {
        let token = self.session.bearer().await?;

        let response = self
            .client
            .post(format!("{}/object/list/{bucket}", self.storage_url))
            .bearer_auth(token)
            .header("apikey", &self.anon_key)
            .json(&json!({
                "prefix": "",
                "limit": 1000,
                "offset": 0,
                "sortBy": { "column": "name", "order": "asc" }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }

        let objects: Vec<ListedObject> = response.json().await?;
        Ok(objects
            .into_iter()
            .map(|o| {
                let size = o
                    .metadata
                    .as_ref()
                    .and_then(|m| m.get("size"))
                    .and_then(serde_json::Value::as_u64);
                ObjectInfo {
                    name: o.name,
                    size,
                    updated_at: o.updated_at,
                }
            })
            .collect())
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<()> {
        let token = self.session.bearer().await?;

        let response = self
            .client
            .delete(self.object_url(bucket, key))
            .bearer_auth(token)
            .header("apikey", &self.anon_key)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }
        match service_error(response).await {
            // Removing an absent key satisfies the trait contract.
            StorageError::NotFound => Ok(()),
            e => Err(e),
        }
    }

    async fn create_signed_url(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String> {
        let token = self.session.bearer().await?;

        let response = self
            .client
            .post(format!("{}/object/sign/{bucket}/{key}", self.storage_url))
            .bearer_auth(token)
            .header("apikey", &self.anon_key)
            .json(&json!({ "expiresIn": ttl.as_secs() }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }

        let signed: SignedUrlResponse = response.json().await?;
        // The API returns a path relative to /storage/v1.
        Ok(format!("{}{}", self.storage_url, signed.signed_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer) -> SupabaseSettings {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        SupabaseSettings {
            url: Url::parse(&server.uri()).unwrap(),
            anon_key: "anon-key".to_string(),
            email: "service@example.com".to_string(),
            password: "hunter2".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }

    fn token_response(token: &str, expires_in: u64) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": token,
            "token_type": "bearer",
            "expires_in": expires_in,
        }))
    }

    async fn mount_sign_in(server: &MockServer, token: &str, expires_in: u64, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon-key"))
            .respond_with(token_response(token, expires_in))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fresh_session_is_reused_across_requests() {
        let server = MockServer::start().await;
        mount_sign_in(&server, "tok-1", 3600, 1).await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/object/tex/plan.tex"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"latex".to_vec()))
            .expect(2)
            .mount(&server)
            .await;

        let store = SupabaseStore::connect(&settings(&server)).await.unwrap();
        assert_eq!(store.download("tex", "plan.tex").await.unwrap().as_ref(), b"latex");
        assert_eq!(store.download("tex", "plan.tex").await.unwrap().as_ref(), b"latex");
    }

    #[tokio::test]
    async fn expired_session_is_reestablished() {
        let server = MockServer::start().await;
        // expires_in below the staleness margin: every request re-authenticates.
        mount_sign_in(&server, "tok-short", 0, 2).await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/object/tex/plan.tex"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"latex".to_vec()))
            .mount(&server)
            .await;

        let store = SupabaseStore::connect(&settings(&server)).await.unwrap();
        store.download("tex", "plan.tex").await.unwrap();
    }

    #[tokio::test]
    async fn bad_credentials_fail_at_connect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "message": "Invalid login credentials",
            })))
            .mount(&server)
            .await;

        let err = SupabaseStore::connect(&settings(&server)).await.unwrap_err();
        match err {
            StorageError::Auth(message) => assert!(message.contains("Invalid login credentials")),
            other => panic!("expected Auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn upload_sends_upsert_and_cache_headers() {
        let server = MockServer::start().await;
        mount_sign_in(&server, "tok-1", 3600, 1).await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/pdf/plan.pdf"))
            .and(header("x-upsert", "true"))
            .and(header("content-type", "application/pdf"))
            .and(header("cache-control", "max-age=3600"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "Key": "pdf/plan.pdf" })))
            .expect(1)
            .mount(&server)
            .await;

        let store = SupabaseStore::connect(&settings(&server)).await.unwrap();
        let options = UploadOptions {
            content_type: Some("application/pdf".to_string()),
            cache_control: Some("max-age=3600".to_string()),
            upsert: true,
        };
        store
            .upload("pdf", "plan.pdf", Bytes::from_static(b"%PDF-1.4"), &options)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_object_maps_to_not_found() {
        let server = MockServer::start().await;
        mount_sign_in(&server, "tok-1", 3600, 1).await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/object/tex/ghost.tex"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "statusCode": "404",
                "error": "not_found",
                "message": "Object not found",
            })))
            .mount(&server)
            .await;

        let store = SupabaseStore::connect(&settings(&server)).await.unwrap();
        let err = store.download("tex", "ghost.tex").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn remove_missing_object_is_ok() {
        let server = MockServer::start().await;
        mount_sign_in(&server, "tok-1", 3600, 1).await;
        Mock::given(method("DELETE"))
            .and(path("/storage/v1/object/pdf/ghost.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = SupabaseStore::connect(&settings(&server)).await.unwrap();
        store.remove("pdf", "ghost.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn signed_url_is_resolved_against_storage_base() {
        let server = MockServer::start().await;
        mount_sign_in(&server, "tok-1", 3600, 1).await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/sign/pdf/plan.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "signedURL": "/object/sign/pdf/plan.pdf?token=abc123",
            })))
            .mount(&server)
            .await;

        let store = SupabaseStore::connect(&settings(&server)).await.unwrap();
        let url = store
            .create_signed_url("pdf", "plan.pdf", Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(
            url,
            format!("{}/storage/v1/object/sign/pdf/plan.pdf?token=abc123", server.uri())
        );
    }

    #[tokio::test]
    async fn list_parses_object_descriptors() {
        let server = MockServer::start().await;
        mount_sign_in(&server, "tok-1", 3600, 1).await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/list/tex"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "name": "lesson_plan_20231105124141.tex",
                    "updated_at": "2023-11-05T12:41:41Z",
                    "metadata": { "size": 1234 }
                },
                { "name": "notes.tex" }
            ])))
            .mount(&server)
            .await;

        let store = SupabaseStore::connect(&settings(&server)).await.unwrap();
        let objects = store.list("tex").await.unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].name, "lesson_plan_20231105124141.tex");
        assert_eq!(objects[0].size, Some(1234));
        assert!(objects[0].updated_at.is_some());
        assert_eq!(objects[1].name, "notes.tex");
        assert_eq!(objects[1].size, None);
    }
}
