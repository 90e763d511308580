//! Remote backend-as-a-service over HTTP/JSON.
//!
//! Entities live under `{base}/api/apps/{app}/entities/{Collection}` and
//! accounts under `{base}/api/apps/{app}/auth`. Every request carries the
//! API key as a bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;

use tryout_core::model::User;
use tryout_core::traits::{
    AuthProvider, Collection, Credentials, EntityStore, Query, Record, Registration,
};
use tryout_core::{Result, TryoutError};

use crate::error::StoreError;

pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client for the hosted entity store and its auth endpoints.
pub struct RemoteStore {
    base_url: Url,
    app_id: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct UpsertBody<'a> {
    key: &'a Record,
    fields: &'a Record,
}

impl RemoteStore {
    pub fn new(base_url: &str, app_id: &str, api_key: &str) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Network(format!("invalid base url '{base_url}': {e}")))?;
        if app_id.is_empty() {
            return Err(StoreError::Network("app id is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| StoreError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            app_id: app_id.to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    /// `{base}/api/apps/{app}/{segments...}`
    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Network(format!("cannot use {} as a base url", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "apps", self.app_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn entity_url(&self, collection: Collection, id: Option<&str>) -> Result<Url, StoreError> {
        match id {
            Some(id) => self.url(&["entities", collection.name(), id]),
            None => self.url(&["entities", collection.name()]),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// Send a request and turn non-success statuses into [`StoreError::Http`].
    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = self.authorized(request).send().await?;
        let status = response.status().as_u16();
        if status >= 400 {
            let message = response.text().await.unwrap_or_default();
            tracing::debug!(status, "remote store rejected request");
            return Err(StoreError::Http { status, message });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(format!("failed to parse response: {e}")))
    }
}

/// Map a failed entity call, turning 404 into `NotFound` for `id`.
fn entity_error(err: StoreError, collection: Collection, id: &str) -> TryoutError {
    match err {
        StoreError::Http { status: 404, .. } => TryoutError::not_found(collection, id),
        other => other.into(),
    }
}

#[async_trait]
impl EntityStore for RemoteStore {
    fn name(&self) -> &str {
        "remote"
    }

    #[instrument(skip(self), fields(collection = %collection))]
    async fn get(&self, collection: Collection, id: &str) -> Result<Record> {
        let url = self.entity_url(collection, Some(id))?;
        self.send_json(self.client.get(url))
            .await
            .map_err(|e| entity_error(e, collection, id))
    }

    #[instrument(skip(self, query), fields(collection = %collection))]
    async fn filter(&self, collection: Collection, query: &Query) -> Result<Vec<Record>> {
        let mut url = self.entity_url(collection, None)?;
        {
            let mut pairs = url.query_pairs_mut();
            if !query.filter.is_empty() {
                let q = serde_json::to_string(&query.filter).map_err(TryoutError::remote)?;
                pairs.append_pair("q", &q);
            }
            if let Some(order) = &query.order {
                pairs.append_pair("sort", &order.to_string());
            }
            if let Some(limit) = query.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(self.send_json(self.client.get(url)).await?)
    }

    #[instrument(skip(self, fields), fields(collection = %collection))]
    async fn create(&self, collection: Collection, fields: Record) -> Result<Record> {
        let url = self.entity_url(collection, None)?;
        Ok(self.send_json(self.client.post(url).json(&fields)).await?)
    }

    #[instrument(skip(self, fields), fields(collection = %collection))]
    async fn update(&self, collection: Collection, id: &str, fields: Record) -> Result<Record> {
        let url = self.entity_url(collection, Some(id))?;
        self.send_json(self.client.put(url).json(&fields))
            .await
            .map_err(|e| entity_error(e, collection, id))
    }

    #[instrument(skip(self), fields(collection = %collection))]
    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let url = self.entity_url(collection, Some(id))?;
        self.send(self.client.delete(url))
            .await
            .map_err(|e| entity_error(e, collection, id))?;
        Ok(())
    }

    #[instrument(skip(self, key, fields), fields(collection = %collection))]
    async fn upsert(
        &self,
        collection: Collection,
        key: &Record,
        fields: Record,
    ) -> Result<Record> {
        let url = self.url(&["entities", collection.name(), "upsert"])?;
        let body = UpsertBody {
            key,
            fields: &fields,
        };
        Ok(self.send_json(self.client.post(url).json(&body)).await?)
    }
}

#[async_trait]
impl AuthProvider for RemoteStore {
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    async fn register(&self, registration: &Registration) -> Result<User> {
        let url = self.url(&["auth", "register"])?;
        Ok(self.send_json(self.client.post(url).json(registration)).await?)
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn login(&self, credentials: &Credentials) -> Result<User> {
        let url = self.url(&["auth", "login"])?;
        self.send_json(self.client.post(url).json(credentials))
            .await
            .map_err(|e| match e {
                StoreError::Http {
                    status: 401 | 403, ..
                } => TryoutError::InvalidCredentials,
                other => other.into(),
            })
    }

    #[instrument(skip(self))]
    async fn get_user(&self, id: &str) -> Result<User> {
        let url = self.url(&["auth", "users", id])?;
        self.send_json(self.client.get(url))
            .await
            .map_err(|e| entity_error(e, Collection::User, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    async fn store(server: &MockServer) -> RemoteStore {
        RemoteStore::new(&server.uri(), "app-1", "test-key").unwrap()
    }

    #[tokio::test]
    async fn get_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/apps/app-1/entities/QuestionPackage/pkg-1"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "pkg-1", "title": "SKD #1"})),
            )
            .mount(&server)
            .await;

        let record = store(&server)
            .await
            .get(Collection::QuestionPackage, "pkg-1")
            .await
            .unwrap();
        assert_eq!(record["title"], json!("SKD #1"));
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/apps/app-1/entities/TryoutSession/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let err = store(&server)
            .await
            .get(Collection::TryoutSession, "nope")
            .await
            .unwrap_err();
        assert!(
            matches!(err, TryoutError::NotFound { collection: Collection::TryoutSession, ref id } if id == "nope")
        );
    }

    #[tokio::test]
    async fn filter_encodes_query_sort_and_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/apps/app-1/entities/TryoutSession"))
            .and(query_param("q", r#"{"package_id":"p1"}"#))
            .and(query_param("sort", "-total_score"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "s1", "total_score": 90},
                {"id": "s2", "total_score": 70},
            ])))
            .mount(&server)
            .await;

        let query = Query::new()
            .eq("package_id", "p1")
            .order_by("-total_score".parse().unwrap())
            .limit(5);
        let records = store(&server)
            .await
            .filter(Collection::TryoutSession, &query)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], json!("s1"));
    }

    #[tokio::test]
    async fn upsert_posts_key_and_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/apps/app-1/entities/UserAnswer/upsert"))
            .and(body_json(json!({
                "key": {"session_id": "s1", "question_id": "q1"},
                "fields": {"user_answer": "B"},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "a1", "session_id": "s1", "question_id": "q1", "user_answer": "B",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let key = record(json!({"session_id": "s1", "question_id": "q1"}));
        let saved = store(&server)
            .await
            .upsert(Collection::UserAnswer, &key, record(json!({"user_answer": "B"})))
            .await
            .unwrap();
        assert_eq!(saved["id"], json!("a1"));
    }

    #[tokio::test]
    async fn client_and_server_errors_are_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/apps/app-1/entities/Payment"))
            .respond_with(ResponseTemplate::new(422).set_body_string("amount is required"))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/apps/app-1/entities/Payment/p1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let remote = store(&server).await;
        let err = remote
            .create(Collection::Payment, Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TryoutError::Validation(ref m) if m == "amount is required"));

        let err = remote.delete(Collection::Payment, "p1").await.unwrap_err();
        assert!(err.is_remote());
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn malformed_body_is_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/apps/app-1/entities/Question"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = store(&server)
            .await
            .filter(Collection::Question, &Query::new())
            .await
            .unwrap_err();
        assert!(err.is_remote());
    }

    #[tokio::test]
    async fn login_maps_unauthorized_to_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/apps/app-1/auth/login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad password"))
            .mount(&server)
            .await;

        let err = store(&server)
            .await
            .login(&Credentials {
                email: "a@b.c".into(),
                password: "x".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TryoutError::InvalidCredentials));
    }

    #[tokio::test]
    async fn register_and_get_user() {
        let server = MockServer::start().await;
        let user = json!({
            "id": "u1",
            "full_name": "Siti",
            "email": "siti@example.com",
            "phone": "0812",
            "is_admin": false,
            "subscription_status": "inactive",
        });
        Mock::given(method("POST"))
            .and(path("/api/apps/app-1/auth/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(&user))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/apps/app-1/auth/users/u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&user))
            .mount(&server)
            .await;

        let remote = store(&server).await;
        let created = remote
            .register(&Registration {
                full_name: "Siti".into(),
                email: "siti@example.com".into(),
                phone: "0812".into(),
                password: "secret".into(),
                is_admin: false,
                subscription_status: "inactive".into(),
            })
            .await
            .unwrap();
        assert_eq!(created.id, "u1");
        assert_eq!(remote.get_user("u1").await.unwrap(), created);

        let err = remote.get_user("u2").await.unwrap_err();
        assert!(matches!(err, TryoutError::NotFound { collection: Collection::User, .. }));
    }

    #[tokio::test]
    async fn unreachable_server_is_remote_error() {
        let remote = RemoteStore::new("http://127.0.0.1:1", "app-1", "k").unwrap();
        let err = remote
            .get(Collection::QuestionPackage, "pkg")
            .await
            .unwrap_err();
        assert!(err.is_remote());
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(RemoteStore::new("not a url", "app", "k").is_err());
        assert!(RemoteStore::new("http://localhost", "", "k").is_err());
    }
}
