// src/token.rs

use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::CommerceCredentials;
use crate::errors::AppError;
use crate::signature;

/// Tokens are treated as expired this long before the provider says so.
pub const EXPIRY_SAFETY_MARGIN_SECS: i64 = 60;

const TOKEN_PATH: &str = "/external/v1/oauth2/token";

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[allow(dead_code)]
    #[serde(default)]
    token_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub token: String,
    pub expires_at_ms: i64,
}

impl CachedToken {
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at_ms
    }
}

/// Owns the single cached bearer token for the commerce API.
///
/// The cache lock is held while a new token is fetched, so concurrent callers
/// that miss wait for the one fetch in flight and then reuse its result.
pub struct TokenManager {
    client: Client,
    base_url: String,
    credentials: CommerceCredentials,
    clock: Arc<dyn Clock>,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        credentials: CommerceCredentials,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            credentials,
            clock,
            cache: Mutex::new(None),
        }
    }

    pub async fn get_valid_token(&self) -> Result<String, AppError> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.is_valid_at(self.clock.now_ms()) {
                tracing::debug!("Token cache HIT");
                return Ok(cached.token.clone());
            }
            tracing::debug!("Token cache EXPIRED, requesting a new token");
        } else {
            tracing::debug!("Token cache MISS, requesting a new token");
        }

        // A failed fetch leaves the cache as it was.
        let fresh = self.fetch_token().await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    async fn fetch_token(&self) -> Result<CachedToken, AppError> {
        let timestamp = self.clock.now_ms();
        let signature = signature::sign(
            &self.credentials.application_id,
            &self.credentials.application_secret,
            timestamp,
        )?;

        let timestamp_text = timestamp.to_string();
        let form = [
            ("client_id", self.credentials.application_id.as_str()),
            ("timestamp", timestamp_text.as_str()),
            ("client_secret_sign", signature.as_str()),
            ("grant_type", "client_credentials"),
            ("type", "SELF"),
        ];

        let url = format!("{}{}", self.base_url, TOKEN_PATH);
        let resp = self.client.post(&url).form(&form).send().await?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .unwrap_or_else(|_| "No error body".to_string());

        if !status.is_success() {
            tracing::error!("Token request failed: Status={}, Body={}", status, body);
            return Err(AppError::Authentication(format!("({}) {}", status, body)));
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Malformed token response: {}", e);
            AppError::Authentication(format!("malformed token response: {}", body))
        })?;

        let expires_at_ms = self.clock.now_ms()
            + (parsed.expires_in - EXPIRY_SAFETY_MARGIN_SECS) * 1000;
        tracing::info!("Issued a new commerce API token (expires_in={}s)", parsed.expires_in);

        Ok(CachedToken {
            token: parsed.access_token,
            expires_at_ms,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use mockito::Matcher;
    use std::sync::atomic::{AtomicI64, Ordering};

    pub(crate) const START_MS: i64 = 1_706_671_059_230;

    pub(crate) struct ManualClock(AtomicI64);

    impl ManualClock {
        pub(crate) fn new(start_ms: i64) -> Self {
            Self(AtomicI64::new(start_ms))
        }

        pub(crate) fn advance_secs(&self, secs: i64) {
            self.0.fetch_add(secs * 1000, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_ms(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    pub(crate) fn credentials() -> CommerceCredentials {
        CommerceCredentials {
            application_id: "test-app".into(),
            application_secret: "$2a$04$abcdefghijklmnopqrstuv".into(),
        }
    }

    fn manager(url: String, clock: Arc<ManualClock>) -> TokenManager {
        TokenManager::new(Client::new(), url, credentials(), clock)
    }

    const TOKEN_BODY: &str =
        r#"{"access_token":"token-1","expires_in":3600,"token_type":"Bearer"}"#;

    #[tokio::test]
    async fn token_is_reused_until_margin() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", TOKEN_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TOKEN_BODY)
            .expect(1)
            .create_async()
            .await;

        let clock = Arc::new(ManualClock::new(START_MS));
        let tokens = manager(server.url(), clock.clone());

        assert_eq!(tokens.get_valid_token().await.unwrap(), "token-1");
        assert_eq!(tokens.get_valid_token().await.unwrap(), "token-1");

        clock.advance_secs(3600 - EXPIRY_SAFETY_MARGIN_SECS - 1);
        assert_eq!(tokens.get_valid_token().await.unwrap(), "token-1");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn token_is_refetched_after_lifetime_minus_margin() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", TOKEN_PATH)
            .with_status(200)
            .with_body(TOKEN_BODY)
            .expect(2)
            .create_async()
            .await;

        let clock = Arc::new(ManualClock::new(START_MS));
        let tokens = manager(server.url(), clock.clone());

        tokens.get_valid_token().await.unwrap();
        clock.advance_secs(3600 - EXPIRY_SAFETY_MARGIN_SECS);
        tokens.get_valid_token().await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn token_request_carries_signed_form() {
        let mut server = mockito::Server::new_async().await;
        let expected_sign = signature::sign(
            "test-app",
            "$2a$04$abcdefghijklmnopqrstuv",
            START_MS,
        )
        .unwrap();
        let mock = server
            .mock("POST", TOKEN_PATH)
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("client_id".into(), "test-app".into()),
                Matcher::UrlEncoded("timestamp".into(), START_MS.to_string()),
                Matcher::UrlEncoded("client_secret_sign".into(), expected_sign),
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("type".into(), "SELF".into()),
            ]))
            .with_status(200)
            .with_body(TOKEN_BODY)
            .create_async()
            .await;

        let tokens = manager(server.url(), Arc::new(ManualClock::new(START_MS)));
        tokens.get_valid_token().await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_request_surfaces_raw_body_and_is_not_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", TOKEN_PATH)
            .with_status(400)
            .with_body(r#"{"code":"BadRequest","message":"client_secret_sign invalid"}"#)
            .expect(2)
            .create_async()
            .await;

        let tokens = manager(server.url(), Arc::new(ManualClock::new(START_MS)));

        let err = tokens.get_valid_token().await.unwrap_err();
        match err {
            AppError::Authentication(message) => {
                assert!(message.contains("client_secret_sign invalid"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(tokens.get_valid_token().await.is_err());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_body_is_an_authentication_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", TOKEN_PATH)
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let tokens = manager(server.url(), Arc::new(ManualClock::new(START_MS)));
        let err = tokens.get_valid_token().await.unwrap_err();
        assert!(matches!(err, AppError::Authentication(ref m) if m.contains("<html>gateway</html>")));
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", TOKEN_PATH)
            .with_status(200)
            .with_body(TOKEN_BODY)
            .expect(1)
            .create_async()
            .await;

        let tokens = Arc::new(manager(server.url(), Arc::new(ManualClock::new(START_MS))));
        let calls = (0..5).map(|_| {
            let tokens = tokens.clone();
            async move { tokens.get_valid_token().await }
        });
        let results = futures::future::join_all(calls).await;

        for result in results {
            assert_eq!(result.unwrap(), "token-1");
        }
        mock.assert_async().await;
    }
}
