//! X (Twitter) API v2 client
//!
//! Uses an OAuth 2.0 user-context bearer token from `X_ACCESS_TOKEN`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::config::{env_secret, XConfig};
use crate::error::{PlatformError, Result};
use crate::platforms::{Identity, Mention, PublishedPost, SocialClient, UserProfile};

/// The mentions endpoint rejects `max_results` outside this range
const MENTIONS_PAGE_MIN: usize = 5;
const MENTIONS_PAGE_MAX: usize = 100;

/// Map an X API error response to PlatformError
fn map_x_error(status: StatusCode, body: &str, context: &str) -> PlatformError {
    let detail = api_error_detail(body).unwrap_or_else(|| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Authentication(format!(
            "X rejected credentials during {} ({}): {}. Check X_ACCESS_TOKEN.",
            context, status, detail
        )),
        StatusCode::BAD_REQUEST => PlatformError::Validation(format!(
            "X rejected the request during {}: {}",
            context, detail
        )),
        StatusCode::TOO_MANY_REQUESTS => PlatformError::RateLimit(format!(
            "X rate limit exceeded during {}: {}",
            context, detail
        )),
        _ => PlatformError::Posting(format!(
            "X operation failed during {} ({}): {}",
            context, status, detail
        )),
    }
}

/// Pull the human-readable message out of an X error body, if present
fn api_error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value["detail"]
        .as_str()
        .or_else(|| value["title"].as_str())
        .or_else(|| value["errors"][0]["message"].as_str())
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self, context: &str) -> Result<T> {
        match self.data {
            Some(data) => Ok(data),
            None => {
                let detail = self
                    .errors
                    .into_iter()
                    .find_map(|e| e.detail.or(e.message))
                    .unwrap_or_else(|| "response had no data".to_string());
                Err(PlatformError::Response(format!("X {}: {}", context, detail)).into())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct XUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct XTweet {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

pub struct XClient {
    client: Client,
    token: SecretString,
    api_base: String,
}

impl XClient {
    /// Create a client from `X_ACCESS_TOKEN`
    pub fn from_env(config: &XConfig) -> Result<Self> {
        let token = env_secret(&["X_ACCESS_TOKEN"])
            .ok_or_else(|| PlatformError::Authentication("X_ACCESS_TOKEN not set".to_string()))?;
        Self::new(token, config)
    }

    pub fn new(token: SecretString, config: &XConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            token,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, context: &str) -> Result<T> {
        let response = request
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                PlatformError::Network(format!("X request failed during {}: {}", context, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_x_error(status, &body, context).into());
        }

        response.json::<T>().await.map_err(|e| {
            PlatformError::Response(format!("Invalid X response during {}: {}", context, e)).into()
        })
    }

    async fn create_tweet(&self, body: serde_json::Value, context: &str) -> Result<PublishedPost> {
        let envelope: Envelope<XTweet> = self
            .send(self.client.post(self.url("/tweets")).json(&body), context)
            .await?;
        let tweet = envelope.into_data(context)?;
        debug!("Created tweet {}", tweet.id);
        Ok(PublishedPost { id: tweet.id })
    }
}

#[async_trait]
impl SocialClient for XClient {
    fn name(&self) -> &str {
        "x"
    }

    async fn get_self(&self) -> Result<Identity> {
        let envelope: Envelope<XUser> = self
            .send(self.client.get(self.url("/users/me")), "identity lookup")
            .await?;
        let user = envelope.into_data("identity lookup")?;
        Ok(Identity {
            id: user.id,
            handle: user.username,
        })
    }

    async fn get_mentions(&self, user_id: &str, max: usize) -> Result<Vec<Mention>> {
        let page_size = max.clamp(MENTIONS_PAGE_MIN, MENTIONS_PAGE_MAX);
        let request = self
            .client
            .get(self.url(&format!("/users/{}/mentions", user_id)))
            .query(&[
                ("max_results", page_size.to_string()),
                ("tweet.fields", "author_id,created_at".to_string()),
            ]);

        let envelope: Envelope<Vec<XTweet>> = self.send(request, "mention fetch").await?;

        // No `data` key means no mentions, not an error
        let tweets = envelope.data.unwrap_or_default();
        Ok(tweets
            .into_iter()
            .take(max)
            .map(|t| Mention {
                id: t.id,
                text: t.text,
                author_id: t.author_id.unwrap_or_default(),
                created_at: t.created_at,
            })
            .collect())
    }

    async fn get_user(&self, user_id: &str) -> Result<UserProfile> {
        let envelope: Envelope<XUser> = self
            .send(
                self.client.get(self.url(&format!("/users/{}", user_id))),
                "user lookup",
            )
            .await?;
        let user = envelope.into_data("user lookup")?;
        Ok(UserProfile {
            id: user.id,
            handle: user.username,
        })
    }

    async fn post_text(&self, text: &str) -> Result<PublishedPost> {
        self.create_tweet(json!({ "text": text }), "posting").await
    }

    async fn post_reply(&self, text: &str, parent_id: &str) -> Result<PublishedPost> {
        self.create_tweet(
            json!({
                "text": text,
                "reply": { "in_reply_to_tweet_id": parent_id }
            }),
            "reply",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::XynaeError;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> XClient {
        let config = XConfig {
            api_base: format!("{}/2/", server.uri()),
            ..XConfig::default()
        };
        XClient::new(SecretString::from("user-token".to_string()), &config).unwrap()
    }

    #[test]
    fn test_map_x_error_statuses() {
        assert!(matches!(
            map_x_error(StatusCode::UNAUTHORIZED, "", "posting"),
            PlatformError::Authentication(_)
        ));
        assert!(matches!(
            map_x_error(StatusCode::FORBIDDEN, "", "posting"),
            PlatformError::Authentication(_)
        ));
        assert!(matches!(
            map_x_error(StatusCode::BAD_REQUEST, "", "posting"),
            PlatformError::Validation(_)
        ));
        assert!(matches!(
            map_x_error(StatusCode::TOO_MANY_REQUESTS, "", "posting"),
            PlatformError::RateLimit(_)
        ));
        assert!(matches!(
            map_x_error(StatusCode::SERVICE_UNAVAILABLE, "", "posting"),
            PlatformError::Posting(_)
        ));
    }

    #[test]
    fn test_error_detail_extracted() {
        let body = r#"{"title":"Forbidden","detail":"You are not permitted to create a duplicate Tweet.","status":403}"#;
        let err = map_x_error(StatusCode::FORBIDDEN, body, "posting");
        assert!(err.to_string().contains("duplicate Tweet"));
    }

    #[tokio::test]
    async fn test_get_self() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2/users/me"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"id": "1000", "name": "Xynae", "username": "xynae_agent"}
            })))
            .mount(&server)
            .await;

        let identity = client(&server).get_self().await.unwrap();
        assert_eq!(
            identity,
            Identity {
                id: "1000".to_string(),
                handle: "xynae_agent".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_get_mentions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2/users/1000/mentions"))
            .and(query_param("max_results", "10"))
            .and(query_param("tweet.fields", "author_id,created_at"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"id": "2", "text": "@xynae_agent hi", "author_id": "7", "created_at": "2026-01-01T00:00:00.000Z"},
                    {"id": "1", "text": "@xynae_agent yo", "author_id": "8"}
                ],
                "meta": {"result_count": 2}
            })))
            .mount(&server)
            .await;

        let mentions = client(&server).get_mentions("1000", 10).await.unwrap();
        assert_eq!(mentions.len(), 2);
        assert_eq!(mentions[0].id, "2");
        assert_eq!(mentions[0].author_id, "7");
        assert_eq!(mentions[1].created_at, None);
    }

    #[tokio::test]
    async fn test_get_mentions_empty_and_page_floor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2/users/1000/mentions"))
            .and(query_param("max_results", "5"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"meta": {"result_count": 0}})),
            )
            .mount(&server)
            .await;

        let mentions = client(&server).get_mentions("1000", 1).await.unwrap();
        assert!(mentions.is_empty());
    }

    #[tokio::test]
    async fn test_post_reply_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .and(body_json(json!({
                "text": "welcome",
                "reply": {"in_reply_to_tweet_id": "123"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "data": {"id": "999", "text": "welcome"}
            })))
            .mount(&server)
            .await;

        let published = client(&server).post_reply("welcome", "123").await.unwrap();
        assert_eq!(published.id, "999");
    }

    #[tokio::test]
    async fn test_post_text_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "title": "Too Many Requests", "detail": "Too Many Requests", "status": 429
            })))
            .mount(&server)
            .await;

        let err = client(&server).post_text("hello").await.unwrap_err();
        assert!(matches!(
            err,
            XynaeError::Platform(PlatformError::RateLimit(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let config = XConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..XConfig::default()
        };
        let client = XClient::new(SecretString::from("t".to_string()), &config).unwrap();
        let err = client.get_self().await.unwrap_err();
        assert!(matches!(err, XynaeError::Platform(PlatformError::Network(_))));
    }
}
