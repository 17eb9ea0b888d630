//! Twitter (X) API v2 as the game's social platform.

use crate::config::TwitterCredentials;
use crate::retry::{is_retryable_error, with_retry_if, ApiError, RetryConfig};
use crate::social::{Reply, SocialPlatform};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

const SERVICE: &str = "Twitter";

#[derive(Debug, Serialize)]
struct CreateTweetRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<ReplySettings<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<MediaSettings>,
}

#[derive(Debug, Serialize)]
struct ReplySettings<'a> {
    in_reply_to_tweet_id: &'a str,
}

#[derive(Debug, Serialize)]
struct MediaSettings {
    media_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MentionsResponse {
    data: Option<Vec<Tweet>>,
    includes: Option<Includes>,
    meta: Option<Meta>,
}

#[derive(Debug, Clone, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    author_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    referenced_tweets: Vec<ReferencedTweet>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReferencedTweet {
    #[serde(rename = "type")]
    kind: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct Meta {
    next_token: Option<String>,
}

#[derive(Clone)]
pub struct TwitterClient {
    client: reqwest::Client,
    credentials: TwitterCredentials,
    retry: RetryConfig,
}

impl TwitterClient {
    pub fn new(client: reqwest::Client, credentials: TwitterCredentials) -> Self {
        Self {
            client,
            credentials,
            retry: RetryConfig::api_call(),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}{}",
            self.credentials.api_url.trim_end_matches('/'),
            endpoint
        )
    }

    async fn upload_media(&self, image: Vec<u8>) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(image)
            .file_name("party.png")
            .mime_str("image/png")
            .context("Failed to build media upload")?;
        let form = reqwest::multipart::Form::new()
            .part("media", part)
            .text("media_category", "tweet_image");

        let response = self
            .client
            .post(self.url("/2/media/upload"))
            .bearer_auth(&self.credentials.access_token)
            .multipart(form)
            .send()
            .await
            .context("Failed to upload media to Twitter")?;

        if !response.status().is_success() {
            return Err(ApiError::from_response(SERVICE, response).await.into());
        }

        let uploaded: DataResponse<Created> = response
            .json()
            .await
            .context("Failed to parse Twitter media upload response")?;
        Ok(uploaded.data.id)
    }

    async fn fetch_mentions_page(
        &self,
        since_id: &str,
        pagination_token: Option<&str>,
    ) -> Result<MentionsResponse> {
        let url = self.url(&format!("/2/users/{}/mentions", self.credentials.user_id));

        with_retry_if(
            &self.retry,
            "Twitter mentions",
            || async {
                let mut request = self
                    .client
                    .get(&url)
                    .bearer_auth(&self.credentials.access_token)
                    .query(&[
                        ("since_id", since_id),
                        ("max_results", "100"),
                        ("tweet.fields", "created_at,referenced_tweets,author_id"),
                        ("expansions", "author_id"),
                    ]);
                if let Some(token) = pagination_token {
                    request = request.query(&[("pagination_token", token)]);
                }

                let response = request
                    .send()
                    .await
                    .context("Failed to send request to Twitter API")?;

                log_rate_limit(&response);

                if !response.status().is_success() {
                    return Err(anyhow::Error::new(
                        ApiError::from_response(SERVICE, response).await,
                    ));
                }

                response
                    .json::<MentionsResponse>()
                    .await
                    .context("Failed to parse Twitter mentions")
            },
            is_retryable_error,
        )
        .await
    }
}

#[async_trait]
impl SocialPlatform for TwitterClient {
    async fn publish(
        &self,
        text: &str,
        image: Option<Vec<u8>>,
        in_reply_to: Option<&str>,
    ) -> Result<String> {
        let media = match image {
            Some(image) => Some(MediaSettings {
                media_ids: vec![self.upload_media(image).await?],
            }),
            None => None,
        };

        let request = CreateTweetRequest {
            text,
            reply: in_reply_to.map(|id| ReplySettings {
                in_reply_to_tweet_id: id,
            }),
            media,
        };

        let response = self
            .client
            .post(self.url("/2/tweets"))
            .bearer_auth(&self.credentials.access_token)
            .json(&request)
            .send()
            .await
            .context("Failed to send tweet")?;

        if !response.status().is_success() {
            return Err(ApiError::from_response(SERVICE, response).await.into());
        }

        let created: DataResponse<Created> = response
            .json()
            .await
            .context("Failed to parse Twitter create response")?;

        info!("Posted tweet {}", created.data.id);
        Ok(created.data.id)
    }

    async fn fetch_replies_since(&self, message_id: &str) -> Result<Vec<Reply>> {
        let mut tweets = Vec::new();
        let mut handles = HashMap::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = self
                .fetch_mentions_page(message_id, next_token.as_deref())
                .await?;

            tweets.extend(page.data.unwrap_or_default());
            if let Some(includes) = page.includes {
                handles.extend(includes.users.into_iter().map(|u| (u.id, u.username)));
            }

            next_token = page.meta.and_then(|m| m.next_token);
            if next_token.is_none() {
                break;
            }
        }

        debug!("Fetched {} mentions since {}", tweets.len(), message_id);

        let replies = tweets
            .into_iter()
            .map(|tweet| to_reply(tweet, &handles))
            .collect();
        Ok(replies)
    }

    async fn repost(&self, message_id: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!(
                "/2/users/{}/retweets",
                self.credentials.user_id
            )))
            .bearer_auth(&self.credentials.access_token)
            .json(&serde_json::json!({ "tweet_id": message_id }))
            .send()
            .await
            .context("Failed to send retweet")?;

        if !response.status().is_success() {
            return Err(ApiError::from_response(SERVICE, response).await.into());
        }
        Ok(())
    }
}

fn to_reply(tweet: Tweet, handles: &HashMap<String, String>) -> Reply {
    let author_handle = tweet
        .author_id
        .as_ref()
        .and_then(|id| handles.get(id))
        .cloned()
        .or(tweet.author_id.clone())
        .unwrap_or_default();
    let in_reply_to = tweet
        .referenced_tweets
        .iter()
        .find(|r| r.kind == "replied_to")
        .map(|r| r.id.clone());

    Reply {
        id: tweet.id,
        author_handle,
        text: unescape(&tweet.text),
        in_reply_to,
        created_at: tweet.created_at.unwrap_or_default(),
    }
}

/// Twitter escapes these three in tweet text
fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn log_rate_limit(response: &reqwest::Response) {
    let Some(remaining) = response.headers().get("x-rate-limit-remaining") else {
        return;
    };
    let limit = response
        .headers()
        .get("x-rate-limit-limit")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("?");
    let reset = response
        .headers()
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|ts| ts.parse::<i64>().ok())
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "?".to_string());

    debug!(
        "Twitter API rate limit: {}/{} remaining (resets at {})",
        remaining.to_str().unwrap_or("?"),
        limit,
        reset
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::{
        matchers::{body_json, body_string_contains, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn client(server: &MockServer) -> TwitterClient {
        TwitterClient::new(
            reqwest::Client::new(),
            TwitterCredentials {
                access_token: "test-token".to_string(),
                user_id: "42".to_string(),
                handle: "unshuffle".to_string(),
                api_url: server.uri(),
            },
        )
        .with_retry_config(RetryConfig::new(2, Duration::from_millis(1)))
    }

    fn created(id: &str) -> ResponseTemplate {
        ResponseTemplate::new(201).set_body_json(serde_json::json!({"data": {"id": id, "text": "x"}}))
    }

    // ==================== Publishing ====================

    #[tokio::test]
    async fn test_publish_text() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_json(serde_json::json!({"text": "Solid metal equipment"})))
            .respond_with(created("1001"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let id = client(&mock_server)
            .publish("Solid metal equipment", None, None)
            .await
            .unwrap();

        assert_eq!(id, "1001");
    }

    #[tokio::test]
    async fn test_publish_reply_with_image() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/media/upload"))
            .and(body_string_contains("tweet_image"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {"id": "m-7"}})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .and(body_json(serde_json::json!({
                "text": "@player Correct! I'll start a new game soon.",
                "reply": {"in_reply_to_tweet_id": "200"},
                "media": {"media_ids": ["m-7"]}
            })))
            .respond_with(created("1002"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let id = client(&mock_server)
            .publish(
                "@player Correct! I'll start a new game soon.",
                Some(vec![0x89, b'P', b'N', b'G']),
                Some("200"),
            )
            .await
            .unwrap();

        assert_eq!(id, "1002");
    }

    #[tokio::test]
    async fn test_publish_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(503).set_body_string("over capacity"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let error = client(&mock_server)
            .publish("hello", None, None)
            .await
            .unwrap_err();

        assert!(error.to_string().contains("Twitter API error (503"));
    }

    #[tokio::test]
    async fn test_repost() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/users/42/retweets"))
            .and(body_json(serde_json::json!({"tweet_id": "200"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": {"retweeted": true}})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        client(&mock_server).repost("200").await.unwrap();
    }

    // ==================== Mentions ====================

    #[tokio::test]
    async fn test_fetch_replies_follows_pages() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/2/users/42/mentions"))
            .and(query_param("since_id", "1001"))
            .and(query_param("pagination_token", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{
                    "id": "1004",
                    "text": "@unshuffle Rez",
                    "author_id": "u2",
                    "created_at": "2026-03-01T12:05:00.000Z"
                }],
                "includes": {"users": [{"id": "u2", "username": "second", "name": "Second"}]},
                "meta": {"result_count": 1}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/2/users/42/mentions"))
            .and(query_param("since_id", "1001"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-rate-limit-remaining", "179")
                    .insert_header("x-rate-limit-limit", "180")
                    .set_body_json(serde_json::json!({
                        "data": [{
                            "id": "1003",
                            "text": "@unshuffle Metal Gear &amp; Solid &lt;3",
                            "author_id": "u1",
                            "created_at": "2026-03-01T12:01:00.000Z",
                            "referenced_tweets": [
                                {"type": "quoted", "id": "999"},
                                {"type": "replied_to", "id": "1001"}
                            ]
                        }],
                        "includes": {"users": [{"id": "u1", "username": "player", "name": "P"}]},
                        "meta": {"result_count": 1, "next_token": "page-2"}
                    })),
            )
            .mount(&mock_server)
            .await;

        let replies = client(&mock_server)
            .fetch_replies_since("1001")
            .await
            .unwrap();

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].id, "1003");
        assert_eq!(replies[0].author_handle, "player");
        assert_eq!(replies[0].text, "@unshuffle Metal Gear & Solid <3");
        assert_eq!(replies[0].in_reply_to.as_deref(), Some("1001"));
        assert_eq!(replies[1].author_handle, "second");
        assert!(replies[1].in_reply_to.is_none());
        assert!(replies[0].created_at < replies[1].created_at);
    }

    #[tokio::test]
    async fn test_fetch_replies_empty() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/2/users/42/mentions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"meta": {"result_count": 0}})),
            )
            .mount(&mock_server)
            .await;

        let replies = client(&mock_server)
            .fetch_replies_since("1001")
            .await
            .unwrap();

        assert!(replies.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_replies_retries_rate_limit() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/2/users/42/mentions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let error = client(&mock_server)
            .fetch_replies_since("1001")
            .await
            .unwrap_err();

        let api_error = error.downcast_ref::<ApiError>().unwrap();
        assert!(api_error.is_transient());
    }

    // ==================== Helpers ====================

    #[test]
    fn test_unescape_order() {
        assert_eq!(unescape("&amp;lt;"), "&lt;");
        assert_eq!(unescape("a &gt; b"), "a > b");
    }

    #[test]
    fn test_to_reply_falls_back_to_author_id() {
        let tweet = Tweet {
            id: "1".to_string(),
            text: "hi".to_string(),
            author_id: Some("u9".to_string()),
            created_at: None,
            referenced_tweets: Vec::new(),
        };

        let reply = to_reply(tweet, &HashMap::new());

        assert_eq!(reply.author_handle, "u9");
        assert_eq!(reply.created_at, DateTime::<Utc>::default());
    }
}
