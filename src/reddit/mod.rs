use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::reddit::model::{AccessTokenResp, Listing};
use crate::source::{ContentSource, RawItem};

pub mod model;

/// Refresh app-only tokens this long before Reddit expires them.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct Credentials {
    client_id: String,
    client_secret: String,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Front-page reader for Reddit. Uses app-only OAuth when credentials are
/// configured and the public JSON listing otherwise.
pub struct RedditClient {
    http: Client,
    public_base: Url,
    oauth_base: Url,
    auth_base: Url,
    credentials: Option<Credentials>,
    token: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for RedditClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditClient")
            .field("public_base", &self.public_base)
            .field("oauth_base", &self.oauth_base)
            .field("authenticated", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

impl RedditClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let http = Client::builder()
            .user_agent(cfg.reddit.user_agent.clone())
            .timeout(Duration::from_secs(cfg.reddit.request_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        let parse = |raw: &str| Url::parse(raw).with_context(|| format!("invalid base URL {raw}"));
        Ok(Self {
            http,
            public_base: parse(cfg.reddit.public_base.as_str())?,
            oauth_base: parse(cfg.reddit.oauth_base.as_str())?,
            auth_base: parse(cfg.reddit.auth_base.as_str())?,
            credentials: cfg
                .reddit_credentials()
                .map(|(client_id, client_secret)| Credentials {
                    client_id,
                    client_secret,
                }),
            token: Mutex::new(None),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// Build the listing request. With a bearer token the OAuth host is used,
    /// otherwise the public `.json` endpoint.
    pub fn build_listing_request(
        &self,
        limit: u32,
        bearer: Option<&str>,
    ) -> Result<reqwest::Request> {
        let limit = limit.to_string();
        let builder = match bearer {
            Some(token) => {
                let endpoint = self.oauth_base.join("hot").context("invalid OAuth base URL")?;
                self.http.get(endpoint).bearer_auth(token)
            }
            None => {
                let endpoint = self
                    .public_base
                    .join("hot.json")
                    .context("invalid public base URL")?;
                self.http.get(endpoint)
            }
        };
        builder
            .query(&[("limit", limit.as_str()), ("raw_json", "1")])
            .build()
            .context("failed to build listing request")
    }

    async fn access_token(&self, creds: &Credentials) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let endpoint = self
            .auth_base
            .join("api/v1/access_token")
            .context("invalid auth base URL")?;
        let res = self
            .http
            .post(endpoint)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("failed to reach Reddit token endpoint")?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("reddit token error {}: {}", status, body));
        }
        let payload: AccessTokenResp = res
            .json()
            .await
            .context("invalid Reddit token response")?;

        let lifetime = Duration::from_secs(payload.expires_in);
        let refresh_at = Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN);
        info!(expires_in = payload.expires_in, "obtained reddit app-only token");
        *guard = Some(CachedToken {
            value: payload.access_token.clone(),
            refresh_at,
        });
        Ok(payload.access_token)
    }
}

/// Decode a listing page. Children that are not links or that fail to decode
/// are dropped with a warning.
pub fn parse_listing(body: &str) -> Result<Vec<RawItem>> {
    let listing: Listing = serde_json::from_str(body).context("invalid Reddit listing JSON")?;
    debug!(after = ?listing.data.after, "decoded listing page");
    let items = listing
        .data
        .children
        .into_iter()
        .filter_map(|child| {
            if child.kind != "t3" {
                debug!(kind = %child.kind, "skipping non-link listing child");
                return None;
            }
            match serde_json::from_value::<RawItem>(child.data) {
                Ok(item) => Some(item),
                Err(err) => {
                    warn!(%err, "skipping undecodable listing child");
                    None
                }
            }
        })
        .collect();
    Ok(items)
}

#[async_trait]
impl ContentSource for RedditClient {
    async fn list_front_page(&self, limit: u32) -> Result<Vec<RawItem>> {
        let token = match &self.credentials {
            Some(creds) => Some(self.access_token(creds).await?),
            None => None,
        };
        let request = self.build_listing_request(limit, token.as_deref())?;
        debug!(url = %request.url(), "requesting front page");

        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach Reddit")?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = res
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            warn!(%retry_after, "rate limited by Reddit");
            return Err(anyhow!("received 429 from Reddit (retry-after {retry_after})"));
        }
        if res.status() == StatusCode::UNAUTHORIZED {
            // Force a fresh token on the next cycle.
            self.token.lock().await.take();
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("reddit error {}: {}", status, body));
        }

        let body = res.text().await.context("failed to read Reddit response")?;
        let mut items = parse_listing(&body)?;
        items.truncate(limit as usize);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(with_credentials: bool) -> RedditClient {
        let mut cfg: Config = serde_yaml::from_str(crate::config::example()).unwrap();
        if with_credentials {
            cfg.reddit.client_id = Some("id".into());
            cfg.reddit.client_secret = Some("secret".into());
        } else {
            cfg.reddit.client_id = None;
            cfg.reddit.client_secret = None;
        }
        RedditClient::from_config(&cfg).unwrap()
    }

    #[test]
    fn public_listing_request() {
        let client = client(false);
        assert!(!client.is_authenticated());
        let request = client.build_listing_request(10, None).unwrap();
        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.url().host_str(), Some("www.reddit.com"));
        assert_eq!(request.url().path(), "/hot.json");
        assert_eq!(request.url().query(), Some("limit=10&raw_json=1"));
        assert!(request.headers().get("Authorization").is_none());
    }

    #[test]
    fn oauth_listing_request_carries_bearer() {
        let client = client(true);
        assert!(client.is_authenticated());
        let request = client.build_listing_request(5, Some("tok")).unwrap();
        assert_eq!(request.url().host_str(), Some("oauth.reddit.com"));
        assert_eq!(request.url().path(), "/hot");
        assert_eq!(
            request
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "Bearer tok"
        );
    }

    #[test]
    fn parse_listing_keeps_links_and_drops_bad_children() {
        let body = r#"{
            "kind": "Listing",
            "data": {
                "after": "t3_next",
                "children": [
                    {"kind": "t3", "data": {
                        "id": "a1", "title": "Rust 2.0", "is_self": false,
                        "url": "https://blog.rust-lang.org/", "subreddit": "rust",
                        "score": 1234, "num_comments": 56, "created_utc": 1700000000.0
                    }},
                    {"kind": "t3", "data": {"id": "a2", "score": "lots"}},
                    {"kind": "t5", "data": {"id": "sub"}},
                    {"kind": "t3", "data": {"id": "a3", "is_self": true, "title": "Ask"}}
                ]
            }
        }"#;
        let items = parse_listing(body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.as_deref(), Some("a1"));
        assert_eq!(items[0].score, Some(1234));
        assert_eq!(items[0].created_utc, Some(1_700_000_000.0));
        assert_eq!(items[0].link_title, None);
        assert_eq!(items[1].id.as_deref(), Some("a3"));
        assert_eq!(items[1].is_self, Some(true));
        assert_eq!(items[1].url, None);
    }

    #[test]
    fn parse_listing_rejects_non_listing() {
        assert!(parse_listing("<html>busy</html>").is_err());
    }
}
