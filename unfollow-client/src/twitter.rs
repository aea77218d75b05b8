//! REST client for the legacy (v1.1-shaped) graph endpoints

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use shared::FollowerSnapshot;
use tracing::{debug, instrument, warn};

use crate::api::GraphApi;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::oauth::OAuthSigner;
use crate::rate_limit::{RateLimitInfo, wait_for_quota};
use crate::types::{ApiErrorBody, FollowerIdsPage, UserDetails};

const FOLLOWER_IDS: &str = "/followers/ids.json";
const USERS_SHOW: &str = "/users/show.json";
const VERIFY_CREDENTIALS: &str = "/account/verify_credentials.json";
const DIRECT_MESSAGE_NEW: &str = "/direct_messages/new.json";
const FRIENDSHIP_CREATE: &str = "/friendships/create.json";

/// Cursor value that asks for the first page
const FIRST_CURSOR: i64 = -1;

/// What the request task hands back to the caller
struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

/// Signed REST client
#[derive(Debug, Clone)]
pub struct TwitterClient {
    client: Client,
    base_url: String,
    signer: OAuthSigner,
    timeout: Duration,
}

impl TwitterClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .user_agent(format!("unfollow-watcher/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            signer: OAuthSigner::new(config),
            timeout: config.timeout,
        })
    }

    /// Signed GET, decoded as JSON
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: Vec<(String, String)>,
    ) -> ClientResult<T> {
        let body = self.request(Method::GET, endpoint, params).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Signed form POST; the response body is returned raw
    pub async fn post(&self, endpoint: &str, params: Vec<(String, String)>) -> ClientResult<Vec<u8>> {
        self.request(Method::POST, endpoint, params).await
    }

    /// Issue one signed request.
    ///
    /// The request runs as its own task while we wait on it or the deadline,
    /// whichever comes first. On timeout the task is detached and its
    /// result dropped. Quota backoff happens after the response arrived and
    /// is not part of the deadline.
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        params: Vec<(String, String)>,
    ) -> ClientResult<Vec<u8>> {
        let url = format!("{}{}", self.base_url, endpoint);
        let auth_header = self.signer.sign(method.as_str(), &url, &params)?;

        let mut req = self
            .client
            .request(method.clone(), &url)
            .header(AUTHORIZATION, auth_header);
        req = if method == Method::GET {
            req.query(&params)
        } else {
            req.form(&params)
        };

        debug!(%method, endpoint, "Sending API request");
        let handle = tokio::spawn(async move {
            let response = req.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?.to_vec();
            Ok::<_, reqwest::Error>(RawResponse {
                status,
                headers,
                body,
            })
        });

        let raw = match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_err)) => return Err(ClientError::Internal(join_err.to_string())),
            Err(_) => {
                warn!(%method, %url, timeout_ms = self.timeout.as_millis() as u64, "API request timed out");
                return Err(ClientError::Timeout {
                    method: method.to_string(),
                    url,
                });
            }
        };

        wait_for_quota(&RateLimitInfo::from_headers(&raw.headers)).await;
        Self::check_status(raw)
    }

    fn check_status(raw: RawResponse) -> ClientResult<Vec<u8>> {
        if raw.status.is_success() {
            return Ok(raw.body);
        }
        if raw.status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::NotAuthorized);
        }
        Err(ClientError::Api {
            status: raw.status.as_u16(),
            message: ApiErrorBody::message_from(&raw.body),
        })
    }
}

#[async_trait]
impl GraphApi for TwitterClient {
    #[instrument(skip(self))]
    async fn verify_credentials(&self) -> ClientResult<()> {
        let _: serde_json::Value = self.get(VERIFY_CREDENTIALS, Vec::new()).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_followers(
        &self,
        subject_id: i64,
        screen_name: &str,
    ) -> ClientResult<FollowerSnapshot> {
        let (key, subject) = if subject_id != 0 {
            ("user_id", subject_id.to_string())
        } else {
            ("screen_name", screen_name.to_string())
        };

        let mut followers = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = FIRST_CURSOR;
        let mut visited = HashSet::from([cursor]);
        let mut pages = 0usize;

        loop {
            let params = vec![
                (key.to_string(), subject.clone()),
                ("cursor".to_string(), cursor.to_string()),
            ];
            let page: FollowerIdsPage = self.get(FOLLOWER_IDS, params).await?;
            pages += 1;

            if pages == 1 && page.ids.is_empty() {
                return Err(ClientError::EmptyFollowerList { subject });
            }
            // Pages can overlap when the list shifts between requests
            followers.extend(page.ids.into_iter().filter(|id| seen.insert(*id)));

            if page.next_cursor == 0 {
                break;
            }
            if !visited.insert(page.next_cursor) {
                return Err(ClientError::InvalidResponse(format!(
                    "follower cursor {} already visited",
                    page.next_cursor
                )));
            }
            cursor = page.next_cursor;
        }

        debug!(subject = %subject, pages, count = followers.len(), "Fetched followers");
        Ok(FollowerSnapshot::new(subject_id, followers))
    }

    #[instrument(skip(self))]
    async fn get_display_name(&self, user_id: i64) -> ClientResult<String> {
        let params = vec![("user_id".to_string(), user_id.to_string())];
        let user: UserDetails = self.get(USERS_SHOW, params).await?;
        Ok(user.screen_name)
    }

    #[instrument(skip(self, text))]
    async fn send_direct_message(&self, to_screen_name: &str, text: &str) -> ClientResult<()> {
        let params = vec![
            ("screen_name".to_string(), to_screen_name.to_string()),
            ("text".to_string(), text.to_string()),
        ];
        self.post(DIRECT_MESSAGE_NEW, params).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn request_follow(&self, user_id: i64) -> ClientResult<()> {
        let params = vec![
            ("user_id".to_string(), user_id.to_string()),
            ("follow".to_string(), "true".to_string()),
        ];
        self.post(FRIENDSHIP_CREATE, params).await?;
        Ok(())
    }
}
