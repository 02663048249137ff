// src/publish/ghost.rs
//! Ghost admin API (v0.1) client: password-grant login, tags and posts.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::types::{NewPost, PostBackend, PostPage, RemotePost, Tag};
use crate::config::publisher::PublisherConfig;
use crate::error::{SyncError, SyncResult};

const API_PREFIX: &str = "/ghost/api/v0.1";
const POSTS_PER_PAGE: u32 = 15;

#[derive(Deserialize)]
struct TokenResp {
    access_token: String,
}

#[derive(Deserialize)]
struct TagsEnvelope {
    tags: Vec<Tag>,
}

#[derive(Deserialize)]
struct PostsEnvelope {
    posts: Vec<RemotePost>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Deserialize)]
struct Meta {
    pagination: Pagination,
}

#[derive(Deserialize)]
struct Pagination {
    #[serde(default)]
    next: Option<u32>,
}

/// Markdown wrapped in a single markdown card, the editor format Ghost 1.x stores.
pub fn mobiledoc(markdown: &str) -> String {
    json!({
        "version": "0.3.1",
        "markups": [],
        "atoms": [],
        "cards": [["card-markdown", { "cardName": "card-markdown", "markdown": markdown }]],
        "sections": [[10, 0]]
    })
    .to_string()
}

pub struct GhostClient {
    http: Client,
    base: String,
    cfg: PublisherConfig,
    token: RwLock<Option<String>>,
}

impl GhostClient {
    pub fn new(cfg: PublisherConfig) -> SyncResult<Self> {
        let http = Client::builder()
            .user_agent("event-sync/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::Config(format!("http client: {e}")))?;
        let base = format!("{}{}", cfg.server.trim_end_matches('/'), API_PREFIX);
        Ok(Self {
            http,
            base,
            cfg,
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    fn authed(&self, req: RequestBuilder) -> SyncResult<RequestBuilder> {
        let token = self.token.read().clone().ok_or(SyncError::NotConnected)?;
        Ok(req.bearer_auth(token))
    }

    async fn send(&self, req: RequestBuilder) -> SyncResult<reqwest::Response> {
        let resp = self.authed(req)?.send().await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.token.write().take();
            return Err(SyncError::BackendAuth(format!("ghost responded {status}")));
        }
        if !status.is_success() {
            return Err(SyncError::Transport(format!("ghost responded {status}")));
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> SyncResult<T> {
        let resp = self.send(req).await?;
        Ok(resp.json::<T>().await?)
    }
}

/// Login rejections are auth failures; throttling (Ghost allows roughly 100
/// logins an hour) and server errors are transient.
fn login_error(status: StatusCode) -> Option<SyncError> {
    if status.is_success() {
        None
    } else if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        Some(SyncError::BackendAuth(format!("login rejected: {status}")))
    } else {
        Some(SyncError::Transport(format!("login: ghost responded {status}")))
    }
}

#[async_trait]
impl PostBackend for GhostClient {
    async fn login(&self) -> SyncResult<()> {
        let form = [
            ("grant_type", "password"),
            ("username", self.cfg.user.as_str()),
            ("password", self.cfg.password.as_str()),
            ("client_id", self.cfg.client_id.as_str()),
            ("client_secret", self.cfg.client_secret.as_str()),
        ];
        let resp = self
            .http
            .post(self.url("authentication/token"))
            .form(&form)
            .send()
            .await?;
        if let Some(e) = login_error(resp.status()) {
            return Err(e);
        }
        let token: TokenResp = resp.json().await?;
        *self.token.write() = Some(token.access_token);
        Ok(())
    }

    async fn list_tags(&self) -> SyncResult<Vec<Tag>> {
        let req = self
            .http
            .get(self.url("tags/"))
            .query(&[("fields", "name,id"), ("limit", "all")]);
        let env: TagsEnvelope = self.send_json(req).await?;
        Ok(env.tags)
    }

    async fn create_tag(&self, name: &str, feature_image: Option<&str>) -> SyncResult<Tag> {
        let body = json!({ "tags": [{ "name": name, "feature_image": feature_image }] });
        let req = self.http.post(self.url("tags/")).json(&body);
        let env: TagsEnvelope = self.send_json(req).await?;
        env.tags
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::Payload("create tag: empty response".into()))
    }

    async fn create_post(&self, post: &NewPost) -> SyncResult<RemotePost> {
        let body = json!({
            "posts": [{
                "title": post.title,
                "custom_excerpt": post.custom_excerpt,
                "mobiledoc": mobiledoc(&post.markdown),
                "tags": post.tags,
                "feature_image": post.feature_image,
                "status": post.status,
                "featured": post.featured,
                "page": post.page,
                "locale": post.locale,
                "visibility": post.visibility,
            }]
        });
        let req = self.http.post(self.url("posts/")).json(&body);
        let env: PostsEnvelope = self.send_json(req).await?;
        env.posts
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::Payload("create post: empty response".into()))
    }

    async fn list_posts(&self, page: u32) -> SyncResult<PostPage> {
        let req = self.http.get(self.url("posts/")).query(&[
            ("status", "all".to_string()),
            ("include", "tags".to_string()),
            ("page", page.to_string()),
            ("limit", POSTS_PER_PAGE.to_string()),
        ]);
        let env: PostsEnvelope = self.send_json(req).await?;
        Ok(PostPage {
            posts: env.posts,
            next: env.meta.and_then(|m| m.pagination.next),
        })
    }

    async fn delete_post(&self, id: &str) -> SyncResult<()> {
        let req = self.http.delete(self.url(&format!("posts/{id}/")));
        self.send(req).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ghost"
    }
}
