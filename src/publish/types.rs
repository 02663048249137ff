// src/publish/types.rs
use serde::{Deserialize, Serialize};

use crate::error::SyncResult;

/// Backend grouping object; one per source type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

/// Post as we submit it. Field set mirrors what the blog's admin API takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub custom_excerpt: String,
    pub markdown: String,
    pub tags: Vec<Tag>,
    pub feature_image: Option<String>,
    pub status: String,
    pub featured: bool,
    pub page: bool,
    pub locale: String,
    pub visibility: String,
}

/// Post as listed back from the backend (only the fields we look at).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemotePost {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// One page of a post listing. `next` is `None` on the last page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostPage {
    pub posts: Vec<RemotePost>,
    pub next: Option<u32>,
}

/// Publishing backend seam: session plus tag/post CRUD.
#[async_trait::async_trait]
pub trait PostBackend: Send + Sync {
    async fn login(&self) -> SyncResult<()>;
    async fn list_tags(&self) -> SyncResult<Vec<Tag>>;
    async fn create_tag(&self, name: &str, feature_image: Option<&str>) -> SyncResult<Tag>;
    async fn create_post(&self, post: &NewPost) -> SyncResult<RemotePost>;
    /// 1-based page of all posts (any status), tags included.
    async fn list_posts(&self, page: u32) -> SyncResult<PostPage>;
    async fn delete_post(&self, id: &str) -> SyncResult<()>;
    fn name(&self) -> &'static str;
}
