// src/publish/mock.rs
//! In-memory backend. Used by tests and by `SYNC_DRY_RUN=1`.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::types::{NewPost, PostBackend, PostPage, RemotePost, Tag};
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Default)]
struct State {
    tags: Vec<Tag>,
    posts: Vec<RemotePost>,
    created: Vec<NewPost>,
    deleted: Vec<String>,
    next_id: u64,
    login_calls: usize,
    list_tag_calls: usize,
    create_tag_calls: usize,
    fail_login: bool,
    fail_listing_page: Option<u32>,
    fail_titles: HashSet<String>,
    garbled_titles: HashSet<String>,
    fail_deletes: HashSet<String>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

pub struct MockBackend {
    state: Mutex<State>,
    page_size: usize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: 15,
        }
    }

    /// Posts per listing page (min 1).
    pub fn with_page_size(mut self, n: usize) -> Self {
        self.page_size = n.max(1);
        self
    }

    pub fn fail_login(&self, fail: bool) {
        self.state.lock().fail_login = fail;
    }

    /// `create_post` errors for posts with this exact title.
    pub fn fail_post_titled(&self, title: &str) {
        self.state.lock().fail_titles.insert(title.to_string());
    }

    /// `create_post` answers posts with this title with a malformed reply.
    pub fn garble_reply_for(&self, title: &str) {
        self.state.lock().garbled_titles.insert(title.to_string());
    }

    pub fn fail_delete_of(&self, id: &str) {
        self.state.lock().fail_deletes.insert(id.to_string());
    }

    pub fn fail_listing_page(&self, page: u32) {
        self.state.lock().fail_listing_page = Some(page);
    }

    pub fn seed_tag(&self, name: &str) -> Tag {
        let mut st = self.state.lock();
        let tag = Tag {
            id: st.next_id("tag"),
            name: name.to_string(),
        };
        st.tags.push(tag.clone());
        tag
    }

    /// Add an existing post; `tags` are tag names, first one counts for delete-by-tag.
    pub fn seed_post(&self, title: &str, tags: &[&str]) -> String {
        let mut st = self.state.lock();
        let id = st.next_id("post");
        let mut post_tags = Vec::with_capacity(tags.len());
        for name in tags {
            let tid = st.next_id("tag");
            post_tags.push(Tag {
                id: tid,
                name: name.to_string(),
            });
        }
        st.posts.push(RemotePost {
            id: id.clone(),
            title: title.to_string(),
            tags: post_tags,
        });
        id
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.state.lock().tags.clone()
    }

    pub fn posts(&self) -> Vec<RemotePost> {
        self.state.lock().posts.clone()
    }

    /// Every successful `create_post` payload, in call order.
    pub fn created_posts(&self) -> Vec<NewPost> {
        self.state.lock().created.clone()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.state.lock().deleted.clone()
    }

    pub fn login_calls(&self) -> usize {
        self.state.lock().login_calls
    }

    pub fn list_tag_calls(&self) -> usize {
        self.state.lock().list_tag_calls
    }

    pub fn create_tag_calls(&self) -> usize {
        self.state.lock().create_tag_calls
    }
}

#[async_trait]
impl PostBackend for MockBackend {
    async fn login(&self) -> SyncResult<()> {
        let mut st = self.state.lock();
        st.login_calls += 1;
        if st.fail_login {
            return Err(SyncError::BackendAuth("mock: bad credentials".into()));
        }
        Ok(())
    }

    async fn list_tags(&self) -> SyncResult<Vec<Tag>> {
        let tags = {
            let mut st = self.state.lock();
            st.list_tag_calls += 1;
            st.tags.clone()
        };
        // Give concurrent callers a chance to interleave between list and create.
        tokio::task::yield_now().await;
        Ok(tags)
    }

    async fn create_tag(&self, name: &str, _feature_image: Option<&str>) -> SyncResult<Tag> {
        let mut st = self.state.lock();
        st.create_tag_calls += 1;
        let tag = Tag {
            id: st.next_id("tag"),
            name: name.to_string(),
        };
        st.tags.push(tag.clone());
        Ok(tag)
    }

    async fn create_post(&self, post: &NewPost) -> SyncResult<RemotePost> {
        let mut st = self.state.lock();
        if st.fail_titles.contains(&post.title) {
            return Err(SyncError::Transport(format!(
                "mock: rejected post {:?}",
                post.title
            )));
        }
        if st.garbled_titles.contains(&post.title) {
            return Err(SyncError::Payload(format!(
                "mock: no post in reply for {:?}",
                post.title
            )));
        }
        let remote = RemotePost {
            id: st.next_id("post"),
            title: post.title.clone(),
            tags: post.tags.clone(),
        };
        st.posts.push(remote.clone());
        st.created.push(post.clone());
        Ok(remote)
    }

    async fn list_posts(&self, page: u32) -> SyncResult<PostPage> {
        let st = self.state.lock();
        if st.fail_listing_page == Some(page) {
            return Err(SyncError::Transport(format!("mock: page {page} unavailable")));
        }
        let start = (page.max(1) as usize - 1) * self.page_size;
        let posts: Vec<RemotePost> = st
            .posts
            .iter()
            .skip(start)
            .take(self.page_size)
            .cloned()
            .collect();
        let next = (start + self.page_size < st.posts.len()).then_some(page + 1);
        Ok(PostPage { posts, next })
    }

    async fn delete_post(&self, id: &str) -> SyncResult<()> {
        let mut st = self.state.lock();
        if st.fail_deletes.contains(id) {
            return Err(SyncError::Transport(format!("mock: cannot delete {id}")));
        }
        let before = st.posts.len();
        st.posts.retain(|p| p.id != id);
        if st.posts.len() == before {
            return Err(SyncError::Transport(format!("mock: no post {id}")));
        }
        st.deleted.push(id.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
