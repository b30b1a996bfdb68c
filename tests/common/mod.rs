//! Shared fixtures: an in-process backing store and an in-memory post store.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use quire::application::posts::{PostService, PostWriteService};
use quire::application::repos::{PostsRepo, PostsWriteRepo, RepoError};
use quire::application::search::SearchService;
use quire::cache::{BackingMode, BackingStore, CacheConfig, CacheHooks, PostIndexCache, TieredCache};
use quire::domain::posts::{FeaturedFilter, PostBody, PostDocument, PostId, sort_by_recency};
use quire::infra::http::{AdminState, PublicState};
use serde_json::{Map, Value};

/// Key/value store with the same contract as the Redis client: failures
/// degrade to misses and no-ops.
#[derive(Default)]
pub struct MapStore {
    entries: Mutex<BTreeMap<String, (String, Option<Duration>)>>,
    down: AtomicBool,
    multi_gets: AtomicUsize,
}

impl MapStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("map store lock")
            .insert(key.to_string(), (value.to_string(), None));
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("map store lock")
            .get(key)
            .map(|(value, _)| value.clone())
    }

    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries
            .lock()
            .expect("map store lock")
            .get(key)
            .and_then(|(_, ttl)| *ttl)
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn multi_gets(&self) -> usize {
        self.multi_gets.load(Ordering::SeqCst)
    }

    fn is_down(&self) -> bool {
        self.down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackingStore for MapStore {
    async fn get(&self, key: &str) -> Option<String> {
        if self.is_down() {
            return None;
        }
        self.raw(key)
    }

    async fn set(&self, key: &str, value: &str) -> bool {
        if self.is_down() {
            return false;
        }
        self.entries
            .lock()
            .expect("map store lock")
            .insert(key.to_string(), (value.to_string(), None));
        true
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> bool {
        if self.is_down() {
            return false;
        }
        self.entries
            .lock()
            .expect("map store lock")
            .insert(key.to_string(), (value.to_string(), Some(ttl)));
        true
    }

    async fn delete(&self, key: &str) -> bool {
        if self.is_down() {
            return false;
        }
        self.entries.lock().expect("map store lock").remove(key);
        true
    }

    async fn multi_get(&self, keys: &[String]) -> Vec<Option<String>> {
        self.multi_gets.fetch_add(1, Ordering::SeqCst);
        if self.is_down() {
            return vec![None; keys.len()];
        }
        keys.iter().map(|key| self.raw(key)).collect()
    }

    async fn scan_by_pattern(&self, pattern: &str) -> Vec<String> {
        if self.is_down() {
            return Vec::new();
        }
        let prefix = pattern.trim_end_matches('*');
        self.entries
            .lock()
            .expect("map store lock")
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn mode(&self) -> BackingMode {
        BackingMode::Redis
    }
}

/// Content store kept in a `Vec`, newest-first queries like the Postgres one.
#[derive(Default)]
pub struct MemoryPosts {
    posts: Mutex<Vec<PostDocument>>,
    next_id: AtomicI64,
    pub finds: AtomicUsize,
    pub fail_reads: AtomicBool,
}

impl MemoryPosts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI64::new(1),
            ..Self::default()
        })
    }

    pub fn seed(&self, value: Value) -> PostDocument {
        let post = PostDocument::from_value(value).expect("seed must be an object");
        self.posts.lock().expect("posts lock").push(post.clone());
        post
    }

    fn check_reads(&self) -> Result<(), RepoError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("database is down"));
        }
        Ok(())
    }

    fn stamp(id: i64, body: PostBody) -> PostDocument {
        let mut fields: Map<String, Value> = body.into_fields();
        fields.insert("id".to_string(), Value::from(id));
        fields.insert(
            "createdAt".to_string(),
            Value::String(format!("2024-01-{:02}T00:00:00Z", id.clamp(1, 28))),
        );
        PostDocument::new(fields)
    }
}

#[async_trait]
impl PostsRepo for MemoryPosts {
    async fn find_post(&self, id: PostId) -> Result<Option<PostDocument>, RepoError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        Ok(self
            .posts
            .lock()
            .expect("posts lock")
            .iter()
            .find(|post| post.id() == Some(id))
            .cloned())
    }

    async fn list_posts(
        &self,
        filter: FeaturedFilter,
        limit: u32,
    ) -> Result<Vec<PostDocument>, RepoError> {
        self.check_reads()?;
        let mut posts: Vec<PostDocument> = self
            .posts
            .lock()
            .expect("posts lock")
            .iter()
            .filter(|post| filter.matches(post))
            .cloned()
            .collect();
        sort_by_recency(&mut posts);
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn search_posts(&self, query: &str, limit: u32) -> Result<Vec<PostDocument>, RepoError> {
        self.check_reads()?;
        let needle = query.to_lowercase();
        let matches = |post: &PostDocument, field: &str| {
            post.str_field(field)
                .is_some_and(|text| text.to_lowercase().contains(&needle))
        };
        let mut posts: Vec<PostDocument> = self
            .posts
            .lock()
            .expect("posts lock")
            .iter()
            .filter(|post| matches(post, "title") || matches(post, "excerpt"))
            .cloned()
            .collect();
        sort_by_recency(&mut posts);
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.check_reads()
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryPosts {
    async fn create_post(&self, body: PostBody) -> Result<PostDocument, RepoError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let post = Self::stamp(id, body);
        self.posts.lock().expect("posts lock").push(post.clone());
        Ok(post)
    }

    async fn update_post(
        &self,
        id: PostId,
        body: PostBody,
    ) -> Result<Option<PostDocument>, RepoError> {
        let mut posts = self.posts.lock().expect("posts lock");
        let Some(slot) = posts.iter_mut().find(|post| post.id() == Some(id)) else {
            return Ok(None);
        };
        *slot = Self::stamp(id.get(), body);
        Ok(Some(slot.clone()))
    }

    async fn delete_post(&self, id: PostId) -> Result<bool, RepoError> {
        let mut posts = self.posts.lock().expect("posts lock");
        let before = posts.len();
        posts.retain(|post| post.id() != Some(id));
        Ok(posts.len() != before)
    }
}

/// Everything a test needs, wired the way `quire serve` wires it.
pub struct Harness {
    pub store: Arc<MapStore>,
    pub posts: Arc<MemoryPosts>,
    pub cache: Arc<TieredCache>,
    pub hooks: Arc<CacheHooks>,
    pub post_service: Arc<PostService>,
    pub write_service: Arc<PostWriteService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        let store = MapStore::new();
        let posts = MemoryPosts::new();
        let cache = Arc::new(TieredCache::new(&config, store.clone()));
        let hooks = Arc::new(CacheHooks::new(cache.clone(), config.entity_ttl()));
        let index = Arc::new(PostIndexCache::new(cache.clone(), posts.clone(), &config));
        let post_service = Arc::new(PostService::new(
            cache.clone(),
            index,
            posts.clone(),
            config.entity_ttl(),
        ));
        let write_service = Arc::new(PostWriteService::new(posts.clone(), hooks.clone()));

        Self {
            store,
            posts,
            cache,
            hooks,
            post_service,
            write_service,
        }
    }

    pub fn public_state(&self) -> PublicState {
        PublicState {
            posts: self.post_service.clone(),
            search: Arc::new(SearchService::new(self.posts.clone())),
            db: self.posts.clone(),
        }
    }

    pub fn admin_state(&self) -> AdminState {
        AdminState {
            writes: self.write_service.clone(),
        }
    }
}
