//! Redis-backed store.
//!
//! The connection is opened on first use, never at construction, so an
//! unreachable Redis cannot block startup. A failed connect leaves the cell
//! empty and the next command tries again. Connecting and every reply are
//! bounded by the command timeout, so a Redis that accepts connections but
//! never answers reads as a miss.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, ErrorKind, RedisError, RedisResult};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{BackingMode, BackingStore};

const METRIC_BACKING_ERROR_TOTAL: &str = "quire_cache_backing_error_total";
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(500);

pub struct RedisStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    scan_count: usize,
    max_retries: usize,
    command_timeout: Duration,
    tls: bool,
}

impl RedisStore {
    /// Validate the URL and prepare a client. Does not connect.
    pub fn new(url: &str, scan_count: usize, max_retries: usize) -> RedisResult<Self> {
        let client = Client::open(url)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            scan_count: scan_count.max(1),
            max_retries,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            tls: url.starts_with("rediss://"),
        })
    }

    /// Bound on connecting and on each reply. Zero is raised to 1 ms.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    pub fn uses_tls(&self) -> bool {
        self.tls
    }

    async fn connection(&self, op: &'static str) -> Option<ConnectionManager> {
        let result = self
            .connection
            .get_or_try_init(|| async {
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(self.max_retries)
                    .set_connection_timeout(self.command_timeout)
                    .set_response_timeout(self.command_timeout);
                // Retries back off between attempts; bound the whole connect
                // so concurrent callers waiting on the cell are released.
                let budget = self.command_timeout * (self.max_retries as u32 + 2);
                let manager = tokio::time::timeout(
                    budget,
                    ConnectionManager::new_with_config(self.client.clone(), config),
                )
                .await
                .map_err(|_| RedisError::from((ErrorKind::IoError, "Redis connect timed out")))??;
                debug!(tls = self.tls, "Redis connection established");
                Ok::<_, RedisError>(manager)
            })
            .await;

        match result {
            Ok(manager) => Some(manager.clone()),
            Err(err) => {
                self.report(op, None, &err);
                None
            }
        }
    }

    fn report(&self, op: &'static str, key: Option<&str>, err: &RedisError) {
        counter!(METRIC_BACKING_ERROR_TOTAL, "op" => op).increment(1);
        warn!(
            op,
            key = key.unwrap_or(""),
            error = %err,
            "Redis command failed, treating as cache miss"
        );
    }
}

#[async_trait]
impl BackingStore for RedisStore {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.connection("get").await?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(err) => {
                self.report("get", Some(key), &err);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> bool {
        let Some(mut conn) = self.connection("set").await else {
            return false;
        };
        match conn.set::<_, _, ()>(key, value).await {
            Ok(()) => true,
            Err(err) => {
                self.report("set", Some(key), &err);
                false
            }
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> bool {
        let Some(mut conn) = self.connection("setex").await else {
            return false;
        };
        // SETEX rejects a zero expiry.
        let seconds = ttl.as_secs().max(1);
        match conn.set_ex::<_, _, ()>(key, value, seconds).await {
            Ok(()) => true,
            Err(err) => {
                self.report("setex", Some(key), &err);
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        let Some(mut conn) = self.connection("del").await else {
            return false;
        };
        match conn.del::<_, ()>(key).await {
            Ok(()) => true,
            Err(err) => {
                self.report("del", Some(key), &err);
                false
            }
        }
    }

    async fn multi_get(&self, keys: &[String]) -> Vec<Option<String>> {
        if keys.is_empty() {
            return Vec::new();
        }
        let Some(mut conn) = self.connection("mget").await else {
            return vec![None; keys.len()];
        };

        // Built by hand: the `mget` helper sends GET for a single key, which
        // does not decode into a list.
        let mut cmd = redis::cmd("MGET");
        for key in keys {
            cmd.arg(key.as_str());
        }

        let result: RedisResult<Vec<Option<String>>> = cmd.query_async(&mut conn).await;
        match result {
            Ok(values) => align_slots(keys.len(), values),
            Err(err) => {
                self.report("mget", None, &err);
                vec![None; keys.len()]
            }
        }
    }

    async fn scan_by_pattern(&self, pattern: &str) -> Vec<String> {
        let Some(conn) = self.connection("scan").await else {
            return Vec::new();
        };

        let scan_count = self.scan_count;
        let result = scan_cursor(|cursor| {
            let mut conn = conn.clone();
            async move {
                let batch: RedisResult<(u64, Vec<String>)> = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(pattern)
                    .arg("COUNT")
                    .arg(scan_count)
                    .query_async(&mut conn)
                    .await;
                batch
            }
        })
        .await;

        match result {
            Ok(keys) => {
                debug!(pattern, matched = keys.len(), "Redis scan complete");
                keys
            }
            Err(err) => {
                self.report("scan", Some(pattern), &err);
                Vec::new()
            }
        }
    }

    fn mode(&self) -> BackingMode {
        BackingMode::Redis
    }
}

/// Walk a SCAN cursor from `0` until the server hands back `0` again,
/// dropping keys repeated across batches. Any failed batch fails the walk.
async fn scan_cursor<F, Fut>(mut fetch: F) -> RedisResult<Vec<String>>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = RedisResult<(u64, Vec<String>)>>,
{
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    let mut cursor = 0;
    loop {
        let (next, batch) = fetch(cursor).await?;
        for key in batch {
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
        if next == 0 {
            return Ok(keys);
        }
        cursor = next;
    }
}

/// One slot per requested key. A reply of the wrong length cannot be matched
/// to its keys and is discarded as all misses.
fn align_slots(requested: usize, values: Vec<Option<String>>) -> Vec<Option<String>> {
    if values.len() == requested {
        return values;
    }
    warn!(
        requested,
        returned = values.len(),
        "MGET returned an unexpected number of values"
    );
    vec![None; requested]
}
