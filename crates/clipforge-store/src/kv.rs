//! Thin wrapper around a Redis connection manager: script registration,
//! deadline-wrapped round trips, and the JSON (de)serialize helpers every
//! repository in this crate builds on.

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::time::Duration;

/// How long a single Redis round trip is allowed to take before the caller
/// gets a transport error back instead of hanging — protects the worker pool
/// from a wedged connection stalling every in-flight job.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct RedisScripts {
    pub update_progress: Script,
    pub update_status: Script,
    pub complete_job: Script,
}

impl RedisScripts {
    pub fn load() -> Self {
        Self {
            update_progress: Script::new(include_str!("lua/update_progress.lua")),
            update_status: Script::new(include_str!("lua/update_status.lua")),
            complete_job: Script::new(include_str!("lua/complete_job.lua")),
        }
    }
}

/// Shared handle to Redis: a multiplexed connection manager plus the
/// pre-parsed Lua scripts used for atomic job mutations.
#[derive(Clone)]
pub struct KvStore {
    conn: ConnectionManager,
    pub scripts: RedisScripts,
}

impl KvStore {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            scripts: RedisScripts::load(),
        })
    }

    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    pub async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let fut = conn.get::<_, Option<String>>(key);
        Ok(tokio::time::timeout(COMMAND_TIMEOUT, fut).await??)
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let fut = conn.set_ex::<_, _, ()>(key, value, ttl_secs);
        tokio::time::timeout(COMMAND_TIMEOUT, fut).await??;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let fut = conn.del::<_, ()>(key);
        tokio::time::timeout(COMMAND_TIMEOUT, fut).await??;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let fut = conn.exists::<_, bool>(key);
        Ok(tokio::time::timeout(COMMAND_TIMEOUT, fut).await??)
    }
}
