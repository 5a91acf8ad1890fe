//! Redis-backed persistence for clipforge: job/file/rate-limit/archive
//! repositories and the progress Pub/Sub channel.
//!
//! Redis is the sole source of truth (no secondary database); atomic
//! read-modify-write sequences are implemented as Lua scripts under
//! `src/lua/` rather than optimistic-locking loops, so the status and
//! progress state machines hold even under concurrent worker access.

pub mod archive;
pub mod files;
pub mod jobs;
pub mod kv;
pub mod progress;
pub mod queue;
pub mod ratelimit;

pub use archive::RedisArchiveRepository;
pub use files::RedisFileRepository;
pub use jobs::RedisJobRepository;
pub use kv::KvStore;
pub use progress::{ProgressEvent, RedisProgressChannel};
pub use queue::JobQueue;
pub use ratelimit::RedisRateLimitRepository;
