//! Redis key-value sink.
//!
//! Records are stored either as namespaced string keys (`<keyName>:<id>`) or
//! as fields of one hash named `<keyName>`. The storage operations sit behind
//! [`KeyValueStore`] so the sink logic can be exercised without a server.

mod client;
mod memory;
mod sink;
mod store;

pub use client::{RedisClient, RedisOptions};
pub use memory::MemoryStore;
pub use sink::{KeyType, KeyValueSink, RedisRule};
pub use store::KeyValueStore;
