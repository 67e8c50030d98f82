//! Shared building blocks for the shard result merger: the canonical value model,
//! declared SQL type tags, the error taxonomy and configuration.

pub mod config;
pub mod datum;
pub mod error;
pub mod types;

pub use config::MergeConfig;
pub use datum::{Datum, LargeObject, OwnedRow, RawCell};
pub use error::{ErrorKind, MergeError, MergeResult};
pub use types::{ShardId, SqlType, StreamKind, TargetType};
