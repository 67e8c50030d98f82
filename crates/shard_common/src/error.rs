use thiserror::Error;

use crate::types::ShardId;

/// Convenience alias for `Result<T, MergeError>`.
pub type MergeResult<T> = Result<T, MergeError>;

/// Error classification for the merge engine.
///
/// - `Configuration`    : a select item or plan references columns the result does not carry
/// - `Io`               : a shard cursor failed while being read
/// - `Lookup`           : unknown column index/label, or a read with no current row
/// - `Unsupported`      : a target type or stream kind the codec cannot produce
/// - `ResourceExhausted`: the buffered merge exceeded its configured row budget
/// - `InternalBug`      : should never happen; carries an error code for post-mortem
///
/// None of these are retried by the merge engine. Re-querying a failed shard is the
/// routing layer's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Io,
    Lookup,
    Unsupported,
    ResourceExhausted,
    InternalBug,
}

/// Top-level error type returned by every merge-layer operation.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Column error: {0}")]
    Column(#[from] ColumnError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A driver failure, attributed to the shard whose cursor produced it.
    #[error("{shard_id} failed: {source}")]
    Shard {
        shard_id: ShardId,
        #[source]
        source: DriverError,
    },

    #[error("Buffered merge aborted: {rows} rows exceeds max_rows_buffered limit of {limit}")]
    RowLimitExceeded { rows: usize, limit: usize },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("InternalBug [{error_code}]: {message} | context: {debug_context}")]
    InternalBug {
        error_code: &'static str,
        message: String,
        debug_context: String,
    },
}

/// Column lookup errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColumnError {
    #[error("Unknown column index {index} (column count {column_count})")]
    UnknownColumnIndex { index: usize, column_count: usize },

    #[error("Unknown column label: {0}")]
    UnknownColumnLabel(String),

    #[error("Cursor is not positioned on a row")]
    NoCurrentRow,
}

/// Value extraction / conversion errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Unsupported stream kind: {0}")]
    UnsupportedStreamKind(String),

    #[error("Value {value} out of range for {target}")]
    ValueOutOfRange { value: String, target: &'static str },

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },
}

/// Errors raised by a physical shard cursor.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Column {0} is not readable on this cursor")]
    BadColumn(usize),

    #[error("Cursor closed")]
    Closed,
}

/// Configuration and plan errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Aggregation item references unknown column: {0}")]
    UnknownAggregationColumn(String),

    #[error("GROUP BY references unknown column: {0}")]
    UnknownGroupByColumn(String),

    #[error("Merge requires at least one shard result")]
    NoShardResults,

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read configuration {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

// ── MergeError classification & helpers ─────────────────────────────────────

impl MergeError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MergeError::Config(_) => ErrorKind::Configuration,
            MergeError::Shard { .. } => ErrorKind::Io,
            MergeError::Column(_) => ErrorKind::Lookup,
            MergeError::Codec(CodecError::UnsupportedType(_))
            | MergeError::Codec(CodecError::UnsupportedStreamKind(_)) => ErrorKind::Unsupported,
            // A value that cannot be represented in the requested type is a caller error of
            // the same family as asking for an unsupported type.
            MergeError::Codec(_) => ErrorKind::Unsupported,
            MergeError::RowLimitExceeded { .. } => ErrorKind::ResourceExhausted,
            MergeError::Internal(_) | MergeError::InternalBug { .. } => ErrorKind::InternalBug,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration)
    }

    pub fn is_io(&self) -> bool {
        matches!(self.kind(), ErrorKind::Io)
    }

    pub fn is_lookup(&self) -> bool {
        matches!(self.kind(), ErrorKind::Lookup)
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self.kind(), ErrorKind::Unsupported)
    }

    /// The shard a failure is attributed to, if any.
    pub fn shard_id(&self) -> Option<ShardId> {
        match self {
            MergeError::Shard { shard_id, .. } => Some(*shard_id),
            _ => None,
        }
    }

    /// Attribute a driver failure to a shard.
    pub fn shard(shard_id: ShardId, source: DriverError) -> Self {
        MergeError::Shard { shard_id, source }
    }

    /// Construct an internal bug error with error code and context.
    pub fn internal_bug(
        error_code: &'static str,
        message: impl Into<String>,
        debug_context: impl Into<String>,
    ) -> Self {
        MergeError::InternalBug {
            error_code,
            message: message.into(),
            debug_context: debug_context.into(),
        }
    }

    /// Add context string to an error, **preserving error classification** where the
    /// variant has a free-form message. Other variants are returned unchanged, since
    /// their structured fields are what callers match on.
    pub fn with_context(self, ctx: impl Into<String>) -> Self {
        let ctx = ctx.into();
        match self {
            MergeError::Internal(msg) => MergeError::Internal(format!("{ctx}: {msg}")),
            MergeError::InternalBug {
                error_code,
                message,
                debug_context,
            } => MergeError::InternalBug {
                error_code,
                message: format!("{ctx}: {message}"),
                debug_context,
            },
            MergeError::Shard {
                shard_id,
                source: DriverError::Driver(msg),
            } => MergeError::Shard {
                shard_id,
                source: DriverError::Driver(format!("{ctx}: {msg}")),
            },
            other => other,
        }
    }

    /// Emit a structured log entry for internal bugs.
    pub fn log_if_internal_bug(&self) {
        if let MergeError::InternalBug {
            error_code,
            message,
            debug_context,
        } = self
        {
            tracing::error!(
                error_code = error_code,
                debug_context = debug_context.as_str(),
                "INTERNAL BUG [{}]: {}",
                error_code,
                message
            );
        }
    }
}

/// Add context to a Result, preserving error classification.
/// Usage: `some_result.ctx("stage=drain, shard=3")?`
pub trait ErrorContext<T> {
    fn ctx(self, context: &str) -> Result<T, MergeError>;
    fn ctx_with(self, f: impl FnOnce() -> String) -> Result<T, MergeError>;
}

impl<T, E: Into<MergeError>> ErrorContext<T> for Result<T, E> {
    fn ctx(self, context: &str) -> Result<T, MergeError> {
        self.map_err(|e| e.into().with_context(context))
    }
    fn ctx_with(self, f: impl FnOnce() -> String) -> Result<T, MergeError> {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[cfg(test)]
mod error_classification {
    use super::*;

    #[test]
    fn test_unknown_index_is_lookup() {
        let e: MergeError = ColumnError::UnknownColumnIndex {
            index: 6,
            column_count: 5,
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::Lookup);
        assert!(e.is_lookup());
        assert!(e.to_string().contains("6"));
    }

    #[test]
    fn test_unknown_aggregation_column_is_configuration() {
        let e: MergeError = ConfigError::UnknownAggregationColumn("AVG_DERIVED_SUM_0".into()).into();
        assert!(e.is_configuration());
        assert!(!e.is_io());
    }

    #[test]
    fn test_shard_failure_is_io_and_carries_shard() {
        let e = MergeError::shard(ShardId(3), DriverError::Driver("socket reset".into()));
        assert_eq!(e.kind(), ErrorKind::Io);
        assert_eq!(e.shard_id(), Some(ShardId(3)));
        assert!(e.to_string().contains("socket reset"));
    }

    #[test]
    fn test_unsupported_stream_kind() {
        let e: MergeError = CodecError::UnsupportedStreamKind("utf32".into()).into();
        assert!(e.is_unsupported());
    }

    #[test]
    fn test_row_limit_is_resource_exhausted() {
        let e = MergeError::RowLimitExceeded { rows: 11, limit: 10 };
        assert_eq!(e.kind(), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn test_with_context_on_internal() {
        let e = MergeError::Internal("original".into()).with_context("stage=divide");
        assert!(e.to_string().contains("stage=divide"));
        assert!(e.to_string().contains("original"));
    }

    #[test]
    fn test_with_context_preserves_shard_attribution() {
        let e = MergeError::shard(ShardId(1), DriverError::Driver("eof".into()))
            .with_context("stage=drain");
        assert_eq!(e.shard_id(), Some(ShardId(1)));
        assert!(e.to_string().contains("stage=drain"));
    }

    #[test]
    fn test_with_context_leaves_lookup_untouched() {
        let e: MergeError = ColumnError::UnknownColumnLabel("x".into()).into();
        let e2 = e.with_context("ignored");
        assert!(matches!(
            e2,
            MergeError::Column(ColumnError::UnknownColumnLabel(_))
        ));
    }

    #[test]
    fn test_error_context_trait() {
        let result: Result<(), MergeError> = Err(MergeError::Internal("boom".into()));
        let err = result.ctx("stage=merge").unwrap_err();
        assert!(err.to_string().contains("stage=merge"));

        let ok: Result<i32, ColumnError> = Ok(7);
        assert_eq!(ok.ctx("unused").unwrap(), 7);
    }

    #[test]
    fn test_internal_bug_constructor() {
        let e = MergeError::internal_bug("E-MERGE-001", "group vanished", "key=3");
        assert_eq!(e.kind(), ErrorKind::InternalBug);
        match e {
            MergeError::InternalBug {
                error_code,
                message,
                debug_context,
            } => {
                assert_eq!(error_code, "E-MERGE-001");
                assert_eq!(message, "group vanished");
                assert_eq!(debug_context, "key=3");
            }
            _ => panic!("expected InternalBug variant"),
        }
    }
}
