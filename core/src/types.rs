//! Shared primitive types used across the entire engine.

/// A scheduler tick. The embedder decides how long one tick is in real time.
pub type Tick = u64;

/// Stable identifier for a single metric row, assigned by the remote service.
pub type RowId = i64;

/// The canonical session identifier.
pub type SessionId = String;
