//! Error handling for unillm.
//!
//! All fallible operations in the crate return [`ClientError`]. The taxonomy
//! mirrors how failures behave at runtime:
//!
//! - configuration errors fail before any network I/O and are never retryable
//! - transport errors come from the HTTP layer; retry policy is the caller's
//! - decode errors wrap non-2xx responses and structurally invalid bodies,
//!   preserving the status code and raw body for diagnostics
//! - stream errors cover failures of an established streaming connection
//!
//! Per-event streaming faults (a malformed SSE frame, an unparsable tool-call
//! argument fragment) are deliberately *not* part of this taxonomy: they are
//! degraded gracefully inside the streaming decoder and never surface here.

mod conversions;
mod types;

pub use types::{ClientError, ErrorCategory};
