//! Error taxonomy and the single-slot last-error channel.
//!
//! Every failure that can be triggered by a guest import is a [`BridgeError`]. Handle-producing
//! imports turn it into a `0` return plus a message recorded in the [`ErrorSlot`]; void imports
//! only log it. Nothing in here is fatal to the host.

use crate::registry::ResourceKind;

/// Failures raised while decoding descriptors or calling into the host.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A referenced handle is 0, out of range, or tombstoned.
    #[error("invalid {kind} handle {handle} in `{field}`")]
    InvalidHandle {
        kind: ResourceKind,
        handle: u32,
        field: &'static str,
    },

    /// A read would run past the end of guest memory.
    #[error("guest memory access out of bounds: offset {offset} + {len} exceeds memory size {memory_size}")]
    MemoryBounds {
        offset: u64,
        len: u64,
        memory_size: u64,
    },

    /// An enum ordinal or union tag with no mapping.
    #[error("unsupported {what} value {value}")]
    UnsupportedValue { what: &'static str, value: u64 },

    /// A structurally broken record (bad UTF-8, unterminated string, kind mismatch, ...).
    #[error("malformed {record}: {reason}")]
    MalformedRecord {
        record: &'static str,
        reason: String,
    },

    /// The host implementation rejected the call.
    #[error("{op} failed: {message}")]
    HostOperationFailure { op: &'static str, message: String },
}

impl BridgeError {
    pub fn host(op: &'static str, message: impl Into<String>) -> Self {
        BridgeError::HostOperationFailure {
            op,
            message: message.into(),
        }
    }

    pub fn malformed(record: &'static str, reason: impl Into<String>) -> Self {
        BridgeError::MalformedRecord {
            record,
            reason: reason.into(),
        }
    }

    pub fn unsupported(what: &'static str, value: impl Into<u64>) -> Self {
        BridgeError::UnsupportedValue {
            what,
            value: value.into(),
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

/// At most one pending diagnostic message.
///
/// A new error always overwrites the previous one. Copy-out is cursor based: each
/// [`ErrorSlot::copy_into`] hands out the next `dest.len()` bytes of the message and the
/// slot clears only once the final byte has been copied.
#[derive(Debug, Default)]
pub struct ErrorSlot {
    message: Vec<u8>,
    cursor: usize,
}

/// Stored in place of an empty message so a failed call always leaves something pending.
const UNSPECIFIED: &str = "unspecified host error";

impl ErrorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `message`, replacing anything pending, and return the null handle.
    ///
    /// An empty message is replaced with a generic one.
    pub fn record(&mut self, message: impl Into<String>) -> u32 {
        let mut message = message.into();
        if message.is_empty() {
            message.push_str(UNSPECIFIED);
        }
        log::warn!("{message}");
        self.message = message.into_bytes();
        self.cursor = 0;
        0
    }

    /// Record a [`BridgeError`] raised by `op`.
    pub fn record_error(&mut self, op: &str, err: &BridgeError) -> u32 {
        self.record(format!("{op}: {err}"))
    }

    pub fn has_error(&self) -> bool {
        self.cursor < self.message.len()
    }

    /// Bytes still waiting to be copied out.
    pub fn len(&self) -> usize {
        self.message.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        !self.has_error()
    }

    /// Copy up to `dest.len()` pending bytes into `dest`, returning how many were written.
    pub fn copy_into(&mut self, dest: &mut [u8]) -> usize {
        let pending = &self.message[self.cursor..];
        let n = pending.len().min(dest.len());
        dest[..n].copy_from_slice(&pending[..n]);
        self.cursor += n;
        if self.cursor >= self.message.len() {
            self.clear();
        }
        n
    }

    pub fn clear(&mut self) {
        self.message.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_returns_null_handle_and_reports_length() {
        let mut slot = ErrorSlot::new();
        assert_eq!(slot.record("x"), 0);
        assert!(slot.has_error());
        assert_eq!(slot.len(), 1);
    }

    #[test]
    fn empty_message_still_leaves_an_error_pending() {
        let mut slot = ErrorSlot::new();
        assert_eq!(slot.record(""), 0);
        assert!(slot.has_error());
        assert_eq!(slot.len(), UNSPECIFIED.len());
    }

    #[test]
    fn partial_copy_leaves_message_pending() {
        let mut slot = ErrorSlot::new();
        slot.record("boom");

        let mut buf = [0u8; 16];
        assert_eq!(slot.copy_into(&mut buf[..1]), 1);
        assert_eq!(&buf[..1], b"b");
        assert!(slot.has_error());
        assert_eq!(slot.len(), 3);

        assert_eq!(slot.copy_into(&mut buf), 3);
        assert_eq!(&buf[..3], b"oom");
        assert!(!slot.has_error());
        assert_eq!(slot.len(), 0);
    }

    #[test]
    fn full_copy_clears_in_one_call() {
        let mut slot = ErrorSlot::new();
        slot.record("x");
        let mut buf = [0u8; 16];
        assert_eq!(slot.copy_into(&mut buf), 1);
        assert_eq!(buf[0], b'x');
        assert!(!slot.has_error());
    }

    #[test]
    fn newer_error_overwrites_pending_one() {
        let mut slot = ErrorSlot::new();
        slot.record("first failure");
        let mut buf = [0u8; 4];
        slot.copy_into(&mut buf);
        slot.record("second");
        assert_eq!(slot.len(), "second".len());

        let mut out = [0u8; 32];
        let n = slot.copy_into(&mut out);
        assert_eq!(&out[..n], b"second");
    }

    #[test]
    fn zero_length_destination_copies_nothing() {
        let mut slot = ErrorSlot::new();
        slot.record("pending");
        assert_eq!(slot.copy_into(&mut []), 0);
        assert!(slot.has_error());
    }

    #[test]
    fn error_messages_name_the_field() {
        let err = BridgeError::InvalidHandle {
            kind: ResourceKind::Buffer,
            handle: 7,
            field: "entries[0].buffer",
        };
        assert_eq!(
            err.to_string(),
            "invalid buffer handle 7 in `entries[0].buffer`"
        );
    }
}
