//! Internal key representation.
//!
//! Trailer layout (little-endian view of the `u64`):
//! - bits 8..64: sequence number (56 bits)
//! - bits 0..8: key kind

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum representable sequence number (56 bits).
pub const SEQNO_MAX: u64 = (1 << 56) - 1;

/// The operation a key encodes.
///
/// Only the kinds the metadata layer distinguishes are represented here; the
/// discriminants leave room for the full set used by table formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyKind {
    Delete = 0,
    Set = 1,
    Merge = 2,
    RangeDelete = 15,
    Invalid = 255,
}

impl KeyKind {
    fn from_u8(v: u8) -> KeyKind {
        match v {
            0 => KeyKind::Delete,
            1 => KeyKind::Set,
            2 => KeyKind::Merge,
            15 => KeyKind::RangeDelete,
            _ => KeyKind::Invalid,
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyKind::Delete => "DEL",
            KeyKind::Set => "SET",
            KeyKind::Merge => "MERGE",
            KeyKind::RangeDelete => "RANGEDEL",
            KeyKind::Invalid => "INVALID",
        };
        f.write_str(s)
    }
}

/// Packs a sequence number and kind into a trailer.
pub const fn make_trailer(seqno: u64, kind: KeyKind) -> u64 {
    (seqno << 8) | kind as u64
}

/// Trailer of a largest key that acts as an exclusive upper bound: the key
/// belongs to a range deletion ending at (not including) that user key.
pub const RANGE_DELETE_SENTINEL: u64 = make_trailer(SEQNO_MAX, KeyKind::RangeDelete);

/// A user key plus a trailer. Table bounds (smallest/largest) are internal
/// keys; the largest key is inclusive unless its trailer is the range-delete
/// sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalKey {
    pub user_key: Bytes,
    pub trailer: u64,
}

impl InternalKey {
    /// Creates an internal key from its parts.
    pub fn new(user_key: impl Into<Bytes>, seqno: u64, kind: KeyKind) -> InternalKey {
        InternalKey {
            user_key: user_key.into(),
            trailer: make_trailer(seqno, kind),
        }
    }

    /// Creates an exclusive largest bound at `user_key`.
    pub fn range_delete_sentinel(user_key: impl Into<Bytes>) -> InternalKey {
        InternalKey {
            user_key: user_key.into(),
            trailer: RANGE_DELETE_SENTINEL,
        }
    }

    /// The invalid key, used to express an unbounded side of a key range.
    pub fn invalid() -> InternalKey {
        InternalKey {
            user_key: Bytes::new(),
            trailer: make_trailer(0, KeyKind::Invalid),
        }
    }

    pub fn seqno(&self) -> u64 {
        self.trailer >> 8
    }

    pub fn kind(&self) -> KeyKind {
        KeyKind::from_u8(self.trailer as u8)
    }

    pub fn is_valid(&self) -> bool {
        self.kind() != KeyKind::Invalid
    }

    pub fn is_range_delete_sentinel(&self) -> bool {
        self.trailer == RANGE_DELETE_SENTINEL
    }
}

impl fmt::Display for InternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{},{}",
            String::from_utf8_lossy(&self.user_key),
            self.seqno(),
            self.kind()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailer_roundtrip() {
        let k = InternalKey::new(&b"foo"[..], 42, KeyKind::Set);
        assert_eq!(k.seqno(), 42);
        assert_eq!(k.kind(), KeyKind::Set);
        assert!(k.is_valid());
        assert!(!k.is_range_delete_sentinel());
    }

    #[test]
    fn test_sentinel() {
        let k = InternalKey::range_delete_sentinel(&b"foo"[..]);
        assert!(k.is_range_delete_sentinel());
        assert_eq!(k.kind(), KeyKind::RangeDelete);
        assert_eq!(k.seqno(), SEQNO_MAX);
    }

    #[test]
    fn test_invalid() {
        let k = InternalKey::invalid();
        assert!(!k.is_valid());
    }

    #[test]
    fn test_display() {
        let k = InternalKey::new(&b"a"[..], 7, KeyKind::Set);
        assert_eq!(k.to_string(), "a#7,SET");
    }
}
