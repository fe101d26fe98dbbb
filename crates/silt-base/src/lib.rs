//! Key primitives shared by the silt storage engine crates.
//!
//! Keys live in two layers:
//!
//! - **User keys** are opaque byte strings (`bytes::Bytes`), ordered by a
//!   caller-supplied comparator.
//! - **Internal keys** pair a user key with a trailer that packs a sequence
//!   number and a key kind into a single `u64`. Internal keys are what table
//!   boundaries are expressed in: the trailer disambiguates multiple versions
//!   of the same user key and carries the range-delete sentinel that marks a
//!   table's largest key as an exclusive bound.
//!
//! The comparator and the diagnostic key formatter are capabilities injected
//! at construction time ([`Compare`], [`FormatKey`]), never baked into the
//! key types themselves. This keeps key ordering a property of the store that
//! owns the keys, not of the byte strings.

mod compare;
mod key;

pub use compare::{bytewise_compare, lossy_format_key, Compare, FormatKey};
pub use key::{
    make_trailer, InternalKey, KeyKind, RANGE_DELETE_SENTINEL, SEQNO_MAX,
};

// Re-export for convenience
pub use bytes::Bytes;
