//! Comparator and key-formatter capabilities.

use std::cmp::Ordering;
use std::sync::Arc;

/// User-key comparator. Injected wherever key ordering is needed; key types
/// deliberately do not implement `Ord`.
pub type Compare = Arc<dyn Fn(&[u8], &[u8]) -> Ordering + Send + Sync>;

/// Renders a user key for diagnostics and log output.
pub type FormatKey = Arc<dyn Fn(&[u8]) -> String + Send + Sync>;

/// The default comparator: plain bytewise ordering.
pub fn bytewise_compare() -> Compare {
    Arc::new(|a, b| a.cmp(b))
}

/// The default formatter: lossy UTF-8.
pub fn lossy_format_key() -> FormatKey {
    Arc::new(|k| String::from_utf8_lossy(k).into_owned())
}
