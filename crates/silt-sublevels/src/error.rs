use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A table's smallest or largest key could not be located among the
    /// deduplicated interval boundary keys. Indicates corrupt bounds.
    #[error("expected sstable bound to be in interval keys: {key}")]
    BoundNotInIntervalKeys { key: String },

    /// Sublevel assembly computed a sublevel more than one past the current
    /// stack height.
    #[error("chose a sublevel beyond allowed range of sublevels: {sublevel} vs 0-{limit}")]
    SublevelOverflow { sublevel: usize, limit: usize },

    /// A seed file chosen for a base compaction is already being compacted
    /// to Lbase. The caller's compaction bookkeeping is inconsistent.
    #[error("file {file_number:06} chosen as seed file for compaction should not be compacting")]
    SeedFileCompacting { file_number: u64 },

    /// No file was available where the picker expected one.
    #[error("no seed file found in sublevel intervals")]
    NoSeedFile,
}

pub type Result<T> = std::result::Result<T, Error>;
