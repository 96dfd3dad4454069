//! Configuration for chainstore.
//!
//! Constants for the defaults, plus a [`Config`] with a builder.

use super::{Error, Result};

/// Default size of a block in bytes (4KB).
///
/// Matches the OS page size on most systems, so one block write is one
/// page write.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Default B-tree minimum degree.
///
/// With t = 3 a node holds between 2 and 5 pairs (the root may hold fewer).
pub const DEFAULT_MIN_DEGREE: usize = 3;

/// Size of one header field in bytes (a little-endian `i64`).
pub const HEADER_FIELD_SIZE: usize = 8;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Size of every block in the medium, header included.
    pub block_size: usize,

    /// Seal every written block with a CRC32 and verify it on read.
    ///
    /// Off by default. Turning it on adds a fourth header field, which
    /// changes the on-disk layout: a medium must always be opened with the
    /// setting it was written with.
    pub checksums: bool,

    /// fsync the medium after every block write.
    pub sync_writes: bool,

    /// Minimum degree t of the B-tree index.
    pub min_degree: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            checksums: false,
            sync_writes: false,
            min_degree: DEFAULT_MIN_DEGREE,
        }
    }
}

impl Config {
    /// Create a new config builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Number of header fields a block carries under this config.
    pub fn header_fields(&self) -> usize {
        if self.checksums {
            4
        } else {
            3
        }
    }

    /// Header size in bytes.
    pub fn header_size(&self) -> usize {
        self.header_fields() * HEADER_FIELD_SIZE
    }

    /// Check that the config describes a usable store.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if the block leaves no content region
    /// or the minimum degree is below 2.
    pub fn validate(&self) -> Result<()> {
        if self.block_size <= self.header_size() {
            return Err(Error::InvalidConfig(format!(
                "block size {} leaves no room after a {}-byte header",
                self.block_size,
                self.header_size()
            )));
        }
        if self.min_degree < 2 {
            return Err(Error::InvalidConfig(format!(
                "minimum degree must be at least 2, got {}",
                self.min_degree
            )));
        }
        Ok(())
    }
}

/// Builder for [`Config`].
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the block size (header included).
    pub fn block_size(mut self, size: usize) -> Self {
        self.config.block_size = size;
        self
    }

    /// Enable or disable per-block CRC32 checksums.
    pub fn checksums(mut self, enabled: bool) -> Self {
        self.config.checksums = enabled;
        self
    }

    /// Enable or disable fsync after each block write.
    pub fn sync_writes(mut self, enabled: bool) -> Self {
        self.config.sync_writes = enabled;
        self
    }

    /// Set the B-tree minimum degree.
    pub fn min_degree(mut self, t: usize) -> Self {
        self.config.min_degree = t;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
