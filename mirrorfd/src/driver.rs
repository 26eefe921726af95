//! Driver entry point: endpoint configuration plus the open call.

use crate::config::WriterConfig;
use crate::error::Result;
use crate::session::MirrorFile;

/// Open flags accepted by [`MirrorDriver::open`].
///
/// Bit-compatible with the host interface's access flags; combine with `|`.
pub mod flags {
    /// Open for reading and writing (the writer still only ever writes).
    pub const RDWR: u32 = 0x0001;
    /// Truncate an existing file to zero length on open.
    pub const TRUNCATE: u32 = 0x0002;
    /// Fail if the file already exists.
    pub const EXCLUSIVE: u32 = 0x0004;
    /// Create the file if it does not exist.
    pub const CREATE: u32 = 0x0010;
}

/// Feature flags the driver reports to its host.
///
/// The mirror driver accepts every write-path optimization the host offers
/// and reports itself incapable of reads, which routes all read traffic to
/// whatever channel sits alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Metadata allocations may be aggregated into larger blocks.
    pub aggregate_metadata: bool,
    /// Small metadata writes may be accumulated before transmission.
    pub accumulate_metadata: bool,
    /// Data sieve buffering is tolerated.
    pub data_sieve: bool,
    /// Small raw-data allocations may be aggregated.
    pub aggregate_small_data: bool,
    /// Always false: this driver cannot serve reads.
    pub supports_read: bool,
}

/// Factory for mirror sessions.
///
/// Holds the writer endpoint; each [`open`](Self::open) dials a fresh
/// connection and runs an independent session over it.
#[derive(Debug, Clone)]
pub struct MirrorDriver {
    config: WriterConfig,
}

impl MirrorDriver {
    /// Registered name of this driver.
    pub const NAME: &'static str = "mirror";

    /// Creates a driver that will dial `config` on every open.
    pub const fn new(config: WriterConfig) -> Self {
        Self { config }
    }

    /// The configured writer endpoint.
    pub const fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Opens `path` on the remote writer.
    ///
    /// `maxaddr` bounds the file's address space and must be nonzero; the
    /// value is forwarded to the writer verbatim.
    pub fn open(&self, path: &str, flags: u32, maxaddr: u64) -> Result<MirrorFile> {
        MirrorFile::open(&self.config, path, flags, maxaddr)
    }

    /// Reports the driver's feature flags.
    pub const fn query() -> Capabilities {
        Capabilities {
            aggregate_metadata: true,
            accumulate_metadata: true,
            data_sieve: true,
            aggregate_small_data: true,
            supports_read: false,
        }
    }
}
