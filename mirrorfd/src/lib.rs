//! Write-only remote-mirroring file driver.
//!
//! A local process producing a container file hands every storage-affecting
//! operation to a remote writer process instead of touching local storage:
//! each operation becomes one fixed-layout request over a single TCP
//! connection (see [`mirrorfd_proto`]), answered synchronously by one
//! acknowledgement. WRITE carries its payload in a second transmission after
//! the announcement is acknowledged. The driver is strictly write-only —
//! read requests fail without reaching the network.
//!
//! # Quick start
//!
//! ```no_run
//! use mirrorfd::{MemClass, MirrorDriver, WriterConfig, flags};
//!
//! let driver = MirrorDriver::new(WriterConfig::new("mirror-host", 3030));
//! let file = driver.open("/data/out.h5", flags::RDWR | flags::CREATE, 0xFFFF_FFFF)?;
//! file.write(MemClass::RawData, 0, b"payload bytes")?;
//! file.close()?;
//! # Ok::<(), mirrorfd::Error>(())
//! ```

mod config;
mod driver;
mod error;
mod sequence;
mod session;

pub use config::WriterConfig;
pub use driver::{Capabilities, MirrorDriver, flags};
pub use error::{Error, Result};
pub use mirrorfd_proto::MemClass;
pub use session::MirrorFile;
