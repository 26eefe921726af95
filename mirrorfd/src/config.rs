//! Remote writer endpoint configuration.

use std::net::TcpStream;
use std::path::Path;
use std::{fs, io};

use serde::{Deserialize, Serialize};

/// Location of the remote writer process.
///
/// This is the whole configuration surface the driver consumes; open flags,
/// address-space size, and file path arrive per [`open`] call from the host
/// interface.
///
/// [`open`]: crate::MirrorDriver::open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Host name or IP address the writer listens on.
    pub host: String,
    /// TCP port the writer listens on.
    pub port: u16,
}

impl WriterConfig {
    /// Creates a configuration targeting `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Loads a configuration from a JSON file.
    pub fn load(path: &Path) -> io::Result<Self> {
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Persists the configuration to a JSON file.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(io::Error::other)
    }

    /// Opens the stream connection to the writer, resolving the host name.
    pub(crate) fn connect(&self) -> io::Result<TcpStream> {
        TcpStream::connect((self.host.as_str(), self.port))
    }
}
