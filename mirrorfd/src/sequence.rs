//! Session token and exchange counter bookkeeping.

use std::net::TcpStream;

use mirrorfd_proto::{Header, Op, Reply, Status};

use crate::error::{Error, Result};

/// Stamps outgoing headers and validates replies for one session.
///
/// Owns the two pieces of sequencing state: the session token fixed at
/// connection time and the strictly increasing exchange counter.
#[derive(Debug)]
pub(crate) struct SequenceTracker {
    /// Token the writer must echo on every reply.
    session_token: u32,
    /// Count assigned to the next client-initiated exchange.
    next_count: u32,
}

impl SequenceTracker {
    pub(crate) const fn new(session_token: u32) -> Self {
        Self {
            session_token,
            next_count: 0,
        }
    }

    pub(crate) const fn session_token(&self) -> u32 {
        self.session_token
    }

    /// Returns the header for the next exchange.
    ///
    /// Consumes exactly one count per call, whatever becomes of the exchange;
    /// the first call of a session always yields count 0.
    pub(crate) const fn next_header(&mut self, op: Op) -> Header {
        let header = Header::new(self.session_token, self.next_count, op);
        self.next_count = self.next_count.wrapping_add(1);
        header
    }

    /// Checks a reply against the request that solicited it.
    ///
    /// Token mismatch and count mismatch are protocol failures; a clean
    /// reply with [`Status::Error`] surfaces the writer's message text.
    pub(crate) fn validate_reply(&self, reply: &Reply, expected_count: u32) -> Result<()> {
        if reply.header.session_token != self.session_token {
            return Err(Error::Desync {
                expected: self.session_token,
                found: reply.header.session_token,
            });
        }
        if reply.header.xmit_count != expected_count {
            return Err(Error::Sequence {
                expected: expected_count,
                found: reply.header.xmit_count,
            });
        }
        match reply.status {
            Status::Ok => Ok(()),
            Status::Error => Err(Error::Remote(reply.message.clone())),
        }
    }
}

/// Derives a session token unique to this process and connection.
///
/// Hashes a per-process random seed with the pid, the current time, and the
/// connection's local port. The writer treats the token as opaque and only
/// checks it for equality.
pub(crate) fn derive_token(stream: &TcpStream) -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    use std::time::{SystemTime, UNIX_EPOCH};

    let mut h = RandomState::new().build_hasher();
    h.write_u64(u64::from(std::process::id()));
    h.write_u128(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos(),
    );
    if let Ok(addr) = stream.local_addr() {
        h.write_u16(addr.port());
    }
    (h.finish() & 0xFFFF_FFFF) as u32
}
