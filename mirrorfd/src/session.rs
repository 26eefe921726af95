//! One open session against the remote writer.
//!
//! A session is the OPEN-to-CLOSE lifetime of a mirrored file over a single
//! TCP connection. Every operation is a blocking request/reply exchange;
//! exactly one exchange is in flight at a time, enforced by a mutex around
//! the send/receive critical section (WRITE's announcement + payload + second
//! acknowledgement count as one unit). There is no retry: any failure closes
//! the session, because the peer's exchange counter cannot be resynchronized.

use std::io::{Read, Write as _};
use std::net::{Shutdown, TcpStream};
use std::sync::{Mutex, MutexGuard, PoisonError};

use mirrorfd_proto::{
    ABORT_TOKEN, BUFFER_MAX, EOA_SIZE, FILEPATH_MAX, HEADER_SIZE, LOCK_SIZE, MemClass, Op,
    REPLY_SIZE, WRITE_SIZE, decode_reply, encode_header, encode_lock, encode_open, encode_set_eoa,
    encode_write,
};
use tracing::{debug, warn};

use crate::config::WriterConfig;
use crate::error::{Error, Result};
use crate::sequence::{SequenceTracker, derive_token};

/// Connection state guarded by the exchange lock.
#[derive(Debug)]
struct Inner {
    /// Stream to the remote writer.
    stream: TcpStream,
    /// Token and counter for this session.
    tracker: SequenceTracker,
    /// Local shadow of the end-of-address mark; the writer is never asked.
    eoa: u64,
    /// Local shadow of the end-of-file mark.
    eof: u64,
    /// False once closed, by `close` or by a fatal error.
    open: bool,
}

impl Inner {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes)?;
        Ok(())
    }

    /// Blocks for one reply and validates it against `expected_count`.
    fn recv_reply(&mut self, expected_count: u32) -> Result<()> {
        let mut raw = [0u8; REPLY_SIZE];
        self.stream.read_exact(&mut raw)?;
        let reply = decode_reply(&raw)?;
        self.tracker.validate_reply(&reply, expected_count)
    }

    fn exchange(&mut self, request: &[u8], expected_count: u32) -> Result<()> {
        self.send(request)?;
        self.recv_reply(expected_count)
    }

    /// Marks the session dead and drops the connection.
    fn fail(&mut self) {
        self.open = false;
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Runs one exchange, closing the session on any failure.
fn checked_exchange(inner: &mut Inner, request: &[u8], expected_count: u32) -> Result<()> {
    let result = inner.exchange(request, expected_count);
    if result.is_err() {
        inner.fail();
    }
    result
}

/// An open mirrored file.
///
/// Cheap shadow state (end-of-address, end-of-file) is answered locally;
/// everything that touches bytes goes to the remote writer. Methods take
/// `&self` and may be called from multiple threads; exchanges are serialized
/// internally.
#[derive(Debug)]
pub struct MirrorFile {
    inner: Mutex<Inner>,
}

impl MirrorFile {
    /// Connects to the writer and performs the OPEN handshake.
    ///
    /// The OPEN exchange is by definition the first of the session, so it
    /// carries `xmit_count` 0. On any failure the socket is released and no
    /// session object exists.
    pub fn open(config: &WriterConfig, path: &str, flags: u32, maxaddr: u64) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::InvalidPath("empty path"));
        }
        if path.len() >= FILEPATH_MAX {
            return Err(Error::InvalidPath("path exceeds the wire filename slot"));
        }
        if maxaddr == 0 {
            return Err(Error::InvalidMaxAddr(maxaddr));
        }

        let stream = config.connect()?;
        let mut tracker = SequenceTracker::new(derive_token(&stream));
        debug!(
            host = %config.host,
            port = config.port,
            token = tracker.session_token(),
            "connected to mirror writer"
        );

        let header = tracker.next_header(Op::Open);
        let count = header.xmit_count;
        let msg = mirrorfd_proto::Open {
            header,
            flags,
            maxaddr,
            // Informational for the writer: our largest size-type value.
            // A mismatch on the remote side is logged there, never rejected.
            size_hint: usize::MAX as u64,
            filename: path.to_owned(),
        };
        debug!(path, flags, maxaddr, size_hint = msg.size_hint, "open");

        let mut buf = [0u8; BUFFER_MAX];
        let n = encode_open(&mut buf, &msg)?;

        let mut inner = Inner {
            stream,
            tracker,
            eoa: 0,
            eof: 0,
            open: true,
        };
        if let Err(e) = inner.exchange(&buf[..n], count) {
            inner.fail();
            return Err(e);
        }
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    /// Whether the session is still usable.
    pub fn is_open(&self) -> bool {
        self.lock_inner().open
    }

    /// Local end-of-address mark; no network round-trip.
    pub fn eoa(&self) -> u64 {
        self.lock_inner().eoa
    }

    /// Local end-of-file mark; no network round-trip.
    ///
    /// The remote writer is the authority for persisted bytes, not for
    /// address-space bookkeeping, so this stays at its shadow value.
    pub fn eof(&self) -> u64 {
        self.lock_inner().eof
    }

    /// Announces and transmits `data` at `offset`.
    ///
    /// Two exchanges under one lock: the announcement names the offset and
    /// byte count, and only once it is acknowledged OK do the raw payload
    /// bytes follow, acknowledged by a second reply echoing the same count.
    /// A rejected announcement means the payload is never sent.
    pub fn write(&self, class: MemClass, offset: u64, data: &[u8]) -> Result<()> {
        let mut inner = self.lock_inner();
        if !inner.open {
            return Err(Error::NotOpen);
        }

        let header = inner.tracker.next_header(Op::Write);
        let count = header.xmit_count;
        let msg = mirrorfd_proto::Write {
            header,
            class: class.into(),
            offset,
            size: data.len() as u64,
        };
        debug!(class = msg.class, offset, size = msg.size, xmit_count = count, "write");

        let mut buf = [0u8; WRITE_SIZE];
        let n = match encode_write(&mut buf, &msg) {
            Ok(n) => n,
            Err(e) => {
                inner.fail();
                return Err(e.into());
            }
        };
        checked_exchange(&mut inner, &buf[..n], count)?;

        let result = inner.send(data).and_then(|()| inner.recv_reply(count));
        if result.is_err() {
            inner.fail();
        }
        result
    }

    /// Moves the end-of-address mark, remotely and in local shadow state.
    ///
    /// The shadow is updated only after the writer acknowledges.
    pub fn set_eoa(&self, class: MemClass, addr: u64) -> Result<()> {
        let mut inner = self.lock_inner();
        if !inner.open {
            return Err(Error::NotOpen);
        }

        let header = inner.tracker.next_header(Op::SetEoa);
        let count = header.xmit_count;
        let msg = mirrorfd_proto::SetEoa {
            header,
            class: class.into(),
            eoa_addr: addr,
        };
        debug!(class = msg.class, addr, xmit_count = count, "set-eoa");

        let mut buf = [0u8; EOA_SIZE];
        let n = match encode_set_eoa(&mut buf, &msg) {
            Ok(n) => n,
            Err(e) => {
                inner.fail();
                return Err(e.into());
            }
        };
        checked_exchange(&mut inner, &buf[..n], count)?;
        inner.eoa = addr;
        Ok(())
    }

    /// Asks the writer to extend the file out to the end-of-address mark.
    pub fn truncate(&self) -> Result<()> {
        self.header_only_exchange(Op::Truncate)
    }

    /// Takes an advisory lock on the remote file.
    ///
    /// `exclusive` requests a write-intent lock; false requests shared.
    pub fn lock(&self, exclusive: bool) -> Result<()> {
        let mut inner = self.lock_inner();
        if !inner.open {
            return Err(Error::NotOpen);
        }

        let header = inner.tracker.next_header(Op::Lock);
        let count = header.xmit_count;
        let msg = mirrorfd_proto::Lock { header, exclusive };
        debug!(exclusive, xmit_count = count, "lock");

        let mut buf = [0u8; LOCK_SIZE];
        let n = match encode_lock(&mut buf, &msg) {
            Ok(n) => n,
            Err(e) => {
                inner.fail();
                return Err(e.into());
            }
        };
        checked_exchange(&mut inner, &buf[..n], count)
    }

    /// Releases the advisory lock.
    pub fn unlock(&self) -> Result<()> {
        self.header_only_exchange(Op::Unlock)
    }

    /// Always fails: this driver performs no local or remote reads.
    ///
    /// The session is left untouched — no state change, no network traffic.
    pub fn read(&self, _class: MemClass, _offset: u64, _out: &mut [u8]) -> Result<()> {
        Err(Error::Unsupported("read"))
    }

    /// Sends CLOSE, awaits the acknowledgement, and drops the connection.
    ///
    /// The socket is closed whatever the reply says; a failed reply is
    /// returned but cannot keep the connection alive. If the CLOSE header
    /// itself fails to encode, normal framing can no longer be trusted, so
    /// the out-of-band [`ABORT_TOKEN`] is sent instead to force the writer
    /// to halt.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.lock_inner();
        if !inner.open {
            return Err(Error::NotOpen);
        }
        inner.open = false;

        let header = inner.tracker.next_header(Op::Close);
        let count = header.xmit_count;
        let mut buf = [0u8; HEADER_SIZE];
        match encode_header(&mut buf, &header) {
            Ok(n) => {
                debug!(xmit_count = count, "close");
                let result = inner.exchange(&buf[..n], count);
                if let Err(e) = &result {
                    warn!(error = %e, "close exchange failed; dropping connection anyway");
                }
                let _ = inner.stream.shutdown(Shutdown::Both);
                result
            }
            Err(e) => {
                warn!(error = %e, "close header failed to encode; sending abort token");
                if inner.stream.write_all(ABORT_TOKEN).is_ok() {
                    let _ = inner.stream.shutdown(Shutdown::Write);
                }
                let _ = inner.stream.shutdown(Shutdown::Both);
                Err(e.into())
            }
        }
    }

    /// Header-only request (CLOSE is special-cased in [`Self::close`]).
    fn header_only_exchange(&self, op: Op) -> Result<()> {
        let mut inner = self.lock_inner();
        if !inner.open {
            return Err(Error::NotOpen);
        }

        let header = inner.tracker.next_header(op);
        let count = header.xmit_count;
        debug!(?op, xmit_count = count, "exchange");

        let mut buf = [0u8; HEADER_SIZE];
        let n = match encode_header(&mut buf, &header) {
            Ok(n) => n,
            Err(e) => {
                inner.fail();
                return Err(e.into());
            }
        };
        checked_exchange(&mut inner, &buf[..n], count)
    }

    /// A poisoned lock means a panic mid-exchange; the state is still
    /// coherent enough to report `NotOpen`/close, so recover the guard.
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
