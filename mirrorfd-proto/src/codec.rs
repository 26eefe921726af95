//! Fixed-layout encode/decode for every message type.
//!
//! Encoders write fields in declaration order, big-endian, no padding, into a
//! caller-supplied buffer and return the number of bytes written. Decoders
//! read in the same order and fail on short buffers or an unrecognized
//! magic/version. Neither side allocates except for decoded string fields.

use crate::message::{
    EOA_SIZE, FILEPATH_MAX, HEADER_SIZE, Header, LOCK_SIZE, Lock, MAGIC, MESSAGE_MAX, OPEN_SIZE,
    Op, Open, REPLY_SIZE, Reply, SetEoa, Status, VERSION, WRITE_SIZE, Write,
};

/// Errors raised while encoding or decoding a message buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The buffer is shorter than the message's fixed size.
    #[error("buffer too short: need {need} bytes, have {have}")]
    Truncated {
        /// Bytes required by the fixed layout.
        need: usize,
        /// Bytes actually available.
        have: usize,
    },

    /// The header's magic field does not identify this protocol.
    #[error("bad magic {0:#010x}, expected {MAGIC:#010x}")]
    BadMagic(u32),

    /// The header names a wire-format version this implementation
    /// does not speak.
    #[error("unsupported protocol version {0}, expected {VERSION}")]
    BadVersion(u8),

    /// The header's op field holds no known operation code.
    #[error("unknown op code {0}")]
    BadOp(u8),

    /// The message decoded cleanly but carries the wrong operation code
    /// for the expected message type.
    #[error("unexpected op {found:?}, expected {expected:?}")]
    UnexpectedOp {
        /// Operation the caller was decoding.
        expected: Op,
        /// Operation found in the header.
        found: Op,
    },
}

/// Forward-only writer over a byte slice.
struct Cursor<'a> {
    buf: &'a mut [u8],
    at: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a mut [u8], need: usize) -> Result<Self, CodecError> {
        if buf.len() < need {
            return Err(CodecError::Truncated {
                need,
                have: buf.len(),
            });
        }
        Ok(Self { buf, at: 0 })
    }

    fn put(&mut self, bytes: &[u8]) {
        let end = self.at + bytes.len();
        self.buf[self.at..end].copy_from_slice(bytes);
        self.at = end;
    }

    fn put_u8(&mut self, v: u8) {
        self.put(&[v]);
    }

    fn put_u32(&mut self, v: u32) {
        self.put(&v.to_be_bytes());
    }

    fn put_u64(&mut self, v: u64) {
        self.put(&v.to_be_bytes());
    }

    /// Writes `s` into a fixed `cap`-byte slot: at most `cap - 1` bytes of
    /// string, the remainder zero-filled, so a terminator is always present.
    fn put_str(&mut self, s: &str, cap: usize) {
        let end = self.at + cap;
        self.buf[self.at..end].fill(0);
        let bytes = s.as_bytes();
        let n = bytes.len().min(cap - 1);
        self.buf[self.at..self.at + n].copy_from_slice(&bytes[..n]);
        self.at = end;
    }
}

/// Forward-only reader over a byte slice.
struct Scanner<'a> {
    buf: &'a [u8],
    at: usize,
}

impl<'a> Scanner<'a> {
    fn new(buf: &'a [u8], need: usize) -> Result<Self, CodecError> {
        if buf.len() < need {
            return Err(CodecError::Truncated {
                need,
                have: buf.len(),
            });
        }
        Ok(Self { buf, at: 0 })
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.at..self.at + N]);
        self.at += N;
        out
    }

    fn take_u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn take_u32(&mut self) -> u32 {
        u32::from_be_bytes(self.take())
    }

    fn take_u64(&mut self) -> u64 {
        u64::from_be_bytes(self.take())
    }

    /// Reads a fixed `cap`-byte string slot.
    ///
    /// Stops at the first NUL; if a misbehaving peer sent no terminator the
    /// text is cut at `cap - 1` bytes rather than read past the slot.
    fn take_str(&mut self, cap: usize) -> String {
        let slot = &self.buf[self.at..self.at + cap];
        self.at += cap;
        let end = slot
            .iter()
            .take(cap - 1)
            .position(|&b| b == 0)
            .unwrap_or(cap - 1);
        String::from_utf8_lossy(&slot[..end]).into_owned()
    }
}

fn put_header(c: &mut Cursor<'_>, h: &Header) {
    c.put_u32(h.magic);
    c.put_u8(h.version);
    c.put_u32(h.session_token);
    c.put_u32(h.xmit_count);
    c.put_u8(h.op.into());
}

fn take_header(s: &mut Scanner<'_>) -> Result<Header, CodecError> {
    let magic = s.take_u32();
    if magic != MAGIC {
        return Err(CodecError::BadMagic(magic));
    }
    let version = s.take_u8();
    if version != VERSION {
        return Err(CodecError::BadVersion(version));
    }
    let session_token = s.take_u32();
    let xmit_count = s.take_u32();
    let op = Op::try_from(s.take_u8()).map_err(CodecError::BadOp)?;
    Ok(Header {
        magic,
        version,
        session_token,
        xmit_count,
        op,
    })
}

fn expect_op(header: &Header, expected: Op) -> Result<(), CodecError> {
    if header.op == expected {
        Ok(())
    } else {
        Err(CodecError::UnexpectedOp {
            expected,
            found: header.op,
        })
    }
}

/// Encodes a bare header (CLOSE, TRUNCATE, and UNLOCK are header-only).
pub fn encode_header(buf: &mut [u8], header: &Header) -> Result<usize, CodecError> {
    let mut c = Cursor::new(buf, HEADER_SIZE)?;
    put_header(&mut c, header);
    Ok(HEADER_SIZE)
}

/// Decodes a bare header, validating magic and version.
pub fn decode_header(buf: &[u8]) -> Result<Header, CodecError> {
    let mut s = Scanner::new(buf, HEADER_SIZE)?;
    take_header(&mut s)
}

/// Encodes an OPEN message ([`OPEN_SIZE`] bytes).
pub fn encode_open(buf: &mut [u8], msg: &Open) -> Result<usize, CodecError> {
    let mut c = Cursor::new(buf, OPEN_SIZE)?;
    put_header(&mut c, &msg.header);
    c.put_u32(msg.flags);
    c.put_u64(msg.maxaddr);
    c.put_u64(msg.size_hint);
    c.put_str(&msg.filename, FILEPATH_MAX);
    Ok(OPEN_SIZE)
}

/// Decodes an OPEN message.
pub fn decode_open(buf: &[u8]) -> Result<Open, CodecError> {
    let mut s = Scanner::new(buf, OPEN_SIZE)?;
    let header = take_header(&mut s)?;
    expect_op(&header, Op::Open)?;
    Ok(Open {
        header,
        flags: s.take_u32(),
        maxaddr: s.take_u64(),
        size_hint: s.take_u64(),
        filename: s.take_str(FILEPATH_MAX),
    })
}

/// Encodes a WRITE announcement ([`WRITE_SIZE`] bytes, payload not included).
pub fn encode_write(buf: &mut [u8], msg: &Write) -> Result<usize, CodecError> {
    let mut c = Cursor::new(buf, WRITE_SIZE)?;
    put_header(&mut c, &msg.header);
    c.put_u8(msg.class);
    c.put_u64(msg.offset);
    c.put_u64(msg.size);
    Ok(WRITE_SIZE)
}

/// Decodes a WRITE announcement.
///
/// The announced `size` only tells the caller how many raw payload bytes to
/// read next; nothing beyond [`WRITE_SIZE`] bytes is consumed here.
pub fn decode_write(buf: &[u8]) -> Result<Write, CodecError> {
    let mut s = Scanner::new(buf, WRITE_SIZE)?;
    let header = take_header(&mut s)?;
    expect_op(&header, Op::Write)?;
    Ok(Write {
        header,
        class: s.take_u8(),
        offset: s.take_u64(),
        size: s.take_u64(),
    })
}

/// Encodes a SET-EOA message ([`EOA_SIZE`] bytes).
pub fn encode_set_eoa(buf: &mut [u8], msg: &SetEoa) -> Result<usize, CodecError> {
    let mut c = Cursor::new(buf, EOA_SIZE)?;
    put_header(&mut c, &msg.header);
    c.put_u8(msg.class);
    c.put_u64(msg.eoa_addr);
    Ok(EOA_SIZE)
}

/// Decodes a SET-EOA message.
pub fn decode_set_eoa(buf: &[u8]) -> Result<SetEoa, CodecError> {
    let mut s = Scanner::new(buf, EOA_SIZE)?;
    let header = take_header(&mut s)?;
    expect_op(&header, Op::SetEoa)?;
    Ok(SetEoa {
        header,
        class: s.take_u8(),
        eoa_addr: s.take_u64(),
    })
}

/// Encodes a LOCK message ([`LOCK_SIZE`] bytes).
pub fn encode_lock(buf: &mut [u8], msg: &Lock) -> Result<usize, CodecError> {
    let mut c = Cursor::new(buf, LOCK_SIZE)?;
    put_header(&mut c, &msg.header);
    c.put_u64(u64::from(msg.exclusive));
    Ok(LOCK_SIZE)
}

/// Decodes a LOCK message; any nonzero `rw` slot reads as exclusive.
pub fn decode_lock(buf: &[u8]) -> Result<Lock, CodecError> {
    let mut s = Scanner::new(buf, LOCK_SIZE)?;
    let header = take_header(&mut s)?;
    expect_op(&header, Op::Lock)?;
    Ok(Lock {
        header,
        exclusive: s.take_u64() != 0,
    })
}

/// Encodes a REPLY message ([`REPLY_SIZE`] bytes).
pub fn encode_reply(buf: &mut [u8], msg: &Reply) -> Result<usize, CodecError> {
    let mut c = Cursor::new(buf, REPLY_SIZE)?;
    put_header(&mut c, &msg.header);
    c.put_u32(msg.status.into());
    c.put_str(&msg.message, MESSAGE_MAX);
    Ok(REPLY_SIZE)
}

/// Decodes a REPLY message.
pub fn decode_reply(buf: &[u8]) -> Result<Reply, CodecError> {
    let mut s = Scanner::new(buf, REPLY_SIZE)?;
    let header = take_header(&mut s)?;
    expect_op(&header, Op::Reply)?;
    Ok(Reply {
        header,
        status: Status::from(s.take_u32()),
        message: s.take_str(MESSAGE_MAX),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::BUFFER_MAX;

    fn header(op: Op) -> Header {
        Header::new(0xDEAD_BEEF, 7, op)
    }

    #[test]
    fn header_roundtrip() {
        let h = header(Op::Truncate);
        let mut buf = [0u8; HEADER_SIZE];
        assert_eq!(encode_header(&mut buf, &h).unwrap(), HEADER_SIZE);
        assert_eq!(decode_header(&buf).unwrap(), h);
    }

    #[test]
    fn header_layout_is_fixed() {
        let h = Header::new(0x0102_0304, 0x0A0B_0C0D, Op::Open);
        let mut buf = [0u8; HEADER_SIZE];
        encode_header(&mut buf, &h).unwrap();
        // magic:4 version:1 token:4 count:4 op:1, big-endian.
        assert_eq!(&buf[0..4], &MAGIC.to_be_bytes());
        assert_eq!(buf[4], VERSION);
        assert_eq!(&buf[5..9], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&buf[9..13], &[0x0A, 0x0B, 0x0C, 0x0D]);
        assert_eq!(buf[13], 1);
    }

    #[test]
    fn open_roundtrip() {
        let msg = Open {
            header: header(Op::Open),
            flags: 0x13,
            maxaddr: 0xFFFF_FFFF,
            size_hint: u64::MAX,
            filename: "/data/out.h5".to_owned(),
        };
        let mut buf = [0u8; BUFFER_MAX];
        assert_eq!(encode_open(&mut buf, &msg).unwrap(), OPEN_SIZE);
        assert_eq!(decode_open(&buf).unwrap(), msg);
    }

    #[test]
    fn open_filename_at_capacity_roundtrips() {
        let msg = Open {
            header: header(Op::Open),
            flags: 0,
            maxaddr: 1,
            size_hint: u64::MAX,
            filename: "f".repeat(FILEPATH_MAX - 1),
        };
        let mut buf = [0u8; BUFFER_MAX];
        encode_open(&mut buf, &msg).unwrap();
        let decoded = decode_open(&buf).unwrap();
        assert_eq!(decoded.filename.len(), FILEPATH_MAX - 1);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn open_filename_overflow_is_truncated() {
        let msg = Open {
            header: header(Op::Open),
            flags: 0,
            maxaddr: 1,
            size_hint: u64::MAX,
            filename: "x".repeat(FILEPATH_MAX + 100),
        };
        let mut buf = [0u8; BUFFER_MAX];
        // Still exactly OPEN_SIZE: fixed slots never grow the buffer.
        assert_eq!(encode_open(&mut buf, &msg).unwrap(), OPEN_SIZE);
        // Final slot byte is the forced terminator.
        assert_eq!(buf[OPEN_SIZE - 1], 0);
        let decoded = decode_open(&buf).unwrap();
        assert_eq!(decoded.filename.len(), FILEPATH_MAX - 1);
    }

    #[test]
    fn write_roundtrip() {
        let msg = Write {
            header: header(Op::Write),
            class: 3,
            offset: 512,
            size: 128,
        };
        let mut buf = [0u8; WRITE_SIZE];
        assert_eq!(encode_write(&mut buf, &msg).unwrap(), WRITE_SIZE);
        assert_eq!(decode_write(&buf).unwrap(), msg);
    }

    #[test]
    fn set_eoa_roundtrip() {
        let msg = SetEoa {
            header: header(Op::SetEoa),
            class: 1,
            eoa_addr: u64::MAX - 1,
        };
        let mut buf = [0u8; EOA_SIZE];
        assert_eq!(encode_set_eoa(&mut buf, &msg).unwrap(), EOA_SIZE);
        assert_eq!(decode_set_eoa(&buf).unwrap(), msg);
    }

    #[test]
    fn lock_roundtrip_both_modes() {
        for exclusive in [true, false] {
            let msg = Lock {
                header: header(Op::Lock),
                exclusive,
            };
            let mut buf = [0u8; LOCK_SIZE];
            assert_eq!(encode_lock(&mut buf, &msg).unwrap(), LOCK_SIZE);
            assert_eq!(decode_lock(&buf).unwrap(), msg);
        }
    }

    #[test]
    fn reply_roundtrip() {
        let msg = Reply {
            header: header(Op::Reply),
            status: Status::Error,
            message: "disk full".to_owned(),
        };
        let mut buf = [0u8; REPLY_SIZE];
        assert_eq!(encode_reply(&mut buf, &msg).unwrap(), REPLY_SIZE);
        assert_eq!(decode_reply(&buf).unwrap(), msg);
    }

    #[test]
    fn reply_message_at_capacity_roundtrips() {
        let msg = Reply {
            header: header(Op::Reply),
            status: Status::Error,
            message: "e".repeat(MESSAGE_MAX - 1),
        };
        let mut buf = [0u8; REPLY_SIZE];
        encode_reply(&mut buf, &msg).unwrap();
        assert_eq!(decode_reply(&buf).unwrap(), msg);
    }

    #[test]
    fn unterminated_reply_text_is_cut_at_capacity() {
        // A misbehaving peer fills the whole slot with no NUL.
        let mut buf = [0u8; REPLY_SIZE];
        encode_header(&mut buf, &header(Op::Reply)).unwrap();
        buf[HEADER_SIZE..HEADER_SIZE + 4].copy_from_slice(&1u32.to_be_bytes());
        for b in &mut buf[HEADER_SIZE + 4..] {
            *b = b'A';
        }
        let decoded = decode_reply(&buf).unwrap();
        assert_eq!(decoded.message.len(), MESSAGE_MAX - 1);
    }

    #[test]
    fn encoding_is_deterministic() {
        let msg = Open {
            header: header(Op::Open),
            flags: 0x13,
            maxaddr: 0xFFFF_FFFF,
            size_hint: u64::MAX,
            filename: "/data/out.h5".to_owned(),
        };
        let mut a = [0u8; BUFFER_MAX];
        let mut b = [0xFFu8; BUFFER_MAX];
        encode_open(&mut a, &msg).unwrap();
        encode_open(&mut b, &msg).unwrap();
        assert_eq!(a[..OPEN_SIZE], b[..OPEN_SIZE]);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let mut small = [0u8; HEADER_SIZE - 1];
        assert_eq!(
            encode_header(&mut small, &header(Op::Close)),
            Err(CodecError::Truncated {
                need: HEADER_SIZE,
                have: HEADER_SIZE - 1,
            })
        );
        assert!(matches!(
            decode_reply(&[0u8; REPLY_SIZE - 1]),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut buf = [0u8; HEADER_SIZE];
        encode_header(&mut buf, &header(Op::Close)).unwrap();
        buf[0] ^= 0xFF;
        assert!(matches!(decode_header(&buf), Err(CodecError::BadMagic(_))));
    }

    #[test]
    fn bad_version_is_rejected() {
        let mut buf = [0u8; HEADER_SIZE];
        encode_header(&mut buf, &header(Op::Close)).unwrap();
        buf[4] = VERSION + 1;
        assert_eq!(
            decode_header(&buf),
            Err(CodecError::BadVersion(VERSION + 1))
        );
    }

    #[test]
    fn unknown_op_code_is_rejected() {
        let mut buf = [0u8; HEADER_SIZE];
        encode_header(&mut buf, &header(Op::Close)).unwrap();
        buf[HEADER_SIZE - 1] = 0xEE;
        assert_eq!(decode_header(&buf), Err(CodecError::BadOp(0xEE)));
    }

    #[test]
    fn wrong_op_for_message_type_is_rejected() {
        let msg = SetEoa {
            header: header(Op::SetEoa),
            class: 0,
            eoa_addr: 42,
        };
        let mut buf = [0u8; EOA_SIZE];
        encode_set_eoa(&mut buf, &msg).unwrap();
        assert_eq!(
            decode_lock(&buf),
            Err(CodecError::UnexpectedOp {
                expected: Op::Lock,
                found: Op::SetEoa,
            })
        );
    }

    #[test]
    fn size_table_matches_wire_spec() {
        assert_eq!(HEADER_SIZE, 14);
        assert_eq!(OPEN_SIZE, 14 + 20 + 4097);
        assert_eq!(WRITE_SIZE, 14 + 17);
        assert_eq!(EOA_SIZE, 14 + 9);
        assert_eq!(LOCK_SIZE, 14 + 8);
        assert_eq!(REPLY_SIZE, 14 + 4 + 256);
    }
}
