//! Message types and wire constants.

/// Protocol identifier stamped into every header.
///
/// ASCII `Mirr`; asymmetric under byte swap, so a peer that decodes with the
/// wrong endianness fails the magic check instead of desynchronizing later.
pub const MAGIC: u32 = 0x4D69_7272;

/// Wire-format version this implementation speaks.
pub const VERSION: u8 = 1;

/// Capacity of the NUL-terminated filename slot in an [`Open`] message.
pub const FILEPATH_MAX: usize = 4097;

/// Capacity of the NUL-terminated error-text slot in a [`Reply`] message.
pub const MESSAGE_MAX: usize = 256;

/// Encoded size of a bare [`Header`] (also CLOSE / TRUNCATE / UNLOCK).
pub const HEADER_SIZE: usize = 14;

/// Encoded size of an [`Open`] message.
pub const OPEN_SIZE: usize = HEADER_SIZE + 4 + 8 + 8 + FILEPATH_MAX;

/// Encoded size of a [`Write`] message (the payload travels separately).
pub const WRITE_SIZE: usize = HEADER_SIZE + 1 + 8 + 8;

/// Encoded size of a [`SetEoa`] message.
pub const EOA_SIZE: usize = HEADER_SIZE + 1 + 8;

/// Encoded size of a [`Lock`] message.
pub const LOCK_SIZE: usize = HEADER_SIZE + 8;

/// Encoded size of a [`Reply`] message.
pub const REPLY_SIZE: usize = HEADER_SIZE + 4 + MESSAGE_MAX;

/// Largest encoded message; a buffer of this size fits any of them.
pub const BUFFER_MAX: usize = OPEN_SIZE;

/// Out-of-band token sent instead of a CLOSE message when the CLOSE itself
/// cannot be encoded, forcing the remote writer to halt.
pub const ABORT_TOKEN: &[u8] = b"GOODBYE";

/// Operation code carried in every header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    /// Establish a session and open the remote file.
    Open = 1,
    /// Close the remote file and end the session.
    Close = 2,
    /// Announce a write; raw payload bytes follow in a second transmission.
    Write = 3,
    /// Extend the remote file to at least the end-of-address mark.
    Truncate = 4,
    /// Acknowledgement sent by the remote writer.
    Reply = 5,
    /// Update the end-of-address high-water mark.
    SetEoa = 6,
    /// Take an advisory lock on the remote file.
    Lock = 7,
    /// Release the advisory lock.
    Unlock = 8,
}

impl From<Op> for u8 {
    fn from(op: Op) -> Self {
        op as Self
    }
}

impl TryFrom<u8> for Op {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, u8> {
        match v {
            1 => Ok(Self::Open),
            2 => Ok(Self::Close),
            3 => Ok(Self::Write),
            4 => Ok(Self::Truncate),
            5 => Ok(Self::Reply),
            6 => Ok(Self::SetEoa),
            7 => Ok(Self::Lock),
            8 => Ok(Self::Unlock),
            other => Err(other),
        }
    }
}

/// Outcome reported in a [`Reply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Status {
    /// The request was carried out.
    Ok = 0,
    /// The request failed; `Reply::message` holds the peer's explanation.
    Error = 1,
}

impl From<Status> for u32 {
    fn from(status: Status) -> Self {
        status as Self
    }
}

impl From<u32> for Status {
    /// Any nonzero status is treated as an error.
    fn from(v: u32) -> Self {
        if v == 0 { Self::Ok } else { Self::Error }
    }
}

/// Storage-class tag for a write or end-of-address target.
///
/// Values mirror the memory-type codes of the host file-format library so
/// they pass through the wire unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MemClass {
    /// Unspecified / default storage.
    Default = 0,
    /// File superblock.
    Superblock = 1,
    /// B-tree node.
    BTree = 2,
    /// Raw dataset bytes.
    RawData = 3,
    /// Global heap.
    GlobalHeap = 4,
    /// Local heap.
    LocalHeap = 5,
    /// Object header.
    ObjectHeader = 6,
}

impl From<MemClass> for u8 {
    fn from(class: MemClass) -> Self {
        class as Self
    }
}

impl TryFrom<u8> for MemClass {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(Self::Default),
            1 => Ok(Self::Superblock),
            2 => Ok(Self::BTree),
            3 => Ok(Self::RawData),
            4 => Ok(Self::GlobalHeap),
            5 => Ok(Self::LocalHeap),
            6 => Ok(Self::ObjectHeader),
            other => Err(other),
        }
    }
}

/// Common prefix of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Protocol identifier; must equal [`MAGIC`].
    pub magic: u32,
    /// Wire-format version; must equal [`VERSION`].
    pub version: u8,
    /// Token fixed at OPEN for the lifetime of the session.
    pub session_token: u32,
    /// Position of this exchange in the session, starting at 0.
    pub xmit_count: u32,
    /// Operation code.
    pub op: Op,
}

impl Header {
    /// Builds a header for the current protocol version.
    pub const fn new(session_token: u32, xmit_count: u32, op: Op) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            session_token,
            xmit_count,
            op,
        }
    }
}

/// OPEN request: establishes the session and names the remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Open {
    /// Common header (`op` must be [`Op::Open`], `xmit_count` must be 0).
    pub header: Header,
    /// Open-mode flag bits mirrored from the local open call.
    pub flags: u32,
    /// Largest addressable offset in the file's address space.
    pub maxaddr: u64,
    /// Largest value representable by the sender's size type.
    ///
    /// Informational only: the remote side may log a mismatch but never
    /// rejects on it.
    pub size_hint: u64,
    /// Path of the file on the remote host.
    ///
    /// Encoded into a [`FILEPATH_MAX`]-byte NUL-terminated slot; anything
    /// past `FILEPATH_MAX - 1` bytes is truncated on encode.
    pub filename: String,
}

/// WRITE request: announces an incoming payload.
///
/// Exactly `size` raw bytes follow on the stream after this message is
/// acknowledged; no other message may be sent in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Write {
    /// Common header (`op` must be [`Op::Write`]).
    pub header: Header,
    /// Storage-class tag ([`MemClass`] value, passed through raw).
    pub class: u8,
    /// File offset of the first payload byte.
    pub offset: u64,
    /// Payload length in bytes.
    pub size: u64,
}

/// SET-EOA request: moves the end-of-address high-water mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetEoa {
    /// Common header (`op` must be [`Op::SetEoa`]).
    pub header: Header,
    /// Storage-class tag ([`MemClass`] value, passed through raw).
    pub class: u8,
    /// New end-of-address mark.
    pub eoa_addr: u64,
}

/// LOCK request: takes an advisory lock on the remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lock {
    /// Common header (`op` must be [`Op::Lock`]).
    pub header: Header,
    /// True for an exclusive (write-intent) lock, false for shared.
    ///
    /// Occupies a full 64-bit slot on the wire.
    pub exclusive: bool,
}

/// REPLY: the writer's acknowledgement of the previous request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Common header (`op` must be [`Op::Reply`]); echoes the session token
    /// and `xmit_count` of the request being answered.
    pub header: Header,
    /// Outcome of the request.
    pub status: Status,
    /// Human-readable failure text, empty on [`Status::Ok`].
    ///
    /// Encoded into a [`MESSAGE_MAX`]-byte NUL-terminated slot.
    pub message: String,
}
