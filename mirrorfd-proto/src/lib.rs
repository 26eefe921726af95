//! Wire protocol for the mirror write-only remote file driver.
//!
//! Every message is a fixed-size, fixed-layout byte sequence with all
//! integers in network (big-endian) order and no padding between fields.
//! There is no outer framing: the message type is unambiguous from the
//! preceding exchange, and a WRITE message's `size` field delimits the raw
//! payload that follows it on the stream.
//!
//! This crate is pure: encoding and decoding operate on byte slices only,
//! perform no I/O, and hold no session state.

mod codec;
mod message;

pub use codec::{
    CodecError, decode_header, decode_lock, decode_open, decode_reply, decode_set_eoa,
    decode_write, encode_header, encode_lock, encode_open, encode_reply, encode_set_eoa,
    encode_write,
};
pub use message::{
    ABORT_TOKEN, BUFFER_MAX, EOA_SIZE, FILEPATH_MAX, HEADER_SIZE, Header, LOCK_SIZE, Lock, MAGIC,
    MESSAGE_MAX, MemClass, OPEN_SIZE, Op, Open, REPLY_SIZE, Reply, SetEoa, Status, VERSION,
    WRITE_SIZE, Write,
};
