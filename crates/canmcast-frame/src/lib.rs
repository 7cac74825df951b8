//! Fixed-size CAN frame wire codec.
//!
//! Every frame crossing the gateway — on the bus socket and inside UDP
//! datagrams — uses the same 16-byte layout, which is also the in-memory
//! layout of a Linux `can_frame`:
//! - A 4-byte arbitration identifier (native byte order)
//! - A 1-byte data length code (0–8)
//! - 3 reserved bytes, written zero
//! - 8 data bytes, zero-padded beyond the length code
//!
//! The gateway forwards raw wire bytes; decoding exists for validation and
//! diagnostics.

pub mod codec;
pub mod error;

pub use codec::{decode_frame, encode_frame, CanFrame, FRAME_SIZE, MAX_DATA_LEN};
pub use error::{FrameError, Result};
