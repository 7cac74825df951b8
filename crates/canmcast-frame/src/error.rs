/// Errors that can occur while building or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The supplied data does not fit a classic CAN frame.
    #[error("frame data too long ({len} bytes, max {max})")]
    DataTooLong { len: usize, max: usize },

    /// The wire buffer is not exactly one frame.
    #[error("wire frame must be exactly 16 bytes, got {len}")]
    WireSize { len: usize },

    /// The length code on the wire exceeds the 8-byte payload.
    #[error("length code out of range ({dlc}, max 8)")]
    DlcOutOfRange { dlc: u8 },
}

pub type Result<T> = std::result::Result<T, FrameError>;
