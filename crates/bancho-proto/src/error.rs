use thiserror::Error;

/// Decoding/encoding failures for the packet wire format.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame header truncated")]
    TruncatedHeader,
    #[error("frame payload truncated")]
    TruncatedPayload,
    #[error("unexpected end of payload while reading a field")]
    UnexpectedEof,
    #[error("string present-flag byte {0:#04x} is neither 0x00 nor 0x0b")]
    BadStringFlag(u8),
    #[error("string bytes are not valid utf-8")]
    InvalidUtf8,
    #[error("ULEB128 varint overflowed 32 bits")]
    VarintOverflow,
}
