//! Binary packet codec for the bancho wire protocol.
//!
//! Every packet on the wire is a 7-byte header (packet id u16 LE, a pad
//! byte, payload length u32 LE) followed by `length` bytes of payload.
//! Payload fields are drawn from a small set of primitive types (see
//! [`Reader`]/[`Writer`]). Concatenating encoded frames produces another
//! valid wire stream: frames are self-delimiting.

mod error;
pub mod packets;
mod primitives;
mod reader;
mod writer;

pub use error::CodecError;
pub use reader::Reader;
pub use writer::Writer;

/// Header size in bytes: u16 id + u8 pad + u32 length.
pub const HEADER_LEN: usize = 7;

/// One decoded frame: packet id plus its raw payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: u16,
    pub payload: Vec<u8>,
}

/// Splits `buf` into successive frames. Total over well-formed input: a
/// truncated trailing frame (fewer than `HEADER_LEN` bytes, or a declared
/// payload length longer than what remains) is reported as an error rather
/// than silently dropped, so callers can reject the whole request.
pub fn split_frames(buf: &[u8]) -> Result<Vec<Frame>, CodecError> {
    let mut frames = Vec::new();
    let mut offset = 0usize;
    while offset < buf.len() {
        if buf.len() - offset < HEADER_LEN {
            return Err(CodecError::TruncatedHeader);
        }
        let id = u16::from_le_bytes([buf[offset], buf[offset + 1]]);
        // buf[offset + 2] is the pad byte, always zero on the wire.
        let len = u32::from_le_bytes([
            buf[offset + 3],
            buf[offset + 4],
            buf[offset + 5],
            buf[offset + 6],
        ]) as usize;
        let payload_start = offset + HEADER_LEN;
        let payload_end = payload_start
            .checked_add(len)
            .ok_or(CodecError::TruncatedPayload)?;
        if payload_end > buf.len() {
            return Err(CodecError::TruncatedPayload);
        }
        frames.push(Frame {
            id,
            payload: buf[payload_start..payload_end].to_vec(),
        });
        offset = payload_end;
    }
    Ok(frames)
}

/// Frames `payload` under `id` into a self-contained wire packet.
pub fn frame(id: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&id.to_le_bytes());
    out.push(0);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_frames_handles_concatenated_stream() {
        let a = frame(5, b"hello");
        let b = frame(7, b"");
        let mut stream = a.clone();
        stream.extend_from_slice(&b);

        let frames = split_frames(&stream).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], Frame { id: 5, payload: b"hello".to_vec() });
        assert_eq!(frames[1], Frame { id: 7, payload: vec![] });
    }

    #[test]
    fn split_frames_rejects_truncated_payload() {
        let mut stream = frame(1, b"0123456789");
        stream.truncate(stream.len() - 3);
        assert!(matches!(split_frames(&stream), Err(CodecError::TruncatedPayload)));
    }

    #[test]
    fn split_frames_rejects_truncated_header() {
        let stream = vec![1, 0, 0, 0, 0];
        assert!(matches!(split_frames(&stream), Err(CodecError::TruncatedHeader)));
    }

    #[test]
    fn empty_stream_has_no_frames() {
        assert_eq!(split_frames(&[]).unwrap(), vec![]);
    }
}
