//! Parser for the `PlaySound` audio asset format (spec §6): a concatenation
//! of framed records, each a big-endian 16-bit `payload_size` header
//! followed by that many bytes of Opus payload, assumed 16 kHz / 60 ms.

use bytes::Bytes;
use thiserror::Error;

const HEADER_LEN: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssetError {
    #[error("truncated frame header at offset {0}")]
    TruncatedHeader(usize),
    #[error("truncated payload at offset {0}: wanted {1} bytes, had {2}")]
    TruncatedPayload(usize, usize, usize),
}

/// Parses every complete frame in `data` in order. A trailing short read —
/// a partial header or payload — is reported but does not invalidate the
/// frames already parsed (playback is best-effort per spec §7).
pub fn parse_frames(data: &[u8]) -> (Vec<Bytes>, Option<AssetError>) {
    let mut frames = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        if data.len() - offset < HEADER_LEN {
            return (frames, Some(AssetError::TruncatedHeader(offset)));
        }
        let size = u16::from_be_bytes([data[offset], data[offset + 1]]) as usize;
        offset += HEADER_LEN;

        if data.len() - offset < size {
            return (
                frames,
                Some(AssetError::TruncatedPayload(offset, size, data.len() - offset)),
            );
        }
        frames.push(Bytes::copy_from_slice(&data[offset..offset + size]));
        offset += size;
    }

    (frames, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(payloads: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for p in payloads {
            out.extend_from_slice(&(p.len() as u16).to_be_bytes());
            out.extend_from_slice(p);
        }
        out
    }

    #[test]
    fn parses_frames_in_order() {
        let data = framed(&[b"abc", b"de", b""]);
        let (frames, err) = parse_frames(&data);
        assert!(err.is_none());
        assert_eq!(frames, vec![Bytes::from_static(b"abc"), Bytes::from_static(b"de"), Bytes::new()]);
    }

    #[test]
    fn empty_input_is_zero_frames() {
        let (frames, err) = parse_frames(&[]);
        assert!(frames.is_empty());
        assert!(err.is_none());
    }

    #[test]
    fn truncated_payload_keeps_earlier_frames() {
        let mut data = framed(&[b"abc"]);
        data.extend_from_slice(&10u16.to_be_bytes());
        data.extend_from_slice(b"short");
        let (frames, err) = parse_frames(&data);
        assert_eq!(frames, vec![Bytes::from_static(b"abc")]);
        assert!(matches!(err, Some(AssetError::TruncatedPayload(_, 10, 5))));
    }

    #[test]
    fn truncated_header_is_reported() {
        let mut data = framed(&[b"ok"]);
        data.push(0);
        let (frames, err) = parse_frames(&data);
        assert_eq!(frames, vec![Bytes::from_static(b"ok")]);
        assert!(matches!(err, Some(AssetError::TruncatedHeader(_))));
    }
}
