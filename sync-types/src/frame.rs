//! Frame - the wire unit exchanged with the sync server.
//!
//! One transport message carries exactly one frame:
//!
//! ```text
//! Frame := tag:u8 || payload:bytes
//! ```
//!
//! There is no length prefix; the transport's own message framing delimits
//! frames. The tag is kept as a raw byte after decoding so that frames from
//! a newer protocol revision survive the codec and can be skipped by the
//! receiver instead of failing the connection.

use crate::SyncError;

/// Frame kind discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameTag {
    /// One serialized incremental change
    Change = 1,
    /// The server has delivered all changes it had buffered at connect time
    ChangeBacklogComplete = 2,
    /// A full serialized document snapshot
    FullDoc = 3,
}

impl FrameTag {
    /// Human-readable name, used in logs.
    pub fn name(self) -> &'static str {
        match self {
            FrameTag::Change => "Change",
            FrameTag::ChangeBacklogComplete => "ChangeBacklogComplete",
            FrameTag::FullDoc => "FullDoc",
        }
    }
}

impl TryFrom<u8> for FrameTag {
    type Error = SyncError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FrameTag::Change),
            2 => Ok(FrameTag::ChangeBacklogComplete),
            3 => Ok(FrameTag::FullDoc),
            _ => Err(SyncError::UnknownTag(value)),
        }
    }
}

/// A decoded wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw tag byte (may be outside the known [`FrameTag`] set)
    pub tag: u8,
    /// Payload bytes, unmodified
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame of a known kind.
    pub fn new(tag: FrameTag, payload: Vec<u8>) -> Self {
        Self {
            tag: tag as u8,
            payload,
        }
    }

    /// A `Change` frame carrying one serialized change.
    pub fn change(change: Vec<u8>) -> Self {
        Self::new(FrameTag::Change, change)
    }

    /// An empty `ChangeBacklogComplete` frame.
    pub fn backlog_complete() -> Self {
        Self::new(FrameTag::ChangeBacklogComplete, Vec::new())
    }

    /// A `FullDoc` frame carrying a serialized snapshot.
    pub fn full_doc(snapshot: Vec<u8>) -> Self {
        Self::new(FrameTag::FullDoc, snapshot)
    }

    /// Get the frame kind, or `UnknownTag` for unrecognized tags.
    pub fn kind(&self) -> Result<FrameTag, SyncError> {
        FrameTag::try_from(self.tag)
    }

    /// Serialize to wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.payload.len());
        bytes.push(self.tag);
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Parse wire bytes. Any tag byte is accepted.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        let (&tag, payload) = bytes.split_first().ok_or(SyncError::EmptyFrame)?;
        Ok(Self {
            tag,
            payload: payload.to_vec(),
        })
    }
}

/// Encode a frame: the tag byte followed by the payload.
pub fn encode(tag: FrameTag, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(1 + payload.len());
    bytes.push(tag as u8);
    bytes.extend_from_slice(payload);
    bytes
}

/// Decode wire bytes into a frame.
pub fn decode(bytes: &[u8]) -> Result<Frame, SyncError> {
    Frame::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_puts_tag_first() {
        let bytes = encode(FrameTag::Change, b"abc");
        assert_eq!(bytes, vec![1, b'a', b'b', b'c']);
    }

    #[test]
    fn backlog_complete_is_single_byte() {
        assert_eq!(Frame::backlog_complete().to_bytes(), vec![2]);
    }

    #[test]
    fn roundtrip_all_tags_and_payload_sizes() {
        let large: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
        let payloads: [&[u8]; 3] = [&[], b"hi", &large];

        for tag in [
            FrameTag::Change,
            FrameTag::ChangeBacklogComplete,
            FrameTag::FullDoc,
        ] {
            for payload in payloads {
                let frame = decode(&encode(tag, payload)).unwrap();
                assert_eq!(frame.kind().unwrap(), tag);
                assert_eq!(frame.payload, payload);
            }
        }
    }

    #[test]
    fn payload_is_not_modified() {
        // Payload bytes that look like tags must pass through untouched
        let payload = vec![1, 2, 3, 0, 255];
        let frame = Frame::full_doc(payload.clone());
        let restored = Frame::from_bytes(&frame.to_bytes()).unwrap();
        assert_eq!(restored.payload, payload);
    }

    #[test]
    fn unknown_tag_decodes_but_has_no_kind() {
        let frame = decode(&[99, 7, 7, 7]).unwrap();
        assert_eq!(frame.tag, 99);
        assert_eq!(frame.payload, vec![7, 7, 7]);
        assert!(matches!(frame.kind(), Err(SyncError::UnknownTag(99))));
    }

    #[test]
    fn empty_message_is_rejected() {
        assert!(matches!(decode(&[]), Err(SyncError::EmptyFrame)));
    }

    #[test]
    fn tag_conversion() {
        for val in 1..=3u8 {
            let tag = FrameTag::try_from(val).unwrap();
            assert_eq!(tag as u8, val);
        }
        assert!(FrameTag::try_from(0).is_err());
        assert!(FrameTag::try_from(4).is_err());
        assert_eq!(FrameTag::FullDoc.name(), "FullDoc");
    }
}
