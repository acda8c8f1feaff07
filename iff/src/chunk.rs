use crate::{error::DecodeError, stream::ByteStream, writer::ByteWriter};

/// High bit of the size field. Selects dword padding instead of word padding.
pub const ALIGN_DWORD: u32 = 0x8000_0000;
pub const HEADER_SIZE: usize = 8;

/// Packs four ASCII characters into a little endian chunk tag.
pub const fn fourcc(tag: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*tag)
}

pub const PERS: u32 = fourcc(b"PERS");
pub const RIFF: u32 = fourcc(b"RIFF");

pub fn tag_name(tag: u32) -> String {
    tag.to_le_bytes()
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub tag: u32,
    pub raw_size: u32,
}

impl ChunkHeader {
    pub fn read(stream: &mut ByteStream) -> Result<Self, DecodeError> {
        let tag = stream.read_u32()?;
        let raw_size = stream.read_u32()?;

        Ok(Self { tag, raw_size })
    }

    /// Reads a header and fails unless it carries `tag`.
    pub fn expect(stream: &mut ByteStream, tag: u32) -> Result<Self, DecodeError> {
        let header = Self::read(stream)?;

        if header.tag != tag {
            return Err(DecodeError::MalformedChunk {
                expected: tag,
                found: header.tag,
            });
        }

        Ok(header)
    }

    pub fn peek(stream: &ByteStream) -> Result<Self, DecodeError> {
        Self::read(&mut stream.clone())
    }

    pub fn is_dword_aligned(&self) -> bool {
        self.raw_size & ALIGN_DWORD != 0
    }

    pub fn padded_size(&self) -> u32 {
        if self.is_dword_aligned() {
            ((self.raw_size & !ALIGN_DWORD) + 3) & !3
        } else {
            (self.raw_size + 1) & !1
        }
    }

    /// Skips whatever is left of a chunk whose header started at `start`.
    pub fn seek_to_end(&self, start: usize, stream: &mut ByteStream) {
        stream.seek_clamped(start + self.padded_size() as usize + HEADER_SIZE);
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        writer.append_u32(self.tag);
        writer.append_u32(self.raw_size);
    }
}
