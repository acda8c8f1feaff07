use glam::Vec3;

use crate::chunk::PERS;

/// Growable little endian buffer. Builds chunked blobs in the layout the
/// decoders read.
#[derive(Debug, Default)]
pub struct ByteWriter {
    pub data: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_offset(&self) -> usize {
        self.data.len()
    }

    pub fn append_u8(&mut self, i: u8) {
        self.data.push(i);
    }

    pub fn append_i8(&mut self, i: i8) {
        self.data.extend(i.to_le_bytes());
    }

    pub fn append_u16(&mut self, i: u16) {
        self.data.extend(i.to_le_bytes());
    }

    pub fn append_i16(&mut self, i: i16) {
        self.data.extend(i.to_le_bytes());
    }

    pub fn append_u32(&mut self, i: u32) {
        self.data.extend(i.to_le_bytes());
    }

    pub fn append_i32(&mut self, i: i32) {
        self.data.extend(i.to_le_bytes());
    }

    pub fn append_f32(&mut self, i: f32) {
        self.data.extend(i.to_le_bytes());
    }

    pub fn append_vec3(&mut self, v: Vec3) {
        v.to_array().into_iter().for_each(|f| self.append_f32(f));
    }

    pub fn append_u8_slice(&mut self, i: &[u8]) {
        self.data.extend_from_slice(i);
    }

    pub fn append_zeros(&mut self, n: usize) {
        self.data.resize(self.data.len() + n, 0);
    }

    /// Writes `s` into a NUL padded field of `width` bytes, truncating if needed.
    pub fn append_fixed_string(&mut self, s: &str, width: usize) {
        let bytes = s.as_bytes();
        let len = bytes.len().min(width);

        self.append_u8_slice(&bytes[..len]);
        self.append_zeros(width - len);
    }

    /// `u16` length followed by the bytes, padded to an even count.
    pub fn append_sstring(&mut self, s: &str) {
        self.append_u16(s.len() as u16);
        self.append_u8_slice(s.as_bytes());

        if s.len() % 2 == 1 {
            self.append_u8(0);
        }
    }

    pub fn replace_with_u32(&mut self, start: usize, val: u32) {
        self.data[start..start + 4].copy_from_slice(&val.to_le_bytes());
    }

    /// Opens a chunk with a placeholder size. Returns the header offset for [`Self::end_chunk`].
    pub fn begin_chunk(&mut self, tag: u32) -> usize {
        let start = self.get_offset();

        self.append_u32(tag);
        self.append_u32(0);

        start
    }

    /// Patches the raw size of the chunk opened at `start` and pads the payload to an even length.
    pub fn end_chunk(&mut self, start: usize) {
        let raw_size = self.get_offset() - start - 8;

        self.replace_with_u32(start + 4, raw_size as u32);

        if raw_size % 2 == 1 {
            self.append_u8(0);
        }
    }

    /// Opens a `PERS` object chunk for `class` at `version`.
    pub fn begin_persistent(&mut self, class: &str, version: u32) -> usize {
        let start = self.begin_chunk(PERS);

        self.append_sstring(class);
        self.append_u32(version);

        start
    }
}
