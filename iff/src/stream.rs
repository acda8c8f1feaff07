use glam::{Vec2, Vec3};
use nom::{
    Parser,
    bytes::complete::take,
    multi::count,
    number::complete::{le_f32, le_i8, le_i16, le_i32, le_u8, le_u16, le_u32},
};

use crate::{
    error::DecodeError,
    nom_helpers::{NomError, fixed_string, sstring, vec2, vec3},
};

/// Little endian cursor over a fully buffered object.
///
/// Every read either consumes exactly what it returns or fails with
/// [`DecodeError::TruncatedStream`] and leaves the cursor untouched.
#[derive(Debug, Clone)]
pub struct ByteStream<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.data.len()
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    pub fn set_position(&mut self, position: usize) -> Result<(), DecodeError> {
        if position > self.data.len() {
            return Err(DecodeError::TruncatedStream { position });
        }

        self.position = position;
        Ok(())
    }

    /// Moves to `position`, stopping at the end of the buffer.
    pub fn seek_clamped(&mut self, position: usize) {
        self.position = position.min(self.data.len());
    }

    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.read_bytes(n).map(|_| ())
    }

    /// Runs a nom parser over the unread bytes and advances past what it consumed.
    pub fn parse<O, P>(&mut self, mut parser: P) -> Result<O, DecodeError>
    where
        P: Parser<&'a [u8], Output = O, Error = NomError<'a>>,
    {
        let input = self.remaining();

        match parser.parse(input) {
            Ok((rest, res)) => {
                self.position += input.len() - rest.len();
                Ok(res)
            }
            Err(_) => Err(DecodeError::TruncatedStream {
                position: self.position,
            }),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.parse(le_u8)
    }

    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        self.parse(le_i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.parse(le_u16)
    }

    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        self.parse(le_i16)
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.parse(le_u32)
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.parse(le_i32)
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        self.parse(le_f32)
    }

    pub fn read_vec2(&mut self) -> Result<Vec2, DecodeError> {
        self.parse(vec2)
    }

    pub fn read_vec3(&mut self) -> Result<Vec3, DecodeError> {
        self.parse(vec3)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        self.parse(take(n))
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self.read_bytes(N)?;
        let mut res = [0u8; N];
        res.copy_from_slice(bytes);

        Ok(res)
    }

    /// Reads `n` records with the given record parser.
    pub fn read_count<O, P>(&mut self, parser: P, n: usize) -> Result<Vec<O>, DecodeError>
    where
        P: Parser<&'a [u8], Output = O, Error = NomError<'a>>,
    {
        self.parse(count(parser, n))
    }

    pub fn read_sstring(&mut self) -> Result<String, DecodeError> {
        self.parse(sstring)
    }

    pub fn read_fixed_string(&mut self, width: usize) -> Result<String, DecodeError> {
        self.parse(fixed_string(width))
    }
}
