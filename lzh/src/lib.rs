//! Decoder for the adaptive Huffman + LZ77 scheme compressed terrain tables use.
//!
//! Byte for byte compatible with the classic LZHUF layout: a 4096 byte ring
//! buffer initialised to zero, matches of 3 to 60 bytes, and a position code
//! split into a Huffman coded upper part and 6 raw low bits.
mod constants;
#[cfg(any(test, feature = "fixtures"))]
pub mod pack;
mod tree;

use log::debug;

use crate::{
    constants::{BUF_SIZE, D_CODE, LOOK_AHEAD, ROOT, TABLE_SIZE, THRESHOLD, position_bits},
    tree::HuffTree,
};

/// Decompresses `input` into exactly `text_size` bytes.
///
/// Running out of input is not an error, missing bytes read as zero the same
/// way the game's own tools behave.
pub fn unpack(input: &[u8], text_size: usize) -> Vec<u8> {
    Decoder::new(input).unpack(text_size)
}

struct BitReader<'a> {
    input: &'a [u8],
    position: usize,
    buf: u32,
    len: u32,
}

impl<'a> BitReader<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            position: 0,
            buf: 0,
            len: 0,
        }
    }

    fn refill(&mut self) {
        while self.len <= 8 {
            let byte = self.input.get(self.position).copied().unwrap_or(0);
            self.position += 1;

            self.buf |= (byte as u32) << (8 - self.len);
            self.buf &= 0xFFFF;
            self.len += 8;
        }
    }

    fn bit(&mut self) -> usize {
        self.refill();

        let bit = self.buf;
        self.buf = (self.buf << 1) & 0xFFFF;
        self.len -= 1;

        ((bit >> 15) & 1) as usize
    }

    fn byte(&mut self) -> usize {
        self.refill();

        let byte = self.buf;
        self.buf = (self.buf << 8) & 0xFFFF;
        self.len -= 8;

        (byte >> 8) as usize
    }
}

struct Decoder<'a> {
    bits: BitReader<'a>,
    tree: HuffTree,
}

impl<'a> Decoder<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            bits: BitReader::new(input),
            tree: HuffTree::new(),
        }
    }

    fn decode_char(&mut self) -> usize {
        let mut c = self.tree.son[ROOT];

        while c < TABLE_SIZE {
            c += self.bits.bit();
            c = self.tree.son[c];
        }

        let symbol = c - TABLE_SIZE;
        self.tree.update(symbol);

        symbol
    }

    fn decode_position(&mut self) -> usize {
        let mut i = self.bits.byte();
        let upper = (D_CODE[i] as usize) << 6;

        for _ in 0..position_bits(i as u8) - 2 {
            i = (i << 1) + self.bits.bit();
        }

        upper | (i & 0x3f)
    }

    fn unpack(mut self, text_size: usize) -> Vec<u8> {
        let mut text_buf = vec![0u8; BUF_SIZE + LOOK_AHEAD - 1];
        let mut r = BUF_SIZE - LOOK_AHEAD;
        let mut out = Vec::with_capacity(text_size + LOOK_AHEAD);

        while out.len() < text_size {
            let c = self.decode_char();

            if c < 256 {
                out.push(c as u8);
                text_buf[r] = c as u8;
                r = (r + 1) & (BUF_SIZE - 1);
                continue;
            }

            let from = (r + BUF_SIZE - self.decode_position() - 1) & (BUF_SIZE - 1);
            let len = c - 255 + THRESHOLD;

            for k in 0..len {
                let byte = text_buf[(from + k) & (BUF_SIZE - 1)];

                out.push(byte);
                text_buf[r] = byte;
                r = (r + 1) & (BUF_SIZE - 1);
            }
        }

        if out.len() > text_size {
            debug!("match ran {} bytes past the end", out.len() - text_size);
            out.truncate(text_size);
        }

        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{constants::N_CHAR, pack::pack as compress};

    fn noise(len: usize, seed: u32) -> Vec<u8> {
        let mut state = seed;

        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            })
            .collect()
    }

    #[test]
    fn symbol_count() {
        assert_eq!(N_CHAR, 314);
        assert_eq!(TABLE_SIZE, 627);
        assert_eq!(ROOT, 626);
    }

    #[test]
    fn literals() {
        let data = b"GBLK heightfield".to_vec();
        let packed = compress(&data, 0);

        assert_eq!(unpack(&packed, data.len()), data);
    }

    #[test]
    fn back_references() {
        let mut data = b"abcabcabcabcabcabc".to_vec();
        data.extend([7u8; 100]);
        data.extend(b"abcabc");

        let packed = compress(&data, BUF_SIZE);

        assert!(packed.len() < data.len() / 2);
        assert_eq!(unpack(&packed, data.len()), data);
    }

    #[test]
    fn matches_across_ring_wrap() {
        let block = noise(300, 0x1234_5678);
        let data: Vec<u8> = (0..20).flat_map(|_| block.iter().copied()).collect();

        let packed = compress(&data, 1024);

        assert_eq!(unpack(&packed, data.len()), data);
    }

    #[test]
    fn rebuilds_tree_when_root_saturates() {
        // well past the 0x8000 root frequency
        let data = noise(40_000, 0xdead_beef);
        let packed = compress(&data, 0);

        assert_eq!(unpack(&packed, data.len()), data);
    }

    fn fnv1a(data: &[u8]) -> u64 {
        data.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &byte| {
            (hash ^ byte as u64).wrapping_mul(0x0000_0100_0000_01b3)
        })
    }

    // Expected outputs were produced by the game's own decoder, not by `pack`.
    #[test]
    fn known_stream() {
        let input = [
            0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0, 0x0F, 0xED, 0xCB, 0xA9, 0x87, 0x65,
            0x43, 0x21,
        ];

        let mut expected = vec![134, 168, 202, 236];
        expected.extend([0; 17]);
        expected.extend([82, 117, 111, 230, 72, 202]);
        expected.extend([0; 5]);

        assert_eq!(unpack(&input, 32), expected);
    }

    #[test]
    fn known_long_stream() {
        let mut state = 1u32;
        let input: Vec<u8> = (0..50_000)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 24) as u8
            })
            .collect();

        // long enough for the root frequency to saturate once
        let out = unpack(&input, 250_000);

        assert_eq!(&out[..3], &[176, 210, 245]);
        assert_eq!(&out[out.len() - 6..], &[174, 13, 254, 157, 57, 99]);
        assert_eq!(fnv1a(&out), 0x6f5c_0f27_7029_faeb);
    }

    #[test]
    fn output_length_is_exact() {
        assert_eq!(unpack(&[], 0), Vec::<u8>::new());
        assert_eq!(unpack(&[], 10).len(), 10);

        let data = [9u8; 64];
        let packed = compress(&data, BUF_SIZE);

        assert_eq!(unpack(&packed, 10), data[..10].to_vec());
    }
}
