//! Compressor producing streams [`crate::unpack`] reads. Only built for tests
//! and fixture generation.
use crate::{
    constants::{BUF_SIZE, D_CODE, LOOK_AHEAD, ROOT, TABLE_SIZE, THRESHOLD, position_bits},
    tree::HuffTree,
};

/// Minimal LZHUF compressor sharing the decoder's tree, enough to produce fixtures.
struct Encoder {
    tree: HuffTree,
    out: Vec<u8>,
    putbuf: u32,
    putlen: u32,
    p_len: [u32; 64],
    p_code: [u32; 64],
}

impl Encoder {
    fn new() -> Self {
        let mut p_len = [0u32; 64];
        let mut p_code = [0u32; 64];

        // first byte of each position class, and how many of its bits are code
        for byte in (0..256usize).rev() {
            let class = D_CODE[byte] as usize;
            p_code[class] = byte as u32;
            p_len[class] = position_bits(byte as u8) as u32;
        }

        Self {
            tree: HuffTree::new(),
            out: vec![],
            putbuf: 0,
            putlen: 0,
            p_len,
            p_code,
        }
    }

    /// `code` is left aligned in 16 bits.
    fn put_code(&mut self, len: u32, code: u32) {
        self.putbuf |= code >> self.putlen;
        self.putlen += len;

        if self.putlen >= 8 {
            self.out.push((self.putbuf >> 8) as u8);
            self.putlen -= 8;

            if self.putlen >= 8 {
                self.out.push(self.putbuf as u8);
                self.putlen -= 8;
                self.putbuf = (code << (len - self.putlen)) & 0xFFFF;
            } else {
                self.putbuf = (self.putbuf << 8) & 0xFFFF;
            }
        }
    }

    fn encode_char(&mut self, symbol: usize) {
        let mut path = vec![];
        let mut k = self.tree.prnt[symbol + TABLE_SIZE];

        loop {
            path.push(k & 1);
            k = self.tree.prnt[k];

            if k == ROOT {
                break;
            }
        }

        for bit in path.into_iter().rev() {
            self.put_code(1, (bit as u32) << 15);
        }

        self.tree.update(symbol);
    }

    fn encode_position(&mut self, position: usize) {
        let class = position >> 6;

        self.put_code(self.p_len[class], self.p_code[class] << 8);
        self.put_code(6, ((position & 0x3f) as u32) << 10);
    }

    fn finish(mut self) -> Vec<u8> {
        if self.putlen > 0 {
            self.out.push((self.putbuf >> 8) as u8);
        }

        self.out
    }
}

/// Greedy compression searching back at most `window` bytes. `0` emits literals only.
pub fn pack(data: &[u8], window: usize) -> Vec<u8> {
    let mut encoder = Encoder::new();
    let mut p = 0;

    while p < data.len() {
        let mut best = (0, 0);

        for distance in 1..=window.min(p).min(BUF_SIZE - 1) {
            let mut len = 0;

            while len < LOOK_AHEAD
                && p + len < data.len()
                && data[p + len] == data[p + len - distance]
            {
                len += 1;
            }

            if len > best.0 {
                best = (len, distance);
            }
        }

        let (len, distance) = best;

        if len > THRESHOLD {
            encoder.encode_char(len + 255 - THRESHOLD);
            encoder.encode_position(distance - 1);
            p += len;
        } else {
            encoder.encode_char(data[p] as usize);
            p += 1;
        }
    }

    encoder.finish()
}
