use crate::constants::{MAX_FREQ, N_CHAR, ROOT, TABLE_SIZE};

/// Adaptive Huffman tree over literal and match-length symbols.
///
/// Slots `0..TABLE_SIZE` are tree nodes kept sorted by frequency. `son` of an
/// internal node points at the left of two adjacent children, `son` of a leaf
/// is `symbol + TABLE_SIZE`.
pub(crate) struct HuffTree {
    pub(crate) freq: Vec<u32>,
    pub(crate) prnt: Vec<usize>,
    pub(crate) son: Vec<usize>,
}

impl HuffTree {
    pub(crate) fn new() -> Self {
        let mut freq = vec![0u32; TABLE_SIZE + 1];
        let mut prnt = vec![0usize; TABLE_SIZE + N_CHAR];
        let mut son = vec![0usize; TABLE_SIZE];

        for i in 0..N_CHAR {
            freq[i] = 1;
            son[i] = i + TABLE_SIZE;
            prnt[i + TABLE_SIZE] = i;
        }

        let mut i = 0;
        for j in N_CHAR..=ROOT {
            freq[j] = freq[i] + freq[i + 1];
            son[j] = i;
            prnt[i] = j;
            prnt[i + 1] = j;
            i += 2;
        }

        // sentinel that stops the reordering scan in `update`
        freq[TABLE_SIZE] = 0xffff;
        prnt[ROOT] = 0;

        Self { freq, prnt, son }
    }

    /// Counts one occurrence of `symbol` and restores the sibling order.
    pub(crate) fn update(&mut self, symbol: usize) {
        if self.freq[ROOT] == MAX_FREQ {
            self.reconst();
        }

        let mut c = self.prnt[symbol + TABLE_SIZE];

        loop {
            self.freq[c] += 1;
            let k = self.freq[c];
            let mut l = c + 1;

            if k > self.freq[l] {
                while k > self.freq[l] {
                    l += 1;
                }
                l -= 1;

                self.freq.swap(c, l);

                let i = self.son[c];
                self.prnt[i] = l;
                if i < TABLE_SIZE {
                    self.prnt[i + 1] = l;
                }

                let j = self.son[l];
                self.son[l] = i;

                self.prnt[j] = c;
                if j < TABLE_SIZE {
                    self.prnt[j + 1] = c;
                }
                self.son[c] = j;

                c = l;
            }

            c = self.prnt[c];

            if c == 0 {
                break;
            }
        }
    }

    /// Halves every leaf frequency and rebuilds the internal nodes.
    fn reconst(&mut self) {
        let mut j = 0;
        for i in 0..TABLE_SIZE {
            if self.son[i] >= TABLE_SIZE {
                self.freq[j] = self.freq[i].div_ceil(2);
                self.son[j] = self.son[i];
                j += 1;
            }
        }

        let mut i = 0;
        for j in N_CHAR..TABLE_SIZE {
            let f = self.freq[i] + self.freq[i + 1];
            self.freq[j] = f;

            // insertion point that keeps frequencies sorted
            let mut k = j;
            while k > 0 && f < self.freq[k - 1] {
                k -= 1;
            }

            self.freq.copy_within(k..j, k + 1);
            self.son.copy_within(k..j, k + 1);

            self.freq[k] = f;
            self.son[k] = i;
            i += 2;
        }

        for i in 0..TABLE_SIZE {
            let k = self.son[i];
            self.prnt[k] = i;

            if k < TABLE_SIZE {
                self.prnt[k + 1] = i;
            }
        }
    }
}
