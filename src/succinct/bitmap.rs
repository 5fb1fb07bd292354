//! Immutable bitmap with O(1) rank and near-O(1) select.
//!
//! Bits live in `u64` words. Two auxiliary tables are computed once at
//! construction and again on load (they are never serialized):
//!
//! - Superblock ranks: absolute count of ones before every 65536-bit superblock.
//! - Block ranks: count of ones from the superblock start to every 512-bit
//!   block, as `u16` (about 3% over the raw bits).
//!
//! Rank adds at most eight popcounts to the two table reads. Select samples
//! the block holding every 4096th one, which bounds a binary search over
//! block ranks, then scans at most eight words.
//!
//! Binary format:
//! ```text
//! [len: u64 LE]                    // number of bits
//! [ones: u64 LE]                   // popcount, verified on load
//! [words: u64 LE x ceil(len / 64)]
//! ```

use std::io::Write;

use crate::codec::ByteReader;
use crate::error::{HdtError, Result};

const WORD_BITS: usize = 64;

/// Bits per block (8 words).
const BLOCK_BITS: usize = 512;

const WORDS_PER_BLOCK: usize = BLOCK_BITS / WORD_BITS;

/// Bits per superblock. Relative block ranks stay below 65536.
const SUPERBLOCK_BITS: usize = 65_536;

const BLOCKS_PER_SUPERBLOCK: usize = SUPERBLOCK_BITS / BLOCK_BITS;

/// Sampling interval for select (every 4096 ones).
const SELECT_SAMPLE_RATE: usize = 4096;

/// Fixed-length bit sequence with rank/select support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    words: Vec<u64>,
    len: usize,
    /// superblock_ranks[i] = ones in [0, i * SUPERBLOCK_BITS).
    superblock_ranks: Vec<u64>,
    /// Ones from the enclosing superblock start to each block start.
    block_ranks: Vec<u16>,
    /// select_samples[i] = block containing the (i * SELECT_SAMPLE_RATE)-th one.
    select_samples: Vec<u32>,
    ones: usize,
}

fn words_for(len: usize) -> usize {
    len / WORD_BITS + usize::from(len % WORD_BITS != 0)
}

impl Bitmap {
    /// Build from a bool slice. Mostly useful in tests.
    pub fn from_bools(bits: &[bool]) -> Self {
        let mut builder = BitmapBuilder::with_capacity(bits.len());
        for &b in bits {
            builder.push(b);
        }
        builder.finish()
    }

    /// Build from raw words. Bits at positions >= `len` must be zero.
    fn from_words(words: Vec<u64>, len: usize) -> Self {
        debug_assert_eq!(words.len(), words_for(len));

        let num_blocks = (words.len() + WORDS_PER_BLOCK - 1) / WORDS_PER_BLOCK;
        let mut superblock_ranks = Vec::with_capacity(num_blocks / BLOCKS_PER_SUPERBLOCK + 1);
        let mut block_ranks = Vec::with_capacity(num_blocks);
        let mut select_samples = Vec::new();

        let mut ones = 0usize;
        let mut superblock_start = 0usize;

        for (block, chunk) in words.chunks(WORDS_PER_BLOCK).enumerate() {
            if block % BLOCKS_PER_SUPERBLOCK == 0 {
                superblock_ranks.push(ones as u64);
                superblock_start = ones;
            }
            block_ranks.push((ones - superblock_start) as u16);

            let block_ones: usize = chunk.iter().map(|w| w.count_ones() as usize).sum();
            while select_samples.len() * SELECT_SAMPLE_RATE < ones + block_ones {
                select_samples.push(block as u32);
            }
            ones += block_ones;
        }

        Self {
            words,
            len,
            superblock_ranks,
            block_ranks,
            select_samples,
            ones,
        }
    }

    /// Absolute ones before `block`.
    #[inline]
    fn block_rank(&self, block: usize) -> usize {
        self.superblock_ranks[block / BLOCKS_PER_SUPERBLOCK] as usize
            + self.block_ranks[block] as usize
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total number of set bits.
    pub fn count_ones(&self) -> usize {
        self.ones
    }

    pub fn count_zeros(&self) -> usize {
        self.len - self.ones
    }

    /// Bit at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.len {
            return None;
        }
        Some((self.words[index / WORD_BITS] >> (index % WORD_BITS)) & 1 == 1)
    }

    /// Ones in `[0, pos)`. Saturates at the total for `pos >= len`.
    pub fn rank1(&self, pos: usize) -> usize {
        if pos >= self.len {
            return self.ones;
        }
        let block = pos / BLOCK_BITS;
        let word = pos / WORD_BITS;
        let offset = pos % WORD_BITS;

        let mut rank = self.block_rank(block);
        for w in &self.words[block * WORDS_PER_BLOCK..word] {
            rank += w.count_ones() as usize;
        }
        if offset > 0 {
            let mask = (1u64 << offset) - 1;
            rank += (self.words[word] & mask).count_ones() as usize;
        }
        rank
    }

    /// Zeros in `[0, pos)`.
    pub fn rank0(&self, pos: usize) -> usize {
        let pos = pos.min(self.len);
        pos - self.rank1(pos)
    }

    /// Position of the k-th set bit (0-based `k`).
    pub fn select1(&self, k: usize) -> Option<usize> {
        if k >= self.ones {
            return None;
        }

        // The sample pair brackets the block that holds the k-th one.
        let sample = k / SELECT_SAMPLE_RATE;
        let mut lo = self.select_samples[sample] as usize;
        let mut hi = self
            .select_samples
            .get(sample + 1)
            .map(|&b| b as usize + 1)
            .unwrap_or(self.block_ranks.len());

        // Largest block whose starting rank is <= k.
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.block_rank(mid) <= k {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let mut remaining = k - self.block_rank(lo);
        let first_word = lo * WORDS_PER_BLOCK;
        let last_word = (first_word + WORDS_PER_BLOCK).min(self.words.len());
        for w in first_word..last_word {
            let word = self.words[w];
            let word_ones = word.count_ones() as usize;
            if remaining < word_ones {
                return select_in_word(word, remaining).map(|bit| w * WORD_BITS + bit);
            }
            remaining -= word_ones;
        }
        None
    }

    /// Position of the first set bit at or after `from`.
    pub fn next_one(&self, from: usize) -> Option<usize> {
        self.select1(self.rank1(from))
    }

    /// Heap bytes held by the auxiliary rank/select tables.
    pub fn auxiliary_size_bytes(&self) -> usize {
        self.superblock_ranks.len() * 8 + self.block_ranks.len() * 2 + self.select_samples.len() * 4
    }

    /// Bits plus auxiliary tables, in bytes.
    pub fn size_bytes(&self) -> usize {
        self.words.len() * 8 + self.auxiliary_size_bytes()
    }

    /// Auxiliary / raw bits ratio.
    pub fn space_overhead(&self) -> f64 {
        if self.words.is_empty() {
            return 0.0;
        }
        self.auxiliary_size_bytes() as f64 / (self.words.len() * 8) as f64
    }

    /// Serialized size in bytes.
    pub fn serialized_size(&self) -> usize {
        16 + self.words.len() * 8
    }

    /// Write the bitmap in binary format.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&(self.len as u64).to_le_bytes())?;
        writer.write_all(&(self.ones as u64).to_le_bytes())?;
        for &word in &self.words {
            writer.write_all(&word.to_le_bytes())?;
        }
        Ok(())
    }

    /// Read a bitmap and rebuild its rank/select tables.
    ///
    /// The stored popcount must match the recomputed one and no bit past
    /// `len` may be set; otherwise the container is corrupt.
    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        let len = reader.read_len("bitmap length")?;
        let stored_ones = reader.read_len("bitmap popcount")?;
        let word_count = words_for(len);
        let raw = reader.take(
            word_count
                .checked_mul(8)
                .ok_or_else(|| HdtError::corrupt("bitmap length overflow"))?,
            "bitmap words",
        )?;

        let words: Vec<u64> = raw
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect();

        let tail = len % WORD_BITS;
        if tail != 0 {
            if let Some(&last) = words.last() {
                if last >> tail != 0 {
                    return Err(HdtError::corrupt("bitmap has bits set past its length"));
                }
            }
        }

        let bitmap = Self::from_words(words, len);
        if bitmap.ones != stored_ones {
            return Err(HdtError::corrupt(format!(
                "bitmap popcount mismatch: header says {}, bits say {}",
                stored_ones, bitmap.ones
            )));
        }
        Ok(bitmap)
    }

    /// Parse a standalone bitmap from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from(&mut ByteReader::new(bytes))
    }
}

impl Default for Bitmap {
    fn default() -> Self {
        Self::from_words(Vec::new(), 0)
    }
}

/// Position of the k-th set bit inside one word.
fn select_in_word(word: u64, k: usize) -> Option<usize> {
    if k >= word.count_ones() as usize {
        return None;
    }
    let mut w = word;
    for _ in 0..k {
        w &= w - 1;
    }
    Some(w.trailing_zeros() as usize)
}

/// Append-only bit accumulator; `finish` freezes it into a [`Bitmap`].
#[derive(Debug, Default)]
pub struct BitmapBuilder {
    words: Vec<u64>,
    len: usize,
}

impl BitmapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: Vec::with_capacity(words_for(bits)),
            len: 0,
        }
    }

    pub fn push(&mut self, bit: bool) {
        if self.len % WORD_BITS == 0 {
            self.words.push(0);
        }
        if bit {
            let last = self.words.len() - 1;
            self.words[last] |= 1u64 << (self.len % WORD_BITS);
        }
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finish(self) -> Bitmap {
        Bitmap::from_words(self.words, self.len)
    }
}
