use bitvec::prelude::*;
use byteorder::{ByteOrder, LittleEndian};

use super::constants::{CHANNEL_MASK, CHANNEL_SHIFT, DATA_MASK, HIT_PATTERN_BITS};
use super::error::BitfieldError;

/// RawEvent is the body of a single triggered event as delivered by the data logger.
///
/// The body is a flat sequence of 32-bit words with no self-describing length beyond the
/// hit-pattern word at the head of each ADC block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    words: Vec<u32>,
}

impl RawEvent {
    /// Wrap an existing word buffer
    pub fn new(words: Vec<u32>) -> Self {
        Self { words }
    }

    /// Build an event from the little-endian bytes of the logger buffer.
    ///
    /// Any trailing bytes that do not form a whole word are dropped.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let n_words = bytes.len() / 4;
        let mut words = vec![0u32; n_words];
        LittleEndian::read_u32_into(&bytes[..n_words * 4], &mut words);
        Self { words }
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// BitfieldReader is a forward-only cursor over the words of a RawEvent.
///
/// Callers must bound their reads by a known count; reading past the end is an error
/// rather than a signal to stop.
#[derive(Debug, Clone)]
pub struct BitfieldReader<'a> {
    words: &'a [u32],
    cursor: usize,
}

impl<'a> BitfieldReader<'a> {
    pub fn new(words: &'a [u32]) -> Self {
        Self { words, cursor: 0 }
    }

    /// Read the next word and advance the cursor
    pub fn next_word(&mut self) -> Result<u32, BitfieldError> {
        match self.words.get(self.cursor) {
            Some(word) => {
                self.cursor += 1;
                Ok(*word)
            }
            None => Err(BitfieldError::OutOfData(self.cursor)),
        }
    }

    /// Look at the next word without consuming it
    pub fn peek_word(&self) -> Option<u32> {
        self.words.get(self.cursor).copied()
    }

    /// Number of words not yet read
    pub fn remaining(&self) -> usize {
        self.words.len() - self.cursor
    }

    pub fn position(&self) -> usize {
        self.cursor
    }
}

/// Mask a word and shift the result down
pub fn extract_field(word: u32, mask: u32, shift: u32) -> u32 {
    (word & mask) >> shift
}

/// The 12-bit data value of a readout word
pub fn data_value(word: u32) -> u16 {
    extract_field(word, DATA_MASK, 0) as u16
}

/// The 4-bit channel id of a readout word
pub fn channel_id(word: u32) -> u8 {
    extract_field(word, CHANNEL_MASK, CHANNEL_SHIFT) as u8
}

/// Count the set bits of a hit-pattern word.
///
/// Only the low 16 bits carry hit information; the upper half is ignored.
pub fn popcount16(word: u32) -> u32 {
    word.view_bits::<Lsb0>()[..HIT_PATTERN_BITS].count_ones() as u32
}
