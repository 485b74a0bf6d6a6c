use std::fmt;
use std::str::FromStr;

use chroma_error::{ChromaError, ErrorCodes};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Number of bytes in the fixed width binary form.
pub const SEQ_ID_BYTES: usize = 24;
/// Number of symbols in the fixed width text form.
pub const SEQ_ID_STR_LEN: usize = 36;

// The RFC 1924 symbol set, sorted by ASCII code so that lexicographic order of
// padded strings matches numeric order.
const BASE85_ALPHABET: &[u8; 85] =
    b"!#$%&()*+-0123456789;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ^_`abcdefghijklmnopqrstuvwxyz{|}~";

const fn base85_decode_table() -> [u8; 128] {
    let mut table = [u8::MAX; 128];
    let mut i = 0;
    while i < BASE85_ALPHABET.len() {
        table[BASE85_ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
}

const BASE85_DECODE: [u8; 128] = base85_decode_table();

/// Position of a message in the managed log.
///
/// `ledger_id` is signed in the log's own model, so only the lower 63 bits are
/// ever populated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessagePosition {
    pub partition: u32,
    pub ledger_id: u64,
    pub entry_id: u64,
    pub batch_index: u32,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SeqIdError {
    #[error("Ledger id {0} does not fit in 63 bits")]
    LedgerOutOfRange(u64),
    #[error("Sequence id must be {SEQ_ID_BYTES} bytes, got {0}")]
    InvalidLength(usize),
    #[error("Sequence id string must be {SEQ_ID_STR_LEN} characters, got {0}")]
    InvalidStringLength(usize),
    #[error("Invalid base-85 symbol {0:?} in sequence id")]
    InvalidSymbol(char),
    #[error("Sequence id string exceeds 192 bits")]
    Overflow,
}

impl ChromaError for SeqIdError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

/// A 192-bit unsigned sequence number.
///
/// Laid out as `ledger_id:64 | entry_id:64 | batch_index:32 | partition:32`,
/// most significant word first. The partition sits in the low bits, so two
/// ids only compare meaningfully when their partitions are equal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeqId([u64; 3]);

pub fn min_seqid() -> SeqId {
    SeqId::MIN
}

pub fn max_seqid() -> SeqId {
    SeqId::MAX
}

impl SeqId {
    pub const MIN: SeqId = SeqId([0, 0, 0]);
    /// 2^191 - 1. The top bit is reserved.
    pub const MAX: SeqId = SeqId([i64::MAX as u64, u64::MAX, u64::MAX]);

    pub const fn from_words(words: [u64; 3]) -> Self {
        SeqId(words)
    }

    pub fn words(&self) -> [u64; 3] {
        self.0
    }

    pub fn encode(position: MessagePosition) -> Result<Self, SeqIdError> {
        if position.ledger_id > i64::MAX as u64 {
            return Err(SeqIdError::LedgerOutOfRange(position.ledger_id));
        }
        Ok(SeqId([
            position.ledger_id,
            position.entry_id,
            ((position.batch_index as u64) << 32) | position.partition as u64,
        ]))
    }

    pub fn decode(&self) -> MessagePosition {
        MessagePosition {
            partition: self.0[2] as u32,
            ledger_id: self.0[0],
            entry_id: self.0[1],
            batch_index: (self.0[2] >> 32) as u32,
        }
    }

    pub fn to_bytes(&self) -> [u8; SEQ_ID_BYTES] {
        let mut bytes = [0u8; SEQ_ID_BYTES];
        for (chunk, word) in bytes.chunks_exact_mut(8).zip(self.0) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SeqIdError> {
        if bytes.len() != SEQ_ID_BYTES {
            return Err(SeqIdError::InvalidLength(bytes.len()));
        }
        let mut words = [0u64; 3];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            *word = u64::from_be_bytes(buf);
        }
        Ok(SeqId(words))
    }

    // Divides in place and returns the remainder.
    fn div_rem_small(words: &mut [u64; 3], divisor: u64) -> u64 {
        let mut rem: u128 = 0;
        for word in words.iter_mut() {
            let cur = (rem << 64) | *word as u128;
            *word = (cur / divisor as u128) as u64;
            rem = cur % divisor as u128;
        }
        rem as u64
    }

    // Computes `words * factor + addend`, returning None on overflow past 192 bits.
    fn mul_add_small(words: [u64; 3], factor: u64, addend: u64) -> Option<[u64; 3]> {
        let mut out = [0u64; 3];
        let mut carry = addend as u128;
        for i in (0..3).rev() {
            let cur = words[i] as u128 * factor as u128 + carry;
            out[i] = cur as u64;
            carry = cur >> 64;
        }
        (carry == 0).then_some(out)
    }
}

impl From<u128> for SeqId {
    fn from(value: u128) -> Self {
        SeqId([0, (value >> 64) as u64, value as u64])
    }
}

impl From<u64> for SeqId {
    fn from(value: u64) -> Self {
        SeqId([0, 0, value])
    }
}

impl fmt::Display for SeqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut words = self.0;
        let mut symbols = [BASE85_ALPHABET[0]; SEQ_ID_STR_LEN];
        for slot in symbols.iter_mut().rev() {
            if words == [0, 0, 0] {
                break;
            }
            let digit = Self::div_rem_small(&mut words, 85);
            *slot = BASE85_ALPHABET[digit as usize];
        }
        // Every alphabet symbol is ASCII.
        f.write_str(std::str::from_utf8(&symbols).map_err(|_| fmt::Error)?)
    }
}

impl FromStr for SeqId {
    type Err = SeqIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let count = s.chars().count();
        if count != SEQ_ID_STR_LEN {
            return Err(SeqIdError::InvalidStringLength(count));
        }
        let mut words = [0u64; 3];
        for ch in s.chars() {
            let digit = (ch.is_ascii())
                .then(|| BASE85_DECODE[ch as usize])
                .filter(|d| *d != u8::MAX)
                .ok_or(SeqIdError::InvalidSymbol(ch))?;
            words = Self::mul_add_small(words, 85, digit as u64).ok_or(SeqIdError::Overflow)?;
        }
        Ok(SeqId(words))
    }
}

impl Serialize for SeqId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SeqId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_seq_id() -> impl Strategy<Value = SeqId> {
        any::<[u64; 3]>().prop_map(SeqId::from_words)
    }

    #[test]
    fn test_bounds() {
        assert_eq!(min_seqid().to_bytes(), [0u8; SEQ_ID_BYTES]);
        assert_eq!(min_seqid().to_string(), "!".repeat(SEQ_ID_STR_LEN));
        let max = max_seqid().to_bytes();
        assert_eq!(max[0], 0x7f);
        assert!(max[1..].iter().all(|b| *b == 0xff));
        assert!(min_seqid() < max_seqid());
    }

    #[test]
    fn test_layout_puts_partition_in_low_bits() {
        let id = SeqId::encode(MessagePosition {
            partition: 7,
            ledger_id: 1,
            entry_id: 2,
            batch_index: 3,
        })
        .unwrap();
        assert_eq!(id.words(), [1, 2, (3u64 << 32) | 7]);
        let bytes = id.to_bytes();
        assert_eq!(&bytes[20..], &7u32.to_be_bytes());
        assert_eq!(&bytes[16..20], &3u32.to_be_bytes());
    }

    #[test]
    fn test_ledger_above_63_bits_is_rejected() {
        let result = SeqId::encode(MessagePosition {
            partition: 0,
            ledger_id: u64::MAX,
            entry_id: 0,
            batch_index: 0,
        });
        assert_eq!(result, Err(SeqIdError::LedgerOutOfRange(u64::MAX)));
    }

    #[test]
    fn test_all_ones_fits_in_string_form() {
        let id = SeqId::from_words([u64::MAX; 3]);
        let s = id.to_string();
        assert_eq!(s.len(), SEQ_ID_STR_LEN);
        assert_eq!(s.parse::<SeqId>().unwrap(), id);
    }

    #[test]
    fn test_invalid_strings_are_rejected() {
        assert_eq!(
            "abc".parse::<SeqId>(),
            Err(SeqIdError::InvalidStringLength(3))
        );
        let mut bad = "!".repeat(SEQ_ID_STR_LEN - 1);
        bad.push('"');
        assert_eq!(bad.parse::<SeqId>(), Err(SeqIdError::InvalidSymbol('"')));
        let too_big = "~".repeat(SEQ_ID_STR_LEN);
        assert_eq!(too_big.parse::<SeqId>(), Err(SeqIdError::Overflow));
    }

    #[test]
    fn test_wrong_byte_length_is_rejected() {
        assert_eq!(
            SeqId::from_bytes(&[0u8; 23]),
            Err(SeqIdError::InvalidLength(23))
        );
    }

    #[test]
    fn test_serde_uses_string_form() {
        let id = SeqId::from(12345u64);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: SeqId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    proptest! {
        #[test]
        fn test_position_round_trip(
            partition in any::<u32>(),
            ledger_id in 0..=i64::MAX as u64,
            entry_id in any::<u64>(),
            batch_index in any::<u32>(),
        ) {
            let position = MessagePosition { partition, ledger_id, entry_id, batch_index };
            let id = SeqId::encode(position).unwrap();
            prop_assert_eq!(id.decode(), position);
            prop_assert!(id <= max_seqid());
        }

        #[test]
        fn test_bytes_and_string_round_trip(id in any_seq_id()) {
            prop_assert_eq!(SeqId::from_bytes(&id.to_bytes()).unwrap(), id);
            prop_assert_eq!(id.to_string().parse::<SeqId>().unwrap(), id);
        }

        #[test]
        fn test_order_agrees_across_forms(a in any_seq_id(), b in any_seq_id()) {
            prop_assert_eq!(a.cmp(&b), a.to_bytes().cmp(&b.to_bytes()));
            prop_assert_eq!(a.cmp(&b), a.to_string().cmp(&b.to_string()));
        }

        #[test]
        fn test_order_follows_append_order_within_partition(
            partition in any::<u32>(),
            ledger_id in 0..i64::MAX as u64,
            entry_id in 0..u64::MAX,
            batch_index in any::<u32>(),
        ) {
            let base = MessagePosition { partition, ledger_id, entry_id, batch_index };
            let next_entry = MessagePosition { entry_id: entry_id + 1, batch_index: 0, ..base };
            let next_ledger = MessagePosition {
                ledger_id: ledger_id + 1,
                entry_id: 0,
                batch_index: 0,
                ..base
            };
            let a = SeqId::encode(base).unwrap();
            prop_assert!(a < SeqId::encode(next_entry).unwrap());
            prop_assert!(a < SeqId::encode(next_ledger).unwrap());
        }
    }
}
