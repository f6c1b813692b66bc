use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-width perceptual hash, stored as packed bytes (MSB first)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageHash {
    bytes: Vec<u8>,
    bit_width: usize,
}

impl ImageHash {
    /// Pack a bit sequence into a hash
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut bytes = vec![0u8; bits.len().div_ceil(8)];
        for (i, bit) in bits.iter().enumerate() {
            if *bit {
                bytes[i / 8] |= 0x80 >> (i % 8);
            }
        }
        Self {
            bytes,
            bit_width: bits.len(),
        }
    }

    /// Parse a lowercase or uppercase hex string; bit width is 4 bits per digit
    pub fn from_hex(hex: &str) -> Result<Self, String> {
        let hex = hex.trim();
        if hex.is_empty() {
            return Err("Empty hash string".to_string());
        }

        let mut bits = Vec::with_capacity(hex.len() * 4);
        for c in hex.chars() {
            let nibble = c
                .to_digit(16)
                .ok_or_else(|| format!("Invalid hex digit '{}' in hash: {}", c, hex))?;
            for shift in (0..4).rev() {
                bits.push((nibble >> shift) & 1 == 1);
            }
        }

        Ok(Self::from_bits(&bits))
    }

    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(self.bit_width.div_ceil(4));
        for nibble_index in 0..self.bit_width.div_ceil(4) {
            let mut nibble = 0u32;
            for offset in 0..4 {
                let bit = nibble_index * 4 + offset;
                nibble <<= 1;
                if bit < self.bit_width && self.bit(bit) {
                    nibble |= 1;
                }
            }
            // nibble is always < 16
            hex.push(char::from_digit(nibble, 16).unwrap_or('0'));
        }
        hex
    }

    pub fn bit_width(&self) -> usize {
        self.bit_width
    }

    pub fn bit(&self, index: usize) -> bool {
        self.bytes[index / 8] & (0x80 >> (index % 8)) != 0
    }

    /// Hamming distance, or `None` when the widths differ
    pub fn distance(&self, other: &ImageHash) -> Option<u32> {
        if self.bit_width != other.bit_width {
            return None;
        }
        Some(
            self.bytes
                .iter()
                .zip(other.bytes.iter())
                .map(|(a, b)| (a ^ b).count_ones())
                .sum(),
        )
    }
}

impl fmt::Display for ImageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ImageHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ImageHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        ImageHash::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Known thumbnail (e.g. a hero portrait) and its hash
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HashEntry {
    pub label: String,
    pub hash: ImageHash,
}

/// Named collection of thumbnails that a region can be matched against
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageHashSet {
    pub id: String,
    pub entries: Vec<HashEntry>,
}

impl ImageHashSet {
    pub fn new(id: impl Into<String>, entries: Vec<HashEntry>) -> Self {
        Self {
            id: id.into(),
            entries,
        }
    }
}

/// Hash sets available to one pipeline run: the active profile's sets first,
/// then the built-in default set.
#[derive(Debug, Clone, Default)]
pub struct HashLibrary {
    profile_sets: Vec<ImageHashSet>,
    default_set: Option<ImageHashSet>,
}

impl HashLibrary {
    pub fn new(profile_sets: Vec<ImageHashSet>, default_set: Option<ImageHashSet>) -> Self {
        Self {
            profile_sets,
            default_set,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up a set by id; profile sets shadow the default set
    pub fn resolve(&self, id: &str) -> Option<&ImageHashSet> {
        self.profile_sets
            .iter()
            .find(|set| set.id == id)
            .or_else(|| self.default_set.as_ref().filter(|set| set.id == id))
    }

    pub fn len(&self) -> usize {
        self.profile_sets.len() + usize::from(self.default_set.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
