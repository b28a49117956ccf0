//! Square fiducial dictionaries: 4×4 payload words and rotation-aware matching.
//!
//! A word stores the 4×4 payload row-major, most significant bit first, with
//! white cells as `1`. Matching tries the observed word in all four 90°
//! rotations because the quad's starting corner is arbitrary.

use crate::error::{Error, Result};

/// Payload side length in cells.
pub const PAYLOAD_CELLS: usize = 4;

/// First codewords of the 4×4 ArUco family (ids 0..=3).
///
/// Minimum cyclic Hamming distance between distinct ids is 7.
pub const ARUCO_4X4_WORDS: [u16; 4] = [0xB532, 0x0F9A, 0x332D, 0x9946];

/// Marker family selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkerFamily {
    /// Built-in 4×4 ArUco words.
    #[default]
    #[serde(rename = "aruco_4x4")]
    Aruco4x4,
    /// Caller-supplied payload words; the id is the index in `words`.
    Custom { words: Vec<u16> },
}

/// Best dictionary match for an observed word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Match {
    pub id: u32,
    /// Clockwise quarter turns applied to the observed word.
    pub rotation: u8,
    /// Bit errors against the dictionary word.
    pub hamming: u8,
}

/// Resolved word table for one family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    words: Vec<u16>,
}

impl Dictionary {
    pub fn new(family: &MarkerFamily) -> Result<Self> {
        let words = match family {
            MarkerFamily::Aruco4x4 => ARUCO_4X4_WORDS.to_vec(),
            MarkerFamily::Custom { words } => words.clone(),
        };
        if words.is_empty() {
            return Err(Error::Config("marker dictionary has no words".into()));
        }
        Ok(Self { words })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, id: u32) -> Option<u16> {
        self.words.get(id as usize).copied()
    }

    /// Closest word over all rotations; ties keep the lowest id, then the
    /// smallest rotation.
    pub fn best_match(&self, observed: u16) -> Match {
        let mut best = Match {
            id: 0,
            rotation: 0,
            hamming: u8::MAX,
        };
        let mut rotated = observed;
        for rotation in 0..4u8 {
            for (id, &word) in self.words.iter().enumerate() {
                let hamming = (rotated ^ word).count_ones() as u8;
                if hamming < best.hamming
                    || (hamming == best.hamming && (id as u32) < best.id)
                {
                    best = Match {
                        id: id as u32,
                        rotation,
                        hamming,
                    };
                }
            }
            rotated = rotate_cw(rotated);
        }
        best
    }

    /// Accept the best match only within `max_hamming` bit errors.
    pub fn decode(&self, observed: u16, max_hamming: u8) -> Option<Match> {
        let m = self.best_match(observed);
        (m.hamming <= max_hamming).then_some(m)
    }
}

/// Payload bit at `(row, col)`.
pub fn word_bit(word: u16, row: usize, col: usize) -> bool {
    let shift = 15 - (row * PAYLOAD_CELLS + col);
    (word >> shift) & 1 == 1
}

/// Assemble a word from row-major payload bits.
pub fn word_from_bits(bits: &[[bool; PAYLOAD_CELLS]; PAYLOAD_CELLS]) -> u16 {
    let mut word = 0u16;
    for row in bits {
        for &b in row {
            word = (word << 1) | b as u16;
        }
    }
    word
}

/// Rotate the payload a quarter turn clockwise.
pub fn rotate_cw(word: u16) -> u16 {
    let mut bits = [[false; PAYLOAD_CELLS]; PAYLOAD_CELLS];
    for (r, row) in bits.iter_mut().enumerate() {
        for (c, bit) in row.iter_mut().enumerate() {
            *bit = word_bit(word, PAYLOAD_CELLS - 1 - c, r);
        }
    }
    word_from_bits(&bits)
}
