//! Dictionary metadata and packed marker codes.

use serde::{Deserialize, Serialize};

/// Errors raised when a dictionary description is unusable.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DictionaryError {
    #[error("marker_size {marker_size} implies {bits} bits, more than 64")]
    TooManyBits { marker_size: usize, bits: usize },
    #[error("marker_size must be at least 1")]
    EmptyMarker,
    #[error("dictionary {0:?} has no codes")]
    NoCodes(String),
    #[error("code {code:#x} for id {id} sets bits beyond marker_size^2")]
    CodeOutOfRange { id: usize, code: u64 },
}

/// A square-fiducial dictionary supplied at runtime (typically from JSON).
///
/// Each code packs the inner `marker_size × marker_size` bits row-major,
/// with **black = 1**. The id of a marker is its index in `codes`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dictionary {
    pub name: String,
    /// Inner bits per side.
    pub marker_size: usize,
    #[serde(default)]
    pub max_correction_bits: u8,
    pub codes: Vec<u64>,
}

impl Dictionary {
    /// Build and validate a dictionary.
    pub fn new(
        name: impl Into<String>,
        marker_size: usize,
        codes: Vec<u64>,
    ) -> Result<Self, DictionaryError> {
        let dict = Self {
            name: name.into(),
            marker_size,
            max_correction_bits: 0,
            codes,
        };
        dict.validate()?;
        Ok(dict)
    }

    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Check sizes and codes. Deserialized dictionaries should be validated
    /// before use.
    pub fn validate(&self) -> Result<(), DictionaryError> {
        if self.marker_size == 0 {
            return Err(DictionaryError::EmptyMarker);
        }
        let bits = self.bit_count();
        if bits > 64 {
            return Err(DictionaryError::TooManyBits {
                marker_size: self.marker_size,
                bits,
            });
        }
        if self.codes.is_empty() {
            return Err(DictionaryError::NoCodes(self.name.clone()));
        }
        if bits < 64 {
            let mask = (1u64 << bits) - 1;
            let bad = self.codes.iter().enumerate().find(|(_, c)| **c & !mask != 0);
            if let Some((id, &code)) = bad {
                return Err(DictionaryError::CodeOutOfRange { id, code });
            }
        }
        Ok(())
    }
}
