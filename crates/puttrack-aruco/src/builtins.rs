//! Built-in dictionaries.
//!
//! Only the leading ids of each dictionary are embedded: the four corner
//! markers of a play area use ids `0..=3`. Codes follow the packing of
//! [`Dictionary`] (row-major, black = 1), converted from the OpenCV tables.

#![allow(clippy::unreadable_literal)]

use crate::Dictionary;

/// Name of the default calibration dictionary.
pub const DICT_4X4_50: &str = "DICT_4X4_50";

/// Ids 0..=3 of `DICT_4X4_50`.
const DICT_4X4_50_CODES: [u64; 4] = [0xb352, 0xa60f, 0x4b33, 0x9d66];

/// Names accepted by [`builtin_dictionary`].
pub const BUILTIN_DICTIONARY_NAMES: &[&str] = &[DICT_4X4_50];

/// Look up a built-in dictionary by its OpenCV name.
pub fn builtin_dictionary(name: &str) -> Option<Dictionary> {
    match name {
        DICT_4X4_50 => Some(Dictionary {
            name: DICT_4X4_50.to_string(),
            marker_size: 4,
            max_correction_bits: 1,
            codes: DICT_4X4_50_CODES.to_vec(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rotate_code_u64, Matcher};

    #[test]
    fn every_builtin_name_resolves_and_validates() {
        for name in BUILTIN_DICTIONARY_NAMES {
            let dict = builtin_dictionary(name).expect("builtin");
            assert_eq!(dict.name, *name);
            assert!(dict.validate().is_ok());
        }
        assert!(builtin_dictionary("DICT_9X9_1").is_none());
    }

    #[test]
    fn first_marker_matches_its_printed_pattern() {
        // Id 0 as printed, black = 1, rows top to bottom.
        let rows = [[0, 1, 0, 0], [1, 0, 1, 0], [1, 1, 0, 0], [1, 1, 0, 1]];
        let mut code = 0u64;
        for (y, row) in rows.iter().enumerate() {
            for (x, &bit) in row.iter().enumerate() {
                code |= (bit as u64) << (y * 4 + x);
            }
        }
        let dict = builtin_dictionary(DICT_4X4_50).expect("builtin");
        assert_eq!(dict.codes[0], code);
    }

    #[test]
    fn codes_stay_apart_under_rotation() {
        let dict = builtin_dictionary(DICT_4X4_50).expect("builtin");
        let matcher = Matcher::new(dict.clone(), 1);
        for (id, &code) in dict.codes.iter().enumerate() {
            for rot in 0..4u8 {
                let observed = rotate_code_u64(code, 4, rot);
                let m = matcher.match_code(observed).expect("match");
                assert_eq!(m.id, id as u32);
                assert_eq!(m.hamming, 0);
            }
        }
    }
}
