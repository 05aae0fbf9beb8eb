//! Square fiducial markers for plane calibration.
//!
//! Dictionaries are supplied at runtime (for example loaded from JSON), so
//! any ArUco-style code set with at most 8×8 inner bits can be used. The
//! detector binarizes a frame, keeps convex quadrilateral outlines, reads
//! their bit grids and matches them against the dictionary in all four
//! rotations. [`builtins`] embeds the corner ids of `DICT_4X4_50` for
//! setups that use the usual printed markers.

pub mod builtins;
mod decode;
mod detect;
mod dictionary;
mod matcher;
mod quads;
mod threshold;

pub use builtins::builtin_dictionary;
pub use detect::{MarkerDetectParams, MarkerDetection, MarkerDetector};
pub use dictionary::{Dictionary, DictionaryError};
pub use matcher::{rotate_code_u64, Match, Matcher};
pub use quads::{find_quads, Quad};
