//! Trackforge-Common: Shared types, lookup tables, and utilities.
//!
//! This crate provides common functionality used across trackforge:
//!
//! - **Track Model**: `Track`, `TrackType`, and the `FileSnapshot` a metadata
//!   provider hands to the workflow
//! - **Languages**: ISO 639 normalization and standard-agnostic matching
//! - **Media Tables**: codec alias groups and container name normalization
//! - **Units**: file-size, duration, and resolution-label parsing
//! - **Typed IDs**: UUID wrappers for workflow runs and stats records
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use trackforge_common::{languages_match, parse_file_size, TrackType};
//!
//! assert!(languages_match(Some("de"), Some("ger")));
//! assert_eq!(parse_file_size("1.5GB").unwrap(), 1_610_612_736);
//! assert_eq!("audio".parse::<TrackType>().unwrap(), TrackType::Audio);
//! ```

pub mod error;
pub mod ids;
pub mod language;
pub mod media;
pub mod types;
pub mod units;

pub use error::{Error, Result};
pub use ids::*;
pub use language::{languages_match, normalize_language};
pub use media::{codecs_match, normalize_container_format, video_codec_matches};
pub use types::*;
pub use units::{
    format_percentage, parse_duration, parse_file_size, resolution_height, resolution_label,
};
