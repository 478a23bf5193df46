//! # trackforge-rules
//!
//! The condition expression language used by trackforge policies.
//!
//! ## Overview
//!
//! - [`tokenize`]: source text to a [`Token`] stream.
//! - [`parse_expression`]: tokens to a typed [`Condition`] tree.
//! - [`evaluate`]: a condition against an [`EvaluationContext`], yielding the
//!   outcome plus a readable trace.
//! - `Display` on [`Condition`]: canonical text that parses back to the same tree.
//!
//! ```
//! use trackforge_common::{Track, TrackType};
//! use trackforge_rules::{evaluate, parse_expression, EvaluationContext};
//!
//! let condition = parse_expression("count(subtitle) >= 3").unwrap();
//! let tracks = vec![
//!     Track::new(0, TrackType::Subtitle),
//!     Track::new(1, TrackType::Subtitle),
//! ];
//! let (result, trace) = evaluate(&condition, &EvaluationContext::new(&tracks));
//! assert!(!result);
//! assert_eq!(trace, "count(subtitle) >= 3 → False (count=2)");
//! ```

pub mod analysis;
pub mod condition;
pub mod error;
pub mod evaluate;
pub mod lexer;
pub mod parser;
pub mod pattern;
pub mod serialize;

pub use analysis::{
    ClassificationResults, LanguageAnalysis, LanguageClassification, LanguageResults,
    LanguageShare, OriginalDubbedStatus, TrackClassification,
};
pub use condition::{
    ClassificationCondition, Comparison, ComparisonOp, Condition, ContainerMetadataCondition,
    CountCondition, ExistsCondition, MetadataOp, MetadataValue, MultiLanguageCondition,
    NumericFilter, PluginMetadataCondition, StringMatch, TitleMatch, TrackFilters,
};
pub use error::{ExpressionError, LexError, ParseError, Result};
pub use evaluate::{evaluate, matches_track, EvaluationContext};
pub use lexer::{tokenize, Token, TokenKind};
pub use parser::{parse_expression, Function, MAX_DEPTH};
pub use pattern::{CommentaryPatterns, PatternCache, TitlePattern, DEFAULT_COMMENTARY_PATTERNS};
