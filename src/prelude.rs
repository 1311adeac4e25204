// prelude.rs - Convenient re-exports for everyday use.
//
//! # Prelude
//!
//! ```
//! use rextend::prelude::*;
//!
//! let re = Regex::new(r"(?<n>\d+)").unwrap();
//! let out = replace("answer: 42", &re, "<$<n>>", None).unwrap();
//! assert_eq!(out, "answer: <42>");
//! ```

pub use crate::error::RegexError;
pub use crate::exec::{replace, split, ReplaceScope, Search};
pub use crate::regex::{Captures, CapturesIter, FindIter, Match, Regex, RegexBuilder};
pub use crate::syntax::{Features, Syntax};
pub use crate::token::{CompileContext, TokenOptions, TokenScope};
