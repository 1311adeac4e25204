//! # Rextend
//!
//! Extensible regular expressions on top of an ECMAScript-dialect engine
//! ([`regress`](https://crates.io/crates/regress)).
//!
//! Patterns are written in an augmented syntax (named groups, free spacing,
//! inline comments, dot-all, explicit capture, `\u{..}` escapes, Unicode
//! properties) and rewritten into native syntax by a registry of syntax
//! tokens. New tokens and flags can be registered at run time.
//!
//! ## Quick Start
//!
//! ```rust
//! use rextend::prelude::*;
//!
//! let date = Regex::new(r"(?<year>\d{4})-(?<month>\d{2})").unwrap();
//! let caps = date.captures("Date: 2026-02-12").unwrap();
//! assert_eq!(caps.name("year").unwrap().as_str(), "2026");
//! assert_eq!(caps.index(), 6);
//! ```
//!
//! Flags can be given as a string or through [`RegexBuilder`]:
//!
//! ```rust
//! use rextend::prelude::*;
//!
//! let re = Regex::builder(r"hello  # greeting")
//!     .free_spacing(true)
//!     .ignore_case(true)
//!     .build()
//!     .unwrap();
//! assert!(re.is_match("Hello World"));
//! ```
//!
//! ## Extending the Syntax
//!
//! ```rust
//! use rextend::prelude::*;
//!
//! let syntax = Syntax::new();
//! syntax
//!     .add_token(
//!         r"\\a",
//!         TokenOptions::new().scope(TokenScope::All),
//!         |_: &Captures<'_>, _: TokenScope, _: &str, _: &mut CompileContext| {
//!             Ok(r"\x07".to_string())
//!         },
//!     )
//!     .unwrap();
//! assert!(syntax.regex(r"\a", "").unwrap().is_match("\u{7}"));
//! ```
//!
//! ## Module Structure
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`syntax`] | Registries, caches and features (`Syntax`) |
//! | [`token`] | Token registration and matching |
//! | [`compiler`] | Augmented-to-native pattern translation |
//! | [`flags`] | Native flags and the flag registry |
//! | [`native`] | Adapter over the native engine |
//! | [`regex`] | `Regex`, `Match`, `Captures` |
//! | [`exec`] | Search, replace, split, escape |
//! | [`traverse`] | `for_each`, `match_chain`, `union` |
//! | [`compose`] | `build` from named subpatterns |
//! | [`recursive`] | Balanced delimiter matching |
//! | [`unicode`] | `\p{..}` property escapes |
//! | [`error`] | Error types |

pub mod compiler;
pub mod compose;
pub mod error;
pub mod exec;
pub mod flags;
pub mod native;
pub mod prelude;
pub mod recursive;
pub mod regex;
pub mod syntax;
pub mod token;
pub mod traverse;
pub mod unicode;

pub use compiler::{contextual_separator, CompiledPattern};
pub use compose::{build, Subpattern};
pub use error::{RegexError, SyntaxErrorKind};
pub use exec::{
    escape, match_all, match_one, replace, replace_each, search, split, test, ReplaceScope,
    ReplaceStep, Replacer, Search,
};
pub use flags::NativeFlags;
pub use recursive::{match_recursive, RecursiveMatch, RecursiveOptions, ValueNames};
pub use regex::{Captures, CapturesIter, FindIter, Match, Regex, RegexBuilder};
pub use syntax::{Features, Syntax};
pub use token::{token_handler, CompileContext, TokenHandler, TokenOptions, TokenScope};
pub use traverse::{for_each, match_chain, union, Backref, ChainLink, Conjunction};
pub use unicode::UnicodeProperty;
