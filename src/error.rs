// error.rs - Error types for pattern compilation and the matching helpers.
//
// Groups every failure the crate can report into a handful of semantic
// variants. Syntax errors additionally carry a kind so callers can branch on
// the category without parsing messages.

use std::fmt;

/// Category of a [`RegexError::Syntax`] error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxErrorKind {
    /// A flag character that was never registered.
    UnknownFlag,
    /// The same flag given twice in the flag string.
    DuplicateFlag,
    /// A leading mode modifier tried to set `g` or `y`.
    ReservedFlagInModifier,
    /// A token that opened but never closed, e.g. `(?#...`.
    UnterminatedToken,
    /// A reserved letter escape such as `\a` or `\e`.
    InvalidEscape,
    /// A backreference to a group that does not exist.
    InvalidBackreference,
    /// Two capturing groups with the same name.
    DuplicateCaptureName,
    /// A capture name that collides with match metadata.
    ReservedCaptureName,
    /// A capture name made only of digits.
    IntegerCaptureName,
    /// A `\u{...}` escape out of range or unusable without flag `u`.
    InvalidUnicodeEscape,
    /// An octal escape or a backreference to an unopened group.
    InvalidOctalOrBackreference,
    /// A `$` token in replacement text that has no meaning.
    InvalidReplacementToken,
    /// A malformed or unknown `\p{...}` property escape.
    UnicodeProperty,
    /// The native engine rejected the generated pattern.
    Native,
}

impl SyntaxErrorKind {
    /// Short description of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyntaxErrorKind::UnknownFlag => "unknown flag",
            SyntaxErrorKind::DuplicateFlag => "duplicate flag",
            SyntaxErrorKind::ReservedFlagInModifier => "reserved flag in mode modifier",
            SyntaxErrorKind::UnterminatedToken => "unterminated token",
            SyntaxErrorKind::InvalidEscape => "invalid escape",
            SyntaxErrorKind::InvalidBackreference => "invalid backreference",
            SyntaxErrorKind::DuplicateCaptureName => "duplicate capture name",
            SyntaxErrorKind::ReservedCaptureName => "reserved capture name",
            SyntaxErrorKind::IntegerCaptureName => "integer capture name",
            SyntaxErrorKind::InvalidUnicodeEscape => "invalid unicode escape",
            SyntaxErrorKind::InvalidOctalOrBackreference => "invalid octal or backreference",
            SyntaxErrorKind::InvalidReplacementToken => "invalid replacement token",
            SyntaxErrorKind::UnicodeProperty => "invalid unicode property",
            SyntaxErrorKind::Native => "rejected by native engine",
        }
    }
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for pattern compilation, registration and matching helpers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexError {
    /// Malformed augmented pattern, flag string or replacement text.
    Syntax {
        kind: SyntaxErrorKind,
        message: String,
    },
    /// Wrong argument shape, e.g. an empty pattern list.
    Type(String),
    /// A group or subpattern reference that does not resolve.
    Reference(String),
    /// A flag name that is not a single `[A-Za-z0-9_$]` character.
    InvalidFlag(String),
    /// Unicode property data without a name or without character data.
    InvalidUnicodeData(String),
    /// `match_recursive` found a delimiter with no partner.
    UnbalancedDelimiter,
    /// Internal invariant violated (should not occur with well-behaved tokens).
    Internal(String),
}

impl RegexError {
    /// Syntax error of the given category, for use in token handlers.
    pub fn syntax(kind: SyntaxErrorKind, message: impl Into<String>) -> Self {
        RegexError::Syntax {
            kind,
            message: message.into(),
        }
    }

    /// Returns the syntax error category, if this is a syntax error.
    pub fn syntax_kind(&self) -> Option<SyntaxErrorKind> {
        match self {
            RegexError::Syntax { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns `true` for [`RegexError::Syntax`].
    pub fn is_syntax(&self) -> bool {
        matches!(self, RegexError::Syntax { .. })
    }
}

impl fmt::Display for RegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegexError::Syntax { message, .. } => write!(f, "syntax error: {}", message),
            RegexError::Type(message) => write!(f, "type error: {}", message),
            RegexError::Reference(message) => write!(f, "reference error: {}", message),
            RegexError::InvalidFlag(flag) => write!(
                f,
                "flag must be a single character A-Za-z0-9_$, got {:?}",
                flag
            ),
            RegexError::InvalidUnicodeData(message) => {
                write!(f, "invalid unicode data: {}", message)
            }
            RegexError::UnbalancedDelimiter => write!(f, "unbalanced delimiter found in string"),
            RegexError::Internal(message) => write!(f, "internal error: {}", message),
        }
    }
}

impl std::error::Error for RegexError {}

impl From<regress::Error> for RegexError {
    fn from(err: regress::Error) -> Self {
        RegexError::syntax(SyntaxErrorKind::Native, err.to_string())
    }
}
