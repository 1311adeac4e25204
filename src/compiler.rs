// compiler.rs - Augmented pattern to native pattern translation.
//
// Walks the pattern left to right. At each position the registered tokens
// are tried first; when none applies, one native token is copied through
// verbatim using a fixed grammar for the current scope. Also holds the
// built-in tokens every syntax context starts with.

use std::sync::Arc;

use crate::error::{RegexError, SyntaxErrorKind};
use crate::flags::{NativeFlags, PreparedFlags};
use crate::regex::Captures;
use crate::syntax::Features;
use crate::token::{
    run_tokens, token_handler, CompileContext, Token, TokenHandler, TokenOptions, TokenScope,
};

/// Upper bound on consecutive reparses at one position.
const MAX_REPARSE: usize = 256;

/// Native pattern plus the metadata needed to rebuild rich match results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPattern {
    /// Pattern in native syntax.
    pub pattern: String,
    /// Native flags derived from the augmented flags.
    pub flags: NativeFlags,
    /// One entry per capturing group; `None` when no group was named.
    pub capture_names: Option<Arc<[Option<String>]>>,
}

/// Translates a prepared pattern into native syntax.
pub(crate) fn compile_pattern(
    tokens: &[Token],
    prepared: PreparedFlags,
    features: Features,
) -> Result<CompiledPattern, RegexError> {
    let PreparedFlags { mut pattern, flags } = prepared;
    let mut ctx = CompileContext::new(features);
    let mut scope = TokenScope::Default;
    let mut output = String::with_capacity(pattern.len());
    let mut pos = 0;

    while pos < pattern.len() {
        let mut rounds = 0;
        let found = loop {
            match run_tokens(tokens, &pattern, &flags, pos, scope, &mut ctx)? {
                Some(m) if m.reparse => {
                    rounds += 1;
                    if rounds > MAX_REPARSE {
                        return Err(RegexError::Internal(format!(
                            "token reparse did not settle at offset {}",
                            pos
                        )));
                    }
                    pattern.replace_range(pos..pos + m.match_len, &m.output);
                }
                other => break other,
            }
        };

        match found {
            Some(m) => {
                output.push_str(&m.output);
                pos += if m.match_len > 0 {
                    m.match_len
                } else {
                    char_len_at(&pattern, pos)
                };
            }
            // A reparse may have consumed the rest of the pattern.
            None if pos >= pattern.len() => break,
            None => {
                let len = native_token_len(&pattern, pos, scope);
                let token = &pattern[pos..pos + len];
                if token == "[" && scope == TokenScope::Default {
                    scope = TokenScope::Class;
                } else if token == "]" && scope == TokenScope::Class {
                    scope = TokenScope::Default;
                }
                output.push_str(token);
                pos += len;
            }
        }
    }

    let mut native_flags = NativeFlags::from_chars(&flags);
    if flags.contains('A') {
        native_flags |= NativeFlags::UNICODE;
    }

    Ok(CompiledPattern {
        pattern: collapse_empty_groups(&output),
        flags: native_flags,
        capture_names: ctx.into_capture_names().map(Arc::from),
    })
}

fn char_len_at(pattern: &str, pos: usize) -> usize {
    pattern[pos..].chars().next().map_or(1, char::len_utf8)
}

/// Merges runs of the empty group `(?:)` into a single one.
pub(crate) fn collapse_empty_groups(source: &str) -> String {
    const EMPTY: &str = "(?:)";
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(i) = rest.find(EMPTY) {
        out.push_str(&rest[..i + EMPTY.len()]);
        rest = &rest[i + EMPTY.len()..];
        while let Some(after) = rest.strip_prefix(EMPTY) {
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

// ============================================================================
// Native fallback grammar
// ============================================================================

/// Length of the native token at `pos`: a multi-character escape, a group
/// opener, a lazy quantifier, a brace quantifier, or one character.
pub(crate) fn native_token_len(pattern: &str, pos: usize, scope: TokenScope) -> usize {
    let rest = &pattern[pos..];
    let bytes = rest.as_bytes();
    let single = char_len_at(pattern, pos);

    match bytes.first() {
        Some(b'\\') => 1 + escape_len(&rest[1..], scope),
        _ if scope == TokenScope::Class => single,
        Some(b'(') => {
            if rest.starts_with("(?<=") || rest.starts_with("(?<!") {
                4
            } else if rest.starts_with("(?:") || rest.starts_with("(?=") || rest.starts_with("(?!")
            {
                3
            } else {
                1
            }
        }
        Some(b'?' | b'*' | b'+') if bytes.get(1) == Some(&b'?') => 2,
        Some(b'{') => match brace_quantifier_len(rest) {
            Some(n) if rest.as_bytes().get(n) == Some(&b'?') => n + 1,
            Some(n) => n,
            None => 1,
        },
        _ => single,
    }
}

/// Length of an escape body following a backslash.
fn escape_len(body: &str, scope: TokenScope) -> usize {
    let bytes = body.as_bytes();
    let Some(&first) = bytes.first() else {
        return 0;
    };
    let octal_run = |from: usize, max: usize| {
        bytes[from..]
            .iter()
            .take(max)
            .take_while(|b| (b'0'..=b'7').contains(*b))
            .count()
    };

    match first {
        b'0' if scope == TokenScope::Default => match bytes.get(1) {
            Some(b'0'..=b'3') => 2 + octal_run(2, 2),
            Some(b'4'..=b'7') => 2 + octal_run(2, 1),
            _ => 1,
        },
        b'0'..=b'3' if scope == TokenScope::Class => 1 + octal_run(1, 2),
        b'4'..=b'7' if scope == TokenScope::Class => 1 + octal_run(1, 1),
        b'1'..=b'9' if scope == TokenScope::Default => {
            1 + bytes[1..].iter().take_while(|b| b.is_ascii_digit()).count()
        }
        b'x' if hex_run(&bytes[1..]) >= 2 => 3,
        b'u' if hex_run(&bytes[1..]) >= 4 => 5,
        b'u' if bytes.get(1) == Some(&b'{') => {
            let digits = hex_run(&bytes[2..]);
            if digits > 0 && bytes.get(2 + digits) == Some(&b'}') {
                3 + digits
            } else {
                1
            }
        }
        b'c' if bytes.get(1).is_some_and(u8::is_ascii_alphabetic) => 2,
        _ => body.chars().next().map_or(0, char::len_utf8),
    }
}

fn hex_run(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_hexdigit()).count()
}

/// Length of `{n}`, `{n,}` or `{n,m}` at the start of `text`.
fn brace_quantifier_len(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'{') {
        return None;
    }
    let mut i = 1;
    let min = bytes[i..].iter().take_while(|b| b.is_ascii_digit()).count();
    if min == 0 {
        return None;
    }
    i += min;
    if bytes.get(i) == Some(&b',') {
        i += 1;
        i += bytes[i..].iter().take_while(|b| b.is_ascii_digit()).count();
    }
    if bytes.get(i) == Some(&b'}') {
        Some(i + 1)
    } else {
        None
    }
}

// ============================================================================
// Token separator
// ============================================================================

/// Replacement for a removed comment or whitespace run: `(?:)` when the
/// removal would fuse the neighboring tokens, otherwise nothing.
pub fn contextual_separator(caps: &Captures<'_>, flags: &str) -> String {
    let input = caps.input();
    let range = caps.range();
    let before = &input[..range.start];
    let after = &input[range.end..];

    let delimiter = |c: char| matches!(c, '(' | ')' | '|');
    let boundary = range.start == 0
        || range.end >= input.len()
        || before.ends_with(delimiter)
        || after.starts_with(delimiter)
        || ["(?:", "(?=", "(?!", "(?<=", "(?<!"]
            .iter()
            .any(|opener| before.ends_with(*opener));

    if boundary || is_quantifier_next(after, flags) {
        String::new()
    } else {
        "(?:)".to_string()
    }
}

/// Whether a quantifier follows, skipping inline comments and, under flag
/// `x`, whitespace and line comments.
fn is_quantifier_next(after: &str, flags: &str) -> bool {
    let free_spacing = flags.contains('x');
    let mut rest = after;
    loop {
        let before = rest.len();
        if let Some(body) = rest.strip_prefix("(?#") {
            if let Some(end) = body.find(')') {
                rest = &body[end + 1..];
            }
        }
        if free_spacing {
            rest = rest.trim_start_matches(is_js_whitespace);
            if let Some(body) = rest.strip_prefix('#') {
                let end = body.find(|c| c == '#' || c == '\n').unwrap_or(body.len());
                rest = &body[end..];
            }
        }
        if rest.len() == before {
            break;
        }
    }
    rest.starts_with(|c| matches!(c, '?' | '*' | '+')) || brace_quantifier_len(rest).is_some()
}

fn is_js_whitespace(c: char) -> bool {
    c.is_whitespace() || c == '\u{FEFF}'
}

// ============================================================================
// Built-in tokens
// ============================================================================

fn syntax_error(kind: SyntaxErrorKind, message: String) -> RegexError {
    RegexError::syntax(kind, message)
}

/// Letter escapes that have no native meaning, plus incomplete `\c`, `\u`
/// and `\x` escapes. `\B` outside classes is the only one let through.
fn reserved_escape(
    caps: &Captures<'_>,
    scope: TokenScope,
    _: &str,
    _: &mut CompileContext,
) -> Result<String, RegexError> {
    if caps.text_of(1) == "B" && scope == TokenScope::Default {
        return Ok(caps.as_str().to_string());
    }
    Err(syntax_error(
        SyntaxErrorKind::InvalidEscape,
        format!("Invalid escape {}", caps.as_str()),
    ))
}

/// `\u{H..}` code point escapes.
fn code_point_escape(
    caps: &Captures<'_>,
    _: TokenScope,
    flags: &str,
    _: &mut CompileContext,
) -> Result<String, RegexError> {
    let code = u32::from_str_radix(caps.text_of(1), 16).unwrap_or(u32::MAX);
    if code > 0x10FFFF {
        return Err(syntax_error(
            SyntaxErrorKind::InvalidUnicodeEscape,
            format!("Invalid Unicode code point {}", caps.as_str()),
        ));
    }
    if code <= 0xFFFF {
        return Ok(format!("\\u{:04x}", code));
    }
    if flags.contains('u') {
        return Ok(caps.as_str().to_string());
    }
    Err(syntax_error(
        SyntaxErrorKind::InvalidUnicodeEscape,
        "Cannot use Unicode code point above \\u{FFFF} without flag u".to_string(),
    ))
}

/// `[]` never matches; `[^]` matches any character.
fn empty_class(
    caps: &Captures<'_>,
    _: TokenScope,
    _: &str,
    _: &mut CompileContext,
) -> Result<String, RegexError> {
    Ok(if caps.text_of(1).is_empty() {
        r"\b\B".to_string()
    } else {
        r"[\s\S]".to_string()
    })
}

fn unterminated_comment(
    caps: &Captures<'_>,
    _: TokenScope,
    _: &str,
    _: &mut CompileContext,
) -> Result<String, RegexError> {
    Err(syntax_error(
        SyntaxErrorKind::UnterminatedToken,
        format!("Unterminated comment {}", &caps.input()[caps.index()..]),
    ))
}

fn separator(
    caps: &Captures<'_>,
    _: TokenScope,
    flags: &str,
    _: &mut CompileContext,
) -> Result<String, RegexError> {
    Ok(contextual_separator(caps, flags))
}

fn dot_all(
    _: &Captures<'_>,
    _: TokenScope,
    _: &str,
    _: &mut CompileContext,
) -> Result<String, RegexError> {
    Ok(r"[\s\S]".to_string())
}

/// `\k<name>` and `\k<n>`.
fn named_backreference(
    caps: &Captures<'_>,
    _: TokenScope,
    _: &str,
    ctx: &mut CompileContext,
) -> Result<String, RegexError> {
    let name = caps.text_of(1);
    let index = if name.bytes().all(|b| b.is_ascii_digit()) {
        name.parse::<usize>().ok()
    } else {
        ctx.capture_index(name)
    };
    let index = match index {
        Some(i) if i > 0 && i <= ctx.captures_len() => i,
        _ => {
            return Err(syntax_error(
                SyntaxErrorKind::InvalidBackreference,
                format!("Backreference to undefined group {}", caps.as_str()),
            ))
        }
    };
    // Keep the reference apart from a following literal digit.
    let digit_next = caps.input()[caps.end()..]
        .bytes()
        .next()
        .is_some_and(|b| b.is_ascii_digit());
    Ok(format!("\\{}{}", index, if digit_next { "(?:)" } else { "" }))
}

/// `\n` backreferences and octal escapes. Only `\0` and references to
/// already opened groups outside classes are allowed.
fn numbered_backreference(
    caps: &Captures<'_>,
    scope: TokenScope,
    _: &str,
    ctx: &mut CompileContext,
) -> Result<String, RegexError> {
    let digits = caps.text_of(1);
    let is_reference = scope == TokenScope::Default
        && !digits.starts_with('0')
        && digits
            .parse::<usize>()
            .is_ok_and(|n| n <= ctx.captures_len());
    if !is_reference && digits != "0" {
        return Err(syntax_error(
            SyntaxErrorKind::InvalidOctalOrBackreference,
            format!(
                "Cannot use octal escape or backreference to undefined group {}",
                caps.as_str()
            ),
        ));
    }
    Ok(caps.as_str().to_string())
}

/// `(?<name>` and `(?P<name>`.
fn named_group(
    caps: &Captures<'_>,
    _: TokenScope,
    _: &str,
    ctx: &mut CompileContext,
) -> Result<String, RegexError> {
    let name = caps.text_of(1);
    if name.bytes().all(|b| b.is_ascii_digit()) {
        return Err(syntax_error(
            SyntaxErrorKind::IntegerCaptureName,
            format!("Cannot use integer as capture name {}", caps.as_str()),
        ));
    }
    if !ctx.features().contains(Features::NAMESPACING) && RESERVED_NAMES.contains(&name) {
        return Err(syntax_error(
            SyntaxErrorKind::ReservedCaptureName,
            format!("Cannot use reserved word as capture name {}", caps.as_str()),
        ));
    }
    if ctx.capture_index(name).is_some() {
        return Err(syntax_error(
            SyntaxErrorKind::DuplicateCaptureName,
            format!("Cannot use same name for multiple groups {}", caps.as_str()),
        ));
    }
    ctx.push_capture(Some(name.to_string()));
    Ok("(".to_string())
}

/// Names that collide with match metadata unless groups are namespaced.
const RESERVED_NAMES: &[&str] = &["length", "__proto__"];

/// Plain `(`. Under flag `n` it becomes non-capturing.
fn capturing_group(
    _: &Captures<'_>,
    _: TokenScope,
    flags: &str,
    ctx: &mut CompileContext,
) -> Result<String, RegexError> {
    if flags.contains('n') {
        return Ok("(?:".to_string());
    }
    ctx.push_capture(None);
    Ok("(".to_string())
}

/// Built-in tokens in registration order (later entries take precedence).
pub(crate) fn builtin_tokens() -> Vec<(&'static str, TokenOptions, TokenHandler)> {
    vec![
        (
            r"\\([ABCE-RTUVXYZaeg-mopqyz]|c(?![A-Za-z])|u(?![\dA-Fa-f]{4}|\{[\dA-Fa-f]+\})|x(?![\dA-Fa-f]{2}))",
            TokenOptions::new().scope(TokenScope::All).lead_char('\\'),
            token_handler(reserved_escape),
        ),
        (
            r"\\u\{([\dA-Fa-f]+)\}",
            TokenOptions::new().scope(TokenScope::All).lead_char('\\'),
            token_handler(code_point_escape),
        ),
        (
            r"\[(\^?)\]",
            TokenOptions::new().lead_char('['),
            token_handler(empty_class),
        ),
        (
            r"\(\?#",
            TokenOptions::new().lead_char('('),
            token_handler(unterminated_comment),
        ),
        (
            r"\(\?#[^)]*\)",
            TokenOptions::new().lead_char('('),
            token_handler(separator),
        ),
        (
            r"\s+|#[^\n]*\n?",
            TokenOptions::new().flag('x'),
            token_handler(separator),
        ),
        (
            r"\.",
            TokenOptions::new().flag('s').lead_char('.'),
            token_handler(dot_all),
        ),
        (
            r"\\k<([\w$]+)>",
            TokenOptions::new().lead_char('\\'),
            token_handler(named_backreference),
        ),
        (
            r"\\(\d+)",
            TokenOptions::new().scope(TokenScope::All).lead_char('\\'),
            token_handler(numbered_backreference),
        ),
        (
            r"\(\?P?<([\w$]+)>",
            TokenOptions::new().lead_char('('),
            token_handler(named_group),
        ),
        (
            r"\((?!\?)",
            TokenOptions::new().optional_flags("n").lead_char('('),
            token_handler(capturing_group),
        ),
    ]
}
