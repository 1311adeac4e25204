// exec.rs - Search driver and the string helpers built on it.
//
// Every search runs through search_at, which picks the cached global or
// fake-sticky variant, corrects engine quirks, and attaches capture names.
// The helpers (replace, split, match) only ever pass explicit positions, so
// a caller's cursor is touched only where the documented semantics say so.

use memchr::memchr;

use crate::error::{RegexError, SyntaxErrorKind};
use crate::native::{correct_nonparticipating, quirks};
use crate::regex::{Captures, Regex, VariantTag};

// ============================================================================
// Search
// ============================================================================

/// Searches `text` from byte offset `pos`.
///
/// With `sticky` set to `Some(true)` the match must start exactly at `pos`;
/// `None` follows the regex's own sticky flag. The regex cursor is not read,
/// but a global regex gets it updated to the match end (or 0 on failure).
///
/// # Examples
///
/// ```
/// use rextend::{search, Regex};
///
/// let re = Regex::new(r"\d").unwrap();
/// assert_eq!(search("a1b2", &re, 2, None).unwrap().as_str(), "2");
/// assert!(search("a1b2", &re, 2, Some(true)).is_none());
/// ```
pub fn search<'t>(
    text: &'t str,
    regex: &Regex,
    pos: usize,
    sticky: Option<bool>,
) -> Option<Captures<'t>> {
    let sticky = sticky.unwrap_or_else(|| regex.is_sticky());
    let found = search_at(text, regex, pos, sticky);
    if regex.is_global() {
        regex.set_last_index(found.as_ref().map_or(0, |caps| caps.end()));
    }
    found
}

/// Like [`search`] but only reports whether a match was found.
pub fn test(text: &str, regex: &Regex, pos: usize, sticky: Option<bool>) -> bool {
    search(text, regex, pos, sticky).is_some()
}

/// Search that never touches the cursor.
pub(crate) fn search_at<'t>(
    text: &'t str,
    regex: &Regex,
    pos: usize,
    sticky: bool,
) -> Option<Captures<'t>> {
    if pos > text.len() {
        return None;
    }
    let pos = ceil_char_boundary(text, pos);

    let mut slots = if sticky {
        let variant = regex.variant(VariantTag::FakeSticky);
        let mut slots = variant.native_regex().search_from(text, pos)?;
        if regex.has_fake_sticky() {
            // The trailing empty alternative participates only when the
            // real pattern failed at `pos`.
            match slots.pop() {
                Some(None) => {}
                _ => return None,
            }
        } else if slots.first()?.as_ref()?.start != pos {
            return None;
        }
        slots
    } else {
        regex
            .variant(VariantTag::Global)
            .native_regex()
            .search_from(text, pos)?
    };

    if quirks().empty_nonparticipating && slots.len() > 1 {
        let index = slots.first()?.as_ref()?.start;
        if let Some(reference) = regex.native_regex().search_from(&text[index..], 0) {
            correct_nonparticipating(&mut slots, &reference);
        }
    }

    Some(Captures::new(
        text,
        slots,
        regex.capture_names_arc(),
        regex.is_namespaced(),
    ))
}

fn ceil_char_boundary(text: &str, mut pos: usize) -> usize {
    while !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

/// Offset just past the character starting at `pos`, or `pos + 1` at the
/// end of `text`.
pub(crate) fn next_char_boundary(text: &str, pos: usize) -> usize {
    text[pos..]
        .chars()
        .next()
        .map_or(pos + 1, |c| pos + c.len_utf8())
}

// ============================================================================
// Escape
// ============================================================================

fn is_syntax_char(c: char) -> bool {
    matches!(
        c,
        '^' | '$' | '\\' | '.' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '/'
    )
}

/// Escapes every character that is special anywhere in a pattern, so the
/// result matches `text` literally both inside and outside a class.
///
/// # Examples
///
/// ```
/// use rextend::escape;
///
/// assert_eq!(escape("Escaped? <.>"), r"Escaped\?\x20<\.>");
/// ```
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_syntax_char(c) {
            out.push('\\');
            out.push(c);
        } else if matches!(c, '-' | ',' | '#') || c.is_whitespace() || c == '\u{FEFF}' {
            let cp = c as u32;
            if cp <= 0xFF {
                out.push_str(&format!("\\x{:02x}", cp));
            } else {
                out.push_str(&format!("\\u{:04x}", cp));
            }
        } else {
            out.push(c);
        }
    }
    out
}

// ============================================================================
// Search argument
// ============================================================================

/// What to look for: a compiled regex, or a string matched literally.
#[derive(Debug, Clone, Copy)]
pub enum Search<'a> {
    Literal(&'a str),
    Regex(&'a Regex),
}

impl<'a> From<&'a str> for Search<'a> {
    fn from(text: &'a str) -> Self {
        Search::Literal(text)
    }
}

impl<'a> From<&'a String> for Search<'a> {
    fn from(text: &'a String) -> Self {
        Search::Literal(text.as_str())
    }
}

impl<'a> From<&'a Regex> for Search<'a> {
    fn from(regex: &'a Regex) -> Self {
        Search::Regex(regex)
    }
}

// ============================================================================
// Replace
// ============================================================================

/// Which matches [`replace`] rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceScope {
    One,
    All,
}

/// Produces replacement text for one match.
///
/// Implemented for replacement templates (`&str`, `String`) and for
/// closures `FnMut(&Captures) -> impl AsRef<str>`.
pub trait Replacer {
    fn replace_append(&mut self, caps: &Captures<'_>, dst: &mut String) -> Result<(), RegexError>;
}

impl Replacer for &str {
    fn replace_append(&mut self, caps: &Captures<'_>, dst: &mut String) -> Result<(), RegexError> {
        expand_template(self, caps, dst)
    }
}

impl Replacer for &String {
    fn replace_append(&mut self, caps: &Captures<'_>, dst: &mut String) -> Result<(), RegexError> {
        expand_template(self, caps, dst)
    }
}

impl Replacer for String {
    fn replace_append(&mut self, caps: &Captures<'_>, dst: &mut String) -> Result<(), RegexError> {
        expand_template(self, caps, dst)
    }
}

impl<F, T> Replacer for F
where
    F: FnMut(&Captures<'_>) -> T,
    T: AsRef<str>,
{
    fn replace_append(&mut self, caps: &Captures<'_>, dst: &mut String) -> Result<(), RegexError> {
        dst.push_str((*self)(caps).as_ref());
        Ok(())
    }
}

/// Replaces matches of `search` in `text`.
///
/// With `scope` of `None`, a regex search replaces every match if it is
/// global and only the first otherwise; a literal search replaces the first
/// occurrence. Replacement templates understand `$$`, `$&`, `$0`, `` $` ``,
/// `$'`, `$n`, `$nn`, `${name}` and `$<name>`.
///
/// # Examples
///
/// ```
/// use rextend::{replace, Regex};
///
/// let name = Regex::new(r"(?<first>\w+) (?<last>\w+)").unwrap();
/// let out = replace("John Smith", &name, "$<last>, $<first>", None).unwrap();
/// assert_eq!(out, "Smith, John");
/// ```
pub fn replace<'a, R: Replacer>(
    text: &str,
    search: impl Into<Search<'a>>,
    mut replacement: R,
    scope: Option<ReplaceScope>,
) -> Result<String, RegexError> {
    replace_with(text, search.into(), &mut replacement, scope)
}

fn replace_with(
    text: &str,
    search: Search<'_>,
    replacement: &mut dyn Replacer,
    scope: Option<ReplaceScope>,
) -> Result<String, RegexError> {
    let literal;
    let (regex, global) = match search {
        Search::Regex(regex) => {
            let global = match scope {
                Some(scope) => scope == ReplaceScope::All,
                None => regex.is_global(),
            };
            (regex, global)
        }
        Search::Literal(needle) => {
            literal = Regex::native(&escape(needle), "")?;
            (&literal, scope == Some(ReplaceScope::All))
        }
    };

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut pos = 0;
    while let Some(caps) = search_at(text, regex, pos, regex.is_sticky()) {
        let range = caps.range();
        out.push_str(&text[last..range.start]);
        replacement.replace_append(&caps, &mut out)?;
        last = range.end;
        if !global {
            break;
        }
        pos = if range.is_empty() {
            next_char_boundary(text, range.end)
        } else {
            range.end
        };
    }
    out.push_str(&text[last..]);

    if let Search::Regex(regex) = search {
        if regex.is_global() {
            regex.set_last_index(0);
        }
    }
    Ok(out)
}

/// One step of [`replace_each`].
pub struct ReplaceStep<'a> {
    search: Search<'a>,
    replacement: Box<dyn Replacer + 'a>,
    scope: Option<ReplaceScope>,
}

impl<'a> ReplaceStep<'a> {
    pub fn new(search: impl Into<Search<'a>>, replacement: impl Replacer + 'a) -> Self {
        ReplaceStep {
            search: search.into(),
            replacement: Box::new(replacement),
            scope: None,
        }
    }

    pub fn scope(mut self, scope: ReplaceScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// Applies several replacements in order, each on the previous result.
///
/// # Examples
///
/// ```
/// use rextend::{replace_each, Regex, ReplaceScope, ReplaceStep};
///
/// let digit = Regex::new(r"\d").unwrap();
/// let out = replace_each(
///     "a1b2",
///     vec![
///         ReplaceStep::new(&digit, "#").scope(ReplaceScope::All),
///         ReplaceStep::new("a", "A"),
///     ],
/// )
/// .unwrap();
/// assert_eq!(out, "A#b#");
/// ```
pub fn replace_each<'a>(
    text: &str,
    steps: impl IntoIterator<Item = ReplaceStep<'a>>,
) -> Result<String, RegexError> {
    let mut current = text.to_string();
    for mut step in steps {
        current = replace_with(&current, step.search, step.replacement.as_mut(), step.scope)?;
    }
    Ok(current)
}

/// Expands a replacement template for one match into `dst`.
pub(crate) fn expand_template(
    template: &str,
    caps: &Captures<'_>,
    dst: &mut String,
) -> Result<(), RegexError> {
    let bytes = template.as_bytes();
    let mut i = 0;
    while let Some(offset) = memchr(b'$', &bytes[i..]) {
        let at = i + offset;
        dst.push_str(&template[i..at]);
        let consumed = expand_token(&template[at + 1..], caps, dst)?;
        i = at + 1 + consumed;
    }
    dst.push_str(&template[i..]);
    Ok(())
}

/// Expands the token after one `$`. Returns the bytes consumed after it.
fn expand_token(rest: &str, caps: &Captures<'_>, dst: &mut String) -> Result<usize, RegexError> {
    let groups = caps.len().saturating_sub(1);

    if let Some((name, len)) = bracketed_name(rest) {
        let index = match parse_group_number(name) {
            Some(n) if n <= groups => Some(n),
            _ => caps.group_index(name),
        };
        return match index {
            Some(n) => {
                dst.push_str(caps.text_of(n));
                Ok(len)
            }
            None => Err(RegexError::syntax(
                SyntaxErrorKind::InvalidBackreference,
                format!("Backreference to undefined group {}", &rest[..len]),
            )),
        };
    }

    let Some(c) = rest.chars().next() else {
        // A lone trailing `$` stays literal.
        dst.push('$');
        return Ok(0);
    };

    match c {
        '$' => dst.push('$'),
        '&' => dst.push_str(caps.as_str()),
        '`' => dst.push_str(&caps.input()[..caps.index()]),
        '\'' => dst.push_str(&caps.input()[caps.end()..]),
        '0'..='9' => {
            let digits = rest
                .bytes()
                .take(2)
                .take_while(u8::is_ascii_digit)
                .count();
            let n = parse_group_number(&rest[..digits]).unwrap_or(usize::MAX);
            if n == 0 {
                dst.push_str(caps.as_str());
            } else if n <= groups {
                dst.push_str(caps.text_of(n));
            } else {
                return Err(RegexError::syntax(
                    SyntaxErrorKind::InvalidBackreference,
                    format!("Backreference to undefined group ${}", &rest[..digits]),
                ));
            }
            return Ok(digits);
        }
        other => {
            return Err(RegexError::syntax(
                SyntaxErrorKind::InvalidReplacementToken,
                format!("Invalid token ${}", other),
            ))
        }
    }
    Ok(c.len_utf8())
}

/// Parses `{name}` or `<name>` at the start of `rest`, returning the name
/// and the length consumed including the brackets.
fn bracketed_name(rest: &str) -> Option<(&str, usize)> {
    let close = match rest.as_bytes().first()? {
        b'{' => '}',
        b'<' => '>',
        _ => return None,
    };
    let body = &rest[1..];
    let len = body
        .find(|c: char| !is_name_char(c))
        .unwrap_or(body.len());
    if len == 0 || !body[len..].starts_with(close) {
        return None;
    }
    Some((&body[..len], len + 2))
}

pub(crate) fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn parse_group_number(digits: &str) -> Option<usize> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(digits.parse::<usize>().unwrap_or(usize::MAX))
}

// ============================================================================
// Split
// ============================================================================

/// Splits `text` around matches of `separator`.
///
/// Captured groups of a regex separator are spliced into the output, with
/// non-participating groups as `""`. At most `limit` pieces are returned.
///
/// # Examples
///
/// ```
/// use rextend::{split, Regex};
///
/// let sep = Regex::with_flags(r"([a-z]+)(\d+)", "i").unwrap();
/// assert_eq!(split("..word1..", &sep, None), vec!["..", "word", "1", ".."]);
/// assert_eq!(split("a,b,c", ",", Some(2)), vec!["a", "b"]);
/// ```
pub fn split<'t, 'a>(
    text: &'t str,
    separator: impl Into<Search<'a>>,
    limit: Option<usize>,
) -> Vec<&'t str> {
    let limit = limit.unwrap_or(usize::MAX);
    let regex = match separator.into() {
        Search::Literal(sep) => {
            let pieces: Vec<&'t str> = if sep.is_empty() {
                text.char_indices()
                    .map(|(i, c)| &text[i..i + c.len_utf8()])
                    .take(limit)
                    .collect()
            } else {
                text.split(sep).take(limit).collect()
            };
            return pieces;
        }
        Search::Regex(regex) => regex,
    };

    let mut output = Vec::new();
    let mut last_last_index = 0;
    let mut last_length = 0;
    for caps in regex.find_iter(text) {
        let range = caps.range();
        if range.end > last_last_index {
            output.push(&text[last_last_index..range.start]);
            if caps.len() > 1 && range.start < text.len() {
                output.extend((1..caps.len()).map(|i| caps.text_of(i)));
            }
            last_length = range.len();
            last_last_index = range.end;
        }
    }

    if last_last_index == text.len() {
        if search_at("", regex, 0, false).is_none() || last_length > 0 {
            output.push("");
        }
    } else {
        output.push(&text[last_last_index..]);
    }
    output.truncate(limit);
    output
}

// ============================================================================
// Match
// ============================================================================

/// First match of `regex` in `text`, ignoring the global flag.
pub fn match_one<'t>(text: &'t str, regex: &Regex) -> Option<&'t str> {
    let found = search_at(text, regex, 0, regex.is_sticky());
    if regex.is_global() {
        regex.set_last_index(found.as_ref().map_or(0, |caps| caps.end()));
    }
    found.map(|caps| caps.as_str())
}

/// Every match of `regex` in `text`, whatever its global flag.
///
/// # Examples
///
/// ```
/// use rextend::{match_all, Regex};
///
/// let re = Regex::new(r"\d+").unwrap();
/// assert_eq!(match_all("1 22 333", &re), vec!["1", "22", "333"]);
/// ```
pub fn match_all<'t>(text: &'t str, regex: &Regex) -> Vec<&'t str> {
    let found = regex.find_iter(text).map(|caps| caps.as_str()).collect();
    if regex.is_global() {
        regex.set_last_index(0);
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn re(pattern: &str, flags: &str) -> Regex {
        Regex::with_flags(pattern, flags).unwrap()
    }

    // === search ===

    #[test]
    fn search_from_position() {
        let r = re(r"\d", "");
        let caps = search("a1b2", &r, 2, None).unwrap();
        assert_eq!(caps.index(), 3);
        assert!(search("a1b2", &r, 5, None).is_none());
    }

    #[test]
    fn sticky_search_requires_match_at_position() {
        let r = re(r"\d", "");
        assert!(search("a1b2", &r, 0, Some(true)).is_none());
        assert_eq!(search("a1b2", &r, 1, Some(true)).unwrap().as_str(), "1");
    }

    #[test]
    fn sticky_flag_is_default() {
        let r = re("b", "y");
        assert!(search("ab", &r, 0, None).is_none());
        assert!(search("ab", &r, 0, Some(false)).is_some());
    }

    #[test]
    fn search_updates_cursor_of_global_only() {
        let g = re("b", "g");
        search("abc", &g, 0, None);
        assert_eq!(g.last_index(), 2);
        search("abc", &g, 2, None);
        assert_eq!(g.last_index(), 0);

        let plain = re("b", "");
        plain.set_last_index(7);
        search("abc", &plain, 0, None);
        assert_eq!(plain.last_index(), 7);
    }

    #[test]
    fn search_names_groups() {
        let r = re(r"(?<n>\d+)", "");
        let caps = search("ab12", &r, 0, None).unwrap();
        assert_eq!(caps.name("n").unwrap().as_str(), "12");
    }

    #[test]
    fn test_helper() {
        let r = re("c", "");
        assert!(test("abc", &r, 0, None));
        assert!(!test("abc", &r, 0, Some(true)));
    }

    // === escape ===

    #[test]
    fn escape_syntax_and_punctuation() {
        assert_eq!(escape("a.b*c"), r"a\.b\*c");
        assert_eq!(escape("[x]-{y}"), r"\[x\]\x2d\{y\}");
        assert_eq!(escape("a b#c,d"), r"a\x20b\x23c\x2cd");
        assert_eq!(escape("\u{3000}"), r"\u3000");
    }

    #[test]
    fn escaped_text_matches_itself() {
        let text = "Escaped? <.> (1+1) $5 [a-z] ^{x}|#, \\ end";
        let r = Regex::native(&escape(text), "").unwrap();
        let caps = r.captures(text).unwrap();
        assert_eq!(caps.as_str(), text);
    }

    // === replace ===

    #[test]
    fn replace_named_groups() {
        let r = re(r"(?<first>\w+) (?<last>\w+)", "");
        assert_eq!(
            replace("John Smith", &r, "$<last>, $<first>", None).unwrap(),
            "Smith, John"
        );
        assert_eq!(
            replace("John Smith", &r, "${last}, ${first}", None).unwrap(),
            "Smith, John"
        );
    }

    #[test]
    fn replace_special_tokens() {
        let r = re("b(c)?", "");
        assert_eq!(replace("abd", &r, "[$`|$&|$'|$1|$$]", None).unwrap(), "a[a|b|d||$]d");
        assert_eq!(replace("abc", &r, "$0$00", None).unwrap(), "abcbc");
        assert_eq!(replace("abc", &r, "x$", None).unwrap(), "ax$");
    }

    #[test]
    fn replace_numbered_bracket_takes_group() {
        let r = re("(a)(b)", "");
        assert_eq!(replace("ab", &r, "${2}${1}", None).unwrap(), "ba");
        assert_eq!(replace("ab", &r, "$<0>", None).unwrap(), "ab");
    }

    #[test]
    fn replace_two_digit_reference_splits() {
        let r = re("(a)", "");
        // Two digits are always taken together.
        let err = replace("a", &r, "$10", None).unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::InvalidBackreference));
        assert_eq!(replace("a", &r, "$01", None).unwrap(), "a");
    }

    #[test]
    fn replace_errors() {
        let r = re("(a)", "");
        let err = replace("a", &r, "$2", None).unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::InvalidBackreference));
        let err = replace("a", &r, "${nope}", None).unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::InvalidBackreference));
        let err = replace("a", &r, "$x", None).unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::InvalidReplacementToken));
        let err = replace("a", &r, "${}", None).unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::InvalidReplacementToken));
    }

    #[test]
    fn replace_scope() {
        let r = re("a", "");
        assert_eq!(replace("aaa", &r, "b", None).unwrap(), "baa");
        assert_eq!(replace("aaa", &r, "b", Some(ReplaceScope::All)).unwrap(), "bbb");
        let g = re("a", "g");
        assert_eq!(replace("aaa", &g, "b", None).unwrap(), "bbb");
        assert_eq!(replace("aaa", &g, "b", Some(ReplaceScope::One)).unwrap(), "baa");
    }

    #[test]
    fn replace_resets_global_cursor() {
        let g = re("a", "g");
        g.set_last_index(2);
        replace("aaa", &g, "b", None).unwrap();
        assert_eq!(g.last_index(), 0);
    }

    #[test]
    fn replace_literal_search() {
        assert_eq!(replace("a.b.c", ".", "-", None).unwrap(), "a-b.c");
        assert_eq!(
            replace("a.b.c", ".", "-", Some(ReplaceScope::All)).unwrap(),
            "a-b-c"
        );
        assert_eq!(replace("x+y", "+", "[$&]", None).unwrap(), "x[+]y");
    }

    #[test]
    fn replace_empty_matches() {
        let r = re("", "g");
        assert_eq!(replace("abc", &r, "-", None).unwrap(), "-a-b-c-");
    }

    #[test]
    fn replace_with_closure() {
        let r = re(r"(?<n>\d+)", "g");
        let out = replace("a1b22", &r, |caps: &Captures<'_>| {
            let n: usize = caps.name("n").map_or(0, |m| m.as_str().len());
            n.to_string()
        }, None)
        .unwrap();
        assert_eq!(out, "a1b2");
    }

    #[test]
    fn replace_each_chains() {
        let out = replace_each(
            "abc",
            vec![ReplaceStep::new("a", "b"), ReplaceStep::new("b", "c").scope(ReplaceScope::All)],
        )
        .unwrap();
        assert_eq!(out, "ccc");
    }

    // === split ===

    #[test]
    fn split_with_captures() {
        let r = re(r"([a-z]+)(\d+)", "i");
        assert_eq!(split("..word1..", &r, None), vec!["..", "word", "1", ".."]);
    }

    #[test]
    fn split_empty_separator() {
        let r = re("", "");
        assert_eq!(split("abc", &r, None), vec!["a", "b", "c"]);
        assert_eq!(split("abc", "", None), vec!["a", "b", "c"]);
        assert!(split("", &r, None).is_empty());
    }

    #[test]
    fn split_edges() {
        let r = re(",", "");
        assert_eq!(split("a,b,", &r, None), vec!["a", "b", ""]);
        assert_eq!(split("", &r, None), vec![""]);
        assert_eq!(split("a,b,c", &r, Some(2)), vec!["a", "b"]);
        let optional = re("(x)?,", "");
        assert_eq!(split("a,b", &optional, None), vec!["a", "", "b"]);
    }

    #[test]
    fn split_literal() {
        assert_eq!(split("a--b--c", "--", None), vec!["a", "b", "c"]);
    }

    // === match ===

    #[test]
    fn match_one_and_all() {
        let r = re(r"\d+", "g");
        assert_eq!(match_one("a12b3", &r), Some("12"));
        assert_eq!(r.last_index(), 3);
        assert_eq!(match_all("a12b3", &r), vec!["12", "3"]);
        assert_eq!(r.last_index(), 0);
        assert!(match_all("ab", &r).is_empty());
        assert_eq!(match_one("ab", &r), None);
    }

    #[test]
    fn match_all_sticky_is_consecutive() {
        let r = re(r"\d", "y");
        assert_eq!(match_all("12a3", &r), vec!["1", "2"]);
    }
}
