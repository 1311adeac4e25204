// traverse.rs - Match traversal and pattern union.
//
// for_each walks every match left to right, match_chain narrows a text
// through successive regexes, and Syntax::union merges several patterns
// into one regex, renumbering backreferences so that each part keeps
// referring to its own groups.

use crate::error::RegexError;
use crate::exec::{escape, is_name_char, Search};
use crate::flags::NativeFlags;
use crate::regex::{Captures, Regex};
use crate::syntax::Syntax;

// ============================================================================
// forEach
// ============================================================================

/// Calls `f` with every match of `regex` in `text` and its zero-based
/// index. Iteration always starts at offset 0; a global regex gets its
/// cursor reset afterwards.
///
/// # Examples
///
/// ```
/// use rextend::{for_each, Regex};
///
/// let mut evens = Vec::new();
/// for_each("1a2345", &Regex::new(r"\d").unwrap(), |caps, i| {
///     if i % 2 == 1 {
///         evens.push(caps.as_str().to_string());
///     }
/// });
/// assert_eq!(evens, ["2", "4"]);
/// ```
pub fn for_each<'t, F>(text: &'t str, regex: &Regex, mut f: F)
where
    F: FnMut(&Captures<'t>, usize),
{
    for (i, caps) in regex.find_iter(text).enumerate() {
        f(&caps, i);
    }
    if regex.is_global() {
        regex.set_last_index(0);
    }
}

// ============================================================================
// matchChain
// ============================================================================

/// Group selector for a [`ChainLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backref<'a> {
    Number(usize),
    Name(&'a str),
}

impl<'a> From<usize> for Backref<'a> {
    fn from(n: usize) -> Self {
        Backref::Number(n)
    }
}

impl<'a> From<&'a str> for Backref<'a> {
    fn from(name: &'a str) -> Self {
        Backref::Name(name)
    }
}

/// One stage of [`match_chain`]: a regex, and optionally the group whose
/// value is passed on instead of the whole match.
#[derive(Debug, Clone, Copy)]
pub struct ChainLink<'r> {
    regex: &'r Regex,
    backref: Option<Backref<'r>>,
}

impl<'r> ChainLink<'r> {
    pub fn new(regex: &'r Regex) -> Self {
        ChainLink {
            regex,
            backref: None,
        }
    }

    pub fn with_backref(regex: &'r Regex, backref: impl Into<Backref<'r>>) -> Self {
        ChainLink {
            regex,
            backref: Some(backref.into()),
        }
    }
}

impl<'r> From<&'r Regex> for ChainLink<'r> {
    fn from(regex: &'r Regex) -> Self {
        ChainLink::new(regex)
    }
}

fn select<'t>(caps: &Captures<'t>, backref: Option<Backref<'_>>) -> Result<&'t str, RegexError> {
    let index = match backref {
        None => return Ok(caps.as_str()),
        Some(Backref::Number(n)) => Some(n).filter(|&n| n < caps.len()),
        Some(Backref::Name(name)) => caps.group_index(name),
    };
    match index {
        Some(i) => Ok(caps.text_of(i)),
        None => Err(RegexError::Reference(format!(
            "Backreference to undefined group: {}",
            match backref {
                Some(Backref::Name(name)) => name.to_string(),
                Some(Backref::Number(n)) => n.to_string(),
                None => String::new(),
            }
        ))),
    }
}

/// Feeds the matches of each stage into the next one and returns the
/// values produced by the last stage that ran. Stops early once a stage
/// produces nothing.
///
/// # Examples
///
/// ```
/// use rextend::{match_chain, ChainLink, Regex};
///
/// let bold = Regex::with_flags("<b>.*?</b>", "is").unwrap();
/// let digits = Regex::new(r"\d+").unwrap();
/// let found = match_chain(
///     "1 <b>2</b> 3 <b>4 a 56</b>",
///     &[ChainLink::new(&bold), ChainLink::new(&digits)],
/// )
/// .unwrap();
/// assert_eq!(found, ["2", "4", "56"]);
/// ```
pub fn match_chain<'t>(text: &'t str, chain: &[ChainLink<'_>]) -> Result<Vec<&'t str>, RegexError> {
    if chain.is_empty() {
        return Err(RegexError::Type(
            "Must provide a nonempty chain of regexes".to_string(),
        ));
    }

    let mut values = vec![text];
    for link in chain {
        let mut matches = Vec::new();
        let mut failure = None;
        for &value in &values {
            for_each(value, link.regex, |caps, _| {
                if failure.is_some() {
                    return;
                }
                match select(caps, link.backref) {
                    Ok(found) => matches.push(found),
                    Err(err) => failure = Some(err),
                }
            });
            if let Some(err) = failure.take() {
                return Err(err);
            }
        }
        values = matches;
        if values.is_empty() {
            break;
        }
    }
    Ok(values)
}

// ============================================================================
// Pattern pieces
// ============================================================================

/// A lexical piece of a native pattern, as far as renumbering cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Piece<'p> {
    /// `(` opening a capturing group.
    Capture,
    /// `\n` with `n >= 1`.
    Backref(usize),
    /// `{{name}}`, or `({{name}})` when `capturing`.
    SubRef { name: &'p str, capturing: bool },
    /// Anything else, copied as is.
    Verbatim(&'p str),
}

/// Splits a native pattern into pieces. Escapes and whole character classes
/// are kept verbatim. `{{name}}` references are recognized only when
/// `subrefs` is set.
pub(crate) fn pieces(pattern: &str, subrefs: bool) -> Vec<Piece<'_>> {
    let bytes = pattern.as_bytes();
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < pattern.len() {
        let rest = &pattern[pos..];
        if subrefs {
            if let Some((name, len)) = subref_at(rest, true) {
                out.push(Piece::SubRef {
                    name,
                    capturing: true,
                });
                pos += len;
                continue;
            }
            if let Some((name, len)) = subref_at(rest, false) {
                out.push(Piece::SubRef {
                    name,
                    capturing: false,
                });
                pos += len;
                continue;
            }
        }

        let len = match bytes[pos] {
            b'(' if bytes.get(pos + 1) != Some(&b'?') => {
                out.push(Piece::Capture);
                pos += 1;
                continue;
            }
            b'\\' => {
                let digits = rest[1..]
                    .bytes()
                    .take_while(u8::is_ascii_digit)
                    .count();
                if digits > 0 && bytes[pos + 1] != b'0' {
                    let n = rest[1..=digits].parse::<usize>().unwrap_or(usize::MAX);
                    out.push(Piece::Backref(n));
                    pos += 1 + digits;
                    continue;
                }
                1 + rest[1..].chars().next().map_or(0, char::len_utf8)
            }
            b'[' => class_len(rest).unwrap_or(1),
            _ => rest.chars().next().map_or(1, char::len_utf8),
        };
        out.push(Piece::Verbatim(&rest[..len]));
        pos += len;
    }
    out
}

fn subref_at(rest: &str, capturing: bool) -> Option<(&str, usize)> {
    let (open, close) = if capturing {
        ("({{", "}})")
    } else {
        ("{{", "}}")
    };
    let body = rest.strip_prefix(open)?;
    let len = body.find(|c: char| !is_name_char(c)).unwrap_or(body.len());
    if len == 0 || !body[len..].starts_with(close) {
        return None;
    }
    Some((&body[..len], open.len() + len + close.len()))
}

/// Length of the character class starting at `rest`, if it is closed.
fn class_len(rest: &str) -> Option<usize> {
    let mut chars = rest.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            ']' => return Some(i + 1),
            _ => {}
        }
    }
    None
}

// ============================================================================
// Union
// ============================================================================

/// How [`Syntax::union`] joins its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conjunction {
    /// Alternatives: `a|b`.
    #[default]
    Or,
    /// Concatenation: `ab`.
    None,
}

impl Syntax {
    /// Merges regexes and literal strings into one regex. Regex parts keep
    /// their capture names, and their backreferences are renumbered past
    /// the groups of earlier parts. Literal parts are escaped.
    pub fn union(
        &self,
        parts: &[Search<'_>],
        flags: &str,
        conjunction: Conjunction,
    ) -> Result<Regex, RegexError> {
        if parts.is_empty() {
            return Err(RegexError::Type(
                "Must provide a nonempty array of patterns to merge".to_string(),
            ));
        }

        let mut captures = 0;
        let mut output = Vec::with_capacity(parts.len());
        for part in parts {
            let regex = match part {
                Search::Literal(text) => {
                    output.push(escape(text));
                    continue;
                }
                Search::Regex(regex) => regex,
            };

            let own_flags = if regex.native_flags().contains(NativeFlags::UNICODE) {
                "u"
            } else {
                ""
            };
            let compiled = self.compile(regex.native_source(), own_flags)?;
            let names = regex.capture_names().unwrap_or(&[]);
            let prior = captures;
            let mut rewritten = String::with_capacity(compiled.pattern.len());
            for piece in pieces(&compiled.pattern, false) {
                match piece {
                    Piece::Capture => {
                        match names.get(captures - prior).and_then(Option::as_deref) {
                            Some(name) => {
                                rewritten.push_str("(?<");
                                rewritten.push_str(name);
                                rewritten.push('>');
                            }
                            None => rewritten.push('('),
                        }
                        captures += 1;
                    }
                    Piece::Backref(n) => {
                        rewritten.push_str(&format!("\\{}", n + prior));
                    }
                    Piece::Verbatim(text) => rewritten.push_str(text),
                    Piece::SubRef { .. } => {}
                }
            }
            output.push(rewritten);
        }

        let separator = match conjunction {
            Conjunction::Or => "|",
            Conjunction::None => "",
        };
        self.regex(&output.join(separator), flags)
    }
}

/// [`Syntax::union`] on the global context.
///
/// # Examples
///
/// ```
/// use rextend::{union, Conjunction, Regex, Search};
///
/// let dogs = Regex::new(r"(dogs)\1").unwrap();
/// let cats = Regex::new(r"(cats)\1").unwrap();
/// let re = union(
///     &[Search::from("a+b*c"), Search::from(&dogs), Search::from(&cats)],
///     "i",
///     Conjunction::Or,
/// )
/// .unwrap();
/// assert_eq!(re.source(), Some(r"a\+b\*c|(dogs)\1|(cats)\2"));
/// ```
pub fn union(parts: &[Search<'_>], flags: &str, conjunction: Conjunction) -> Result<Regex, RegexError> {
    Syntax::global().union(parts, flags, conjunction)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn re(pattern: &str, flags: &str) -> Regex {
        Regex::with_flags(pattern, flags).unwrap()
    }

    #[test]
    fn for_each_visits_every_match() {
        let mut seen = Vec::new();
        for_each("1a2345", &re(r"\d", ""), |caps, i| {
            seen.push((caps.as_str(), i));
        });
        assert_eq!(seen, [("1", 0), ("2", 1), ("3", 2), ("4", 3), ("5", 4)]);
    }

    #[test]
    fn for_each_ignores_and_resets_cursor() {
        let digit = re(r"\d", "g");
        digit.set_last_index(4);
        let mut count = 0;
        for_each("12", &digit, |_, _| count += 1);
        assert_eq!(count, 2);
        assert_eq!(digit.last_index(), 0);
    }

    #[test]
    fn for_each_steps_over_empty_matches() {
        let mut seen = Vec::new();
        for_each("aé", &re("", ""), |caps, _| seen.push(caps.index()));
        assert_eq!(seen, [0, 1, 3]);
    }

    #[test]
    fn chain_with_named_and_numbered_backrefs() {
        let html = r#"<a href="http://xregexp.com/api/">XRegExp</a><a href="http://www.google.com/">Google</a>"#;
        let link = re(r#"<a href="([^"]+)">(?<text>[^<]+)"#, "i");
        let domain = re(r"^https?://(?<domain>[^/?#]+)", "i");
        let found = match_chain(
            html,
            &[
                ChainLink::with_backref(&link, 1),
                ChainLink::with_backref(&domain, "domain"),
            ],
        )
        .unwrap();
        assert_eq!(found, ["xregexp.com", "www.google.com"]);
    }

    #[test]
    fn chain_stops_when_a_stage_is_empty() {
        let x = re("x", "");
        let y = re("y", "");
        assert!(match_chain("abc", &[ChainLink::new(&x), ChainLink::new(&y)])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn chain_errors() {
        assert!(matches!(match_chain("a", &[]), Err(RegexError::Type(_))));
        let a = re("(a)", "");
        let err = match_chain("a", &[ChainLink::with_backref(&a, 2)]).unwrap_err();
        assert!(matches!(err, RegexError::Reference(_)));
        let err = match_chain("a", &[ChainLink::with_backref(&a, "nope")]).unwrap_err();
        assert!(matches!(err, RegexError::Reference(_)));
    }

    #[test]
    fn chain_backref_zero_is_whole_match() {
        let a = re("a(b)?", "");
        assert_eq!(
            match_chain("a ab", &[ChainLink::with_backref(&a, 0)]).unwrap(),
            ["a", "ab"]
        );
        assert_eq!(
            match_chain("a ab", &[ChainLink::with_backref(&a, 1)]).unwrap(),
            ["", "b"]
        );
    }

    #[test]
    fn pieces_classify() {
        use Piece::*;
        assert_eq!(
            pieces(r"(a)\1[(\]]\(x(?:)", false),
            [
                Capture,
                Verbatim("a"),
                Verbatim(")"),
                Backref(1),
                Verbatim(r"[(\]]"),
                Verbatim(r"\("),
                Verbatim("x"),
                Verbatim("("),
                Verbatim("?"),
                Verbatim(":"),
                Verbatim(")"),
            ]
        );
        assert_eq!(
            pieces("({{a}}){{b}}", true),
            [
                SubRef {
                    name: "a",
                    capturing: true
                },
                SubRef {
                    name: "b",
                    capturing: false
                },
            ]
        );
        assert_eq!(pieces("{{a}}", false).len(), 5);
    }

    #[test]
    fn union_renumbers_backreferences() {
        let dogs = re(r"(dogs)\1", "");
        let cats = re(r"(cats)\1", "");
        let syntax = Syntax::new();
        let merged = syntax
            .union(&[Search::from(&dogs), Search::from(&cats)], "i", Conjunction::Or)
            .unwrap();
        assert!(merged.is_match("catscats"));
        assert!(merged.is_match("DOGSdogs"));
        assert!(!merged.is_match("catsdogs"));
    }

    #[test]
    fn union_keeps_names_and_escapes_literals() {
        let syntax = Syntax::new();
        let named = re(r"(?<word>\w+)!", "");
        let merged = syntax
            .union(&[Search::from("a.b"), Search::from(&named)], "", Conjunction::Or)
            .unwrap();
        assert_eq!(merged.source(), Some(r"a\.b|(?<word>\w+)!"));
        let caps = merged.captures("hey!").unwrap();
        assert_eq!(caps.name("word").unwrap().as_str(), "hey");
        assert!(!merged.is_match("axb"));
    }

    #[test]
    fn union_without_conjunction() {
        let syntax = Syntax::new();
        let (man, bear) = (re("man", ""), re("bear", ""));
        let merged = syntax
            .union(&[Search::from(&man), Search::from(&bear)], "i", Conjunction::None)
            .unwrap();
        assert_eq!(merged.source(), Some("manbear"));
        assert!(merged.is_match("ManBear"));
    }

    #[test]
    fn union_of_nothing_is_a_type_error() {
        let err = Syntax::new().union(&[], "", Conjunction::Or).unwrap_err();
        assert!(matches!(err, RegexError::Type(_)));
    }
}
