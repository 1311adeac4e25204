// compose.rs - Building regexes from named subpatterns.
//
// An outer pattern refers to subpatterns as {{name}}, or ({{name}}) to
// capture one. Every piece is compiled on its own first, so each must be
// valid by itself; capture names survive and numbered backreferences are
// shifted to the group numbers they end up with in the combined regex.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RegexError;
use crate::exec::escape;
use crate::flags::{clip_duplicates, leading_mode_modifier};
use crate::regex::Regex;
use crate::syntax::Syntax;
use crate::traverse::{pieces, Piece};

/// A value substituted for `{{name}}` in [`Syntax::build`].
#[derive(Debug, Clone, Copy)]
pub enum Subpattern<'a> {
    /// Augmented pattern source.
    Pattern(&'a str),
    /// Text matched literally.
    Literal(&'a str),
    /// An existing regex; its capture names are kept.
    Regex(&'a Regex),
}

impl<'a> From<&'a str> for Subpattern<'a> {
    fn from(pattern: &'a str) -> Self {
        Subpattern::Pattern(pattern)
    }
}

impl<'a> From<&'a Regex> for Subpattern<'a> {
    fn from(regex: &'a Regex) -> Self {
        Subpattern::Regex(regex)
    }
}

struct Part {
    pattern: String,
    names: Arc<[Option<String>]>,
}

fn no_names() -> Arc<[Option<String>]> {
    Arc::from(Vec::new())
}

/// Strips a `^...$` pair that wraps the whole pattern. Empty groups next to
/// the anchors are dropped with them; an escaped `$` does not count.
pub(crate) fn deanchor(pattern: &str) -> &str {
    const EMPTY: &str = "(?:)";

    let mut start = pattern;
    while let Some(rest) = start.strip_prefix(EMPTY) {
        start = rest;
    }
    let Some(body) = start.strip_prefix('^') else {
        return pattern;
    };

    let mut end = body;
    while let Some(rest) = end.strip_suffix(EMPTY) {
        end = rest;
    }
    let Some(body) = end.strip_suffix('$') else {
        return pattern;
    };

    // Count the backslashes before the `$`; an odd run escapes it.
    let escapes = body.bytes().rev().take_while(|&b| b == b'\\').count();
    if escapes % 2 == 1 {
        return pattern;
    }
    body
}

impl Syntax {
    fn build_part(&self, sub: &Subpattern<'_>, flags: &str) -> Result<Part, RegexError> {
        match *sub {
            Subpattern::Literal(text) => Ok(Part {
                pattern: escape(text),
                names: no_names(),
            }),
            Subpattern::Pattern(pattern) => {
                let compiled = self.compile(pattern, flags)?;
                Ok(Part {
                    pattern: compiled.pattern.clone(),
                    names: compiled.capture_names.clone().unwrap_or_else(no_names),
                })
            }
            Subpattern::Regex(regex) => match regex.capture_names_arc() {
                Some(names) => Ok(Part {
                    pattern: regex.native_source().to_string(),
                    names,
                }),
                None => {
                    let compiled = self.compile(regex.native_source(), flags)?;
                    Ok(Part {
                        pattern: compiled.pattern.clone(),
                        names: compiled.capture_names.clone().unwrap_or_else(no_names),
                    })
                }
            },
        }
    }

    /// Builds a regex from `pattern`, replacing each `{{name}}` with the
    /// matching entry of `subs`. `({{name}})` captures the subpattern under
    /// the group's own name, or under `name` if the group has none.
    ///
    /// A subpattern wrapped in `^...$` loses those anchors. A leading mode
    /// modifier on `pattern` applies to the whole result, while flag `x`
    /// given in `flags` also applies to every subpattern.
    ///
    /// # Examples
    ///
    /// ```
    /// use rextend::{Subpattern, Syntax};
    ///
    /// let syntax = Syntax::new();
    /// let date = syntax
    ///     .build(
    ///         "{{year}}-({{month}})",
    ///         &[
    ///             ("year", Subpattern::from(r"^\d{4}$")),
    ///             ("month", Subpattern::from(r"\d{2}")),
    ///         ],
    ///         "",
    ///     )
    ///     .unwrap();
    /// let caps = date.captures("on 2024-05").unwrap();
    /// assert_eq!(caps.as_str(), "2024-05");
    /// assert_eq!(caps.name("month").unwrap().as_str(), "05");
    /// ```
    pub fn build(
        &self,
        pattern: &str,
        subs: &[(&str, Subpattern<'_>)],
        flags: &str,
    ) -> Result<Regex, RegexError> {
        let mut flags = flags.to_string();
        let free_spacing = flags.contains('x');
        if let Some((modifier, _)) = leading_mode_modifier(pattern) {
            flags = clip_duplicates(&format!("{}{}", flags, modifier));
        }
        let part_flags = if free_spacing { "x" } else { "" };

        let mut parts: HashMap<&str, Part> = HashMap::with_capacity(subs.len());
        for &(name, sub) in subs {
            let mut part = self.build_part(&sub, part_flags)?;
            part.pattern = deanchor(&part.pattern).to_string();
            parts.insert(name, part);
        }

        let outer = self.compile(pattern, part_flags)?;
        let outer_names = outer.capture_names.clone().unwrap_or_else(no_names);

        let mut captures = 0;
        let mut outer_captures = 0;
        let mut outer_map = vec![0];
        let mut output = String::with_capacity(outer.pattern.len());

        for piece in pieces(&outer.pattern, true) {
            match piece {
                Piece::SubRef { name, capturing } => {
                    let part = parts.get(name).ok_or_else(|| {
                        RegexError::Reference(format!("Undefined property {{{{{}}}}}", name))
                    })?;
                    if capturing {
                        let label = outer_names
                            .get(outer_captures)
                            .and_then(Option::as_deref)
                            .unwrap_or(name);
                        captures += 1;
                        outer_captures += 1;
                        outer_map.push(captures);
                        output.push_str(&format!("(?<{}>", label));
                    } else {
                        output.push_str("(?:");
                    }

                    let prior = captures;
                    for inner in pieces(&part.pattern, false) {
                        match inner {
                            Piece::Capture => {
                                match part.names.get(captures - prior).and_then(Option::as_deref) {
                                    Some(label) => output.push_str(&format!("(?<{}>", label)),
                                    None => output.push('('),
                                }
                                captures += 1;
                            }
                            Piece::Backref(n) => {
                                match n.checked_sub(1).and_then(|i| part.names.get(i)) {
                                    Some(Some(label)) => {
                                        output.push_str(&format!("\\k<{}>", label))
                                    }
                                    _ => output.push_str(&format!("\\{}", n + prior)),
                                }
                            }
                            Piece::Verbatim(text) => output.push_str(text),
                            Piece::SubRef { .. } => {}
                        }
                    }
                    output.push(')');
                }
                Piece::Capture => {
                    let label = outer_names.get(outer_captures).and_then(Option::as_deref);
                    captures += 1;
                    outer_captures += 1;
                    outer_map.push(captures);
                    match label {
                        Some(label) => output.push_str(&format!("(?<{}>", label)),
                        None => output.push('('),
                    }
                }
                Piece::Backref(n) => {
                    match n.checked_sub(1).and_then(|i| outer_names.get(i)) {
                        Some(Some(label)) => output.push_str(&format!("\\k<{}>", label)),
                        _ => {
                            let target = outer_map.get(n).copied().unwrap_or(n);
                            output.push_str(&format!("\\{}", target));
                        }
                    }
                }
                Piece::Verbatim(text) => output.push_str(text),
            }
        }

        self.regex(&output, &flags)
    }
}

/// [`Syntax::build`] on the global context.
///
/// # Examples
///
/// ```
/// use rextend::{build, Subpattern};
///
/// let time = build(
///     r"(?x)^ {{hours}} ({{minutes}}) $",
///     &[
///         ("hours", Subpattern::from("1[0-2]|0?[1-9]")),
///         ("minutes", Subpattern::from("^[0-5][0-9]$")),
///     ],
///     "",
/// )
/// .unwrap();
/// assert!(time.is_match("1059"));
/// assert_eq!(time.captures("1059").unwrap().name("minutes").unwrap().as_str(), "59");
/// ```
pub fn build(
    pattern: &str,
    subs: &[(&str, Subpattern<'_>)],
    flags: &str,
) -> Result<Regex, RegexError> {
    Syntax::global().build(pattern, subs, flags)
}
