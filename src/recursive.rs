// recursive.rs - Balanced delimiter matching.
//
// Scans for left and right delimiter matches in order, counting nesting
// depth. Each time the depth returns to zero an outermost match is done.
// An optional escape character makes the following character inert.

use crate::error::RegexError;
use crate::exec::{escape, next_char_boundary, search_at, Search};
use crate::regex::Regex;
use crate::syntax::Syntax;
use crate::traverse::Conjunction;

/// Labels for the parts reported by [`Syntax::match_recursive`]. Parts
/// whose label is `None` are left out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValueNames<'a> {
    /// Text between outermost matches, and before the first and after the
    /// last one under flag `g`.
    pub between: Option<&'a str>,
    /// The outermost left delimiter.
    pub left: Option<&'a str>,
    /// Everything between the outermost delimiters.
    pub inner: Option<&'a str>,
    /// The outermost right delimiter.
    pub right: Option<&'a str>,
}

impl<'a> ValueNames<'a> {
    pub fn new(
        between: Option<&'a str>,
        left: Option<&'a str>,
        inner: Option<&'a str>,
        right: Option<&'a str>,
    ) -> Self {
        ValueNames {
            between,
            left,
            inner,
            right,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecursiveOptions<'a> {
    /// Character that escapes the one after it, so that it never counts as
    /// (part of) a delimiter.
    pub escape_char: Option<char>,
    pub value_names: Option<ValueNames<'a>>,
}

impl<'a> RecursiveOptions<'a> {
    pub fn new() -> Self {
        RecursiveOptions::default()
    }

    pub fn escape_char(mut self, c: char) -> Self {
        self.escape_char = Some(c);
        self
    }

    pub fn value_names(mut self, names: ValueNames<'a>) -> Self {
        self.value_names = Some(names);
        self
    }
}

/// One part of a recursive match. Without value names every entry is the
/// inner text of an outermost match and `name` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecursiveMatch<'t> {
    pub name: Option<String>,
    pub value: &'t str,
    pub start: usize,
    pub end: usize,
}

impl<'t> RecursiveMatch<'t> {
    fn part(text: &'t str, name: Option<&str>, start: usize, end: usize) -> Self {
        RecursiveMatch {
            name: name.map(str::to_string),
            value: &text[start..end],
            start,
            end,
        }
    }
}

impl Syntax {
    fn escape_skipper(
        &self,
        escape_char: char,
        left: &Regex,
        right: &Regex,
        flags: &str,
    ) -> Result<Regex, RegexError> {
        let esc = escape(escape_char.encode_utf8(&mut [0; 4]));
        let delimiters = self.union(
            &[Search::Regex(left), Search::Regex(right)],
            "",
            Conjunction::Or,
        )?;
        let source = format!(
            r"(?:{esc}[\S\s]|(?:(?!{delims})[^{esc}])+)+",
            esc = esc,
            delims = delimiters.native_source()
        );
        let native_flags: String = flags.chars().filter(|c| "imu".contains(*c)).collect();
        Regex::native(&source, &native_flags)
    }

    /// Finds text between balanced `left` and `right` delimiters, which are
    /// augmented patterns compiled with `flags`.
    ///
    /// Flag `g` returns every outermost match instead of the first one.
    /// Flag `y` requires matches to follow each other with nothing in
    /// between, starting at offset 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use rextend::{RecursiveOptions, Syntax};
    ///
    /// let syntax = Syntax::new();
    /// let found = syntax
    ///     .match_recursive("(t((e))s)t()(ing)", r"\(", r"\)", "g", &RecursiveOptions::new())
    ///     .unwrap();
    /// let values: Vec<&str> = found.iter().map(|m| m.value).collect();
    /// assert_eq!(values, ["t((e))s", "", "ing"]);
    /// ```
    pub fn match_recursive<'t>(
        &self,
        text: &'t str,
        left: &str,
        right: &str,
        flags: &str,
        options: &RecursiveOptions<'_>,
    ) -> Result<Vec<RecursiveMatch<'t>>, RegexError> {
        let global = flags.contains('g');
        let sticky = flags.contains('y');
        let basic_flags: String = flags.chars().filter(|&c| c != 'y').collect();
        let left = self.regex(left, &basic_flags)?;
        let right = self.regex(right, &basic_flags)?;
        let skipper = match options.escape_char {
            Some(c) => Some(self.escape_skipper(c, &left, &right, flags)?),
            None => None,
        };
        let names = options.value_names;

        let mut open = 0usize;
        let mut delim_start = 0;
        let mut delim_end = 0;
        let mut last_outer_end = 0;
        let mut outer_start = 0;
        let mut inner_start = 0;
        let mut output = Vec::new();

        loop {
            if let Some(skipper) = &skipper {
                if let Some(skipped) = search_at(text, skipper, delim_end, true) {
                    delim_end = skipped.end();
                }
            }

            let mut left_match = search_at(text, &left, delim_end, false).map(|c| c.range());
            let mut right_match = search_at(text, &right, delim_end, false).map(|c| c.range());
            if let (Some(l), Some(r)) = (&left_match, &right_match) {
                if l.start <= r.start {
                    right_match = None;
                } else {
                    left_match = None;
                }
            }

            match left_match.as_ref().or(right_match.as_ref()) {
                Some(found) => {
                    delim_start = found.start;
                    delim_end = found.end;
                }
                None if open == 0 => break,
                None => {}
            }

            if sticky && open == 0 && delim_start > last_outer_end {
                break;
            }

            if left_match.is_some() {
                if open == 0 {
                    outer_start = delim_start;
                    inner_start = delim_end;
                }
                open += 1;
            } else if right_match.is_some() && open > 0 {
                open -= 1;
                if open == 0 {
                    match names {
                        Some(names) => {
                            if names.between.is_some() && outer_start > last_outer_end {
                                output.push(RecursiveMatch::part(
                                    text,
                                    names.between,
                                    last_outer_end,
                                    outer_start,
                                ));
                            }
                            if names.left.is_some() {
                                output.push(RecursiveMatch::part(
                                    text,
                                    names.left,
                                    outer_start,
                                    inner_start,
                                ));
                            }
                            if names.inner.is_some() {
                                output.push(RecursiveMatch::part(
                                    text,
                                    names.inner,
                                    inner_start,
                                    delim_start,
                                ));
                            }
                            if names.right.is_some() {
                                output.push(RecursiveMatch::part(
                                    text,
                                    names.right,
                                    delim_start,
                                    delim_end,
                                ));
                            }
                        }
                        None => output.push(RecursiveMatch::part(
                            text,
                            None,
                            inner_start,
                            delim_start,
                        )),
                    }
                    last_outer_end = delim_end;
                    if !global {
                        break;
                    }
                }
            } else {
                return Err(RegexError::UnbalancedDelimiter);
            }

            // An empty delimiter must not stall the scan.
            if delim_start == delim_end {
                delim_end = next_char_boundary(text, delim_end);
            }
        }

        if let Some(between) = names.and_then(|n| n.between) {
            if global && !sticky && !output.is_empty() && text.len() > last_outer_end {
                output.push(RecursiveMatch::part(
                    text,
                    Some(between),
                    last_outer_end,
                    text.len(),
                ));
            }
        }
        Ok(output)
    }
}

/// [`Syntax::match_recursive`] on the global context.
pub fn match_recursive<'t>(
    text: &'t str,
    left: &str,
    right: &str,
    flags: &str,
    options: &RecursiveOptions<'_>,
) -> Result<Vec<RecursiveMatch<'t>>, RegexError> {
    Syntax::global().match_recursive(text, left, right, flags, options)
}
