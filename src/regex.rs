// regex.rs - Extended regex handle, builder and match types.
//
// A Regex wraps a native pattern plus the metadata the augmented syntax
// produced: capture names, the original source and flags. Global and sticky
// behavior is emulated through a position cursor and lazily built variants.

use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crate::error::RegexError;
use crate::exec;
use crate::flags::{clip_duplicates, sort_flags, FlagRegistry, NativeFlags};
use crate::native::{NativeRegex, Slots};
use crate::syntax::Syntax;

/// A compiled extended regular expression.
///
/// # Examples
///
/// ```
/// use rextend::Regex;
///
/// let re = Regex::with_flags(r"(?<year>\d{4})-(?<month>\d{2})", "x").unwrap();
/// let caps = re.exec("on 2021-02-22").unwrap();
/// assert_eq!(caps.name("year").unwrap().as_str(), "2021");
/// assert_eq!(caps.index(), 3);
/// ```
pub struct Regex {
    native: NativeRegex,
    capture_names: Option<Arc<[Option<String>]>>,
    source: Option<Arc<str>>,
    flags: Option<Arc<str>>,
    namespacing: bool,
    last_index: AtomicUsize,
    variants: Variants,
}

/// Internal copies used by the search driver, built on first use.
#[derive(Default)]
struct Variants {
    global: OnceLock<Box<Regex>>,
    fake_sticky: OnceLock<Option<Box<Regex>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum VariantTag {
    /// Global, never sticky.
    Global,
    /// Global with an always-matching empty alternative appended, so a
    /// search from `pos` can only ever report a match at `pos`.
    FakeSticky,
}

impl Regex {
    /// Compiles an augmented pattern with no flags using the global syntax
    /// context.
    pub fn new(pattern: &str) -> Result<Regex, RegexError> {
        Syntax::global().regex(pattern, "")
    }

    /// Compiles an augmented pattern with a flag string such as `"gix"`.
    pub fn with_flags(pattern: &str, flags: &str) -> Result<Regex, RegexError> {
        Syntax::global().regex(pattern, flags)
    }

    /// Returns a builder for custom options.
    pub fn builder(pattern: &str) -> RegexBuilder<'static> {
        RegexBuilder::new(pattern)
    }

    /// Compiles a pattern directly with the native engine, bypassing the
    /// token pipeline. Only the native flags `gimuy` are accepted.
    pub fn native(pattern: &str, flags: &str) -> Result<Regex, RegexError> {
        FlagRegistry::new().validate(flags)?;
        let native = NativeRegex::new(pattern, NativeFlags::from_chars(flags))?;
        Ok(Regex::from_parts(native, None, None, None, false))
    }

    pub(crate) fn from_parts(
        native: NativeRegex,
        capture_names: Option<Arc<[Option<String>]>>,
        source: Option<Arc<str>>,
        flags: Option<Arc<str>>,
        namespacing: bool,
    ) -> Regex {
        Regex {
            native,
            capture_names,
            source,
            flags,
            namespacing,
            last_index: AtomicUsize::new(0),
            variants: Variants::default(),
        }
    }

    // --- Metadata ---

    /// The augmented source pattern, before token expansion. `None` for
    /// regexes created with [`Regex::native`] and for internal copies.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// The augmented flags, sorted by code point.
    pub fn flags(&self) -> Option<&str> {
        self.flags.as_deref()
    }

    /// The source given to the engine after token expansion.
    pub fn native_source(&self) -> &str {
        self.native.source()
    }

    pub fn native_flags(&self) -> NativeFlags {
        self.native.flags()
    }

    /// The augmented source if there is one, else the native source.
    pub fn as_str(&self) -> &str {
        self.source().unwrap_or_else(|| self.native_source())
    }

    /// Names of the capturing groups, indexed by group number minus one.
    /// `None` when the pattern had no named group.
    pub fn capture_names(&self) -> Option<&[Option<String>]> {
        self.capture_names.as_deref()
    }

    pub(crate) fn capture_names_arc(&self) -> Option<Arc<[Option<String>]>> {
        self.capture_names.clone()
    }

    /// Whether this regex was compiled with an extended source and flags.
    pub fn is_augmented(&self) -> bool {
        self.source.is_some()
    }

    /// Number of capturing groups, not counting the whole match.
    pub fn captures_len(&self) -> usize {
        match &self.capture_names {
            Some(names) => names.len(),
            None => self.native.captures_len(),
        }
    }

    /// Whether match results expose named groups through
    /// [`Captures::groups`] instead of as direct lookups.
    pub fn is_namespaced(&self) -> bool {
        self.namespacing
    }

    pub fn is_global(&self) -> bool {
        self.native_flags().contains(NativeFlags::GLOBAL)
    }

    pub fn is_sticky(&self) -> bool {
        self.native_flags().contains(NativeFlags::STICKY)
    }

    pub(crate) fn native_regex(&self) -> &NativeRegex {
        &self.native
    }

    // --- Cursor ---

    /// Position where the next [`Regex::exec`] begins for global or sticky
    /// regexes.
    pub fn last_index(&self) -> usize {
        self.last_index.load(Ordering::Relaxed)
    }

    pub fn set_last_index(&self, pos: usize) {
        self.last_index.store(pos, Ordering::Relaxed);
    }

    // --- Copies ---

    /// Copy with `add` flags set and `remove` flags cleared. Only `g` and
    /// `y` may change since the engine itself is shared. Internal copies
    /// drop the augmented source and flags.
    pub(crate) fn copy_with(&self, add: NativeFlags, remove: NativeFlags, internal: bool) -> Regex {
        let emulated = (self.native_flags() | add) - remove;
        let (source, flags) = if internal {
            (None, None)
        } else {
            let flags = self.flags.as_ref().map(|f| {
                let mut merged = clip_duplicates(&format!("{}{}", f, add.to_flag_string()));
                merged.retain(|c| !NativeFlags::from_char(c).is_some_and(|nf| remove.contains(nf)));
                Arc::from(sort_flags(&merged))
            });
            (self.source.clone(), flags)
        };
        Regex::from_parts(
            self.native.with_emulated_flags(emulated),
            self.capture_names.clone(),
            source,
            flags,
            self.namespacing,
        )
    }

    /// Copy of this regex with the global flag set. The cursor starts at 0.
    pub fn globalize(&self) -> Regex {
        self.copy_with(NativeFlags::GLOBAL, NativeFlags::empty(), false)
    }

    pub(crate) fn variant(&self, tag: VariantTag) -> &Regex {
        match tag {
            VariantTag::Global => {
                let global = self.variants.global.get_or_init(|| {
                    Box::new(self.copy_with(NativeFlags::GLOBAL, NativeFlags::STICKY, true))
                });
                &**global
            }
            VariantTag::FakeSticky => {
                let sticky = self
                    .variants
                    .fake_sticky
                    .get_or_init(|| self.build_fake_sticky().map(Box::new));
                match sticky {
                    Some(re) => &**re,
                    None => self.variant(VariantTag::Global),
                }
            }
        }
    }

    fn build_fake_sticky(&self) -> Option<Regex> {
        let source = format!("{}|()", self.native_source());
        let flags = (self.native_flags() | NativeFlags::GLOBAL) - NativeFlags::STICKY;
        let native = NativeRegex::new(&source, flags).ok()?;
        Some(Regex::from_parts(
            native,
            self.capture_names.clone(),
            None,
            None,
            self.namespacing,
        ))
    }

    pub(crate) fn has_fake_sticky(&self) -> bool {
        matches!(self.variants.fake_sticky.get(), Some(Some(_)))
    }

    // --- Matching ---

    /// Runs one search honoring the cursor: global and sticky regexes start
    /// at [`Regex::last_index`] and move it past the match, or reset it to 0
    /// on failure. A zero-length match leaves the cursor at the match start.
    pub fn exec<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        let flags = self.native_flags();
        let uses_cursor = flags.intersects(NativeFlags::GLOBAL | NativeFlags::STICKY);
        let start = if uses_cursor { self.last_index() } else { 0 };
        let found = exec::search_at(text, self, start, flags.contains(NativeFlags::STICKY));
        if uses_cursor {
            self.set_last_index(found.as_ref().map_or(0, |caps| caps.end()));
        }
        found
    }

    /// Like [`Regex::exec`] but only reports whether a match was found.
    pub fn test(&self, text: &str) -> bool {
        self.exec(text).is_some()
    }

    /// Returns `true` if the pattern matches anywhere in `text`. Ignores and
    /// never touches the cursor.
    pub fn is_match(&self, text: &str) -> bool {
        exec::search_at(text, self, 0, false).is_some()
    }

    /// First match in `text`, ignoring the cursor.
    pub fn find<'t>(&self, text: &'t str) -> Option<Match<'t>> {
        exec::search_at(text, self, 0, false).and_then(|caps| caps.get(0))
    }

    /// Capture groups of the first match in `text`, ignoring the cursor.
    pub fn captures<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        exec::search_at(text, self, 0, false)
    }

    /// Iterates over successive matches, advancing one character past
    /// zero-length matches.
    pub fn find_iter<'r, 't>(&'r self, text: &'t str) -> FindIter<'r, 't> {
        FindIter::new(self, text)
    }
}

impl Clone for Regex {
    fn clone(&self) -> Self {
        let copy = Regex::from_parts(
            self.native.clone(),
            self.capture_names.clone(),
            self.source.clone(),
            self.flags.clone(),
            self.namespacing,
        );
        copy.set_last_index(self.last_index());
        copy
    }
}

impl fmt::Debug for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Regex")
            .field("source", &self.as_str())
            .field("flags", &self.flags())
            .field("native_source", &self.native_source())
            .finish()
    }
}

impl fmt::Display for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === RegexBuilder ===

/// Builder for compiling a [`Regex`] with flags set one at a time.
///
/// # Examples
///
/// ```
/// use rextend::Regex;
///
/// let re = Regex::builder("hello . world")
///     .ignore_case(true)
///     .free_spacing(true)
///     .dot_all(true)
///     .build()
///     .unwrap();
/// assert!(re.is_match("HELLO\nWORLD"));
/// ```
pub struct RegexBuilder<'s> {
    pattern: String,
    flags: String,
    syntax: Option<&'s Syntax>,
}

impl<'s> RegexBuilder<'s> {
    pub fn new(pattern: &str) -> Self {
        RegexBuilder {
            pattern: pattern.to_string(),
            flags: String::new(),
            syntax: None,
        }
    }

    fn flag(mut self, flag: char, yes: bool) -> Self {
        self.flags.retain(|c| c != flag);
        if yes {
            self.flags.push(flag);
        }
        self
    }

    /// Flag `i`.
    pub fn ignore_case(self, yes: bool) -> Self {
        self.flag('i', yes)
    }

    /// Flag `m`: `^` and `$` match at line boundaries.
    pub fn multi_line(self, yes: bool) -> Self {
        self.flag('m', yes)
    }

    /// Flag `s`: `.` matches any character including line breaks.
    pub fn dot_all(self, yes: bool) -> Self {
        self.flag('s', yes)
    }

    /// Flag `x`: whitespace and `#` comments are ignored.
    pub fn free_spacing(self, yes: bool) -> Self {
        self.flag('x', yes)
    }

    /// Flag `n`: only named groups capture.
    pub fn explicit_capture(self, yes: bool) -> Self {
        self.flag('n', yes)
    }

    /// Flag `g`.
    pub fn global(self, yes: bool) -> Self {
        self.flag('g', yes)
    }

    /// Flag `y`.
    pub fn sticky(self, yes: bool) -> Self {
        self.flag('y', yes)
    }

    /// Flag `u`.
    pub fn unicode(self, yes: bool) -> Self {
        self.flag('u', yes)
    }

    /// Adds every flag in `flags`, e.g. a custom flag registered by a token.
    pub fn flags(mut self, flags: &str) -> Self {
        for c in flags.chars() {
            self = self.flag(c, true);
        }
        self
    }

    /// Compiles against `syntax` instead of the global context.
    pub fn syntax<'a>(self, syntax: &'a Syntax) -> RegexBuilder<'a> {
        RegexBuilder {
            pattern: self.pattern,
            flags: self.flags,
            syntax: Some(syntax),
        }
    }

    pub fn build(self) -> Result<Regex, RegexError> {
        let syntax = match self.syntax {
            Some(syntax) => syntax,
            None => Syntax::global(),
        };
        syntax.regex(&self.pattern, &self.flags)
    }
}

// === Match ===

/// A single group span referencing the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'t> {
    text: &'t str,
    start: usize,
    end: usize,
}

impl<'t> Match<'t> {
    /// Byte offset of the start of the match.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Byte offset of the end of the match (exclusive).
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn as_str(&self) -> &'t str {
        &self.text[self.start..self.end]
    }

    /// Length of the match in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

// === Captures ===

/// One successful match: every group span plus the names attached by the
/// regex that produced it.
///
/// Group 0 is the entire match. Groups that did not participate are `None`.
#[derive(Clone)]
pub struct Captures<'t> {
    text: &'t str,
    slots: Slots,
    names: Option<Arc<[Option<String>]>>,
    namespaced: bool,
}

impl<'t> Captures<'t> {
    pub(crate) fn new(
        text: &'t str,
        slots: Slots,
        names: Option<Arc<[Option<String>]>>,
        namespaced: bool,
    ) -> Self {
        Captures {
            text,
            slots,
            names,
            namespaced,
        }
    }

    /// Group `i`, or `None` if it does not exist or did not participate.
    pub fn get(&self, i: usize) -> Option<Match<'t>> {
        let range = self.slots.get(i)?.as_ref()?;
        Some(Match {
            text: self.text,
            start: range.start,
            end: range.end,
        })
    }

    /// Group named `name`, or `None`.
    pub fn name(&self, name: &str) -> Option<Match<'t>> {
        self.group_index(name).and_then(|i| self.get(i))
    }

    /// Group number of `name`, if the regex defines it.
    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.names
            .as_ref()?
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .map(|i| i + 1)
    }

    /// Text of group `i`, with non-participating groups as `""`.
    pub fn text_of(&self, i: usize) -> &'t str {
        self.get(i).map_or("", |m| m.as_str())
    }

    /// Byte offset where the match starts.
    pub fn index(&self) -> usize {
        self.range().start
    }

    /// Byte offset where the match ends.
    pub fn end(&self) -> usize {
        self.range().end
    }

    pub fn range(&self) -> Range<usize> {
        self.slots
            .first()
            .and_then(|slot| slot.clone())
            .unwrap_or(0..0)
    }

    /// The whole matched text.
    pub fn as_str(&self) -> &'t str {
        &self.text[self.range()]
    }

    /// The subject the match was found in.
    pub fn input(&self) -> &'t str {
        self.text
    }

    /// Capture names of the producing regex.
    pub fn capture_names(&self) -> Option<&[Option<String>]> {
        self.names.as_deref()
    }

    /// Named groups as `(name, match)` pairs. Only present when the regex
    /// was compiled with namespacing installed; otherwise named groups are
    /// read directly through [`Captures::name`].
    pub fn groups(&self) -> Option<Vec<(&str, Option<Match<'t>>)>> {
        if !self.namespaced {
            return None;
        }
        let names = self.names.as_ref()?;
        Some(
            names
                .iter()
                .enumerate()
                .filter_map(|(i, name)| name.as_deref().map(|n| (n, self.get(i + 1))))
                .collect(),
        )
    }

    /// Number of groups, including group 0.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if there are no groups (never the case for a match).
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> CapturesIter<'_, 't> {
        CapturesIter {
            captures: self,
            index: 0,
        }
    }
}

impl fmt::Debug for Captures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for i in 0..self.len() {
            list.entry(&self.get(i).map(|m| m.as_str()));
        }
        list.finish()
    }
}

// === CapturesIter ===

/// Iterator over the groups of a [`Captures`].
pub struct CapturesIter<'c, 't> {
    captures: &'c Captures<'t>,
    index: usize,
}

impl<'c, 't> Iterator for CapturesIter<'c, 't> {
    type Item = Option<Match<'t>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.captures.len() {
            return None;
        }
        let m = self.captures.get(self.index);
        self.index += 1;
        Some(m)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.captures.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CapturesIter<'_, '_> {}

// === FindIter ===

/// Iterator over successive matches, honoring the regex's sticky flag.
pub struct FindIter<'r, 't> {
    regex: &'r Regex,
    text: &'t str,
    pos: usize,
    done: bool,
}

impl<'r, 't> FindIter<'r, 't> {
    pub(crate) fn new(regex: &'r Regex, text: &'t str) -> Self {
        FindIter {
            regex,
            text,
            pos: 0,
            done: false,
        }
    }
}

impl<'r, 't> Iterator for FindIter<'r, 't> {
    type Item = Captures<'t>;

    fn next(&mut self) -> Option<Captures<'t>> {
        if self.done {
            return None;
        }
        match exec::search_at(self.text, self.regex, self.pos, self.regex.is_sticky()) {
            Some(caps) => {
                let range = caps.range();
                self.pos = if range.is_empty() {
                    exec::next_char_boundary(self.text, range.end)
                } else {
                    range.end
                };
                Some(caps)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}
