// unicode.rs - Unicode property escapes.
//
// Installing the Unicode base registers a token for \p{Name}, \P{Name},
// \p{^Name} and \pL. Property data is supplied by the caller as native
// class contents (BMP) and native alternations (astral). Under flag A the
// astral form is used and the regex runs in Unicode mode.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{RegexError, SyntaxErrorKind};
use crate::regex::Captures;
use crate::syntax::{read, write, Syntax};
use crate::token::{token_handler, CompileContext, TokenOptions, TokenScope};

/// Data for one Unicode property.
///
/// `bmp` holds character class contents such as `"A-Za-z\u00aa"`. `astral`
/// holds a native pattern matching the remaining code points, used only
/// under flag `A`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnicodeProperty {
    pub name: String,
    pub alias: Option<String>,
    pub bmp: Option<String>,
    pub astral: Option<String>,
    /// Defines this property as the negation of another one.
    pub inverse_of: Option<String>,
    /// Try the astral alternative before the BMP class.
    pub is_bmp_last: bool,
}

impl UnicodeProperty {
    pub fn new(name: &str) -> Self {
        UnicodeProperty {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn bmp(mut self, bmp: &str) -> Self {
        self.bmp = Some(bmp.to_string());
        self
    }

    pub fn astral(mut self, astral: &str) -> Self {
        self.astral = Some(astral.to_string());
        self
    }

    pub fn inverse_of(mut self, name: &str) -> Self {
        self.inverse_of = Some(name.to_string());
        self
    }

    pub fn bmp_last(mut self, yes: bool) -> Self {
        self.is_bmp_last = yes;
        self
    }

    fn check(&self) -> Result<(), RegexError> {
        if self.name.is_empty() {
            return Err(RegexError::InvalidUnicodeData(
                "Unicode token requires name".to_string(),
            ));
        }
        if self.inverse_of.is_none() && self.bmp.is_none() && self.astral.is_none() {
            return Err(RegexError::InvalidUnicodeData(format!(
                "Unicode token has no character data {}",
                self.name
            )));
        }
        Ok(())
    }
}

/// Lookup key: lowercase, without spaces, hyphens and underscores.
pub(crate) fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

// ============================================================================
// Table
// ============================================================================

/// Registered properties plus derived patterns.
#[derive(Debug, Default)]
pub(crate) struct UnicodeTable {
    properties: HashMap<String, Arc<UnicodeProperty>>,
    inverted_bmp: HashMap<String, String>,
    astral: HashMap<(String, bool), String>,
}

impl UnicodeTable {
    fn insert(&mut self, property: UnicodeProperty) {
        let property = Arc::new(property);
        if let Some(alias) = &property.alias {
            self.properties
                .insert(normalize_name(alias), Arc::clone(&property));
        }
        self.properties
            .insert(normalize_name(&property.name), property);
        self.inverted_bmp.clear();
        self.astral.clear();
    }

    fn get(&self, slug: &str) -> Option<Arc<UnicodeProperty>> {
        self.properties.get(slug).cloned()
    }

    fn inverted_bmp(&mut self, slug: &str, bmp: &str) -> String {
        self.inverted_bmp
            .entry(slug.to_string())
            .or_insert_with(|| invert_bmp(bmp))
            .clone()
    }

    fn astral_pattern(&mut self, slug: &str, property: &UnicodeProperty, negated: bool) -> String {
        self.astral
            .entry((slug.to_string(), negated))
            .or_insert_with(|| build_astral(property, negated))
            .clone()
    }
}

/// Reads one class atom (`\xHH`, `\uHHHH`, `\c` or a plain character) and
/// returns its code point and length.
fn class_atom(range: &str) -> Option<(u32, usize)> {
    let mut chars = range.chars();
    let first = chars.next()?;
    if first != '\\' {
        return Some((first as u32, first.len_utf8()));
    }
    let hex = |digits: usize| {
        range
            .get(2..2 + digits)
            .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|h| u32::from_str_radix(h, 16).ok())
    };
    match chars.next()? {
        'x' => hex(2).map(|cp| (cp, 4)),
        'u' => hex(4).map(|cp| (cp, 6)),
        c => Some((c as u32, 1 + c.len_utf8())),
    }
}

/// Complement of BMP class contents within `\u0000-\uffff`.
pub(crate) fn invert_bmp(range: &str) -> String {
    let mut output = String::new();
    let mut last_end: i64 = -1;
    let mut pos = 0;
    while let Some((start, len)) = class_atom(&range[pos..]) {
        pos += len;
        let mut end = start;
        if range[pos..].starts_with('-') {
            if let Some((to, len)) = class_atom(&range[pos + 1..]) {
                end = to;
                pos += 1 + len;
            }
        }
        let start = i64::from(start);
        if start > last_end + 1 {
            output.push_str(&format!("\\u{:04x}", last_end + 1));
            if start > last_end + 2 {
                output.push_str(&format!("-\\u{:04x}", start - 1));
            }
        }
        last_end = i64::from(end);
    }
    if last_end < 0xFFFF {
        output.push_str(&format!("\\u{:04x}", last_end + 1));
        if last_end < 0xFFFE {
            output.push_str("-\\uffff");
        }
    }
    output
}

/// Pattern for a property in astral mode, where it must match whole code
/// points.
fn build_astral(property: &UnicodeProperty, negated: bool) -> String {
    let bmp = property.bmp.as_deref().map(|bmp| format!("[{}]", bmp));
    let astral = property.astral.as_deref();
    let parts: Vec<&str> = if property.is_bmp_last {
        astral.into_iter().chain(bmp.as_deref()).collect()
    } else {
        bmp.as_deref().into_iter().chain(astral).collect()
    };
    let combined = parts.join("|");
    if negated {
        format!(r"(?:(?!{})[\s\S])", combined)
    } else {
        format!("(?:{})", combined)
    }
}

fn property_error(message: String) -> RegexError {
    RegexError::syntax(SyntaxErrorKind::UnicodeProperty, message)
}

fn expand_property(
    table: &RwLock<UnicodeTable>,
    caps: &Captures<'_>,
    scope: TokenScope,
    flags: &str,
) -> Result<String, RegexError> {
    let token = caps.as_str();
    let upper = caps.text_of(1) == "P";
    let caret = !caps.text_of(2).is_empty();
    if upper && caret {
        return Err(property_error(format!("Invalid double negation {}", token)));
    }
    let mut negated = upper || caret;
    let name = match caps.get(4) {
        Some(letter) => letter.as_str(),
        None => caps.text_of(3),
    };
    let astral_mode = flags.contains('A');

    let mut table = write(table);
    let mut slug = normalize_name(name);
    let mut property = table
        .get(&slug)
        .ok_or_else(|| property_error(format!("Unknown Unicode token {}", token)))?;
    if let Some(target) = property.inverse_of.clone() {
        slug = normalize_name(&target);
        property = table.get(&slug).ok_or_else(|| {
            property_error(format!("Unicode token missing data {} -> {}", token, target))
        })?;
        negated = !negated;
    }

    if astral_mode {
        if scope == TokenScope::Class {
            return Err(property_error(
                "Astral mode does not support Unicode tokens within character classes"
                    .to_string(),
            ));
        }
        return Ok(table.astral_pattern(&slug, &property, negated));
    }

    let Some(bmp) = property.bmp.as_deref() else {
        return Err(property_error(format!(
            "Astral mode required for Unicode token {}",
            token
        )));
    };
    Ok(match (scope, negated) {
        (TokenScope::Class, true) => table.inverted_bmp(&slug, bmp),
        (TokenScope::Class, false) => bmp.to_string(),
        (_, true) => format!("[^{}]", bmp),
        (_, false) => format!("[{}]", bmp),
    })
}

// ============================================================================
// Syntax entry points
// ============================================================================

impl Syntax {
    /// Registers the `\p{..}` escape family and flag `A`. Calling it again
    /// does nothing.
    pub fn install_unicode_base(&self) -> Result<(), RegexError> {
        if self.registry().unicode_base {
            return Ok(());
        }
        let table = Arc::clone(&self.unicode);
        self.add_token_handler(
            r"\\([pP])(?:\{(\^?)([^}]*)\}|([A-Za-z]))",
            &TokenOptions::new()
                .scope(TokenScope::All)
                .optional_flags("A")
                .lead_char('\\'),
            token_handler(
                move |caps: &Captures<'_>, scope: TokenScope, flags: &str, _: &mut CompileContext| {
                    expand_property(&table, caps, scope, flags)
                },
            ),
        )?;
        self.registry_mut().unicode_base = true;
        Ok(())
    }

    pub fn has_unicode_base(&self) -> bool {
        self.registry().unicode_base
    }

    /// Adds property data, installing the Unicode base first if needed.
    /// Nothing is added if any entry is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use rextend::{Syntax, UnicodeProperty};
    ///
    /// let syntax = Syntax::new();
    /// syntax
    ///     .add_unicode_data(&[UnicodeProperty::new("Hex").alias("H").bmp("0-9A-Fa-f")])
    ///     .unwrap();
    /// let re = syntax.regex(r"^\p{Hex}+\P{h}$", "").unwrap();
    /// assert!(re.is_match("c0ffee!"));
    /// ```
    pub fn add_unicode_data(&self, properties: &[UnicodeProperty]) -> Result<(), RegexError> {
        for property in properties {
            property.check()?;
        }
        self.install_unicode_base()?;
        {
            let mut table = write(&self.unicode);
            for property in properties {
                table.insert(property.clone());
            }
        }
        self.flush_patterns();
        Ok(())
    }

    /// Looks up a property by name or alias, ignoring case, spaces,
    /// hyphens and underscores.
    pub fn unicode_property(&self, name: &str) -> Option<UnicodeProperty> {
        read(&self.unicode)
            .get(&normalize_name(name))
            .map(|property| (*property).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Features;

    fn letters() -> Syntax {
        let syntax = Syntax::new();
        syntax
            .add_unicode_data(&[
                UnicodeProperty::new("Letter").alias("L").bmp("A-Za-z"),
                UnicodeProperty::new("Not Letter").inverse_of("Letter"),
                UnicodeProperty::new("Emoticons").astral(r"[\u{1F600}-\u{1F64F}]"),
                UnicodeProperty::new("Wide")
                    .bmp("a")
                    .astral(r"\u{1F600}")
                    .bmp_last(true),
                UnicodeProperty::new("Dangling").inverse_of("Nothing"),
            ])
            .unwrap();
        syntax
    }

    fn native(syntax: &Syntax, pattern: &str, flags: &str) -> String {
        syntax.compile(pattern, flags).unwrap().pattern.clone()
    }

    fn kind(syntax: &Syntax, pattern: &str, flags: &str) -> Option<SyntaxErrorKind> {
        syntax.compile(pattern, flags).unwrap_err().syntax_kind()
    }

    #[test]
    fn names_are_normalized() {
        assert_eq!(normalize_name("Not_Letter"), "notletter");
        assert_eq!(normalize_name("not - letter"), "notletter");
        let syntax = letters();
        assert_eq!(syntax.unicode_property("NOT-LETTER").unwrap().name, "Not Letter");
        assert_eq!(syntax.unicode_property("l").unwrap().name, "Letter");
        assert!(syntax.unicode_property("nothing").is_none());
    }

    #[test]
    fn bmp_forms() {
        let syntax = letters();
        assert_eq!(native(&syntax, r"\p{L}", ""), "[A-Za-z]");
        assert_eq!(native(&syntax, r"\pL", ""), "[A-Za-z]");
        assert_eq!(native(&syntax, r"\P{Letter}", ""), "[^A-Za-z]");
        assert_eq!(native(&syntax, r"\p{^letter}", ""), "[^A-Za-z]");
        assert_eq!(native(&syntax, r"\p{NotLetter}", ""), "[^A-Za-z]");
        assert_eq!(native(&syntax, r"\P{NotLetter}", ""), "[A-Za-z]");
    }

    #[test]
    fn class_forms() {
        let syntax = letters();
        assert_eq!(native(&syntax, r"[\p{L}\d]", ""), r"[A-Za-z\d]");
        assert_eq!(
            native(&syntax, r"[\P{L}]", ""),
            r"[\u0000-\u0040\u005b-\u0060\u007b-\uffff]"
        );
        let re = syntax.regex(r"^[\P{L}]+$", "").unwrap();
        assert!(re.is_match("1 2!"));
        assert!(!re.is_match("1a"));
    }

    #[test]
    fn invert_bmp_edges() {
        assert_eq!(invert_bmp(r"\u0000-\uffff"), "");
        assert_eq!(invert_bmp(r"\x00"), r"\u0001-\uffff");
        assert_eq!(invert_bmp(r"\u0000-\ufffe"), r"\uffff");
        assert_eq!(invert_bmp(r"\-b"), r"\u0000-\u002c\u002e-\u0061\u0063-\uffff");
    }

    #[test]
    fn property_errors() {
        let syntax = letters();
        assert_eq!(kind(&syntax, r"\P{^L}", ""), Some(SyntaxErrorKind::UnicodeProperty));
        assert_eq!(kind(&syntax, r"\p{Nope}", ""), Some(SyntaxErrorKind::UnicodeProperty));
        assert_eq!(kind(&syntax, r"\p{Dangling}", ""), Some(SyntaxErrorKind::UnicodeProperty));
        assert_eq!(kind(&syntax, r"\p{Emoticons}", ""), Some(SyntaxErrorKind::UnicodeProperty));
        assert_eq!(kind(&syntax, r"[\p{L}]", "A"), Some(SyntaxErrorKind::UnicodeProperty));
    }

    #[test]
    fn astral_mode() {
        let syntax = letters();
        assert_eq!(native(&syntax, r"\p{L}", "A"), "(?:[A-Za-z])");
        assert_eq!(native(&syntax, r"\p{Wide}", "A"), r"(?:\u{1F600}|[a])");
        assert_eq!(
            native(&syntax, r"\P{Emoticons}", "A"),
            r"(?:(?![\u{1F600}-\u{1F64F}])[\s\S])"
        );
        let re = syntax.regex(r"^\p{Emoticons}+$", "A").unwrap();
        assert!(re.is_match("\u{1F600}\u{1F642}"));
        assert!(!re.is_match("a"));
        let re = syntax.regex(r"^\P{Emoticons}$", "A").unwrap();
        assert!(re.is_match("\u{1F680}"));
    }

    #[test]
    fn astral_feature_appends_flag() {
        let syntax = letters();
        syntax.install(Features::ASTRAL);
        let re = syntax.regex(r"\p{Emoticons}", "").unwrap();
        assert_eq!(re.flags(), Some("A"));
        assert!(re.is_match("x\u{1F600}"));
    }

    #[test]
    fn invalid_data_adds_nothing() {
        let syntax = Syntax::new();
        let err = syntax
            .add_unicode_data(&[UnicodeProperty::new("Ok").bmp("a"), UnicodeProperty::new("")])
            .unwrap_err();
        assert!(matches!(err, RegexError::InvalidUnicodeData(_)));
        assert!(syntax.unicode_property("ok").is_none());

        let err = syntax
            .add_unicode_data(&[UnicodeProperty::new("Empty")])
            .unwrap_err();
        assert!(matches!(err, RegexError::InvalidUnicodeData(_)));
    }

    #[test]
    fn new_data_invalidates_compiled_patterns() {
        let syntax = letters();
        assert!(syntax.compile(r"\p{Digit}", "").is_err());
        syntax
            .add_unicode_data(&[UnicodeProperty::new("Digit").bmp("0-9")])
            .unwrap();
        assert_eq!(native(&syntax, r"\p{Digit}", ""), "[0-9]");
    }

    #[test]
    fn base_install_is_idempotent() {
        let syntax = Syntax::new();
        assert!(syntax.compile(r"\p{L}", "").is_err());
        syntax.install_unicode_base().unwrap();
        syntax.install_unicode_base().unwrap();
        assert!(syntax.has_unicode_base());
        assert!(syntax.is_flag_registered('A'));
    }
}
