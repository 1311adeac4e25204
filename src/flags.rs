// flags.rs - Flag registry and flag string preparation.
//
// Flags are single characters. The five native ones (g i m u y) are always
// known; syntax extensions register more. A leading `(?flags)` mode modifier
// in the pattern is folded into the flag string before compilation.

use std::collections::BTreeSet;

use bitflags::bitflags;

use crate::error::{RegexError, SyntaxErrorKind};

bitflags! {
    /// Flags understood by the native engine or emulated directly on top of it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NativeFlags: u8 {
        const GLOBAL = 1 << 0;
        const IGNORE_CASE = 1 << 1;
        const MULTILINE = 1 << 2;
        const UNICODE = 1 << 3;
        const STICKY = 1 << 4;
    }
}

impl NativeFlags {
    /// Native flag characters in canonical order.
    pub const CHARS: &'static str = "gimuy";

    /// Maps one flag character to its native flag, if it is native.
    pub fn from_char(c: char) -> Option<NativeFlags> {
        match c {
            'g' => Some(NativeFlags::GLOBAL),
            'i' => Some(NativeFlags::IGNORE_CASE),
            'm' => Some(NativeFlags::MULTILINE),
            'u' => Some(NativeFlags::UNICODE),
            'y' => Some(NativeFlags::STICKY),
            _ => None,
        }
    }

    /// Collects the native flags in `flags`, ignoring everything else.
    pub fn from_chars(flags: &str) -> NativeFlags {
        flags
            .chars()
            .filter_map(NativeFlags::from_char)
            .fold(NativeFlags::empty(), |acc, f| acc | f)
    }

    /// Renders the set as a flag string in `gimuy` order.
    pub fn to_flag_string(&self) -> String {
        NativeFlags::CHARS
            .chars()
            .filter(|&c| NativeFlags::from_char(c).is_some_and(|f| self.contains(f)))
            .collect()
    }

    /// Flags handed to the engine itself. Global and sticky are emulated by
    /// the search driver and never reach the engine.
    pub(crate) fn engine_flags(&self) -> String {
        let mut out = String::with_capacity(3);
        if self.contains(NativeFlags::IGNORE_CASE) {
            out.push('i');
        }
        if self.contains(NativeFlags::MULTILINE) {
            out.push('m');
        }
        if self.contains(NativeFlags::UNICODE) {
            out.push('u');
        }
        out
    }
}

// ============================================================================
// Flag registry
// ============================================================================

/// Set of flag characters accepted by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagRegistry {
    known: BTreeSet<char>,
}

impl Default for FlagRegistry {
    fn default() -> Self {
        FlagRegistry::new()
    }
}

impl FlagRegistry {
    /// Registry seeded with the native flags.
    pub fn new() -> Self {
        FlagRegistry {
            known: NativeFlags::CHARS.chars().collect(),
        }
    }

    /// Checks that `flag` names exactly one `[A-Za-z0-9_$]` character.
    pub fn check_flag(flag: &str) -> Result<char, RegexError> {
        let mut chars = flag.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if is_flag_char(c) => Ok(c),
            _ => Err(RegexError::InvalidFlag(flag.to_string())),
        }
    }

    /// Adds a flag. Returns `true` if it was not known before.
    pub fn register(&mut self, flag: &str) -> Result<bool, RegexError> {
        let c = FlagRegistry::check_flag(flag)?;
        Ok(self.known.insert(c))
    }

    pub fn is_registered(&self, flag: char) -> bool {
        self.known.contains(&flag)
    }

    /// All registered flag characters, in code point order.
    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.known.iter().copied()
    }

    /// Validates a caller-supplied flag string: no repeats, all registered.
    pub fn validate(&self, flags: &str) -> Result<(), RegexError> {
        check_duplicates(flags)?;
        self.check_known(flags)
    }

    fn check_known(&self, flags: &str) -> Result<(), RegexError> {
        match flags.chars().find(|c| !self.is_registered(*c)) {
            Some(c) => Err(RegexError::syntax(
                SyntaxErrorKind::UnknownFlag,
                format!("Unknown regex flag {}", c),
            )),
            None => Ok(()),
        }
    }
}

pub(crate) fn is_flag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn check_duplicates(flags: &str) -> Result<(), RegexError> {
    for (i, c) in flags.char_indices() {
        if flags[i + c.len_utf8()..].contains(c) {
            return Err(RegexError::syntax(
                SyntaxErrorKind::DuplicateFlag,
                format!("Invalid duplicate regex flag {}", flags),
            ));
        }
    }
    Ok(())
}

/// Removes repeated flag characters, keeping the last occurrence of each.
pub fn clip_duplicates(flags: &str) -> String {
    flags
        .char_indices()
        .filter(|&(i, c)| !flags[i + c.len_utf8()..].contains(c))
        .map(|(_, c)| c)
        .collect()
}

/// Sorts a flag string by code point, the order used for reported flags.
pub(crate) fn sort_flags(flags: &str) -> String {
    let mut chars: Vec<char> = flags.chars().collect();
    chars.sort_unstable();
    chars.into_iter().collect()
}

/// Returns the body of a leading `(?flags)` mode modifier and its total
/// length, e.g. `("im", 5)` for `(?im)abc`.
pub(crate) fn leading_mode_modifier(pattern: &str) -> Option<(&str, usize)> {
    let rest = pattern.strip_prefix("(?")?;
    let body_len = rest
        .char_indices()
        .find(|&(_, c)| !is_flag_char(c))
        .map_or(rest.len(), |(i, _)| i);
    if body_len == 0 || !rest[body_len..].starts_with(')') {
        return None;
    }
    Some((&rest[..body_len], body_len + 3))
}

/// Pattern and flag string after mode-modifier folding and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedFlags {
    pub pattern: String,
    pub flags: String,
}

/// Validates `flags`, strips a leading mode modifier from `pattern` and
/// merges its flags in.
pub fn prepare_flags(
    registry: &FlagRegistry,
    pattern: &str,
    flags: &str,
) -> Result<PreparedFlags, RegexError> {
    check_duplicates(flags)?;

    let (pattern, flags) = match leading_mode_modifier(pattern) {
        Some((modifier, len)) => {
            if modifier.contains(&['g', 'y'][..]) {
                return Err(RegexError::syntax(
                    SyntaxErrorKind::ReservedFlagInModifier,
                    format!(
                        "Cannot use flag g or y in mode modifier {}",
                        &pattern[..len]
                    ),
                ));
            }
            let merged = clip_duplicates(&format!("{}{}", flags, modifier));
            (pattern[len..].to_string(), merged)
        }
        None => (pattern.to_string(), flags.to_string()),
    };

    registry.check_known(&flags)?;
    Ok(PreparedFlags { pattern, flags })
}
