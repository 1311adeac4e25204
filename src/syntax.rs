// syntax.rs - Syntax context: registries, caches and installed features.
//
// A Syntax owns everything that shapes compilation: the flag registry, the
// token list, optional features and the Unicode property table, plus the
// caches derived from them. Registration clears the compiled-pattern cache
// so later compiles see the new tokens. A process-wide default is available
// through Syntax::global().

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bitflags::bitflags;

use crate::compiler::{builtin_tokens, compile_pattern, CompiledPattern};
use crate::error::RegexError;
use crate::flags::{prepare_flags, sort_flags, FlagRegistry};
use crate::native::NativeRegex;
use crate::regex::{Captures, Regex};
use crate::token::{
    token_handler, CompileContext, Token, TokenHandler, TokenOptions, TokenRegistry, TokenScope,
};
use crate::unicode::UnicodeTable;

bitflags! {
    /// Optional behaviors that can be switched on per syntax context.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Features: u8 {
        /// Every regex gets flag `A`, so `\p{..}` escapes also match astral
        /// code points. Requires the Unicode base to be installed.
        const ASTRAL = 1 << 0;
        /// Named groups are reported through `Captures::groups` and the
        /// reserved capture names become usable.
        const NAMESPACING = 1 << 1;
    }
}

impl Features {
    /// Parses names such as `"astral namespacing"`. Unknown names are
    /// ignored.
    pub fn parse(names: &str) -> Features {
        names
            .split(|c: char| c.is_whitespace() || c == ',')
            .fold(Features::empty(), |acc, name| match name {
                "astral" => acc | Features::ASTRAL,
                "namespacing" => acc | Features::NAMESPACING,
                _ => acc,
            })
    }
}

impl From<&str> for Features {
    fn from(names: &str) -> Self {
        Features::parse(names)
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) struct Registry {
    pub(crate) flags: FlagRegistry,
    pub(crate) tokens: TokenRegistry,
    pub(crate) features: Features,
    pub(crate) unicode_base: bool,
}

impl Registry {
    fn with_builtins() -> Result<Registry, RegexError> {
        let mut registry = Registry {
            flags: FlagRegistry::new(),
            tokens: TokenRegistry::new(),
            features: Features::empty(),
            unicode_base: false,
        };
        for (trigger, options, handler) in builtin_tokens() {
            registry.push_token(trigger, &options, handler)?;
        }
        Ok(registry)
    }

    fn push_token(
        &mut self,
        trigger: &str,
        options: &TokenOptions,
        handler: TokenHandler,
    ) -> Result<(), RegexError> {
        for flag in options.flags_to_register() {
            FlagRegistry::check_flag(flag.encode_utf8(&mut [0; 4]))?;
        }
        let token = Token::new(trigger, options, handler)?;
        for flag in options.flags_to_register() {
            self.flags.register(flag.encode_utf8(&mut [0; 4]))?;
        }
        self.tokens.push(token);
        Ok(())
    }
}

fn builtin_registry() -> Registry {
    Registry::with_builtins().expect("built-in token triggers are valid native patterns")
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

type CacheKey = (String, String);

// ============================================================================
// Syntax
// ============================================================================

/// Compilation context: registered flags and tokens, features, Unicode
/// data and the pattern and regex caches.
///
/// # Examples
///
/// ```
/// use rextend::{Captures, CompileContext, Syntax, TokenOptions, TokenScope};
///
/// let syntax = Syntax::new();
/// syntax
///     .add_token(
///         r"\\a",
///         TokenOptions::new().scope(TokenScope::All),
///         |_: &Captures<'_>, _: TokenScope, _: &str, _: &mut CompileContext| {
///             Ok(r"\x07".to_string())
///         },
///     )
///     .unwrap();
/// let re = syntax.regex(r"\a[\a]", "").unwrap();
/// assert!(re.is_match("\u{7}\u{7}"));
/// ```
pub struct Syntax {
    registry: RwLock<Registry>,
    patterns: RwLock<HashMap<CacheKey, Arc<CompiledPattern>>>,
    /// Bumped by every pattern flush. A compile only caches its result if
    /// no flush happened since it read the registry.
    generation: AtomicU64,
    regexes: RwLock<HashMap<CacheKey, Arc<Regex>>>,
    pub(crate) unicode: Arc<RwLock<UnicodeTable>>,
}

impl Default for Syntax {
    fn default() -> Self {
        Syntax::new()
    }
}

impl std::fmt::Debug for Syntax {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = read(&self.registry);
        f.debug_struct("Syntax")
            .field("flags", &registry.flags)
            .field("tokens", &registry.tokens.len())
            .field("features", &registry.features)
            .finish()
    }
}

impl Syntax {
    /// Fresh context with only the built-in tokens.
    pub fn new() -> Syntax {
        Syntax {
            registry: RwLock::new(builtin_registry()),
            patterns: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            regexes: RwLock::new(HashMap::new()),
            unicode: Arc::new(RwLock::new(UnicodeTable::default())),
        }
    }

    /// The process-wide context used by [`Regex::new`] and friends.
    pub fn global() -> &'static Syntax {
        static GLOBAL: OnceLock<Syntax> = OnceLock::new();
        GLOBAL.get_or_init(Syntax::new)
    }

    /// Drops every registration, feature, Unicode entry and cached value.
    pub fn reset(&self) {
        *write(&self.registry) = builtin_registry();
        *write(&self.unicode) = UnicodeTable::default();
        self.flush_patterns();
        self.flush_regexes();
    }

    pub(crate) fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        read(&self.registry)
    }

    pub(crate) fn registry_mut(&self) -> RwLockWriteGuard<'_, Registry> {
        write(&self.registry)
    }

    // --- Registration ---

    /// Makes a flag character valid in flag strings. Fails for anything but
    /// a single `[A-Za-z0-9_$]` character.
    pub fn register_flag(&self, flag: &str) -> Result<(), RegexError> {
        let added = write(&self.registry).flags.register(flag)?;
        if added {
            self.flush_patterns();
        }
        Ok(())
    }

    pub fn is_flag_registered(&self, flag: char) -> bool {
        read(&self.registry).flags.is_registered(flag)
    }

    /// Registers a syntax token. Later tokens take precedence over earlier
    /// ones, including the built-ins. Nothing is registered if the trigger
    /// or a flag is invalid.
    pub fn add_token<F>(
        &self,
        trigger: &str,
        options: TokenOptions,
        handler: F,
    ) -> Result<(), RegexError>
    where
        F: Fn(&Captures<'_>, TokenScope, &str, &mut CompileContext) -> Result<String, RegexError>
            + Send
            + Sync
            + 'static,
    {
        self.add_token_handler(trigger, &options, token_handler(handler))
    }

    pub(crate) fn add_token_handler(
        &self,
        trigger: &str,
        options: &TokenOptions,
        handler: TokenHandler,
    ) -> Result<(), RegexError> {
        write(&self.registry).push_token(trigger, options, handler)?;
        self.flush_patterns();
        Ok(())
    }

    // --- Features ---

    pub fn features(&self) -> Features {
        read(&self.registry).features
    }

    pub fn install(&self, features: impl Into<Features>) {
        write(&self.registry).features |= features.into();
        self.flush_patterns();
    }

    pub fn uninstall(&self, features: impl Into<Features>) {
        write(&self.registry).features -= features.into();
        self.flush_patterns();
    }

    /// Whether every feature in `features` is on.
    pub fn is_installed(&self, features: impl Into<Features>) -> bool {
        self.features().contains(features.into())
    }

    // --- Compilation ---

    fn effective_flags(&self, flags: &str, features: Features) -> String {
        if features.contains(Features::ASTRAL) && !flags.contains('A') {
            format!("{}A", flags)
        } else {
            flags.to_string()
        }
    }

    /// Translates an augmented pattern into a native pattern and capture
    /// metadata. Results are cached per `(pattern, flags)`.
    pub fn compile(&self, pattern: &str, flags: &str) -> Result<Arc<CompiledPattern>, RegexError> {
        let generation = self.generation.load(Ordering::SeqCst);
        let features = self.features();
        let flags = self.effective_flags(flags, features);
        let key = (pattern.to_string(), flags);
        if let Some(hit) = read(&self.patterns).get(&key) {
            return Ok(Arc::clone(hit));
        }

        let (tokens, prepared) = {
            let registry = read(&self.registry);
            (
                registry.tokens.snapshot(),
                prepare_flags(&registry.flags, pattern, &key.1)?,
            )
        };
        let compiled = Arc::new(compile_pattern(&tokens, prepared, features)?);
        let mut patterns = write(&self.patterns);
        if self.generation.load(Ordering::SeqCst) == generation {
            patterns.insert(key, Arc::clone(&compiled));
        }
        Ok(compiled)
    }

    /// Compiles an augmented pattern into a new [`Regex`].
    pub fn regex(&self, pattern: &str, flags: &str) -> Result<Regex, RegexError> {
        let features = self.features();
        let compiled = self.compile(pattern, flags)?;
        let native = NativeRegex::new(&compiled.pattern, compiled.flags)?;
        Ok(Regex::from_parts(
            native,
            compiled.capture_names.clone(),
            Some(Arc::from(pattern)),
            Some(Arc::from(sort_flags(&self.effective_flags(flags, features)))),
            features.contains(Features::NAMESPACING),
        ))
    }

    /// Like [`Syntax::regex`] but returns one shared instance per
    /// `(pattern, flags)`. The cursor is shared too.
    pub fn cache(&self, pattern: &str, flags: &str) -> Result<Arc<Regex>, RegexError> {
        let key = (pattern.to_string(), flags.to_string());
        if let Some(hit) = read(&self.regexes).get(&key) {
            return Ok(Arc::clone(hit));
        }
        let regex = Arc::new(self.regex(pattern, flags)?);
        let mut regexes = write(&self.regexes);
        Ok(Arc::clone(regexes.entry(key).or_insert(regex)))
    }

    /// Empties the compiled-pattern cache.
    pub fn flush_patterns(&self) {
        let mut patterns = write(&self.patterns);
        self.generation.fetch_add(1, Ordering::SeqCst);
        patterns.clear();
    }

    /// Empties the regex cache used by [`Syntax::cache`].
    pub fn flush_regexes(&self) {
        write(&self.regexes).clear();
    }

    #[cfg(test)]
    pub(crate) fn cached_patterns(&self) -> usize {
        read(&self.patterns).len()
    }
}
