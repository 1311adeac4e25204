// token.rs - Syntax tokens: registry entries, options and matching.
//
// A token pairs a trigger pattern with a handler that rewrites the matched
// text. Tokens are tried newest first at each position of the pattern being
// compiled; the first applicable token whose trigger matches exactly at that
// position wins.

use std::fmt;
use std::sync::Arc;

use crate::error::RegexError;
use crate::exec::search_at;
use crate::regex::{Captures, Regex};
use crate::syntax::Features;

/// Where a token applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TokenScope {
    /// Outside character classes.
    #[default]
    Default,
    /// Inside character classes.
    Class,
    /// Both.
    All,
}

impl TokenScope {
    fn admits(self, scope: TokenScope) -> bool {
        self == TokenScope::All || self == scope
    }
}

/// Rewrites one token match. Receives the trigger match (whose input is the
/// whole pattern), the current scope, the active flags and the compile
/// context.
pub type TokenHandler = Arc<
    dyn Fn(&Captures<'_>, TokenScope, &str, &mut CompileContext) -> Result<String, RegexError>
        + Send
        + Sync,
>;

/// Boxes a closure as a [`TokenHandler`].
pub fn token_handler<F>(f: F) -> TokenHandler
where
    F: Fn(&Captures<'_>, TokenScope, &str, &mut CompileContext) -> Result<String, RegexError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// Options for [`Syntax::add_token`](crate::Syntax::add_token).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenOptions {
    pub(crate) scope: TokenScope,
    pub(crate) flag: Option<char>,
    pub(crate) optional_flags: String,
    pub(crate) reparse: bool,
    pub(crate) lead_char: Option<char>,
}

impl TokenOptions {
    pub fn new() -> Self {
        TokenOptions::default()
    }

    pub fn scope(mut self, scope: TokenScope) -> Self {
        self.scope = scope;
        self
    }

    /// Only apply the token while `flag` is set. The flag is registered.
    pub fn flag(mut self, flag: char) -> Self {
        self.flag = Some(flag);
        self
    }

    /// Flags the handler reacts to without gating the token. They are
    /// registered so patterns may use them.
    pub fn optional_flags(mut self, flags: &str) -> Self {
        self.optional_flags = flags.to_string();
        self
    }

    /// Feed the handler output back into the tokenizer at the same position
    /// instead of emitting it.
    pub fn reparse(mut self, yes: bool) -> Self {
        self.reparse = yes;
        self
    }

    /// Skip the trigger unless the pattern has `c` at the current position.
    pub fn lead_char(mut self, c: char) -> Self {
        self.lead_char = Some(c);
        self
    }

    /// Every flag character this token needs registered.
    pub(crate) fn flags_to_register(&self) -> impl Iterator<Item = char> + '_ {
        self.flag.into_iter().chain(self.optional_flags.chars())
    }
}

// ============================================================================
// Compile context
// ============================================================================

/// Mutable state of one compilation, shared by every handler invocation.
#[derive(Debug, Clone, Default)]
pub struct CompileContext {
    capture_names: Vec<Option<String>>,
    has_named_capture: bool,
    features: Features,
}

impl CompileContext {
    pub fn new(features: Features) -> Self {
        CompileContext {
            features,
            ..Default::default()
        }
    }

    /// One entry per capturing group opened so far.
    pub fn capture_names(&self) -> &[Option<String>] {
        &self.capture_names
    }

    pub fn captures_len(&self) -> usize {
        self.capture_names.len()
    }

    pub fn has_named_capture(&self) -> bool {
        self.has_named_capture
    }

    /// Records a new capturing group.
    pub fn push_capture(&mut self, name: Option<String>) {
        if name.is_some() {
            self.has_named_capture = true;
        }
        self.capture_names.push(name);
    }

    /// Group number of `name`, if a group with that name was opened.
    pub fn capture_index(&self, name: &str) -> Option<usize> {
        self.capture_names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .map(|i| i + 1)
    }

    pub fn features(&self) -> Features {
        self.features
    }

    pub(crate) fn into_capture_names(self) -> Option<Vec<Option<String>>> {
        if self.has_named_capture {
            Some(self.capture_names)
        } else {
            None
        }
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// A registered syntax token.
#[derive(Clone)]
pub struct Token {
    trigger: Regex,
    handler: TokenHandler,
    scope: TokenScope,
    flag: Option<char>,
    reparse: bool,
    lead_char: Option<char>,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("trigger", &self.trigger.native_source())
            .field("scope", &self.scope)
            .field("flag", &self.flag)
            .field("reparse", &self.reparse)
            .field("lead_char", &self.lead_char)
            .finish()
    }
}

impl Token {
    /// Compiles `trigger` as a native pattern in unicode mode.
    pub(crate) fn new(
        trigger: &str,
        options: &TokenOptions,
        handler: TokenHandler,
    ) -> Result<Token, RegexError> {
        Ok(Token {
            trigger: Regex::native(trigger, "u")?,
            handler,
            scope: options.scope,
            flag: options.flag,
            reparse: options.reparse,
            lead_char: options.lead_char,
        })
    }

    pub fn trigger(&self) -> &str {
        self.trigger.native_source()
    }

    pub fn scope(&self) -> TokenScope {
        self.scope
    }

    fn applies(&self, lead: Option<char>, scope: TokenScope, flags: &str) -> bool {
        if self.lead_char.is_some() && self.lead_char != lead {
            return false;
        }
        self.scope.admits(scope) && self.flag.map_or(true, |f| flags.contains(f))
    }
}

/// Outcome of a successful token match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TokenMatch {
    pub(crate) output: String,
    pub(crate) match_len: usize,
    pub(crate) reparse: bool,
}

/// Ordered token list. Registration order is kept; lookups walk it newest
/// first.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: Arc<Vec<Token>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        TokenRegistry::default()
    }

    pub fn push(&mut self, token: Token) {
        Arc::make_mut(&mut self.tokens).push(token);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Cheap copy of the current list, detached from later registrations.
    pub fn snapshot(&self) -> Arc<Vec<Token>> {
        Arc::clone(&self.tokens)
    }
}

/// Tries every applicable token at `pos`, newest first.
pub(crate) fn run_tokens(
    tokens: &[Token],
    pattern: &str,
    flags: &str,
    pos: usize,
    scope: TokenScope,
    ctx: &mut CompileContext,
) -> Result<Option<TokenMatch>, RegexError> {
    let lead = pattern[pos..].chars().next();
    for token in tokens.iter().rev() {
        if !token.applies(lead, scope, flags) {
            continue;
        }
        if let Some(caps) = search_at(pattern, &token.trigger, pos, true) {
            let output = (token.handler)(&caps, scope, flags, ctx)?;
            return Ok(Some(TokenMatch {
                output,
                match_len: caps.as_str().len(),
                reparse: token.reparse,
            }));
        }
    }
    Ok(None)
}
