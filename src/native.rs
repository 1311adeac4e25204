// native.rs - Adapter over the native ECMAScript-dialect engine.
//
// The rest of the crate needs exactly one capability from the engine: search
// forward from a byte offset and report every group span. Global and sticky
// behavior is layered on top by the search driver in exec.rs.

use std::fmt;
use std::ops::Range;
use std::sync::{Arc, OnceLock};

use smallvec::SmallVec;

use crate::error::RegexError;
use crate::flags::NativeFlags;

/// Group spans of one match. Slot 0 is the whole match.
pub type Slots = SmallVec<[Option<Range<usize>>; 8]>;

/// A compiled native pattern.
#[derive(Clone)]
pub struct NativeRegex {
    inner: Arc<regress::Regex>,
    source: Arc<str>,
    flags: NativeFlags,
    captures_len: usize,
}

impl fmt::Debug for NativeRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRegex")
            .field("source", &self.source)
            .field("flags", &self.flags)
            .finish()
    }
}

impl NativeRegex {
    pub fn new(source: &str, flags: NativeFlags) -> Result<NativeRegex, RegexError> {
        let engine_flags = flags.engine_flags();
        let inner = regress::Regex::with_flags(source, engine_flags.as_str())?;
        Ok(NativeRegex {
            inner: Arc::new(inner),
            source: Arc::from(source),
            flags,
            captures_len: count_captures(source),
        })
    }

    /// Same compiled engine, different emulated flags.
    pub(crate) fn with_emulated_flags(&self, flags: NativeFlags) -> NativeRegex {
        NativeRegex {
            flags,
            ..self.clone()
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> NativeFlags {
        self.flags
    }

    /// Number of capturing groups, not counting the whole match.
    pub fn captures_len(&self) -> usize {
        self.captures_len
    }

    /// Finds the first match starting at or after `start`.
    pub fn search_from(&self, text: &str, start: usize) -> Option<Slots> {
        if start > text.len() {
            return None;
        }
        let m = self.inner.find_from(text, start).next()?;
        let mut slots = Slots::with_capacity(m.captures.len() + 1);
        slots.push(Some(m.start()..m.end()));
        slots.extend(m.captures.into_iter());
        Some(slots)
    }
}

/// Counts capturing groups in a native pattern: bare `(` and `(?<name>`,
/// skipping escapes and character classes.
pub(crate) fn count_captures(source: &str) -> usize {
    let bytes = source.as_bytes();
    let mut count = 0;
    let mut in_class = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'[' if !in_class => in_class = true,
            b']' if in_class => in_class = false,
            b'(' if !in_class => {
                let rest = &bytes[i + 1..];
                if !rest.starts_with(b"?")
                    || (rest.starts_with(b"?<")
                        && !rest.starts_with(b"?<=")
                        && !rest.starts_with(b"?<!"))
                {
                    count += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    count
}

// ============================================================================
// Engine quirk probe
// ============================================================================

/// Engine behaviors that the search driver has to correct for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineQuirks {
    /// A group that did not participate reports an empty span instead of
    /// nothing. Detected by matching `()??` against the empty string.
    pub empty_nonparticipating: bool,
}

/// Probes the engine once per process.
pub fn quirks() -> EngineQuirks {
    static QUIRKS: OnceLock<EngineQuirks> = OnceLock::new();
    *QUIRKS.get_or_init(|| {
        let empty_nonparticipating = NativeRegex::new("()??", NativeFlags::empty())
            .ok()
            .and_then(|probe| probe.search_from("", 0))
            .is_some_and(|slots| matches!(slots.get(1), Some(Some(_))));
        EngineQuirks {
            empty_nonparticipating,
        }
    })
}

/// Clears slots that matched empty but did not participate according to a
/// second, non-global run of the same pattern.
pub(crate) fn correct_nonparticipating(slots: &mut Slots, reference: &Slots) {
    for (i, slot) in slots.iter_mut().enumerate().skip(1) {
        let empty = slot.as_ref().is_some_and(|r| r.is_empty());
        if empty && matches!(reference.get(i), Some(None)) {
            *slot = None;
        }
    }
}
