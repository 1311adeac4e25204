// compile_test.rs - Integration tests for the token pipeline and Syntax.
//
// Every test builds its own Syntax so registrations never leak between
// tests running in parallel.

use std::sync::Arc;

use rextend::prelude::*;
use rextend::{CompiledPattern, NativeFlags, SyntaxErrorKind};

fn native(syntax: &Syntax, pattern: &str, flags: &str) -> String {
    syntax.compile(pattern, flags).unwrap().pattern.clone()
}

fn kind(syntax: &Syntax, pattern: &str, flags: &str) -> Option<SyntaxErrorKind> {
    syntax.compile(pattern, flags).unwrap_err().syntax_kind()
}

fn literal(
    out: &'static str,
) -> impl Fn(&Captures<'_>, TokenScope, &str, &mut CompileContext) -> Result<String, RegexError>
       + Send
       + Sync
       + 'static {
    move |_: &Captures<'_>, _: TokenScope, _: &str, _: &mut CompileContext| Ok(out.to_string())
}

// === Built-in syntax ===

#[test]
fn named_capture_round_trip() {
    let syntax = Syntax::new();
    let re = syntax
        .regex(r"(?<first>\w+)\s(?<last>\w+)\s\k<first>", "")
        .unwrap();
    assert_eq!(re.native_source(), r"(\w+)\s(\w+)\s\1");
    let caps = re.captures("ab cd ab").unwrap();
    assert_eq!(caps.name("first").unwrap().as_str(), "ab");
    assert_eq!(caps.name("last").unwrap().as_str(), "cd");
    assert!(!re.is_match("ab cd ef"));
}

#[test]
fn free_spacing_with_comments() {
    let syntax = Syntax::new();
    let pattern = "
        (?<area> \\d{3} ) # area code
        [ ]?              # optional space
        (?<number> \\d{4} )
    ";
    let re = syntax.regex(pattern, "x").unwrap();
    let caps = re.captures("555 1234").unwrap();
    assert_eq!(caps.name("area").unwrap().as_str(), "555");
    assert_eq!(caps.name("number").unwrap().as_str(), "1234");
    assert!(re.is_match("5551234"));
}

#[test]
fn whitespace_inside_class_is_kept() {
    let syntax = Syntax::new();
    let re = syntax.regex("^a[ ]b$", "x").unwrap();
    assert!(re.is_match("a b"));
    assert!(!re.is_match("ab"));
}

#[test]
fn separator_keeps_tokens_apart() {
    let syntax = Syntax::new();
    let re = syntax.regex(r"^(a)\1 0$", "x").unwrap();
    assert!(re.is_match("aa0"));
    assert_eq!(native(&syntax, r"(a)\1(?#c)0", ""), r"(a)\1(?:)0");
}

#[test]
fn empty_classes() {
    let syntax = Syntax::new();
    let never = syntax.regex("a[]", "").unwrap();
    assert!(!never.is_match("a"));
    assert!(!never.is_match("ab"));
    let any = syntax.regex("^[^]$", "").unwrap();
    assert!(any.is_match("\n"));
    assert!(any.is_match("x"));
}

#[test]
fn dot_all_and_multiline() {
    let syntax = Syntax::new();
    let re = syntax.regex("^a.b$", "ms").unwrap();
    assert!(re.is_match("x\na\nb\ny"));
    assert!(!syntax.regex("^a.b$", "m").unwrap().is_match("a\nb"));
}

#[test]
fn explicit_capture_keeps_named_groups() {
    let syntax = Syntax::new();
    let re = syntax.regex(r"(\d+)-(?<tail>\d+)", "n").unwrap();
    assert_eq!(re.captures_len(), 1);
    let caps = re.captures("12-34").unwrap();
    assert_eq!(caps.text_of(1), "34");
}

#[test]
fn leading_mode_modifier() {
    let syntax = Syntax::new();
    let re = syntax.regex("(?xi) a b", "").unwrap();
    // The reported flags are the caller's; the modifier still applies.
    assert_eq!(re.flags(), Some(""));
    assert!(re.native_flags().contains(NativeFlags::IGNORE_CASE));
    assert!(re.is_match("AB"));
    assert!(re.is_match("ab"));
    assert!(!re.is_match("a b"));
    // Only a leading group is a mode modifier.
    assert!(syntax.regex("a(?i)b", "").is_err());
}

#[test]
fn code_point_escapes() {
    let syntax = Syntax::new();
    assert!(syntax.regex(r"^\u{48}\u{0069}$", "").unwrap().is_match("Hi"));
    assert!(syntax.regex(r"^\u{1F600}$", "u").unwrap().is_match("\u{1F600}"));
    assert_eq!(
        kind(&syntax, r"\u{1F600}", ""),
        Some(SyntaxErrorKind::InvalidUnicodeEscape)
    );
}

// === Errors ===

#[test]
fn reference_errors_are_syntax_errors() {
    let syntax = Syntax::new();
    assert_eq!(
        kind(&syntax, r"\k<missing>", ""),
        Some(SyntaxErrorKind::InvalidBackreference)
    );
    assert_eq!(
        kind(&syntax, r"(a)\2", ""),
        Some(SyntaxErrorKind::InvalidOctalOrBackreference)
    );
    assert_eq!(kind(&syntax, r"\q", ""), Some(SyntaxErrorKind::InvalidEscape));
}

#[test]
fn capture_name_rules() {
    let syntax = Syntax::new();
    assert_eq!(
        kind(&syntax, "(?<n>a)(?<n>b)", ""),
        Some(SyntaxErrorKind::DuplicateCaptureName)
    );
    assert_eq!(
        kind(&syntax, "(?<__proto__>a)", ""),
        Some(SyntaxErrorKind::ReservedCaptureName)
    );
    assert_eq!(
        kind(&syntax, "(?<12>a)", ""),
        Some(SyntaxErrorKind::IntegerCaptureName)
    );
    syntax.install(Features::NAMESPACING);
    let re = syntax.regex("(?<length>a)", "").unwrap();
    assert_eq!(re.captures("a").unwrap().name("length").unwrap().as_str(), "a");
}

#[test]
fn error_messages_name_the_problem() {
    let err = Syntax::new().compile("a", "gQ").unwrap_err();
    assert!(err.is_syntax());
    assert!(err.to_string().contains('Q'));
}

// === Caching ===

#[test]
fn compile_is_idempotent_and_cached() {
    let syntax = Syntax::new();
    let first: Arc<CompiledPattern> = syntax.compile(r"(?<a>x)\k<a>", "i").unwrap();
    let second = syntax.compile(r"(?<a>x)\k<a>", "i").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    syntax.flush_patterns();
    let third = syntax.compile(r"(?<a>x)\k<a>", "i").unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(*first, *third);
}

#[test]
fn regex_cache_shares_instances() {
    let syntax = Syntax::new();
    let a = syntax.cache(r"\d", "g").unwrap();
    let b = syntax.cache(r"\d", "g").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    let c = syntax.cache(r"\d", "").unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
    syntax.flush_regexes();
    assert!(!Arc::ptr_eq(&a, &syntax.cache(r"\d", "g").unwrap()));
}

// === Custom tokens ===

#[test]
fn later_tokens_take_priority() {
    let syntax = Syntax::new();
    syntax
        .add_token(r"\\a", TokenOptions::new(), literal("first"))
        .unwrap();
    assert_eq!(native(&syntax, r"\a", ""), "first");
    syntax
        .add_token(r"\\a", TokenOptions::new(), literal("second"))
        .unwrap();
    assert_eq!(native(&syntax, r"\a", ""), "second");
}

#[test]
fn custom_tokens_override_builtins() {
    let syntax = Syntax::new();
    syntax
        .add_token(r"\.", TokenOptions::new(), literal("DOT"))
        .unwrap();
    assert_eq!(native(&syntax, "a.b", "s"), "aDOTb");
}

#[test]
fn token_scope() {
    let syntax = Syntax::new();
    syntax
        .add_token("%", TokenOptions::new().scope(TokenScope::Class), literal("0-9"))
        .unwrap();
    assert_eq!(native(&syntax, "%[%]", ""), "%[0-9]");
    syntax
        .add_token("@", TokenOptions::new().scope(TokenScope::All), literal("x"))
        .unwrap();
    assert_eq!(native(&syntax, "@[@]", ""), "x[x]");
}

#[test]
fn flag_gated_token_registers_its_flag() {
    let syntax = Syntax::new();
    assert!(syntax.compile("a", "Z").is_err());
    syntax
        .add_token("~", TokenOptions::new().flag('Z'), literal("tilde"))
        .unwrap();
    assert!(syntax.is_flag_registered('Z'));
    assert_eq!(native(&syntax, "~", ""), "~");
    assert_eq!(native(&syntax, "~", "Z"), "tilde");
}

#[test]
fn optional_flags_are_passed_to_handler() {
    let syntax = Syntax::new();
    syntax
        .add_token(
            "~",
            TokenOptions::new().optional_flags("W"),
            |_: &Captures<'_>, _: TokenScope, flags: &str, _: &mut CompileContext| {
                Ok(if flags.contains('W') { "wide" } else { "narrow" }.to_string())
            },
        )
        .unwrap();
    assert_eq!(native(&syntax, "~", ""), "narrow");
    assert_eq!(native(&syntax, "~", "W"), "wide");
}

#[test]
fn handlers_see_the_compile_context() {
    let syntax = Syntax::new();
    syntax
        .add_token(
            r"\\G",
            TokenOptions::new(),
            |_: &Captures<'_>, _: TokenScope, _: &str, ctx: &mut CompileContext| {
                Ok(format!("\\{}", ctx.captures_len()))
            },
        )
        .unwrap();
    assert_eq!(native(&syntax, r"(a)(b)\G", ""), r"(a)(b)\2");
}

#[test]
fn handler_errors_propagate() {
    let syntax = Syntax::new();
    syntax
        .add_token(
            "!",
            TokenOptions::new(),
            |caps: &Captures<'_>, _: TokenScope, _: &str, _: &mut CompileContext| {
                Err(RegexError::syntax(
                    SyntaxErrorKind::InvalidEscape,
                    format!("bang at {}", caps.index()),
                ))
            },
        )
        .unwrap();
    let err = syntax.compile("ab!", "").unwrap_err();
    assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::InvalidEscape));
    assert!(err.to_string().contains("bang at 2"));
}

#[test]
fn reparsed_output_meets_other_tokens() {
    let syntax = Syntax::new();
    syntax
        .add_token(
            r"\$\{(\w+)\}",
            TokenOptions::new().reparse(true),
            |caps: &Captures<'_>, _: TokenScope, _: &str, _: &mut CompileContext| {
                Ok(format!("(?<{}>\\w+)", caps.text_of(1)))
            },
        )
        .unwrap();
    let re = syntax.regex(r"${word}-\k<word>", "").unwrap();
    assert_eq!(re.native_source(), r"(\w+)-\1");
    assert!(re.is_match("ab-ab"));
}

#[test]
fn invalid_trigger_registers_nothing() {
    let syntax = Syntax::new();
    let err = syntax
        .add_token("(", TokenOptions::new().flag('Q'), literal(""))
        .unwrap_err();
    assert!(err.is_syntax());
    assert!(!syntax.is_flag_registered('Q'));
    let err = syntax
        .add_token("x", TokenOptions::new().optional_flags("??"), literal(""))
        .unwrap_err();
    assert!(matches!(err, RegexError::InvalidFlag(_)));
}

#[test]
fn new_tokens_invalidate_cached_patterns() {
    let syntax = Syntax::new();
    assert_eq!(native(&syntax, "~", ""), "~");
    syntax
        .add_token("~", TokenOptions::new(), literal("tilde"))
        .unwrap();
    assert_eq!(native(&syntax, "~", ""), "tilde");
}

#[test]
fn registration_during_compile_is_not_cached_over() {
    let syntax = Syntax::new();
    syntax
        .add_token(
            "~",
            TokenOptions::new(),
            |_: &Captures<'_>, _: TokenScope, _: &str, _: &mut CompileContext| {
                std::thread::sleep(std::time::Duration::from_millis(200));
                Ok("t".to_string())
            },
        )
        .unwrap();
    std::thread::scope(|scope| {
        let slow = scope.spawn(|| native(&syntax, "~@", ""));
        std::thread::sleep(std::time::Duration::from_millis(50));
        syntax
            .add_token("@", TokenOptions::new(), literal("AT"))
            .unwrap();
        let during = slow.join().unwrap();
        assert!(during == "t@" || during == "tAT");
    });
    assert_eq!(native(&syntax, "~@", ""), "tAT");
}

#[test]
fn reset_restores_builtins() {
    let syntax = Syntax::new();
    syntax
        .add_token("~", TokenOptions::new().flag('Z'), literal("tilde"))
        .unwrap();
    syntax.install(Features::NAMESPACING);
    syntax.reset();
    assert!(!syntax.is_flag_registered('Z'));
    assert_eq!(syntax.features(), Features::empty());
    assert_eq!(native(&syntax, "(?<n>~)", ""), "(~)");
}

// === Features ===

#[test]
fn feature_names() {
    assert_eq!(
        Features::parse("astral namespacing"),
        Features::ASTRAL | Features::NAMESPACING
    );
    assert_eq!(Features::parse("astral,"), Features::ASTRAL);
    assert_eq!(Features::parse("bogus"), Features::empty());

    let syntax = Syntax::new();
    syntax.install("namespacing");
    assert!(syntax.is_installed(Features::NAMESPACING));
    assert!(!syntax.is_installed("astral namespacing"));
    syntax.uninstall("namespacing");
    assert!(!syntax.is_installed(Features::NAMESPACING));
}

#[test]
fn namespacing_applies_to_new_regexes() {
    let syntax = Syntax::new();
    let before = syntax.regex("(?<x>a)", "").unwrap();
    syntax.install(Features::NAMESPACING);
    let after = syntax.regex("(?<x>a)", "").unwrap();
    assert!(!before.is_namespaced());
    assert!(after.is_namespaced());
    assert!(after.captures("a").unwrap().groups().is_some());
}
