//! Property-based tests for probar-js.
//!
//! Uses proptest to check span fidelity, code generation stability,
//! lowering and the nesting limit over generated programs.

use probar_js::builder::{expr_stmt, string};
use probar_js::format_number;
use probar_js::hir::{ExprKind, StmtKind};
use probar_js::prelude::*;
use proptest::prelude::*;
use swc_core::common::Spanned;

// === Source generators ===

fn ident() -> impl Strategy<Value = String> {
    "v_[a-z0-9]{0,5}"
}

fn leaf() -> impl Strategy<Value = String> {
    prop_oneof![
        ident(),
        (0u32..1000).prop_map(|n| n.to_string()),
        "[a-z ]{0,8}".prop_map(|s| format!("'{s}'")),
    ]
}

fn expr() -> impl Strategy<Value = String> {
    leaf().prop_recursive(3, 16, 3, |inner| {
        let op = prop::sample::select(vec!["+", "-", "*", "==", "===", "<", "&&", "||"]);
        prop_oneof![
            (inner.clone(), op, inner.clone()).prop_map(|(l, op, r)| format!("{l} {op} {r}")),
            (ident(), prop::collection::vec(inner.clone(), 0..3))
                .prop_map(|(f, args)| format!("{f}({})", args.join(", "))),
            (inner.clone(), ident()).prop_map(|(o, p)| format!("({o}).{p}")),
            inner.prop_map(|e| format!("!({e})")),
        ]
    })
}

fn stmt() -> impl Strategy<Value = String> {
    let simple = prop_oneof![
        (ident(), expr()).prop_map(|(n, e)| format!("{n} = {e};")),
        (ident(), expr()).prop_map(|(n, e)| format!("var {n} = {e};")),
        expr().prop_map(|e| format!("{e};")),
    ];
    simple.prop_recursive(2, 8, 3, |inner| {
        prop_oneof![
            (expr(), prop::collection::vec(inner.clone(), 0..3))
                .prop_map(|(t, body)| format!("if ({t}) {{ {} }}", body.join(" "))),
            (expr(), prop::collection::vec(inner, 0..3))
                .prop_map(|(t, body)| format!("while ({t}) {{ {} }}", body.join(" "))),
        ]
    })
}

// === Span fidelity ===

proptest! {
    /// Each top-level statement's span covers exactly its own text.
    #[test]
    fn prop_statement_spans_slice_original_text(
        stmts in prop::collection::vec(stmt(), 1..6),
        sep in prop::sample::select(vec!["\n", " ", "\n  ", "\n// note\n"]),
    ) {
        let source = stmts.join(sep);
        let script = parse(&source).unwrap();
        prop_assert_eq!(script.body.len(), stmts.len());
        for (parsed, text) in script.body.iter().zip(&stmts) {
            prop_assert_eq!(Span::from(parsed.span()).slice(&source), Some(text.as_str()));
        }
    }

    /// Spans never exceed the source and statement spans are ordered.
    #[test]
    fn prop_spans_are_ordered_and_in_bounds(stmts in prop::collection::vec(stmt(), 0..6)) {
        let source = stmts.join("\n");
        let program = compile(&source).unwrap();
        let mut last_end = 0;
        for parsed in &program.body {
            prop_assert!(parsed.span.start >= last_end);
            prop_assert!(parsed.span.end <= source.len());
            prop_assert!(!parsed.span.is_empty());
            last_end = parsed.span.end;
        }
    }
}

// === Code generation ===

proptest! {
    /// Generating from a parse of generated code is a fixed point.
    #[test]
    fn prop_generate_is_stable(stmts in prop::collection::vec(stmt(), 0..6)) {
        let source = stmts.join("\n");
        let first = generate(&parse(&source).unwrap()).unwrap();
        let reparsed = parse(&first);
        prop_assert!(reparsed.is_ok(), "generated code failed to parse: {}", first);
        let second = generate(&reparsed.unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Statement count survives generation.
    #[test]
    fn prop_generate_preserves_statement_count(stmts in prop::collection::vec(stmt(), 0..6)) {
        let source = stmts.join(" ");
        let script = parse(&source).unwrap();
        let regenerated = parse(&generate(&script).unwrap()).unwrap();
        prop_assert_eq!(script.body.len(), regenerated.body.len());
    }
}

// === Literals ===

proptest! {
    /// Integral numbers print without a fractional part.
    #[test]
    fn prop_integral_numbers_format_like_integers(n in any::<i32>()) {
        prop_assert_eq!(format_number(f64::from(n)), n.to_string());
    }

    /// Formatted numbers parse back to the same value.
    #[test]
    fn prop_number_format_parses_back(n in 0.0f64..1e15) {
        let program = compile(&format!("{};", format_number(n))).unwrap();
        let StmtKind::Expr(expr) = &program.body[0].kind else {
            panic!("expected expression statement");
        };
        prop_assert_eq!(&expr.kind, &ExprKind::Num(n));
    }

    /// Synthesized strings print as literals that parse back to the same value.
    #[test]
    fn prop_synthesized_strings_parse_back(s in "\\PC{0,20}") {
        let text = generate_stmt(&expr_stmt(string(&s))).unwrap();
        let program = compile(&text).unwrap();
        let StmtKind::Expr(expr) = &program.body[0].kind else {
            panic!("expected expression statement");
        };
        prop_assert_eq!(&expr.kind, &ExprKind::Str(s));
    }
}

// === Nesting limit ===

proptest! {
    /// Any bracket nesting past the limit is rejected, never overflowed.
    #[test]
    fn prop_nesting_past_the_limit_is_rejected(
        extra in 1usize..2_000,
        open in prop::sample::select(vec!["(", "[", "{"]),
    ) {
        let close = match open { "(" => ")", "[" => "]", _ => "}" };
        let depth = MAX_NESTING_DEPTH + extra;
        let source = format!("x = {}1{};", open.repeat(depth), close.repeat(depth));
        let is_too_deep = matches!(parse(&source), Err(ParseError::TooDeep { .. }));
        prop_assert!(is_too_deep);
    }
}

// === Identifier Property Tests ===

proptest! {
    /// Valid identifiers must be accepted.
    #[test]
    fn prop_valid_identifier_accepted(name in "[a-zA-Z_$][a-zA-Z0-9_$]{0,20}") {
        if !Identifier::is_reserved(&name) {
            prop_assert!(Identifier::new(&name).is_ok(), "Valid identifier rejected: {}", name);
        }
    }

    /// Identifiers starting with digits must be rejected.
    #[test]
    fn prop_digit_start_rejected(digit in "[0-9]", suffix in "[a-zA-Z0-9_$]{0,10}") {
        let name = format!("{digit}{suffix}");
        prop_assert!(Identifier::new(&name).is_err(), "Digit-start should be rejected: {}", name);
    }

    /// Reserved words must be rejected.
    #[test]
    fn prop_reserved_word_rejected(idx in 0..Identifier::RESERVED_WORDS.len()) {
        let word = Identifier::RESERVED_WORDS[idx];
        prop_assert!(Identifier::new(word).is_err(), "Reserved word should be rejected: {}", word);
    }

    /// Identifiers with invalid chars must be rejected.
    #[test]
    fn prop_invalid_chars_rejected(
        valid_prefix in "[a-zA-Z_$]{1,5}",
        invalid_char in "[-!@#%^&*()+=\\[\\]{};':\"<>,./? ]",
        valid_suffix in "[a-zA-Z0-9_$]{0,5}"
    ) {
        let name = format!("{valid_prefix}{invalid_char}{valid_suffix}");
        prop_assert!(Identifier::new(&name).is_err(), "Invalid char should be rejected: {}", name);
    }
}
