use bigdecimal::BigDecimal;
use lisp_interpreter::{Ast, Interpreter, Parser, Scope, Value};

fn eval_program<'de>(source: &'de str, out: &mut Vec<u8>) -> Result<Value<'de>, miette::Error> {
    let ast = Parser::new(None, source)?.parse()?;
    let Ast::Term { args, .. } = ast else {
        unreachable!("the parser always wraps a program in a source term");
    };
    let mut interpreter = Interpreter::new(out, Scope::root());
    let mut last = Value::Void;
    for node in &args {
        last = interpreter.eval(node)?;
    }
    Ok(last)
}

fn eval(source: &str) -> Result<Value<'_>, miette::Error> {
    let mut out = Vec::new();
    eval_program(source, &mut out)
}

fn assert_number(source: &str, expected: i64) {
    match eval(source) {
        Ok(Value::Number(n)) => assert_eq!(n, BigDecimal::from(expected), "evaluating {source}"),
        other => panic!("expected {expected} from {source}, got {other:?}"),
    }
}

/// Compares the rendered number so the result's scale is checked too.
fn assert_decimal(source: &str, expected: &str) {
    match eval(source) {
        Ok(Value::Number(n)) => assert_eq!(n.to_string(), expected, "evaluating {source}"),
        other => panic!("expected {expected} from {source}, got {other:?}"),
    }
}

fn assert_bool(source: &str, expected: bool) {
    match eval(source) {
        Ok(Value::Bool(b)) => assert_eq!(b, expected, "evaluating {source}"),
        other => panic!("expected {expected} from {source}, got {other:?}"),
    }
}

fn assert_list(source: &str, expected: &[i64]) {
    let expected: Vec<BigDecimal> = expected.iter().copied().map(BigDecimal::from).collect();
    match eval(source) {
        Ok(Value::List(items)) => assert_eq!(items, expected, "evaluating {source}"),
        other => panic!("expected a list from {source}, got {other:?}"),
    }
}

fn assert_void(source: &str) {
    match eval(source) {
        Ok(Value::Void) => {}
        other => panic!("expected void from {source}, got {other:?}"),
    }
}

fn assert_failure(source: &str) {
    if eval(source).is_ok() {
        panic!("evaluating {source} succeeded but was expected to fail")
    }
}

fn assert_printed(source: &str, expected: &str) {
    let mut out = Vec::new();
    eval_program(source, &mut out).unwrap_or_else(|e| panic!("evaluating {source} failed: {e:?}"));
    assert_eq!(String::from_utf8(out).unwrap(), expected, "output of {source}");
}

#[test]
fn addition_folds_from_zero() {
    assert_number("(+)", 0);
    assert_number("(+ 7)", 7);
    assert_number("(+ 1 2 3)", 6);
    assert_failure(r#"(+ 1 "howdy" 3)"#);
}

#[test]
fn subtraction_negates_or_folds_from_the_first() {
    assert_failure("(-)");
    assert_number("(- 1)", -1);
    assert_number("(- 1 2 3)", -4);
    assert_failure(r#"(- 1 "howdy")"#);
}

#[test]
fn multiplication_folds_from_one() {
    assert_number("(*)", 1);
    assert_number("(* 4)", 4);
    assert_number("(* 1 2 3)", 6);
    assert_failure(r#"(* true)"#);
}

#[test]
fn division_rounds_each_step_to_three_digits() {
    assert_failure("(/)");
    assert_decimal("(/ 2)", "0.500");
    assert_decimal("(/ 1 3)", "0.333");
    assert_decimal("(/ 2 3)", "0.667");
    assert_decimal("(/ 9 2)", "4.500");
}

#[test]
fn division_breaks_ties_toward_even() {
    // 5/2 = 2.500, then /1000 = 0.0025: the tie rounds to the even digit 2
    assert_decimal("(/ 5 2 1000)", "0.002");
    // 7/2 = 3.500, then /1000 = 0.0035: the tie rounds up to the even digit 4
    assert_decimal("(/ 7 2 1000)", "0.004");
}

#[test]
fn division_by_zero_is_an_error() {
    assert_failure("(/ 1 0)");
    assert_failure("(/ 0)");
}

#[test]
fn equality_is_deep_and_binary() {
    assert_bool("(equals? 10 10)", true);
    assert_bool("(equals? 10 11)", false);
    assert_bool(r#"(equals? 10 "10")"#, false);
    assert_bool("(equals? (list 1 2) (list 1 2))", true);
    assert_bool("(equals? (list 1 2) (list 2 1))", false);
    assert_failure("(equals?)");
    assert_failure("(equals? 10)");
}

#[test]
fn not_requires_a_single_boolean() {
    assert_bool("(not false)", true);
    assert_bool("(not true)", false);
    assert_failure("(not)");
    assert_failure("(not 1)");
    assert_failure("(not true false)");
}

#[test]
fn and_or_have_vacuous_results() {
    assert_bool("(and)", true);
    assert_bool("(or)", false);
    assert_bool("(and true true)", true);
    assert_bool("(and true false true)", false);
    assert_bool("(or false true)", true);
    assert_bool("(or false false)", false);
    assert_failure("(and true 1)");
}

#[test]
fn and_short_circuits_at_the_first_false() {
    // if the second argument ran, it would flip x (and fail to be a boolean)
    assert_number("(do (define x 10) (and false (set! x 20)) x)", 10);
}

#[test]
fn or_short_circuits_at_the_first_true() {
    assert_number("(do (define x 10) (or true (set! x 20)) x)", 10);
}

#[test]
fn comparisons_are_pairwise() {
    assert_bool("(<)", true);
    assert_bool("(< 5)", true);
    assert_bool("(< 1 2 3)", true);
    assert_bool("(< 1 3 2)", false);
    assert_bool("(<= 1 1 2)", true);
    assert_bool("(> 3 2 1)", true);
    assert_bool("(> 3 3)", false);
    assert_bool("(>= 3 3 1)", true);
}

#[test]
fn comparisons_order_strings_too() {
    assert_bool(r#"(< "a" "b" "c")"#, true);
    assert_bool(r#"(< "b" "a")"#, false);
    assert_bool(r#"(>= "b" "a")"#, true);
}

#[test]
fn mixed_comparison_arguments_are_an_error() {
    assert_failure(r#"(< 1 "x" 3)"#);
    assert_failure("(< true)");
    assert_failure("(< 1 true)");
}

#[test]
fn list_collects_numbers_only() {
    assert_list("(list)", &[]);
    assert_list("(list 1 2 3)", &[1, 2, 3]);
    assert_list("(list (+ 1 1) (* 2 2))", &[2, 4]);
    assert_failure(r#"(list "x")"#);
    assert_failure("(list true)");
}

#[test]
fn range_is_half_open() {
    assert_list("(range 1 1)", &[]);
    assert_list("(range 1 5)", &[1, 2, 3, 4]);
    assert_list("(range -2 1)", &[-2, -1, 0]);
    // trailing zeros do not make a bound fractional
    assert_list("(range 1.0 3)", &[1, 2]);
}

#[test]
fn range_rejects_bad_bounds() {
    assert_failure("(range 5 1)");
    assert_failure("(range 1.5 3)");
    assert_failure("(range 1 3.5)");
    assert_failure("(range 1)");
    assert_failure("(range 1 2 3)");
    assert_failure(r#"(range "a" "b")"#);
}

#[test]
fn define_binds_in_the_current_scope() {
    assert_number("(define x 10) x", 10);
    assert_number("(define x (+ 1 2)) (+ x x)", 6);
    assert_failure("(define x)");
}

#[test]
fn do_returns_the_last_value() {
    assert_void("(do)");
    assert_number("(do 1 2 3)", 3);
    assert_number("(do (define x 1) (+ x 1))", 2);
}

#[test]
fn definitions_inside_do_are_scoped_to_it() {
    assert_failure("(do (define x 1)) x");
    assert_number("(define x 1) (do (define x 2)) x", 1);
    assert_number("(define x 1) (do (define x 2) x)", 2);
}

#[test]
fn set_mutates_where_the_name_is_defined() {
    assert_number("(define x 1) (set! x 2) x", 2);
    assert_number("(define x 1) (do (set! x 2)) x", 2);
    assert_number("(define x 1) (do (define x 5) (set! x 9)) x", 1);
    assert_failure("(set! x 1)");
    assert_failure("(set! x)");
}

#[test]
fn while_loops_until_the_condition_fails() {
    assert_number(
        "(define i 0) (while (< i 5) (set! i (+ i 1))) i",
        5,
    );
    assert_void("(while false 1)");
    assert_failure("(while true)");
    assert_failure("(while 1 2)");
}

#[test]
fn print_writes_values_then_one_newline() {
    assert_printed("(print)", "\n");
    assert_printed(r#"(print 1 2 "x")"#, "12x\n");
    assert_printed(r#"(print "a\nb")"#, "a\nb\n");
    assert_printed("(print (list 1 2) true)", "[1, 2]true\n");
    assert_printed("(print (/ 9 2))", "4.500\n");
}

#[test]
fn print_returns_void() {
    assert_void("(print 1)");
}

#[test]
fn literals_and_constants_evaluate_to_themselves() {
    assert_number("42", 42);
    assert_bool("true", true);
    assert_bool("false", false);
    match eval(r#""hello""#) {
        Ok(Value::Str(s)) => assert_eq!(s, "hello"),
        other => panic!("expected a string, got {other:?}"),
    }
}

#[test]
fn calling_a_non_callable_is_an_error() {
    assert_failure("(define f 1) (f 2)");
    assert_failure("(nope 1)");
    assert_failure("x");
}

#[test]
fn parse_then_eval_round_trip() {
    assert_number("(+ 1 2 3)", 6);
    assert_number("[+ 1 [- 5 3]]", 3);
}

#[test]
fn a_failing_block_does_not_corrupt_the_scope_chain() {
    let source = "(define x 1) (do (define x 2) (boom)) x";
    let ast = Parser::new(None, source).unwrap().parse().unwrap();
    let Ast::Term { args, .. } = ast else {
        unreachable!("the parser always wraps a program in a source term");
    };

    let mut interpreter = Interpreter::new(Vec::new(), Scope::root());
    interpreter.eval(&args[0]).unwrap();
    assert!(interpreter.eval(&args[1]).is_err());
    // the failed block's child scope is gone; x resolves in the root again
    assert_eq!(
        interpreter.eval(&args[2]).unwrap(),
        Value::Number(BigDecimal::from(1))
    );
}

#[test]
fn side_effects_before_a_failure_are_kept() {
    let mut out = Vec::new();
    let result = eval_program(r#"(do (print "before") (boom))"#, &mut out);
    assert!(result.is_err());
    assert_eq!(String::from_utf8(out).unwrap(), "before\n");
}

#[test]
fn nested_scopes_see_ancestor_bindings() {
    assert_number("(define x 1) (do (do (+ x 1)))", 2);
    assert_number(
        "(define total 0) (do (define i 0) (while (< i 3) (do (set! total (+ total i)) (set! i (+ i 1))))) total",
        3,
    );
}

#[test]
fn division_rounding_applies_per_step_not_once() {
    // 1/3 rounds to 0.333 first, so the next step is 0.1665, a tie that goes
    // to the even digit; rounding only once at the end would give 0.167
    assert_decimal("(/ 1 3 2)", "0.166");
}

#[test]
fn signed_number_literals_evaluate() {
    assert_number("-5", -5);
    assert_number("(+ -1 +2)", 1);
    assert_decimal("(- 1.5 0.25)", "1.25");
}
