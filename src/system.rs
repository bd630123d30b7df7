use std::{cmp::Ordering, io::Write, rc::Rc};

use bigdecimal::{BigDecimal, One, ToPrimitive, Zero, rounding::RoundingMode};
use miette::{Error, miette};

use crate::{
    eval::{Interpreter, Scope, Value},
    parse::Ast,
};

/// Every division rounds to 3 fractional digits, ties to even.
const DIVISION_SCALE: i64 = 3;

fn require_number<'de>(value: Value<'de>) -> Result<BigDecimal, Error> {
    match value {
        Value::Number(n) => Ok(n),
        other => Err(miette!("Expected {other} to have type number.")),
    }
}

fn require_bool(value: Value<'_>) -> Result<bool, Error> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(miette!("Expected {other} to have type boolean.")),
    }
}

fn eval_numbers<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
) -> Result<Vec<BigDecimal>, Error> {
    args.iter()
        .map(|arg| require_number(interpreter.eval_in(arg, scope)?))
        .collect()
}

pub fn print<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
) -> Result<Value<'de>, Error> {
    for arg in args {
        let value = interpreter.eval_in(arg, scope)?;
        write!(interpreter.out, "{value}").map_err(|e| miette!("{e}"))?;
    }
    writeln!(interpreter.out).map_err(|e| miette!("{e}"))?;
    Ok(Value::Void)
}

pub fn add<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
) -> Result<Value<'de>, Error> {
    let mut sum = BigDecimal::zero();
    for arg in args {
        sum = sum + require_number(interpreter.eval_in(arg, scope)?)?;
    }
    Ok(Value::Number(sum))
}

pub fn subtract<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
) -> Result<Value<'de>, Error> {
    let mut numbers = eval_numbers(interpreter, args, scope)?.into_iter();
    let Some(first) = numbers.next() else {
        return Err(miette!("Arguments to - cannot be empty."));
    };
    if numbers.len() == 0 {
        return Ok(Value::Number(-first));
    }
    Ok(Value::Number(numbers.fold(first, |acc, n| acc - n)))
}

pub fn multiply<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
) -> Result<Value<'de>, Error> {
    let mut product = BigDecimal::one();
    for arg in args {
        product = product * require_number(interpreter.eval_in(arg, scope)?)?;
    }
    Ok(Value::Number(product))
}

pub fn divide<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
) -> Result<Value<'de>, Error> {
    let mut numbers = eval_numbers(interpreter, args, scope)?.into_iter();
    let Some(first) = numbers.next() else {
        return Err(miette!("Arguments to / cannot be empty."));
    };
    if numbers.len() == 0 {
        return Ok(Value::Number(checked_divide(&BigDecimal::one(), &first)?));
    }
    let mut quotient = first;
    for divisor in numbers {
        quotient = checked_divide(&quotient, &divisor)?;
    }
    Ok(Value::Number(quotient))
}

fn checked_divide(dividend: &BigDecimal, divisor: &BigDecimal) -> Result<BigDecimal, Error> {
    if divisor.is_zero() {
        return Err(miette!("division by zero"));
    }
    Ok((dividend / divisor).with_scale_round(DIVISION_SCALE, RoundingMode::HalfEven))
}

pub fn equals<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
) -> Result<Value<'de>, Error> {
    let [lhs, rhs] = args else {
        return Err(miette!("Expected 2 arguments, received {}.", args.len()));
    };
    let lhs = interpreter.eval_in(lhs, scope)?;
    let rhs = interpreter.eval_in(rhs, scope)?;
    Ok(Value::Bool(lhs == rhs))
}

pub fn not<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
) -> Result<Value<'de>, Error> {
    let [arg] = args else {
        return Err(miette!("Expected 1 argument, received {}.", args.len()));
    };
    Ok(Value::Bool(!require_bool(interpreter.eval_in(arg, scope)?)?))
}

pub fn and<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
) -> Result<Value<'de>, Error> {
    for arg in args {
        if !require_bool(interpreter.eval_in(arg, scope)?)? {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

pub fn or<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
) -> Result<Value<'de>, Error> {
    for arg in args {
        if require_bool(interpreter.eval_in(arg, scope)?)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

pub fn while_loop<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
) -> Result<Value<'de>, Error> {
    let [condition, body] = args else {
        return Err(miette!("Expected 2 arguments, received {}.", args.len()));
    };
    while require_bool(interpreter.eval_in(condition, scope)?)? {
        interpreter.eval_in(body, scope)?;
    }
    Ok(Value::Void)
}

pub fn do_block<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
) -> Result<Value<'de>, Error> {
    // the child scope dies with this call frame, even when an argument fails
    let scope = scope.child();
    let mut last = Value::Void;
    for arg in args {
        last = interpreter.eval_in(arg, &scope)?;
    }
    Ok(last)
}

/// Shared body of `<`, `<=`, `>`, and `>=`. Arguments are evaluated once,
/// left to right, and must be uniformly numeric or uniformly string.
pub fn compare<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
    accept: impl Fn(Ordering) -> bool,
) -> Result<Value<'de>, Error> {
    let values = args
        .iter()
        .map(|arg| interpreter.eval_in(arg, scope))
        .collect::<Result<Vec<_>, _>>()?;
    if values.is_empty() {
        return Ok(Value::Bool(true));
    }
    let ordered = if values.iter().all(|v| matches!(v, Value::Number(_))) {
        values.windows(2).all(|pair| match pair {
            [Value::Number(a), Value::Number(b)] => accept(a.cmp(b)),
            _ => unreachable!(),
        })
    } else if values.iter().all(|v| matches!(v, Value::Str(_))) {
        values.windows(2).all(|pair| match pair {
            [Value::Str(a), Value::Str(b)] => accept(a.cmp(b)),
            _ => unreachable!(),
        })
    } else {
        return Err(miette!("Arguments not comparable."));
    };
    Ok(Value::Bool(ordered))
}

pub fn list<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
) -> Result<Value<'de>, Error> {
    Ok(Value::List(eval_numbers(interpreter, args, scope)?))
}

pub fn range<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
) -> Result<Value<'de>, Error> {
    let [start, end] = args else {
        return Err(miette!("Expected 2 arguments, received {}.", args.len()));
    };
    let start = require_number(interpreter.eval_in(start, scope)?)?;
    let end = require_number(interpreter.eval_in(end, scope)?)?;
    if !is_integral(&start) || !is_integral(&end) {
        return Err(miette!("Argument is not an exact integer."));
    }
    if start > end {
        return Err(miette!("Second argument less than first."));
    }
    let (Some(start), Some(end)) = (start.to_i64(), end.to_i64()) else {
        return Err(miette!("Argument out of range."));
    };
    Ok(Value::List((start..end).map(BigDecimal::from).collect()))
}

fn is_integral(n: &BigDecimal) -> bool {
    // equality ignores trailing zeros, so 2.00 still counts as integral
    n.with_scale_round(0, RoundingMode::Floor) == *n
}

pub fn define<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
) -> Result<Value<'de>, Error> {
    let [name, value, ..] = args else {
        return Err(miette!("Expected 2 arguments, received {}.", args.len()));
    };
    let value = interpreter.eval_in(value, scope)?;
    scope.define(name.to_string(), value);
    Ok(Value::Void)
}

pub fn set<'de, W: Write>(
    interpreter: &mut Interpreter<'de, W>,
    args: &[Ast<'de>],
    scope: &Rc<Scope<'de>>,
) -> Result<Value<'de>, Error> {
    let [name, value, ..] = args else {
        return Err(miette!("Expected 2 arguments, received {}.", args.len()));
    };
    let value = interpreter.eval_in(value, scope)?;
    let name = name.to_string();
    if scope.set(&name, value) {
        Ok(Value::Void)
    } else {
        Err(miette!("unbound identifier `{name}`"))
    }
}
