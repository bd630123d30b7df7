use std::{
    borrow::Cow, cell::RefCell, cmp::Ordering, collections::HashMap, fmt::Display, io::Write,
    rc::Rc,
};

use bigdecimal::BigDecimal;
use miette::{Error, miette};

use crate::{parse::Ast, system};

#[derive(Debug, Clone, PartialEq)]
pub enum Value<'de> {
    Number(BigDecimal),
    Str(Cow<'de, str>),
    Bool(bool),
    List(Vec<BigDecimal>),
    Void,
    Builtin(Builtin),
}

impl Value<'_> {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
            Value::List(_) => "list",
            Value::Void => "void",
            Value::Builtin(_) => "builtin",
        }
    }
}

impl Display for Value<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Void => write!(f, "void"),
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name()),
        }
    }
}

/// The standard library as a closed set of native callables. Each receives its
/// argument nodes *unevaluated* together with the ambient scope, so special
/// forms control evaluation order, short-circuiting, and scope mutation
/// themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Add,
    Subtract,
    Multiply,
    Divide,
    Equals,
    Not,
    And,
    Or,
    While,
    Do,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    List,
    Range,
    Define,
    Set,
}

impl Builtin {
    pub const ALL: [Builtin; 19] = [
        Builtin::Print,
        Builtin::Add,
        Builtin::Subtract,
        Builtin::Multiply,
        Builtin::Divide,
        Builtin::Equals,
        Builtin::Not,
        Builtin::And,
        Builtin::Or,
        Builtin::While,
        Builtin::Do,
        Builtin::Less,
        Builtin::LessEqual,
        Builtin::Greater,
        Builtin::GreaterEqual,
        Builtin::List,
        Builtin::Range,
        Builtin::Define,
        Builtin::Set,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Add => "+",
            Builtin::Subtract => "-",
            Builtin::Multiply => "*",
            Builtin::Divide => "/",
            Builtin::Equals => "equals?",
            Builtin::Not => "not",
            Builtin::And => "and",
            Builtin::Or => "or",
            Builtin::While => "while",
            Builtin::Do => "do",
            Builtin::Less => "<",
            Builtin::LessEqual => "<=",
            Builtin::Greater => ">",
            Builtin::GreaterEqual => ">=",
            Builtin::List => "list",
            Builtin::Range => "range",
            Builtin::Define => "define",
            Builtin::Set => "set!",
        }
    }

    fn call<'de, W: Write>(
        self,
        interpreter: &mut Interpreter<'de, W>,
        args: &[Ast<'de>],
        scope: &Rc<Scope<'de>>,
    ) -> Result<Value<'de>, Error> {
        match self {
            Builtin::Print => system::print(interpreter, args, scope),
            Builtin::Add => system::add(interpreter, args, scope),
            Builtin::Subtract => system::subtract(interpreter, args, scope),
            Builtin::Multiply => system::multiply(interpreter, args, scope),
            Builtin::Divide => system::divide(interpreter, args, scope),
            Builtin::Equals => system::equals(interpreter, args, scope),
            Builtin::Not => system::not(interpreter, args, scope),
            Builtin::And => system::and(interpreter, args, scope),
            Builtin::Or => system::or(interpreter, args, scope),
            Builtin::While => system::while_loop(interpreter, args, scope),
            Builtin::Do => system::do_block(interpreter, args, scope),
            Builtin::Less => system::compare(interpreter, args, scope, |o| o == Ordering::Less),
            Builtin::LessEqual => {
                system::compare(interpreter, args, scope, |o| o != Ordering::Greater)
            }
            Builtin::Greater => {
                system::compare(interpreter, args, scope, |o| o == Ordering::Greater)
            }
            Builtin::GreaterEqual => {
                system::compare(interpreter, args, scope, |o| o != Ordering::Less)
            }
            Builtin::List => system::list(interpreter, args, scope),
            Builtin::Range => system::range(interpreter, args, scope),
            Builtin::Define => system::define(interpreter, args, scope),
            Builtin::Set => system::set(interpreter, args, scope),
        }
    }
}

/// A name-to-value mapping chained to at most one parent. Lookup walks the
/// chain outward; `define` only ever touches the receiver's own bindings.
#[derive(Debug, Default)]
pub struct Scope<'de> {
    bindings: RefCell<HashMap<String, Value<'de>>>,
    parent: Option<Rc<Scope<'de>>>,
}

impl<'de> Scope<'de> {
    pub fn root() -> Rc<Self> {
        Rc::new(Scope::default())
    }

    pub fn child(self: &Rc<Self>) -> Rc<Self> {
        Rc::new(Scope {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(self)),
        })
    }

    pub fn define(&self, name: impl Into<String>, value: Value<'de>) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<Value<'de>> {
        match self.bindings.borrow().get(name) {
            Some(value) => Some(value.clone()),
            None => self.parent.as_ref().and_then(|parent| parent.lookup(name)),
        }
    }

    /// Re-binds `name` in the scope where it is currently defined, which is
    /// not necessarily the receiver. Returns false if no scope in the chain
    /// defines it.
    pub fn set(&self, name: &str, value: Value<'de>) -> bool {
        if let Some(slot) = self.bindings.borrow_mut().get_mut(name) {
            *slot = value;
            return true;
        }
        self.parent
            .as_ref()
            .is_some_and(|parent| parent.set(name, value))
    }
}

pub struct Interpreter<'de, W> {
    pub(crate) out: W,
    root: Rc<Scope<'de>>,
}

impl<'de, W: Write> Interpreter<'de, W> {
    /// Installs the standard library into `root` and binds the interpreter's
    /// output sink. Only `print` writes to the sink.
    pub fn new(out: W, root: Rc<Scope<'de>>) -> Self {
        for builtin in Builtin::ALL {
            root.define(builtin.name(), Value::Builtin(builtin));
        }
        root.define("true", Value::Bool(true));
        root.define("false", Value::Bool(false));
        Interpreter { out, root }
    }

    pub fn eval(&mut self, ast: &Ast<'de>) -> Result<Value<'de>, Error> {
        let scope = Rc::clone(&self.root);
        self.eval_in(ast, &scope)
    }

    /// Evaluates `ast` under the given scope. The scope travels as an explicit
    /// parameter: block builtins build a child and pass it down, so the
    /// enclosing scope is untouched on every exit path, failing or not.
    pub fn eval_in(
        &mut self,
        ast: &Ast<'de>,
        scope: &Rc<Scope<'de>>,
    ) -> Result<Value<'de>, Error> {
        match ast {
            Ast::Term { name, args } => match scope.lookup(name) {
                Some(Value::Builtin(builtin)) => builtin.call(self, args, scope),
                Some(value) => Err(miette!(
                    "`{name}` is not callable, found a {}",
                    value.type_name()
                )),
                None => Err(miette!("unbound identifier `{name}`")),
            },
            Ast::Identifier(name) => scope
                .lookup(name)
                .ok_or_else(|| miette!("unbound identifier `{name}`")),
            Ast::NumberLiteral(n) => Ok(Value::Number(n.clone())),
            Ast::StringLiteral(s) => Ok(Value::Str(s.clone())),
        }
    }
}
