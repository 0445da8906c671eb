//! A subset of Go's `text/template` language.
//!
//! Templates are compiled into a [`TemplateSet`] holding the primary template,
//! numbered auxiliary templates and any `{{define}}`d ones. Functions named at
//! compile time are dispatched to a [`FuncHost`] during execution; the host also
//! receives all rendered output, so function side effects and output stay ordered.
//!
//! Supported: text, `{{- -}}` trimming, comments, string/int/bool/nil literals,
//! `.`, pipelines with `|`, parenthesised sub-pipelines, `if`/`else if`/`else`,
//! `with`, `define`, `template`, and the builtins `and`, `or`, `not`, `eq`, `ne`,
//! `len` and `print`.

mod exec;
mod lex;
mod parse;

use crate::error::TemplateError;
use parse::{Node, Parser};
use std::collections::HashMap;
use std::fmt;

pub(crate) const BUILTINS: &[&str] = &["and", "or", "not", "eq", "ne", "len", "print"];

/// Runtime value of a template expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("<no value>"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
        }
    }
}

/// Receives rendered text and serves the functions bound at compile time.
pub trait FuncHost {
    fn write(&mut self, text: &str);
    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, String>;
}

/// Compiled primary template plus its named sub-templates.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    primary: String,
    templates: HashMap<String, Vec<Node>>,
    bound: Vec<String>,
}

/// Name of the primary template.
pub const PRIMARY: &str = "logMessage";

impl TemplateSet {
    /// Compile `sources[0]` as the primary template and `sources[i]` as `f<i>`.
    ///
    /// `functions` lists the names served by the [`FuncHost`]; any other call
    /// that is not a builtin fails compilation.
    pub fn compile(sources: &[String], functions: &[&str]) -> Result<Self, TemplateError> {
        let mut set = TemplateSet {
            primary: PRIMARY.to_string(),
            templates: HashMap::new(),
            bound: functions.iter().map(|f| f.to_string()).collect(),
        };

        for (i, source) in sources.iter().enumerate().skip(1) {
            set.add(&format!("f{}", i), source, functions)?;
        }
        let primary = sources.first().map(String::as_str).unwrap_or("");
        set.add(PRIMARY, primary, functions)?;

        Ok(set)
    }

    fn add(&mut self, name: &str, source: &str, functions: &[&str]) -> Result<(), TemplateError> {
        let error = |line: usize, message: String| TemplateError::Parse {
            name: name.to_string(),
            line,
            message,
        };

        let items = lex::lex(source).map_err(|e| error(e.line, e.message))?;
        let parsed = Parser::new(items, functions)
            .parse()
            .map_err(|e| error(e.line, e.message))?;

        for (define, body) in parsed.defines {
            self.insert(define, body);
        }
        self.insert(name.to_string(), parsed.body);
        Ok(())
    }

    /// An empty body never replaces an existing definition.
    fn insert(&mut self, name: String, body: Vec<Node>) {
        let empty = body
            .iter()
            .all(|n| matches!(n, Node::Text(t) if t.trim().is_empty()));
        if empty && self.templates.contains_key(&name) {
            return;
        }
        self.templates.insert(name, body);
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&[Node]> {
        self.templates.get(name).map(Vec::as_slice)
    }

    pub(crate) fn is_bound(&self, name: &str) -> bool {
        self.bound.iter().any(|f| f == name)
    }

    /// Execute the primary template with a nil `.`.
    pub fn execute(&self, host: &mut dyn FuncHost) -> Result<(), TemplateError> {
        self.execute_template(&self.primary, host)
    }

    pub fn execute_template(&self, name: &str, host: &mut dyn FuncHost) -> Result<(), TemplateError> {
        exec::Executor::new(self, host)
            .run(name, &Value::Nil)
            .map_err(|message| TemplateError::Exec {
                name: name.to_string(),
                message,
            })
    }
}
