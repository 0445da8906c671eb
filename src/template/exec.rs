// src/template/exec.rs - walks node trees against a function host
use super::parse::{Command, Node, Operand, Pipeline};
use super::{FuncHost, TemplateSet, Value};

/// Nested `{{template}}` invocations allowed before execution gives up.
const MAX_DEPTH: usize = 100;

pub(crate) struct Executor<'a> {
    set: &'a TemplateSet,
    host: &'a mut dyn FuncHost,
    current: String,
    depth: usize,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(set: &'a TemplateSet, host: &'a mut dyn FuncHost) -> Self {
        Executor {
            set,
            host,
            current: String::new(),
            depth: 0,
        }
    }

    pub(crate) fn run(&mut self, name: &str, dot: &Value) -> Result<(), String> {
        let set = self.set;
        let nodes = set
            .lookup(name)
            .ok_or_else(|| format!("no such template {:?}", name))?;

        if self.depth == MAX_DEPTH {
            return Err(format!("exceeded maximum template depth ({})", MAX_DEPTH));
        }
        self.depth += 1;
        let caller = std::mem::replace(&mut self.current, name.to_string());
        let result = self.walk(nodes, dot);
        self.current = caller;
        self.depth -= 1;
        result
    }

    fn walk(&mut self, nodes: &[Node], dot: &Value) -> Result<(), String> {
        for node in nodes {
            match node {
                Node::Text(text) => self.host.write(text),
                Node::Action { pipe, line } => {
                    let value = self.eval_pipeline(pipe, dot).map_err(|e| self.at(*line, e))?;
                    self.host.write(&value.to_string());
                }
                Node::If {
                    cond,
                    then,
                    otherwise,
                    line,
                } => {
                    let value = self.eval_pipeline(cond, dot).map_err(|e| self.at(*line, e))?;
                    if value.is_truthy() {
                        self.walk(then, dot)?;
                    } else {
                        self.walk(otherwise, dot)?;
                    }
                }
                Node::With {
                    pipe,
                    body,
                    otherwise,
                    line,
                } => {
                    let value = self.eval_pipeline(pipe, dot).map_err(|e| self.at(*line, e))?;
                    if value.is_truthy() {
                        self.walk(body, &value)?;
                    } else {
                        self.walk(otherwise, dot)?;
                    }
                }
                Node::Template { name, pipe, line } => {
                    let arg = match pipe {
                        Some(pipe) => self.eval_pipeline(pipe, dot).map_err(|e| self.at(*line, e))?,
                        None => Value::Nil,
                    };
                    self.run(name, &arg).map_err(|e| {
                        if e.starts_with("executing") {
                            e
                        } else {
                            self.at(*line, e)
                        }
                    })?;
                }
            }
        }
        Ok(())
    }

    fn at(&self, line: usize, message: String) -> String {
        format!("executing {:?} at line {}: {}", self.current, line, message)
    }

    fn eval_pipeline(&mut self, pipe: &Pipeline, dot: &Value) -> Result<Value, String> {
        let mut last = None;
        for cmd in &pipe.cmds {
            last = Some(self.eval_command(cmd, dot, last.take())?);
        }
        Ok(last.unwrap_or(Value::Nil))
    }

    fn eval_command(
        &mut self,
        cmd: &Command,
        dot: &Value,
        piped: Option<Value>,
    ) -> Result<Value, String> {
        match cmd.args.split_first() {
            Some((Operand::Func(name), args)) => self.call(name, args, dot, piped),
            Some((operand, [])) if piped.is_none() => self.eval_operand(operand, dot),
            Some((operand, _)) => Err(format!(
                "can't give argument to non-function {}",
                describe(operand)
            )),
            None => Err("missing command".to_string()),
        }
    }

    fn eval_operand(&mut self, operand: &Operand, dot: &Value) -> Result<Value, String> {
        Ok(match operand {
            Operand::Str(s) => Value::Str(s.clone()),
            Operand::Int(n) => Value::Int(*n),
            Operand::Bool(b) => Value::Bool(*b),
            Operand::Nil => Value::Nil,
            Operand::Dot => dot.clone(),
            Operand::Sub(pipe) => self.eval_pipeline(pipe, dot)?,
            Operand::Func(name) => self.call(name, &[], dot, None)?,
        })
    }

    fn call(
        &mut self,
        name: &str,
        operands: &[Operand],
        dot: &Value,
        piped: Option<Value>,
    ) -> Result<Value, String> {
        let bound = self.set.is_bound(name);

        if !bound && (name == "and" || name == "or") {
            return self.short_circuit(name, operands, dot, piped);
        }

        let mut args = Vec::with_capacity(operands.len() + 1);
        for operand in operands {
            args.push(self.eval_operand(operand, dot)?);
        }
        args.extend(piped);

        let result = if bound {
            self.host.call(name, &args)
        } else {
            builtin(name, &args)
        };
        result.map_err(|e| format!("error calling {}: {}", name, e))
    }

    /// `and` / `or` stop evaluating at the first falsy / truthy argument.
    fn short_circuit(
        &mut self,
        name: &str,
        operands: &[Operand],
        dot: &Value,
        piped: Option<Value>,
    ) -> Result<Value, String> {
        if operands.is_empty() && piped.is_none() {
            return Err(format!("wrong number of args for {}: want at least 1 got 0", name));
        }
        let stop_on = name == "or";

        let mut last = Value::Nil;
        for operand in operands {
            last = self.eval_operand(operand, dot)?;
            if last.is_truthy() == stop_on {
                return Ok(last);
            }
        }
        if let Some(value) = piped {
            last = value;
        }
        Ok(last)
    }
}

fn describe(operand: &Operand) -> String {
    match operand {
        Operand::Str(s) => format!("{:?}", s),
        Operand::Int(n) => n.to_string(),
        Operand::Bool(b) => b.to_string(),
        Operand::Nil => "nil".to_string(),
        Operand::Dot => ".".to_string(),
        Operand::Sub(_) => "(pipeline)".to_string(),
        Operand::Func(name) => name.clone(),
    }
}

fn arity(name: &str, args: &[Value], want: usize) -> Result<(), String> {
    if args.len() != want {
        return Err(format!(
            "wrong number of args for {}: want {} got {}",
            name,
            want,
            args.len()
        ));
    }
    Ok(())
}

fn equal(a: &Value, b: &Value) -> Result<bool, String> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x == y),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        _ => Err("incompatible types for comparison".to_string()),
    }
}

fn builtin(name: &str, args: &[Value]) -> Result<Value, String> {
    match name {
        "not" => {
            arity(name, args, 1)?;
            Ok(Value::Bool(!args[0].is_truthy()))
        }
        "eq" => {
            if args.len() < 2 {
                return Err(format!(
                    "wrong number of args for eq: want at least 2 got {}",
                    args.len()
                ));
            }
            for other in &args[1..] {
                if equal(&args[0], other)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "ne" => {
            arity(name, args, 2)?;
            Ok(Value::Bool(!equal(&args[0], &args[1])?))
        }
        "len" => {
            arity(name, args, 1)?;
            match &args[0] {
                Value::Str(s) => Ok(Value::Int(s.len() as i64)),
                other => Err(format!("len of {}", other.kind())),
            }
        }
        "print" => {
            let mut out = String::new();
            for (i, arg) in args.iter().enumerate() {
                let spaced = i > 0
                    && !matches!(arg, Value::Str(_))
                    && !matches!(args[i - 1], Value::Str(_));
                if spaced {
                    out.push(' ');
                }
                out.push_str(&arg.to_string());
            }
            Ok(Value::Str(out))
        }
        _ => Err(format!("function {:?} not defined", name)),
    }
}
