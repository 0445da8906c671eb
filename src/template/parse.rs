// src/template/parse.rs - builds node trees from lexed items
use super::lex::{Item, Token};
use super::BUILTINS;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Action {
        pipe: Pipeline,
        line: usize,
    },
    If {
        cond: Pipeline,
        then: Vec<Node>,
        otherwise: Vec<Node>,
        line: usize,
    },
    With {
        pipe: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
        line: usize,
    },
    Template {
        name: String,
        pipe: Option<Pipeline>,
        line: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pipeline {
    pub cmds: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    pub args: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Func(String),
    Str(String),
    Int(i64),
    Bool(bool),
    Nil,
    Dot,
    Sub(Pipeline),
}

#[derive(Debug)]
pub(crate) struct ParseError {
    pub line: usize,
    pub message: String,
}

/// How a node list ended.
enum End {
    Eof,
    End { line: usize },
    Else { rest: Vec<Token>, line: usize },
}

/// Result of parsing one template source: its body plus any `{{define}}`d templates.
pub(crate) struct Parsed {
    pub body: Vec<Node>,
    pub defines: Vec<(String, Vec<Node>)>,
}

pub(crate) struct Parser<'a> {
    items: std::vec::IntoIter<Item>,
    functions: &'a [&'a str],
    defines: Vec<(String, Vec<Node>)>,
}

fn fail<T>(line: usize, message: impl Into<String>) -> Result<T, ParseError> {
    Err(ParseError {
        line,
        message: message.into(),
    })
}

impl<'a> Parser<'a> {
    pub(crate) fn new(items: Vec<Item>, functions: &'a [&'a str]) -> Self {
        Parser {
            items: items.into_iter(),
            functions,
            defines: Vec::new(),
        }
    }

    pub(crate) fn parse(mut self) -> Result<Parsed, ParseError> {
        let (body, end) = self.parse_list(true)?;
        match end {
            End::Eof => Ok(Parsed {
                body,
                defines: self.defines,
            }),
            End::End { line } => fail(line, "unexpected {{end}}"),
            End::Else { line, .. } => fail(line, "unexpected {{else}}"),
        }
    }

    fn parse_list(&mut self, top_level: bool) -> Result<(Vec<Node>, End), ParseError> {
        let mut nodes = Vec::new();

        while let Some(item) = self.items.next() {
            let (tokens, line) = match item {
                Item::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Item::Action { tokens, line } => (tokens, line),
            };

            let keyword = match tokens.first() {
                Some(Token::Ident(word)) => word.as_str(),
                _ => "",
            };

            match keyword {
                "end" => {
                    if tokens.len() > 1 {
                        return fail(line, "unexpected arguments in end");
                    }
                    return Ok((nodes, End::End { line }));
                }
                "else" => {
                    return Ok((
                        nodes,
                        End::Else {
                            rest: tokens[1..].to_vec(),
                            line,
                        },
                    ))
                }
                "if" => nodes.push(self.parse_if(&tokens[1..], line)?),
                "with" => nodes.push(self.parse_with(&tokens[1..], line)?),
                "define" => {
                    if !top_level {
                        return fail(line, "{{define}} clause can only appear at top level");
                    }
                    self.parse_define(&tokens[1..], line)?;
                }
                "template" => nodes.push(self.parse_template(&tokens[1..], line)?),
                "range" | "block" | "break" | "continue" => {
                    return fail(line, format!("{{{{{}}}}} is not supported", keyword));
                }
                _ => nodes.push(Node::Action {
                    pipe: self.parse_pipeline(&tokens, line)?,
                    line,
                }),
            }
        }

        Ok((nodes, End::Eof))
    }

    /// Body of a control block up to `{{end}}`, returning the else branch if any.
    fn parse_branches(
        &mut self,
        context: &str,
        line: usize,
        allow_else_if: bool,
    ) -> Result<(Vec<Node>, Vec<Node>), ParseError> {
        let (body, end) = self.parse_list(false)?;
        match end {
            End::End { .. } => Ok((body, Vec::new())),
            End::Eof => fail(line, format!("unexpected EOF in {}", context)),
            End::Else { rest, line } => {
                if rest.is_empty() {
                    let (otherwise, end) = self.parse_list(false)?;
                    return match end {
                        End::End { .. } => Ok((body, otherwise)),
                        End::Eof => fail(line, format!("unexpected EOF in {}", context)),
                        End::Else { line, .. } => {
                            fail(line, format!("expected end; found {{{{else}}}} in {}", context))
                        }
                    };
                }
                match rest.first() {
                    Some(Token::Ident(word)) if word == "if" && allow_else_if => {
                        // `else if` shares the enclosing block's {{end}}
                        let nested = self.parse_if(&rest[1..], line)?;
                        Ok((body, vec![nested]))
                    }
                    _ => fail(line, format!("unexpected arguments in else of {}", context)),
                }
            }
        }
    }

    fn parse_if(&mut self, tokens: &[Token], line: usize) -> Result<Node, ParseError> {
        let cond = self.parse_pipeline(tokens, line)?;
        let (then, otherwise) = self.parse_branches("if", line, true)?;
        Ok(Node::If {
            cond,
            then,
            otherwise,
            line,
        })
    }

    fn parse_with(&mut self, tokens: &[Token], line: usize) -> Result<Node, ParseError> {
        let pipe = self.parse_pipeline(tokens, line)?;
        let (body, otherwise) = self.parse_branches("with", line, false)?;
        Ok(Node::With {
            pipe,
            body,
            otherwise,
            line,
        })
    }

    fn parse_define(&mut self, tokens: &[Token], line: usize) -> Result<(), ParseError> {
        let name = match tokens {
            [Token::Str(name)] => name.clone(),
            _ => return fail(line, "define clause requires a single quoted name"),
        };
        let (body, end) = self.parse_list(false)?;
        match end {
            End::End { .. } => {
                self.defines.push((name, body));
                Ok(())
            }
            End::Eof => fail(line, "unexpected EOF in define clause"),
            End::Else { line, .. } => fail(line, "unexpected {{else}} in define clause"),
        }
    }

    fn parse_template(&mut self, tokens: &[Token], line: usize) -> Result<Node, ParseError> {
        let (name, rest) = match tokens.split_first() {
            Some((Token::Str(name), rest)) => (name.clone(), rest),
            _ => return fail(line, "template clause requires a quoted name"),
        };
        let pipe = if rest.is_empty() {
            None
        } else {
            Some(self.parse_pipeline(rest, line)?)
        };
        Ok(Node::Template { name, pipe, line })
    }

    fn parse_pipeline(&self, tokens: &[Token], line: usize) -> Result<Pipeline, ParseError> {
        if tokens.is_empty() {
            return fail(line, "missing value for command");
        }

        let mut cmds = Vec::new();
        let mut depth = 0usize;
        let mut start = 0;
        for (i, token) in tokens.iter().enumerate() {
            match token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| ParseError {
                            line,
                            message: "unexpected right paren".to_string(),
                        })?;
                }
                Token::Pipe if depth == 0 => {
                    cmds.push(self.parse_command(&tokens[start..i], line)?);
                    start = i + 1;
                }
                _ => {}
            }
        }
        if depth != 0 {
            return fail(line, "unclosed left paren");
        }
        cmds.push(self.parse_command(&tokens[start..], line)?);

        if cmds.iter().any(|cmd| matches!(cmd.args.first(), Some(Operand::Nil))) {
            return fail(line, "nil is not a command");
        }

        for (stage, cmd) in cmds.iter().enumerate().skip(1) {
            if !matches!(cmd.args.first(), Some(Operand::Func(_))) {
                return fail(
                    line,
                    format!("non executable command in pipeline stage {}", stage + 1),
                );
            }
        }

        Ok(Pipeline { cmds })
    }

    fn parse_command(&self, tokens: &[Token], line: usize) -> Result<Command, ParseError> {
        if tokens.is_empty() {
            return fail(line, "missing command");
        }

        let mut args = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let operand = match &tokens[i] {
                Token::Ident(name) => {
                    if !self.functions.contains(&name.as_str()) && !BUILTINS.contains(&name.as_str())
                    {
                        return fail(line, format!("function {:?} not defined", name));
                    }
                    Operand::Func(name.clone())
                }
                Token::Str(s) => Operand::Str(s.clone()),
                Token::Int(n) => Operand::Int(*n),
                Token::Bool(b) => Operand::Bool(*b),
                Token::Nil => Operand::Nil,
                Token::Dot => Operand::Dot,
                Token::LParen => {
                    let close = matching_paren(tokens, i).ok_or_else(|| ParseError {
                        line,
                        message: "unclosed left paren".to_string(),
                    })?;
                    let sub = self.parse_pipeline(&tokens[i + 1..close], line)?;
                    i = close;
                    Operand::Sub(sub)
                }
                Token::RParen => return fail(line, "unexpected right paren"),
                Token::Pipe => return fail(line, "missing command"),
                Token::Field(name) => {
                    return fail(line, format!("field access .{} is not supported", name))
                }
                Token::Variable(name) => {
                    return fail(line, format!("variable ${} is not supported", name))
                }
                Token::Declare => return fail(line, "variable declarations are not supported"),
            };
            args.push(operand);
            i += 1;
        }

        Ok(Command { args })
    }
}

fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::lex::lex;

    fn parse(src: &str) -> Result<Parsed, ParseError> {
        Parser::new(lex(src).map_err(|e| ParseError {
            line: e.line,
            message: e.message,
        })?, &["ikey", "dsonde"])
        .parse()
    }

    #[test]
    fn test_function_call_with_pipe() {
        let parsed = parse(r#"{{ikey "uid" | len}}"#).unwrap();
        let Node::Action { pipe, .. } = &parsed.body[0] else {
            panic!("expected action");
        };
        assert_eq!(pipe.cmds.len(), 2);
        assert_eq!(
            pipe.cmds[0].args,
            vec![Operand::Func("ikey".into()), Operand::Str("uid".into())]
        );
        assert_eq!(pipe.cmds[1].args, vec![Operand::Func("len".into())]);
    }

    #[test]
    fn test_else_if_chain() {
        let parsed = parse(r#"{{if eq (ikey "a") "1"}}one{{else if true}}two{{else}}three{{end}}"#)
            .unwrap();
        assert_eq!(parsed.body.len(), 1);
        let Node::If { otherwise, .. } = &parsed.body[0] else {
            panic!("expected if");
        };
        assert!(matches!(otherwise[0], Node::If { .. }));
    }

    #[test]
    fn test_define_is_collected() {
        let parsed = parse(r#"{{define "x"}}body{{end}}main"#).unwrap();
        assert_eq!(parsed.defines.len(), 1);
        assert_eq!(parsed.defines[0].0, "x");
        assert_eq!(parsed.body, vec![Node::Text("main".into())]);
    }

    #[test]
    fn test_undefined_function() {
        let err = parse(r#"{{ikey "a"}}{{nope "b"}}"#).err().unwrap();
        assert_eq!(err.message, "function \"nope\" not defined");
    }

    #[test]
    fn test_structural_errors() {
        assert!(parse("{{if true}}open").is_err());
        assert!(parse("{{end}}").is_err());
        assert!(parse("{{else}}").is_err());
        assert!(parse("{{if true}}{{define \"x\"}}{{end}}{{end}}").is_err());
        assert!(parse("{{range .}}{{end}}").is_err());
        assert!(parse("{{.Name}}").is_err());
        assert!(parse("{{(ikey \"a\"}}").is_err());
        assert!(parse("{{\"a\" | \"b\"}}").is_err());
        assert!(parse("{{}}").is_err());
    }

    #[test]
    fn test_nil_is_not_a_command() {
        for src in ["{{nil}}", "{{if nil}}x{{end}}", "{{print (nil)}}"] {
            let err = parse(src).err().unwrap();
            assert_eq!(err.message, "nil is not a command", "source {}", src);
        }
        assert!(parse("{{eq nil nil}}").is_ok());
    }
}
