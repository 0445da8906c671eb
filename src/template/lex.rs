// src/template/lex.rs - splits template source into text and action items

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Bool(bool),
    Nil,
    Dot,
    Field(String),
    Variable(String),
    Declare,
    Pipe,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Item {
    Text(String),
    Action { tokens: Vec<Token>, line: usize },
}

#[derive(Debug)]
pub(crate) struct LexError {
    pub line: usize,
    pub message: String,
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn newlines(s: &str) -> usize {
    s.bytes().filter(|&b| b == b'\n').count()
}

/// Lex a whole template. Comments are dropped; trim markers are applied to neighbouring text.
pub(crate) fn lex(src: &str) -> Result<Vec<Item>, LexError> {
    let mut items = Vec::new();
    let mut rest = src;
    let mut line = 1;
    let mut trim_next = false;

    loop {
        let Some(pos) = rest.find(OPEN) else {
            push_text(&mut items, rest, trim_next, false);
            break;
        };

        let after = &rest[pos + OPEN.len()..];
        let trim_left = after.starts_with('-') && after[1..].starts_with(is_space);
        push_text(&mut items, &rest[..pos], trim_next, trim_left);
        line += newlines(&rest[..pos]);

        // "{{- " is a marker, the space after the dash belongs to it
        let body = if trim_left { &after[2..] } else { after };
        line += newlines(&after[..after.len() - body.len()]);
        let action = lex_action(body, line)?;
        if let Some(tokens) = action.tokens {
            items.push(Item::Action { tokens, line });
        }

        line += newlines(&body[..action.consumed]);
        rest = &body[action.consumed..];
        trim_next = action.trim_right;
    }

    Ok(items)
}

fn push_text(items: &mut Vec<Item>, text: &str, trim_start: bool, trim_end: bool) {
    let mut text = text;
    if trim_start {
        text = text.trim_start_matches(is_space);
    }
    if trim_end {
        text = text.trim_end_matches(is_space);
    }
    if !text.is_empty() {
        items.push(Item::Text(text.to_string()));
    }
}

struct Action {
    /// `None` for comments.
    tokens: Option<Vec<Token>>,
    /// Bytes of the body consumed, including the closing delimiter.
    consumed: usize,
    trim_right: bool,
}

/// Recognise `}}` or ` -}}` at `i`, returning the offset just past it.
fn closing_at(body: &str, i: usize) -> Option<(usize, bool)> {
    let rest = &body[i..];
    if rest.starts_with(CLOSE) {
        return Some((i + CLOSE.len(), false));
    }
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if is_space(c) && chars.as_str().starts_with("-}}") => {
            Some((i + c.len_utf8() + 3, true))
        }
        _ => None,
    }
}

fn lex_action(body: &str, line: usize) -> Result<Action, LexError> {
    let err = |message: String| LexError { line, message };

    if let Some(comment) = body.strip_prefix("/*") {
        let end = comment
            .find("*/")
            .ok_or_else(|| err("unclosed comment".to_string()))?;
        let after = 2 + end + 2;
        return match closing_at(body, after) {
            Some((consumed, trim_right)) => Ok(Action {
                tokens: None,
                consumed,
                trim_right,
            }),
            None => Err(err("comment ends before closing delimiter".to_string())),
        };
    }

    let mut tokens = Vec::new();
    let bytes = body.as_bytes();
    let mut i = 0;

    while i < body.len() {
        if let Some((consumed, trim_right)) = closing_at(body, i) {
            return Ok(Action {
                tokens: Some(tokens),
                consumed,
                trim_right,
            });
        }

        let c = body[i..].chars().next().unwrap_or(' ');
        match c {
            c if is_space(c) => i += 1,
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ':' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token::Declare);
                i += 2;
            }
            '"' => {
                let (text, len) = lex_quoted(&body[i..]).map_err(err)?;
                tokens.push(Token::Str(text));
                i += len;
            }
            '`' => {
                let end = body[i + 1..]
                    .find('`')
                    .ok_or_else(|| err("unterminated raw quoted string".to_string()))?;
                tokens.push(Token::Str(body[i + 1..i + 1 + end].to_string()));
                i += end + 2;
            }
            '.' => {
                let name_len = ident_len(&body[i + 1..]);
                if name_len == 0 {
                    tokens.push(Token::Dot);
                } else {
                    tokens.push(Token::Field(body[i + 1..i + 1 + name_len].to_string()));
                }
                i += 1 + name_len;
            }
            '$' => {
                let name_len = ident_len(&body[i + 1..]);
                tokens.push(Token::Variable(body[i + 1..i + 1 + name_len].to_string()));
                i += 1 + name_len;
            }
            '0'..='9' | '-' | '+' => {
                let len = body[i + 1..]
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(body.len() - i - 1)
                    + 1;
                let literal = &body[i..i + len];
                let value = literal
                    .parse::<i64>()
                    .map_err(|_| err(format!("bad number syntax: {:?}", literal)))?;
                tokens.push(Token::Int(value));
                i += len;
            }
            c if c.is_alphabetic() || c == '_' => {
                let len = ident_len(&body[i..]);
                let word = &body[i..i + len];
                tokens.push(match word {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    "nil" => Token::Nil,
                    _ => Token::Ident(word.to_string()),
                });
                i += len;
            }
            other => return Err(err(format!("unexpected {:?} in command", other))),
        }
    }

    Err(err("unclosed action".to_string()))
}

fn ident_len(s: &str) -> usize {
    s.char_indices()
        .find(|&(_, c)| !(c.is_alphanumeric() || c == '_'))
        .map_or(s.len(), |(i, _)| i)
}

/// Lex a double-quoted string starting at `s[0] == '"'`; returns the value and bytes consumed.
fn lex_quoted(s: &str) -> Result<(String, usize), String> {
    let mut value = String::new();
    let mut chars = s.char_indices().skip(1);

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((value, i + 1)),
            '\n' => break,
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, '\\')) => value.push('\\'),
                Some((_, '"')) => value.push('"'),
                Some((_, '\'')) => value.push('\''),
                Some((_, other)) => return Err(format!("unknown escape sequence: \\{}", other)),
                None => break,
            },
            c => value.push(c),
        }
    }

    Err("unterminated quoted string".to_string())
}
