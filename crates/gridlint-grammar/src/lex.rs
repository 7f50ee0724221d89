//! Shared lexer for both query grammars.

use crate::ParseError;

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: u32,
    pub col: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier or keyword. Metric names may embed colons.
    Ident(String),
    Number(f64),
    /// String literal, unescaped content.
    Str(String),
    /// A numeric literal immediately followed by letters, e.g. `5m`, `2KB`.
    /// The raw text is kept; the parsers decide whether it is a duration or
    /// a byte size.
    Unit(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    EqEq,
    NotEq,
    EqRegex,
    NotRegex,
    Lt,
    Lte,
    Gt,
    Gte,
    Pipe,
    PipeExact,
    PipeRegex,
}

impl Token {
    /// Rendering used in "unexpected <token>" messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier {:?}", s),
            Token::Number(n) => format!("number {}", n),
            Token::Str(s) => format!("string {:?}", s),
            Token::Unit(s) => format!("{:?}", s),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::LBrace => "{".to_string(),
            Token::RBrace => "}".to_string(),
            Token::LBracket => "[".to_string(),
            Token::RBracket => "]".to_string(),
            Token::Comma => ",".to_string(),
            Token::Colon => ":".to_string(),
            Token::Add => "+".to_string(),
            Token::Sub => "-".to_string(),
            Token::Mul => "*".to_string(),
            Token::Div => "/".to_string(),
            Token::Mod => "%".to_string(),
            Token::Pow => "^".to_string(),
            Token::Eq => "=".to_string(),
            Token::EqEq => "==".to_string(),
            Token::NotEq => "!=".to_string(),
            Token::EqRegex => "=~".to_string(),
            Token::NotRegex => "!~".to_string(),
            Token::Lt => "<".to_string(),
            Token::Lte => "<=".to_string(),
            Token::Gt => ">".to_string(),
            Token::Gte => ">=".to_string(),
            Token::Pipe => "|".to_string(),
            Token::PipeExact => "|=".to_string(),
            Token::PipeRegex => "|~".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

struct Cursor<'a> {
    rest: &'a [u8],
    input: &'a str,
    offset: usize,
    line: u32,
    col: u32,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Cursor {
            rest: input.as_bytes(),
            input,
            offset: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.rest.first().copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.rest.get(n).copied()
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.rest.first().copied()?;
        self.rest = &self.rest[1..];
        self.offset += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.offset;
        while let Some(b) = self.peek() {
            if !pred(b) {
                break;
            }
            self.bump();
        }
        &self.input[start..self.offset]
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Tokenize a query expression. Both grammars share one token set; each
/// parser rejects the tokens it has no use for.
pub fn tokenize(input: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let mut cursor = Cursor::new(input);
    let mut tokens = Vec::new();

    while let Some(b) = cursor.peek() {
        let span = cursor.span();
        let token = match b {
            b' ' | b'\t' | b'\r' | b'\n' => {
                cursor.bump();
                continue;
            }
            b'(' => one(&mut cursor, Token::LParen),
            b')' => one(&mut cursor, Token::RParen),
            b'{' => one(&mut cursor, Token::LBrace),
            b'}' => one(&mut cursor, Token::RBrace),
            b'[' => one(&mut cursor, Token::LBracket),
            b']' => one(&mut cursor, Token::RBracket),
            b',' => one(&mut cursor, Token::Comma),
            b':' => one(&mut cursor, Token::Colon),
            b'+' => one(&mut cursor, Token::Add),
            b'-' => one(&mut cursor, Token::Sub),
            b'*' => one(&mut cursor, Token::Mul),
            b'/' => one(&mut cursor, Token::Div),
            b'%' => one(&mut cursor, Token::Mod),
            b'^' => one(&mut cursor, Token::Pow),
            b'=' => match cursor.peek_at(1) {
                Some(b'~') => two(&mut cursor, Token::EqRegex),
                Some(b'=') => two(&mut cursor, Token::EqEq),
                _ => one(&mut cursor, Token::Eq),
            },
            b'!' => match cursor.peek_at(1) {
                Some(b'=') => two(&mut cursor, Token::NotEq),
                Some(b'~') => two(&mut cursor, Token::NotRegex),
                _ => {
                    return Err(ParseError::at(
                        span.line,
                        span.col,
                        "unexpected character: '!'",
                    ))
                }
            },
            b'<' => match cursor.peek_at(1) {
                Some(b'=') => two(&mut cursor, Token::Lte),
                _ => one(&mut cursor, Token::Lt),
            },
            b'>' => match cursor.peek_at(1) {
                Some(b'=') => two(&mut cursor, Token::Gte),
                _ => one(&mut cursor, Token::Gt),
            },
            b'|' => match cursor.peek_at(1) {
                Some(b'=') => two(&mut cursor, Token::PipeExact),
                Some(b'~') => two(&mut cursor, Token::PipeRegex),
                _ => one(&mut cursor, Token::Pipe),
            },
            b'"' | b'\'' => lex_string(&mut cursor, span)?,
            b'0'..=b'9' => lex_number(&mut cursor, span)?,
            _ if is_ident_start(b) => lex_ident(&mut cursor),
            _ => {
                let ch = cursor.input[cursor.offset..]
                    .chars()
                    .next()
                    .unwrap_or('\u{fffd}');
                return Err(ParseError::at(
                    span.line,
                    span.col,
                    format!("unexpected character: {:?}", ch),
                ));
            }
        };
        tokens.push(SpannedToken { token, span });
    }

    Ok(tokens)
}

fn one(cursor: &mut Cursor<'_>, token: Token) -> Token {
    cursor.bump();
    token
}

fn two(cursor: &mut Cursor<'_>, token: Token) -> Token {
    cursor.bump();
    cursor.bump();
    token
}

fn lex_string(cursor: &mut Cursor<'_>, start: Span) -> Result<Token, ParseError> {
    let quote = cursor.bump().unwrap_or(b'"');
    let mut out = Vec::new();
    loop {
        match cursor.bump() {
            None => {
                return Err(ParseError::at(
                    start.line,
                    start.col,
                    "unterminated string literal",
                ))
            }
            Some(b) if b == quote => break,
            Some(b'\\') => match cursor.bump() {
                Some(b'n') => out.push(b'\n'),
                Some(b't') => out.push(b'\t'),
                Some(b) => out.push(b),
                None => {
                    return Err(ParseError::at(
                        start.line,
                        start.col,
                        "unterminated string literal",
                    ))
                }
            },
            Some(b) => out.push(b),
        }
    }
    Ok(Token::Str(String::from_utf8_lossy(&out).into_owned()))
}

fn lex_number(cursor: &mut Cursor<'_>, start: Span) -> Result<Token, ParseError> {
    let begin = cursor.offset;
    cursor.take_while(|b| b.is_ascii_digit());
    let mut is_float = false;
    if cursor.peek() == Some(b'.') && cursor.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
        is_float = true;
        cursor.bump();
        cursor.take_while(|b| b.is_ascii_digit());
    }
    if matches!(cursor.peek(), Some(b'e') | Some(b'E'))
        && cursor
            .peek_at(1)
            .is_some_and(|b| b.is_ascii_digit() || b == b'+' || b == b'-')
    {
        is_float = true;
        cursor.bump();
        if matches!(cursor.peek(), Some(b'+') | Some(b'-')) {
            cursor.bump();
        }
        cursor.take_while(|b| b.is_ascii_digit());
    }

    // An integer immediately followed by letters is a unit-suffixed literal
    // such as a duration; compound forms like 1h30m are kept whole.
    if !is_float && cursor.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
        cursor.take_while(|b| b.is_ascii_alphanumeric());
        return Ok(Token::Unit(cursor.input[begin..cursor.offset].to_string()));
    }

    let text = &cursor.input[begin..cursor.offset];
    let value: f64 = text
        .parse()
        .map_err(|_| ParseError::at(start.line, start.col, format!("bad number {:?}", text)))?;
    Ok(Token::Number(value))
}

fn lex_ident(cursor: &mut Cursor<'_>) -> Token {
    let begin = cursor.offset;
    cursor.take_while(is_ident_char);
    // Recording-rule metric names embed colons: level:metric:operation.
    while cursor.peek() == Some(b':') && cursor.peek_at(1).is_some_and(is_ident_char) {
        cursor.bump();
        cursor.take_while(is_ident_char);
    }
    Token::Ident(cursor.input[begin..cursor.offset].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn lex_selector() {
        assert_eq!(
            kinds(r#"foo{job=~"$job"}"#),
            vec![
                Token::Ident("foo".into()),
                Token::LBrace,
                Token::Ident("job".into()),
                Token::EqRegex,
                Token::Str("$job".into()),
                Token::RBrace,
            ]
        );
    }

    #[test]
    fn lex_durations_and_numbers() {
        assert_eq!(
            kinds("rate(x[5m]) * 2"),
            vec![
                Token::Ident("rate".into()),
                Token::LParen,
                Token::Ident("x".into()),
                Token::LBracket,
                Token::Unit("5m".into()),
                Token::RBracket,
                Token::RParen,
                Token::Mul,
                Token::Number(2.0),
            ]
        );
        assert_eq!(kinds("1h30m"), vec![Token::Unit("1h30m".into())]);
        assert_eq!(kinds("0.99"), vec![Token::Number(0.99)]);
    }

    #[test]
    fn lex_recording_rule_names() {
        assert_eq!(
            kinds("instance:node_cpu:rate5m"),
            vec![Token::Ident("instance:node_cpu:rate5m".into())]
        );
        // A colon between a unit and an ident stays separate.
        assert_eq!(
            kinds("[1h:1h]"),
            vec![
                Token::LBracket,
                Token::Unit("1h".into()),
                Token::Colon,
                Token::Unit("1h".into()),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn lex_line_filters() {
        assert_eq!(
            kinds(r#"|= "error" != "timeout" |~ "x""#),
            vec![
                Token::PipeExact,
                Token::Str("error".into()),
                Token::NotEq,
                Token::Str("timeout".into()),
                Token::PipeRegex,
                Token::Str("x".into()),
            ]
        );
    }

    #[test]
    fn lex_position_of_bad_character() {
        let err = tokenize("foo(bar.baz)").unwrap_err();
        assert_eq!(
            err,
            ParseError::at(1, 8, "unexpected character: '.'")
        );
    }

    #[test]
    fn lex_unterminated_string() {
        assert!(tokenize(r#"{job="mysql}"#).is_err());
    }
}
