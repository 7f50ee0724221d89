//! Parser for Loki-style log queries.

use crate::duration::{is_bytes_literal, parse_duration_ms};
use crate::lex::{tokenize, Span, SpannedToken, Token};
use crate::promql::MatchOp;
use crate::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A plain log query: stream selector plus pipeline.
    Log(LogExpr),
    RangeAgg(RangeAgg),
    VectorAgg(VectorAgg),
    Binary {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Literal(f64),
    Paren(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogExpr {
    pub matchers: Vec<Matcher>,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Matcher {
    pub label: String,
    pub op: MatchOp,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    LineFilter { op: LineFilterOp, value: String },
    /// `json`, `logfmt`, `unpack`, `decolorize`, `regexp "..."`, `pattern "..."`.
    Parser { name: String, arg: Option<String> },
    LabelFilter { label: String, op: String, value: FilterValue },
    LineFormat(String),
    LabelFormat(Vec<(String, String)>),
    Unwrap { label: String, conversion: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFilterOp {
    Contains,
    NotContains,
    Regex,
    NotRegex,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Str(String),
    Number(f64),
    DurationMs(u64),
    Bytes(String),
}

/// A log stream with its range window, the unit the auto-interval rule
/// inspects.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRange {
    pub log: LogExpr,
    pub interval_ms: u64,
    pub offset_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeAgg {
    pub op: String,
    pub param: Option<f64>,
    pub range: LogRange,
    pub grouping: Option<Grouping>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorAgg {
    pub op: String,
    pub param: Option<f64>,
    pub grouping: Option<Grouping>,
    pub expr: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    pub without: bool,
    pub labels: Vec<String>,
}

impl Expr {
    /// Pre-order visit of every expression node.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Paren(e) => e.walk(f),
            Expr::VectorAgg(a) => a.expr.walk(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.walk(f);
                rhs.walk(f);
            }
            Expr::Log(_) | Expr::RangeAgg(_) | Expr::Literal(_) => {}
        }
    }

    /// Every range window in the expression.
    pub fn log_ranges(&self) -> Vec<&LogRange> {
        let mut out = Vec::new();
        self.walk(&mut |e| {
            if let Expr::RangeAgg(r) = e {
                out.push(&r.range);
            }
        });
        out
    }
}

const RANGE_AGGS: &[&str] = &[
    "rate",
    "rate_counter",
    "count_over_time",
    "bytes_rate",
    "bytes_over_time",
    "absent_over_time",
    "avg_over_time",
    "sum_over_time",
    "min_over_time",
    "max_over_time",
    "first_over_time",
    "last_over_time",
    "stdvar_over_time",
    "stddev_over_time",
    "quantile_over_time",
];

const VECTOR_AGGS: &[&str] = &[
    "sum", "avg", "min", "max", "count", "stddev", "stdvar", "topk", "bottomk",
];

const NO_ARG_PARSERS: &[&str] = &["json", "logfmt", "unpack", "decolorize"];
const ARG_PARSERS: &[&str] = &["regexp", "pattern"];
const UNWRAP_CONVERSIONS: &[&str] = &["bytes", "duration", "duration_seconds"];

/// Parse a log query into its AST.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser::new(tokens);
    let expr = parser.expr(0)?;
    if let Some(t) = parser.peek_spanned() {
        return Err(ParseError::at(
            t.span.line,
            t.span.col,
            format!("unexpected \"{}\"", t.token.describe()),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    last: Span,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        let last = tokens
            .last()
            .map(|t| t.span)
            .unwrap_or(Span { line: 1, col: 1 });
        Parser {
            tokens,
            pos: 0,
            last,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|t| &t.token)
    }

    fn peek_spanned(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek() {
            Some(Token::Ident(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn next(&mut self) -> Option<SpannedToken> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn err_here(&self, msg: impl Into<String>) -> ParseError {
        let span = self.peek_spanned().map(|t| t.span).unwrap_or(self.last);
        ParseError::at(span.line, span.col, msg)
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), ParseError> {
        match self.peek() {
            Some(t) if *t == token => {
                self.bump();
                Ok(())
            }
            Some(t) => Err(self.err_here(format!(
                "unexpected \"{}\", expected {}",
                t.describe(),
                what
            ))),
            None => Err(self.err_here(format!("unexpected end of input, expected {}", what))),
        }
    }

    fn string(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek().cloned() {
            Some(Token::Str(s)) => {
                self.bump();
                Ok(s)
            }
            _ => Err(self.err_here(format!("expected string for {}", what))),
        }
    }

    fn binary_precedence(&self) -> Option<(u8, String)> {
        let (prec, text) = match self.peek()? {
            Token::Ident(s) if s == "or" => (1, "or"),
            Token::Ident(s) if s == "and" => (2, "and"),
            Token::Ident(s) if s == "unless" => (2, "unless"),
            Token::EqEq => (3, "=="),
            Token::NotEq => (3, "!="),
            Token::Lt => (3, "<"),
            Token::Lte => (3, "<="),
            Token::Gt => (3, ">"),
            Token::Gte => (3, ">="),
            Token::Add => (4, "+"),
            Token::Sub => (4, "-"),
            Token::Mul => (5, "*"),
            Token::Div => (5, "/"),
            Token::Mod => (5, "%"),
            Token::Pow => (6, "^"),
            _ => return None,
        };
        Some((prec, text.to_string()))
    }

    fn expr(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.primary()?;
        while let Some((prec, op)) = self.binary_precedence() {
            if prec < min_prec {
                break;
            }
            self.bump();
            if self.peek_ident() == Some("bool") {
                self.bump();
            }
            let rhs = self.expr(prec + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().cloned() {
            None => Err(self.err_here("unexpected end of input, expected expression")),
            Some(Token::Number(n)) => {
                self.bump();
                Ok(Expr::Literal(n))
            }
            Some(Token::Sub) => {
                self.bump();
                match self.peek().cloned() {
                    Some(Token::Number(n)) => {
                        self.bump();
                        Ok(Expr::Literal(-n))
                    }
                    _ => Err(self.err_here("expected number after \"-\"")),
                }
            }
            Some(Token::LParen) => {
                self.bump();
                let inner = self.expr(0)?;
                self.expect(Token::RParen, "\")\"")?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            Some(Token::LBrace) => {
                let matchers = self.matchers()?;
                let stages = self.stages()?;
                Ok(Expr::Log(LogExpr { matchers, stages }))
            }
            Some(Token::Ident(name)) => {
                if RANGE_AGGS.contains(&name.as_str()) {
                    self.bump();
                    self.range_agg(name)
                } else if VECTOR_AGGS.contains(&name.as_str()) {
                    self.bump();
                    self.vector_agg(name)
                } else {
                    Err(self.err_here(format!("unknown function \"{}\"", name)))
                }
            }
            Some(t) => Err(self.err_here(format!("unexpected \"{}\"", t.describe()))),
        }
    }

    fn range_agg(&mut self, op: String) -> Result<Expr, ParseError> {
        self.expect(Token::LParen, "\"(\"")?;
        let mut param = None;
        if op == "quantile_over_time" {
            if let Some(Token::Number(n)) = self.peek().cloned() {
                param = Some(n);
                self.bump();
                self.expect(Token::Comma, "\",\"")?;
            }
        }
        let range = self.log_range()?;
        self.expect(Token::RParen, "\")\"")?;
        let grouping = self.optional_grouping()?;
        Ok(Expr::RangeAgg(RangeAgg {
            op,
            param,
            range,
            grouping,
        }))
    }

    fn log_range(&mut self) -> Result<LogRange, ParseError> {
        let matchers = self.matchers()?;
        let mut stages = self.stages()?;
        self.expect(Token::LBracket, "range in \"[...]\"")?;
        let interval_ms = self.duration("range")?;
        self.expect(Token::RBracket, "\"]\"")?;
        let mut offset_ms = None;
        if self.peek_ident() == Some("offset") {
            self.bump();
            offset_ms = Some(self.duration("offset")?);
        }
        // A pipeline may also follow the range window.
        stages.extend(self.stages()?);
        Ok(LogRange {
            log: LogExpr { matchers, stages },
            interval_ms,
            offset_ms,
        })
    }

    fn vector_agg(&mut self, op: String) -> Result<Expr, ParseError> {
        let mut grouping = self.optional_grouping()?;
        self.expect(Token::LParen, "\"(\"")?;
        let mut param = None;
        if matches!(op.as_str(), "topk" | "bottomk")
            && matches!(self.peek_at(1), Some(Token::Comma))
        {
            if let Some(Token::Number(n)) = self.peek().cloned() {
                param = Some(n);
                self.bump();
                self.bump();
            }
        }
        let inner = self.expr(0)?;
        self.expect(Token::RParen, "\")\"")?;
        if grouping.is_none() {
            grouping = self.optional_grouping()?;
        }
        Ok(Expr::VectorAgg(VectorAgg {
            op,
            param,
            grouping,
            expr: Box::new(inner),
        }))
    }

    fn optional_grouping(&mut self) -> Result<Option<Grouping>, ParseError> {
        let without = match self.peek_ident() {
            Some("by") => false,
            Some("without") => true,
            _ => return Ok(None),
        };
        self.bump();
        self.expect(Token::LParen, "\"(\"")?;
        let mut labels = Vec::new();
        loop {
            match self.peek() {
                Some(Token::RParen) => {
                    self.bump();
                    break;
                }
                Some(Token::Ident(s)) => {
                    labels.push(s.clone());
                    self.bump();
                    if self.peek() == Some(&Token::Comma) {
                        self.bump();
                    }
                }
                _ => return Err(self.err_here("unexpected token in grouping, expected label")),
            }
        }
        Ok(Some(Grouping { without, labels }))
    }

    fn duration(&mut self, what: &str) -> Result<u64, ParseError> {
        match self.next() {
            Some(SpannedToken {
                token: Token::Unit(text),
                span,
            }) => parse_duration_ms(&text)
                .map_err(|e| ParseError::at(span.line, span.col, format!("bad {}: {}", what, e))),
            Some(t) => Err(ParseError::at(
                t.span.line,
                t.span.col,
                format!("unexpected \"{}\", expected duration", t.token.describe()),
            )),
            None => Err(self.err_here(format!("unexpected end of input, expected {}", what))),
        }
    }

    fn matchers(&mut self) -> Result<Vec<Matcher>, ParseError> {
        self.expect(Token::LBrace, "\"{\"")?;
        let mut matchers = Vec::new();
        loop {
            let label = match self.peek() {
                Some(Token::RBrace) => {
                    self.bump();
                    break;
                }
                Some(Token::Ident(s)) => {
                    let label = s.clone();
                    self.bump();
                    label
                }
                Some(t) => {
                    return Err(self.err_here(format!(
                        "unexpected \"{}\" in label matching, expected identifier or \"}}\"",
                        t.describe()
                    )))
                }
                None => {
                    return Err(self.err_here(
                        "unexpected end of input in label matching, expected identifier or \"}\"",
                    ))
                }
            };
            let op = match self.peek() {
                Some(Token::Eq) => MatchOp::Equal,
                Some(Token::NotEq) => MatchOp::NotEqual,
                Some(Token::EqRegex) => MatchOp::Regex,
                Some(Token::NotRegex) => MatchOp::NotRegex,
                _ => {
                    return Err(self
                        .err_here("unexpected token in label matching, expected matching operator"))
                }
            };
            self.bump();
            let value = self.string("matcher value")?;
            matchers.push(Matcher { label, op, value });
            if self.peek() == Some(&Token::Comma) {
                self.bump();
            }
        }
        Ok(matchers)
    }

    fn stages(&mut self) -> Result<Vec<Stage>, ParseError> {
        let mut stages = Vec::new();
        loop {
            match self.peek() {
                Some(Token::PipeExact) => {
                    self.bump();
                    let value = self.string("line filter")?;
                    stages.push(Stage::LineFilter {
                        op: LineFilterOp::Contains,
                        value,
                    });
                }
                Some(Token::PipeRegex) => {
                    self.bump();
                    let value = self.string("line filter")?;
                    stages.push(Stage::LineFilter {
                        op: LineFilterOp::Regex,
                        value,
                    });
                }
                // `!=`/`!~` continue a line filter chain only when followed by
                // a string; otherwise they belong to an enclosing comparison.
                Some(Token::NotEq) if matches!(self.peek_at(1), Some(Token::Str(_))) => {
                    self.bump();
                    let value = self.string("line filter")?;
                    stages.push(Stage::LineFilter {
                        op: LineFilterOp::NotContains,
                        value,
                    });
                }
                Some(Token::NotRegex) if matches!(self.peek_at(1), Some(Token::Str(_))) => {
                    self.bump();
                    let value = self.string("line filter")?;
                    stages.push(Stage::LineFilter {
                        op: LineFilterOp::NotRegex,
                        value,
                    });
                }
                Some(Token::Pipe) => {
                    self.bump();
                    stages.push(self.pipe_stage()?);
                }
                _ => break,
            }
        }
        Ok(stages)
    }

    fn pipe_stage(&mut self) -> Result<Stage, ParseError> {
        let name = match self.peek_ident() {
            Some(s) => s.to_string(),
            None => return Err(self.err_here("expected pipeline stage after \"|\"")),
        };

        if NO_ARG_PARSERS.contains(&name.as_str()) {
            self.bump();
            return Ok(Stage::Parser { name, arg: None });
        }
        if ARG_PARSERS.contains(&name.as_str()) {
            self.bump();
            let arg = self.string("parser argument")?;
            return Ok(Stage::Parser {
                name,
                arg: Some(arg),
            });
        }
        if name == "line_format" {
            self.bump();
            return Ok(Stage::LineFormat(self.string("line_format template")?));
        }
        if name == "label_format" {
            self.bump();
            return self.label_format();
        }
        if name == "unwrap" {
            self.bump();
            return self.unwrap_stage();
        }

        // Anything else is a label filter: `| duration > 10s`, `| status == 200`,
        // `| __error__ = ""`.
        self.bump();
        let op = match self.peek() {
            Some(Token::Eq) => "=",
            Some(Token::EqEq) => "==",
            Some(Token::NotEq) => "!=",
            Some(Token::EqRegex) => "=~",
            Some(Token::NotRegex) => "!~",
            Some(Token::Gt) => ">",
            Some(Token::Gte) => ">=",
            Some(Token::Lt) => "<",
            Some(Token::Lte) => "<=",
            _ => return Err(self.err_here("expected comparison operator in label filter")),
        }
        .to_string();
        self.bump();
        let value = self.filter_value()?;
        Ok(Stage::LabelFilter {
            label: name,
            op,
            value,
        })
    }

    fn filter_value(&mut self) -> Result<FilterValue, ParseError> {
        match self.next() {
            Some(SpannedToken {
                token: Token::Str(s),
                ..
            }) => Ok(FilterValue::Str(s)),
            Some(SpannedToken {
                token: Token::Number(n),
                ..
            }) => Ok(FilterValue::Number(n)),
            Some(SpannedToken {
                token: Token::Unit(text),
                span,
            }) => {
                if let Ok(ms) = parse_duration_ms(&text) {
                    Ok(FilterValue::DurationMs(ms))
                } else if is_bytes_literal(&text) {
                    Ok(FilterValue::Bytes(text))
                } else {
                    Err(ParseError::at(
                        span.line,
                        span.col,
                        format!("bad filter value {:?}", text),
                    ))
                }
            }
            Some(t) => Err(ParseError::at(
                t.span.line,
                t.span.col,
                format!(
                    "unexpected \"{}\" in label filter",
                    t.token.describe()
                ),
            )),
            None => Err(self.err_here("unexpected end of input in label filter")),
        }
    }

    fn label_format(&mut self) -> Result<Stage, ParseError> {
        let mut pairs = Vec::new();
        loop {
            let target = match self.peek_ident() {
                Some(s) => s.to_string(),
                None => return Err(self.err_here("expected label name in label_format")),
            };
            self.bump();
            self.expect(Token::Eq, "\"=\"")?;
            let source = match self.peek().cloned() {
                Some(Token::Ident(s)) => {
                    self.bump();
                    s
                }
                Some(Token::Str(s)) => {
                    self.bump();
                    s
                }
                _ => return Err(self.err_here("expected label or template in label_format")),
            };
            pairs.push((target, source));
            if self.peek() == Some(&Token::Comma) {
                self.bump();
                continue;
            }
            break;
        }
        Ok(Stage::LabelFormat(pairs))
    }

    fn unwrap_stage(&mut self) -> Result<Stage, ParseError> {
        let first = match self.peek_ident() {
            Some(s) => s.to_string(),
            None => return Err(self.err_here("expected label after unwrap")),
        };
        self.bump();
        if UNWRAP_CONVERSIONS.contains(&first.as_str()) && self.peek() == Some(&Token::LParen) {
            self.bump();
            let label = match self.peek_ident() {
                Some(s) => s.to_string(),
                None => return Err(self.err_here("expected label in unwrap conversion")),
            };
            self.bump();
            self.expect(Token::RParen, "\")\"")?;
            return Ok(Stage::Unwrap {
                label,
                conversion: Some(first),
            });
        }
        Ok(Stage::Unwrap {
            label: first,
            conversion: None,
        })
    }
}
