//! Parser for Prometheus-style metric queries.

use crate::duration::parse_duration_ms;
use crate::lex::{tokenize, Span, SpannedToken, Token};
use crate::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    String(String),
    Selector(VectorSelector),
    Matrix(MatrixSelector),
    Subquery {
        expr: Box<Expr>,
        range_ms: u64,
        step_ms: Option<u64>,
        offset_ms: Option<u64>,
    },
    Call(Call),
    Aggregate(Aggregate),
    Unary {
        negative: bool,
        expr: Box<Expr>,
    },
    Binary(Binary),
    Paren(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorSelector {
    pub metric: Option<String>,
    pub matchers: Vec<Matcher>,
    pub offset_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Matcher {
    pub label: String,
    pub op: MatchOp,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    Equal,
    NotEqual,
    Regex,
    NotRegex,
}

impl std::fmt::Display for MatchOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MatchOp::Equal => "=",
            MatchOp::NotEqual => "!=",
            MatchOp::Regex => "=~",
            MatchOp::NotRegex => "!~",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixSelector {
    pub selector: VectorSelector,
    pub range_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub func: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub op: String,
    pub grouping: Option<Grouping>,
    pub param: Option<Box<Expr>>,
    pub expr: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    pub without: bool,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binary {
    pub op: String,
    pub bool_modifier: bool,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
}

impl Expr {
    /// Pre-order visit of every expression node.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Paren(e) | Expr::Unary { expr: e, .. } => e.walk(f),
            Expr::Subquery { expr, .. } => expr.walk(f),
            Expr::Call(c) => {
                for arg in &c.args {
                    arg.walk(f);
                }
            }
            Expr::Aggregate(a) => {
                if let Some(p) = &a.param {
                    p.walk(f);
                }
                a.expr.walk(f);
            }
            Expr::Binary(b) => {
                b.lhs.walk(f);
                b.rhs.walk(f);
            }
            Expr::Number(_) | Expr::String(_) | Expr::Selector(_) | Expr::Matrix(_) => {}
        }
    }

    /// Every vector selector in the expression, including those inside
    /// matrix selectors.
    pub fn selectors(&self) -> Vec<&VectorSelector> {
        let mut out = Vec::new();
        self.walk(&mut |e| match e {
            Expr::Selector(s) => out.push(s),
            Expr::Matrix(m) => out.push(&m.selector),
            _ => {}
        });
        out
    }
}

const AGGREGATORS: &[&str] = &[
    "sum", "min", "max", "avg", "group", "stddev", "stdvar", "count", "count_values", "bottomk",
    "topk", "quantile",
];

const AGGREGATORS_WITH_PARAM: &[&str] = &["count_values", "bottomk", "topk", "quantile"];

const FUNCTIONS: &[&str] = &[
    "abs",
    "absent",
    "absent_over_time",
    "acos",
    "acosh",
    "asin",
    "asinh",
    "atan",
    "atanh",
    "avg_over_time",
    "ceil",
    "changes",
    "clamp",
    "clamp_max",
    "clamp_min",
    "cos",
    "cosh",
    "count_over_time",
    "day_of_month",
    "day_of_week",
    "day_of_year",
    "days_in_month",
    "deg",
    "delta",
    "deriv",
    "exp",
    "floor",
    "histogram_avg",
    "histogram_count",
    "histogram_fraction",
    "histogram_quantile",
    "histogram_sum",
    "holt_winters",
    "hour",
    "idelta",
    "increase",
    "irate",
    "label_join",
    "label_replace",
    "last_over_time",
    "ln",
    "log10",
    "log2",
    "max_over_time",
    "min_over_time",
    "minute",
    "month",
    "pi",
    "predict_linear",
    "present_over_time",
    "quantile_over_time",
    "rad",
    "rate",
    "resets",
    "round",
    "scalar",
    "sgn",
    "sin",
    "sinh",
    "sort",
    "sort_desc",
    "sqrt",
    "stddev_over_time",
    "stdvar_over_time",
    "sum_over_time",
    "tan",
    "tanh",
    "time",
    "timestamp",
    "vector",
    "year",
];

/// Parse a metric query into its AST.
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
        let span = self
            .peek_spanned()
            .map(|t| t.span)
            .unwrap_or(self.last);
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

    fn binary_precedence(&self) -> Option<(u8, String, bool)> {
        // (precedence, operator text, right-associative)
        let (prec, text, right) = match self.peek()? {
            Token::Ident(s) if s == "or" => (1, "or", false),
            Token::Ident(s) if s == "and" => (2, "and", false),
            Token::Ident(s) if s == "unless" => (2, "unless", false),
            Token::EqEq => (3, "==", false),
            Token::NotEq => (3, "!=", false),
            Token::Lt => (3, "<", false),
            Token::Lte => (3, "<=", false),
            Token::Gt => (3, ">", false),
            Token::Gte => (3, ">=", false),
            Token::Add => (4, "+", false),
            Token::Sub => (4, "-", false),
            Token::Mul => (5, "*", false),
            Token::Div => (5, "/", false),
            Token::Mod => (5, "%", false),
            Token::Pow => (6, "^", true),
            _ => return None,
        };
        Some((prec, text.to_string(), right))
    }

    fn expr(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        while let Some((prec, op, right)) = self.binary_precedence() {
            if prec < min_prec {
                break;
            }
            self.bump();
            let mut bool_modifier = false;
            if self.peek_ident() == Some("bool") {
                bool_modifier = true;
                self.bump();
            }
            self.vector_matching()?;
            let next_min = if right { prec } else { prec + 1 };
            let rhs = self.expr(next_min)?;
            lhs = Expr::Binary(Binary {
                op,
                bool_modifier,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    /// Consume an optional on/ignoring clause with group_left/group_right.
    fn vector_matching(&mut self) -> Result<(), ParseError> {
        if matches!(self.peek_ident(), Some("on") | Some("ignoring")) {
            self.bump();
            self.label_list()?;
        }
        if matches!(self.peek_ident(), Some("group_left") | Some("group_right")) {
            self.bump();
            if self.peek() == Some(&Token::LParen) {
                self.label_list()?;
            }
        }
        Ok(())
    }

    fn label_list(&mut self) -> Result<Vec<String>, ParseError> {
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
        Ok(labels)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Token::Sub) => {
                self.bump();
                Ok(Expr::Unary {
                    negative: true,
                    expr: Box::new(self.unary()?),
                })
            }
            Some(Token::Add) => {
                self.bump();
                Ok(Expr::Unary {
                    negative: false,
                    expr: Box::new(self.unary()?),
                })
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::LBracket) => {
                    self.bump();
                    let range_ms = self.duration("range")?;
                    if self.peek() == Some(&Token::Colon) {
                        self.bump();
                        let step_ms = match self.peek() {
                            Some(Token::RBracket) => None,
                            _ => Some(self.duration("subquery step")?),
                        };
                        self.expect(Token::RBracket, "\"]\"")?;
                        expr = Expr::Subquery {
                            expr: Box::new(expr),
                            range_ms,
                            step_ms,
                            offset_ms: None,
                        };
                    } else {
                        self.expect(Token::RBracket, "\"]\"")?;
                        match expr {
                            Expr::Selector(selector) => {
                                expr = Expr::Matrix(MatrixSelector { selector, range_ms });
                            }
                            _ => {
                                return Err(
                                    self.err_here("range specification only allowed on selectors")
                                )
                            }
                        }
                    }
                }
                Some(Token::Ident(s)) if s == "offset" => {
                    self.bump();
                    let offset = self.duration("offset")?;
                    match &mut expr {
                        Expr::Selector(s) => s.offset_ms = Some(offset),
                        Expr::Matrix(m) => m.selector.offset_ms = Some(offset),
                        Expr::Subquery { offset_ms, .. } => *offset_ms = Some(offset),
                        _ => return Err(self.err_here("offset only allowed on selectors")),
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
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

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().cloned() {
            None => Err(self.err_here("unexpected end of input, expected expression")),
            Some(Token::Number(n)) => {
                self.bump();
                Ok(Expr::Number(n))
            }
            Some(Token::Str(s)) => {
                self.bump();
                Ok(Expr::String(s))
            }
            Some(Token::LParen) => {
                self.bump();
                let inner = self.expr(0)?;
                self.expect(Token::RParen, "\")\"")?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            Some(Token::LBrace) => {
                let matchers = self.matchers()?;
                Ok(Expr::Selector(VectorSelector {
                    metric: None,
                    matchers,
                    offset_ms: None,
                }))
            }
            Some(Token::Ident(name)) => {
                if AGGREGATORS.contains(&name.as_str()) {
                    self.bump();
                    return self.aggregate(name);
                }
                self.bump();
                if self.peek() == Some(&Token::LParen) {
                    if !FUNCTIONS.contains(&name.as_str()) {
                        return Err(
                            self.err_here(format!("unknown function with name \"{}\"", name))
                        );
                    }
                    let args = self.call_args()?;
                    return Ok(Expr::Call(Call { func: name, args }));
                }
                let matchers = if self.peek() == Some(&Token::LBrace) {
                    self.matchers()?
                } else {
                    Vec::new()
                };
                Ok(Expr::Selector(VectorSelector {
                    metric: Some(name),
                    matchers,
                    offset_ms: None,
                }))
            }
            Some(t) => Err(self.err_here(format!("unexpected \"{}\"", t.describe()))),
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(Token::LParen, "\"(\"")?;
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.bump();
            return Ok(args);
        }
        loop {
            args.push(self.expr(0)?);
            match self.peek() {
                Some(Token::Comma) => self.bump(),
                Some(Token::RParen) => {
                    self.bump();
                    break;
                }
                _ => return Err(self.err_here("unexpected token in call, expected \",\" or \")\"")),
            }
        }
        Ok(args)
    }

    fn aggregate(&mut self, op: String) -> Result<Expr, ParseError> {
        let mut grouping = None;
        if matches!(self.peek_ident(), Some("by") | Some("without")) {
            grouping = Some(self.grouping()?);
        }
        let args = self.call_args()?;
        if grouping.is_none() && matches!(self.peek_ident(), Some("by") | Some("without")) {
            grouping = Some(self.grouping()?);
        }

        let with_param = AGGREGATORS_WITH_PARAM.contains(&op.as_str());
        let (param, expr) = match (with_param, args.len()) {
            (true, 2) => {
                let mut it = args.into_iter();
                let param = it.next().map(Box::new);
                let expr = it.next().map(Box::new);
                (param, expr)
            }
            (false, 1) => (None, args.into_iter().next().map(Box::new)),
            _ => {
                return Err(self.err_here("wrong number of arguments in aggregation"))
            }
        };
        // Both are present by construction of the match above.
        let expr = expr.ok_or_else(|| self.err_here("missing aggregation body"))?;
        Ok(Expr::Aggregate(Aggregate {
            op,
            grouping,
            param,
            expr,
        }))
    }

    fn grouping(&mut self) -> Result<Grouping, ParseError> {
        let without = self.peek_ident() == Some("without");
        self.bump();
        let labels = self.label_list()?;
        Ok(Grouping { without, labels })
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
            let value = match self.peek().cloned() {
                Some(Token::Str(s)) => {
                    self.bump();
                    s
                }
                _ => {
                    return Err(
                        self.err_here("unexpected token in label matching, expected string")
                    )
                }
            };
            matchers.push(Matcher { label, op, value });
            if self.peek() == Some(&Token::Comma) {
                self.bump();
            }
        }
        Ok(matchers)
    }
}
