//! Lexer, parser and evaluator for the sandbox analysis language.
//!
//! Scripts are newline-separated statements: `name = expr` or a bare
//! expression. The only resolvable names are `df`, the `tab` and `num`
//! namespaces, and variables the script itself defines. There is no
//! filesystem, network or process access by construction.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::dataset::{format_number, stats, Column, ColumnValues, DataFrame};

#[derive(Debug, Clone)]
pub struct Series {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl Series {
    fn non_null(&self) -> Vec<f64> {
        self.values.iter().filter_map(|v| *v).collect()
    }
}

#[derive(Debug, Clone)]
pub struct TextSeries {
    pub name: String,
    pub values: Vec<Option<String>>,
}

/// A small rendered table: row labels plus named string columns.
#[derive(Debug, Clone)]
pub struct Table {
    pub index: Vec<String>,
    pub columns: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Clone)]
pub enum Value {
    Num(f64),
    Str(String),
    Series(Series),
    TextSeries(TextSeries),
    Frame(Arc<DataFrame>),
    Table(Table),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Series(_) => "series",
            Value::TextSeries(_) => "text series",
            Value::Frame(_) => "dataframe",
            Value::Table(_) => "table",
        }
    }
}

// ---------------------------------------------------------------- lexer

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Num(f64),
    Str(String),
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
}

fn lex(line: &str) -> Result<Vec<Tok>, String> {
    let mut toks = Vec::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '#' => break,
            '+' => {
                toks.push(Tok::Plus);
                i += 1;
            }
            '-' => {
                toks.push(Tok::Minus);
                i += 1;
            }
            '*' => {
                toks.push(Tok::Star);
                i += 1;
            }
            '/' => {
                toks.push(Tok::Slash);
                i += 1;
            }
            '=' => {
                toks.push(Tok::Eq);
                i += 1;
            }
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '[' => {
                toks.push(Tok::LBracket);
                i += 1;
            }
            ']' => {
                toks.push(Tok::RBracket);
                i += 1;
            }
            '.' if !chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) => {
                toks.push(Tok::Dot);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                        None => return Err("unterminated string literal".into()),
                    }
                }
                toks.push(Tok::Str(s));
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number literal '{text}'"))?;
                toks.push(Tok::Num(n));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                toks.push(Tok::Ident(chars[start..i].iter().collect()));
            }
            _ => return Err(format!("unexpected character '{c}'")),
        }
    }
    Ok(toks)
}

// --------------------------------------------------------------- parser

#[derive(Debug, Clone)]
enum Expr {
    Num(f64),
    Str(String),
    Var(String),
    Neg(Box<Expr>),
    Binary(char, Box<Expr>, Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Call {
        ns: String,
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone)]
enum Stmt {
    Assign(String, Expr),
    Expr(Expr),
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> Result<(), String> {
        match self.next() {
            Some(ref t) if t == tok => Ok(()),
            other => Err(format!("expected {what}, found {other:?}")),
        }
    }

    fn statement(mut self) -> Result<Stmt, String> {
        // `ident = expr` is an assignment; anything else is an expression
        if let (Some(Tok::Ident(name)), Some(Tok::Eq)) = (self.toks.first(), self.toks.get(1)) {
            let name = name.clone();
            self.pos = 2;
            let expr = self.expression()?;
            self.finish()?;
            return Ok(Stmt::Assign(name, expr));
        }
        let expr = self.expression()?;
        self.finish()?;
        Ok(Stmt::Expr(expr))
    }

    fn finish(&self) -> Result<(), String> {
        if let Some(t) = self.peek() {
            return Err(format!("unexpected trailing token {t:?}"));
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        while let Some(op) = match self.peek() {
            Some(Tok::Plus) => Some('+'),
            Some(Tok::Minus) => Some('-'),
            _ => None,
        } {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        while let Some(op) = match self.peek() {
            Some(Tok::Star) => Some('*'),
            Some(Tok::Slash) => Some('/'),
            _ => None,
        } {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if matches!(self.peek(), Some(Tok::Minus)) {
            self.pos += 1;
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        while matches!(self.peek(), Some(Tok::LBracket)) {
            self.pos += 1;
            let idx = self.expression()?;
            self.expect(&Tok::RBracket, "']'")?;
            expr = Expr::Index(Box::new(expr), Box::new(idx));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Tok::Num(n)) => Ok(Expr::Num(n)),
            Some(Tok::Str(s)) => Ok(Expr::Str(s)),
            Some(Tok::LParen) => {
                let e = self.expression()?;
                self.expect(&Tok::RParen, "')'")?;
                Ok(e)
            }
            Some(Tok::Ident(name)) => {
                if matches!(self.peek(), Some(Tok::Dot)) {
                    self.pos += 1;
                    let func = match self.next() {
                        Some(Tok::Ident(f)) => f,
                        other => return Err(format!("expected function name, found {other:?}")),
                    };
                    self.expect(&Tok::LParen, "'('")?;
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Some(Tok::RParen)) {
                        loop {
                            args.push(self.expression()?);
                            match self.next() {
                                Some(Tok::Comma) => continue,
                                Some(Tok::RParen) => break,
                                other => {
                                    return Err(format!(
                                        "expected ',' or ')' in call, found {other:?}"
                                    ))
                                }
                            }
                        }
                    } else {
                        self.pos += 1;
                    }
                    Ok(Expr::Call {
                        ns: name,
                        name: func,
                        args,
                    })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            other => Err(format!("expected an expression, found {other:?}")),
        }
    }
}

// ------------------------------------------------------------ evaluator

pub struct Interpreter {
    vars: HashMap<String, Value>,
}

impl Interpreter {
    pub fn new(df: Arc<DataFrame>) -> Self {
        let mut vars = HashMap::new();
        vars.insert("df".to_string(), Value::Frame(df));
        Self { vars }
    }

    /// Execute one statement line. The line must be non-empty.
    pub fn exec_line(&mut self, line: &str) -> Result<(), String> {
        let toks = lex(line)?;
        if toks.is_empty() {
            return Ok(());
        }
        let stmt = Parser { toks, pos: 0 }.statement()?;
        match stmt {
            Stmt::Assign(name, expr) => {
                if name == "df" || name == "tab" || name == "num" {
                    return Err(format!("'{name}' is a reserved name and cannot be reassigned"));
                }
                let v = self.eval(&expr)?;
                self.vars.insert(name, v);
            }
            Stmt::Expr(expr) => {
                self.eval(&expr)?;
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    fn eval(&self, expr: &Expr) -> Result<Value, String> {
        match expr {
            Expr::Num(n) => Ok(Value::Num(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Var(name) => self
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| format!("unknown variable '{name}'")),
            Expr::Neg(inner) => match self.eval(inner)? {
                Value::Num(n) => Ok(Value::Num(-n)),
                v => Err(format!("cannot negate a {}", v.type_name())),
            },
            Expr::Binary(op, lhs, rhs) => {
                let (l, r) = (self.eval(lhs)?, self.eval(rhs)?);
                match (l, r) {
                    (Value::Num(a), Value::Num(b)) => Ok(Value::Num(match op {
                        '+' => a + b,
                        '-' => a - b,
                        '*' => a * b,
                        _ => a / b,
                    })),
                    (l, r) => Err(format!(
                        "arithmetic requires numbers, found {} and {}",
                        l.type_name(),
                        r.type_name()
                    )),
                }
            }
            Expr::Index(target, idx) => {
                let target = self.eval(target)?;
                let idx = self.eval(idx)?;
                match (target, idx) {
                    (Value::Frame(df), Value::Str(name)) => column_to_value(&df, &name),
                    (Value::Frame(_), v) => {
                        Err(format!("column selector must be a string, found {}", v.type_name()))
                    }
                    (v, _) => Err(format!("cannot index into a {}", v.type_name())),
                }
            }
            Expr::Call { ns, name, args } => {
                let args: Vec<Value> =
                    args.iter().map(|a| self.eval(a)).collect::<Result<_, _>>()?;
                match ns.as_str() {
                    "tab" => tab_call(name, &args),
                    "num" => num_call(name, &args),
                    other => Err(format!("unknown namespace '{other}' (available: tab, num)")),
                }
            }
        }
    }
}

fn column_to_value(df: &DataFrame, name: &str) -> Result<Value, String> {
    let col = df
        .column(name)
        .ok_or_else(|| format!("unknown column '{name}'"))?;
    Ok(match &col.values {
        ColumnValues::Numeric(v) => Value::Series(Series {
            name: name.to_string(),
            values: v.clone(),
        }),
        ColumnValues::Text(v) => Value::TextSeries(TextSeries {
            name: name.to_string(),
            values: v.clone(),
        }),
    })
}

// ------------------------------------------------------- tab namespace

fn tab_call(name: &str, args: &[Value]) -> Result<Value, String> {
    match name {
        "head" | "tail" => {
            let df = expect_frame(args.first(), name)?;
            let n = match args.get(1) {
                None => 5,
                Some(Value::Num(n)) if *n >= 0.0 => *n as usize,
                Some(v) => return Err(format!("tab.{name} count must be a number, found {}", v.type_name())),
            };
            let total = df.n_rows();
            let range = if name == "head" {
                0..n.min(total)
            } else {
                total.saturating_sub(n)..total
            };
            Ok(Value::Table(frame_rows_table(df, range)))
        }
        "shape" => {
            let df = expect_frame(args.first(), name)?;
            let (r, c) = df.shape();
            Ok(Value::Str(format!("({r}, {c})")))
        }
        "columns" => {
            let df = expect_frame(args.first(), name)?;
            Ok(Value::Str(df.column_names().join(", ")))
        }
        "describe" => {
            let df = expect_frame(args.first(), name)?;
            Ok(Value::Table(describe_table(df)))
        }
        "value_counts" => match args.first() {
            Some(Value::Series(s)) => Ok(Value::Table(value_counts(
                &s.name,
                s.values.iter().map(|v| v.map(format_number)),
            ))),
            Some(Value::TextSeries(s)) => Ok(Value::Table(value_counts(
                &s.name,
                s.values.iter().cloned(),
            ))),
            Some(v) => Err(format!("tab.value_counts expects a series, found {}", v.type_name())),
            None => Err("tab.value_counts expects a series argument".into()),
        },
        "group_sum" => {
            let df = expect_frame(args.first(), name)?;
            let (cat, val) = match (args.get(1), args.get(2)) {
                (Some(Value::Str(c)), Some(Value::Str(v))) => (c, v),
                _ => {
                    return Err(
                        "tab.group_sum expects (df, \"category column\", \"value column\")".into(),
                    )
                }
            };
            let table = group_sum(df, cat, val)?;
            Ok(Value::Table(table))
        }
        other => Err(format!("unknown function 'tab.{other}'")),
    }
}

fn expect_frame<'a>(v: Option<&'a Value>, func: &str) -> Result<&'a DataFrame, String> {
    match v {
        Some(Value::Frame(df)) => Ok(df),
        Some(v) => Err(format!("tab.{func} expects the dataframe 'df', found {}", v.type_name())),
        None => Err(format!("tab.{func} expects the dataframe 'df' as first argument")),
    }
}

fn frame_rows_table(df: &DataFrame, range: std::ops::Range<usize>) -> Table {
    let index = range.clone().map(|i| i.to_string()).collect();
    let columns = df
        .columns()
        .iter()
        .map(|c| {
            let cells = range
                .clone()
                .map(|row| c.cell(row).unwrap_or_else(|| "NA".into()))
                .collect();
            (c.name.clone(), cells)
        })
        .collect();
    Table { index, columns }
}

fn describe_table(df: &DataFrame) -> Table {
    const ROWS: &[&str] = &["count", "mean", "std", "min", "25%", "50%", "75%", "max"];
    let columns = df
        .columns()
        .iter()
        .filter(|c| c.is_numeric())
        .map(|c| {
            let v = c.numeric_values();
            let cells = vec![
                v.len().to_string(),
                opt_num(stats::mean(&v)),
                opt_num(stats::std_dev(&v)),
                opt_num(stats::min(&v)),
                opt_num(stats::quantile(&v, 0.25)),
                opt_num(stats::quantile(&v, 0.5)),
                opt_num(stats::quantile(&v, 0.75)),
                opt_num(stats::max(&v)),
            ];
            (c.name.clone(), cells)
        })
        .collect();
    Table {
        index: ROWS.iter().map(|s| s.to_string()).collect(),
        columns,
    }
}

fn value_counts<I>(name: &str, values: I) -> Table
where
    I: Iterator<Item = Option<String>>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for v in values.flatten() {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut pairs: Vec<(String, usize)> = counts.into_iter().collect();
    // count descending, then value ascending for a stable rendering
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Table {
        index: pairs.iter().map(|(v, _)| v.clone()).collect(),
        columns: vec![(
            format!("count of {name}"),
            pairs.iter().map(|(_, c)| c.to_string()).collect(),
        )],
    }
}

fn group_sum(df: &DataFrame, cat: &str, val: &str) -> Result<Table, String> {
    let cat_col = df
        .column(cat)
        .ok_or_else(|| format!("unknown column '{cat}'"))?;
    let val_col = df
        .column(val)
        .ok_or_else(|| format!("unknown column '{val}'"))?;
    let values = match &val_col.values {
        ColumnValues::Numeric(v) => v,
        ColumnValues::Text(_) => return Err(format!("column '{val}' is not numeric")),
    };
    let mut sums: HashMap<String, f64> = HashMap::new();
    for row in 0..df.n_rows() {
        let (Some(key), Some(Some(v))) = (cat_col.cell(row), values.get(row)) else {
            continue;
        };
        *sums.entry(key).or_insert(0.0) += v;
    }
    let mut pairs: Vec<(String, f64)> = sums.into_iter().collect();
    pairs.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(Table {
        index: pairs.iter().map(|(k, _)| k.clone()).collect(),
        columns: vec![(
            format!("sum of {val}"),
            pairs.iter().map(|(_, v)| format_number(*v)).collect(),
        )],
    })
}

// ------------------------------------------------------- num namespace

fn num_call(name: &str, args: &[Value]) -> Result<Value, String> {
    match name {
        "mean" | "median" | "std" | "var" | "min" | "max" | "sum" | "count" => {
            let v = expect_series(args.first(), name)?;
            let out = match name {
                "mean" => stats::mean(&v),
                "median" => stats::median(&v),
                "std" => stats::std_dev(&v),
                "var" => stats::variance(&v),
                "min" => stats::min(&v),
                "max" => stats::max(&v),
                "sum" => Some(v.iter().sum()),
                _ => Some(v.len() as f64),
            };
            out.map(Value::Num)
                .ok_or_else(|| format!("num.{name} is undefined for this input"))
        }
        "quantile" => {
            let v = expect_series(args.first(), name)?;
            let q = match args.get(1) {
                Some(Value::Num(q)) => *q,
                _ => return Err("num.quantile expects (series, q) with q in [0, 1]".into()),
            };
            stats::quantile(&v, q)
                .map(Value::Num)
                .ok_or_else(|| format!("quantile {q} is undefined for this input"))
        }
        "corr" => {
            let a = expect_series(args.first(), name)?;
            let b = expect_series(args.get(1), name)?;
            stats::pearson(&a, &b)
                .map(Value::Num)
                .ok_or_else(|| "correlation is undefined (constant or empty input)".to_string())
        }
        "abs" | "sqrt" => {
            let x = expect_num(args.first(), name)?;
            let out = if name == "abs" { x.abs() } else { x.sqrt() };
            Ok(Value::Num(out))
        }
        "round" => {
            let x = expect_num(args.first(), name)?;
            let digits = match args.get(1) {
                None => 0,
                Some(Value::Num(d)) => *d as i32,
                Some(v) => return Err(format!("num.round digits must be a number, found {}", v.type_name())),
            };
            let factor = 10f64.powi(digits);
            Ok(Value::Num((x * factor).round() / factor))
        }
        other => Err(format!("unknown function 'num.{other}'")),
    }
}

fn expect_series(v: Option<&Value>, func: &str) -> Result<Vec<f64>, String> {
    match v {
        Some(Value::Series(s)) => Ok(s.non_null()),
        Some(Value::TextSeries(s)) => {
            Err(format!("num.{func} expects a numeric series, but column '{}' is not numeric", s.name))
        }
        Some(v) => Err(format!("num.{func} expects a numeric series, found {}", v.type_name())),
        None => Err(format!("num.{func} expects a series argument")),
    }
}

fn expect_num(v: Option<&Value>, func: &str) -> Result<f64, String> {
    match v {
        Some(Value::Num(n)) => Ok(*n),
        Some(v) => Err(format!("num.{func} expects a number, found {}", v.type_name())),
        None => Err(format!("num.{func} expects a number argument")),
    }
}

// ------------------------------------------------------------ rendering

/// String form of a value. Tabular shapes render at most `max_rows` data
/// rows with their row labels, then a truncation notice.
pub fn render_value(value: &Value, max_rows: usize) -> String {
    match value {
        Value::Num(n) => format_number(*n),
        Value::Str(s) => s.clone(),
        Value::Series(s) => render_table(
            &Table {
                index: (0..s.values.len()).map(|i| i.to_string()).collect(),
                columns: vec![(
                    s.name.clone(),
                    s.values
                        .iter()
                        .map(|v| v.map(format_number).unwrap_or_else(|| "NA".into()))
                        .collect(),
                )],
            },
            max_rows,
        ),
        Value::TextSeries(s) => render_table(
            &Table {
                index: (0..s.values.len()).map(|i| i.to_string()).collect(),
                columns: vec![(
                    s.name.clone(),
                    s.values
                        .iter()
                        .map(|v| v.clone().unwrap_or_else(|| "NA".into()))
                        .collect(),
                )],
            },
            max_rows,
        ),
        Value::Frame(df) => render_table(&frame_rows_table(df, 0..df.n_rows()), max_rows),
        Value::Table(t) => render_table(t, max_rows),
    }
}

fn render_table(table: &Table, max_rows: usize) -> String {
    let total = table.index.len();
    let shown = total.min(max_rows);

    // column widths: label column, then each data column
    let label_width = table.index.iter().take(shown).map(String::len).max().unwrap_or(0);
    let widths: Vec<usize> = table
        .columns
        .iter()
        .map(|(name, cells)| {
            cells
                .iter()
                .take(shown)
                .map(String::len)
                .chain([name.len()])
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let _ = write!(out, "{:label_width$}", "");
    for ((name, _), w) in table.columns.iter().zip(widths.iter().copied()) {
        let _ = write!(out, "  {name:>w$}");
    }
    for row in 0..shown {
        let _ = write!(out, "\n{:label_width$}", table.index[row]);
        for ((_, cells), w) in table.columns.iter().zip(widths.iter().copied()) {
            let _ = write!(out, "  {:>w$}", cells[row]);
        }
    }
    if total > shown {
        let _ = write!(out, "\n[truncated: showing {shown} of {total} rows]");
    }
    out
}

fn opt_num(v: Option<f64>) -> String {
    v.map(format_number).unwrap_or_else(|| "NA".into())
}
