use std::fmt;

use chrono::NaiveDateTime;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

/// Compiled size cap for wildcard patterns.
pub const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Parsed boolean query. Built once per query string and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Condition(Condition),
}

impl Expression {
    pub fn not(operand: Expression) -> Self {
        Expression::Not(Box::new(operand))
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::Or(Box::new(left), Box::new(right))
    }

    /// Leaf conditions, left to right.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            Expression::Not(inner) => inner.collect_conditions(out),
            Expression::And(l, r) | Expression::Or(l, r) => {
                l.collect_conditions(out);
                r.collect_conditions(out);
            }
            Expression::Condition(c) => out.push(c),
        }
    }
}

/// Canonical query text with every binary operation parenthesised.
/// Re-parsing it yields an equal tree.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Not(inner) => write!(f, "NOT {}", inner),
            Expression::And(l, r) => write!(f, "({} AND {})", l, r),
            Expression::Or(l, r) => write!(f, "({} OR {})", l, r),
            Expression::Condition(c) => write!(f, "{}[{}]", c.raw, c.field.name),
        }
    }
}

/// A resolved field reference: position in the registry and full name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRef {
    pub index: usize,
    pub name: String,
}

/// `operand[field]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub field: FieldRef,
    pub operand: Operand,
    /// Operand text as written in the query, quotes included.
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// String equality or wildcard match.
    Text(TextPattern),
    /// `>`, `<` or `=` against a number or datetime.
    Compare { comparator: Comparator, value: Scalar },
    /// Boolean equality.
    Flag(bool),
    /// List membership.
    Members {
        mode: MembershipMode,
        values: Vec<String>,
    },
}

/// String pattern derived from the placement of `*` in the operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPattern {
    Exact(String),
    /// `abc*`
    Prefix(String),
    /// `*abc`
    Suffix(String),
    /// `*abc*`
    Contains(String),
    /// Any other placement, e.g. `a*c`; holds the pattern with its stars.
    Glob(String),
}

impl TextPattern {
    pub fn from_wildcard(term: &str) -> Self {
        if !term.contains('*') {
            return TextPattern::Exact(term.to_string());
        }
        let inner = term.trim_matches('*');
        if inner.contains('*') {
            return TextPattern::Glob(term.to_string());
        }
        match (term.starts_with('*'), term.ends_with('*')) {
            (true, true) => TextPattern::Contains(inner.to_string()),
            (true, false) => TextPattern::Suffix(inner.to_string()),
            _ => TextPattern::Prefix(inner.to_string()),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        !matches!(self, TextPattern::Exact(_))
    }

    /// Regular expression source, anchored where the pattern has no star.
    pub fn to_regex(&self) -> String {
        match self {
            TextPattern::Exact(s) => format!("^{}$", regex::escape(s)),
            TextPattern::Prefix(s) => format!("^{}", regex::escape(s)),
            TextPattern::Suffix(s) => format!("{}$", regex::escape(s)),
            TextPattern::Contains(s) => regex::escape(s),
            TextPattern::Glob(pattern) => {
                let body = pattern
                    .split('*')
                    .filter(|piece| !piece.is_empty())
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(".*");
                let start = if pattern.starts_with('*') { "" } else { "^" };
                let end = if pattern.ends_with('*') { "" } else { "$" };
                format!("{}{}{}", start, body, end)
            }
        }
    }

    /// Compile [`to_regex`](Self::to_regex). Parsing and index lookups share
    /// this, so a pattern that parsed also compiles at lookup.
    pub fn compile(&self) -> Result<Regex, regex::Error> {
        RegexBuilder::new(&self.to_regex())
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()
    }

    /// SQL `LIKE` pattern: `*` becomes `%`.
    pub fn to_like(&self) -> String {
        match self {
            TextPattern::Exact(s) => s.clone(),
            TextPattern::Prefix(s) => format!("{}%", s),
            TextPattern::Suffix(s) => format!("%{}", s),
            TextPattern::Contains(s) => format!("%{}%", s),
            TextPattern::Glob(pattern) => pattern.replace('*', "%"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    GreaterThan,
    LessThan,
    Equal,
}

impl Comparator {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '>' => Some(Comparator::GreaterThan),
            '<' => Some(Comparator::LessThan),
            '=' => Some(Comparator::Equal),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::GreaterThan => ">",
            Comparator::LessThan => "<",
            Comparator::Equal => "=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scalar {
    Number(f64),
    DateTime(NaiveDateTime),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipMode {
    /// `?a,b` - the object's list holds every value.
    Contains,
    /// `!a,b` - the object's list holds exactly these values.
    Exact,
}
