//! Comparison operators for keyword filters and join conditions.
//!
//! Filter keys carry their operator as a suffix: `age__gt`, `name__ilike`,
//! `id__in`. A key without a suffix compares for equality.

use std::fmt;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operator {
    /// `=`
    #[default]
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `= any($n::TYPE[])`
    In,
    /// `LIKE`
    Like,
    /// `ILIKE`
    Ilike,
}

impl Operator {
    pub const ALL: [Operator; 9] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Le,
        Operator::Gt,
        Operator::Ge,
        Operator::In,
        Operator::Like,
        Operator::Ilike,
    ];

    /// Parse a filter suffix (`eq`, `ne`, `lt`, ...).
    pub fn parse(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "eq" => Operator::Eq,
            "ne" => Operator::Ne,
            "lt" => Operator::Lt,
            "le" => Operator::Le,
            "gt" => Operator::Gt,
            "ge" => Operator::Ge,
            "in" => Operator::In,
            "like" => Operator::Like,
            "ilike" => Operator::Ilike,
            _ => return None,
        })
    }

    /// The filter suffix this operator is spelled with.
    pub fn suffix(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Le => "le",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::In => "in",
            Operator::Like => "like",
            Operator::Ilike => "ilike",
        }
    }

    /// SQL spelling. `In` renders as `=` against `any(...)`.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq | Operator::In => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::Ilike => "ILIKE",
        }
    }

    /// `IS NULL` / `IS NOT NULL` spelling for null comparisons.
    pub fn null_symbol(self) -> Option<&'static str> {
        match self {
            Operator::Eq => Some("IS NULL"),
            Operator::Ne => Some("IS NOT NULL"),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Whether `name` ends in a recognised `__<op>` suffix.
pub(crate) fn has_operator_suffix(name: &str) -> bool {
    name.rsplit_once("__")
        .is_some_and(|(_, suffix)| Operator::parse(suffix).is_some())
}

/// One `left <op> right` comparison in a join's `ON` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnClause {
    pub left: String,
    pub right: String,
    pub operator: Operator,
}

impl OnClause {
    pub fn new(left: impl Into<String>, right: impl Into<String>, operator: Operator) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            operator,
        }
    }

    pub fn eq(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::new(left, right, Operator::Eq)
    }
}

/// One or more ON comparisons, AND'ed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnClauses(pub Vec<OnClause>);

impl From<OnClause> for OnClauses {
    fn from(clause: OnClause) -> Self {
        OnClauses(vec![clause])
    }
}

impl From<(&str, &str)> for OnClauses {
    fn from((left, right): (&str, &str)) -> Self {
        OnClause::eq(left, right).into()
    }
}

impl From<(&str, &str, Operator)> for OnClauses {
    fn from((left, right, operator): (&str, &str, Operator)) -> Self {
        OnClause::new(left, right, operator).into()
    }
}

impl From<Vec<OnClause>> for OnClauses {
    fn from(clauses: Vec<OnClause>) -> Self {
        OnClauses(clauses)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for OnClauses {
    fn from(pairs: [(&str, &str); N]) -> Self {
        OnClauses(pairs.iter().map(|(l, r)| OnClause::eq(*l, *r)).collect())
    }
}

impl<const N: usize> From<[(&str, &str, Operator); N]> for OnClauses {
    fn from(triples: [(&str, &str, Operator); N]) -> Self {
        OnClauses(
            triples
                .iter()
                .map(|(l, r, op)| OnClause::new(*l, *r, *op))
                .collect(),
        )
    }
}
