//! Query descriptors.
//!
//! A [`QueryDescriptor`] is the intermediate form between a fluent builder and
//! a grammar. Every predicate-adding method appends its values to the matching
//! binding bucket in the same call, so [`QueryDescriptor::bindings`] always
//! lines up with the placeholders produced by compilation.

use std::fmt;
use std::str::FromStr;

use crate::error::GrammarError;
use crate::value::SqlValue;

/// Conjunction joining a predicate to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boolean {
    /// `AND`
    #[default]
    And,
    /// `OR`
    Or,
}

impl Boolean {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Comparison operators accepted by `where`/`having` predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// Case-insensitive `LIKE`. PostgreSQL only has it natively.
    ILike,
}

impl Operator {
    /// Returns the portable SQL token.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::ILike => "ILIKE",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = GrammarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_lowercase().as_str() {
            "=" | "==" => Ok(Self::Eq),
            "<>" | "!=" => Ok(Self::NotEq),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::LtEq),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::GtEq),
            "like" => Ok(Self::Like),
            "not like" => Ok(Self::NotLike),
            "ilike" => Ok(Self::ILike),
            _ => Err(GrammarError::InvalidOperator(s.to_string())),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl Direction {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A projected column.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// A column reference, optionally `table.column` or `column AS alias`.
    Column(String),
    /// A raw expression emitted as written.
    Raw(String),
}

/// Join flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `INNER JOIN`
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
}

impl JoinKind {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
        }
    }
}

/// A column-to-column join clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Join flavour.
    pub kind: JoinKind,
    /// Joined table.
    pub table: String,
    /// Left-hand column.
    pub first: String,
    /// Comparison operator.
    pub operator: Operator,
    /// Right-hand column.
    pub second: String,
}

/// The shape of a `WHERE` predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereKind {
    /// `column op ?`
    Basic {
        /// Column reference.
        column: String,
        /// Comparison operator.
        operator: Operator,
        /// Bound value.
        value: SqlValue,
    },
    /// `column [NOT] IN (?, ...)`
    In {
        /// Column reference.
        column: String,
        /// Bound values.
        values: Vec<SqlValue>,
        /// `NOT IN` when set.
        not: bool,
    },
    /// `column IS [NOT] NULL`
    Null {
        /// Column reference.
        column: String,
        /// `IS NOT NULL` when set.
        not: bool,
    },
    /// `column [NOT] BETWEEN ? AND ?`
    Between {
        /// Column reference.
        column: String,
        /// Lower bound.
        low: SqlValue,
        /// Upper bound.
        high: SqlValue,
        /// `NOT BETWEEN` when set.
        not: bool,
    },
    /// `first op second`, both columns.
    Column {
        /// Left-hand column.
        first: String,
        /// Comparison operator.
        operator: Operator,
        /// Right-hand column.
        second: String,
    },
    /// A parenthesised group of predicates.
    Nested(Vec<Where>),
    /// A raw fragment with its own bindings.
    Raw {
        /// SQL fragment.
        sql: String,
        /// Values for the fragment's placeholders.
        bindings: Vec<SqlValue>,
    },
}

impl WhereKind {
    /// Values bound by this predicate, in placeholder order.
    #[must_use]
    pub fn bindings(&self) -> Vec<SqlValue> {
        match self {
            Self::Basic { value, .. } => vec![value.clone()],
            Self::In { values, .. } => values.clone(),
            Self::Between { low, high, .. } => vec![low.clone(), high.clone()],
            Self::Nested(wheres) => wheres.iter().flat_map(|w| w.kind.bindings()).collect(),
            Self::Raw { bindings, .. } => bindings.clone(),
            Self::Null { .. } | Self::Column { .. } => Vec::new(),
        }
    }
}

/// A predicate with its conjunction.
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    /// Conjunction with the previous predicate.
    pub boolean: Boolean,
    /// Predicate shape.
    pub kind: WhereKind,
}

/// A `HAVING` predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Having {
    /// `column op ?`
    Basic {
        /// Conjunction with the previous predicate.
        boolean: Boolean,
        /// Column or aggregate alias.
        column: String,
        /// Comparison operator.
        operator: Operator,
    },
    /// Raw fragment.
    Raw {
        /// Conjunction with the previous predicate.
        boolean: Boolean,
        /// SQL fragment.
        sql: String,
    },
}

/// An `ORDER BY` entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    /// Column with direction.
    Column {
        /// Column reference.
        column: String,
        /// Direction.
        direction: Direction,
    },
    /// Raw fragment.
    Raw(String),
}

/// Bindings grouped by the clause they belong to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    /// Values of raw select expressions.
    pub select: Vec<SqlValue>,
    /// Values of `WHERE` predicates.
    pub wheres: Vec<SqlValue>,
    /// Values of `HAVING` predicates.
    pub having: Vec<SqlValue>,
    /// Values of raw order expressions.
    pub order: Vec<SqlValue>,
}

/// Structured description of a `SELECT`/`UPDATE`/`DELETE` target.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryDescriptor {
    /// Source table.
    pub table: String,
    /// Projection; empty means `*`.
    pub columns: Vec<Selection>,
    /// `SELECT DISTINCT`.
    pub distinct: bool,
    /// Join clauses.
    pub joins: Vec<Join>,
    /// Predicates.
    pub wheres: Vec<Where>,
    /// `GROUP BY` columns.
    pub groups: Vec<String>,
    /// `HAVING` predicates.
    pub havings: Vec<Having>,
    /// `ORDER BY` entries.
    pub orders: Vec<Order>,
    /// `LIMIT`.
    pub limit: Option<u64>,
    /// `OFFSET`.
    pub offset: Option<u64>,
    bindings: Bindings,
}

impl QueryDescriptor {
    /// Creates a descriptor selecting from `table`.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Appends a projected column.
    pub fn add_column(&mut self, column: impl Into<String>) {
        self.columns.push(Selection::Column(column.into()));
    }

    /// Appends a raw projection and its bindings.
    pub fn add_select_raw(&mut self, expression: impl Into<String>, bindings: Vec<SqlValue>) {
        self.columns.push(Selection::Raw(expression.into()));
        self.bindings.select.extend(bindings);
    }

    /// Appends a join.
    pub fn add_join(&mut self, join: Join) {
        self.joins.push(join);
    }

    /// Appends a predicate and its bindings.
    pub fn add_where(&mut self, boolean: Boolean, kind: WhereKind) {
        if let WhereKind::Nested(inner) = &kind {
            if inner.is_empty() {
                return;
            }
        }
        self.bindings.wheres.extend(kind.bindings());
        self.wheres.push(Where { boolean, kind });
    }

    /// Appends a `GROUP BY` column.
    pub fn add_group(&mut self, column: impl Into<String>) {
        self.groups.push(column.into());
    }

    /// Appends a `HAVING column op ?` predicate and its binding.
    pub fn add_having(
        &mut self,
        boolean: Boolean,
        column: impl Into<String>,
        operator: Operator,
        value: SqlValue,
    ) {
        self.havings.push(Having::Basic {
            boolean,
            column: column.into(),
            operator,
        });
        self.bindings.having.push(value);
    }

    /// Appends a raw `HAVING` fragment and its bindings.
    pub fn add_having_raw(&mut self, boolean: Boolean, sql: impl Into<String>, bindings: Vec<SqlValue>) {
        self.havings.push(Having::Raw {
            boolean,
            sql: sql.into(),
        });
        self.bindings.having.extend(bindings);
    }

    /// Appends an order column.
    pub fn add_order(&mut self, column: impl Into<String>, direction: Direction) {
        self.orders.push(Order::Column {
            column: column.into(),
            direction,
        });
    }

    /// Appends a raw order fragment and its bindings.
    pub fn add_order_raw(&mut self, sql: impl Into<String>, bindings: Vec<SqlValue>) {
        self.orders.push(Order::Raw(sql.into()));
        self.bindings.order.extend(bindings);
    }

    /// Binding buckets.
    #[must_use]
    pub const fn binding_buckets(&self) -> &Bindings {
        &self.bindings
    }

    /// All bindings in compilation order: select, where, having, order.
    #[must_use]
    pub fn bindings(&self) -> Vec<SqlValue> {
        let b = &self.bindings;
        b.select
            .iter()
            .chain(&b.wheres)
            .chain(&b.having)
            .chain(&b.order)
            .cloned()
            .collect()
    }

    /// Bindings of the `WHERE` clause only, used by `UPDATE` and `DELETE`.
    #[must_use]
    pub fn where_bindings(&self) -> &[SqlValue] {
        &self.bindings.wheres
    }

    /// Groups the current predicates in parentheses when any of them is
    /// joined with `OR`, so a predicate appended afterwards constrains the
    /// whole group. Bindings keep their order.
    pub fn wrap_wheres(&mut self) {
        if self.wheres.iter().any(|w| w.boolean == Boolean::Or) {
            let wheres = std::mem::take(&mut self.wheres);
            self.wheres.push(Where {
                boolean: Boolean::And,
                kind: WhereKind::Nested(wheres),
            });
        }
    }

    /// Copy without ordering, limit and offset, for counting.
    #[must_use]
    pub fn without_pagination(&self) -> Self {
        let mut copy = self.clone();
        copy.orders.clear();
        copy.bindings.order.clear();
        copy.limit = None;
        copy.offset = None;
        copy
    }

    /// Copy without projection, for aggregates over the same source.
    #[must_use]
    pub fn without_columns(&self) -> Self {
        let mut copy = self.clone();
        copy.columns.clear();
        copy.bindings.select.clear();
        copy
    }

    /// Sets limit and offset for a 1-based page. The offset saturates at
    /// `u64::MAX`.
    pub fn for_page(&mut self, page: u64, per_page: u64) {
        let page = page.max(1);
        self.offset = Some((page - 1).saturating_mul(per_page));
        self.limit = Some(per_page);
    }

    /// True when a group, distinct or having clause forces aggregates into a
    /// sub-select.
    #[must_use]
    pub fn needs_aggregate_subquery(&self) -> bool {
        self.distinct || !self.groups.is_empty() || !self.havings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_parsing() {
        assert_eq!("=".parse::<Operator>().unwrap(), Operator::Eq);
        assert_eq!("!=".parse::<Operator>().unwrap(), Operator::NotEq);
        assert_eq!("NOT   LIKE".parse::<Operator>().unwrap(), Operator::NotLike);
        assert!(matches!(
            "=~".parse::<Operator>(),
            Err(GrammarError::InvalidOperator(op)) if op == "=~"
        ));
    }

    #[test]
    fn test_wrap_wheres_only_groups_disjunctions() {
        let basic = |column: &str, value: i64| WhereKind::Basic {
            column: column.to_string(),
            operator: Operator::Eq,
            value: SqlValue::Int(value),
        };
        let mut q = QueryDescriptor::new("users");
        q.add_where(Boolean::And, basic("a", 1));
        q.wrap_wheres();
        assert_eq!(q.wheres.len(), 1);
        assert!(matches!(q.wheres[0].kind, WhereKind::Basic { .. }));

        q.add_where(Boolean::Or, basic("b", 2));
        q.wrap_wheres();
        assert_eq!(q.wheres.len(), 1);
        assert!(matches!(&q.wheres[0].kind, WhereKind::Nested(inner) if inner.len() == 2));
        assert_eq!(q.where_bindings(), vec![SqlValue::Int(1), SqlValue::Int(2)]);
    }

    #[test]
    fn test_bindings_follow_clause_order() {
        let mut q = QueryDescriptor::new("users");
        q.add_order_raw("FIELD(id, ?)", vec![SqlValue::Int(9)]);
        q.add_having(Boolean::And, "total", Operator::Gt, SqlValue::Int(3));
        q.add_where(
            Boolean::And,
            WhereKind::Basic {
                column: String::from("age"),
                operator: Operator::GtEq,
                value: SqlValue::Int(18),
            },
        );
        q.add_select_raw("? AS marker", vec![SqlValue::Int(1)]);

        assert_eq!(
            q.bindings(),
            vec![
                SqlValue::Int(1),
                SqlValue::Int(18),
                SqlValue::Int(3),
                SqlValue::Int(9)
            ]
        );
    }

    #[test]
    fn test_nested_where_bindings_are_flattened() {
        let inner = vec![
            Where {
                boolean: Boolean::And,
                kind: WhereKind::Basic {
                    column: String::from("a"),
                    operator: Operator::Eq,
                    value: SqlValue::Int(1),
                },
            },
            Where {
                boolean: Boolean::Or,
                kind: WhereKind::Between {
                    column: String::from("b"),
                    low: SqlValue::Int(2),
                    high: SqlValue::Int(3),
                    not: false,
                },
            },
        ];
        let mut q = QueryDescriptor::new("t");
        q.add_where(Boolean::And, WhereKind::Nested(inner));
        assert_eq!(
            q.bindings(),
            vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]
        );
    }

    #[test]
    fn test_empty_nested_group_is_ignored() {
        let mut q = QueryDescriptor::new("t");
        q.add_where(Boolean::And, WhereKind::Nested(Vec::new()));
        assert!(q.wheres.is_empty());
    }

    #[test]
    fn test_without_pagination_drops_order_bindings() {
        let mut q = QueryDescriptor::new("t");
        q.add_order_raw("x = ?", vec![SqlValue::Int(1)]);
        q.for_page(3, 10);
        let stripped = q.without_pagination();
        assert!(stripped.orders.is_empty());
        assert!(stripped.bindings().is_empty());
        assert_eq!(stripped.limit, None);
        assert_eq!(q.offset, Some(20));
    }

    #[test]
    fn test_for_page_saturates_offset() {
        let mut q = QueryDescriptor::new("t");
        q.for_page(u64::MAX, 10);
        assert_eq!(q.offset, Some(u64::MAX));
        assert_eq!(q.limit, Some(10));
        q.for_page(0, 10);
        assert_eq!(q.offset, Some(0));
    }
}
