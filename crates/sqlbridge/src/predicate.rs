//! `Where` predicates and `Values` assignments.
//!
//! Both maps are ordered by column name, so formatting the same content always
//! yields the same SQL bytes.

use crate::value::Value;
use std::collections::BTreeMap;
use std::collections::btree_map;

/// One typed operator in the `Where` vocabulary.
///
/// A bare scalar converts into [`Predicate::Eq`].
///
/// # Example
/// ```ignore
/// use sqlbridge::Predicate;
///
/// Predicate::gt(18);
/// Predicate::like("ali");          // binds "%ali%"
/// Predicate::in_list(["a", "b"]);
/// Predicate::between(1, 10);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// column = value
    Eq(Value),
    /// column != value
    NotEq(Value),
    /// column > value
    Gt(Value),
    /// column >= value
    GtEq(Value),
    /// column < value
    Lt(Value),
    /// column <= value
    LtEq(Value),
    /// column LIKE %pattern%
    Like(String),
    /// column NOT LIKE %pattern%
    NotLike(String),
    /// column IS NULL (the value is not rendered)
    Is(Value),
    /// column IS NOT NULL (the value is not rendered)
    IsNot(Value),
    /// column IN (list)
    In(Vec<Value>),
    /// column NOT IN (list)
    NotIn(Vec<Value>),
    /// column BETWEEN start AND end
    Btwn { start: Value, end: Value },
    /// column NOT BETWEEN start AND end
    NotBtwn { start: Value, end: Value },
    /// column = <sql>, inlined without escaping
    Literal(String),
}

impl Predicate {
    pub fn eq(value: impl Into<Value>) -> Self {
        Predicate::Eq(value.into())
    }

    pub fn not_eq(value: impl Into<Value>) -> Self {
        Predicate::NotEq(value.into())
    }

    pub fn gt(value: impl Into<Value>) -> Self {
        Predicate::Gt(value.into())
    }

    pub fn gt_eq(value: impl Into<Value>) -> Self {
        Predicate::GtEq(value.into())
    }

    pub fn lt(value: impl Into<Value>) -> Self {
        Predicate::Lt(value.into())
    }

    pub fn lt_eq(value: impl Into<Value>) -> Self {
        Predicate::LtEq(value.into())
    }

    /// Substring match; the formatter adds the `%` wildcards.
    pub fn like(pattern: impl Into<String>) -> Self {
        Predicate::Like(pattern.into())
    }

    pub fn not_like(pattern: impl Into<String>) -> Self {
        Predicate::NotLike(pattern.into())
    }

    /// Nullability check. Renders `IS NULL` whatever the value.
    pub fn is(value: impl Into<Value>) -> Self {
        Predicate::Is(value.into())
    }

    /// Nullability check. Renders `IS NOT NULL` whatever the value.
    pub fn is_not(value: impl Into<Value>) -> Self {
        Predicate::IsNot(value.into())
    }

    pub fn in_list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::In(values.into_iter().map(Into::into).collect())
    }

    pub fn not_in<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::NotIn(values.into_iter().map(Into::into).collect())
    }

    pub fn between(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Predicate::Btwn {
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn not_between(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Predicate::NotBtwn {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Raw SQL on the right-hand side of `=`.
    ///
    /// Never build this from user input.
    pub fn literal(sql: impl Into<String>) -> Self {
        Predicate::Literal(sql.into())
    }
}

impl<T: Into<Value>> From<T> for Predicate {
    fn from(value: T) -> Self {
        Predicate::Eq(value.into())
    }
}

/// Column name to predicate, iterated in sorted key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where(BTreeMap<String, Predicate>);

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate (builder form).
    pub fn and(mut self, column: impl Into<String>, predicate: impl Into<Predicate>) -> Self {
        self.0.insert(column.into(), predicate.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, predicate: impl Into<Predicate>) {
        self.0.insert(column.into(), predicate.into());
    }

    pub fn get(&self, column: &str) -> Option<&Predicate> {
        self.0.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Predicate> {
        self.0.iter()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>, P: Into<Predicate>> FromIterator<(K, P)> for Where {
    fn from_iter<I: IntoIterator<Item = (K, P)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, p)| (k.into(), p.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Where {
    type Item = (&'a String, &'a Predicate);
    type IntoIter = btree_map::Iter<'a, String, Predicate>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Right-hand side of an INSERT/UPDATE assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Assign {
    /// Bound as a statement argument.
    Value(Value),
    /// Inlined verbatim (e.g. `NOW()`).
    Literal(String),
}

impl Assign {
    /// The predicate a follow-up query uses to find the row holding this value.
    pub(crate) fn to_predicate(&self) -> Predicate {
        match self {
            Assign::Value(v) => Predicate::Eq(v.clone()),
            Assign::Literal(sql) => Predicate::Literal(sql.clone()),
        }
    }
}

impl<T: Into<Value>> From<T> for Assign {
    fn from(value: T) -> Self {
        Assign::Value(value.into())
    }
}

/// Column name to assigned value, iterated in sorted key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values(BTreeMap<String, Assign>);

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bound value (builder form).
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Assign>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    /// Add an inlined SQL expression (builder form).
    pub fn set_literal(mut self, column: impl Into<String>, sql: impl Into<String>) -> Self {
        self.0.insert(column.into(), Assign::Literal(sql.into()));
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Assign>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Assign> {
        self.0.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Assign> {
        self.0.iter()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>, A: Into<Assign>> FromIterator<(K, A)> for Values {
    fn from_iter<I: IntoIterator<Item = (K, A)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, a)| (k.into(), a.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Values {
    type Item = (&'a String, &'a Assign);
    type IntoIter = btree_map::Iter<'a, String, Assign>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
