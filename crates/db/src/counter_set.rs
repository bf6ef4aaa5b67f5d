//! Atomic counter-set updates.
//!
//! A counter-set is an integer column paired with a `jsonb` array of ids, kept so that
//! `total == jsonb_array_length(members)`. Both columns change in a single `UPDATE`
//! whose `WHERE` clause carries the membership precondition, so concurrent toggles
//! cannot double-apply or lose an update.

use sea_orm::{
    ColumnTrait, EntityTrait, IdenStatic, QueryFilter, UpdateMany,
    sea_query::{Expr, SimpleExpr},
};

/// Column pair making up one counter-set on entity `E`.
#[derive(Debug, Clone, Copy)]
pub struct CounterSet<E: EntityTrait> {
    /// Integer total column.
    pub total: E::Column,
    /// `jsonb` member array column.
    pub members: E::Column,
}

impl<E: EntityTrait> CounterSet<E> {
    /// Create a counter-set over the given columns.
    pub const fn new(total: E::Column, members: E::Column) -> Self {
        Self { total, members }
    }

    /// `members @> ["member"]`
    #[must_use]
    pub fn contains(&self, member: &str) -> SimpleExpr {
        Expr::cust_with_values(
            format!(r#""{}" @> jsonb_build_array($1::text)"#, self.members.as_str()),
            [member.to_string()],
        )
    }

    /// `NOT (members @> ["member"])`
    #[must_use]
    pub fn lacks(&self, member: &str) -> SimpleExpr {
        Expr::cust_with_values(
            format!(
                r#"NOT ("{}" @> jsonb_build_array($1::text))"#,
                self.members.as_str()
            ),
            [member.to_string()],
        )
    }

    /// Update adding `member` and incrementing the total, applied only to rows
    /// that do not already contain it.
    #[must_use]
    pub fn add(&self, member: &str) -> UpdateMany<E> {
        E::update_many()
            .col_expr(self.total, Expr::col(self.total).add(1))
            .col_expr(
                self.members,
                Expr::cust_with_values(
                    format!(
                        r#""{}" || jsonb_build_array($1::text)"#,
                        self.members.as_str()
                    ),
                    [member.to_string()],
                ),
            )
            .filter(self.lacks(member))
    }

    /// Update removing `member` and decrementing the total, applied only to rows
    /// that contain it.
    #[must_use]
    pub fn remove(&self, member: &str) -> UpdateMany<E> {
        E::update_many()
            .col_expr(
                self.total,
                Expr::cust(format!(r#"GREATEST("{}" - 1, 0)"#, self.total.as_str())),
            )
            .col_expr(
                self.members,
                Expr::cust_with_values(
                    format!(r#""{}" - $1::text"#, self.members.as_str()),
                    [member.to_string()],
                ),
            )
            .filter(self.contains(member))
    }
}

/// Append `member` to a plain `jsonb` array column without a counter.
#[must_use]
pub fn append<E: EntityTrait>(column: E::Column, member: &str) -> UpdateMany<E> {
    E::update_many().col_expr(
        column,
        Expr::cust_with_values(
            format!(r#""{}" || jsonb_build_array($1::text)"#, column.as_str()),
            [member.to_string()],
        ),
    )
}
