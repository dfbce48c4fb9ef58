// crates/durable-map-core/tests/proptest_statement.rs
// ============================================================================
// Module: Statement Composition Property-Based Tests
// Description: Randomized column sets checked for placeholder/bind agreement.
// Purpose: Ensure every composed statement binds exactly what it references.
// ============================================================================

//! ## Overview
//! Generates disjoint key and value column sets and checks, for each dialect,
//! that placeholders and bound parameters agree in count and order.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use durable_map_core::BoundStatement;
use durable_map_core::ColumnMap;
use durable_map_core::SqlDialect;
use durable_map_core::statement;
use proptest::prelude::*;

const DIALECTS: [SqlDialect; 3] = [SqlDialect::MySql, SqlDialect::Postgres, SqlDialect::Sqlite];

fn columns(prefix: &'static str) -> impl Strategy<Value = ColumnMap> {
    prop::collection::vec(any::<i64>(), 1 .. 6).prop_map(move |values| {
        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| (format!("{prefix}{index}"), value))
            .collect()
    })
}

/// Returns the 1-based positions referenced by the statement's placeholders.
fn placeholder_positions(dialect: SqlDialect, sql: &str) -> Vec<usize> {
    let marker = match dialect {
        SqlDialect::MySql | SqlDialect::Sqlite => '?',
        SqlDialect::Postgres => '$',
    };
    let mut positions = Vec::new();
    let mut chars = sql.chars().peekable();
    let mut implicit = 0;
    while let Some(ch) = chars.next() {
        if ch != marker {
            continue;
        }
        let mut digits = String::new();
        while let Some(next) = chars.peek().filter(|next| next.is_ascii_digit()) {
            digits.push(*next);
            chars.next();
        }
        implicit += 1;
        positions.push(if digits.is_empty() { implicit } else { digits.parse().unwrap() });
    }
    positions
}

fn assert_binds_agree(dialect: SqlDialect, statement: &BoundStatement) -> Result<(), TestCaseError> {
    let positions = placeholder_positions(dialect, &statement.sql);
    let expected: Vec<usize> = (1 ..= statement.params.len()).collect();
    prop_assert_eq!(positions, expected, "{}", statement.sql);
    Ok(())
}

proptest! {
    #[test]
    fn placeholders_match_params(keys in columns("k"), values in columns("v")) {
        for dialect in DIALECTS {
            assert_binds_agree(dialect, &statement::select_by_key(dialect, "t", &keys, true))?;
            assert_binds_agree(dialect, &statement::exists_matching(dialect, "t", &values))?;
            assert_binds_agree(dialect, &statement::delete_by_key(dialect, "t", &keys))?;
            assert_binds_agree(dialect, &statement::update_by_key(dialect, "t", &keys, &values))?;
            assert_binds_agree(dialect, &statement::insert(dialect, "t", &keys, &values))?;
            assert_binds_agree(dialect, &statement::upsert(dialect, "t", &keys, &values))?;
        }
    }

    #[test]
    fn upsert_binds_every_column_twice(keys in columns("k"), values in columns("v")) {
        let width = keys.len() + values.len();
        for dialect in DIALECTS {
            let upsert = statement::upsert(dialect, "t", &keys, &values);
            prop_assert_eq!(upsert.params.len(), width * 2);
            prop_assert_eq!(&upsert.params[.. width], &upsert.params[width ..]);
            let update = statement::update_by_key(dialect, "t", &keys, &values);
            let mut expected: Vec<_> = values.values().cloned().collect();
            expected.extend(keys.values().cloned());
            prop_assert_eq!(update.params, expected);
        }
    }
}
