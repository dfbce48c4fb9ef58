// crates/durable-map-postgres/src/source/tests.rs
// ============================================================================
// Module: Postgres Data Source Unit Tests
// Description: SQLSTATE classification and bind parameter encoding.
// Purpose: Validate driver adaptation without a live database.
// ============================================================================

#![allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]

use bytes::BytesMut;
use durable_map_core::MapError;
use durable_map_core::SqlValue;
use postgres_types::IsNull;
use postgres_types::ToSql;
use postgres_types::Type;

use super::PgParam;
use super::classify_sqlstate;

fn encode(value: &SqlValue, ty: &Type) -> Result<(IsNull, Vec<u8>), String> {
    let mut out = BytesMut::new();
    let is_null = PgParam(value).to_sql_checked(ty, &mut out).map_err(|err| err.to_string())?;
    Ok((is_null, out.to_vec()))
}

#[test]
fn sqlstate_classes_map_to_error_kinds() {
    let kind = |code: &str| classify_sqlstate(code, format!("state {code}"));
    assert!(matches!(kind("23505"), MapError::Constraint(_)));
    assert!(matches!(kind("23503"), MapError::Constraint(_)));
    assert!(kind("40001").is_transient());
    assert!(kind("40P01").is_transient());
    assert!(kind("55P03").is_transient());
    assert!(kind("57014").is_transient());
    assert!(kind("08006").is_transient());
    assert!(matches!(kind("42P01"), MapError::Programming(_)));
    assert!(matches!(kind("22003"), MapError::Database(_)));
}

#[test]
fn integers_narrow_to_column_width() {
    let (_, int4) = encode(&SqlValue::Integer(7), &Type::INT4).expect("int4");
    assert_eq!(int4, 7_i32.to_be_bytes().to_vec());
    let (_, int2) = encode(&SqlValue::Integer(-2), &Type::INT2).expect("int2");
    assert_eq!(int2, (-2_i16).to_be_bytes().to_vec());
    let (_, int8) = encode(&SqlValue::Integer(1 << 40), &Type::INT8).expect("int8");
    assert_eq!(int8, (1_i64 << 40).to_be_bytes().to_vec());
}

#[test]
fn integer_overflow_is_rejected() {
    assert!(encode(&SqlValue::Integer(1 << 40), &Type::INT4).is_err());
    assert!(encode(&SqlValue::Integer(70_000), &Type::INT2).is_err());
}

#[test]
fn null_encodes_for_any_type() {
    let (is_null, bytes) = encode(&SqlValue::Null, &Type::TEXT).expect("null");
    assert!(matches!(is_null, IsNull::Yes));
    assert!(bytes.is_empty());
}

#[test]
fn mismatched_types_are_rejected() {
    assert!(encode(&SqlValue::Text("x".to_string()), &Type::INT8).is_err());
    assert!(encode(&SqlValue::Bool(true), &Type::INT4).is_err());
    assert!(encode(&SqlValue::Blob(vec![1]), &Type::TEXT).is_err());
}

#[test]
fn text_blob_and_reals_encode() {
    let (_, text) = encode(&SqlValue::Text("hi".to_string()), &Type::VARCHAR).expect("text");
    assert_eq!(text, b"hi".to_vec());
    let (_, blob) = encode(&SqlValue::Blob(vec![1, 2, 3]), &Type::BYTEA).expect("blob");
    assert_eq!(blob, vec![1, 2, 3]);
    let (_, real) = encode(&SqlValue::Real(1.5), &Type::FLOAT4).expect("float4");
    assert_eq!(real, 1.5_f32.to_be_bytes().to_vec());
    let (_, double) = encode(&SqlValue::Real(1.5), &Type::FLOAT8).expect("float8");
    assert_eq!(double, 1.5_f64.to_be_bytes().to_vec());
}
