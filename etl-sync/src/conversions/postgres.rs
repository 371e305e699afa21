use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgRow, PgTypeInfo};
use sqlx::{Column, Encode, Postgres, Row, Type, TypeInfo, ValueRef};
use uuid::Uuid;

use crate::bail;
use crate::dialect::FINGERPRINT_COLUMN;
use crate::error::{ErrorKind, EtlResult};
use crate::types::{Cell, Fingerprint, Record};

/// Type sent for parameters whose type the server should infer from context.
fn unknown_type_info() -> PgTypeInfo {
    PgTypeInfo::with_oid(Oid(0))
}

impl Type<Postgres> for Cell {
    fn type_info() -> PgTypeInfo {
        unknown_type_info()
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

/// Cells are sent with their own type, with NULLs and text left for the server to infer.
///
/// Statements whose parameter types are known bind [`TypedCell`]s instead.
impl<'q> Encode<'q, Postgres> for Cell {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        match self {
            Cell::Null => Ok(IsNull::Yes),
            Cell::Bool(value) => <bool as Encode<Postgres>>::encode_by_ref(value, buf),
            Cell::I16(value) => <i16 as Encode<Postgres>>::encode_by_ref(value, buf),
            Cell::I32(value) => <i32 as Encode<Postgres>>::encode_by_ref(value, buf),
            Cell::I64(value) => <i64 as Encode<Postgres>>::encode_by_ref(value, buf),
            Cell::F32(value) => <f32 as Encode<Postgres>>::encode_by_ref(value, buf),
            Cell::F64(value) => <f64 as Encode<Postgres>>::encode_by_ref(value, buf),
            Cell::Numeric(value) => <BigDecimal as Encode<Postgres>>::encode_by_ref(value, buf),
            Cell::String(value) => <String as Encode<Postgres>>::encode_by_ref(value, buf),
            Cell::Bytes(value) => <Vec<u8> as Encode<Postgres>>::encode_by_ref(value, buf),
            Cell::Date(value) => <NaiveDate as Encode<Postgres>>::encode_by_ref(value, buf),
            Cell::Time(value) => <NaiveTime as Encode<Postgres>>::encode_by_ref(value, buf),
            Cell::Timestamp(value) => {
                <NaiveDateTime as Encode<Postgres>>::encode_by_ref(value, buf)
            }
            Cell::TimestampTz(value) => {
                <DateTime<Utc> as Encode<Postgres>>::encode_by_ref(value, buf)
            }
            Cell::Uuid(value) => <Uuid as Encode<Postgres>>::encode_by_ref(value, buf),
            Cell::Json(value) => {
                <serde_json::Value as Encode<Postgres>>::encode_by_ref(value, buf)
            }
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        let type_info = match self {
            Cell::Null | Cell::String(_) => unknown_type_info(),
            Cell::Bool(_) => <bool as Type<Postgres>>::type_info(),
            Cell::I16(_) => <i16 as Type<Postgres>>::type_info(),
            Cell::I32(_) => <i32 as Type<Postgres>>::type_info(),
            Cell::I64(_) => <i64 as Type<Postgres>>::type_info(),
            Cell::F32(_) => <f32 as Type<Postgres>>::type_info(),
            Cell::F64(_) => <f64 as Type<Postgres>>::type_info(),
            Cell::Numeric(_) => <BigDecimal as Type<Postgres>>::type_info(),
            Cell::Bytes(_) => <Vec<u8> as Type<Postgres>>::type_info(),
            Cell::Date(_) => <NaiveDate as Type<Postgres>>::type_info(),
            Cell::Time(_) => <NaiveTime as Type<Postgres>>::type_info(),
            Cell::Timestamp(_) => <NaiveDateTime as Type<Postgres>>::type_info(),
            Cell::TimestampTz(_) => <DateTime<Utc> as Type<Postgres>>::type_info(),
            Cell::Uuid(_) => <Uuid as Type<Postgres>>::type_info(),
            Cell::Json(_) => <serde_json::Value as Type<Postgres>>::type_info(),
        };

        Some(type_info)
    }
}

/// A [`Cell`] bound as the type Postgres resolved for its statement parameter.
///
/// NULLs carry the parameter type and values are converted to it, so every execution of a
/// prepared statement sends the same types whatever order values and NULLs arrive in.
#[derive(Debug, Clone)]
pub struct TypedCell {
    cell: Cell,
    type_info: Option<PgTypeInfo>,
}

enum Conversion {
    Converted(Cell),
    /// The parameter type has no matching [`Cell`] variant.
    Unsupported,
    Failed,
}

impl TypedCell {
    /// Converts `cell` to the parameter type `target`.
    ///
    /// Parameters of a type without a matching variant keep the cell's own type. Values that
    /// can't be represented in `target` fail with [`ErrorKind::ConversionError`].
    pub fn coerce(cell: Cell, target: &PgTypeInfo) -> EtlResult<Self> {
        if cell.is_null() {
            return Ok(Self {
                cell,
                type_info: Some(target.clone()),
            });
        }

        let name = target.name().to_ascii_uppercase();
        match convert(&cell, &name) {
            Conversion::Converted(converted) => Ok(Self {
                cell: converted,
                type_info: Some(target.clone()),
            }),
            Conversion::Unsupported => Ok(Self::untyped(cell)),
            Conversion::Failed => bail!(
                ErrorKind::ConversionError,
                "Value does not fit the statement parameter type",
                format!("{cell:?} can't be bound as {name}")
            ),
        }
    }

    /// Binds `cell` with its own type.
    pub fn untyped(cell: Cell) -> Self {
        Self {
            cell,
            type_info: None,
        }
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    pub fn type_info(&self) -> Option<&PgTypeInfo> {
        self.type_info.as_ref()
    }
}

impl Type<Postgres> for TypedCell {
    fn type_info() -> PgTypeInfo {
        unknown_type_info()
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

impl<'q> Encode<'q, Postgres> for TypedCell {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <Cell as Encode<Postgres>>::encode_by_ref(&self.cell, buf)
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        match &self.type_info {
            Some(type_info) => Some(type_info.clone()),
            None => <Cell as Encode<Postgres>>::produces(&self.cell),
        }
    }
}

fn convert(cell: &Cell, target: &str) -> Conversion {
    let converted = match target {
        "BOOL" => match cell {
            Cell::Bool(value) => Some(Cell::Bool(*value)),
            Cell::String(value) => parse_bool(value).map(Cell::Bool),
            _ => None,
        },
        "INT2" => integer(cell)
            .and_then(|value| i16::try_from(value).ok())
            .map(Cell::I16),
        "INT4" => integer(cell)
            .and_then(|value| i32::try_from(value).ok())
            .map(Cell::I32),
        "INT8" => integer(cell).map(Cell::I64),
        "FLOAT4" => float(cell).map(|value| Cell::F32(value as f32)),
        "FLOAT8" => float(cell).map(Cell::F64),
        "NUMERIC" => numeric(cell).map(Cell::Numeric),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => cell.to_text().map(Cell::String),
        "BYTEA" => match cell {
            Cell::Bytes(value) => Some(Cell::Bytes(value.clone())),
            Cell::String(value) => Some(Cell::Bytes(value.clone().into_bytes())),
            _ => None,
        },
        "DATE" => match cell {
            Cell::Date(value) => Some(Cell::Date(*value)),
            Cell::Timestamp(value) => Some(Cell::Date(value.date())),
            Cell::TimestampTz(value) => Some(Cell::Date(value.date_naive())),
            Cell::String(value) => value.trim().parse().ok().map(Cell::Date),
            _ => None,
        },
        "TIME" => match cell {
            Cell::Time(value) => Some(Cell::Time(*value)),
            Cell::Timestamp(value) => Some(Cell::Time(value.time())),
            Cell::String(value) => value.trim().parse().ok().map(Cell::Time),
            _ => None,
        },
        "TIMESTAMP" => timestamp(cell).map(Cell::Timestamp),
        "TIMESTAMPTZ" => match cell {
            Cell::TimestampTz(value) => Some(Cell::TimestampTz(*value)),
            Cell::String(value) => parse_timestamptz(value).map(Cell::TimestampTz),
            other => timestamp(other).map(|value| Cell::TimestampTz(value.and_utc())),
        },
        "UUID" => match cell {
            Cell::Uuid(value) => Some(Cell::Uuid(*value)),
            Cell::String(value) => Uuid::parse_str(value.trim()).ok().map(Cell::Uuid),
            _ => None,
        },
        "JSON" | "JSONB" => match cell {
            Cell::Json(value) => Some(Cell::Json(value.clone())),
            Cell::String(value) => serde_json::from_str(value).ok().map(Cell::Json),
            _ => None,
        },
        _ => return Conversion::Unsupported,
    };

    match converted {
        Some(converted) => Conversion::Converted(converted),
        None => Conversion::Failed,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Some(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn integer(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::I16(value) => Some(i64::from(*value)),
        Cell::I32(value) => Some(i64::from(*value)),
        Cell::I64(value) => Some(*value),
        Cell::F32(value) => float_to_integer(f64::from(*value)),
        Cell::F64(value) => float_to_integer(*value),
        Cell::Numeric(value) => value.to_string().parse().ok(),
        Cell::String(value) => value.trim().parse().ok(),
        _ => None,
    }
}

fn float_to_integer(value: f64) -> Option<i64> {
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (value.fract() == 0.0 && in_range).then_some(value as i64)
}

fn float(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::I16(value) => Some(f64::from(*value)),
        Cell::I32(value) => Some(f64::from(*value)),
        Cell::I64(value) => Some(*value as f64),
        Cell::F32(value) => Some(f64::from(*value)),
        Cell::F64(value) => Some(*value),
        Cell::Numeric(value) => value.to_string().parse().ok(),
        Cell::String(value) => value.trim().parse().ok(),
        _ => None,
    }
}

fn numeric(cell: &Cell) -> Option<BigDecimal> {
    match cell {
        Cell::I16(value) => Some(BigDecimal::from(*value)),
        Cell::I32(value) => Some(BigDecimal::from(*value)),
        Cell::I64(value) => Some(BigDecimal::from(*value)),
        Cell::F32(value) if value.is_finite() => value.to_string().parse().ok(),
        Cell::F64(value) if value.is_finite() => value.to_string().parse().ok(),
        Cell::Numeric(value) => Some(value.clone()),
        Cell::String(value) => value.trim().parse().ok(),
        _ => None,
    }
}

fn timestamp(cell: &Cell) -> Option<NaiveDateTime> {
    match cell {
        Cell::Timestamp(value) => Some(*value),
        Cell::TimestampTz(value) => Some(value.naive_utc()),
        Cell::Date(value) => Some(value.and_time(NaiveTime::MIN)),
        Cell::String(value) => {
            let value = value.trim();
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| value.parse())
                .ok()
        }
        _ => None,
    }
}

fn parse_timestamptz(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .ok()
        .map(|value| value.with_timezone(&Utc))
}

/// Decodes column `index` of `row` into a [`Cell`] based on its Postgres type name.
///
/// Types without a dedicated variant are read as text.
pub fn decode_cell(row: &PgRow, index: usize) -> EtlResult<Cell> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Cell::Null);
    }

    let column = &row.columns()[index];
    let cell = match column.type_info().name() {
        "BOOL" => Cell::Bool(row.try_get(index)?),
        "INT2" => Cell::I16(row.try_get(index)?),
        "INT4" => Cell::I32(row.try_get(index)?),
        "INT8" => Cell::I64(row.try_get(index)?),
        "FLOAT4" => Cell::F32(row.try_get(index)?),
        "FLOAT8" => Cell::F64(row.try_get(index)?),
        "NUMERIC" => Cell::Numeric(row.try_get(index)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => Cell::String(row.try_get(index)?),
        "BYTEA" => Cell::Bytes(row.try_get(index)?),
        "DATE" => Cell::Date(row.try_get(index)?),
        "TIME" => Cell::Time(row.try_get(index)?),
        "TIMESTAMP" => Cell::Timestamp(row.try_get(index)?),
        "TIMESTAMPTZ" => Cell::TimestampTz(row.try_get(index)?),
        "UUID" => Cell::Uuid(row.try_get(index)?),
        "JSON" | "JSONB" => Cell::Json(row.try_get(index)?),
        other => match row.try_get_unchecked::<String, _>(index) {
            Ok(value) => Cell::String(value),
            Err(err) => bail!(
                ErrorKind::ConversionError,
                "Unsupported Postgres column type",
                format!("column `{}` has type {other}: {err}", column.name())
            ),
        },
    };

    Ok(cell)
}

/// Converts a row into a [`Record`].
///
/// A text column named `_fingerprint` is removed from the values and attached as the record
/// fingerprint.
pub fn decode_record(row: &PgRow) -> EtlResult<Record> {
    let mut record = Record::new();

    for (index, column) in row.columns().iter().enumerate() {
        let cell = decode_cell(row, index)?;

        if column.name() == FINGERPRINT_COLUMN {
            match cell {
                Cell::String(digest) => record.set_fingerprint(Some(Fingerprint::new(digest))),
                Cell::Null => {}
                other => bail!(
                    ErrorKind::InvalidData,
                    "Fingerprint column is not text",
                    format!("{other:?}")
                ),
            }

            continue;
        }

        record.set(column.name(), cell);
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int8() -> PgTypeInfo {
        <i64 as Type<Postgres>>::type_info()
    }

    #[test]
    fn nulls_carry_the_parameter_type() {
        let typed = TypedCell::coerce(Cell::Null, &int8()).unwrap();

        assert_eq!(typed.cell(), &Cell::Null);
        assert_eq!(typed.type_info().map(|t| t.name()), Some("INT8"));
        assert_eq!(
            <TypedCell as Encode<Postgres>>::produces(&typed).map(|t| t.name().to_string()),
            Some("INT8".to_string())
        );
    }

    #[test]
    fn integers_are_widened_to_the_parameter_type() {
        let typed = TypedCell::coerce(Cell::I32(42), &int8()).unwrap();
        assert_eq!(typed.cell(), &Cell::I64(42));

        let numeric = <BigDecimal as Type<Postgres>>::type_info();
        let typed = TypedCell::coerce(Cell::I32(30), &numeric).unwrap();
        assert_eq!(typed.cell(), &Cell::Numeric(BigDecimal::from(30)));
    }

    #[test]
    fn text_is_parsed_into_typed_parameters() {
        let int4 = <i32 as Type<Postgres>>::type_info();
        let typed = TypedCell::coerce(Cell::String(" 7 ".to_string()), &int4).unwrap();
        assert_eq!(typed.cell(), &Cell::I32(7));

        let timestamptz = <DateTime<Utc> as Type<Postgres>>::type_info();
        let typed =
            TypedCell::coerce(Cell::String("2024-03-01 10:00:00+00".to_string()), &timestamptz)
                .unwrap();
        assert_eq!(
            typed.cell().to_text().as_deref(),
            Some("2024-03-01 10:00:00+00")
        );
    }

    #[test]
    fn values_are_rendered_for_text_parameters() {
        let text = <String as Type<Postgres>>::type_info();
        let typed = TypedCell::coerce(Cell::I64(5), &text).unwrap();

        assert_eq!(typed.cell(), &Cell::String("5".to_string()));
    }

    #[test]
    fn values_out_of_range_are_conversion_errors() {
        let int2 = <i16 as Type<Postgres>>::type_info();

        let err = TypedCell::coerce(Cell::I64(100_000), &int2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);

        let err = TypedCell::coerce(Cell::String("abc".to_string()), &int8()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
    }

    #[test]
    fn unsupported_parameter_types_keep_the_cell_type() {
        let typed = TypedCell::coerce(
            Cell::String("blue".to_string()),
            &PgTypeInfo::with_name("color"),
        )
        .unwrap();

        assert!(typed.type_info().is_none());
        assert_eq!(typed.cell(), &Cell::String("blue".to_string()));
    }
}
