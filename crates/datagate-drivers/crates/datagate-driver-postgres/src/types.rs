//! Conversions between Datagate values and PostgreSQL's binary wire types

use bytes::{BufMut, BytesMut};
use datagate_core::Value;
use postgres_types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use tokio_postgres::Row as PgRow;

type BoxError = Box<dyn std::error::Error + Sync + Send>;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Owned parameter value matched to the type the server inferred for its slot.
///
/// tokio-postgres writes the binary format of the Rust type it is given, so
/// an `i64` bound to an `INT4` slot has to be narrowed before sending.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PgValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Numeric(String),
    String(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    DateTimeUtc(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
}

fn is_text(ty: &Type) -> bool {
    matches!(*ty, Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME)
}

fn parse_naive_datetime(value: &str) -> Option<chrono::NaiveDateTime> {
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .or_else(|| chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

impl PgValue {
    pub(crate) fn from_value_for_type(value: &Value, target_type: &Type) -> Self {
        match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) => {
                if is_text(target_type) {
                    PgValue::String(v.to_string())
                } else {
                    PgValue::Bool(*v)
                }
            }

            Value::Int16(v) => Self::coerce_int(*v as i64, target_type),
            Value::Int32(v) => Self::coerce_int(*v as i64, target_type),
            Value::Int64(v) => Self::coerce_int(*v, target_type),

            Value::Float32(v) => Self::coerce_float(*v as f64, target_type),
            Value::Float64(v) => Self::coerce_float(*v, target_type),

            Value::Decimal(v) | Value::String(v) => Self::coerce_string(v, target_type),
            Value::Bytes(v) => PgValue::Bytes(v.clone()),
            Value::Json(v) => {
                if is_text(target_type) {
                    PgValue::String(v.to_string())
                } else {
                    PgValue::Json(v.clone())
                }
            }
            Value::DateTimeUtc(v) => match *target_type {
                Type::TIMESTAMP => PgValue::DateTime(v.naive_utc()),
                _ => PgValue::DateTimeUtc(*v),
            },
            Value::DateTime(v) => match *target_type {
                Type::TIMESTAMPTZ => PgValue::DateTimeUtc(v.and_utc()),
                _ => PgValue::DateTime(*v),
            },
            Value::Date(v) => PgValue::Date(*v),
            Value::Time(v) => PgValue::Time(*v),
        }
    }

    /// Pick the integer width of the target column so the right number of
    /// bytes goes on the wire.
    fn coerce_int(value: i64, target_type: &Type) -> Self {
        match *target_type {
            Type::INT2 => i16::try_from(value)
                .map(PgValue::Int16)
                .unwrap_or(PgValue::Int64(value)),
            Type::INT4 => i32::try_from(value)
                .map(PgValue::Int32)
                .unwrap_or(PgValue::Int64(value)),
            Type::FLOAT4 => PgValue::Float32(value as f32),
            Type::FLOAT8 => PgValue::Float64(value as f64),
            Type::NUMERIC => PgValue::Numeric(value.to_string()),
            Type::BOOL => PgValue::Bool(value != 0),
            _ if is_text(target_type) => PgValue::String(value.to_string()),
            _ => PgValue::Int64(value),
        }
    }

    fn coerce_float(value: f64, target_type: &Type) -> Self {
        match *target_type {
            Type::FLOAT4 => PgValue::Float32(value as f32),
            Type::NUMERIC => PgValue::Numeric(value.to_string()),
            _ if is_text(target_type) => PgValue::String(value.to_string()),
            _ => PgValue::Float64(value),
        }
    }

    /// Coerce string values into the strongly typed parameter the prepared
    /// statement expects, keeping the text when it does not parse.
    fn coerce_string(value: &str, target_type: &Type) -> Self {
        let fallback = || PgValue::String(value.to_string());

        match *target_type {
            Type::INT2 => value.trim().parse().map(PgValue::Int16).unwrap_or_else(|_| fallback()),
            Type::INT4 => value.trim().parse().map(PgValue::Int32).unwrap_or_else(|_| fallback()),
            Type::INT8 => value.trim().parse().map(PgValue::Int64).unwrap_or_else(|_| fallback()),
            Type::FLOAT4 => value.trim().parse().map(PgValue::Float32).unwrap_or_else(|_| fallback()),
            Type::FLOAT8 => value.trim().parse().map(PgValue::Float64).unwrap_or_else(|_| fallback()),
            Type::NUMERIC => PgValue::Numeric(value.to_string()),
            Type::BOOL => match value.trim().to_ascii_lowercase().as_str() {
                "t" | "true" | "1" | "y" | "yes" | "on" => PgValue::Bool(true),
                "f" | "false" | "0" | "n" | "no" | "off" => PgValue::Bool(false),
                _ => fallback(),
            },
            Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(value)
                .map(PgValue::Json)
                .unwrap_or_else(|_| fallback()),
            Type::DATE => chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(PgValue::Date)
                .unwrap_or_else(|_| fallback()),
            Type::TIME => chrono::NaiveTime::parse_from_str(value, "%H:%M:%S%.f")
                .map(PgValue::Time)
                .unwrap_or_else(|_| fallback()),
            Type::TIMESTAMP => parse_naive_datetime(value)
                .map(PgValue::DateTime)
                .unwrap_or_else(fallback),
            Type::TIMESTAMPTZ => chrono::DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|ts| ts.with_timezone(&chrono::Utc))
                .or_else(|| parse_naive_datetime(value).map(|ts| ts.and_utc()))
                .map(PgValue::DateTimeUtc)
                .unwrap_or_else(fallback),
            _ => fallback(),
        }
    }
}

impl ToSql for PgValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            PgValue::Null => Ok(IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::Int16(v) => v.to_sql(ty, out),
            PgValue::Int32(v) => v.to_sql(ty, out),
            PgValue::Int64(v) => v.to_sql(ty, out),
            PgValue::Float32(v) => v.to_sql(ty, out),
            PgValue::Float64(v) => v.to_sql(ty, out),
            PgValue::Numeric(v) => {
                encode_numeric(v, out)?;
                Ok(IsNull::No)
            }
            PgValue::String(v) => v.to_sql(ty, out),
            PgValue::Bytes(v) => v.to_sql(ty, out),
            PgValue::Json(v) => v.to_sql(ty, out),
            PgValue::DateTimeUtc(v) => v.to_sql(ty, out),
            PgValue::Date(v) => v.to_sql(ty, out),
            PgValue::Time(v) => v.to_sql(ty, out),
            PgValue::DateTime(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Write a decimal literal in the binary NUMERIC format: base-10000 digit
/// groups with a weight, sign and display scale header.
pub(crate) fn encode_numeric(text: &str, out: &mut BytesMut) -> Result<(), BoxError> {
    let text = text.trim();
    let special = match text.to_ascii_lowercase().as_str() {
        "nan" => Some(NUMERIC_NAN),
        "infinity" | "+infinity" | "inf" => Some(NUMERIC_PINF),
        "-infinity" | "-inf" => Some(NUMERIC_NINF),
        _ => None,
    };
    if let Some(sign) = special {
        out.put_i16(0);
        out.put_i16(0);
        out.put_u16(sign);
        out.put_i16(0);
        return Ok(());
    }

    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = int_part
        .chars()
        .chain(frac_part.chars())
        .all(|c| c.is_ascii_digit());
    if !all_digits || (int_part.is_empty() && frac_part.is_empty()) {
        return Err(format!("invalid NUMERIC literal: '{}'", text).into());
    }

    let dscale = i16::try_from(frac_part.len())?;
    let int_part = int_part.trim_start_matches('0');
    let int_pad = (4 - int_part.len() % 4) % 4;
    let frac_pad = (4 - frac_part.len() % 4) % 4;
    let padded = format!(
        "{}{}{}{}",
        "0".repeat(int_pad),
        int_part,
        frac_part,
        "0".repeat(frac_pad)
    );

    let mut groups: Vec<u16> = padded
        .as_bytes()
        .chunks(4)
        .map(|chunk| chunk.iter().fold(0u16, |acc, d| acc * 10 + (d - b'0') as u16))
        .collect();
    let mut weight = i16::try_from((int_pad + int_part.len()) / 4)? - 1;

    while groups.first() == Some(&0) {
        groups.remove(0);
        weight -= 1;
    }
    while groups.last() == Some(&0) {
        groups.pop();
    }
    if groups.is_empty() {
        weight = 0;
    }
    let sign = if negative && !groups.is_empty() {
        NUMERIC_NEG
    } else {
        NUMERIC_POS
    };

    out.put_i16(i16::try_from(groups.len())?);
    out.put_i16(weight);
    out.put_u16(sign);
    out.put_i16(dscale);
    for group in groups {
        out.put_u16(group);
    }
    Ok(())
}

/// Render a binary NUMERIC as decimal text with its display scale
pub(crate) fn decode_numeric(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() < 8 {
        return Err("invalid NUMERIC payload: too short".into());
    }

    let ndigits = i16::from_be_bytes([raw[0], raw[1]]).max(0) as usize;
    let weight = i16::from_be_bytes([raw[2], raw[3]]) as i64;
    let sign = u16::from_be_bytes([raw[4], raw[5]]);
    let dscale = i16::from_be_bytes([raw[6], raw[7]]).max(0) as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        _ => {}
    }

    if raw.len() < 8 + ndigits * 2 {
        return Err("invalid NUMERIC payload: truncated digits".into());
    }
    let mut digits = Vec::with_capacity(ndigits);
    for index in 0..ndigits {
        let offset = 8 + index * 2;
        let group = u16::from_be_bytes([raw[offset], raw[offset + 1]]);
        if group > 9999 {
            return Err("invalid NUMERIC payload: group out of range".into());
        }
        digits.push(group);
    }

    // group i carries the digits for 10000^(weight - i)
    let group_at = |exponent: i64| -> u16 {
        let index = weight - exponent;
        if index < 0 {
            0
        } else {
            digits.get(index as usize).copied().unwrap_or(0)
        }
    };

    let mut integer_text = String::new();
    if weight < 0 {
        integer_text.push('0');
    } else {
        for exponent in (0..=weight).rev() {
            if exponent == weight {
                integer_text.push_str(&group_at(exponent).to_string());
            } else {
                integer_text.push_str(&format!("{:04}", group_at(exponent)));
            }
        }
    }

    let mut fraction_text = String::new();
    for k in 1..=dscale.div_ceil(4) as i64 {
        fraction_text.push_str(&format!("{:04}", group_at(-k)));
    }
    fraction_text.truncate(dscale);

    let mut output = String::new();
    if sign == NUMERIC_NEG && digits.iter().any(|d| *d != 0) {
        output.push('-');
    }
    output.push_str(&integer_text);
    if !fraction_text.is_empty() {
        output.push('.');
        output.push_str(&fraction_text);
    }
    Ok(output)
}

#[derive(Debug)]
struct PgNumericString(String);

impl<'a> FromSql<'a> for PgNumericString {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(Self(decode_numeric(raw)?))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Raw payload for types without a dedicated mapping (enums, intervals, ...)
#[derive(Debug)]
struct PgRaw(Vec<u8>);

impl<'a> FromSql<'a> for PgRaw {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(Self(raw.to_vec()))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

pub(crate) fn format_uuid(raw: &[u8]) -> Option<String> {
    if raw.len() != 16 {
        return None;
    }
    let hex: String = raw.iter().map(|b| format!("{:02x}", b)).collect();
    Some(format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    ))
}

fn get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize) -> Option<T> {
    row.try_get::<_, Option<T>>(idx).ok().flatten()
}

/// Convert one column of a result row, keyed on the server type name
pub(crate) fn postgres_to_value(row: &PgRow, idx: usize) -> Value {
    let type_name = row.columns()[idx].type_().name();

    let value = match type_name {
        "bool" => get::<bool>(row, idx).map(Value::Bool),
        "int2" => get::<i16>(row, idx).map(Value::Int16),
        "int4" => get::<i32>(row, idx).map(Value::Int32),
        "int8" => get::<i64>(row, idx).map(Value::Int64),
        "oid" => get::<u32>(row, idx).map(|v| Value::Int64(v as i64)),
        "float4" => get::<f32>(row, idx).map(Value::Float32),
        "float8" => get::<f64>(row, idx).map(Value::Float64),
        "numeric" => get::<PgNumericString>(row, idx).map(|v| Value::Decimal(v.0)),
        "text" | "varchar" | "bpchar" | "name" => get::<String>(row, idx).map(Value::String),
        "bytea" => get::<Vec<u8>>(row, idx).map(Value::Bytes),
        "json" | "jsonb" => get::<serde_json::Value>(row, idx).map(Value::Json),
        "date" => get::<chrono::NaiveDate>(row, idx).map(Value::Date),
        "time" => get::<chrono::NaiveTime>(row, idx).map(Value::Time),
        "timestamp" => get::<chrono::NaiveDateTime>(row, idx).map(Value::DateTime),
        "timestamptz" => get::<chrono::DateTime<chrono::Utc>>(row, idx).map(Value::DateTimeUtc),
        "uuid" => get::<PgRaw>(row, idx)
            .and_then(|raw| format_uuid(&raw.0))
            .map(Value::String),
        _ => get::<PgRaw>(row, idx).map(|raw| match String::from_utf8(raw.0) {
            Ok(text) => Value::String(text),
            Err(e) => Value::Bytes(e.into_bytes()),
        }),
    };

    value.unwrap_or(Value::Null)
}
