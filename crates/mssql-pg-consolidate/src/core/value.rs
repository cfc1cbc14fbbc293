//! Cell value type and target-safe coercion.
//!
//! The source driver yields cells as a closed set of runtime shapes; this
//! module models them as a tagged variant and applies the coercion rules
//! that make every value safe for the target engine. The one hazard worth
//! calling out: PostgreSQL rejects 0x00 inside its text type while SQL
//! Server routinely stores it as padding, so every text-bound value is
//! stripped of NUL bytes before insertion.

use bytes::BytesMut;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use uuid::Uuid;

/// A single cell scanned from the source, or produced by [`coerce`].
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// SQL NULL.
    Null,

    /// Boolean value (source BIT).
    Bool(bool),

    /// 16-bit signed integer (smallint, widened tinyint).
    I16(i16),

    /// 32-bit signed integer (int).
    I32(i32),

    /// 64-bit signed integer (bigint).
    I64(i64),

    /// 32-bit floating point (real).
    F32(f32),

    /// 64-bit floating point (float).
    F64(f64),

    /// Text data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// UUID/GUID value.
    Uuid(Uuid),

    /// Decimal value (decimal, numeric, money).
    Decimal(Decimal),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),
}

impl CellValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

/// Remove every NUL byte from a string.
fn strip_nul(s: &str) -> String {
    s.chars().filter(|&c| c != '\0').collect()
}

/// Coerce a scanned cell into a target-safe value.
///
/// Dispatches on both the runtime shape and the column's source type name:
///
/// - NULL passes through.
/// - Raw bytes under a BIT/BOOLEAN column become a boolean from the first
///   byte (`0x01` is true, anything else false).
/// - Raw bytes under a UNIQUEIDENTIFIER column become a UUID when exactly
///   16 bytes long; any other length is malformed and becomes NULL.
/// - Raw bytes under BINARY/IMAGE-family columns pass through as binary.
/// - Any other raw bytes decode as text with NUL bytes stripped.
/// - Text values have NUL bytes stripped.
/// - Booleans, numbers, and temporal values pass through unchanged.
pub fn coerce(value: CellValue, source_type: &str) -> CellValue {
    let type_name = source_type.to_uppercase();

    match value {
        CellValue::Null => CellValue::Null,
        CellValue::Bytes(bytes) => match type_name.as_str() {
            "BIT" | "BOOLEAN" => {
                CellValue::Bool(bytes.first().is_some_and(|&b| b == 0x01))
            }
            "UNIQUEIDENTIFIER" => match Uuid::from_slice(&bytes) {
                Ok(uuid) => CellValue::Uuid(uuid),
                Err(_) => CellValue::Null,
            },
            // "timestamp"/"rowversion" is the catalog's name for the row
            // version type: eight opaque bytes, not a point in time.
            _ if type_name.contains("BINARY")
                || type_name.contains("IMAGE")
                || type_name == "TIMESTAMP"
                || type_name == "ROWVERSION" =>
            {
                CellValue::Bytes(bytes)
            }
            _ => CellValue::Text(strip_nul(&String::from_utf8_lossy(&bytes))),
        },
        CellValue::Text(s) => {
            if s.contains('\0') {
                CellValue::Text(strip_nul(&s))
            } else {
                CellValue::Text(s)
            }
        }
        other => other,
    }
}

impl ToSql for CellValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            CellValue::Null => Ok(IsNull::Yes),
            CellValue::Bool(v) => v.to_sql(ty, out),
            CellValue::I16(v) => v.to_sql(ty, out),
            CellValue::I32(v) => v.to_sql(ty, out),
            CellValue::I64(v) => v.to_sql(ty, out),
            CellValue::F32(v) => v.to_sql(ty, out),
            CellValue::F64(v) => v.to_sql(ty, out),
            CellValue::Text(v) => v.to_sql(ty, out),
            CellValue::Bytes(v) => v.to_sql(ty, out),
            CellValue::Uuid(v) => v.to_sql(ty, out),
            CellValue::Decimal(v) => v.to_sql(ty, out),
            CellValue::DateTime(v) => v.to_sql(ty, out),
            CellValue::Date(v) => v.to_sql(ty, out),
            CellValue::Time(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Values are shaped by the same type mapping that produced the
        // target columns; a residual mismatch surfaces as a per-row insert
        // error, which the copier tolerates.
        true
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_passthrough() {
        assert_eq!(coerce(CellValue::Null, "NVARCHAR"), CellValue::Null);
        assert_eq!(coerce(CellValue::Null, "BIT"), CellValue::Null);
    }

    #[test]
    fn test_bit_bytes_to_bool() {
        assert_eq!(
            coerce(CellValue::Bytes(vec![0x01]), "bit"),
            CellValue::Bool(true)
        );
        assert_eq!(
            coerce(CellValue::Bytes(vec![0x00]), "bit"),
            CellValue::Bool(false)
        );
        // Anything that is not exactly 0x01 reads as false
        assert_eq!(
            coerce(CellValue::Bytes(vec![0x02]), "BIT"),
            CellValue::Bool(false)
        );
        assert_eq!(
            coerce(CellValue::Bytes(vec![]), "BIT"),
            CellValue::Bool(false)
        );
    }

    #[test]
    fn test_uuid_bytes_canonical() {
        let bytes = vec![
            0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC,
            0xDD, 0xEE, 0xFF, 0x00,
        ];
        let coerced = coerce(CellValue::Bytes(bytes), "uniqueidentifier");
        match coerced {
            CellValue::Uuid(uuid) => {
                assert_eq!(uuid.to_string(), "11223344-5566-7788-99aa-bbccddeeff00");
            }
            other => panic!("expected uuid, got {:?}", other),
        }
    }

    #[test]
    fn test_uuid_wrong_length_is_null() {
        assert_eq!(
            coerce(CellValue::Bytes(vec![0x11; 15]), "UNIQUEIDENTIFIER"),
            CellValue::Null
        );
        assert_eq!(
            coerce(CellValue::Bytes(vec![0x11; 17]), "UNIQUEIDENTIFIER"),
            CellValue::Null
        );
    }

    #[test]
    fn test_binary_passthrough() {
        let payload = vec![0x00, 0xFF, 0x00, 0x10];
        for ty in ["binary", "varbinary", "image", "timestamp", "rowversion"] {
            let coerced = coerce(CellValue::Bytes(payload.clone()), ty);
            assert_eq!(coerced, CellValue::Bytes(payload.clone()), "type {}", ty);
        }
    }

    #[test]
    fn test_stray_bytes_decode_as_text_without_nul() {
        let coerced = coerce(CellValue::Bytes(b"hola\x00mundo".to_vec()), "nvarchar");
        assert_eq!(coerced, CellValue::Text("holamundo".to_string()));
    }

    #[test]
    fn test_text_nul_stripped() {
        let coerced = coerce(CellValue::Text("hola\0mundo".to_string()), "NVARCHAR");
        assert_eq!(coerced, CellValue::Text("holamundo".to_string()));

        let coerced = coerce(CellValue::Text("limpio".to_string()), "VARCHAR");
        assert_eq!(coerced, CellValue::Text("limpio".to_string()));
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(coerce(CellValue::I32(42), "INT"), CellValue::I32(42));
        assert_eq!(coerce(CellValue::Bool(true), "BIT"), CellValue::Bool(true));
        let d = Decimal::new(12345600, 4);
        assert_eq!(
            coerce(CellValue::Decimal(d), "NUMERIC"),
            CellValue::Decimal(d)
        );
    }

    #[test]
    fn test_multibyte_text_survives_stripping() {
        let coerced = coerce(CellValue::Text("año\0fiscal".to_string()), "NVARCHAR");
        assert_eq!(coerced, CellValue::Text("añofiscal".to_string()));
    }
}
