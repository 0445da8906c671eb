// src/input.rs - JSON Lines input converted to typed records

use crate::field::{FieldDescriptor, FieldType, RawValue, Record};
use serde_json::Value;
use std::net::{Ipv4Addr, Ipv6Addr};

pub trait RecordParser {
    fn parse_line(&self, line: &str) -> Result<Record, String>;
}

/// Parses one JSON object per line into a record of the given layout.
///
/// Keys that are missing or `null` leave their slot invalid. Keys outside the
/// layout are ignored.
#[derive(Debug, Clone)]
pub struct JsonlRecordParser {
    layout: Vec<FieldDescriptor>,
}

impl JsonlRecordParser {
    pub fn new(layout: Vec<FieldDescriptor>) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &[FieldDescriptor] {
        &self.layout
    }
}

impl RecordParser for JsonlRecordParser {
    fn parse_line(&self, line: &str) -> Result<Record, String> {
        let value: Value = serde_json::from_str(line.trim())
            .map_err(|e| format!("Failed to parse JSONL: {}", e))?;
        let object = value
            .as_object()
            .ok_or_else(|| "expected a JSON object".to_string())?;

        let mut record = Record::for_layout(&self.layout);
        for descriptor in &self.layout {
            match object.get(&descriptor.name) {
                None | Some(Value::Null) => {}
                Some(json) => {
                    let raw = to_raw(descriptor.field_type, json)
                        .map_err(|e| format!("field {:?}: {}", descriptor.name, e))?;
                    record.set(&descriptor.name, raw);
                }
            }
        }
        Ok(record)
    }
}

macro_rules! int_value {
    ($json:expr, $get:ident, $ty:ty, $variant:ident) => {{
        let n = $json
            .$get()
            .ok_or_else(|| format!("expected an integer, got {}", $json))?;
        let v = <$ty>::try_from(n).map_err(|_| format!("{} out of range for {}", n, stringify!($ty)))?;
        RawValue::$variant(v)
    }};
}

fn to_raw(field_type: FieldType, json: &Value) -> Result<RawValue, String> {
    let raw = match field_type {
        FieldType::Void => RawValue::Bytes(Vec::new()),
        FieldType::Int8 => int_value!(json, as_i64, i8, I8),
        FieldType::Int16 => int_value!(json, as_i64, i16, I16),
        FieldType::Int32 => int_value!(json, as_i64, i32, I32),
        FieldType::Int64 => int_value!(json, as_i64, i64, I64),
        FieldType::Uint8 => int_value!(json, as_u64, u8, U8),
        FieldType::Uint16 => int_value!(json, as_u64, u16, U16),
        FieldType::Uint32 => int_value!(json, as_u64, u32, U32),
        FieldType::Uint64 => int_value!(json, as_u64, u64, U64),
        FieldType::Bool => match json {
            Value::Bool(b) => RawValue::U8(u8::from(*b)),
            _ => int_value!(json, as_u64, u8, U8),
        },
        FieldType::Ipv4 => {
            let addr: Ipv4Addr = expect_str(json)?
                .parse()
                .map_err(|e| format!("invalid IPv4 address: {}", e))?;
            RawValue::Ipv4(u32::from(addr))
        }
        FieldType::Ipv6 => {
            let addr: Ipv6Addr = expect_str(json)?
                .parse()
                .map_err(|e| format!("invalid IPv6 address: {}", e))?;
            RawValue::Ipv6(addr.octets())
        }
        FieldType::String => match json {
            Value::String(s) => RawValue::string(s),
            other => RawValue::string(&other.to_string()),
        },
        FieldType::Raw | FieldType::RawString => match json {
            Value::String(s) => RawValue::Bytes(s.as_bytes().to_vec()),
            other => RawValue::Bytes(other.to_string().into_bytes()),
        },
    };
    Ok(raw)
}

fn expect_str(json: &Value) -> Result<&str, String> {
    json.as_str()
        .ok_or_else(|| format!("expected an address string, got {}", json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{decode_record, DEST_INSTANCE, SOURCE_INSTANCE};

    fn parser() -> JsonlRecordParser {
        JsonlRecordParser::new(vec![
            FieldDescriptor::new(SOURCE_INSTANCE, FieldType::String),
            FieldDescriptor::new(DEST_INSTANCE, FieldType::String),
            FieldDescriptor::new("ip.saddr", FieldType::Ipv4),
            FieldDescriptor::new("ip6.daddr", FieldType::Ipv6),
            FieldDescriptor::new("tcp.dport", FieldType::Uint16),
            FieldDescriptor::new("delta", FieldType::Int8),
            FieldDescriptor::new("accepted", FieldType::Bool),
        ])
    }

    #[test]
    fn test_typed_conversion() {
        let record = parser()
            .parse_line(
                r#"{"cf.sinstance":"G/1","ip.saddr":"192.168.1.7","ip6.daddr":"::1","tcp.dport":443,"delta":-3,"accepted":true,"extra":"ignored"}"#,
            )
            .unwrap();
        let fields = decode_record(&record).unwrap();
        assert_eq!(fields["cf.sinstance"], "G/1");
        assert_eq!(fields["ip.saddr"], "192.168.1.7");
        assert_eq!(fields["ip6.daddr"], "::1");
        assert_eq!(fields["tcp.dport"], "443");
        assert_eq!(fields["delta"], "-3");
        assert_eq!(fields["accepted"], "true");
        assert!(!fields.contains_key("extra"));
    }

    #[test]
    fn test_missing_and_null_are_invalid() {
        let record = parser()
            .parse_line(r#"{"cf.sinstance":null,"cf.dinstance":"G/2"}"#)
            .unwrap();
        assert!(!record.is_valid(0));
        assert!(record.is_valid(1));
        assert!(!record.is_valid(4));
    }

    #[test]
    fn test_range_and_shape_errors() {
        let p = parser();
        let err = p.parse_line(r#"{"tcp.dport":70000}"#).unwrap_err();
        assert!(err.contains("tcp.dport"));
        assert!(err.contains("out of range"));

        assert!(p.parse_line(r#"{"delta":"three"}"#).is_err());
        assert!(p.parse_line(r#"{"ip.saddr":"300.1.1.1"}"#).is_err());
        assert!(p.parse_line(r#"{"accepted":2}"#).is_ok());
        assert!(p.parse_line("[1,2]").is_err());
        assert!(p.parse_line("not json").is_err());
    }
}
