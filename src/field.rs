// src/field.rs - typed field slots and their canonical text
use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Name of the field carrying the source application identity.
pub const SOURCE_INSTANCE: &str = "cf.sinstance";
/// Name of the field carrying the destination application identity.
pub const DEST_INSTANCE: &str = "cf.dinstance";

/// Type tag of a field slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Void,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Bool,
    Ipv4,
    Ipv6,
    String,
    Raw,
    RawString,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Void => "void",
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::Uint8 => "uint8",
            FieldType::Uint16 => "uint16",
            FieldType::Uint32 => "uint32",
            FieldType::Uint64 => "uint64",
            FieldType::Bool => "bool",
            FieldType::Ipv4 => "ipv4",
            FieldType::Ipv6 => "ipv6",
            FieldType::String => "string",
            FieldType::Raw => "raw",
            FieldType::RawString => "rawstring",
        };
        f.write_str(name)
    }
}

/// A named, typed slot an upstream record may provide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldDescriptor {
            name: name.into(),
            field_type,
        }
    }
}

/// Storage of one slot as handed over by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    /// Host-order address value, as taken by `Ipv4Addr::from(u32)`.
    Ipv4(u32),
    Ipv6([u8; 16]),
    /// Byte storage: null-terminated strings, raw payloads, or addresses in network order.
    Bytes(Vec<u8>),
}

impl RawValue {
    pub fn string(text: &str) -> Self {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        RawValue::Bytes(bytes)
    }

    fn kind(&self) -> &'static str {
        match self {
            RawValue::I8(_) => "i8",
            RawValue::I16(_) => "i16",
            RawValue::I32(_) => "i32",
            RawValue::I64(_) => "i64",
            RawValue::U8(_) => "u8",
            RawValue::U16(_) => "u16",
            RawValue::U32(_) => "u32",
            RawValue::U64(_) => "u64",
            RawValue::Ipv4(_) => "an IPv4 address",
            RawValue::Ipv6(_) => "an IPv6 address",
            RawValue::Bytes(_) => "bytes",
        }
    }
}

/// One slot of a record's field set. `value` is `None` when the slot is invalid.
#[derive(Debug, Clone)]
pub struct FieldSlot {
    pub descriptor: FieldDescriptor,
    pub value: Option<RawValue>,
}

/// Fixed-size ordered field set of one record, laid out per the resolved configuration.
#[derive(Debug, Clone)]
pub struct Record {
    slots: Vec<FieldSlot>,
}

impl Record {
    /// Create a record with every slot of `layout` invalid.
    pub fn for_layout(layout: &[FieldDescriptor]) -> Self {
        Record {
            slots: layout
                .iter()
                .map(|descriptor| FieldSlot {
                    descriptor: descriptor.clone(),
                    value: None,
                })
                .collect(),
        }
    }

    /// Store a value in the slot named `name`. Returns false if the layout has no such slot.
    pub fn set(&mut self, name: &str, value: RawValue) -> bool {
        match self.slots.iter_mut().find(|s| s.descriptor.name == name) {
            Some(slot) => {
                slot.value = Some(value);
                true
            }
            None => false,
        }
    }

    pub fn with(mut self, name: &str, value: RawValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn slots(&self) -> &[FieldSlot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&FieldSlot> {
        self.slots.get(index)
    }

    pub fn is_valid(&self, index: usize) -> bool {
        self.slot(index).is_some_and(|s| s.value.is_some())
    }
}

/// Render one slot value as text according to the descriptor's type tag.
pub fn decode(descriptor: &FieldDescriptor, value: &RawValue) -> Result<String, DecodeError> {
    let mismatch = || DecodeError::TypeMismatch {
        field: descriptor.name.clone(),
        expected: descriptor.field_type,
        found: value.kind(),
    };

    let text = match (descriptor.field_type, value) {
        (FieldType::Void, _) => "<void>".to_string(),
        (FieldType::Raw | FieldType::RawString, _) => "<raw>".to_string(),

        (FieldType::Int8, RawValue::I8(v)) => v.to_string(),
        (FieldType::Int16, RawValue::I16(v)) => v.to_string(),
        (FieldType::Int32, RawValue::I32(v)) => v.to_string(),
        (FieldType::Int64, RawValue::I64(v)) => v.to_string(),
        (FieldType::Uint8, RawValue::U8(v)) => v.to_string(),
        (FieldType::Uint16, RawValue::U16(v)) => v.to_string(),
        (FieldType::Uint32, RawValue::U32(v)) => v.to_string(),
        (FieldType::Uint64, RawValue::U64(v)) => v.to_string(),

        (FieldType::Bool, RawValue::U8(0)) => "false".to_string(),
        (FieldType::Bool, RawValue::U8(_)) => "true".to_string(),

        (FieldType::Ipv4, RawValue::Ipv4(v)) => Ipv4Addr::from(*v).to_string(),
        (FieldType::Ipv4, RawValue::Bytes(bytes)) => {
            let octets: [u8; 4] = bytes.as_slice().try_into().map_err(|_| DecodeError::Address {
                field: descriptor.name.clone(),
                kind: "IP4",
                reason: format!("expected 4 bytes, got {}", bytes.len()),
            })?;
            Ipv4Addr::from(octets).to_string()
        }
        (FieldType::Ipv6, RawValue::Ipv6(octets)) => Ipv6Addr::from(*octets).to_string(),
        (FieldType::Ipv6, RawValue::Bytes(bytes)) => {
            let octets: [u8; 16] =
                bytes.as_slice().try_into().map_err(|_| DecodeError::Address {
                    field: descriptor.name.clone(),
                    kind: "IP6",
                    reason: format!("expected 16 bytes, got {}", bytes.len()),
                })?;
            Ipv6Addr::from(octets).to_string()
        }
        (FieldType::Ipv4 | FieldType::Ipv6, _) => {
            return Err(DecodeError::Address {
                field: descriptor.name.clone(),
                kind: if descriptor.field_type == FieldType::Ipv4 {
                    "IP4"
                } else {
                    "IP6"
                },
                reason: format!("slot holds {}", value.kind()),
            })
        }

        (FieldType::String, RawValue::Bytes(bytes)) => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            String::from_utf8_lossy(&bytes[..end]).into_owned()
        }

        _ => return Err(mismatch()),
    };

    Ok(text)
}

/// Decode every valid slot of `record` into a name → text map.
pub fn decode_record(record: &Record) -> Result<HashMap<String, String>, DecodeError> {
    let mut fields = HashMap::with_capacity(record.slots().len());
    for slot in record.slots() {
        if let Some(value) = &slot.value {
            let text = decode(&slot.descriptor, value)?;
            fields.insert(slot.descriptor.name.clone(), text);
        }
    }
    Ok(fields)
}
