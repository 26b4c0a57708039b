use prost::{
    bytes::BufMut,
    encoding::{encode_key, encode_varint, encoded_len_varint, key_len, WireType},
};
use prost_reflect::Kind;

use super::{DynamicMessage, FieldRef, MapKey, Value};

/// Options controlling how messages are encoded.
///
/// ```
/// # use prost_dyn::dynamic::EncodeOptions;
/// let options = EncodeOptions::new().deterministic(true);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    deterministic: bool,
}

impl EncodeOptions {
    /// Creates the default options.
    pub fn new() -> Self {
        EncodeOptions::default()
    }

    /// Whether the output should be the same for equal messages.
    ///
    /// Fields are always written in field number order. When this is set, map entries are
    /// additionally sorted by key; otherwise they are written in an unspecified order.
    pub fn deterministic(mut self, yes: bool) -> Self {
        self.deterministic = yes;
        self
    }
}

impl DynamicMessage {
    /// Encodes this message to a new buffer.
    pub fn marshal(&self) -> Vec<u8> {
        self.marshal_with(EncodeOptions::new())
    }

    /// Encodes this message to a new buffer, sorting map entries by key so that equal messages
    /// always produce the same bytes.
    pub fn marshal_deterministic(&self) -> Vec<u8> {
        self.marshal_with(EncodeOptions::new().deterministic(true))
    }

    /// Encodes this message to the end of `buf`.
    pub fn marshal_append(&self, mut buf: Vec<u8>) -> Vec<u8> {
        buf.reserve(self.encoded_len());
        self.encode_with(&mut buf, EncodeOptions::new());
        buf
    }

    /// Encodes this message to `buf`.
    ///
    /// Set fields are written in field number order, followed by unknown fields in field
    /// number order. Unknown fields with the same number are written in the order they were
    /// decoded.
    ///
    /// # Panics
    ///
    /// Panics if `buf` has insufficient capacity.
    pub fn encode_with<B>(&self, buf: &mut B, options: EncodeOptions)
    where
        B: BufMut,
    {
        for (field, value) in self.fields() {
            encode_field(&field, value, buf, options);
        }
        self.unknown.encode_raw(buf);
    }

    /// Gets the length of the encoded form of this message.
    pub fn encoded_len(&self) -> usize {
        let known: usize = self
            .fields()
            .map(|(field, value)| field_encoded_len(&field, value))
            .sum();
        known + self.unknown.encoded_len()
    }

    fn marshal_with(&self, options: EncodeOptions) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_with(&mut buf, options);
        buf
    }
}

fn encode_field<B>(field: &FieldRef, value: &Value, buf: &mut B, options: EncodeOptions)
where
    B: BufMut,
{
    let number = field.number();
    match (value, field.kind()) {
        (Value::List(values), kind) if field.is_list() => {
            if field.is_packed() {
                let len: usize = values.iter().map(|value| scalar_len(value, &kind)).sum();
                encode_key(number, WireType::LengthDelimited, buf);
                encode_varint(len as u64, buf);
                for value in values {
                    encode_scalar(value, &kind, buf);
                }
            } else {
                for value in values {
                    encode_single(number, &kind, field.is_group(), value, buf, options);
                }
            }
        }
        (Value::Map(entries), Kind::Message(entry)) if field.is_map() => {
            let key_kind = entry.map_entry_key_field().kind();
            let value_kind = entry.map_entry_value_field().kind();

            let mut entries: Vec<_> = entries.iter().collect();
            if options.deterministic {
                entries.sort_unstable_by(|(l, _), (r, _)| l.cmp(r));
            }
            for (key, value) in entries {
                let len = map_key_len(key, &key_kind) + single_len(2, &value_kind, false, value);
                encode_key(number, WireType::LengthDelimited, buf);
                encode_varint(len as u64, buf);

                encode_key(1, key_kind.wire_type(), buf);
                encode_map_key(key, &key_kind, buf);
                encode_single(2, &value_kind, false, value, buf, options);
            }
        }
        (value, kind) => encode_single(number, &kind, field.is_group(), value, buf, options),
    }
}

fn field_encoded_len(field: &FieldRef, value: &Value) -> usize {
    let number = field.number();
    match (value, field.kind()) {
        (Value::List(values), kind) if field.is_list() => {
            if field.is_packed() {
                let len: usize = values.iter().map(|value| scalar_len(value, &kind)).sum();
                key_len(number) + encoded_len_varint(len as u64) + len
            } else {
                values
                    .iter()
                    .map(|value| single_len(number, &kind, field.is_group(), value))
                    .sum()
            }
        }
        (Value::Map(entries), Kind::Message(entry)) if field.is_map() => {
            let key_kind = entry.map_entry_key_field().kind();
            let value_kind = entry.map_entry_value_field().kind();

            entries
                .iter()
                .map(|(key, value)| {
                    let len =
                        map_key_len(key, &key_kind) + single_len(2, &value_kind, false, value);
                    key_len(number) + encoded_len_varint(len as u64) + len
                })
                .sum()
        }
        (value, kind) => single_len(number, &kind, field.is_group(), value),
    }
}

fn encode_single<B>(
    number: u32,
    kind: &Kind,
    group: bool,
    value: &Value,
    buf: &mut B,
    options: EncodeOptions,
) where
    B: BufMut,
{
    match (value, kind) {
        (Value::Message(message), Kind::Message(_)) if group => {
            encode_key(number, WireType::StartGroup, buf);
            message.encode_with(buf, options);
            encode_key(number, WireType::EndGroup, buf);
        }
        (Value::Message(message), Kind::Message(_)) => {
            encode_key(number, WireType::LengthDelimited, buf);
            encode_varint(message.encoded_len() as u64, buf);
            message.encode_with(buf, options);
        }
        (value, kind) => {
            encode_key(number, kind.wire_type(), buf);
            encode_scalar(value, kind, buf);
        }
    }
}

fn single_len(number: u32, kind: &Kind, group: bool, value: &Value) -> usize {
    match (value, kind) {
        (Value::Message(message), Kind::Message(_)) if group => {
            2 * key_len(number) + message.encoded_len()
        }
        (Value::Message(message), Kind::Message(_)) => {
            let len = message.encoded_len();
            key_len(number) + encoded_len_varint(len as u64) + len
        }
        (value, kind) => key_len(number) + scalar_len(value, kind),
    }
}

/// Writes a value which is not a message, without its key.
fn encode_scalar<B>(value: &Value, kind: &Kind, buf: &mut B)
where
    B: BufMut,
{
    match (value, kind) {
        (Value::Bool(value), Kind::Bool) => encode_varint(*value as u64, buf),
        (Value::I32(value), Kind::Int32) => encode_varint(*value as u64, buf),
        (Value::I32(value), Kind::Sint32) => encode_varint(from_sint32(*value) as u64, buf),
        (Value::I32(value), Kind::Sfixed32) => buf.put_i32_le(*value),
        (Value::I64(value), Kind::Int64) => encode_varint(*value as u64, buf),
        (Value::I64(value), Kind::Sint64) => encode_varint(from_sint64(*value), buf),
        (Value::I64(value), Kind::Sfixed64) => buf.put_i64_le(*value),
        (Value::U32(value), Kind::Uint32) => encode_varint(*value as u64, buf),
        (Value::U32(value), Kind::Fixed32) => buf.put_u32_le(*value),
        (Value::U64(value), Kind::Uint64) => encode_varint(*value, buf),
        (Value::U64(value), Kind::Fixed64) => buf.put_u64_le(*value),
        (Value::F32(value), Kind::Float) => buf.put_f32_le(*value),
        (Value::F64(value), Kind::Double) => buf.put_f64_le(*value),
        (Value::EnumNumber(value), Kind::Enum(_)) => encode_varint(*value as u64, buf),
        (Value::String(value), Kind::String) => {
            encode_varint(value.len() as u64, buf);
            buf.put_slice(value.as_bytes());
        }
        (Value::Bytes(value), Kind::Bytes) => {
            encode_varint(value.len() as u64, buf);
            buf.put_slice(value);
        }
        (value, kind) => panic!(
            "mismatch between DynamicMessage value {:?} and type {:?}",
            value, kind
        ),
    }
}

fn scalar_len(value: &Value, kind: &Kind) -> usize {
    match (value, kind) {
        (Value::Bool(_), Kind::Bool) => 1,
        (Value::I32(value), Kind::Int32) => encoded_len_varint(*value as u64),
        (Value::I32(value), Kind::Sint32) => encoded_len_varint(from_sint32(*value) as u64),
        (Value::I64(value), Kind::Int64) => encoded_len_varint(*value as u64),
        (Value::I64(value), Kind::Sint64) => encoded_len_varint(from_sint64(*value)),
        (Value::U32(value), Kind::Uint32) => encoded_len_varint(*value as u64),
        (Value::U64(value), Kind::Uint64) => encoded_len_varint(*value),
        (Value::EnumNumber(value), Kind::Enum(_)) => encoded_len_varint(*value as u64),
        (Value::I32(_), Kind::Sfixed32)
        | (Value::U32(_), Kind::Fixed32)
        | (Value::F32(_), Kind::Float) => 4,
        (Value::I64(_), Kind::Sfixed64)
        | (Value::U64(_), Kind::Fixed64)
        | (Value::F64(_), Kind::Double) => 8,
        (Value::String(value), Kind::String) => {
            encoded_len_varint(value.len() as u64) + value.len()
        }
        (Value::Bytes(value), Kind::Bytes) => encoded_len_varint(value.len() as u64) + value.len(),
        (value, kind) => panic!(
            "mismatch between DynamicMessage value {:?} and type {:?}",
            value, kind
        ),
    }
}

fn encode_map_key<B>(key: &MapKey, kind: &Kind, buf: &mut B)
where
    B: BufMut,
{
    match (key, kind) {
        (MapKey::Bool(value), Kind::Bool) => encode_varint(*value as u64, buf),
        (MapKey::I32(value), Kind::Int32) => encode_varint(*value as u64, buf),
        (MapKey::I32(value), Kind::Sint32) => encode_varint(from_sint32(*value) as u64, buf),
        (MapKey::I32(value), Kind::Sfixed32) => buf.put_i32_le(*value),
        (MapKey::I64(value), Kind::Int64) => encode_varint(*value as u64, buf),
        (MapKey::I64(value), Kind::Sint64) => encode_varint(from_sint64(*value), buf),
        (MapKey::I64(value), Kind::Sfixed64) => buf.put_i64_le(*value),
        (MapKey::U32(value), Kind::Uint32) => encode_varint(*value as u64, buf),
        (MapKey::U32(value), Kind::Fixed32) => buf.put_u32_le(*value),
        (MapKey::U64(value), Kind::Uint64) => encode_varint(*value, buf),
        (MapKey::U64(value), Kind::Fixed64) => buf.put_u64_le(*value),
        (MapKey::String(value), Kind::String) => {
            encode_varint(value.len() as u64, buf);
            buf.put_slice(value.as_bytes());
        }
        (key, kind) => panic!(
            "mismatch between DynamicMessage map key {:?} and type {:?}",
            key, kind
        ),
    }
}

/// The length of a map entry's key field, including its key.
fn map_key_len(key: &MapKey, kind: &Kind) -> usize {
    let len = match (key, kind) {
        (MapKey::Bool(_), Kind::Bool) => 1,
        (MapKey::I32(value), Kind::Int32) => encoded_len_varint(*value as u64),
        (MapKey::I32(value), Kind::Sint32) => encoded_len_varint(from_sint32(*value) as u64),
        (MapKey::I64(value), Kind::Int64) => encoded_len_varint(*value as u64),
        (MapKey::I64(value), Kind::Sint64) => encoded_len_varint(from_sint64(*value)),
        (MapKey::U32(value), Kind::Uint32) => encoded_len_varint(*value as u64),
        (MapKey::U64(value), Kind::Uint64) => encoded_len_varint(*value),
        (MapKey::I32(_), Kind::Sfixed32) | (MapKey::U32(_), Kind::Fixed32) => 4,
        (MapKey::I64(_), Kind::Sfixed64) | (MapKey::U64(_), Kind::Fixed64) => 8,
        (MapKey::String(value), Kind::String) => {
            encoded_len_varint(value.len() as u64) + value.len()
        }
        (key, kind) => panic!(
            "mismatch between DynamicMessage map key {:?} and type {:?}",
            key, kind
        ),
    };
    key_len(1) + len
}

fn from_sint32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

fn from_sint64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}
