use std::collections::HashMap;

use prost::bytes::Bytes;
use prost_reflect::{
    Cardinality, ExtensionDescriptor, FieldDescriptor, Kind, MessageDescriptor, OneofDescriptor,
};
use prost_types::FieldDescriptorProto;

use super::{DynamicMessage, MapKey, Value};

/// A field of a message, which may either be declared by the message type itself or be an
/// extension field declared elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    /// A field declared by the message type.
    Field(FieldDescriptor),
    /// An extension field.
    Extension(ExtensionDescriptor),
}

impl FieldRef {
    /// Gets the field number.
    pub fn number(&self) -> u32 {
        match self {
            FieldRef::Field(field) => field.number(),
            FieldRef::Extension(extension) => extension.number(),
        }
    }

    /// Gets the short name of the field.
    pub fn name(&self) -> &str {
        match self {
            FieldRef::Field(field) => field.name(),
            FieldRef::Extension(extension) => extension.name(),
        }
    }

    /// Gets the fully-qualified name of the field.
    pub fn full_name(&self) -> &str {
        match self {
            FieldRef::Field(field) => field.full_name(),
            FieldRef::Extension(extension) => extension.full_name(),
        }
    }

    /// Gets the type of the field.
    pub fn kind(&self) -> Kind {
        match self {
            FieldRef::Field(field) => field.kind(),
            FieldRef::Extension(extension) => extension.kind(),
        }
    }

    /// Gets the cardinality of the field.
    pub fn cardinality(&self) -> Cardinality {
        match self {
            FieldRef::Field(field) => field.cardinality(),
            FieldRef::Extension(extension) => extension.cardinality(),
        }
    }

    /// Returns `true` for repeated fields which are not maps.
    pub fn is_list(&self) -> bool {
        match self {
            FieldRef::Field(field) => field.is_list(),
            FieldRef::Extension(extension) => extension.is_list(),
        }
    }

    /// Returns `true` for map fields.
    pub fn is_map(&self) -> bool {
        match self {
            FieldRef::Field(field) => field.is_map(),
            FieldRef::Extension(extension) => extension.is_map(),
        }
    }

    /// Returns `true` if this is a repeated field which is written in packed form.
    pub fn is_packed(&self) -> bool {
        match self {
            FieldRef::Field(field) => field.is_packed(),
            FieldRef::Extension(extension) => extension.is_packed(),
        }
    }

    /// Returns `true` if this field is written using the group encoding.
    pub fn is_group(&self) -> bool {
        match self {
            FieldRef::Field(field) => field.is_group(),
            FieldRef::Extension(extension) => extension.is_group(),
        }
    }

    /// Returns `true` if the field tracks whether it was explicitly set, even to its default
    /// value.
    pub fn supports_presence(&self) -> bool {
        match self {
            FieldRef::Field(field) => field.supports_presence(),
            FieldRef::Extension(extension) => extension.supports_presence(),
        }
    }

    /// Gets the oneof containing this field, if any. Extensions are never part of a oneof.
    pub fn containing_oneof(&self) -> Option<OneofDescriptor> {
        match self {
            FieldRef::Field(field) => field.containing_oneof(),
            FieldRef::Extension(_) => None,
        }
    }

    /// Returns the extension descriptor if this is an extension field.
    pub fn as_extension(&self) -> Option<&ExtensionDescriptor> {
        match self {
            FieldRef::Field(_) => None,
            FieldRef::Extension(extension) => Some(extension),
        }
    }

    fn field_descriptor_proto(&self) -> &FieldDescriptorProto {
        match self {
            FieldRef::Field(field) => field.field_descriptor_proto(),
            FieldRef::Extension(extension) => extension.field_descriptor_proto(),
        }
    }

    /// Gets the value of this field in a message where it has not been set.
    ///
    /// This is an empty list or map for repeated fields, the declared default for proto2
    /// fields which have one, and the zero value of the type otherwise.
    pub fn default_value(&self) -> Value {
        if self.is_list() {
            return Value::List(Vec::new());
        }
        if self.is_map() {
            return Value::Map(HashMap::new());
        }

        let kind = self.kind();
        self.field_descriptor_proto()
            .default_value
            .as_deref()
            .and_then(|default| parse_default_value(&kind, default))
            .unwrap_or_else(|| Value::default_value(&kind))
    }

    /// Returns `true` if a stored value should be treated as set.
    ///
    /// Empty lists and maps are never set. Fields without presence are not set when they
    /// hold the zero value of their type.
    pub(crate) fn is_present(&self, value: &Value) -> bool {
        match value {
            Value::List(values) => !values.is_empty(),
            Value::Map(values) => !values.is_empty(),
            value => self.supports_presence() || !value.is_default(&self.kind()),
        }
    }

    /// Returns `true` if `value` may be stored in this field.
    pub fn is_valid(&self, value: &Value) -> bool {
        match (value, self.kind()) {
            (Value::List(list), kind) if self.is_list() => {
                list.iter().all(|value| value.is_valid(&kind))
            }
            (Value::Map(map), Kind::Message(entry)) if self.is_map() => {
                is_valid_map(&entry, map)
            }
            (_, _) if self.is_list() || self.is_map() => false,
            (value, kind) => value.is_valid(&kind),
        }
    }
}

impl From<FieldDescriptor> for FieldRef {
    fn from(field: FieldDescriptor) -> Self {
        FieldRef::Field(field)
    }
}

impl From<ExtensionDescriptor> for FieldRef {
    fn from(extension: ExtensionDescriptor) -> Self {
        FieldRef::Extension(extension)
    }
}

fn is_valid_map(entry: &MessageDescriptor, map: &HashMap<MapKey, Value>) -> bool {
    let key_kind = entry.map_entry_key_field().kind();
    let value_field = FieldRef::Field(entry.map_entry_value_field());
    map.iter()
        .all(|(key, value)| key.is_valid(&key_kind) && value_field.is_valid(value))
}

impl Value {
    /// Returns the zero value for the given type.
    ///
    /// This never returns a list or map; see [`FieldRef::default_value`].
    pub fn default_value(kind: &Kind) -> Self {
        match kind {
            Kind::Message(desc) => Value::Message(DynamicMessage::new(desc.clone())),
            Kind::Enum(enum_ty) => Value::EnumNumber(enum_ty.default_value().number()),
            Kind::Double => Value::F64(0.0),
            Kind::Float => Value::F32(0.0),
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => Value::I32(0),
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => Value::I64(0),
            Kind::Uint32 | Kind::Fixed32 => Value::U32(0),
            Kind::Uint64 | Kind::Fixed64 => Value::U64(0),
            Kind::Bool => Value::Bool(false),
            Kind::String => Value::String(String::new()),
            Kind::Bytes => Value::Bytes(Bytes::new()),
        }
    }

    /// Returns `true` if this is the zero value for the given type.
    pub fn is_default(&self, kind: &Kind) -> bool {
        match (self, kind) {
            (Value::Bool(value), Kind::Bool) => !*value,
            (Value::I32(value), _) => *value == 0,
            (Value::I64(value), _) => *value == 0,
            (Value::U32(value), _) => *value == 0,
            (Value::U64(value), _) => *value == 0,
            // Negative zero has a distinct encoding, so it is not treated as the default.
            (Value::F32(value), _) => value.to_bits() == 0,
            (Value::F64(value), _) => value.to_bits() == 0,
            (Value::String(value), _) => value.is_empty(),
            (Value::Bytes(value), _) => value.is_empty(),
            (Value::EnumNumber(value), Kind::Enum(enum_ty)) => {
                *value == enum_ty.default_value().number()
            }
            (Value::List(values), _) => values.is_empty(),
            (Value::Map(values), _) => values.is_empty(),
            _ => false,
        }
    }

    /// Returns `true` if this value can be encoded as the given type.
    ///
    /// Lists and maps are never valid for a single type; use [`FieldRef::is_valid`] to check
    /// values for repeated fields.
    pub fn is_valid(&self, kind: &Kind) -> bool {
        match (self, kind) {
            (Value::Message(message), Kind::Message(desc)) => {
                message.descriptor().full_name() == desc.full_name()
            }
            (value, kind) => matches!(
                (value, kind),
                (Value::Bool(_), Kind::Bool)
                    | (Value::I32(_), Kind::Int32 | Kind::Sint32 | Kind::Sfixed32)
                    | (Value::I64(_), Kind::Int64 | Kind::Sint64 | Kind::Sfixed64)
                    | (Value::U32(_), Kind::Uint32 | Kind::Fixed32)
                    | (Value::U64(_), Kind::Uint64 | Kind::Fixed64)
                    | (Value::F32(_), Kind::Float)
                    | (Value::F64(_), Kind::Double)
                    | (Value::String(_), Kind::String)
                    | (Value::Bytes(_), Kind::Bytes)
                    | (Value::EnumNumber(_), Kind::Enum(_))
            ),
        }
    }
}

impl MapKey {
    /// Returns the zero value for the given key type.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is not a valid map key type.
    pub fn default_value(kind: &Kind) -> Self {
        match kind {
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => MapKey::I32(0),
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => MapKey::I64(0),
            Kind::Uint32 | Kind::Fixed32 => MapKey::U32(0),
            Kind::Uint64 | Kind::Fixed64 => MapKey::U64(0),
            Kind::Bool => MapKey::Bool(false),
            Kind::String => MapKey::String(String::new()),
            _ => panic!("invalid type for map key: {:?}", kind),
        }
    }

    /// Returns `true` if this key can be encoded as the given type.
    pub fn is_valid(&self, kind: &Kind) -> bool {
        matches!(
            (self, kind),
            (MapKey::Bool(_), Kind::Bool)
                | (MapKey::I32(_), Kind::Int32 | Kind::Sint32 | Kind::Sfixed32)
                | (MapKey::I64(_), Kind::Int64 | Kind::Sint64 | Kind::Sfixed64)
                | (MapKey::U32(_), Kind::Uint32 | Kind::Fixed32)
                | (MapKey::U64(_), Kind::Uint64 | Kind::Fixed64)
                | (MapKey::String(_), Kind::String)
        )
    }

    pub(crate) fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(value) => Some(MapKey::Bool(value)),
            Value::I32(value) => Some(MapKey::I32(value)),
            Value::I64(value) => Some(MapKey::I64(value)),
            Value::U32(value) => Some(MapKey::U32(value)),
            Value::U64(value) => Some(MapKey::U64(value)),
            Value::String(value) => Some(MapKey::String(value)),
            _ => None,
        }
    }
}

impl From<MapKey> for Value {
    fn from(key: MapKey) -> Self {
        match key {
            MapKey::Bool(value) => Value::Bool(value),
            MapKey::I32(value) => Value::I32(value),
            MapKey::I64(value) => Value::I64(value),
            MapKey::U32(value) => Value::U32(value),
            MapKey::U64(value) => Value::U64(value),
            MapKey::String(value) => Value::String(value),
        }
    }
}

/// Parses the textual default value of a proto2 field, as stored in its descriptor.
fn parse_default_value(kind: &Kind, value: &str) -> Option<Value> {
    match kind {
        Kind::Double => value.parse().ok().map(Value::F64),
        Kind::Float => value.parse().ok().map(Value::F32),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => value.parse().ok().map(Value::I32),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => value.parse().ok().map(Value::I64),
        Kind::Uint32 | Kind::Fixed32 => value.parse().ok().map(Value::U32),
        Kind::Uint64 | Kind::Fixed64 => value.parse().ok().map(Value::U64),
        Kind::Bool => value.parse().ok().map(Value::Bool),
        Kind::String => Some(Value::String(value.to_owned())),
        Kind::Bytes => unescape_bytes(value).map(Value::Bytes),
        Kind::Enum(enum_ty) => enum_ty
            .get_value_by_name(value)
            .map(|v| Value::EnumNumber(v.number())),
        Kind::Message(_) => None,
    }
}

/// Reverses the C-style escaping used for default values of `bytes` fields.
fn unescape_bytes(s: &str) -> Option<Bytes> {
    let src = s.as_bytes();
    let mut dst = Vec::with_capacity(src.len());

    let mut p = 0;
    while p < src.len() {
        if src[p] != b'\\' {
            dst.push(src[p]);
            p += 1;
            continue;
        }

        p += 1;
        let escape = *src.get(p)?;
        p += 1;
        match escape {
            b'a' => dst.push(0x07),
            b'b' => dst.push(0x08),
            b'f' => dst.push(0x0C),
            b'n' => dst.push(b'\n'),
            b'r' => dst.push(b'\r'),
            b't' => dst.push(b'\t'),
            b'v' => dst.push(0x0B),
            b'\\' | b'?' | b'\'' | b'"' => dst.push(escape),
            b'0'..=b'7' => {
                let mut octal = escape - b'0';
                for _ in 0..2 {
                    match src.get(p) {
                        Some(&digit @ b'0'..=b'7') => {
                            octal = octal.wrapping_mul(8).wrapping_add(digit - b'0');
                            p += 1;
                        }
                        _ => break,
                    }
                }
                dst.push(octal);
            }
            b'x' | b'X' => {
                let hex = s.get(p..p + 2)?;
                dst.push(u8::from_str_radix(hex, 16).ok()?);
                p += 2;
            }
            _ => return None,
        }
    }
    Some(dst.into())
}
