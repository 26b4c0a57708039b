//! Messages whose type is known only at runtime, and their binary encoding.

mod decode;
mod encode;
mod error;
mod factory;
mod fields;
mod unknown;

use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap},
    fmt,
};

use prost::bytes::Bytes;
use prost_reflect::{Cardinality, ExtensionDescriptor, FieldDescriptor, MessageDescriptor};

pub use self::decode::RECURSION_LIMIT;
pub use self::encode::EncodeOptions;
pub use self::error::{DecodeError, SetFieldError, ValidationError};
pub use self::factory::MessageFactory;
pub use self::fields::FieldRef;
pub use self::unknown::UnknownField;

use self::unknown::UnknownFieldSet;

/// A protobuf message whose type is described by a [`MessageDescriptor`].
///
/// The message stores a [`Value`] for each field that has been set, including extension
/// fields, along with any fields that were decoded but are not known to its type. Unknown
/// fields are kept so that they are written back out unchanged when the message is encoded.
///
/// Two messages are equal if they have the same type, the same set fields and the same unknown
/// fields. The [`MessageFactory`] is not compared.
#[derive(Debug, Clone)]
pub struct DynamicMessage {
    desc: MessageDescriptor,
    factory: MessageFactory,
    fields: BTreeMap<u32, Value>,
    extensions: BTreeMap<u32, ExtensionDescriptor>,
    unknown: UnknownFieldSet,
}

/// A dynamically-typed protobuf value.
///
/// Several protobuf types share a representation here; for example `int32`, `sint32` and
/// `sfixed32` are all stored as [`Value::I32`]. The field descriptor determines how the value
/// is encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A `bool` value.
    Bool(bool),
    /// An `int32`, `sint32` or `sfixed32` value.
    I32(i32),
    /// An `int64`, `sint64` or `sfixed64` value.
    I64(i64),
    /// A `uint32` or `fixed32` value.
    U32(u32),
    /// A `uint64` or `fixed64` value.
    U64(u64),
    /// A `float` value.
    F32(f32),
    /// A `double` value.
    F64(f64),
    /// A `string` value.
    String(String),
    /// A `bytes` value.
    Bytes(Bytes),
    /// The number of an enum value. This need not be declared by the enum type.
    EnumNumber(i32),
    /// A message value.
    Message(DynamicMessage),
    /// The elements of a repeated field.
    List(Vec<Value>),
    /// The entries of a map field.
    Map(HashMap<MapKey, Value>),
}

/// The key of a protobuf map entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    /// A `bool` key.
    Bool(bool),
    /// An `int32`, `sint32` or `sfixed32` key.
    I32(i32),
    /// An `int64`, `sint64` or `sfixed64` key.
    I64(i64),
    /// A `uint32` or `fixed32` key.
    U32(u32),
    /// A `uint64` or `fixed64` key.
    U64(u64),
    /// A `string` key.
    String(String),
}

impl DynamicMessage {
    /// Creates a new, empty message of the given type, using a default [`MessageFactory`].
    pub fn new(desc: MessageDescriptor) -> Self {
        DynamicMessage::new_with_factory(desc, MessageFactory::default())
    }

    /// Creates a new, empty message of the given type which uses `factory` to interpret
    /// extensions and nested messages.
    pub fn new_with_factory(desc: MessageDescriptor, factory: MessageFactory) -> Self {
        DynamicMessage {
            desc,
            factory,
            fields: BTreeMap::new(),
            extensions: BTreeMap::new(),
            unknown: UnknownFieldSet::default(),
        }
    }

    /// Gets the descriptor of this message's type.
    pub fn descriptor(&self) -> MessageDescriptor {
        self.desc.clone()
    }

    /// Gets the factory used by this message.
    pub fn factory(&self) -> &MessageFactory {
        &self.factory
    }

    /// Finds the field with the given number.
    ///
    /// This is a field declared by the message type, an extension which has been set on this
    /// message, or an extension known to the factory's extension resolver.
    pub fn find_field_descriptor(&self, number: u32) -> Option<FieldRef> {
        if let Some(field) = self.desc.get_field(number) {
            return Some(FieldRef::Field(field));
        }
        if let Some(extension) = self.extensions.get(&number) {
            return Some(FieldRef::Extension(extension.clone()));
        }
        self.factory
            .find_extension(&self.desc, number)
            .map(FieldRef::Extension)
    }

    /// Finds the field with the given name.
    ///
    /// Extensions are only found if they have been set on this message, and may be named by
    /// either their short or fully-qualified name.
    pub fn find_field_descriptor_by_name(&self, name: &str) -> Option<FieldRef> {
        if let Some(field) = self.desc.get_field_by_name(name) {
            return Some(FieldRef::Field(field));
        }
        self.extensions
            .values()
            .find(|ext| ext.full_name() == name || ext.name() == name)
            .map(|ext| FieldRef::Extension(ext.clone()))
    }

    /// Returns `true` if the given field is set.
    ///
    /// Fields which track presence (messages, proto2 fields, and `optional` or oneof fields in
    /// proto3) are set once a value is assigned. Other fields are only set if they hold a value
    /// other than the zero value. Repeated fields are set if they are not empty.
    ///
    /// Fields which are not set are not written when the message is encoded.
    pub fn has_field(&self, field_desc: &FieldDescriptor) -> bool {
        self.has(&FieldRef::Field(field_desc.clone()))
    }

    /// Gets the value of the given field, or its default value if it is not set.
    pub fn get_field(&self, field_desc: &FieldDescriptor) -> Cow<'_, Value> {
        self.get(&FieldRef::Field(field_desc.clone()))
    }

    /// Gets a mutable reference to the value of the given field, first setting it to its default
    /// value if it is not set.
    ///
    /// If the field is part of a oneof, the other fields of the oneof are cleared.
    pub fn get_field_mut(&mut self, field_desc: &FieldDescriptor) -> &mut Value {
        self.get_mut(FieldRef::Field(field_desc.clone()))
    }

    /// Sets the value of the given field.
    ///
    /// # Panics
    ///
    /// Panics if the field does not belong to this message's type, or the value is not valid
    /// for the field. See [`try_set_field`][Self::try_set_field] for a non-panicking version.
    pub fn set_field(&mut self, field_desc: &FieldDescriptor, value: Value) {
        if let Err(err) = self.try_set_field(field_desc, value) {
            panic!("{}", err)
        }
    }

    /// Sets the value of the given field, failing if the field does not belong to this message's
    /// type or the value is not valid for the field.
    ///
    /// Setting a field without presence to its zero value, or a repeated field to an empty
    /// list or map, clears it. If the field is part of a oneof, the other fields of the oneof
    /// are cleared.
    pub fn try_set_field(
        &mut self,
        field_desc: &FieldDescriptor,
        value: Value,
    ) -> Result<(), SetFieldError> {
        self.try_set(FieldRef::Field(field_desc.clone()), value)
    }

    /// Clears the given field.
    pub fn clear_field(&mut self, field_desc: &FieldDescriptor) {
        self.clear(&FieldRef::Field(field_desc.clone()))
    }

    /// Returns `true` if the field with the given number is set.
    ///
    /// See [`has_field`][Self::has_field].
    pub fn has_field_by_number(&self, number: u32) -> bool {
        self.find_field_descriptor(number)
            .map_or(false, |field| self.has(&field))
    }

    /// Gets the value of the field with the given number, or `None` if there is no such field.
    ///
    /// See [`get_field`][Self::get_field].
    pub fn get_field_by_number(&self, number: u32) -> Option<Cow<'_, Value>> {
        self.find_field_descriptor(number)
            .map(|field| self.get(&field))
    }

    /// Gets a mutable reference to the value of the field with the given number, or `None` if
    /// there is no such field.
    ///
    /// See [`get_field_mut`][Self::get_field_mut].
    pub fn get_field_by_number_mut(&mut self, number: u32) -> Option<&mut Value> {
        let field = self.find_field_descriptor(number)?;
        Some(self.get_mut(field))
    }

    /// Sets the value of the field with the given number.
    ///
    /// # Panics
    ///
    /// Panics if there is no such field, or the value is not valid for it.
    pub fn set_field_by_number(&mut self, number: u32, value: Value) {
        if let Err(err) = self.try_set_field_by_number(number, value) {
            panic!("{}", err)
        }
    }

    /// Sets the value of the field with the given number, failing if there is no such field or
    /// the value is not valid for it.
    pub fn try_set_field_by_number(&mut self, number: u32, value: Value) -> Result<(), SetFieldError> {
        let field = self
            .find_field_descriptor(number)
            .ok_or(SetFieldError::NotFound)?;
        self.try_set(field, value)
    }

    /// Clears the field with the given number, if it exists.
    pub fn clear_field_by_number(&mut self, number: u32) {
        if let Some(field) = self.find_field_descriptor(number) {
            self.clear(&field);
        }
    }

    /// Returns `true` if the field with the given name is set.
    ///
    /// See [`has_field`][Self::has_field].
    pub fn has_field_by_name(&self, name: &str) -> bool {
        self.find_field_descriptor_by_name(name)
            .map_or(false, |field| self.has(&field))
    }

    /// Gets the value of the field with the given name, or `None` if there is no such field.
    ///
    /// See [`get_field`][Self::get_field].
    pub fn get_field_by_name(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.find_field_descriptor_by_name(name)
            .map(|field| self.get(&field))
    }

    /// Gets a mutable reference to the value of the field with the given name, or `None` if
    /// there is no such field.
    ///
    /// See [`get_field_mut`][Self::get_field_mut].
    pub fn get_field_by_name_mut(&mut self, name: &str) -> Option<&mut Value> {
        let field = self.find_field_descriptor_by_name(name)?;
        Some(self.get_mut(field))
    }

    /// Sets the value of the field with the given name.
    ///
    /// # Panics
    ///
    /// Panics if there is no such field, or the value is not valid for it.
    pub fn set_field_by_name(&mut self, name: &str, value: Value) {
        if let Err(err) = self.try_set_field_by_name(name, value) {
            panic!("{}", err)
        }
    }

    /// Sets the value of the field with the given name, failing if there is no such field or
    /// the value is not valid for it.
    pub fn try_set_field_by_name(&mut self, name: &str, value: Value) -> Result<(), SetFieldError> {
        let field = self
            .find_field_descriptor_by_name(name)
            .ok_or(SetFieldError::NotFound)?;
        self.try_set(field, value)
    }

    /// Clears the field with the given name, if it exists.
    pub fn clear_field_by_name(&mut self, name: &str) {
        if let Some(field) = self.find_field_descriptor_by_name(name) {
            self.clear(&field);
        }
    }

    /// Returns `true` if the given extension is set.
    pub fn has_extension(&self, extension_desc: &ExtensionDescriptor) -> bool {
        self.extensions.contains_key(&extension_desc.number())
            && self.has(&FieldRef::Extension(extension_desc.clone()))
    }

    /// Gets the value of the given extension, or its default value if it is not set.
    pub fn get_extension(&self, extension_desc: &ExtensionDescriptor) -> Cow<'_, Value> {
        if self.extensions.contains_key(&extension_desc.number()) {
            self.get(&FieldRef::Extension(extension_desc.clone()))
        } else {
            Cow::Owned(default_value(
                &FieldRef::Extension(extension_desc.clone()),
                &self.factory,
            ))
        }
    }

    /// Sets the value of the given extension.
    ///
    /// # Panics
    ///
    /// Panics if the extension does not extend this message's type, or the value is not valid
    /// for it.
    pub fn set_extension(&mut self, extension_desc: &ExtensionDescriptor, value: Value) {
        if let Err(err) = self.try_set_extension(extension_desc, value) {
            panic!("{}", err)
        }
    }

    /// Sets the value of the given extension, failing if the extension does not extend this
    /// message's type or the value is not valid for it.
    pub fn try_set_extension(
        &mut self,
        extension_desc: &ExtensionDescriptor,
        value: Value,
    ) -> Result<(), SetFieldError> {
        self.try_set(FieldRef::Extension(extension_desc.clone()), value)
    }

    /// Clears the given extension.
    pub fn clear_extension(&mut self, extension_desc: &ExtensionDescriptor) {
        if self.extensions.contains_key(&extension_desc.number()) {
            self.clear(&FieldRef::Extension(extension_desc.clone()))
        }
    }

    /// Gets an iterator over the fields which are set, in field number order.
    pub fn fields(&self) -> impl Iterator<Item = (FieldRef, &Value)> + '_ {
        self.fields.iter().filter_map(move |(&number, value)| {
            let field = self.stored_field(number);
            if field.is_present(value) {
                Some((field, value))
            } else {
                None
            }
        })
    }

    /// Gets the unknown fields with the given number, in the order they were decoded.
    pub fn unknown_fields(&self, number: u32) -> &[UnknownField] {
        self.unknown.get(number)
    }

    /// Gets the numbers of all unknown fields, in ascending order.
    pub fn unknown_field_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.unknown.numbers()
    }

    /// Removes all unknown fields.
    pub fn clear_unknown_fields(&mut self) {
        self.unknown.clear();
    }

    /// Clears every field, including extensions and unknown fields.
    pub fn reset(&mut self) {
        self.fields.clear();
        self.extensions.clear();
        self.unknown.clear();
    }

    /// Merges the fields of `other` into this message.
    ///
    /// Singular scalar fields set in `other` overwrite those in this message. Repeated fields
    /// are appended, map entries are inserted, replacing any existing entry with the same key,
    /// and singular message fields are merged recursively. Unknown fields are appended.
    ///
    /// # Panics
    ///
    /// Panics if `other` is not of the same type as this message.
    pub fn merge_from(&mut self, other: &DynamicMessage) {
        assert_eq!(
            self.desc.full_name(),
            other.desc.full_name(),
            "cannot merge messages of different types"
        );

        for (field, value) in other.fields() {
            self.merge_value(field, value);
        }
        self.unknown.extend(&other.unknown);
    }

    /// Checks that every `required` field of this message, and of every message nested within
    /// it, is set.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        self.collect_missing("", &mut missing);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { missing })
        }
    }

    /// Merges a message of a type generated by `prost` into this message.
    ///
    /// The types should be compatible, or decoding will likely fail.
    pub fn transcode_from<T>(&mut self, value: &T) -> Result<(), DecodeError>
    where
        T: prost::Message,
    {
        let buf = value.encode_to_vec();
        self.unmarshal_merge(&buf)
    }

    /// Converts this message into a type generated by `prost`.
    ///
    /// The types should be compatible, or decoding will likely fail.
    pub fn transcode_to<T>(&self) -> Result<T, DecodeError>
    where
        T: prost::Message + Default,
    {
        let buf = self.marshal();
        T::decode(buf.as_slice()).map_err(DecodeError::Static)
    }

    fn owns(&self, field: &FieldRef) -> bool {
        match field {
            FieldRef::Field(field) => field.parent_message().full_name() == self.desc.full_name(),
            FieldRef::Extension(extension) => {
                extension.containing_message().full_name() == self.desc.full_name()
            }
        }
    }

    /// Gets the descriptor of a field stored in this message.
    ///
    /// # Panics
    ///
    /// Panics if no field with the given number has been stored.
    fn stored_field(&self, number: u32) -> FieldRef {
        if let Some(field) = self.desc.get_field(number) {
            return FieldRef::Field(field);
        }
        match self.extensions.get(&number) {
            Some(extension) => FieldRef::Extension(extension.clone()),
            None => panic!(
                "no descriptor for field {} of {}",
                number,
                self.desc.full_name()
            ),
        }
    }

    fn has(&self, field: &FieldRef) -> bool {
        self.fields
            .get(&field.number())
            .map_or(false, |value| field.is_present(value))
    }

    fn get(&self, field: &FieldRef) -> Cow<'_, Value> {
        match self.fields.get(&field.number()) {
            Some(value) => Cow::Borrowed(value),
            None => Cow::Owned(default_value(field, &self.factory)),
        }
    }

    fn get_mut(&mut self, field: FieldRef) -> &mut Value {
        self.prepare_set(&field);
        let factory = &self.factory;
        self.fields
            .entry(field.number())
            .or_insert_with(|| default_value(&field, factory))
    }

    fn try_set(&mut self, field: FieldRef, value: Value) -> Result<(), SetFieldError> {
        if !self.owns(&field) {
            return Err(SetFieldError::NotFound);
        }
        if !field.is_valid(&value) {
            return Err(SetFieldError::InvalidType {
                field: field.full_name().to_owned(),
                value,
            });
        }

        self.set_unchecked(field, value);
        Ok(())
    }

    pub(crate) fn set_unchecked(&mut self, field: FieldRef, value: Value) {
        self.prepare_set(&field);
        if field.is_present(&value) {
            self.fields.insert(field.number(), value);
        } else {
            self.fields.remove(&field.number());
        }
    }

    fn prepare_set(&mut self, field: &FieldRef) {
        match field {
            FieldRef::Field(field) => {
                if let Some(oneof) = field.containing_oneof() {
                    for sibling in oneof.fields() {
                        if sibling.number() != field.number() {
                            self.fields.remove(&sibling.number());
                        }
                    }
                }
            }
            FieldRef::Extension(extension) => {
                self.extensions
                    .insert(extension.number(), extension.clone());
            }
        }
    }

    fn clear(&mut self, field: &FieldRef) {
        self.fields.remove(&field.number());
        if let FieldRef::Extension(_) = field {
            self.extensions.remove(&field.number());
        }
    }

    fn merge_value(&mut self, field: FieldRef, value: &Value) {
        match value {
            Value::List(values) => {
                if let Value::List(existing) = self.get_mut(field) {
                    existing.extend(values.iter().cloned());
                }
            }
            Value::Map(entries) => {
                if let Value::Map(existing) = self.get_mut(field) {
                    existing.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            Value::Message(message) if self.has(&field) => {
                if let Value::Message(existing) = self.get_mut(field) {
                    existing.merge_from(message);
                }
            }
            value => self.set_unchecked(field, value.clone()),
        }
    }

    fn collect_missing(&self, prefix: &str, missing: &mut Vec<String>) {
        for field in self.desc.fields() {
            if field.cardinality() == Cardinality::Required && !self.has_field(&field) {
                missing.push(format!("{}{}", prefix, field.name()));
            }
        }

        for (field, value) in self.fields() {
            let path = format!("{}{}", prefix, field.name());
            match value {
                Value::Message(message) => message.collect_missing(&format!("{}.", path), missing),
                Value::List(values) => {
                    for (index, value) in values.iter().enumerate() {
                        if let Value::Message(message) = value {
                            message.collect_missing(&format!("{}[{}].", path, index), missing);
                        }
                    }
                }
                Value::Map(entries) => {
                    for (key, value) in entries {
                        if let Value::Message(message) = value {
                            message.collect_missing(&format!("{}[{}].", path, key), missing);
                        }
                    }
                }
                _ => (),
            }
        }
    }
}

/// Gets the default value of `field`, creating default sub-messages with `factory`.
fn default_value(field: &FieldRef, factory: &MessageFactory) -> Value {
    match field.default_value() {
        Value::Message(message) => Value::Message(factory.new_message(message.desc)),
        value => value,
    }
}

impl PartialEq for DynamicMessage {
    fn eq(&self, other: &Self) -> bool {
        self.desc.full_name() == other.desc.full_name()
            && self
                .fields()
                .map(|(field, value)| (field.number(), value))
                .eq(other.fields().map(|(field, value)| (field.number(), value)))
            && self.unknown == other.unknown
    }
}

impl Value {
    /// Returns the value if it is a [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the value if it is a [`Value::I32`].
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::I32(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the value if it is a [`Value::I64`].
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I64(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the value if it is a [`Value::U32`].
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Value::U32(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the value if it is a [`Value::U64`].
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::U64(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the value if it is a [`Value::F32`].
    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Value::F32(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the value if it is a [`Value::F64`].
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F64(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the enum number if this is a [`Value::EnumNumber`].
    pub fn as_enum_number(&self) -> Option<i32> {
        match *self {
            Value::EnumNumber(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the string if this is a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the bytes if this is a [`Value::Bytes`].
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the message if this is a [`Value::Message`].
    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(value) => Some(value),
            _ => None,
        }
    }

    /// Returns a mutable reference to the message if this is a [`Value::Message`].
    pub fn as_message_mut(&mut self) -> Option<&mut DynamicMessage> {
        match self {
            Value::Message(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the elements if this is a [`Value::List`].
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(value) => Some(value),
            _ => None,
        }
    }

    /// Returns a mutable reference to the elements if this is a [`Value::List`].
    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the entries if this is a [`Value::Map`].
    pub fn as_map(&self) -> Option<&HashMap<MapKey, Value>> {
        match self {
            Value::Map(value) => Some(value),
            _ => None,
        }
    }

    /// Returns a mutable reference to the entries if this is a [`Value::Map`].
    pub fn as_map_mut(&mut self) -> Option<&mut HashMap<MapKey, Value>> {
        match self {
            Value::Map(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(value) => write!(f, "{}", value),
            MapKey::I32(value) => write!(f, "{}", value),
            MapKey::I64(value) => write!(f, "{}", value),
            MapKey::U32(value) => write!(f, "{}", value),
            MapKey::U64(value) => write!(f, "{}", value),
            MapKey::String(value) => write!(f, "{:?}", value),
        }
    }
}
