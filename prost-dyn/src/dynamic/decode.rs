use prost::{
    bytes::{Buf, Bytes},
    encoding::{decode_key, decode_varint, WireType},
};
use prost_reflect::{Kind, MessageDescriptor};

use super::{DecodeError, DynamicMessage, FieldRef, MapKey, UnknownField, Value};

/// The maximum depth to which messages and groups may be nested when decoding.
pub const RECURSION_LIMIT: u32 = 100;

impl DynamicMessage {
    /// Decodes a message of the given type, then checks that all required fields are set.
    pub fn decode(desc: MessageDescriptor, buf: &[u8]) -> Result<Self, DecodeError> {
        let mut message = DynamicMessage::new(desc);
        message.unmarshal(buf)?;
        Ok(message)
    }

    /// Replaces the contents of this message with the decoded contents of `buf`, then checks
    /// that all required fields are set.
    ///
    /// If decoding fails the message may be left partially populated.
    pub fn unmarshal(&mut self, buf: &[u8]) -> Result<(), DecodeError> {
        self.reset();
        self.unmarshal_merge(buf)?;
        self.validate()?;
        Ok(())
    }

    /// Decodes `buf` and merges its fields into this message.
    ///
    /// Fields are merged as in [`merge_from`][Self::merge_from]. Required fields are not
    /// checked. If decoding fails the message may be left partially populated.
    pub fn unmarshal_merge(&mut self, mut buf: &[u8]) -> Result<(), DecodeError> {
        self.merge_fields(&mut buf, None, RECURSION_LIMIT)
    }

    /// Reads fields until the end of the input, or until the end-group marker for `group`.
    fn merge_fields(
        &mut self,
        buf: &mut &[u8],
        group: Option<u32>,
        depth: u32,
    ) -> Result<(), DecodeError> {
        loop {
            if buf.is_empty() {
                return match group {
                    Some(number) => Err(DecodeError::UnterminatedGroup { number }),
                    None => Ok(()),
                };
            }

            let (number, wire_type) = decode_key(buf)?;
            if wire_type == WireType::EndGroup {
                return match group {
                    Some(expected) if expected == number => Ok(()),
                    Some(expected) => Err(DecodeError::MismatchedEndGroup {
                        expected,
                        found: number,
                    }),
                    None => Err(DecodeError::UnexpectedEndGroup { number }),
                };
            }

            match self.find_field_descriptor(number) {
                Some(field) => self.merge_known(field, wire_type, buf, depth)?,
                None => self.merge_unknown(number, wire_type, buf, depth)?,
            }
        }
    }

    fn merge_known(
        &mut self,
        field: FieldRef,
        wire_type: WireType,
        buf: &mut &[u8],
        depth: u32,
    ) -> Result<(), DecodeError> {
        match wire_type {
            WireType::Varint => {
                let raw = decode_varint(buf)?;
                let value = convert_raw(&field, wire_type, raw)?;
                self.merge_decoded(field, value);
            }
            WireType::ThirtyTwoBit => {
                let raw = read_fixed32(buf)?;
                let value = convert_raw(&field, wire_type, raw as u64)?;
                self.merge_decoded(field, value);
            }
            WireType::SixtyFourBit => {
                let raw = read_fixed64(buf)?;
                let value = convert_raw(&field, wire_type, raw)?;
                self.merge_decoded(field, value);
            }
            WireType::LengthDelimited => {
                let data = read_length_delimited(buf)?;
                self.merge_length_delimited(field, data, depth)?;
            }
            WireType::StartGroup => {
                let desc = match field.kind() {
                    Kind::Message(desc) => desc,
                    _ => return Err(unexpected_wire_type(&field, wire_type)),
                };
                let message = self.decode_group(desc, field.number(), buf, depth)?;
                if field.is_map() {
                    self.insert_map_entry(field, &message);
                } else {
                    self.merge_message(field, message);
                }
            }
            WireType::EndGroup => {
                return Err(DecodeError::UnexpectedEndGroup {
                    number: field.number(),
                })
            }
        }
        Ok(())
    }

    fn merge_length_delimited(
        &mut self,
        field: FieldRef,
        data: &[u8],
        depth: u32,
    ) -> Result<(), DecodeError> {
        match field.kind() {
            Kind::Bytes => {
                self.merge_decoded(field, Value::Bytes(Bytes::copy_from_slice(data)));
            }
            Kind::String => match std::str::from_utf8(data) {
                Ok(value) => self.merge_decoded(field, Value::String(value.to_owned())),
                Err(_) => {
                    return Err(DecodeError::InvalidUtf8 {
                        field: field.full_name().to_owned(),
                    })
                }
            },
            Kind::Message(desc) if field.is_map() => {
                self.merge_map_entry(field, desc, data, depth)?;
            }
            Kind::Message(desc) => {
                let message = self.decode_nested(desc, data, depth)?;
                self.merge_message(field, message);
            }
            kind => {
                // Scalars are accepted in packed form whether or not the field is declared as
                // packed.
                let wire_type = kind.wire_type();
                let mut data = data;
                let mut values = Vec::new();
                while !data.is_empty() {
                    let raw = match wire_type {
                        WireType::ThirtyTwoBit => read_fixed32(&mut data)? as u64,
                        WireType::SixtyFourBit => read_fixed64(&mut data)?,
                        _ => decode_varint(&mut data)?,
                    };
                    values.push(convert_raw(&field, wire_type, raw)?);
                }

                tracing::trace!(
                    field = field.full_name(),
                    count = values.len(),
                    "decoded packed run"
                );
                if field.is_list() {
                    if let Value::List(list) = self.get_mut(field) {
                        list.extend(values);
                    }
                } else if let Some(last) = values.pop() {
                    self.set_unchecked(field, last);
                }
            }
        }
        Ok(())
    }

    fn merge_map_entry(
        &mut self,
        field: FieldRef,
        entry_desc: MessageDescriptor,
        mut data: &[u8],
        depth: u32,
    ) -> Result<(), DecodeError> {
        if depth == 0 {
            return Err(DecodeError::RecursionLimitReached);
        }

        let mut entry = self.factory.new_message(entry_desc);
        entry.merge_fields(&mut data, None, depth - 1)?;
        self.insert_map_entry(field, &entry);
        Ok(())
    }

    /// Upserts a decoded map entry message into a map field.
    fn insert_map_entry(&mut self, field: FieldRef, entry: &DynamicMessage) {
        let key_field = entry.desc.map_entry_key_field();
        let value_field = entry.desc.map_entry_value_field();

        let key = MapKey::from_value(entry.get_field(&key_field).into_owned());
        let value = entry.get_field(&value_field).into_owned();
        if let (Some(key), Value::Map(map)) = (key, self.get_mut(field)) {
            map.insert(key, value);
        }
    }

    fn merge_unknown(
        &mut self,
        number: u32,
        wire_type: WireType,
        buf: &mut &[u8],
        depth: u32,
    ) -> Result<(), DecodeError> {
        let field = match wire_type {
            WireType::Varint => UnknownField::Varint(decode_varint(buf)?),
            WireType::ThirtyTwoBit => UnknownField::ThirtyTwoBit(read_fixed32(buf)?),
            WireType::SixtyFourBit => UnknownField::SixtyFourBit(read_fixed64(buf)?),
            WireType::LengthDelimited => {
                UnknownField::LengthDelimited(Bytes::copy_from_slice(read_length_delimited(buf)?))
            }
            WireType::StartGroup => {
                UnknownField::Group(Bytes::copy_from_slice(read_group(buf, number, depth)?))
            }
            WireType::EndGroup => return Err(DecodeError::UnexpectedEndGroup { number }),
        };

        tracing::trace!(
            message_type = self.desc.full_name(),
            number,
            wire_type = ?wire_type,
            "captured unknown field"
        );
        self.unknown.push(number, field);
        Ok(())
    }

    fn decode_nested(
        &self,
        desc: MessageDescriptor,
        mut data: &[u8],
        depth: u32,
    ) -> Result<DynamicMessage, DecodeError> {
        if depth == 0 {
            return Err(DecodeError::RecursionLimitReached);
        }

        match self.factory.message_type(&desc) {
            Some(ty) if !ty.is_dynamic() => ty.decode(data, &self.factory),
            _ => {
                let mut message = self.factory.new_message(desc);
                message.merge_fields(&mut data, None, depth - 1)?;
                Ok(message)
            }
        }
    }

    fn decode_group(
        &self,
        desc: MessageDescriptor,
        number: u32,
        buf: &mut &[u8],
        depth: u32,
    ) -> Result<DynamicMessage, DecodeError> {
        if depth == 0 {
            return Err(DecodeError::RecursionLimitReached);
        }

        match self.factory.message_type(&desc) {
            Some(ty) if !ty.is_dynamic() => {
                // Generated types cannot decode a group in place, so give them its contents.
                let contents = read_group(buf, number, depth)?;
                ty.decode(contents, &self.factory)
            }
            _ => {
                let mut message = self.factory.new_message(desc);
                message.merge_fields(buf, Some(number), depth - 1)?;
                Ok(message)
            }
        }
    }

    fn merge_decoded(&mut self, field: FieldRef, value: Value) {
        if field.is_list() {
            if let Value::List(list) = self.get_mut(field) {
                list.push(value);
            }
        } else {
            self.set_unchecked(field, value);
        }
    }

    fn merge_message(&mut self, field: FieldRef, message: DynamicMessage) {
        if field.is_list() {
            if let Value::List(list) = self.get_mut(field) {
                list.push(Value::Message(message));
            }
        } else if self.has(&field) {
            if let Value::Message(existing) = self.get_mut(field) {
                existing.merge_from(&message);
            }
        } else {
            self.set_unchecked(field, Value::Message(message));
        }
    }
}

/// Converts the payload of a varint or fixed-width field to a value of the field's type.
///
/// The wire type of the payload is not checked against the field's type, but the payload
/// must fit in it.
fn convert_raw(field: &FieldRef, wire_type: WireType, raw: u64) -> Result<Value, DecodeError> {
    let value = match field.kind() {
        Kind::Bool => Value::Bool(raw != 0),
        Kind::Uint32 | Kind::Fixed32 => Value::U32(check_u32(field, raw)?),
        Kind::Int32 => Value::I32(check_i32(field, raw)?),
        Kind::Enum(_) => Value::EnumNumber(check_i32(field, raw)?),
        Kind::Sfixed32 => Value::I32(check_u32(field, raw)? as i32),
        Kind::Sint32 => Value::I32(to_sint32(check_u32(field, raw)?)),
        Kind::Float => Value::F32(f32::from_bits(check_u32(field, raw)?)),
        Kind::Uint64 | Kind::Fixed64 => Value::U64(raw),
        Kind::Int64 | Kind::Sfixed64 => Value::I64(raw as i64),
        Kind::Sint64 => Value::I64(to_sint64(raw)),
        Kind::Double => Value::F64(f64::from_bits(raw)),
        Kind::String | Kind::Bytes | Kind::Message(_) => {
            return Err(unexpected_wire_type(field, wire_type))
        }
    };
    Ok(value)
}

fn check_u32(field: &FieldRef, raw: u64) -> Result<u32, DecodeError> {
    u32::try_from(raw).map_err(|_| DecodeError::NumericOverflow {
        field: field.full_name().to_owned(),
    })
}

/// Negative `int32` values are written as 64-bit varints, so the payload is interpreted as a
/// signed 64-bit value before checking its range.
fn check_i32(field: &FieldRef, raw: u64) -> Result<i32, DecodeError> {
    i32::try_from(raw as i64).map_err(|_| DecodeError::NumericOverflow {
        field: field.full_name().to_owned(),
    })
}

fn unexpected_wire_type(field: &FieldRef, wire_type: WireType) -> DecodeError {
    DecodeError::UnexpectedWireType {
        field: field.full_name().to_owned(),
        wire_type: wire_type as u8,
    }
}

fn read_fixed32(buf: &mut &[u8]) -> Result<u32, DecodeError> {
    if buf.len() < 4 {
        return Err(DecodeError::truncated());
    }
    Ok(buf.get_u32_le())
}

fn read_fixed64(buf: &mut &[u8]) -> Result<u64, DecodeError> {
    if buf.len() < 8 {
        return Err(DecodeError::truncated());
    }
    Ok(buf.get_u64_le())
}

fn read_length_delimited<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let len = decode_varint(buf)?;
    if len > buf.len() as u64 {
        return Err(DecodeError::truncated());
    }
    let (data, rest) = buf.split_at(len as usize);
    *buf = rest;
    Ok(data)
}

/// Reads the contents of a group up to its end-group marker, which is consumed but not
/// included in the returned slice.
fn read_group<'a>(buf: &mut &'a [u8], number: u32, depth: u32) -> Result<&'a [u8], DecodeError> {
    if depth == 0 {
        return Err(DecodeError::RecursionLimitReached);
    }

    let start: &'a [u8] = *buf;
    loop {
        let remaining = buf.len();
        if remaining == 0 {
            return Err(DecodeError::UnterminatedGroup { number });
        }

        let (field_number, wire_type) = decode_key(buf)?;
        match wire_type {
            WireType::EndGroup if field_number == number => {
                return Ok(&start[..start.len() - remaining]);
            }
            WireType::EndGroup => {
                return Err(DecodeError::MismatchedEndGroup {
                    expected: number,
                    found: field_number,
                })
            }
            WireType::Varint => {
                decode_varint(buf)?;
            }
            WireType::ThirtyTwoBit => {
                read_fixed32(buf)?;
            }
            WireType::SixtyFourBit => {
                read_fixed64(buf)?;
            }
            WireType::LengthDelimited => {
                read_length_delimited(buf)?;
            }
            WireType::StartGroup => {
                read_group(buf, field_number, depth - 1)?;
            }
        }
    }
}

fn to_sint32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ (-((value & 1) as i32))
}

fn to_sint64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ (-((value & 1) as i64))
}
