use std::collections::BTreeMap;

use prost::{
    bytes::{BufMut, Bytes},
    encoding::{self, WireType},
};

/// The unknown fields of a message, keyed by field number.
///
/// Occurrences of each number are kept in the order they were decoded.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct UnknownFieldSet {
    fields: BTreeMap<u32, Vec<UnknownField>>,
}

/// A field whose number is not declared by the message type, preserved exactly as it was
/// read so it can be written back out unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownField {
    /// A field with the `Varint` wire type.
    Varint(u64),
    /// A field with the `ThirtyTwoBit` wire type.
    ThirtyTwoBit(u32),
    /// A field with the `SixtyFourBit` wire type.
    SixtyFourBit(u64),
    /// A field with the `LengthDelimited` wire type. Holds the payload without its length
    /// prefix.
    LengthDelimited(Bytes),
    /// A field with the group wire type. Holds the encoded contents of the group, without
    /// the start and end markers.
    Group(Bytes),
}

impl UnknownFieldSet {
    pub fn get(&self, number: u32) -> &[UnknownField] {
        self.fields.get(&number).map_or(&[], Vec::as_slice)
    }

    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.fields.keys().copied()
    }

    pub fn push(&mut self, number: u32, field: UnknownField) {
        self.fields.entry(number).or_default().push(field);
    }

    pub fn extend(&mut self, other: &UnknownFieldSet) {
        for (&number, fields) in &other.fields {
            self.fields
                .entry(number)
                .or_default()
                .extend(fields.iter().cloned());
        }
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn encode_raw<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        for (&number, fields) in &self.fields {
            for field in fields {
                field.encode(number, buf);
            }
        }
    }

    pub fn encoded_len(&self) -> usize {
        self.fields
            .iter()
            .map(|(&number, fields)| fields.iter().map(|f| f.encoded_len(number)).sum::<usize>())
            .sum()
    }
}

impl UnknownField {
    /// Gets the wire type this field was read with.
    pub fn wire_type(&self) -> WireType {
        match self {
            UnknownField::Varint(_) => WireType::Varint,
            UnknownField::ThirtyTwoBit(_) => WireType::ThirtyTwoBit,
            UnknownField::SixtyFourBit(_) => WireType::SixtyFourBit,
            UnknownField::LengthDelimited(_) => WireType::LengthDelimited,
            UnknownField::Group(_) => WireType::StartGroup,
        }
    }

    pub(crate) fn encode<B>(&self, number: u32, buf: &mut B)
    where
        B: BufMut,
    {
        encoding::encode_key(number, self.wire_type(), buf);
        match self {
            UnknownField::Varint(value) => encoding::encode_varint(*value, buf),
            UnknownField::ThirtyTwoBit(value) => buf.put_u32_le(*value),
            UnknownField::SixtyFourBit(value) => buf.put_u64_le(*value),
            UnknownField::LengthDelimited(value) => {
                encoding::encode_varint(value.len() as u64, buf);
                buf.put_slice(value);
            }
            UnknownField::Group(value) => {
                buf.put_slice(value);
                encoding::encode_key(number, WireType::EndGroup, buf);
            }
        }
    }

    pub(crate) fn encoded_len(&self, number: u32) -> usize {
        let key_len = encoding::key_len(number);
        match self {
            UnknownField::Varint(value) => key_len + encoding::encoded_len_varint(*value),
            UnknownField::ThirtyTwoBit(_) => key_len + 4,
            UnknownField::SixtyFourBit(_) => key_len + 8,
            UnknownField::LengthDelimited(value) => {
                key_len + encoding::encoded_len_varint(value.len() as u64) + value.len()
            }
            UnknownField::Group(value) => 2 * key_len + value.len(),
        }
    }
}
