use super::Value;

/// An error returned when decoding a message from its binary form.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The input is not well-formed, for example because a varint or length prefix is
    /// truncated or a field key is invalid.
    #[error(transparent)]
    Wire(#[from] prost::DecodeError),
    /// An end-group marker was found outside of any group.
    #[error("unexpected end group tag for field {number}")]
    UnexpectedEndGroup {
        /// The field number of the end-group marker.
        number: u32,
    },
    /// The input ended inside a group.
    #[error("group for field {number} is not terminated")]
    UnterminatedGroup {
        /// The field number of the unterminated group.
        number: u32,
    },
    /// An end-group marker did not match the innermost open group.
    #[error("end group tag for field {found} does not match open group for field {expected}")]
    MismatchedEndGroup {
        /// The field number of the open group.
        expected: u32,
        /// The field number of the end-group marker.
        found: u32,
    },
    /// A field was encoded with a wire type that cannot be used for its type.
    #[error("field {field} cannot be decoded from wire type {wire_type}")]
    UnexpectedWireType {
        /// The fully-qualified name of the field.
        field: String,
        /// The wire type of the field in the input.
        wire_type: u8,
    },
    /// Messages were nested more deeply than the recursion limit.
    #[error("recursion limit reached")]
    RecursionLimitReached,
    /// A numeric value does not fit in the type of its field.
    #[error("value for field {field} is out of range")]
    NumericOverflow {
        /// The fully-qualified name of the field.
        field: String,
    },
    /// The value of a string field is not valid UTF-8.
    #[error("value for field {field} is not valid UTF-8")]
    InvalidUtf8 {
        /// The fully-qualified name of the field.
        field: String,
    },
    /// A statically-typed message failed to decode.
    #[error("failed to decode message with generated type")]
    Static(#[source] prost::DecodeError),
    /// The decoded message is missing required fields.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// An error returned when a message is missing one or more required fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing required fields: {}", .missing.join(", "))]
pub struct ValidationError {
    /// The paths of the missing fields, such as `name` or `items[2].id`.
    pub missing: Vec<String>,
}

/// An error returned when a field cannot be set.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SetFieldError {
    /// The message has no field with the given name or number.
    #[error("field not found")]
    NotFound,
    /// The value is not of the right type for the field.
    #[error("invalid value for field {field}: {value:?}")]
    InvalidType {
        /// The fully-qualified name of the field.
        field: String,
        /// The rejected value.
        value: Value,
    },
}

impl DecodeError {
    /// Returns `true` if decoding failed because a numeric value was out of range for its
    /// field.
    pub fn is_numeric_overflow(&self) -> bool {
        matches!(self, DecodeError::NumericOverflow { .. })
    }

    /// Returns `true` if the message was decoded but is missing required fields.
    pub fn is_validation(&self) -> bool {
        matches!(self, DecodeError::Validation(_))
    }

    pub(crate) fn truncated() -> Self {
        DecodeError::Wire(prost::DecodeError::new("buffer underflow"))
    }
}
