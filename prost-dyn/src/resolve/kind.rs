use std::fmt;

use prost_reflect::{
    EnumDescriptor, EnumValueDescriptor, ExtensionDescriptor, FieldDescriptor, FileDescriptor,
    MessageDescriptor, MethodDescriptor, OneofDescriptor, ServiceDescriptor,
};

/// The kind of a [`Descriptor`].
///
/// Unlike the descriptor types of `prost-reflect`, this distinguishes extension fields
/// ([`DescriptorKind::Extension`]) from regular message fields ([`DescriptorKind::Field`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DescriptorKind {
    /// The kind could not be determined, for example because no descriptor was available.
    #[default]
    Unknown,
    /// A protobuf source file.
    File,
    /// A message type.
    Message,
    /// A regular (non-extension) field of a message.
    Field,
    /// A oneof within a message.
    Oneof,
    /// An enum type.
    Enum,
    /// A value of an enum type.
    EnumValue,
    /// An extension field.
    Extension,
    /// A service definition.
    Service,
    /// A method of a service.
    Method,
}

/// Any protobuf descriptor.
///
/// This is a closed union over the descriptor types of `prost-reflect`. It is returned by
/// lookups that may resolve to any kind of element, such as
/// [`DescriptorResolver::find_descriptor_by_name`][super::DescriptorResolver::find_descriptor_by_name].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    /// A file descriptor.
    File(FileDescriptor),
    /// A message descriptor.
    Message(MessageDescriptor),
    /// A field descriptor.
    Field(FieldDescriptor),
    /// A oneof descriptor.
    Oneof(OneofDescriptor),
    /// An enum descriptor.
    Enum(EnumDescriptor),
    /// An enum value descriptor.
    EnumValue(EnumValueDescriptor),
    /// An extension descriptor.
    Extension(ExtensionDescriptor),
    /// A service descriptor.
    Service(ServiceDescriptor),
    /// A method descriptor.
    Method(MethodDescriptor),
}

/// Returns the [`DescriptorKind`] of the given descriptor.
pub fn kind_of(desc: &Descriptor) -> DescriptorKind {
    match desc {
        Descriptor::File(_) => DescriptorKind::File,
        Descriptor::Message(_) => DescriptorKind::Message,
        Descriptor::Field(_) => DescriptorKind::Field,
        Descriptor::Oneof(_) => DescriptorKind::Oneof,
        Descriptor::Enum(_) => DescriptorKind::Enum,
        Descriptor::EnumValue(_) => DescriptorKind::EnumValue,
        Descriptor::Extension(_) => DescriptorKind::Extension,
        Descriptor::Service(_) => DescriptorKind::Service,
        Descriptor::Method(_) => DescriptorKind::Method,
    }
}

impl DescriptorKind {
    /// Gets a description of this kind preceded by the appropriate indefinite article,
    /// for example `"a message"` or `"an enum"`.
    pub fn with_article(&self) -> &'static str {
        match self {
            DescriptorKind::Unknown => "unknown",
            DescriptorKind::File => "a file",
            DescriptorKind::Message => "a message",
            DescriptorKind::Field => "a field",
            DescriptorKind::Oneof => "a oneof",
            DescriptorKind::Enum => "an enum",
            DescriptorKind::EnumValue => "an enum value",
            DescriptorKind::Extension => "an extension",
            DescriptorKind::Service => "a service",
            DescriptorKind::Method => "a method",
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorKind::Unknown => write!(f, "unknown"),
            DescriptorKind::File => write!(f, "file"),
            DescriptorKind::Message => write!(f, "message"),
            DescriptorKind::Field => write!(f, "field"),
            DescriptorKind::Oneof => write!(f, "oneof"),
            DescriptorKind::Enum => write!(f, "enum"),
            DescriptorKind::EnumValue => write!(f, "enum value"),
            DescriptorKind::Extension => write!(f, "extension"),
            DescriptorKind::Service => write!(f, "service"),
            DescriptorKind::Method => write!(f, "method"),
        }
    }
}

impl Descriptor {
    /// Gets the [`DescriptorKind`] of this descriptor.
    pub fn kind(&self) -> DescriptorKind {
        kind_of(self)
    }

    /// Gets the fully-qualified name of this descriptor.
    ///
    /// For files this is the package name, which is the namespace the file's elements are
    /// declared in.
    pub fn full_name(&self) -> &str {
        match self {
            Descriptor::File(file) => file.package_name(),
            Descriptor::Message(message) => message.full_name(),
            Descriptor::Field(field) => field.full_name(),
            Descriptor::Oneof(oneof) => oneof.full_name(),
            Descriptor::Enum(enum_) => enum_.full_name(),
            Descriptor::EnumValue(value) => value.full_name(),
            Descriptor::Extension(extension) => extension.full_name(),
            Descriptor::Service(service) => service.full_name(),
            Descriptor::Method(method) => method.full_name(),
        }
    }

    /// Gets the short name of this descriptor, or the path for files.
    pub fn name(&self) -> &str {
        match self {
            Descriptor::File(file) => file.name(),
            Descriptor::Message(message) => message.name(),
            Descriptor::Field(field) => field.name(),
            Descriptor::Oneof(oneof) => oneof.name(),
            Descriptor::Enum(enum_) => enum_.name(),
            Descriptor::EnumValue(value) => value.name(),
            Descriptor::Extension(extension) => extension.name(),
            Descriptor::Service(service) => service.name(),
            Descriptor::Method(method) => method.name(),
        }
    }

    /// Gets the file this descriptor is declared in.
    pub fn parent_file(&self) -> FileDescriptor {
        match self {
            Descriptor::File(file) => file.clone(),
            Descriptor::Message(message) => message.parent_file(),
            Descriptor::Field(field) => field.parent_file(),
            Descriptor::Oneof(oneof) => oneof.parent_file(),
            Descriptor::Enum(enum_) => enum_.parent_file(),
            Descriptor::EnumValue(value) => value.parent_file(),
            Descriptor::Extension(extension) => extension.parent_file(),
            Descriptor::Service(service) => service.parent_file(),
            Descriptor::Method(method) => method.parent_file(),
        }
    }

    /// Returns the message descriptor if this is a message, or `None` otherwise.
    pub fn as_message(&self) -> Option<&MessageDescriptor> {
        match self {
            Descriptor::Message(message) => Some(message),
            _ => None,
        }
    }

    /// Returns the extension descriptor if this is an extension, or `None` otherwise.
    pub fn as_extension(&self) -> Option<&ExtensionDescriptor> {
        match self {
            Descriptor::Extension(extension) => Some(extension),
            _ => None,
        }
    }

    /// Returns the enum descriptor if this is an enum, or `None` otherwise.
    pub fn as_enum(&self) -> Option<&EnumDescriptor> {
        match self {
            Descriptor::Enum(enum_) => Some(enum_),
            _ => None,
        }
    }
}

macro_rules! impl_from_descriptor {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Descriptor {
                fn from(desc: $ty) -> Self {
                    Descriptor::$variant(desc)
                }
            }
        )*
    };
}

impl_from_descriptor! {
    FileDescriptor => File,
    MessageDescriptor => Message,
    FieldDescriptor => Field,
    OneofDescriptor => Oneof,
    EnumDescriptor => Enum,
    EnumValueDescriptor => EnumValue,
    ExtensionDescriptor => Extension,
    ServiceDescriptor => Service,
    MethodDescriptor => Method,
}
