//! Runtime types for messages, enums and extensions.
//!
//! Where the [`resolve`][crate::resolve] traits locate descriptors, the traits in this module
//! locate the runtime types used to instantiate and decode values. A message type may be
//! [dynamic][DynamicMessageType], backed only by a descriptor, or [static][StaticMessageType],
//! backed by a type generated by `prost`.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    marker::PhantomData,
    ops::Deref,
    sync::Arc,
};

use prost_reflect::{
    EnumDescriptor, EnumValueDescriptor, ExtensionDescriptor, MessageDescriptor, ReflectMessage,
};

use crate::{
    dynamic::{DecodeError, DynamicMessage, FieldRef, MessageFactory, Value},
    resolve::{
        type_name_from_url, Descriptor, DescriptorKind, DescriptorResolver, ExtensionPool,
        ExtensionResolver, MessageResolver, ResolveError,
    },
};

/// The runtime type of a message.
pub trait MessageType: fmt::Debug + Send + Sync {
    /// Gets the descriptor of the message type.
    fn descriptor(&self) -> MessageDescriptor;

    /// Returns `true` if this type is backed only by its descriptor.
    fn is_dynamic(&self) -> bool;

    /// Creates a new, empty message of this type.
    fn new_message(&self, factory: &MessageFactory) -> DynamicMessage {
        factory.new_message(self.descriptor())
    }

    /// Decodes a message of this type from its binary form.
    fn decode(&self, buf: &[u8], factory: &MessageFactory) -> Result<DynamicMessage, DecodeError>;
}

/// A message type backed only by a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicMessageType {
    desc: MessageDescriptor,
}

/// A message type backed by a type generated by `prost`.
///
/// Messages of this type are decoded with the generated code, then transcoded to a
/// [`DynamicMessage`].
pub struct StaticMessageType<T> {
    _marker: PhantomData<fn() -> T>,
}

/// The runtime type of an extension field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionType {
    desc: ExtensionDescriptor,
}

/// The runtime type of an enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    desc: EnumDescriptor,
}

/// Resolves the runtime types of extension fields.
pub trait ExtensionTypeResolver {
    /// Finds the extension type with the given fully-qualified name.
    fn find_extension_type_by_name(&self, name: &str) -> Result<ExtensionType, ResolveError>;

    /// Finds the type of the extension of `message` with the given field number.
    fn find_extension_type_by_number(
        &self,
        message: &str,
        number: u32,
    ) -> Result<ExtensionType, ResolveError>;
}

/// Resolves the runtime types of messages.
pub trait MessageTypeResolver {
    /// Finds the message type with the given fully-qualified name.
    fn find_message_type_by_name(&self, name: &str) -> Result<Arc<dyn MessageType>, ResolveError>;

    /// Finds the message type identified by the given type URL.
    fn find_message_type_by_url(&self, url: &str) -> Result<Arc<dyn MessageType>, ResolveError>;
}

/// Resolves the runtime types of enums.
pub trait EnumTypeResolver {
    /// Finds the enum type with the given fully-qualified name.
    fn find_enum_type_by_name(&self, name: &str) -> Result<EnumType, ResolveError>;
}

/// Resolves the runtime types needed to encode and decode messages: extension types, to
/// recognize extension fields, and message types, for nested and `Any` messages.
pub trait SerializationResolver: ExtensionTypeResolver + MessageTypeResolver {}

impl<T> SerializationResolver for T where T: ExtensionTypeResolver + MessageTypeResolver + ?Sized {}

/// Resolves runtime types of every kind.
pub trait TypeResolver: SerializationResolver + EnumTypeResolver {}

impl<T> TypeResolver for T where T: SerializationResolver + EnumTypeResolver + ?Sized {}

/// A [`TypeResolver`] which also allows iteration over all extension types of a message.
pub trait TypePool: TypeResolver {
    /// Visits the type of every extension of `message`, stopping early if `visit` returns
    /// `false`.
    fn range_extension_types_by_message(
        &self,
        message: &str,
        visit: &mut dyn FnMut(ExtensionType) -> bool,
    );
}

/// A [`TypePool`] of dynamic types, synthesized from the descriptors of a resolver.
#[derive(Debug, Clone)]
pub struct DynamicTypes<R> {
    resolver: R,
}

/// A mutable [`TypePool`].
///
/// Message types registered here may be static, which allows them to be used by a
/// [`MessageFactory`] in place of dynamic types.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    messages: HashMap<String, Arc<dyn MessageType>>,
    enums: HashMap<String, EnumType>,
    extensions: HashMap<String, ExtensionType>,
    extensions_by_message: HashMap<String, BTreeMap<u32, ExtensionType>>,
}

impl DynamicMessageType {
    /// Creates a dynamic message type from its descriptor.
    pub fn new(desc: MessageDescriptor) -> Self {
        DynamicMessageType { desc }
    }
}

impl MessageType for DynamicMessageType {
    fn descriptor(&self) -> MessageDescriptor {
        self.desc.clone()
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn decode(&self, buf: &[u8], factory: &MessageFactory) -> Result<DynamicMessage, DecodeError> {
        let mut message = factory.new_message(self.desc.clone());
        message.unmarshal_merge(buf)?;
        Ok(message)
    }
}

impl<T> StaticMessageType<T> {
    /// Creates the message type for the generated type `T`.
    pub fn new() -> Self {
        StaticMessageType {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for StaticMessageType<T> {
    fn default() -> Self {
        StaticMessageType::new()
    }
}

impl<T> fmt::Debug for StaticMessageType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StaticMessageType")
            .field(&std::any::type_name::<T>())
            .finish()
    }
}

impl<T> MessageType for StaticMessageType<T>
where
    T: ReflectMessage + Default,
{
    fn descriptor(&self) -> MessageDescriptor {
        T::default().descriptor()
    }

    fn is_dynamic(&self) -> bool {
        false
    }

    fn decode(&self, buf: &[u8], factory: &MessageFactory) -> Result<DynamicMessage, DecodeError> {
        let value = T::decode(buf).map_err(DecodeError::Static)?;
        let mut message = factory.new_message(value.descriptor());
        message.transcode_from(&value)?;
        Ok(message)
    }
}

impl ExtensionType {
    /// Creates an extension type from its descriptor.
    pub fn new(desc: ExtensionDescriptor) -> Self {
        ExtensionType { desc }
    }

    /// Gets the descriptor of the extension.
    pub fn descriptor(&self) -> &ExtensionDescriptor {
        &self.desc
    }

    /// Gets the value of the extension in a message where it is not set.
    pub fn default_value(&self) -> Value {
        FieldRef::Extension(self.desc.clone()).default_value()
    }
}

impl EnumType {
    /// Creates an enum type from its descriptor.
    pub fn new(desc: EnumDescriptor) -> Self {
        EnumType { desc }
    }

    /// Gets the descriptor of the enum.
    pub fn descriptor(&self) -> &EnumDescriptor {
        &self.desc
    }

    /// Gets the value with the given number, if it is declared.
    pub fn value(&self, number: i32) -> Option<EnumValueDescriptor> {
        self.desc.get_value(number)
    }
}

impl<R> DynamicTypes<R> {
    /// Creates a type pool which synthesizes dynamic types from `resolver`.
    pub fn new(resolver: R) -> Self {
        DynamicTypes { resolver }
    }
}

impl<R> ExtensionTypeResolver for DynamicTypes<R>
where
    R: Deref,
    R::Target: ExtensionResolver,
{
    fn find_extension_type_by_name(&self, name: &str) -> Result<ExtensionType, ResolveError> {
        self.resolver
            .find_extension_by_name(name)
            .map(ExtensionType::new)
    }

    fn find_extension_type_by_number(
        &self,
        message: &str,
        number: u32,
    ) -> Result<ExtensionType, ResolveError> {
        self.resolver
            .find_extension_by_number(message, number)
            .map(ExtensionType::new)
    }
}

impl<R> MessageTypeResolver for DynamicTypes<R>
where
    R: Deref,
    R::Target: MessageResolver,
{
    fn find_message_type_by_name(&self, name: &str) -> Result<Arc<dyn MessageType>, ResolveError> {
        let desc = self.resolver.find_message_by_name(name)?;
        Ok(Arc::new(DynamicMessageType::new(desc)))
    }

    fn find_message_type_by_url(&self, url: &str) -> Result<Arc<dyn MessageType>, ResolveError> {
        let desc = self.resolver.find_message_by_url(url)?;
        Ok(Arc::new(DynamicMessageType::new(desc)))
    }
}

impl<R> EnumTypeResolver for DynamicTypes<R>
where
    R: Deref,
    R::Target: DescriptorResolver,
{
    fn find_enum_type_by_name(&self, name: &str) -> Result<EnumType, ResolveError> {
        match self.resolver.find_descriptor_by_name(name)? {
            Descriptor::Enum(desc) => Ok(EnumType::new(desc)),
            desc => Err(ResolveError::unexpected_type(DescriptorKind::Enum, desc, None)),
        }
    }
}

impl<R> TypePool for DynamicTypes<R>
where
    R: Deref,
    R::Target: ExtensionPool + MessageResolver + DescriptorResolver,
{
    fn range_extension_types_by_message(
        &self,
        message: &str,
        visit: &mut dyn FnMut(ExtensionType) -> bool,
    ) {
        self.resolver
            .range_extensions_by_message(message, &mut |ext| visit(ExtensionType::new(ext)))
    }
}

impl TypeRegistry {
    /// Creates a new, empty type registry.
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    /// Registers a message type.
    ///
    /// Fails with [`ResolveError::TypeAlreadyRegistered`] if a message type with the same name
    /// is already registered.
    pub fn register_message<T>(&mut self, ty: T) -> Result<(), ResolveError>
    where
        T: MessageType + 'static,
    {
        self.register_message_type(Arc::new(ty))
    }

    /// Registers a shared message type.
    ///
    /// See [`register_message`][Self::register_message].
    pub fn register_message_type(&mut self, ty: Arc<dyn MessageType>) -> Result<(), ResolveError> {
        let name = ty.descriptor().full_name().to_owned();
        if self.messages.contains_key(&name) {
            return Err(ResolveError::TypeAlreadyRegistered { name });
        }

        tracing::debug!(name = %name, dynamic = ty.is_dynamic(), "registered message type");
        self.messages.insert(name, ty);
        Ok(())
    }

    /// Registers an extension type.
    ///
    /// Fails with [`ResolveError::TypeAlreadyRegistered`] if an extension with the same name,
    /// or with the same number for the same message, is already registered.
    pub fn register_extension(&mut self, desc: ExtensionDescriptor) -> Result<(), ResolveError> {
        let name = desc.full_name().to_owned();
        let message = desc.containing_message().full_name().to_owned();
        if self.extensions.contains_key(&name) {
            return Err(ResolveError::TypeAlreadyRegistered { name });
        }
        if self
            .extensions_by_message
            .get(&message)
            .map_or(false, |by_number| by_number.contains_key(&desc.number()))
        {
            return Err(ResolveError::TypeAlreadyRegistered {
                name: format!("extension {} of {}", desc.number(), message),
            });
        }

        tracing::debug!(
            name = %name,
            extendee = %message,
            number = desc.number(),
            "registered extension type"
        );
        let ty = ExtensionType::new(desc);
        self.extensions_by_message
            .entry(message)
            .or_default()
            .insert(ty.desc.number(), ty.clone());
        self.extensions.insert(name, ty);
        Ok(())
    }

    /// Registers an enum type.
    ///
    /// Fails with [`ResolveError::TypeAlreadyRegistered`] if an enum with the same name is
    /// already registered.
    pub fn register_enum(&mut self, desc: EnumDescriptor) -> Result<(), ResolveError> {
        let name = desc.full_name().to_owned();
        if self.enums.contains_key(&name) {
            return Err(ResolveError::TypeAlreadyRegistered { name });
        }

        tracing::debug!(name = %name, "registered enum type");
        self.enums.insert(name, EnumType::new(desc));
        Ok(())
    }
}

impl ExtensionTypeResolver for TypeRegistry {
    fn find_extension_type_by_name(&self, name: &str) -> Result<ExtensionType, ResolveError> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.extensions
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::not_found(name))
    }

    fn find_extension_type_by_number(
        &self,
        message: &str,
        number: u32,
    ) -> Result<ExtensionType, ResolveError> {
        let message = message.strip_prefix('.').unwrap_or(message);
        self.extensions_by_message
            .get(message)
            .and_then(|by_number| by_number.get(&number))
            .cloned()
            .ok_or_else(|| ResolveError::not_found(format!("extension {} of {}", number, message)))
    }
}

impl MessageTypeResolver for TypeRegistry {
    fn find_message_type_by_name(&self, name: &str) -> Result<Arc<dyn MessageType>, ResolveError> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.messages
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::not_found(name))
    }

    fn find_message_type_by_url(&self, url: &str) -> Result<Arc<dyn MessageType>, ResolveError> {
        self.find_message_type_by_name(type_name_from_url(url))
            .map_err(|err| err.with_url(url))
    }
}

impl EnumTypeResolver for TypeRegistry {
    fn find_enum_type_by_name(&self, name: &str) -> Result<EnumType, ResolveError> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.enums
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::not_found(name))
    }
}

impl TypePool for TypeRegistry {
    fn range_extension_types_by_message(
        &self,
        message: &str,
        visit: &mut dyn FnMut(ExtensionType) -> bool,
    ) {
        let message = message.strip_prefix('.').unwrap_or(message);
        if let Some(by_number) = self.extensions_by_message.get(message) {
            for ty in by_number.values() {
                if !visit(ty.clone()) {
                    break;
                }
            }
        }
    }
}

impl<T> ExtensionTypeResolver for &T
where
    T: ExtensionTypeResolver + ?Sized,
{
    fn find_extension_type_by_name(&self, name: &str) -> Result<ExtensionType, ResolveError> {
        (**self).find_extension_type_by_name(name)
    }

    fn find_extension_type_by_number(
        &self,
        message: &str,
        number: u32,
    ) -> Result<ExtensionType, ResolveError> {
        (**self).find_extension_type_by_number(message, number)
    }
}

impl<T> MessageTypeResolver for &T
where
    T: MessageTypeResolver + ?Sized,
{
    fn find_message_type_by_name(&self, name: &str) -> Result<Arc<dyn MessageType>, ResolveError> {
        (**self).find_message_type_by_name(name)
    }

    fn find_message_type_by_url(&self, url: &str) -> Result<Arc<dyn MessageType>, ResolveError> {
        (**self).find_message_type_by_url(url)
    }
}

impl<T> EnumTypeResolver for &T
where
    T: EnumTypeResolver + ?Sized,
{
    fn find_enum_type_by_name(&self, name: &str) -> Result<EnumType, ResolveError> {
        (**self).find_enum_type_by_name(name)
    }
}

impl<T> TypePool for &T
where
    T: TypePool + ?Sized,
{
    fn range_extension_types_by_message(
        &self,
        message: &str,
        visit: &mut dyn FnMut(ExtensionType) -> bool,
    ) {
        (**self).range_extension_types_by_message(message, visit)
    }
}
