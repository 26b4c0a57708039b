use std::{fmt, sync::Arc};

use prost_reflect::{ExtensionDescriptor, MessageDescriptor};

use super::DynamicMessage;
use crate::{
    resolve::ExtensionResolver,
    types::{MessageType, MessageTypeResolver},
};

/// Creates messages, and controls how their fields are interpreted when decoding.
///
/// A factory carries two optional collaborators:
///
/// * an extension resolver, consulted when decoding a field number which is not declared by
///   the message type. Without one, such fields are kept as unknown fields.
/// * a set of known message types, consulted when decoding a nested message. A registered
///   static type decodes nested messages with its generated code. Without one, nested messages
///   are always decoded dynamically.
///
/// Every message created by a factory, including nested messages created while decoding,
/// shares the factory. Cloning a factory is cheap.
#[derive(Clone, Default)]
pub struct MessageFactory {
    extensions: Option<Arc<dyn ExtensionResolver + Send + Sync>>,
    known_types: Option<Arc<dyn MessageTypeResolver + Send + Sync>>,
}

impl MessageFactory {
    /// Creates a factory with no extension resolver and no known types.
    pub fn new() -> Self {
        MessageFactory::default()
    }

    /// Sets the resolver used to recognize extension fields when decoding.
    pub fn with_extension_resolver<R>(mut self, resolver: R) -> Self
    where
        R: ExtensionResolver + Send + Sync + 'static,
    {
        self.extensions = Some(Arc::new(resolver));
        self
    }

    /// Sets the resolver used to find the runtime types of nested messages when decoding.
    pub fn with_known_types<T>(mut self, types: T) -> Self
    where
        T: MessageTypeResolver + Send + Sync + 'static,
    {
        self.known_types = Some(Arc::new(types));
        self
    }

    /// Creates a new, empty message of the given type which uses this factory.
    pub fn new_message(&self, desc: MessageDescriptor) -> DynamicMessage {
        DynamicMessage::new_with_factory(desc, self.clone())
    }

    /// Gets the extension resolver, if one is set.
    pub fn extension_resolver(&self) -> Option<&(dyn ExtensionResolver + Send + Sync)> {
        self.extensions.as_deref()
    }

    /// Gets the known type registered for the given message, if any.
    pub fn message_type(&self, desc: &MessageDescriptor) -> Option<Arc<dyn MessageType>> {
        let known_types = self.known_types.as_ref()?;
        known_types
            .find_message_type_by_name(desc.full_name())
            .ok()
            .filter(|ty| ty.descriptor().full_name() == desc.full_name())
    }

    /// Finds the extension of `message` with the given number using the extension resolver.
    ///
    /// Returns `None` if there is no resolver, or it does not know the extension.
    pub fn find_extension(
        &self,
        message: &MessageDescriptor,
        number: u32,
    ) -> Option<ExtensionDescriptor> {
        let extensions = self.extensions.as_ref()?;
        extensions
            .find_extension_by_number(message.full_name(), number)
            .ok()
    }
}

impl fmt::Debug for MessageFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageFactory")
            .field("extensions", &self.extensions.is_some())
            .field("known_types", &self.known_types.is_some())
            .finish()
    }
}
