use prost_reflect::{DescriptorPool, ExtensionDescriptor, FileDescriptor, MessageDescriptor};

use super::{
    extension, find_descriptor_by_name_in_file, type_name_from_url, Descriptor, DescriptorKind,
    DescriptorResolver, DescriptorStore, ExtensionPool, ExtensionResolver, FilePool, FileResolver,
    MessageResolver, ResolveError, Resolver,
};
use crate::types::{DynamicTypes, TypePool, TypeResolver};

impl FileResolver for DescriptorPool {
    fn find_file_by_path(&self, path: &str) -> Result<FileDescriptor, ResolveError> {
        self.get_file_by_name(path)
            .ok_or_else(|| ResolveError::not_found(path))
    }
}

impl FilePool for DescriptorPool {
    fn num_files(&self) -> usize {
        self.files().len()
    }

    fn range_files(&self, visit: &mut dyn FnMut(&FileDescriptor) -> bool) {
        for file in self.files() {
            if !visit(&file) {
                break;
            }
        }
    }
}

impl DescriptorResolver for DescriptorPool {
    fn find_descriptor_by_name(&self, name: &str) -> Result<Descriptor, ResolveError> {
        let mut result = None;
        self.range_files(&mut |file| {
            result = find_descriptor_by_name_in_file(file, name);
            result.is_none()
        });
        result.ok_or_else(|| ResolveError::not_found(name))
    }
}

/// Wraps a [`DescriptorStore`] to provide the full [`Resolver`] interface.
///
/// Extension lookups by number are implemented by searching every file in the pool; see
/// [`find_extension_by_number`][super::find_extension_by_number].
#[derive(Debug, Clone, Default)]
pub struct ResolverFromPool<P> {
    pool: P,
}

/// Wraps a [`DescriptorStore`] with a separate [`TypePool`] to provide the full [`Resolver`]
/// interface.
///
/// Descriptor queries are answered by the descriptor store, and
/// [`as_type_resolver`][Resolver::as_type_resolver] returns the type pool. This allows
/// statically-known message types registered in the type pool to be used in place of dynamic
/// messages.
#[derive(Debug, Clone, Default)]
pub struct ResolverWithTypes<P, T> {
    resolver: ResolverFromPool<P>,
    types: T,
}

/// Creates a [`Resolver`] which answers every query using `pool`.
pub fn resolver_from_pool<P>(pool: P) -> ResolverFromPool<P>
where
    P: DescriptorStore,
{
    ResolverFromPool::new(pool)
}

/// Creates a [`Resolver`] which answers descriptor queries using `pool` and type queries using
/// `types`.
pub fn resolver_from_pools<P, T>(pool: P, types: T) -> ResolverWithTypes<P, T>
where
    P: DescriptorStore,
    T: TypePool,
{
    ResolverWithTypes {
        resolver: ResolverFromPool::new(pool),
        types,
    }
}

impl<P> ResolverFromPool<P> {
    /// Creates a new resolver wrapping the given pool.
    pub fn new(pool: P) -> Self {
        ResolverFromPool { pool }
    }

    /// Gets a reference to the wrapped pool.
    pub fn pool(&self) -> &P {
        &self.pool
    }

    /// Consumes the resolver and returns the wrapped pool.
    pub fn into_inner(self) -> P {
        self.pool
    }
}

impl<P> FileResolver for ResolverFromPool<P>
where
    P: FileResolver,
{
    fn find_file_by_path(&self, path: &str) -> Result<FileDescriptor, ResolveError> {
        self.pool.find_file_by_path(path)
    }
}

impl<P> FilePool for ResolverFromPool<P>
where
    P: FilePool,
{
    fn num_files(&self) -> usize {
        self.pool.num_files()
    }

    fn range_files(&self, visit: &mut dyn FnMut(&FileDescriptor) -> bool) {
        self.pool.range_files(visit)
    }

    fn num_files_by_package(&self, package: &str) -> usize {
        self.pool.num_files_by_package(package)
    }

    fn range_files_by_package(&self, package: &str, visit: &mut dyn FnMut(&FileDescriptor) -> bool) {
        self.pool.range_files_by_package(package, visit)
    }
}

impl<P> DescriptorResolver for ResolverFromPool<P>
where
    P: DescriptorResolver,
{
    fn find_descriptor_by_name(&self, name: &str) -> Result<Descriptor, ResolveError> {
        self.pool.find_descriptor_by_name(name)
    }
}

impl<P> ExtensionResolver for ResolverFromPool<P>
where
    P: DescriptorStore,
{
    fn find_extension_by_name(&self, name: &str) -> Result<ExtensionDescriptor, ResolveError> {
        match self.pool.find_descriptor_by_name(name)? {
            Descriptor::Extension(extension) => Ok(extension),
            desc => Err(ResolveError::unexpected_type(
                DescriptorKind::Extension,
                desc,
                None,
            )),
        }
    }

    fn find_extension_by_number(
        &self,
        message: &str,
        number: u32,
    ) -> Result<ExtensionDescriptor, ResolveError> {
        extension::find_extension_by_number(&self.pool, message, number)
            .ok_or_else(|| ResolveError::not_found(format!("extension {} of {}", number, message)))
    }
}

impl<P> ExtensionPool for ResolverFromPool<P>
where
    P: DescriptorStore,
{
    fn range_extensions_by_message(
        &self,
        message: &str,
        visit: &mut dyn FnMut(ExtensionDescriptor) -> bool,
    ) {
        extension::range_extensions_by_message(&self.pool, message, visit)
    }
}

impl<P> MessageResolver for ResolverFromPool<P>
where
    P: DescriptorResolver,
{
    fn find_message_by_name(&self, name: &str) -> Result<MessageDescriptor, ResolveError> {
        match self.pool.find_descriptor_by_name(name)? {
            Descriptor::Message(message) => Ok(message),
            desc => Err(ResolveError::unexpected_type(
                DescriptorKind::Message,
                desc,
                None,
            )),
        }
    }

    fn find_message_by_url(&self, url: &str) -> Result<MessageDescriptor, ResolveError> {
        self.find_message_by_name(type_name_from_url(url))
            .map_err(|err| err.with_url(url))
    }
}

impl<P> Resolver for ResolverFromPool<P>
where
    P: DescriptorStore,
{
    fn as_type_resolver(&self) -> Box<dyn TypeResolver + '_> {
        Box::new(DynamicTypes::new(self))
    }
}

impl<P, T> ResolverWithTypes<P, T> {
    /// Gets the type pool used to answer type queries.
    pub fn as_type_pool(&self) -> &T {
        &self.types
    }

    /// Gets a reference to the wrapped descriptor pool.
    pub fn pool(&self) -> &P {
        self.resolver.pool()
    }
}

impl<P, T> FileResolver for ResolverWithTypes<P, T>
where
    P: FileResolver,
{
    fn find_file_by_path(&self, path: &str) -> Result<FileDescriptor, ResolveError> {
        self.resolver.find_file_by_path(path)
    }
}

impl<P, T> FilePool for ResolverWithTypes<P, T>
where
    P: FilePool,
{
    fn num_files(&self) -> usize {
        self.resolver.num_files()
    }

    fn range_files(&self, visit: &mut dyn FnMut(&FileDescriptor) -> bool) {
        self.resolver.range_files(visit)
    }

    fn num_files_by_package(&self, package: &str) -> usize {
        self.resolver.num_files_by_package(package)
    }

    fn range_files_by_package(&self, package: &str, visit: &mut dyn FnMut(&FileDescriptor) -> bool) {
        self.resolver.range_files_by_package(package, visit)
    }
}

impl<P, T> DescriptorResolver for ResolverWithTypes<P, T>
where
    P: DescriptorResolver,
{
    fn find_descriptor_by_name(&self, name: &str) -> Result<Descriptor, ResolveError> {
        self.resolver.find_descriptor_by_name(name)
    }
}

impl<P, T> ExtensionResolver for ResolverWithTypes<P, T>
where
    P: DescriptorStore,
{
    fn find_extension_by_name(&self, name: &str) -> Result<ExtensionDescriptor, ResolveError> {
        self.resolver.find_extension_by_name(name)
    }

    fn find_extension_by_number(
        &self,
        message: &str,
        number: u32,
    ) -> Result<ExtensionDescriptor, ResolveError> {
        self.resolver.find_extension_by_number(message, number)
    }
}

impl<P, T> ExtensionPool for ResolverWithTypes<P, T>
where
    P: DescriptorStore,
{
    fn range_extensions_by_message(
        &self,
        message: &str,
        visit: &mut dyn FnMut(ExtensionDescriptor) -> bool,
    ) {
        self.resolver.range_extensions_by_message(message, visit)
    }
}

impl<P, T> MessageResolver for ResolverWithTypes<P, T>
where
    P: DescriptorResolver,
{
    fn find_message_by_name(&self, name: &str) -> Result<MessageDescriptor, ResolveError> {
        self.resolver.find_message_by_name(name)
    }

    fn find_message_by_url(&self, url: &str) -> Result<MessageDescriptor, ResolveError> {
        self.resolver.find_message_by_url(url)
    }
}

impl<P, T> Resolver for ResolverWithTypes<P, T>
where
    P: DescriptorStore,
    T: TypePool,
{
    fn as_type_resolver(&self) -> Box<dyn TypeResolver + '_> {
        Box::new(&self.types)
    }
}
