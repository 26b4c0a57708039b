//! Composable traits for locating descriptors by path, name, number or type URL.
//!
//! Each trait describes a single capability, so that code can depend on exactly the capability
//! it needs. They are implemented by the static [`DescriptorPool`][prost_reflect::DescriptorPool],
//! the incrementally-built [`Registry`], and the adapters returned by [`resolver_from_pool`] and
//! [`resolver_from_pools`], which upgrade a minimal pool to the full [`Resolver`] trait.

mod build;
mod error;
mod extension;
mod kind;
mod pool;
mod registry;
mod symbol;

pub use self::build::build_file;
pub use self::error::{ResolveError, UnexpectedTypeError};
pub use self::extension::{
    find_extension_by_number, find_extension_by_number_in_file, range_extensions_by_message,
};
pub use self::kind::{kind_of, Descriptor, DescriptorKind};
pub use self::pool::{resolver_from_pool, resolver_from_pools, ResolverFromPool, ResolverWithTypes};
pub use self::registry::Registry;
pub use self::symbol::find_descriptor_by_name_in_file;

use prost_reflect::{ExtensionDescriptor, FileDescriptor, MessageDescriptor};

use crate::types::TypeResolver;

/// Resolves file descriptors by path.
pub trait FileResolver {
    /// Finds the file with the given path.
    ///
    /// Returns [`ResolveError::NotFound`] if no such file is known.
    fn find_file_by_path(&self, path: &str) -> Result<FileDescriptor, ResolveError>;
}

/// A [`FileResolver`] which also allows iteration over the files it knows.
pub trait FilePool: FileResolver {
    /// Gets the number of files in the pool.
    fn num_files(&self) -> usize;

    /// Visits every file in the pool, stopping early if `visit` returns `false`.
    fn range_files(&self, visit: &mut dyn FnMut(&FileDescriptor) -> bool);

    /// Gets the number of files in the pool which declare the given package.
    fn num_files_by_package(&self, package: &str) -> usize {
        let mut count = 0;
        self.range_files_by_package(package, &mut |_| {
            count += 1;
            true
        });
        count
    }

    /// Visits every file in the pool which declares the given package, stopping early if `visit`
    /// returns `false`.
    fn range_files_by_package(&self, package: &str, visit: &mut dyn FnMut(&FileDescriptor) -> bool) {
        self.range_files(&mut |file| file.package_name() != package || visit(file))
    }
}

/// Resolves descriptors of any kind by their fully-qualified name.
pub trait DescriptorResolver {
    /// Finds the element with the given fully-qualified name.
    ///
    /// Returns [`ResolveError::NotFound`] if no such element is known.
    fn find_descriptor_by_name(&self, name: &str) -> Result<Descriptor, ResolveError>;
}

/// A [`FilePool`] which also functions as a [`DescriptorResolver`].
///
/// This is the minimal capability needed to build a full [`Resolver`] with
/// [`resolver_from_pool`].
pub trait DescriptorStore: FilePool + DescriptorResolver {}

impl<T> DescriptorStore for T where T: FilePool + DescriptorResolver + ?Sized {}

/// A [`DescriptorStore`] which allows files to be added after construction.
pub trait DescriptorRegistry: DescriptorStore {
    /// Adds a file, and every element it declares, to the registry.
    ///
    /// Registration fails if the file's imports are not already registered, or if the file
    /// conflicts with the contents of the registry.
    fn register_file(&mut self, file: FileDescriptor) -> Result<(), ResolveError>;
}

/// Resolves extension fields, either by name or by the message they extend and their number.
pub trait ExtensionResolver {
    /// Finds the extension with the given fully-qualified name.
    fn find_extension_by_name(&self, name: &str) -> Result<ExtensionDescriptor, ResolveError>;

    /// Finds the extension of `message` with the given field number.
    fn find_extension_by_number(
        &self,
        message: &str,
        number: u32,
    ) -> Result<ExtensionDescriptor, ResolveError>;
}

/// An [`ExtensionResolver`] which also allows iteration over all extensions of a message.
pub trait ExtensionPool: ExtensionResolver {
    /// Visits every extension of `message`, stopping early if `visit` returns `false`.
    fn range_extensions_by_message(
        &self,
        message: &str,
        visit: &mut dyn FnMut(ExtensionDescriptor) -> bool,
    );
}

/// Resolves message types by name or by type URL.
///
/// A type URL must include the fully-qualified type name as its last path component, as in
/// `type.googleapis.com/google.protobuf.Duration`.
pub trait MessageResolver {
    /// Finds the message type with the given fully-qualified name.
    fn find_message_by_name(&self, name: &str) -> Result<MessageDescriptor, ResolveError>;

    /// Finds the message type identified by the given type URL.
    fn find_message_by_url(&self, url: &str) -> Result<MessageDescriptor, ResolveError>;
}

/// The capabilities needed to resolve the imports and type references of a file when
/// constructing it from its raw [`FileDescriptorProto`][prost_types::FileDescriptorProto].
///
/// See [`build_file`].
pub trait DependencyResolver: FileResolver + DescriptorResolver {}

impl<T> DependencyResolver for T where T: FileResolver + DescriptorResolver + ?Sized {}

/// A comprehensive resolver, able to resolve every kind of descriptor.
pub trait Resolver: DescriptorStore + ExtensionPool + MessageResolver {
    /// Gets a view of this resolver which resolves runtime types rather than descriptors.
    ///
    /// Unless the resolver was built with a separate type pool, the returned types are
    /// dynamic types constructed from this resolver's descriptors.
    fn as_type_resolver(&self) -> Box<dyn TypeResolver + '_>;
}

/// Gets the fully-qualified message name from a type URL, which is everything after the
/// last `/`.
///
/// ```
/// # use prost_dyn::resolve::type_name_from_url;
/// assert_eq!(type_name_from_url("type.googleapis.com/foo.Bar"), "foo.Bar");
/// assert_eq!(type_name_from_url("foo.Bar"), "foo.Bar");
/// ```
pub fn type_name_from_url(url: &str) -> &str {
    match url.rfind('/') {
        Some(pos) => &url[pos + 1..],
        None => url,
    }
}
