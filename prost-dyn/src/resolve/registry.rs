use std::collections::HashMap;

use prost_reflect::{DescriptorPool, FileDescriptor, MessageDescriptor};
use prost_types::FileDescriptorProto;

use super::{
    build_file, Descriptor, DescriptorRegistry, DescriptorResolver, FilePool, FileResolver,
    ResolveError,
};

/// A mutable collection of files, indexed by path, package and fully-qualified name.
///
/// Files may be added after construction, but only once all of their imports have been added,
/// and only if they do not redefine any name already defined by another file.
///
/// Files are visited by [`FilePool::range_files`] in the order they were registered.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    files: Vec<FileDescriptor>,
    files_by_path: HashMap<String, usize>,
    files_by_package: HashMap<String, Vec<usize>>,
    symbols: HashMap<String, Descriptor>,
}

impl Registry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Creates a registry containing every file in the given pool.
    pub fn from_pool(pool: &DescriptorPool) -> Result<Self, ResolveError> {
        let mut registry = Registry::new();
        // The files of a pool are always ordered so that imports come first.
        for file in pool.files() {
            registry.register_file(file)?;
        }
        Ok(registry)
    }

    /// Builds a file from its raw form, resolving imports against this registry, and registers
    /// it.
    ///
    /// Returns the newly built file descriptor.
    pub fn register_file_descriptor_proto(
        &mut self,
        file: FileDescriptorProto,
    ) -> Result<FileDescriptor, ResolveError> {
        let file = build_file(file, self)?;
        self.register_file(file.clone())?;
        Ok(file)
    }

    /// Gets an iterator over the registered files, in registration order.
    pub fn files(&self) -> impl ExactSizeIterator<Item = &FileDescriptor> + '_ {
        self.files.iter()
    }

    fn check_file(&self, file: &FileDescriptor) -> Result<Vec<(String, Descriptor)>, ResolveError> {
        if self.files_by_path.contains_key(file.name()) {
            return Err(ResolveError::FileAlreadyRegistered {
                path: file.name().to_owned(),
            });
        }

        for dependency in file.dependencies() {
            if !self.files_by_path.contains_key(dependency.name()) {
                return Err(ResolveError::MissingDependency {
                    file: file.name().to_owned(),
                    dependency: dependency.name().to_owned(),
                });
            }
        }

        let mut symbols = Vec::new();
        collect_file_symbols(file, &mut symbols);
        for (name, _) in &symbols {
            if let Some(existing) = self.symbols.get(name) {
                return Err(ResolveError::NameConflict {
                    name: name.clone(),
                    file: file.name().to_owned(),
                    existing_file: existing.parent_file().name().to_owned(),
                });
            }
        }
        Ok(symbols)
    }
}

impl FileResolver for Registry {
    fn find_file_by_path(&self, path: &str) -> Result<FileDescriptor, ResolveError> {
        match self.files_by_path.get(path) {
            Some(&index) => Ok(self.files[index].clone()),
            None => Err(ResolveError::not_found(path)),
        }
    }
}

impl FilePool for Registry {
    fn num_files(&self) -> usize {
        self.files.len()
    }

    fn range_files(&self, visit: &mut dyn FnMut(&FileDescriptor) -> bool) {
        for file in &self.files {
            if !visit(file) {
                break;
            }
        }
    }

    fn num_files_by_package(&self, package: &str) -> usize {
        self.files_by_package.get(package).map_or(0, Vec::len)
    }

    fn range_files_by_package(&self, package: &str, visit: &mut dyn FnMut(&FileDescriptor) -> bool) {
        if let Some(indices) = self.files_by_package.get(package) {
            for &index in indices {
                if !visit(&self.files[index]) {
                    break;
                }
            }
        }
    }
}

impl DescriptorResolver for Registry {
    fn find_descriptor_by_name(&self, name: &str) -> Result<Descriptor, ResolveError> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.symbols
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::not_found(name))
    }
}

impl DescriptorRegistry for Registry {
    fn register_file(&mut self, file: FileDescriptor) -> Result<(), ResolveError> {
        let symbols = self.check_file(&file)?;

        let index = self.files.len();
        self.files_by_path.insert(file.name().to_owned(), index);
        self.files_by_package
            .entry(file.package_name().to_owned())
            .or_default()
            .push(index);
        let num_symbols = symbols.len();
        self.symbols.extend(symbols);

        tracing::debug!(
            file = file.name(),
            package = file.package_name(),
            symbols = num_symbols,
            "registered file"
        );
        self.files.push(file);
        Ok(())
    }
}

fn collect_file_symbols(file: &FileDescriptor, symbols: &mut Vec<(String, Descriptor)>) {
    for message in file.messages() {
        collect_message_symbols(message, symbols);
    }
    for enum_ in file.enums() {
        for value in enum_.values() {
            // Enum values are scoped to the namespace enclosing their enum.
            let name = match file.package_name() {
                "" => value.name().to_owned(),
                package => format!("{}.{}", package, value.name()),
            };
            symbols.push((name, Descriptor::EnumValue(value)));
        }
        symbols.push((enum_.full_name().to_owned(), Descriptor::Enum(enum_)));
    }
    for extension in file.extensions() {
        symbols.push((
            extension.full_name().to_owned(),
            Descriptor::Extension(extension),
        ));
    }
    for service in file.services() {
        for method in service.methods() {
            symbols.push((method.full_name().to_owned(), Descriptor::Method(method)));
        }
        symbols.push((service.full_name().to_owned(), Descriptor::Service(service)));
    }
}

fn collect_message_symbols(message: MessageDescriptor, symbols: &mut Vec<(String, Descriptor)>) {
    for field in message.fields() {
        symbols.push((field.full_name().to_owned(), Descriptor::Field(field)));
    }
    for oneof in message.oneofs() {
        symbols.push((oneof.full_name().to_owned(), Descriptor::Oneof(oneof)));
    }
    for enum_ in message.child_enums() {
        for value in enum_.values() {
            let name = format!("{}.{}", message.full_name(), value.name());
            symbols.push((name, Descriptor::EnumValue(value)));
        }
        symbols.push((enum_.full_name().to_owned(), Descriptor::Enum(enum_)));
    }
    for extension in message.child_extensions() {
        symbols.push((
            extension.full_name().to_owned(),
            Descriptor::Extension(extension),
        ));
    }
    for nested in message.child_messages() {
        collect_message_symbols(nested, symbols);
    }
    symbols.push((message.full_name().to_owned(), Descriptor::Message(message)));
}
