use std::collections::HashSet;

use prost_reflect::{DescriptorPool, FileDescriptor};
use prost_types::FileDescriptorProto;

use super::{DependencyResolver, ResolveError};

/// Builds a [`FileDescriptor`] from its raw form, resolving its imports using `resolver`.
///
/// The file and the transitive closure of its imports are added to a new
/// [`DescriptorPool`], so the returned descriptor does not share a pool with the files
/// returned by `resolver`. Fails with [`ResolveError::MissingDependency`] if an import cannot
/// be found, or [`ResolveError::InvalidDescriptor`] if the file is not valid.
pub fn build_file<R>(file: FileDescriptorProto, resolver: &R) -> Result<FileDescriptor, ResolveError>
where
    R: DependencyResolver + ?Sized,
{
    let name = file.name().to_owned();

    let mut pool = DescriptorPool::new();
    let mut visited = HashSet::new();
    for dependency in &file.dependency {
        let dependency = resolver
            .find_file_by_path(dependency)
            .map_err(|err| match err {
                ResolveError::NotFound { .. } => ResolveError::MissingDependency {
                    file: name.clone(),
                    dependency: dependency.clone(),
                },
                err => err,
            })?;
        add_with_dependencies(&mut pool, &mut visited, &dependency)?;
    }

    pool.add_file_descriptor_proto(file)?;
    pool.get_file_by_name(&name)
        .ok_or_else(|| ResolveError::not_found(name))
}

fn add_with_dependencies(
    pool: &mut DescriptorPool,
    visited: &mut HashSet<String>,
    file: &FileDescriptor,
) -> Result<(), ResolveError> {
    if !visited.insert(file.name().to_owned()) {
        return Ok(());
    }

    for dependency in file.dependencies() {
        add_with_dependencies(pool, visited, &dependency)?;
    }

    pool.add_file_descriptor_proto(file.file_descriptor_proto().clone())?;
    Ok(())
}
