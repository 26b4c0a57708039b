use std::fmt;

use super::{Descriptor, DescriptorKind};

/// An error returned by resolver lookups and registrations.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The named element is not known to the resolver.
    #[error("{name}: not found")]
    NotFound {
        /// The name, URL or path that was queried.
        name: String,
    },
    /// A descriptor was found, but it was not of the expected kind.
    #[error(transparent)]
    UnexpectedType(#[from] Box<UnexpectedTypeError>),
    /// A file with the same path has already been registered.
    #[error("file {path:?} is already registered")]
    FileAlreadyRegistered {
        /// The path of the file.
        path: String,
    },
    /// A file defines a symbol which is already defined by another registered file.
    #[error("file {file:?} defines {name:?}, which is already defined in {existing_file:?}")]
    NameConflict {
        /// The conflicting fully-qualified name.
        name: String,
        /// The file being registered.
        file: String,
        /// The file which already defines the name.
        existing_file: String,
    },
    /// A file imports another file which could not be found.
    #[error("file {file:?} imports {dependency:?}, which is not registered")]
    MissingDependency {
        /// The file being registered or built.
        file: String,
        /// The path of the missing import.
        dependency: String,
    },
    /// A runtime type with the same name is already registered.
    #[error("type {name:?} is already registered")]
    TypeAlreadyRegistered {
        /// The fully-qualified name of the type, or `message.number` for extensions.
        name: String,
    },
    /// A file descriptor could not be constructed from its raw form.
    #[error("invalid file descriptor")]
    InvalidDescriptor(#[from] prost_reflect::DescriptorError),
}

/// Indicates a descriptor was resolved for a name or URL, but it is of the wrong kind.
///
/// For example, a query may have been expecting a message but the name resolved to an enum.
#[derive(Debug, Clone)]
pub struct UnexpectedTypeError {
    /// The type URL that was queried, if the lookup was by URL.
    pub url: Option<String>,
    /// The name that was queried, if the lookup was by name.
    pub name: Option<String>,
    /// The kind of descriptor that was expected.
    pub expecting: DescriptorKind,
    /// The kind of descriptor that was actually found.
    pub actual: DescriptorKind,
    /// The descriptor that was found, if available.
    pub descriptor: Option<Descriptor>,
}

impl ResolveError {
    /// Creates a [`ResolveError::NotFound`] for the given name.
    pub fn not_found(name: impl Into<String>) -> Self {
        ResolveError::NotFound { name: name.into() }
    }

    /// Creates a [`ResolveError::UnexpectedType`] for a descriptor which was found for a name
    /// or URL but was not of the `expecting` kind.
    ///
    /// If `url` is `None`, the descriptor's full name is reported as the query.
    pub fn unexpected_type(expecting: DescriptorKind, got: Descriptor, url: Option<&str>) -> Self {
        let name = match url {
            Some(_) => None,
            None => Some(got.full_name().to_owned()),
        };
        ResolveError::UnexpectedType(Box::new(UnexpectedTypeError {
            url: url.map(ToOwned::to_owned),
            name,
            expecting,
            actual: got.kind(),
            descriptor: Some(got),
        }))
    }

    /// Returns `true` if this error indicates the queried element does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound { .. })
    }

    /// Returns the [`UnexpectedTypeError`] if this error indicates a descriptor of the wrong
    /// kind was found.
    pub fn as_unexpected_type(&self) -> Option<&UnexpectedTypeError> {
        match self {
            ResolveError::UnexpectedType(err) => Some(&**err),
            _ => None,
        }
    }

    pub(crate) fn with_url(self, url: &str) -> Self {
        match self {
            ResolveError::NotFound { .. } => ResolveError::not_found(url),
            ResolveError::UnexpectedType(mut err) => {
                err.url = Some(url.to_owned());
                err.name = None;
                ResolveError::UnexpectedType(err)
            }
            err => err,
        }
    }
}

impl std::error::Error for UnexpectedTypeError {}

impl fmt::Display for UnexpectedTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (query_kind, query) = match (&self.url, &self.name) {
            (Some(url), _) => ("URL", url.as_str()),
            (None, Some(name)) => ("name", name.as_str()),
            (None, None) => ("name", ""),
        };
        write!(
            f,
            "wrong kind of descriptor for {} {:?}: expected {}, got {}",
            query_kind,
            query,
            self.expecting.with_article(),
            self.actual.with_article()
        )
    }
}
