use prost_reflect::{ExtensionDescriptor, FileDescriptor, MessageDescriptor};

use super::FilePool;

/// Searches every file in the pool for an extension of `message` with the given field number.
///
/// This performs a linear search through all files and extensions in the pool. Callers which
/// need to perform many lookups should build their own index instead. Returns `None` if no file
/// declares the extension.
pub fn find_extension_by_number<P>(
    pool: &P,
    message: &str,
    number: u32,
) -> Option<ExtensionDescriptor>
where
    P: FilePool + ?Sized,
{
    let mut result = None;
    pool.range_files(&mut |file| {
        result = find_extension_by_number_in_file(file, message, number);
        result.is_none()
    });
    result
}

/// Searches all extensions declared in the given file, at the top level or nested within any
/// message, for an extension of `message` with the given field number.
///
/// Returns `None` if the extension is not declared in this file.
pub fn find_extension_by_number_in_file(
    file: &FileDescriptor,
    message: &str,
    number: u32,
) -> Option<ExtensionDescriptor> {
    let message = message.strip_prefix('.').unwrap_or(message);
    find_in_scope(
        file.extensions(),
        file.messages(),
        &|ext| ext.number() == number && ext.containing_message().full_name() == message,
    )
}

/// Visits every extension in the pool which extends `message`.
///
/// Files are visited in pool order, and within each file extensions declared in a scope are
/// visited before those declared in its nested messages. Iteration stops early if `visit`
/// returns `false`.
pub fn range_extensions_by_message<P, F>(pool: &P, message: &str, mut visit: F)
where
    P: FilePool + ?Sized,
    F: FnMut(ExtensionDescriptor) -> bool,
{
    let message = message.strip_prefix('.').unwrap_or(message);
    pool.range_files(&mut |file| {
        range_in_scope(file.extensions(), file.messages(), message, &mut visit)
    });
}

fn find_in_scope(
    mut extensions: impl Iterator<Item = ExtensionDescriptor>,
    messages: impl Iterator<Item = MessageDescriptor>,
    matches: &dyn Fn(&ExtensionDescriptor) -> bool,
) -> Option<ExtensionDescriptor> {
    if let Some(extension) = extensions.find(|ext| matches(ext)) {
        return Some(extension);
    }

    for nested in messages {
        if let Some(extension) =
            find_in_scope(nested.child_extensions(), nested.child_messages(), matches)
        {
            return Some(extension);
        }
    }
    None
}

fn range_in_scope(
    extensions: impl Iterator<Item = ExtensionDescriptor>,
    messages: impl Iterator<Item = MessageDescriptor>,
    message: &str,
    visit: &mut dyn FnMut(ExtensionDescriptor) -> bool,
) -> bool {
    for extension in extensions {
        if extension.containing_message().full_name() == message && !visit(extension) {
            return false;
        }
    }

    for nested in messages {
        if !range_in_scope(
            nested.child_extensions(),
            nested.child_messages(),
            message,
            visit,
        ) {
            return false;
        }
    }
    true
}
