use prost_reflect::{EnumDescriptor, FileDescriptor, MessageDescriptor};

use super::Descriptor;

/// Searches the given file for the element with the given fully-qualified name, returning
/// `None` if no element with that name belongs to the file.
///
/// This does not perform a brute-force search of every element. The name is split into its
/// components and the descriptor hierarchy is descended one component at a time. If the name
/// does not start with the file's package, `None` is returned without looking at the contents
/// of the file, so this is cheap to call for every file in a pool.
///
/// It can be used to implement [`DescriptorResolver`][super::DescriptorResolver] for a pool
/// which does not want to maintain an index of every name.
pub fn find_descriptor_by_name_in_file(file: &FileDescriptor, name: &str) -> Option<Descriptor> {
    let name = name.strip_prefix('.').unwrap_or(name);
    let package = file.package_name();
    let relative = if package.is_empty() {
        name
    } else {
        name.strip_prefix(package)?.strip_prefix('.')?
    };

    let parts: Vec<&str> = relative.split('.').collect();
    find_in_file(file, &parts)
}

fn find_in_file(file: &FileDescriptor, parts: &[&str]) -> Option<Descriptor> {
    match parts {
        [] => None,
        [name] => {
            if let Some(message) = file.messages().find(|m| m.name() == *name) {
                return Some(Descriptor::Message(message));
            }
            if let Some(enum_) = file.enums().find(|e| e.name() == *name) {
                return Some(Descriptor::Enum(enum_));
            }
            if let Some(extension) = file.extensions().find(|e| e.name() == *name) {
                return Some(Descriptor::Extension(extension));
            }
            if let Some(service) = file.services().find(|s| s.name() == *name) {
                return Some(Descriptor::Service(service));
            }
            // Enum values are scoped to the namespace enclosing their enum.
            find_enum_value(file.enums(), name)
        }
        [first, rest @ ..] => {
            if let [method] = rest {
                if let Some(service) = file.services().find(|s| s.name() == *first) {
                    return service
                        .methods()
                        .find(|m| m.name() == *method)
                        .map(Descriptor::Method);
                }
            }

            let message = file.messages().find(|m| m.name() == *first)?;
            find_in_message(&message, rest)
        }
    }
}

fn find_in_message(message: &MessageDescriptor, parts: &[&str]) -> Option<Descriptor> {
    match parts {
        [] => None,
        [name] => {
            if let Some(field) = message.get_field_by_name(name) {
                return Some(Descriptor::Field(field));
            }
            if let Some(oneof) = message.oneofs().find(|o| o.name() == *name) {
                return Some(Descriptor::Oneof(oneof));
            }
            if let Some(nested) = message.child_messages().find(|m| m.name() == *name) {
                return Some(Descriptor::Message(nested));
            }
            if let Some(enum_) = message.child_enums().find(|e| e.name() == *name) {
                return Some(Descriptor::Enum(enum_));
            }
            if let Some(extension) = message.child_extensions().find(|e| e.name() == *name) {
                return Some(Descriptor::Extension(extension));
            }
            find_enum_value(message.child_enums(), name)
        }
        [first, rest @ ..] => {
            let nested = message.child_messages().find(|m| m.name() == *first)?;
            find_in_message(&nested, rest)
        }
    }
}

fn find_enum_value(
    mut enums: impl Iterator<Item = EnumDescriptor>,
    name: &str,
) -> Option<Descriptor> {
    enums.find_map(|enum_| enum_.get_value_by_name(name).map(Descriptor::EnumValue))
}
