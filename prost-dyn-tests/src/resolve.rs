use prost_dyn::{
    global_resolver,
    resolve::{
        find_extension_by_number, range_extensions_by_message, resolver_from_pool, Descriptor,
        DescriptorKind, DescriptorRegistry, DescriptorResolver, ExtensionPool, ExtensionResolver,
        FilePool, FileResolver, MessageResolver, Registry, ResolveError,
    },
};
use prost_reflect::{DescriptorPool, EnumDescriptor};

use crate::test_pool;

fn add_enum(descriptors: &mut Vec<(String, Descriptor)>, enum_: EnumDescriptor) {
    let scope = match enum_.parent_message() {
        Some(message) => message.full_name().to_owned(),
        None => enum_.package_name().to_owned(),
    };
    for value in enum_.values() {
        descriptors.push((format!("{}.{}", scope, value.name()), value.into()));
    }
    descriptors.push((enum_.full_name().to_owned(), enum_.into()));
}

/// Every descriptor in the pool, paired with the name it should be found by.
fn all_descriptors(pool: &DescriptorPool) -> Vec<(String, Descriptor)> {
    let mut descriptors = Vec::new();

    for message in pool.all_messages() {
        for field in message.fields() {
            descriptors.push((field.full_name().to_owned(), field.into()));
        }
        for oneof in message.oneofs() {
            descriptors.push((oneof.full_name().to_owned(), oneof.into()));
        }
        descriptors.push((message.full_name().to_owned(), message.into()));
    }
    for enum_ in pool.all_enums() {
        add_enum(&mut descriptors, enum_);
    }
    for extension in pool.all_extensions() {
        descriptors.push((extension.full_name().to_owned(), extension.into()));
    }
    for service in pool.services() {
        for method in service.methods() {
            descriptors.push((method.full_name().to_owned(), method.into()));
        }
        descriptors.push((service.full_name().to_owned(), service.into()));
    }
    descriptors
}

#[test]
fn resolve_every_descriptor_by_name() {
    let pool = test_pool();
    let registry = Registry::from_pool(&pool).unwrap();

    let descriptors = all_descriptors(&pool);
    assert!(descriptors.len() > 50);
    for (name, expected) in descriptors {
        let found = DescriptorResolver::find_descriptor_by_name(&pool, &name)
            .unwrap_or_else(|err| panic!("{}", err));
        assert_eq!(found, expected, "{}", name);

        let found = registry.find_descriptor_by_name(&name).unwrap();
        assert_eq!(found, expected, "{}", name);

        let dotted = format!(".{}", name);
        assert_eq!(registry.find_descriptor_by_name(&dotted).unwrap(), expected);
        assert_eq!(
            DescriptorResolver::find_descriptor_by_name(&pool, &dotted).unwrap(),
            expected
        );
    }
}

#[test]
fn classify_fields_and_extensions() {
    let pool = test_pool();

    for message in pool.all_messages() {
        for field in message.fields() {
            assert_eq!(Descriptor::from(field).kind(), DescriptorKind::Field);
        }
    }
    for extension in pool.all_extensions() {
        assert_eq!(Descriptor::from(extension).kind(), DescriptorKind::Extension);
    }

    let resolver = resolver_from_pool(pool);
    let kind = |name: &str| resolver.find_descriptor_by_name(name).unwrap().kind();
    assert_eq!(kind("test.Shape.Kind"), DescriptorKind::Enum);
    assert_eq!(kind("test.Shape.POLYGON"), DescriptorKind::EnumValue);
    assert_eq!(kind("test.RED"), DescriptorKind::EnumValue);
    assert_eq!(kind("test.ComplexType.choice"), DescriptorKind::Oneof);
    assert_eq!(kind("test.ComplexType.StringMapEntry"), DescriptorKind::Message);
    assert_eq!(kind("test.Geometry"), DescriptorKind::Service);
    assert_eq!(kind("test.Geometry.Area"), DescriptorKind::Method);
    assert_eq!(kind("test2.Legacy.Item"), DescriptorKind::Message);
    assert_eq!(kind("test2.Legacy.item"), DescriptorKind::Field);
    assert_eq!(kind("test2.Legacy.Scope.scoped"), DescriptorKind::Extension);
    assert_eq!(kind("other.ext.flagged"), DescriptorKind::Extension);
}

#[test]
fn unresolved_names() {
    let resolver = resolver_from_pool(test_pool());

    for name in [
        "test",
        "test.",
        "test.Missing",
        "test.Scalars.missing",
        "test.Color.RED",
        "test.Geometry.Area.input",
        "test2.Legacy.Item.y",
        "other.Wrapper",
        "",
    ] {
        let err = resolver.find_descriptor_by_name(name).unwrap_err();
        assert!(err.is_not_found(), "{}", name);
    }
}

#[test]
fn extensions_are_symmetric() {
    let pool = test_pool();
    let resolver = resolver_from_pool(pool.clone());

    for extension in pool.all_extensions() {
        let message = extension.containing_message();
        let found = find_extension_by_number(&pool, message.full_name(), extension.number());
        assert_eq!(found.as_ref(), Some(&extension));

        let found = resolver
            .find_extension_by_number(message.full_name(), extension.number())
            .unwrap();
        assert_eq!(found, extension);

        let found = resolver.find_extension_by_name(extension.full_name()).unwrap();
        assert_eq!(found, extension);
    }

    assert!(find_extension_by_number(&pool, "test2.Legacy", 199).is_none());
    assert!(find_extension_by_number(&pool, "test.Scalars", 100).is_none());
}

#[test]
fn range_extensions_of_message() {
    let pool = test_pool();

    let mut names = Vec::new();
    range_extensions_by_message(&pool, "test2.Legacy", |extension| {
        names.push(extension.full_name().to_owned());
        true
    });
    assert_eq!(
        names,
        [
            "test2.top_level",
            "test2.nested_ext",
            "test2.Legacy.Scope.scoped",
            "other.ext.flagged",
        ]
    );

    let resolver = resolver_from_pool(Registry::from_pool(&pool).unwrap());
    let mut numbers = Vec::new();
    resolver.range_extensions_by_message(".test2.Legacy", &mut |extension| {
        numbers.push(extension.number());
        numbers.len() < 2
    });
    assert_eq!(numbers, [100, 102]);
}

#[test]
fn message_lookup_checks_kind() {
    let resolver = resolver_from_pool(test_pool());

    let err = resolver.find_message_by_name("test.Color").unwrap_err();
    let unexpected = err.as_unexpected_type().unwrap();
    assert_eq!(unexpected.expecting, DescriptorKind::Message);
    assert_eq!(unexpected.actual, DescriptorKind::Enum);
    assert_eq!(
        unexpected.descriptor.as_ref().map(Descriptor::full_name),
        Some("test.Color")
    );

    let err = resolver
        .find_message_by_url("type.googleapis.com/test.Geometry")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "wrong kind of descriptor for URL \"type.googleapis.com/test.Geometry\": \
         expected a message, got a service"
    );

    let err = resolver.find_extension_by_name("test.Point.x").unwrap_err();
    let unexpected = err.as_unexpected_type().unwrap();
    assert_eq!(unexpected.expecting, DescriptorKind::Extension);
    assert_eq!(unexpected.actual, DescriptorKind::Field);
}

#[test]
fn registry_matches_pool() {
    let pool = test_pool();
    let registry = Registry::from_pool(&pool).unwrap();

    assert_eq!(registry.num_files(), pool.num_files());
    assert_eq!(registry.num_files_by_package("test2"), 1);
    assert_eq!(registry.num_files_by_package("other.ext"), 1);
    assert_eq!(registry.num_files_by_package("other"), 0);

    let mut paths = Vec::new();
    registry.range_files_by_package("test", &mut |file| {
        paths.push(file.name().to_owned());
        true
    });
    assert_eq!(paths, ["test.proto"]);

    for file in pool.files() {
        assert_eq!(registry.find_file_by_path(file.name()).unwrap(), file);
    }
    assert!(registry
        .find_file_by_path("missing.proto")
        .unwrap_err()
        .is_not_found());
}

#[test]
fn registry_rejects_out_of_order_files() {
    let pool = test_pool();
    let mut registry = Registry::new();

    let other = pool.get_file_by_name("other.proto").unwrap();
    let err = registry.register_file(other.clone()).unwrap_err();
    assert!(matches!(
        err,
        ResolveError::MissingDependency { ref file, ref dependency }
            if file == "other.proto" && dependency == "test2.proto"
    ));

    registry
        .register_file(pool.get_file_by_name("test2.proto").unwrap())
        .unwrap();
    registry.register_file(other.clone()).unwrap();

    let err = registry.register_file(other).unwrap_err();
    assert!(matches!(err, ResolveError::FileAlreadyRegistered { .. }));
    assert_eq!(registry.num_files(), 2);
}

#[test]
fn registry_from_raw_files() {
    let pool = test_pool();
    let mut registry = Registry::new();

    for file in pool.files() {
        let built = registry
            .register_file_descriptor_proto(file.file_descriptor_proto().clone())
            .unwrap();
        assert_eq!(built.name(), file.name());
    }

    let resolver = resolver_from_pool(registry);
    let wrapper = resolver.find_message_by_name("other.ext.Wrapper").unwrap();
    let legacy = wrapper.get_field_by_name("legacy").unwrap();
    assert_eq!(
        legacy.kind().as_message().map(|m| m.full_name().to_owned()),
        Some("test2.Legacy".to_owned())
    );
    assert_eq!(
        resolver
            .find_extension_by_number("test2.Legacy", 150)
            .unwrap()
            .full_name(),
        "other.ext.flagged"
    );
}

#[test]
fn global_resolver_has_well_known_types() {
    let resolver = global_resolver();

    assert!(resolver.num_files() > 0);
    let timestamp = resolver
        .find_message_by_url("type.googleapis.com/google.protobuf.Timestamp")
        .unwrap();
    assert_eq!(timestamp.full_name(), "google.protobuf.Timestamp");
    assert!(resolver
        .find_file_by_path("google/protobuf/timestamp.proto")
        .is_ok());
    assert!(resolver.find_message_by_name("test.Scalars").is_err());
}
