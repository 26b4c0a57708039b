use prost_dyn::{
    dynamic::{DecodeError, UnknownField},
    resolve::{
        resolver_from_pool, resolver_from_pools, DescriptorKind, MessageResolver, ResolveError,
        Resolver,
    },
    types::{
        DynamicMessageType, DynamicTypes, EnumTypeResolver, ExtensionTypeResolver, MessageType,
        MessageTypeResolver, SerializationResolver, StaticMessageType, TypePool, TypeRegistry,
    },
    DynamicMessage, MessageFactory, Value,
};
use prost_reflect::ExtensionDescriptor;

use crate::{message_descriptor, test_pool, Item, Point};

fn extension(name: &str) -> ExtensionDescriptor {
    test_pool()
        .get_extension_by_name(name)
        .unwrap_or_else(|| panic!("extension {} not found", name))
}

fn point(x: i32, y: i32) -> Value {
    let mut point = DynamicMessage::new(message_descriptor("test.Point"));
    point.set_field_by_name("x", Value::I32(x));
    point.set_field_by_name("y", Value::I32(y));
    Value::Message(point)
}

fn shape() -> DynamicMessage {
    let mut shape = DynamicMessage::new(message_descriptor("test.Shape"));
    shape.set_field_by_name("name", Value::String("triangle".to_owned()));
    shape.set_field_by_name(
        "points",
        Value::List(vec![point(1, 2), point(3, -4), point(-5, 6)]),
    );
    shape.set_field_by_name("center", point(-1, 4));
    shape.set_field_by_name("kind", Value::EnumNumber(1));
    shape
}

fn known_types() -> TypeRegistry {
    let mut types = TypeRegistry::new();
    types
        .register_message(StaticMessageType::<Point>::new())
        .unwrap();
    types.register_message(StaticMessageType::<Item>::new()).unwrap();
    types
}

#[test]
fn dynamic_types_from_resolver() {
    let resolver = resolver_from_pool(test_pool());
    let types = resolver.as_type_resolver();

    let ty = types
        .find_message_type_by_url("type.googleapis.com/test.Shape")
        .unwrap();
    assert!(ty.is_dynamic());
    assert_eq!(ty.descriptor().full_name(), "test.Shape");
    let message = ty.new_message(&MessageFactory::new());
    assert_eq!(message.descriptor().full_name(), "test.Shape");
    assert_eq!(message.marshal(), b"");

    let color = types.find_enum_type_by_name("test.Color").unwrap();
    assert_eq!(color.value(1).unwrap().name(), "RED");
    assert!(color.value(5).is_none());

    let err = types.find_enum_type_by_name("test.Point").unwrap_err();
    let unexpected = err.as_unexpected_type().unwrap();
    assert_eq!(unexpected.expecting, DescriptorKind::Enum);
    assert_eq!(unexpected.actual, DescriptorKind::Message);

    let flagged = types
        .find_extension_type_by_number("test2.Legacy", 150)
        .unwrap();
    assert_eq!(flagged.descriptor().full_name(), "other.ext.flagged");
    assert!(types
        .find_extension_type_by_number("test2.Legacy", 151)
        .unwrap_err()
        .is_not_found());
}

#[test]
fn extension_type_defaults() {
    let resolver = resolver_from_pool(test_pool());
    let types = DynamicTypes::new(&resolver);

    let mut defaults = Vec::new();
    types.range_extension_types_by_message("test2.Legacy", &mut |ty| {
        defaults.push((ty.descriptor().number(), ty.default_value()));
        true
    });
    assert_eq!(
        defaults,
        [
            (100, Value::I32(0)),
            (102, Value::List(vec![])),
            (101, Value::String(String::new())),
            (150, Value::Bool(false)),
        ]
    );
}

#[test]
fn type_registry() {
    let mut registry = known_types();
    registry
        .register_message(DynamicMessageType::new(message_descriptor("test.Shape")))
        .unwrap();

    let err = registry
        .register_message(DynamicMessageType::new(message_descriptor("test.Point")))
        .unwrap_err();
    assert!(matches!(
        err,
        ResolveError::TypeAlreadyRegistered { ref name } if name == "test.Point"
    ));

    let point = registry
        .find_message_type_by_url("type.googleapis.com/test.Point")
        .unwrap();
    assert!(!point.is_dynamic());
    assert_eq!(point.descriptor(), message_descriptor("test.Point"));
    assert!(registry
        .find_message_type_by_name(".test.Shape")
        .unwrap()
        .is_dynamic());
    assert!(registry
        .find_message_type_by_name("test.Record")
        .unwrap_err()
        .is_not_found());

    let level = test_pool().get_enum_by_name("test2.Level").unwrap();
    registry.register_enum(level.clone()).unwrap();
    assert!(registry.register_enum(level).is_err());

    let level = registry.find_enum_type_by_name("test2.Level").unwrap();
    assert_eq!(level.value(2).unwrap().name(), "HIGH");
    assert!(level.value(0).is_none());
    assert!(registry
        .find_enum_type_by_name("test.Color")
        .unwrap_err()
        .is_not_found());
}

#[test]
fn type_registry_extensions() {
    let mut registry = TypeRegistry::new();
    let mut extensions: Vec<_> = test_pool().all_extensions().collect();
    extensions.reverse();
    for extension in &extensions {
        registry.register_extension(extension.clone()).unwrap();
    }

    let err = registry
        .register_extension(extension("test2.top_level"))
        .unwrap_err();
    assert!(matches!(
        err,
        ResolveError::TypeAlreadyRegistered { ref name } if name == "test2.top_level"
    ));

    let mut numbers = Vec::new();
    registry.range_extension_types_by_message(".test2.Legacy", &mut |ty| {
        numbers.push(ty.descriptor().number());
        true
    });
    assert_eq!(numbers, [100, 101, 102, 150]);

    let scoped = registry
        .find_extension_type_by_name("test2.Legacy.Scope.scoped")
        .unwrap();
    assert_eq!(scoped.descriptor().number(), 101);
    assert_eq!(
        registry
            .find_extension_type_by_number("test2.Legacy", 101)
            .unwrap(),
        scoped
    );
    assert!(registry
        .find_extension_type_by_number("test2.Legacy", 103)
        .unwrap_err()
        .is_not_found());
}

fn legacy_types<R>(types: &R) -> (String, String)
where
    R: SerializationResolver + ?Sized,
{
    let message = types
        .find_message_type_by_url("type.googleapis.com/test2.Legacy")
        .unwrap();
    let extension = types
        .find_extension_type_by_number("test2.Legacy", 150)
        .unwrap();
    (
        message.descriptor().full_name().to_owned(),
        extension.descriptor().full_name().to_owned(),
    )
}

#[test]
fn serialization_resolvers() {
    let expected = ("test2.Legacy".to_owned(), "other.ext.flagged".to_owned());

    let resolver = resolver_from_pool(test_pool());
    let types = resolver.as_type_resolver();
    assert_eq!(legacy_types(&*types), expected);

    let mut registry = TypeRegistry::new();
    registry
        .register_message(DynamicMessageType::new(message_descriptor("test2.Legacy")))
        .unwrap();
    registry
        .register_extension(extension("other.ext.flagged"))
        .unwrap();
    let registry: &dyn SerializationResolver = &registry;
    assert_eq!(legacy_types(registry), expected);
}

#[test]
fn resolver_with_separate_types() {
    let resolver = resolver_from_pools(test_pool(), known_types());

    let point = resolver
        .as_type_resolver()
        .find_message_type_by_name("test.Point")
        .unwrap();
    assert!(!point.is_dynamic());
    assert!(resolver
        .as_type_resolver()
        .find_message_type_by_name("test.Shape")
        .unwrap_err()
        .is_not_found());

    assert_eq!(
        resolver.find_message_by_name("test.Shape").unwrap(),
        message_descriptor("test.Shape")
    );
    let item = resolver
        .as_type_pool()
        .find_message_type_by_name("test2.Legacy.Item")
        .unwrap();
    assert_eq!(item.descriptor().name(), "Item");
}

#[test]
fn decode_with_known_types() {
    let shape = shape();
    let bytes = shape.marshal();

    let factory = MessageFactory::new().with_known_types(known_types());
    let mut decoded = factory.new_message(message_descriptor("test.Shape"));
    decoded.unmarshal(&bytes).unwrap();
    assert_eq!(decoded, shape);
    assert_eq!(decoded.marshal(), bytes);

    let center = decoded.get_field_by_name("center").unwrap();
    let center = center.as_message().unwrap();
    assert_eq!(center.get_field_by_name("y").unwrap().as_i32(), Some(4));
    assert_eq!(center.transcode_to::<Point>().unwrap(), Point { x: -1, y: 4 });
}

#[test]
fn decode_group_with_known_type() {
    // id = 1, item = { x = 3, label = "hi" }
    let bytes = [0x08, 0x01, 0x13, 0x18, 0x03, 0x22, 0x02, b'h', b'i', 0x14];
    let legacy = message_descriptor("test2.Legacy");

    let factory = MessageFactory::new().with_known_types(known_types());
    let mut decoded = factory.new_message(legacy.clone());
    decoded.unmarshal(&bytes).unwrap();

    assert_eq!(decoded, DynamicMessage::decode(legacy, &bytes).unwrap());
    let item = decoded.get_field_by_name("item").unwrap();
    assert_eq!(
        item.as_message().unwrap().transcode_to::<Item>().unwrap(),
        Item {
            x: Some(3),
            label: Some("hi".to_owned()),
        }
    );
    assert_eq!(decoded.marshal(), bytes);
}

#[test]
fn known_type_decode_error() {
    // center = { field 1 as an empty length-delimited value }
    let bytes = [0x1a, 0x02, 0x0a, 0x00];

    let factory = MessageFactory::new().with_known_types(known_types());
    let mut decoded = factory.new_message(message_descriptor("test.Shape"));
    let err = decoded.unmarshal(&bytes).unwrap_err();
    assert!(matches!(err, DecodeError::Static(_)), "{:?}", err);
}

#[test]
fn factory_resolves_extensions_from_other_files() {
    // id = 1, flagged = true
    let bytes = [0x08, 0x01, 0xb0, 0x09, 0x01];
    let legacy = message_descriptor("test2.Legacy");
    let flagged = extension("other.ext.flagged");

    let message = DynamicMessage::decode(legacy.clone(), &bytes).unwrap();
    assert!(!message.has_extension(&flagged));
    assert_eq!(message.unknown_fields(150), [UnknownField::Varint(1)]);

    let factory = MessageFactory::new().with_extension_resolver(resolver_from_pool(test_pool()));
    let mut message = factory.new_message(legacy);
    message.unmarshal(&bytes).unwrap();
    assert!(message.has_extension(&flagged));
    assert_eq!(message.get_extension(&flagged).as_bool(), Some(true));
    assert!(message.unknown_fields(150).is_empty());
    assert_eq!(message.marshal(), bytes);
}
