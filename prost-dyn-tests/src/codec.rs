use std::collections::HashMap;

use proptest::{prelude::*, test_runner::TestCaseError};
use prost::Message;
use prost_dyn::{
    dynamic::{DecodeError, EncodeOptions, UnknownField},
    DynamicMessage, MapKey, Value,
};

use crate::{
    arbitrary::{any_message, complex_type},
    message_descriptor, Item, Point,
};

fn roundtrip(message: &DynamicMessage, deterministic: bool) -> Result<(), TestCaseError> {
    let mut bytes = Vec::new();
    message.encode_with(&mut bytes, EncodeOptions::new().deterministic(deterministic));
    prop_assert_eq!(bytes.len(), message.encoded_len());

    let decoded = DynamicMessage::decode(message.descriptor(), &bytes)
        .map_err(|err| TestCaseError::fail(err.to_string()))?;
    prop_assert_eq!(&decoded, message);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn roundtrip_default_mode(message in any_message()) {
        roundtrip(&message, false)?;
    }

    #[test]
    fn roundtrip_deterministic_mode(message in any_message()) {
        roundtrip(&message, true)?;
    }

    #[test]
    fn deterministic_output_is_stable(message in complex_type()) {
        let bytes = message.marshal_deterministic();
        let decoded = DynamicMessage::decode(message.descriptor(), &message.marshal()).unwrap();
        prop_assert_eq!(decoded.marshal_deterministic(), bytes);
    }

    #[test]
    fn unknown_fields_preserve_bytes(message in any_message()) {
        let bytes = message.marshal_deterministic();
        let empty = DynamicMessage::decode(message_descriptor("test.Empty"), &bytes).unwrap();
        prop_assert_eq!(empty.marshal(), bytes);
    }

    #[test]
    fn interop_with_generated_code(x in any::<i32>(), y in any::<i32>()) {
        let point = Point { x, y };

        let dynamic = DynamicMessage::decode(
            message_descriptor("test.Point"),
            &point.encode_to_vec(),
        ).unwrap();
        prop_assert_eq!(dynamic.get_field_by_name("x").unwrap().as_i32(), Some(x));
        prop_assert_eq!(dynamic.get_field_by_name("y").unwrap().as_i32(), Some(y));
        prop_assert_eq!(dynamic.marshal(), point.encode_to_vec());
        prop_assert_eq!(dynamic.transcode_to::<Point>().unwrap(), point);
    }
}

#[test]
fn record_scenario() {
    let mut record = DynamicMessage::new(message_descriptor("test.Record"));
    record.set_field_by_name("id", Value::I32(5));
    record.set_field_by_name(
        "tags",
        Value::List(vec![Value::I32(1), Value::I32(2), Value::I32(3)]),
    );

    let bytes = record.marshal();
    assert_eq!(bytes, [0x08, 0x05, 0x12, 0x03, 0x01, 0x02, 0x03]);
    assert_eq!(
        DynamicMessage::decode(message_descriptor("test.Record"), &bytes).unwrap(),
        record
    );
}

#[test]
fn unknown_field_scenario() {
    let bytes = [0x08, 0x05, 0x98, 0x06, 0x2a];

    let record = DynamicMessage::decode(message_descriptor("test.Record"), &bytes).unwrap();
    assert_eq!(record.get_field_by_name("id").unwrap().as_i32(), Some(5));
    assert_eq!(record.unknown_fields(99), [UnknownField::Varint(42)]);
    assert_eq!(record.marshal(), bytes);
}

#[test]
fn uint32_overflow() {
    let desc = message_descriptor("test.Scalars");
    // uint32 = 2^32
    let err =
        DynamicMessage::decode(desc.clone(), &[0x28, 0x80, 0x80, 0x80, 0x80, 0x10]).unwrap_err();
    assert!(err.is_numeric_overflow());

    // uint32 = 2^32 - 1
    let message = DynamicMessage::decode(desc, &[0x28, 0xff, 0xff, 0xff, 0xff, 0x0f]).unwrap();
    assert_eq!(
        message.get_field_by_name("uint32").unwrap().as_u32(),
        Some(u32::MAX)
    );
}

#[test]
fn sint32_and_sfixed32_overflow() {
    let desc = message_descriptor("test.Scalars");

    let err =
        DynamicMessage::decode(desc.clone(), &[0x38, 0x80, 0x80, 0x80, 0x80, 0x10]).unwrap_err();
    assert!(err.is_numeric_overflow());

    // sfixed32 written as a varint wider than 32 bits
    let err = DynamicMessage::decode(desc, &[0x58, 0x80, 0x80, 0x80, 0x80, 0x10]).unwrap_err();
    assert!(err.is_numeric_overflow());
}

#[test]
fn packed_and_unpacked_repeated_fields() {
    let scalar_arrays = message_descriptor("test.ScalarArrays");
    let unpacked_arrays = message_descriptor("test.UnpackedArrays");

    // int32 = [1, 2] in unpacked form, read as a packed field
    let unpacked = [0x18, 0x01, 0x18, 0x02];
    let message = DynamicMessage::decode(scalar_arrays, &unpacked).unwrap();
    assert_eq!(
        message.get_field_by_name("int32").unwrap().as_list(),
        Some([Value::I32(1), Value::I32(2)].as_slice())
    );
    assert_eq!(message.marshal(), [0x1a, 0x02, 0x01, 0x02]);

    // int32 = [1, 2] in packed form, read as an unpacked field
    let packed = [0x0a, 0x02, 0x01, 0x02];
    let message = DynamicMessage::decode(unpacked_arrays, &packed).unwrap();
    assert_eq!(
        message.get_field_by_name("int32").unwrap().as_list(),
        Some([Value::I32(1), Value::I32(2)].as_slice())
    );
    assert_eq!(message.marshal(), [0x08, 0x01, 0x08, 0x02]);
}

#[test]
fn interleaved_repeated_fields() {
    // int32 = [1], uint32 = [7], int32 = [2, 3]
    let bytes = [0x1a, 0x01, 0x01, 0x2a, 0x01, 0x07, 0x1a, 0x02, 0x02, 0x03];
    let message = DynamicMessage::decode(message_descriptor("test.ScalarArrays"), &bytes).unwrap();
    assert_eq!(
        message.get_field_by_name("int32").unwrap().as_list(),
        Some([Value::I32(1), Value::I32(2), Value::I32(3)].as_slice())
    );
    assert_eq!(
        message.marshal(),
        [0x1a, 0x03, 0x01, 0x02, 0x03, 0x2a, 0x01, 0x07]
    );
}

#[test]
fn group_with_default_values() {
    let legacy = message_descriptor("test2.Legacy");
    // id = 1, item = { x = 3 }
    let bytes = [0x08, 0x01, 0x13, 0x18, 0x03, 0x14];

    let message = DynamicMessage::decode(legacy, &bytes).unwrap();
    let item = message.get_field_by_name("item").unwrap();
    let item = item.as_message().unwrap();
    assert_eq!(item.get_field_by_name("x").unwrap().as_i32(), Some(3));
    assert!(!item.has_field_by_name("label"));
    assert_eq!(message.marshal(), bytes);

    assert_eq!(
        message.get_field_by_name("name").unwrap().as_str(),
        Some("anonymous")
    );
    assert_eq!(message.get_field_by_name("ratio").unwrap().as_f64(), Some(1.5));
    assert_eq!(
        message.get_field_by_name("blob").unwrap().as_bytes().unwrap(),
        &b"\x01\x02"[..]
    );
    assert_eq!(
        message.get_field_by_name("level").unwrap().as_enum_number(),
        Some(2)
    );
}

#[test]
fn proto2_explicit_default_is_written() {
    let mut message = DynamicMessage::new(message_descriptor("test2.Legacy"));
    message.set_field_by_name("id", Value::I32(0));
    message.set_field_by_name("name", Value::String(String::new()));

    assert!(message.has_field_by_name("id"));
    assert_eq!(message.marshal(), [0x08, 0x00, 0x32, 0x00]);
}

#[test]
fn nested_required_fields() {
    let legacy = message_descriptor("test2.Legacy");

    let mut message = DynamicMessage::new(legacy.clone());
    message.set_field_by_name("id", Value::I32(1));
    let child = DynamicMessage::new(legacy.clone());
    message.set_field_by_name("children", Value::List(vec![Value::Message(child)]));

    let err = DynamicMessage::decode(legacy.clone(), &message.marshal()).unwrap_err();
    match err {
        DecodeError::Validation(err) => assert_eq!(err.missing, ["children[0].id"]),
        err => panic!("unexpected error: {}", err),
    }

    let mut partial = DynamicMessage::new(legacy);
    partial.unmarshal_merge(&message.marshal()).unwrap();
    assert_eq!(partial, message);
}

#[test]
fn map_field_values() {
    let desc = message_descriptor("test.ComplexType");
    let mut message = DynamicMessage::new(desc.clone());
    message.set_field_by_name(
        "bool_map",
        Value::Map(HashMap::from([
            (MapKey::Bool(true), Value::I64(-1)),
            (MapKey::Bool(false), Value::I64(0)),
        ])),
    );

    let bytes = message.marshal_deterministic();
    assert_eq!(
        bytes,
        [
            0x1a, 0x04, 0x08, 0x00, 0x10, 0x00, //
            0x1a, 0x0d, 0x08, 0x01, 0x10, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0x01,
        ]
    );
    assert_eq!(DynamicMessage::decode(desc, &bytes).unwrap(), message);
}

#[test]
fn static_type_transcoding() {
    let item = Item {
        x: Some(4),
        label: Some("four".to_owned()),
    };

    let mut message = DynamicMessage::new(message_descriptor("test2.Legacy.Item"));
    message.transcode_from(&item).unwrap();
    assert_eq!(message.get_field_by_name("label").unwrap().as_str(), Some("four"));
    assert_eq!(message.transcode_to::<Item>().unwrap(), item);
}
