use once_cell::sync::Lazy;
use prost_reflect::{DescriptorPool, MessageDescriptor, ReflectMessage};

#[cfg(test)]
mod codec;
#[cfg(test)]
mod logging;
#[cfg(test)]
mod resolve;
#[cfg(test)]
mod types;

static TEST_POOL: Lazy<DescriptorPool> = Lazy::new(|| {
    let include = concat!(env!("CARGO_MANIFEST_DIR"), "/proto");
    let files = protox::compile(["test.proto", "test2.proto", "other.proto"], [include])
        .expect("failed to compile test protos");
    DescriptorPool::from_file_descriptor_set(files).expect("invalid test protos")
});

pub fn test_pool() -> DescriptorPool {
    TEST_POOL.clone()
}

pub fn message_descriptor(name: &str) -> MessageDescriptor {
    TEST_POOL
        .get_message_by_name(name)
        .unwrap_or_else(|| panic!("message {} not found", name))
}

/// Hand-written equivalent of the code `prost-build` generates for `test.Point`.
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct Point {
    #[prost(int32, tag = "1")]
    pub x: i32,
    #[prost(int32, tag = "2")]
    pub y: i32,
}

impl ReflectMessage for Point {
    fn descriptor(&self) -> MessageDescriptor {
        message_descriptor("test.Point")
    }
}

/// Hand-written equivalent of the code `prost-build` generates for the `test2.Legacy.Item`
/// group.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Item {
    #[prost(int32, optional, tag = "3")]
    pub x: Option<i32>,
    #[prost(string, optional, tag = "4")]
    pub label: Option<String>,
}

impl ReflectMessage for Item {
    fn descriptor(&self) -> MessageDescriptor {
        message_descriptor("test2.Legacy.Item")
    }
}
