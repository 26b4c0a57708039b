use std::{
    io,
    sync::{Arc, Mutex},
};

use prost_dyn::{
    resolve::{DescriptorRegistry, Registry},
    types::{StaticMessageType, TypeRegistry},
    DynamicMessage,
};
use tracing::Level;

use crate::{message_descriptor, test_pool, Point};

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture(f: impl FnOnce()) -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, f);
    captured.contents()
}

#[test]
fn unknown_fields_are_traced() {
    let output = capture(|| {
        let bytes = [0x08, 0x05, 0x98, 0x06, 0x2a];
        DynamicMessage::decode(message_descriptor("test.Record"), &bytes).unwrap();
    });

    assert!(output.contains("captured unknown field"), "{}", output);
    assert!(output.contains("number=99"), "{}", output);
    assert!(output.contains("message_type=\"test.Record\""), "{}", output);
}

#[test]
fn packed_runs_are_traced() {
    let output = capture(|| {
        let bytes = [0x12, 0x03, 0x01, 0x02, 0x03];
        DynamicMessage::decode(message_descriptor("test.Record"), &bytes).unwrap();
    });

    assert!(output.contains("decoded packed run"), "{}", output);
    assert!(output.contains("count=3"), "{}", output);
}

#[test]
fn registrations_are_traced() {
    let output = capture(|| {
        let mut registry = Registry::new();
        for file in test_pool().files() {
            registry.register_file(file).unwrap();
        }

        let mut types = TypeRegistry::new();
        types
            .register_message(StaticMessageType::<Point>::new())
            .unwrap();
    });

    assert!(output.contains("registered file"), "{}", output);
    assert!(output.contains("file=\"test2.proto\""), "{}", output);
    assert!(output.contains("registered message type"), "{}", output);
    assert!(output.contains("dynamic=false"), "{}", output);
}
