#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Persisting plugin-defined values when several plugins define the same type name.

mod common;

use std::sync::Arc;

use common::{MemoryTracker, RecordingEngine, TestPlugin, host, source_with};
use process_plugins::infra::classfile::ClassUnit;
use process_plugins::{
    CodecError, CodecRegistryError, HostError, JsonCodec, LoadingContext, ObjectValue,
    ProcessIdentity, ProcessPluginsHost, RegistryError,
};
use serde::{Deserialize, Serialize};

const PING_TYPE: &str = "dev/dsf/bpe/Ping";

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct PingA {
    target: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct PingB {
    target: String,
    retries: u32,
}

fn plugin(name: &str, process: &str) -> TestPlugin {
    TestPlugin::new(name, process).with_source(Arc::new(source_with(
        name,
        vec![ClassUnit::new(PING_TYPE)],
    )))
}

fn deploy_two(host: &ProcessPluginsHost) {
    let a = plugin("plugin-a", "dsfdev_procA")
        .with_codec(Arc::new(JsonCodec::<PingA>::new("ping", PING_TYPE)));
    let b = plugin("plugin-b", "dsfdev_procB")
        .with_codec(Arc::new(JsonCodec::<PingB>::new("ping", "dev.dsf.bpe.Ping")));
    host.deploy(&[a.shared(), b.shared()]).unwrap();
}

fn new_host() -> ProcessPluginsHost {
    host(Arc::new(MemoryTracker::empty()), Arc::new(RecordingEngine::default()))
}

fn value_of<T: Send + Sync + 'static>(host: &ProcessPluginsHost, process: &str, data: T) -> ObjectValue {
    let module = host
        .registry()
        .resolve(&ProcessIdentity::new(process, "1.0"))
        .unwrap();
    let ty = module.context().load_class(PING_TYPE).unwrap();
    ObjectValue::new(ty, Arc::new(data))
}

#[test]
fn same_type_name_uses_the_defining_plugins_codec() {
    let host = new_host();
    deploy_two(&host);
    let codec = host.codec();

    let a = value_of(&host, "dsfdev_procA", PingA { target: "org.a".to_owned() });
    let b = value_of(
        &host,
        "dsfdev_procB",
        PingB {
            target: "org.b".to_owned(),
            retries: 3,
        },
    );
    assert_ne!(**a.ty(), **b.ty());

    let stored_a = codec.write(&a).unwrap();
    let stored_b = codec.write(&b).unwrap();
    assert_eq!(stored_a.type_name, PING_TYPE);
    assert_eq!(stored_a.context, "plugin-a-1.0.0");
    assert_eq!(stored_a.codec, "plugin-a-1.0.0/ping");
    assert_eq!(stored_b.codec, "plugin-b-1.0.0/ping");

    // The persisted form survives a round trip through storage.
    let stored_b = serde_json::from_str(&serde_json::to_string(&stored_b).unwrap()).unwrap();

    let restored_a = codec.read(&stored_a).unwrap();
    assert!(Arc::ptr_eq(restored_a.ty(), a.ty()));
    assert_eq!(
        restored_a.downcast_ref::<PingA>(),
        Some(&PingA { target: "org.a".to_owned() })
    );

    let restored_b = codec.read(&stored_b).unwrap();
    assert!(Arc::ptr_eq(restored_b.ty(), b.ty()));
    assert_eq!(
        restored_b.downcast_ref::<PingB>(),
        Some(&PingB {
            target: "org.b".to_owned(),
            retries: 3
        })
    );
}

#[test]
fn values_without_a_codec_are_a_serialization_miss() {
    let host = new_host();
    let a = plugin("plugin-a", "dsfdev_procA")
        .with_codec(Arc::new(JsonCodec::<PingA>::new("ping", PING_TYPE)));
    let bare = plugin("plugin-c", "dsfdev_procC");
    host.deploy(&[a.shared(), bare.shared()]).unwrap();
    let codec = host.codec();

    let orphan = value_of(&host, "dsfdev_procC", PingA { target: "org.c".to_owned() });
    assert!(matches!(
        codec.write(&orphan),
        Err(CodecRegistryError::SerializationMiss { ref context, .. }) if context == "plugin-c-1.0.0"
    ));

    // Stored by a plugin that is no longer deployed.
    let stored = codec
        .write(&value_of(&host, "dsfdev_procA", PingA { target: "org.a".to_owned() }))
        .unwrap();
    host.deploy(&[plugin("plugin-c", "dsfdev_procC").shared()])
        .unwrap();
    assert!(matches!(
        codec.read(&stored),
        Err(CodecRegistryError::SerializationMiss { .. })
    ));
}

#[test]
fn wrong_payload_is_reported_by_the_codec() {
    let host = new_host();
    deploy_two(&host);

    let mismatched = value_of(&host, "dsfdev_procA", 42_u32);
    assert!(matches!(
        host.codec().write(&mismatched),
        Err(CodecRegistryError::Codec(CodecError::TypeMismatch { .. }))
    ));
}

#[test]
fn codecs_are_addressed_by_qualified_name() {
    let host = new_host();
    deploy_two(&host);

    let a = host.codec().codec("plugin-a-1.0.0/ping").unwrap();
    assert_eq!(a.type_name(), PING_TYPE);
    let b = host.codec().codec("plugin-b-1.0.0/ping").unwrap();
    assert_eq!(b.type_name(), "dev.dsf.bpe.Ping");
    assert!(host.codec().codec("ping").is_none());
    assert_eq!(host.registry().snapshot().codecs().len(), 2);
}

#[test]
fn one_plugin_cannot_register_two_codecs_for_a_type() {
    let host = new_host();
    let clash = plugin("plugin-a", "dsfdev_procA")
        .with_codec(Arc::new(JsonCodec::<PingA>::new("ping", PING_TYPE)))
        .with_codec(Arc::new(JsonCodec::<PingA>::new("ping-v2", "dev.dsf.bpe.Ping")));

    assert!(matches!(
        host.deploy(&[clash.shared()]),
        Err(HostError::Registry(RegistryError::Codec(
            CodecRegistryError::DuplicateCodec { .. }
        )))
    ));
}

#[test]
fn a_context_that_only_shares_the_name_gets_no_codec() {
    let host = new_host();
    deploy_two(&host);

    // Same context name and type name as plugin-a, but a different context.
    let impostor = LoadingContext::isolated(
        "plugin-a-1.0.0",
        None,
        Arc::new(source_with("plugin-a", vec![ClassUnit::new(PING_TYPE)])),
        None,
    );
    let value = ObjectValue::new(
        impostor.load_class(PING_TYPE).unwrap(),
        Arc::new(PingA { target: "org.a".to_owned() }),
    );

    assert!(matches!(
        host.codec().write(&value),
        Err(CodecRegistryError::SerializationMiss { ref context, .. }) if context == "plugin-a-1.0.0"
    ));
}

#[test]
fn plugins_with_colliding_context_names_are_rejected() {
    let host = new_host();
    let first = plugin("x-1", "dsfdev_procA")
        .with_version("0")
        .with_codec(Arc::new(JsonCodec::<PingA>::new("ping", PING_TYPE)));
    let second = plugin("x", "dsfdev_procB").with_version("1-0");

    assert!(matches!(
        host.deploy(&[first.shared(), second.shared()]),
        Err(HostError::Registry(RegistryError::DuplicateContext { ref context, .. })) if context == "x-1-0"
    ));
    assert!(host.registry().snapshot().modules().is_empty());
}
