#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Isolated, namespace-rewriting class loading across plugin contexts.

mod common;

use std::io::Write;
use std::sync::Arc;

use common::{CountingSource, api_source, encoded, source_with};
use process_plugins::infra::classfile::{
    ClassUnit, Constant, FieldUnit, Instruction, InvokeOp, MethodHandle, MethodUnit, TypeOp,
    VerificationType,
};
use process_plugins::{
    ArchiveClassSource, ClassSource, DirectoryClassSource, LoadError, LoadingContext,
    MemoryClassSource, NamespaceRewriter,
};

fn rewriter() -> Arc<NamespaceRewriter> {
    Arc::new(NamespaceRewriter::new("org/camunda/bpm", "org/operaton/bpm").unwrap())
}

fn plugin_context(name: &str, source: Arc<dyn ClassSource>) -> Arc<LoadingContext> {
    let api = LoadingContext::root("process-api-v2", api_source(2));
    LoadingContext::isolated(name, Some(api), source, Some(rewriter()))
}

/// Class referencing the legacy namespace in every position a reference can take.
fn legacy_task() -> ClassUnit {
    ClassUnit::new("dev/dsf/bpe/PingTask")
        .with_super("org/camunda/bpm/engine/delegate/AbstractDelegate")
        .with_interface("org/camunda/bpmx/Unrelated")
        .with_field(FieldUnit::new("engine", "Lorg/camunda/bpm/engine/ProcessEngine;"))
        .with_method(
            MethodUnit::new(
                "execute",
                "(Lorg/camunda/bpm/engine/delegate/DelegateExecution;)V",
            )
            .with_code(vec![
                Instruction::Type {
                    op: TypeOp::CheckCast,
                    type_name: "org/camunda/bpm/engine/variable/Variables".to_owned(),
                },
                Instruction::Method {
                    op: InvokeOp::Static,
                    owner: "org/camunda/bpm/engine/variable/Variables".to_owned(),
                    name: "createVariables".to_owned(),
                    descriptor: "()Lorg/camunda/bpm/engine/variable/VariableMap;".to_owned(),
                    interface: false,
                },
                Instruction::Ldc(Constant::Str("org.camunda.bpm.engine.Foo".to_owned())),
                Instruction::Ldc(Constant::Str("org.camunda.bpmx.Foo".to_owned())),
                Instruction::InvokeDynamic {
                    name: "apply".to_owned(),
                    descriptor: "()Lorg/camunda/bpm/engine/delegate/JavaDelegate;".to_owned(),
                    bootstrap: MethodHandle {
                        tag: 6,
                        owner: "java/lang/invoke/LambdaMetafactory".to_owned(),
                        name: "metafactory".to_owned(),
                        descriptor: "()V".to_owned(),
                        interface: false,
                    },
                    arguments: vec![Constant::Type("org/camunda/bpm/engine/delegate/JavaDelegate".to_owned())],
                },
                Instruction::Simple(0xb1),
            ]),
        )
}

#[test]
fn rewrites_every_reference_kind_but_not_partial_segments() {
    let source = Arc::new(source_with("ping", vec![legacy_task()]));
    let context = plugin_context("ping-1.0.0", source);

    let defined = context.load_class("dev.dsf.bpe.PingTask").unwrap();
    let unit = defined.unit();

    assert_eq!(unit.name, "dev/dsf/bpe/PingTask");
    assert_eq!(
        unit.super_name.as_deref(),
        Some("org/operaton/bpm/engine/delegate/AbstractDelegate")
    );
    assert_eq!(unit.interfaces, vec!["org/camunda/bpmx/Unrelated"]);
    assert_eq!(unit.fields[0].descriptor, "Lorg/operaton/bpm/engine/ProcessEngine;");

    let method = &unit.methods[0];
    assert_eq!(
        method.descriptor,
        "(Lorg/operaton/bpm/engine/delegate/DelegateExecution;)V"
    );
    // Entry frame follows the rewritten descriptor.
    assert_eq!(
        method.entry_frame.last(),
        Some(&VerificationType::Object(
            "org/operaton/bpm/engine/delegate/DelegateExecution".to_owned()
        ))
    );

    let Instruction::Type { type_name, .. } = &method.code[0] else {
        panic!("expected type instruction");
    };
    assert_eq!(type_name, "org/operaton/bpm/engine/variable/Variables");
    let Instruction::Method { owner, descriptor, .. } = &method.code[1] else {
        panic!("expected method instruction");
    };
    assert_eq!(owner, "org/operaton/bpm/engine/variable/Variables");
    assert_eq!(descriptor, "()Lorg/operaton/bpm/engine/variable/VariableMap;");
    assert_eq!(
        method.code[2],
        Instruction::Ldc(Constant::Str("org.operaton.bpm.engine.Foo".to_owned()))
    );
    assert_eq!(
        method.code[3],
        Instruction::Ldc(Constant::Str("org.camunda.bpmx.Foo".to_owned()))
    );
    let Instruction::InvokeDynamic { descriptor, arguments, .. } = &method.code[4] else {
        panic!("expected call site");
    };
    assert_eq!(descriptor, "()Lorg/operaton/bpm/engine/delegate/JavaDelegate;");
    assert_eq!(
        arguments[0],
        Constant::Type("org/operaton/bpm/engine/delegate/JavaDelegate".to_owned())
    );

    let stats = defined.rewrites();
    assert_eq!(stats.supertypes, 1);
    assert_eq!(stats.fields, 1);
    assert_eq!(stats.methods, 1);
    assert_eq!(stats.instructions, 2);
    assert_eq!(stats.constants, 1);
    assert_eq!(stats.call_sites, 1);

    // Linked unit carries a digest matching its rewritten body.
    assert_eq!(unit.digest, unit.compute_digest().unwrap());
}

#[test]
fn same_name_in_two_plugins_yields_distinct_types() {
    let ping = ClassUnit::new("dev/dsf/bpe/Ping");
    let a = plugin_context("a-1.0.0", Arc::new(source_with("a", vec![ping.clone()])));
    let b = plugin_context("b-1.0.0", Arc::new(source_with("b", vec![ping])));

    let ping_a = a.load_class("dev/dsf/bpe/Ping").unwrap();
    let ping_b = b.load_class("dev/dsf/bpe/Ping").unwrap();

    assert_eq!(ping_a.name(), ping_b.name());
    assert_ne!(*ping_a, *ping_b);
    assert!(!ping_a.is_subtype_of(&ping_b));
    assert!(!ping_b.is_subtype_of(&ping_a));

    // Same context, same type.
    assert!(Arc::ptr_eq(&ping_a, &a.load_class("dev.dsf.bpe.Ping").unwrap()));
}

#[test]
fn shared_api_types_resolve_through_the_parent() {
    let listener = ClassUnit::new("dev/dsf/bpe/CustomListener")
        .with_super(common::DEFAULT_LISTENER_INTERNAL);
    let api = LoadingContext::root("process-api-v2", api_source(2));
    let a = LoadingContext::isolated(
        "a-1.0.0",
        Some(Arc::clone(&api)),
        Arc::new(source_with("a", vec![listener.clone()])),
        Some(rewriter()),
    );
    let b = LoadingContext::isolated(
        "b-1.0.0",
        Some(Arc::clone(&api)),
        Arc::new(source_with("b", vec![listener])),
        Some(rewriter()),
    );

    let default_from_a = a.load_class(common::DEFAULT_LISTENER).unwrap();
    let default_from_b = b.load_class(common::DEFAULT_LISTENER).unwrap();
    assert_eq!(*default_from_a, *default_from_b);
    assert_eq!(default_from_a.context_name(), "process-api-v2");

    let custom_a = a.load_class("dev/dsf/bpe/CustomListener").unwrap();
    let custom_b = b.load_class("dev/dsf/bpe/CustomListener").unwrap();
    assert!(custom_a.is_subtype_of(&default_from_a));
    assert!(custom_b.is_subtype_of(&default_from_a));
    assert!(!custom_a.is_subtype_of(&custom_b));
}

#[test]
fn concurrent_loads_define_once() {
    let source = Arc::new(CountingSource::new(source_with(
        "ping",
        vec![ClassUnit::new("dev/dsf/bpe/Ping")],
    )));
    let context = plugin_context("ping-1.0.0", Arc::clone(&source) as Arc<dyn ClassSource>);

    let loaded: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| context.load_class("dev/dsf/bpe/Ping").unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(loaded.iter().all(|t| Arc::ptr_eq(t, &loaded[0])));
    assert_eq!(source.reads("dev/dsf/bpe/Ping.class"), 1);
    assert_eq!(context.defined_classes().len(), 1);
}

#[test]
fn corrupt_or_missing_classes_fail_to_load() {
    let mut tampered = ClassUnit::new("dev/dsf/bpe/Tampered").sealed();
    tampered.digest[0] ^= 0xff;
    let source = MemoryClassSource::new("broken")
        .with_entry(
            "dev/dsf/bpe/Tampered.class",
            tampered.encode().unwrap().to_vec(),
        )
        .with_entry("dev/dsf/bpe/Garbage.class", b"not a class unit".to_vec());
    let context = plugin_context("broken-1.0.0", Arc::new(source));

    assert!(matches!(
        context.load_class("dev/dsf/bpe/Tampered"),
        Err(LoadError::Verify { .. })
    ));
    assert!(matches!(
        context.load_class("dev/dsf/bpe/Garbage"),
        Err(LoadError::Format { .. })
    ));
    let missing = context.load_class("dev/dsf/bpe/Missing").unwrap_err();
    assert!(missing.is_not_found(), "{missing}");
}

#[test]
fn loads_from_archive_and_directory_sources() {
    let dir = tempfile::tempdir().unwrap();

    let archive_path = dir.path().join("ping.zip");
    let mut writer = zip::ZipWriter::new(std::fs::File::create(&archive_path).unwrap());
    writer
        .start_file(
            "dev/dsf/bpe/PingTask.class",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
    writer.write_all(&encoded(legacy_task())).unwrap();
    writer.finish().unwrap();

    let classes = dir.path().join("classes");
    std::fs::create_dir_all(classes.join("dev/dsf/bpe")).unwrap();
    std::fs::write(
        classes.join("dev/dsf/bpe/Pong.class"),
        encoded(ClassUnit::new("dev/dsf/bpe/Pong")),
    )
    .unwrap();

    let archive = ArchiveClassSource::open(&archive_path).unwrap();
    assert_eq!(archive.entries(), vec!["dev/dsf/bpe/PingTask.class"]);
    let from_archive = plugin_context("ping-1.0.0", Arc::new(archive));
    let task = from_archive.load_class("dev.dsf.bpe.PingTask").unwrap();
    assert!(task.rewrites().total() > 0);

    let directory = DirectoryClassSource::new(&classes);
    assert_eq!(directory.entries(), vec!["dev/dsf/bpe/Pong.class"]);
    let from_directory = plugin_context("pong-1.0.0", Arc::new(directory));
    assert_eq!(
        from_directory.load_class("dev/dsf/bpe/Pong").unwrap().rewrites().total(),
        0
    );
}
