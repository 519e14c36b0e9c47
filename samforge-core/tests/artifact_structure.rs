//! Generated class file structure
//!
//! Prepares adapters through the public `Synthesizer` entry point and reads
//! the resulting class files back with the crate's own reader to check the
//! artifact ABI: one private callable field, one non-public constructor, one
//! public static `convert`, one public forwarding method.

use samforge_core::classfile::{
    ClassFile, ClassWriter, CodeBuilder, Operand, access, disassemble, opcodes, reader,
};
use samforge_core::{
    ClassPath, ClassVersion, Error, InterfaceType, ReturnKind, Synthesizer, SynthesizerConfig,
    TypeRegistry, TypeResolver,
};

fn prepare(name: &str) -> (String, ClassFile) {
    let registry = TypeRegistry::with_platform_types();
    let interface = registry.get(name).unwrap();
    let artifact = Synthesizer::new(SynthesizerConfig::default(), &registry)
        .prepare("my-app.core", interface)
        .unwrap();
    let class = reader::parse(&artifact.bytes).unwrap();
    (artifact.name, class)
}

#[test]
fn test_artifact_abi() {
    let (name, class) = prepare("java.util.function.IntPredicate");
    assert_eq!(name, "my_app/core/LambdaFactory$java$util$function$IntPredicate");
    assert_eq!(class.this_class, name);
    assert_eq!(class.interfaces, vec!["java/util/function/IntPredicate".to_string()]);
    assert!(class.has_flag(access::SYNTHETIC));

    assert_eq!(class.fields.len(), 1);
    let field = &class.fields[0];
    assert!(field.has_flag(access::PRIVATE));
    assert_eq!(field.descriptor, "Lclojure/lang/IFn;");

    let constructors: Vec<_> = class.methods.iter().filter(|m| m.name == "<init>").collect();
    assert_eq!(constructors.len(), 1);
    assert!(!constructors[0].has_flag(access::PUBLIC));
    assert_eq!(constructors[0].descriptor, "(Lclojure/lang/IFn;)V");

    let public_static: Vec<_> = class
        .methods
        .iter()
        .filter(|m| m.has_flag(access::PUBLIC) && m.has_flag(access::STATIC))
        .collect();
    assert_eq!(public_static.len(), 1);
    assert_eq!(public_static[0].name, "convert");
    assert_eq!(
        public_static[0].descriptor,
        "(Ljava/lang/Object;)Ljava/util/function/IntPredicate;"
    );

    let instance: Vec<_> = class
        .methods
        .iter()
        .filter(|m| m.has_flag(access::PUBLIC) && !m.has_flag(access::STATIC))
        .collect();
    assert_eq!(instance.len(), 1);
    assert_eq!(instance[0].name, "test");
    assert_eq!(instance[0].descriptor, "(I)Z");
}

#[test]
fn test_every_method_has_code_and_frames_where_needed() {
    let (_, class) = prepare("java.util.function.Supplier");
    for method in &class.methods {
        let code = method.code.as_ref().unwrap();
        assert!(!code.code.is_empty(), "{}", method.name);
        let frames = code.same_frame_offsets().unwrap();
        if method.name == "convert" {
            assert_eq!(frames, vec![16, 28]);
        } else {
            assert!(frames.is_empty(), "{}", method.name);
        }
    }
}

#[test]
fn test_prepare_is_byte_identical() {
    let registry = TypeRegistry::with_platform_types();
    let synthesizer = Synthesizer::new(SynthesizerConfig::default(), &registry);
    for name in registry.names() {
        let interface = registry.get(name).unwrap();
        if !synthesizer.is_adaptable(interface) {
            continue;
        }
        let first = synthesizer.prepare("user", interface).unwrap();
        let second = synthesizer.prepare("user", interface).unwrap();
        assert_eq!(first, second, "{}", name);
    }
}

#[test]
fn test_every_platform_sam_emits_a_readable_class() {
    let registry = TypeRegistry::with_platform_types();
    let synthesizer = Synthesizer::new(SynthesizerConfig::default(), &registry);
    let mut prepared = 0;
    for name in registry.names() {
        let interface = registry.get(name).unwrap();
        let Ok(target) = synthesizer.describe(interface) else {
            continue;
        };
        let artifact = synthesizer.prepare("user", interface).unwrap();
        let class = reader::parse(&artifact.bytes).unwrap();
        let forwarder = class.method(&target.method_name).unwrap();
        assert_eq!(forwarder.descriptor, target.signature.descriptor());
        let code = forwarder.code.as_ref().unwrap();
        assert_eq!(code.max_locals, 1 + target.signature.param_slots());
        disassemble(&code.code).unwrap();
        prepared += 1;
    }
    // everything but Iterator
    assert_eq!(prepared, registry.len() - 1);
}

#[test]
fn test_forwarder_invokes_with_declared_arity() {
    let (_, class) = prepare("java.util.function.BiFunction");
    let code = &class.method("apply").unwrap().code.as_ref().unwrap().code;
    let invoke = disassemble(code)
        .unwrap()
        .into_iter()
        .find(|i| i.opcode == opcodes::INVOKEINTERFACE)
        .unwrap();
    let Operand::Constant(idx) = invoke.operand else {
        panic!("invokeinterface without a constant operand");
    };
    let target = class.member_ref(idx).unwrap();
    assert_eq!(target.owner, "clojure/lang/IFn");
    assert_eq!(
        target.descriptor,
        "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;"
    );
}

#[test]
fn test_older_class_version_omits_stack_maps() {
    let registry = TypeRegistry::with_platform_types();
    let config = SynthesizerConfig {
        class_version: ClassVersion { major: 49, minor: 0 },
        ..Default::default()
    };
    let supplier = registry.get("java.util.function.Supplier").unwrap();
    let artifact = Synthesizer::new(config, &registry)
        .prepare("user", supplier)
        .unwrap();
    let class = reader::parse(&artifact.bytes).unwrap();
    assert_eq!(class.major_version, 49);
    let convert = class.method("convert").unwrap();
    assert!(convert.code.as_ref().unwrap().stack_map_table.is_none());
}

/// Assemble an interface class file the way javac would lay it out
fn interface_class(name: &str, supers: &[&str], methods: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ClassWriter::new(
        ClassVersion::JAVA_8,
        access::PUBLIC | access::INTERFACE | access::ABSTRACT,
        name,
        "java/lang/Object",
        supers,
    )
    .unwrap();
    for (method, descriptor) in methods {
        writer
            .add_abstract_method(access::PUBLIC | access::ABSTRACT, method, descriptor)
            .unwrap();
    }
    writer.finish().unwrap()
}

#[test]
fn test_interface_from_class_bytes() {
    let bytes = interface_class(
        "com/acme/Handler",
        &["java/util/function/Supplier"],
        &[("handle", "(Ljava/lang/String;J)I")],
    );
    let ty = InterfaceType::from_class_bytes(&bytes).unwrap();
    assert_eq!(ty.name, "com.acme.Handler");
    assert!(ty.is_interface());
    assert_eq!(ty.super_interfaces, vec!["java.util.function.Supplier".to_string()]);
    assert_eq!(ty.methods[0].signature.param_slots(), 3);

    // inherits Supplier.get, so two abstract methods
    let registry = TypeRegistry::with_platform_types();
    let synthesizer = Synthesizer::new(SynthesizerConfig::default(), &registry);
    assert!(matches!(
        synthesizer.describe(&ty),
        Err(Error::NotASamInterface { .. })
    ));
}

#[test]
fn test_class_path_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let package = dir.path().join("com/acme");
    std::fs::create_dir_all(&package).unwrap();
    std::fs::write(
        package.join("Base.class"),
        interface_class("com/acme/Base", &[], &[("apply", "(D)D")]),
    )
    .unwrap();
    std::fs::write(
        package.join("Derived.class"),
        interface_class("com/acme/Derived", &["com/acme/Base"], &[]),
    )
    .unwrap();

    let class_path = ClassPath::new(vec![dir.path().to_path_buf()]).with_platform_types();
    let derived = class_path.resolve("com.acme.Derived").unwrap().unwrap();

    let synthesizer = Synthesizer::new(SynthesizerConfig::default(), &class_path);
    let target = synthesizer.describe(&derived).unwrap();
    assert_eq!(target.name, "com.acme.Derived");
    assert_eq!(target.method_name, "apply");

    let artifact = synthesizer.prepare("user", &derived).unwrap();
    assert_eq!(artifact.name, "user/LambdaFactory$com$acme$Derived");

    let written = artifact.write_to(dir.path()).unwrap();
    assert_eq!(std::fs::read(written).unwrap(), artifact.bytes);
}

#[test]
fn test_class_path_rejects_misplaced_class() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Wrong.class"),
        interface_class("com/acme/Right", &[], &[("run", "()V")]),
    )
    .unwrap();
    let class_path = ClassPath::new(vec![dir.path().to_path_buf()]);
    assert!(matches!(
        class_path.resolve("Wrong"),
        Err(Error::ClassFormat(_))
    ));
}

#[test]
fn test_class_path_diamond_with_default() {
    let dir = tempfile::tempdir().unwrap();
    let package = dir.path().join("d");
    std::fs::create_dir_all(&package).unwrap();
    std::fs::write(
        package.join("B.class"),
        interface_class("d/B", &[], &[("f", "()V"), ("g", "()V")]),
    )
    .unwrap();

    let mut c = ClassWriter::new(
        ClassVersion::JAVA_8,
        access::PUBLIC | access::INTERFACE | access::ABSTRACT,
        "d/C",
        "java/lang/Object",
        &["d/B"],
    )
    .unwrap();
    let mut body = CodeBuilder::new(1);
    body.return_value(&ReturnKind::Void);
    c.add_method(access::PUBLIC, "g", "()V", &body.finish().unwrap())
        .unwrap();
    std::fs::write(package.join("C.class"), c.finish().unwrap()).unwrap();

    std::fs::write(
        package.join("I.class"),
        interface_class("d/I", &["d/B", "d/C"], &[]),
    )
    .unwrap();

    let class_path = ClassPath::new(vec![dir.path().to_path_buf()]);
    let i = class_path.resolve("d.I").unwrap().unwrap();
    let synthesizer = Synthesizer::new(SynthesizerConfig::default(), &class_path);
    let target = synthesizer.describe(&i).unwrap();
    assert_eq!(target.method_name, "f");
}
