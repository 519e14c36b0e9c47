//! Class-file emitter for adapters

use super::{AdapterEmitter, AdapterSpec, CONVERT_METHOD, CallableAbi, GeneratedTypeArtifact};
use crate::Result;
use crate::classfile::{ClassVersion, ClassWriter, CodeBuilder, access};
use crate::coercion::coercion;
use crate::descriptor::{Kind, OBJECT_CLASS, ReturnKind};

/// Emits adapters as JVM class files
///
/// Output is a pure function of the [`AdapterSpec`] and class version: constants are
/// interned in a fixed order and nothing time- or environment-dependent is
/// recorded.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytecodeEmitter {
    version: ClassVersion,
}

impl BytecodeEmitter {
    pub fn new(version: ClassVersion) -> Self {
        Self { version }
    }

    pub fn version(&self) -> ClassVersion {
        self.version
    }

    /// `private <init>(IFn)`: call `Object.<init>` and store the callable
    fn emit_constructor(&self, class: &mut ClassWriter, spec: &AdapterSpec) -> Result<()> {
        let callable = spec.callable.kind();
        let pool = class.pool();
        let object_init = pool.method_ref(OBJECT_CLASS, "<init>", "()V")?;
        let field = pool.field_ref(
            &spec.name,
            &spec.callable.field,
            &spec.callable.field_descriptor(),
        )?;

        let mut code = CodeBuilder::new(2);
        code.aload(0)
            .invokespecial(object_init, &[], &ReturnKind::Void)
            .aload(0)
            .aload(1)
            .putfield(field, &callable)
            .return_value(&ReturnKind::Void);

        class.add_method(
            access::PRIVATE,
            "<init>",
            &spec.callable.constructor_descriptor(),
            &code.finish()?,
        )
    }

    /// `public static <iface> convert(Object)`
    ///
    /// Null passes through, an existing instance of the interface is returned
    /// as is, anything else is cast to the callable and wrapped.
    fn emit_static_factory(&self, class: &mut ClassWriter, spec: &AdapterSpec) -> Result<()> {
        let target = spec.target.internal_name();
        let callable = spec.callable.kind();
        let returns = ReturnKind::Value(Kind::Reference(target.clone()));

        let pool = class.pool();
        let target_class = pool.class(&target)?;
        let this_class = pool.class(&spec.name)?;
        let callable_class = pool.class(&spec.callable.class)?;
        let init = pool.method_ref(
            &spec.name,
            "<init>",
            &spec.callable.constructor_descriptor(),
        )?;

        let mut code = CodeBuilder::new(1);
        let on_null = code.new_label();
        let wrap = code.new_label();

        code.aload(0)
            .if_null(on_null)
            .aload(0)
            .instance_of(target_class)
            .if_zero(wrap)
            .aload(0)
            .checkcast(target_class)
            .return_value(&returns);

        code.mark(wrap)
            .new_object(this_class)
            .dup()
            .aload(0)
            .checkcast(callable_class)
            .invokespecial(init, &[callable], &ReturnKind::Void)
            .return_value(&returns);

        code.mark(on_null).aconst_null().return_value(&returns);

        class.add_method(
            access::PUBLIC | access::STATIC,
            CONVERT_METHOD,
            &spec.convert_descriptor(),
            &code.finish()?,
        )
    }

    /// The SAM implementation: box each argument, invoke the callable with
    /// `arity` objects, adapt the result to the declared return kind
    fn emit_forwarder(&self, class: &mut ClassWriter, spec: &AdapterSpec) -> Result<()> {
        let signature = &spec.target.signature;
        let arity = signature.arity();
        let callable = spec.callable.kind();

        let pool = class.pool();
        let field = pool.field_ref(
            &spec.name,
            &spec.callable.field,
            &spec.callable.field_descriptor(),
        )?;
        let invoke = pool.interface_method_ref(
            &spec.callable.class,
            &spec.callable.method,
            &CallableAbi::invoke_descriptor(arity),
        )?;

        let mut code = CodeBuilder::new(1 + signature.param_slots());
        code.aload(0).getfield(field, &callable);

        let mut slot = 1;
        for param in &signature.params {
            code.load(param, slot);
            if let Kind::Primitive(kind) = param {
                let entry = coercion(*kind);
                let box_method = pool.method_ref(
                    entry.box_method.owner,
                    entry.box_method.name,
                    entry.box_method.descriptor,
                )?;
                let boxed = ReturnKind::Value(Kind::Reference(entry.boxed_class.to_string()));
                code.invokestatic(box_method, std::slice::from_ref(param), &boxed);
            }
            slot += param.slot_size();
        }

        let objects = vec![Kind::object(); arity];
        code.invokeinterface(invoke, &objects, &ReturnKind::Value(Kind::object()));

        match &signature.ret {
            ReturnKind::Void => {
                code.pop(&Kind::object());
            }
            ReturnKind::Value(Kind::Primitive(kind)) => {
                let entry = coercion(*kind);
                let owner = pool.class(entry.unbox_owner)?;
                let unbox_method = pool.method_ref(
                    entry.unbox_method.owner,
                    entry.unbox_method.name,
                    entry.unbox_method.descriptor,
                )?;
                code.checkcast(owner)
                    .invokevirtual(unbox_method, &[], &signature.ret);
            }
            ReturnKind::Value(Kind::Reference(name)) => {
                if name != OBJECT_CLASS {
                    code.checkcast(pool.class(name)?);
                }
            }
        }
        code.return_value(&signature.ret);

        class.add_method(
            access::PUBLIC,
            &spec.target.method_name,
            &signature.descriptor(),
            &code.finish()?,
        )
    }
}

impl AdapterEmitter for BytecodeEmitter {
    fn emit(&self, spec: &AdapterSpec) -> Result<GeneratedTypeArtifact> {
        let target = spec.target.internal_name();
        let mut class = ClassWriter::new(
            self.version,
            access::PUBLIC | access::SUPER | access::SYNTHETIC,
            &spec.name,
            OBJECT_CLASS,
            &[target.as_str()],
        )?;

        class.add_field(
            access::PRIVATE | access::FINAL,
            &spec.callable.field,
            &spec.callable.field_descriptor(),
        )?;
        self.emit_constructor(&mut class, spec)?;
        self.emit_static_factory(&mut class, spec)?;
        self.emit_forwarder(&mut class, spec)?;

        let constant_pool_count = class.constant_pool_count();
        let bytes = class.finish()?;
        log::debug!("Emitted {} ({} bytes)", spec.name, bytes.len());

        Ok(GeneratedTypeArtifact {
            name: spec.name.clone(),
            bytes,
            constant_pool_count,
        })
    }
}
