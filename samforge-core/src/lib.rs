//! # Samforge Core
//!
//! Core library for synthesizing adapter classes that let a generic
//! callable (`clojure.lang.IFn`) stand in wherever a JVM single-abstract-method
//! interface is expected.
//!
//! ## Pipeline
//!
//! ```text
//! Interface → SAM Detector → Namer → AdapterSpec → Bytecode Emitter → Class file
//!                                         └──────→ Runtime AdapterClass
//! ```
//!
//! 1. **SAM Detector**: walks the full method set and finds the single abstract method
//! 2. **Namer**: derives `<ns>/LambdaFactory$<interface>` from the naming context
//! 3. **AdapterSpec**: checks the arity against the callable ABI
//! 4. **Bytecode Emitter**: writes constructor, static `convert` and forwarding method
//!
//! The same [`AdapterSpec`] also drives [`runtime::AdapterClass`], an
//! in-process rendition of the generated class over dynamic [`Value`]s.
//!
//! ## Example
//!
//! ```ignore
//! use samforge_core::{Synthesizer, SynthesizerConfig, TypeRegistry};
//!
//! let registry = TypeRegistry::with_platform_types();
//! let synthesizer = Synthesizer::new(SynthesizerConfig::default(), &registry);
//!
//! let supplier = registry.get("java.util.function.Supplier").unwrap();
//! let artifact = synthesizer.prepare("user", supplier)?;
//! assert_eq!(artifact.name, "user/LambdaFactory$java$util$function$Supplier");
//! ```

mod error;
pub mod adapter;
pub mod classfile;
pub mod coercion;
pub mod descriptor;
pub mod introspect;
pub mod manifest;
pub mod naming;
pub mod runtime;
pub mod sam;

pub use error::{Error, Result};
pub use adapter::{AdapterEmitter, AdapterSpec, BytecodeEmitter, CallableAbi, GeneratedTypeArtifact};
pub use classfile::ClassVersion;
pub use descriptor::{Kind, MethodSignature, PrimitiveKind, ReturnKind, TargetInterfaceDescriptor};
pub use introspect::{ClassPath, InterfaceType, TypeRegistry, TypeResolver};
pub use manifest::{ArtifactManifest, ManifestBuilder};
pub use runtime::{AdapterClass, Callable, Value};
pub use sam::{ObjectMethodPolicy, SamDetector};

use serde::{Deserialize, Serialize};

/// Configuration for adapter synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizerConfig {
    /// Class-file version of generated adapters
    pub class_version: ClassVersion,

    /// Generic callable the adapters forward to
    pub callable: CallableAbi,

    /// How abstract redeclarations of `Object` methods are counted
    pub object_methods: ObjectMethodPolicy,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            class_version: ClassVersion::JAVA_8,
            callable: CallableAbi::default(),
            object_methods: ObjectMethodPolicy::Exclude,
        }
    }
}

/// Statistics about one generated adapter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisStats {
    /// Parameters of the SAM method
    pub arity: usize,

    /// Parameters boxed before the call
    pub boxed_params: usize,

    /// Reference parameters forwarded as is
    pub reference_params: usize,

    /// Whether the result is unboxed to a primitive
    pub unboxed_return: bool,

    /// `constant_pool_count` of the class file
    pub constant_pool_count: usize,

    /// Size of the class file (bytes)
    pub artifact_size: usize,
}

/// Main entry point for adapter synthesis
///
/// Synthesis is stateless: every call is a pure function of the config, the
/// naming context and the interface, so one `Synthesizer` can be shared
/// across threads.
pub struct Synthesizer<R> {
    config: SynthesizerConfig,
    detector: SamDetector<R>,
}

impl<R: TypeResolver> Synthesizer<R> {
    /// Create a synthesizer that resolves super-interfaces through `resolver`
    pub fn new(config: SynthesizerConfig, resolver: R) -> Self {
        let detector = SamDetector::new(resolver, config.object_methods);
        Self { config, detector }
    }

    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    /// Whether `interface` has exactly one abstract method
    pub fn is_adaptable(&self, interface: &InterfaceType) -> bool {
        self.detector.is_adaptable(interface)
    }

    /// Identity and single abstract method of `interface`
    pub fn describe(&self, interface: &InterfaceType) -> Result<TargetInterfaceDescriptor> {
        self.detector.describe(interface)
    }

    /// Name `target` in `context` and check it against the callable ABI
    pub fn spec(&self, context: &str, target: TargetInterfaceDescriptor) -> Result<AdapterSpec> {
        let name = naming::adapter_name(context, &target)?;
        log::debug!("Adapter for {} in {} is {}", target.name, context, name);
        AdapterSpec::new(name, target, self.config.callable.clone())
    }

    /// Generate the adapter class for `interface` in naming context `context`
    pub fn prepare(&self, context: &str, interface: &InterfaceType) -> Result<GeneratedTypeArtifact> {
        let (artifact, _stats) = self.prepare_with_stats(context, interface)?;
        Ok(artifact)
    }

    /// Generate the adapter class and return statistics alongside it
    pub fn prepare_with_stats(
        &self,
        context: &str,
        interface: &InterfaceType,
    ) -> Result<(GeneratedTypeArtifact, SynthesisStats)> {
        log::info!("Preparing adapter for {}", interface.name);
        let target = self.describe(interface)?;
        self.prepare_target(context, target)
    }

    /// Generate the adapter class for an already described target
    pub fn prepare_target(
        &self,
        context: &str,
        target: TargetInterfaceDescriptor,
    ) -> Result<(GeneratedTypeArtifact, SynthesisStats)> {
        let spec = self.spec(context, target)?;
        let artifact = BytecodeEmitter::new(self.config.class_version).emit(&spec)?;

        let signature = &spec.target.signature;
        let boxed_params = signature.params.iter().filter(|p| p.is_primitive()).count();
        let stats = SynthesisStats {
            arity: signature.arity(),
            boxed_params,
            reference_params: signature.arity() - boxed_params,
            unboxed_return: matches!(signature.ret, ReturnKind::Value(Kind::Primitive(_))),
            constant_pool_count: usize::from(artifact.constant_pool_count),
            artifact_size: artifact.bytes.len(),
        };

        log::info!(
            "Adapter {} complete: {} ({} bytes, {} constants)",
            artifact.binary_name(),
            spec.target,
            stats.artifact_size,
            stats.constant_pool_count
        );

        Ok((artifact, stats))
    }

    /// In-process adapter type for `interface`
    pub fn adapter_class(&self, context: &str, interface: &InterfaceType) -> Result<AdapterClass> {
        let target = self.describe(interface)?;
        Ok(AdapterClass::new(self.spec(context, target)?))
    }
}
