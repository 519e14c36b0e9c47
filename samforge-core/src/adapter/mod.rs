//! Adapter type generation
//!
//! An adapter is a small final class that implements one SAM interface by
//! forwarding its single abstract method to a captured generic callable.
//!
//! ## Shape
//!
//! ```text
//! public synthetic class <ns>/LambdaFactory$<iface> implements <iface> {
//!     private final IFn delegate;
//!     private <init>(IFn delegate)
//!     public static <iface> convert(Object value)   // null / identity / wrap
//!     public <ret> <method>(<params>)               // box, invoke, unbox
//! }
//! ```
//!
//! The [`AdapterEmitter`] trait separates what an adapter is ([`AdapterSpec`])
//! from how it is serialized. [`BytecodeEmitter`] writes JVM class files.

mod bytecode;

pub use bytecode::BytecodeEmitter;

use crate::descriptor::{Kind, TargetInterfaceDescriptor, binary_name};
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Static factory method on every adapter
pub const CONVERT_METHOD: &str = "convert";

/// The generic callable interface adapters forward to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallableAbi {
    /// Internal name of the callable interface
    pub class: String,
    /// Name of its variadic-by-overload invocation method
    pub method: String,
    /// Name of the adapter field holding the callable
    pub field: String,
    /// Largest arity the callable has an overload for
    pub max_arity: usize,
}

impl Default for CallableAbi {
    fn default() -> Self {
        Self {
            class: "clojure/lang/IFn".to_string(),
            method: "invoke".to_string(),
            field: "delegate".to_string(),
            max_arity: 20,
        }
    }
}

impl CallableAbi {
    pub fn kind(&self) -> Kind {
        Kind::Reference(self.class.clone())
    }

    pub fn field_descriptor(&self) -> String {
        self.kind().descriptor()
    }

    /// `(Object × arity)Object`
    pub fn invoke_descriptor(arity: usize) -> String {
        format!("({})Ljava/lang/Object;", "Ljava/lang/Object;".repeat(arity))
    }

    /// Descriptor of the adapter constructor
    pub fn constructor_descriptor(&self) -> String {
        format!("({})V", self.field_descriptor())
    }
}

/// Everything needed to emit one adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSpec {
    /// Internal name of the adapter class
    pub name: String,
    pub target: TargetInterfaceDescriptor,
    pub callable: CallableAbi,
}

impl AdapterSpec {
    pub fn new(
        name: impl Into<String>,
        target: TargetInterfaceDescriptor,
        callable: CallableAbi,
    ) -> Result<Self> {
        let arity = target.signature.arity();
        if arity > callable.max_arity {
            return Err(Error::UnsupportedArity {
                method: target.method_label(),
                arity,
                max: callable.max_arity,
            });
        }
        Ok(Self {
            name: name.into(),
            target,
            callable,
        })
    }

    /// Descriptor of the static `convert` factory
    pub fn convert_descriptor(&self) -> String {
        format!("(Ljava/lang/Object;)L{};", self.target.internal_name())
    }
}

/// A serialized adapter type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedTypeArtifact {
    /// Internal name of the class
    pub name: String,
    pub bytes: Vec<u8>,
    /// `constant_pool_count` of the class file
    pub constant_pool_count: u16,
}

impl GeneratedTypeArtifact {
    pub fn binary_name(&self) -> String {
        binary_name(&self.name)
    }

    /// Path of the class file relative to a class-path root
    pub fn relative_path(&self) -> PathBuf {
        let mut path = PathBuf::from(&self.name);
        path.set_extension("class");
        path
    }

    /// Write the class file under `root`, creating package directories
    pub fn write_to(&self, root: &Path) -> Result<PathBuf> {
        let path = root.join(self.relative_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Serializes an [`AdapterSpec`]
pub trait AdapterEmitter {
    fn emit(&self, spec: &AdapterSpec) -> Result<GeneratedTypeArtifact>;
}
