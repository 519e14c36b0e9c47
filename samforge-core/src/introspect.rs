//! Interface introspection
//!
//! An [`InterfaceType`] is what the SAM detector sees of a type: its
//! declared methods and direct super-interfaces. It is produced from a class
//! file, from the built-in platform catalogue, or by hand. A
//! [`TypeResolver`] looks super-interfaces up by name so the detector can
//! walk the full method set.

use crate::classfile::{self, ClassFile, access};
use crate::descriptor::{MethodSignature, binary_name, internal_name};
use crate::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A method declared directly on a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredMethod {
    pub name: String,
    pub signature: MethodSignature,
    pub access_flags: u16,
}

impl DeclaredMethod {
    pub fn new(name: impl Into<String>, descriptor: &str, access_flags: u16) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            signature: MethodSignature::parse(descriptor)?,
            access_flags,
        })
    }

    pub fn descriptor(&self) -> String {
        self.signature.descriptor()
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & access::ABSTRACT != 0
    }

    pub fn is_static(&self) -> bool {
        self.access_flags & access::STATIC != 0
    }

    /// Whether this method takes part in interface method selection at all
    ///
    /// Static, private, bridge and synthetic methods and initializers never do.
    pub fn is_candidate(&self) -> bool {
        self.access_flags
            & (access::STATIC | access::PRIVATE | access::BRIDGE | access::SYNTHETIC)
            == 0
            && !self.name.starts_with('<')
    }
}

/// Introspected view of a class or interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceType {
    /// Binary name (`java.util.function.Supplier`)
    pub name: String,
    pub access_flags: u16,
    /// Binary names of the direct super-interfaces
    pub super_interfaces: Vec<String>,
    pub methods: Vec<DeclaredMethod>,
}

const INTERFACE_FLAGS: u16 = access::PUBLIC | access::INTERFACE | access::ABSTRACT;
const ABSTRACT_METHOD: u16 = access::PUBLIC | access::ABSTRACT;

impl InterfaceType {
    /// An empty public interface
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access_flags: INTERFACE_FLAGS,
            super_interfaces: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// An empty public class (never adaptable)
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access_flags: access::PUBLIC | access::SUPER,
            super_interfaces: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn extends(mut self, super_interface: impl Into<String>) -> Self {
        self.super_interfaces.push(super_interface.into());
        self
    }

    /// Declare an abstract method
    pub fn with_abstract(mut self, name: &str, descriptor: &str) -> Result<Self> {
        self.methods
            .push(DeclaredMethod::new(name, descriptor, ABSTRACT_METHOD)?);
        Ok(self)
    }

    /// Declare a default (concrete instance) method
    pub fn with_default(mut self, name: &str, descriptor: &str) -> Result<Self> {
        self.methods
            .push(DeclaredMethod::new(name, descriptor, access::PUBLIC)?);
        Ok(self)
    }

    /// Declare a static method
    pub fn with_static(mut self, name: &str, descriptor: &str) -> Result<Self> {
        self.methods.push(DeclaredMethod::new(
            name,
            descriptor,
            access::PUBLIC | access::STATIC,
        )?);
        Ok(self)
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags & access::INTERFACE != 0
    }

    pub fn internal_name(&self) -> String {
        internal_name(&self.name)
    }

    pub fn from_class_file(class: &ClassFile) -> Result<Self> {
        let methods = class
            .methods
            .iter()
            .map(|m| DeclaredMethod::new(m.name.clone(), &m.descriptor, m.access_flags))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: binary_name(&class.this_class),
            access_flags: class.access_flags,
            super_interfaces: class.interfaces.iter().map(|i| binary_name(i)).collect(),
            methods,
        })
    }

    pub fn from_class_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_class_file(&classfile::reader::parse(bytes)?)
    }
}

/// Looks up types by binary name
pub trait TypeResolver {
    /// `Ok(None)` when the type is unknown to this resolver
    fn resolve(&self, name: &str) -> Result<Option<InterfaceType>>;
}

impl<T: TypeResolver + ?Sized> TypeResolver for &T {
    fn resolve(&self, name: &str) -> Result<Option<InterfaceType>> {
        (**self).resolve(name)
    }
}

/// In-memory type table
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, InterfaceType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with common JDK functional interfaces
    pub fn with_platform_types() -> Self {
        let mut registry = Self::new();
        for entry in PLATFORM_TYPES {
            registry.register(entry.build());
        }
        registry
    }

    pub fn register(&mut self, ty: InterfaceType) {
        self.types.insert(ty.name.clone(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&InterfaceType> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered type names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl TypeResolver for TypeRegistry {
    fn resolve(&self, name: &str) -> Result<Option<InterfaceType>> {
        Ok(self.types.get(name).cloned())
    }
}

/// Resolves types from `.class` files under a set of directories
///
/// Types not found on disk fall back to an in-memory registry.
#[derive(Debug, Clone, Default)]
pub struct ClassPath {
    roots: Vec<PathBuf>,
    fallback: TypeRegistry,
}

impl ClassPath {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
            fallback: TypeRegistry::new(),
        }
    }

    /// Fall back to the platform catalogue for types not found on disk
    pub fn with_platform_types(mut self) -> Self {
        self.fallback = TypeRegistry::with_platform_types();
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn class_file(root: &Path, name: &str) -> PathBuf {
        let mut path = root.join(internal_name(name));
        path.set_extension("class");
        path
    }
}

impl TypeResolver for ClassPath {
    fn resolve(&self, name: &str) -> Result<Option<InterfaceType>> {
        for root in &self.roots {
            let path = Self::class_file(root, name);
            if path.is_file() {
                log::debug!("Loading {} from {}", name, path.display());
                let bytes = fs::read(&path)?;
                let ty = InterfaceType::from_class_bytes(&bytes)?;
                if ty.name != name {
                    return Err(Error::ClassFormat(format!(
                        "{} declares {}, expected {}",
                        path.display(),
                        ty.name,
                        name
                    )));
                }
                return Ok(Some(ty));
            }
        }
        self.fallback.resolve(name)
    }
}

#[derive(Clone, Copy)]
enum Decl {
    Abstract,
    Default,
    Static,
}

struct PlatformType {
    name: &'static str,
    supers: &'static [&'static str],
    methods: &'static [(&'static str, &'static str, Decl)],
}

impl PlatformType {
    fn build(&self) -> InterfaceType {
        let mut ty = InterfaceType::interface(self.name);
        ty.super_interfaces = self.supers.iter().map(|s| s.to_string()).collect();
        for &(name, descriptor, decl) in self.methods {
            let flags = match decl {
                Decl::Abstract => ABSTRACT_METHOD,
                Decl::Default => access::PUBLIC,
                Decl::Static => access::PUBLIC | access::STATIC,
            };
            // The catalogue is static data; its descriptors are covered by tests.
            if let Ok(method) = DeclaredMethod::new(name, descriptor, flags) {
                ty.methods.push(method);
            }
        }
        ty
    }
}

static PLATFORM_TYPES: &[PlatformType] = &[
    PlatformType {
        name: "java.lang.Runnable",
        supers: &[],
        methods: &[("run", "()V", Decl::Abstract)],
    },
    PlatformType {
        name: "java.lang.AutoCloseable",
        supers: &[],
        methods: &[("close", "()V", Decl::Abstract)],
    },
    PlatformType {
        name: "java.io.Closeable",
        supers: &["java.lang.AutoCloseable"],
        methods: &[("close", "()V", Decl::Abstract)],
    },
    PlatformType {
        name: "java.lang.Comparable",
        supers: &[],
        methods: &[("compareTo", "(Ljava/lang/Object;)I", Decl::Abstract)],
    },
    PlatformType {
        name: "java.lang.Iterable",
        supers: &[],
        methods: &[
            ("iterator", "()Ljava/util/Iterator;", Decl::Abstract),
            ("forEach", "(Ljava/util/function/Consumer;)V", Decl::Default),
            ("spliterator", "()Ljava/util/Spliterator;", Decl::Default),
        ],
    },
    PlatformType {
        name: "java.util.Iterator",
        supers: &[],
        methods: &[
            ("hasNext", "()Z", Decl::Abstract),
            ("next", "()Ljava/lang/Object;", Decl::Abstract),
            ("remove", "()V", Decl::Default),
            ("forEachRemaining", "(Ljava/util/function/Consumer;)V", Decl::Default),
        ],
    },
    PlatformType {
        name: "java.util.Comparator",
        supers: &[],
        methods: &[
            ("compare", "(Ljava/lang/Object;Ljava/lang/Object;)I", Decl::Abstract),
            ("equals", "(Ljava/lang/Object;)Z", Decl::Abstract),
            ("reversed", "()Ljava/util/Comparator;", Decl::Default),
            ("thenComparing", "(Ljava/util/Comparator;)Ljava/util/Comparator;", Decl::Default),
            ("naturalOrder", "()Ljava/util/Comparator;", Decl::Static),
            ("reverseOrder", "()Ljava/util/Comparator;", Decl::Static),
        ],
    },
    PlatformType {
        name: "java.util.concurrent.Callable",
        supers: &[],
        methods: &[("call", "()Ljava/lang/Object;", Decl::Abstract)],
    },
    PlatformType {
        name: "java.util.function.Supplier",
        supers: &[],
        methods: &[("get", "()Ljava/lang/Object;", Decl::Abstract)],
    },
    PlatformType {
        name: "java.util.function.BooleanSupplier",
        supers: &[],
        methods: &[("getAsBoolean", "()Z", Decl::Abstract)],
    },
    PlatformType {
        name: "java.util.function.IntSupplier",
        supers: &[],
        methods: &[("getAsInt", "()I", Decl::Abstract)],
    },
    PlatformType {
        name: "java.util.function.LongSupplier",
        supers: &[],
        methods: &[("getAsLong", "()J", Decl::Abstract)],
    },
    PlatformType {
        name: "java.util.function.DoubleSupplier",
        supers: &[],
        methods: &[("getAsDouble", "()D", Decl::Abstract)],
    },
    PlatformType {
        name: "java.util.function.Consumer",
        supers: &[],
        methods: &[
            ("accept", "(Ljava/lang/Object;)V", Decl::Abstract),
            ("andThen", "(Ljava/util/function/Consumer;)Ljava/util/function/Consumer;", Decl::Default),
        ],
    },
    PlatformType {
        name: "java.util.function.BiConsumer",
        supers: &[],
        methods: &[
            ("accept", "(Ljava/lang/Object;Ljava/lang/Object;)V", Decl::Abstract),
            ("andThen", "(Ljava/util/function/BiConsumer;)Ljava/util/function/BiConsumer;", Decl::Default),
        ],
    },
    PlatformType {
        name: "java.util.function.IntConsumer",
        supers: &[],
        methods: &[
            ("accept", "(I)V", Decl::Abstract),
            ("andThen", "(Ljava/util/function/IntConsumer;)Ljava/util/function/IntConsumer;", Decl::Default),
        ],
    },
    PlatformType {
        name: "java.util.function.Function",
        supers: &[],
        methods: &[
            ("apply", "(Ljava/lang/Object;)Ljava/lang/Object;", Decl::Abstract),
            ("compose", "(Ljava/util/function/Function;)Ljava/util/function/Function;", Decl::Default),
            ("andThen", "(Ljava/util/function/Function;)Ljava/util/function/Function;", Decl::Default),
            ("identity", "()Ljava/util/function/Function;", Decl::Static),
        ],
    },
    PlatformType {
        name: "java.util.function.UnaryOperator",
        supers: &["java.util.function.Function"],
        methods: &[("identity", "()Ljava/util/function/UnaryOperator;", Decl::Static)],
    },
    PlatformType {
        name: "java.util.function.BiFunction",
        supers: &[],
        methods: &[
            ("apply", "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;", Decl::Abstract),
            ("andThen", "(Ljava/util/function/Function;)Ljava/util/function/BiFunction;", Decl::Default),
        ],
    },
    PlatformType {
        name: "java.util.function.BinaryOperator",
        supers: &["java.util.function.BiFunction"],
        methods: &[
            ("minBy", "(Ljava/util/Comparator;)Ljava/util/function/BinaryOperator;", Decl::Static),
            ("maxBy", "(Ljava/util/Comparator;)Ljava/util/function/BinaryOperator;", Decl::Static),
        ],
    },
    PlatformType {
        name: "java.util.function.Predicate",
        supers: &[],
        methods: &[
            ("test", "(Ljava/lang/Object;)Z", Decl::Abstract),
            ("and", "(Ljava/util/function/Predicate;)Ljava/util/function/Predicate;", Decl::Default),
            ("or", "(Ljava/util/function/Predicate;)Ljava/util/function/Predicate;", Decl::Default),
            ("negate", "()Ljava/util/function/Predicate;", Decl::Default),
            ("isEqual", "(Ljava/lang/Object;)Ljava/util/function/Predicate;", Decl::Static),
        ],
    },
    PlatformType {
        name: "java.util.function.BiPredicate",
        supers: &[],
        methods: &[
            ("test", "(Ljava/lang/Object;Ljava/lang/Object;)Z", Decl::Abstract),
            ("negate", "()Ljava/util/function/BiPredicate;", Decl::Default),
        ],
    },
    PlatformType {
        name: "java.util.function.IntPredicate",
        supers: &[],
        methods: &[
            ("test", "(I)Z", Decl::Abstract),
            ("and", "(Ljava/util/function/IntPredicate;)Ljava/util/function/IntPredicate;", Decl::Default),
            ("or", "(Ljava/util/function/IntPredicate;)Ljava/util/function/IntPredicate;", Decl::Default),
            ("negate", "()Ljava/util/function/IntPredicate;", Decl::Default),
        ],
    },
    PlatformType {
        name: "java.util.function.IntUnaryOperator",
        supers: &[],
        methods: &[("applyAsInt", "(I)I", Decl::Abstract)],
    },
    PlatformType {
        name: "java.util.function.IntBinaryOperator",
        supers: &[],
        methods: &[("applyAsInt", "(II)I", Decl::Abstract)],
    },
    PlatformType {
        name: "java.util.function.LongBinaryOperator",
        supers: &[],
        methods: &[("applyAsLong", "(JJ)J", Decl::Abstract)],
    },
    PlatformType {
        name: "java.util.function.DoubleUnaryOperator",
        supers: &[],
        methods: &[("applyAsDouble", "(D)D", Decl::Abstract)],
    },
    PlatformType {
        name: "java.util.function.DoubleBinaryOperator",
        supers: &[],
        methods: &[("applyAsDouble", "(DD)D", Decl::Abstract)],
    },
    PlatformType {
        name: "java.util.function.ToIntFunction",
        supers: &[],
        methods: &[("applyAsInt", "(Ljava/lang/Object;)I", Decl::Abstract)],
    },
    PlatformType {
        name: "java.util.function.ToLongFunction",
        supers: &[],
        methods: &[("applyAsLong", "(Ljava/lang/Object;)J", Decl::Abstract)],
    },
    PlatformType {
        name: "java.util.function.ToDoubleFunction",
        supers: &[],
        methods: &[("applyAsDouble", "(Ljava/lang/Object;)D", Decl::Abstract)],
    },
    PlatformType {
        name: "java.util.function.IntFunction",
        supers: &[],
        methods: &[("apply", "(I)Ljava/lang/Object;", Decl::Abstract)],
    },
    PlatformType {
        name: "java.util.function.ObjIntConsumer",
        supers: &[],
        methods: &[("accept", "(Ljava/lang/Object;I)V", Decl::Abstract)],
    },
];
