//! Single-abstract-method detection
//!
//! The detector walks an interface and all of its super-interfaces, keeps
//! the most specific declaration of each `(name, descriptor)` pair and
//! counts the ones that remain abstract. Exactly one means the interface
//! can be adapted.

use crate::descriptor::TargetInterfaceDescriptor;
use crate::introspect::{DeclaredMethod, InterfaceType, TypeResolver};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet, VecDeque};

/// How abstract redeclarations of public `java.lang.Object` methods count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectMethodPolicy {
    /// Ignore abstract `equals`, `hashCode` and `toString`; every
    /// implementation inherits them from `Object`
    #[default]
    Exclude,
    /// Count every abstract method, so e.g. `java.util.Comparator` is rejected
    Naive,
}

/// Object methods an interface may redeclare abstractly
const OBJECT_METHODS: &[(&str, &str)] = &[
    ("equals", "(Ljava/lang/Object;)Z"),
    ("hashCode", "()I"),
    ("toString", "()Ljava/lang/String;"),
];

fn is_object_method(method: &DeclaredMethod) -> bool {
    let descriptor = method.descriptor();
    OBJECT_METHODS
        .iter()
        .any(|&(name, desc)| method.name == name && descriptor == desc)
}

/// Transitive super-interfaces of every type in `hierarchy`, by name
fn super_interface_sets(hierarchy: &[InterfaceType]) -> HashMap<&str, HashSet<&str>> {
    let by_name: HashMap<&str, &InterfaceType> =
        hierarchy.iter().map(|t| (t.name.as_str(), t)).collect();
    hierarchy
        .iter()
        .map(|ty| {
            let mut found = HashSet::new();
            let mut stack: Vec<&str> = ty.super_interfaces.iter().map(String::as_str).collect();
            while let Some(name) = stack.pop() {
                if !found.insert(name) {
                    continue;
                }
                if let Some(&super_type) = by_name.get(name) {
                    stack.extend(super_type.super_interfaces.iter().map(String::as_str));
                }
            }
            (ty.name.as_str(), found)
        })
        .collect()
}

/// An abstract method together with the interface that declares it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractMethod {
    pub declared_in: String,
    pub method: DeclaredMethod,
}

/// Finds the single abstract method of an interface
pub struct SamDetector<R> {
    resolver: R,
    policy: ObjectMethodPolicy,
}

impl<R: TypeResolver> SamDetector<R> {
    pub fn new(resolver: R, policy: ObjectMethodPolicy) -> Self {
        Self { resolver, policy }
    }

    pub fn policy(&self) -> ObjectMethodPolicy {
        self.policy
    }

    /// `ty` followed by every super-interface, breadth-first
    fn hierarchy(&self, ty: &InterfaceType) -> Result<Vec<InterfaceType>> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(ty.name.clone());
        queue.push_back(ty.clone());

        let mut hierarchy = Vec::new();
        while let Some(current) = queue.pop_front() {
            for super_name in &current.super_interfaces {
                if !visited.insert(super_name.clone()) {
                    continue;
                }
                let super_type = self
                    .resolver
                    .resolve(super_name)?
                    .ok_or_else(|| Error::UnresolvedType(super_name.clone()))?;
                queue.push_back(super_type);
            }
            hierarchy.push(current);
        }
        Ok(hierarchy)
    }

    /// Abstract methods of `ty`'s full method set, in discovery order
    ///
    /// Every declaration of a `(name, descriptor)` pair is collected first.
    /// A declaration is overridden when another one comes from one of its
    /// sub-interfaces; the method is abstract only if every declaration
    /// left over is abstract.
    pub fn abstract_methods(&self, ty: &InterfaceType) -> Result<Vec<AbstractMethod>> {
        if !ty.is_interface() {
            return Err(Error::not_sam(&ty.name, "not an interface"));
        }

        let hierarchy = self.hierarchy(ty)?;
        let supers = super_interface_sets(&hierarchy);
        let is_super_of = |candidate: &str, sub: &str| {
            supers.get(sub).is_some_and(|set| set.contains(candidate))
        };

        let mut keys: Vec<(String, String)> = Vec::new();
        let mut declarations: HashMap<(String, String), Vec<AbstractMethod>> = HashMap::new();
        for current in &hierarchy {
            for method in current.methods.iter().filter(|m| m.is_candidate()) {
                let key = (method.name.clone(), method.descriptor());
                declarations
                    .entry(key.clone())
                    .or_insert_with(|| {
                        keys.push(key);
                        Vec::new()
                    })
                    .push(AbstractMethod {
                        declared_in: current.name.clone(),
                        method: method.clone(),
                    });
            }
        }

        let mut methods = Vec::new();
        for key in &keys {
            let Some(declared) = declarations.remove(key) else {
                continue;
            };
            let most_specific: Vec<&AbstractMethod> = declared
                .iter()
                .filter(|d| {
                    !declared.iter().any(|other| {
                        is_super_of(d.declared_in.as_str(), other.declared_in.as_str())
                    })
                })
                .collect();
            match most_specific.first() {
                Some(first) if most_specific.iter().all(|d| d.method.is_abstract()) => {
                    methods.push((*first).clone());
                }
                _ => {}
            }
        }

        Ok(methods
            .into_iter()
            .filter(|m| self.policy == ObjectMethodPolicy::Naive || !is_object_method(&m.method))
            .collect())
    }

    /// Whether `ty` can be adapted
    ///
    /// Any failure while inspecting the type, including an unresolvable
    /// super-interface, counts as not adaptable.
    pub fn is_adaptable(&self, ty: &InterfaceType) -> bool {
        match self.describe(ty) {
            Ok(_) => true,
            Err(e) => {
                log::debug!("{} is not adaptable: {}", ty.name, e);
                false
            }
        }
    }

    /// The single abstract method of `ty`
    pub fn describe(&self, ty: &InterfaceType) -> Result<TargetInterfaceDescriptor> {
        let mut abstract_methods = self.abstract_methods(ty)?;
        match abstract_methods.len() {
            1 => {
                let sam = abstract_methods.remove(0);
                log::debug!(
                    "{} has single abstract method {} (declared in {})",
                    ty.name,
                    sam.method.name,
                    sam.declared_in
                );
                Ok(TargetInterfaceDescriptor::new(
                    ty.name.clone(),
                    sam.method.name,
                    sam.method.signature,
                ))
            }
            0 => Err(Error::not_sam(&ty.name, "no abstract methods")),
            n => {
                let names: Vec<String> = abstract_methods
                    .iter()
                    .map(|m| format!("{}{}", m.method.name, m.method.descriptor()))
                    .collect();
                Err(Error::not_sam(
                    &ty.name,
                    format!("{} abstract methods: {}", n, names.join(", ")),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Kind, PrimitiveKind, ReturnKind};
    use crate::introspect::TypeRegistry;

    fn detect(name: &str, policy: ObjectMethodPolicy) -> Result<TargetInterfaceDescriptor> {
        let registry = TypeRegistry::with_platform_types();
        let ty = registry.get(name).unwrap().clone();
        SamDetector::new(&registry, policy).describe(&ty)
    }

    #[test]
    fn test_direct_sam() {
        let sam = detect("java.util.function.IntPredicate", ObjectMethodPolicy::Exclude).unwrap();
        assert_eq!(sam.method_name, "test");
        assert_eq!(sam.signature.params, vec![Kind::Primitive(PrimitiveKind::Int)]);
        assert_eq!(
            sam.signature.ret,
            ReturnKind::Value(Kind::Primitive(PrimitiveKind::Boolean))
        );
    }

    #[test]
    fn test_inherited_sam() {
        let sam = detect("java.util.function.UnaryOperator", ObjectMethodPolicy::Exclude).unwrap();
        assert_eq!(sam.name, "java.util.function.UnaryOperator");
        assert_eq!(sam.method_name, "apply");
        assert_eq!(sam.signature.arity(), 1);
    }

    #[test]
    fn test_redeclared_abstract_method_counts_once() {
        let sam = detect("java.io.Closeable", ObjectMethodPolicy::Exclude).unwrap();
        assert_eq!(sam.method_name, "close");
    }

    #[test]
    fn test_comparator_depends_on_policy() {
        let sam = detect("java.util.Comparator", ObjectMethodPolicy::Exclude).unwrap();
        assert_eq!(sam.method_name, "compare");

        let err = detect("java.util.Comparator", ObjectMethodPolicy::Naive).unwrap_err();
        assert!(matches!(err, Error::NotASamInterface { .. }));
    }

    #[test]
    fn test_two_abstract_methods_rejected() {
        let err = detect("java.util.Iterator", ObjectMethodPolicy::Exclude).unwrap_err();
        match err {
            Error::NotASamInterface { reason, .. } => {
                assert!(reason.starts_with("2 abstract methods"));
                assert!(reason.contains("hasNext()Z"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_in_sub_interface_shadows_abstract() {
        let mut registry = TypeRegistry::new();
        registry.register(
            InterfaceType::interface("a.Base")
                .with_abstract("f", "()V")
                .unwrap()
                .with_abstract("g", "()V")
                .unwrap(),
        );
        let derived = InterfaceType::interface("a.Derived")
            .extends("a.Base")
            .with_default("g", "()V")
            .unwrap();
        let sam = SamDetector::new(&registry, ObjectMethodPolicy::Exclude)
            .describe(&derived)
            .unwrap();
        assert_eq!(sam.method_name, "f");
    }

    /// `d.B { f(); g(); }` and `d.C extends d.B { default g() }`
    fn diamond_registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register(
            InterfaceType::interface("d.B")
                .with_abstract("f", "()V")
                .unwrap()
                .with_abstract("g", "()V")
                .unwrap(),
        );
        registry.register(
            InterfaceType::interface("d.C")
                .extends("d.B")
                .with_default("g", "()V")
                .unwrap(),
        );
        registry
    }

    #[test]
    fn test_default_in_sibling_sub_interface_wins() {
        let registry = diamond_registry();
        let detector = SamDetector::new(&registry, ObjectMethodPolicy::Exclude);

        // B is visited before C, but C's default overrides B's abstract g
        let i = InterfaceType::interface("d.I").extends("d.B").extends("d.C");
        let sam = detector.describe(&i).unwrap();
        assert_eq!(sam.method_name, "f");

        let j = InterfaceType::interface("d.J").extends("d.C").extends("d.B");
        let sam = detector.describe(&j).unwrap();
        assert_eq!(sam.method_name, "f");
    }

    #[test]
    fn test_reabstracted_default_counts_again() {
        let mut registry = TypeRegistry::new();
        registry.register(
            InterfaceType::interface("r.B")
                .with_abstract("f", "()V")
                .unwrap()
                .with_default("g", "()V")
                .unwrap(),
        );
        registry.register(
            InterfaceType::interface("r.C")
                .extends("r.B")
                .with_abstract("g", "()V")
                .unwrap(),
        );
        let detector = SamDetector::new(&registry, ObjectMethodPolicy::Exclude);

        for ty in [
            InterfaceType::interface("r.I").extends("r.B").extends("r.C"),
            InterfaceType::interface("r.J").extends("r.C").extends("r.B"),
        ] {
            let methods = detector.abstract_methods(&ty).unwrap();
            let names: Vec<_> = methods.iter().map(|m| m.method.name.as_str()).collect();
            assert_eq!(names.len(), 2, "{}", ty.name);
            assert!(names.contains(&"f") && names.contains(&"g"), "{}", ty.name);
            let g = methods.iter().find(|m| m.method.name == "g").unwrap();
            assert_eq!(g.declared_in, "r.C");
            assert!(!detector.is_adaptable(&ty));
        }
    }

    #[test]
    fn test_equals_only_interface_depends_on_policy() {
        let registry = TypeRegistry::new();
        let ty = InterfaceType::interface("o.Equality")
            .with_abstract("equals", "(Ljava/lang/Object;)Z")
            .unwrap();

        let err = SamDetector::new(&registry, ObjectMethodPolicy::Exclude)
            .describe(&ty)
            .unwrap_err();
        assert!(err.to_string().contains("no abstract methods"));

        let sam = SamDetector::new(&registry, ObjectMethodPolicy::Naive)
            .describe(&ty)
            .unwrap();
        assert_eq!(sam.method_name, "equals");
    }

    #[test]
    fn test_abstract_to_string_is_not_selected() {
        let registry = TypeRegistry::new();
        let ty = InterfaceType::interface("o.Task")
            .with_abstract("toString", "()Ljava/lang/String;")
            .unwrap()
            .with_abstract("run", "()V")
            .unwrap();
        let detector = SamDetector::new(&registry, ObjectMethodPolicy::Exclude);
        let sam = detector.describe(&ty).unwrap();
        assert_eq!(sam.method_name, "run");
        assert_eq!(sam.signature.descriptor(), "()V");

        assert!(!SamDetector::new(&registry, ObjectMethodPolicy::Naive).is_adaptable(&ty));
    }

    #[test]
    fn test_marker_and_static_only_interfaces_rejected() {
        let registry = TypeRegistry::new();
        let detector = SamDetector::new(&registry, ObjectMethodPolicy::Exclude);
        let marker = InterfaceType::interface("a.Marker");
        assert!(!detector.is_adaptable(&marker));
        let statics = InterfaceType::interface("a.Util")
            .with_static("of", "()La/Util;")
            .unwrap();
        assert!(!detector.is_adaptable(&statics));
    }

    #[test]
    fn test_class_is_not_adaptable() {
        let registry = TypeRegistry::new();
        let detector = SamDetector::new(&registry, ObjectMethodPolicy::Exclude);
        let class = InterfaceType::class("a.Widget").with_abstract("run", "()V").unwrap();
        let err = detector.describe(&class).unwrap_err();
        assert!(err.to_string().contains("not an interface"));
    }

    #[test]
    fn test_unresolved_super_interface() {
        let registry = TypeRegistry::new();
        let detector = SamDetector::new(&registry, ObjectMethodPolicy::Exclude);
        let ty = InterfaceType::interface("a.Sub").extends("a.Missing");
        assert!(matches!(
            detector.describe(&ty),
            Err(Error::UnresolvedType(name)) if name == "a.Missing"
        ));
        assert!(!detector.is_adaptable(&ty));
    }
}
