//! In-process adapters over dynamic values
//!
//! [`AdapterClass`] is the dynamic-dispatch counterpart of a generated class
//! file: it is built from the same [`AdapterSpec`], exposes the same
//! `convert` entry point and forwards its single method through the same
//! coercion table. It is what a host without a class loader (and the test
//! suite) uses to run adapters directly.
//!
//! Values follow the JVM's reference model: primitives only ever cross the
//! adapter boundary in boxed form, and identity of reference values is
//! `Arc` pointer identity.

use crate::adapter::AdapterSpec;
use crate::coercion::{self, box_primitive};
use crate::descriptor::{Kind, PrimitiveKind, ReturnKind, binary_name, OBJECT_CLASS};
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// A primitive value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Boolean(bool),
    /// UTF-16 code unit
    Char(u16),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl Primitive {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::Boolean(_) => PrimitiveKind::Boolean,
            Primitive::Char(_) => PrimitiveKind::Char,
            Primitive::Byte(_) => PrimitiveKind::Byte,
            Primitive::Short(_) => PrimitiveKind::Short,
            Primitive::Int(_) => PrimitiveKind::Int,
            Primitive::Long(_) => PrimitiveKind::Long,
            Primitive::Float(_) => PrimitiveKind::Float,
            Primitive::Double(_) => PrimitiveKind::Double,
        }
    }
}

/// Something that can be invoked with a sequence of loosely typed arguments
///
/// The number of arguments is the arity of the call.
pub trait GenericCallable: Send + Sync {
    fn invoke(&self, args: &[Value]) -> Result<Value>;
}

/// A heap object visible to adapters
pub trait HostObject: Send + Sync {
    /// Binary class name (`java.util.Comparator`)
    fn class_name(&self) -> &str;

    /// Whether this object can be cast to the given binary class name
    fn is_instance_of(&self, class: &str) -> bool {
        class == "java.lang.Object" || class == self.class_name()
    }

    /// The callable view of this object, if it is one
    fn as_callable(&self) -> Option<&dyn GenericCallable> {
        None
    }

    /// Invoke an instance method by name; `Ok(None)` is a void return
    fn invoke_method(&self, method: &str, _args: &[Value]) -> Result<Option<Value>> {
        Err(Error::NoSuchMethod {
            class: self.class_name().to_string(),
            method: method.to_string(),
        })
    }
}

/// A dynamically typed value
#[derive(Clone)]
pub enum Value {
    Null,
    Boxed(Primitive),
    Str(Arc<str>),
    Object(Arc<dyn HostObject>),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    pub fn object(obj: impl HostObject + 'static) -> Self {
        Value::Object(Arc::new(obj))
    }

    pub fn int(v: i32) -> Self {
        Value::Boxed(Primitive::Int(v))
    }

    pub fn long(v: i64) -> Self {
        Value::Boxed(Primitive::Long(v))
    }

    pub fn boolean(v: bool) -> Self {
        Value::Boxed(Primitive::Boolean(v))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match self {
            Value::Boxed(p) => Some(*p),
            _ => None,
        }
    }

    /// Binary class name of the runtime type, `null` for the absent value
    pub fn type_label(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boxed(p) => binary_name(coercion::coercion(p.kind()).boxed_class),
            Value::Str(_) => "java.lang.String".to_string(),
            Value::Object(obj) => obj.class_name().to_string(),
        }
    }

    /// `instanceof` against a binary class name; `null` is never an instance
    pub fn is_instance_of(&self, class: &str) -> bool {
        match self {
            Value::Null => false,
            Value::Boxed(p) => {
                matches!(
                    class,
                    "java.lang.Object" | "java.io.Serializable" | "java.lang.Comparable"
                ) || (class == "java.lang.Number" && p.kind().is_numeric())
                    || binary_name(coercion::coercion(p.kind()).boxed_class) == class
            }
            Value::Str(_) => matches!(
                class,
                "java.lang.Object"
                    | "java.lang.String"
                    | "java.lang.CharSequence"
                    | "java.lang.Comparable"
                    | "java.io.Serializable"
            ),
            Value::Object(obj) => obj.is_instance_of(class),
        }
    }

    /// Reference identity: both null, or both the same heap object
    pub fn same_ref(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Str(x), Value::Str(y)) => Arc::ptr_eq(x, y),
            (Value::Object(x), Value::Object(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }

    /// Invoke an instance method on this value
    pub fn invoke_method(&self, method: &str, args: &[Value]) -> Result<Option<Value>> {
        match self {
            Value::Object(obj) => obj.invoke_method(method, args),
            other => Err(Error::NoSuchMethod {
                class: other.type_label(),
                method: method.to_string(),
            }),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boxed(a), Value::Boxed(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => Value::same_ref(self, other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Boxed(p) => write!(f, "{:?}", p),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Object(obj) => write!(f, "#<{}>", obj.class_name()),
        }
    }
}

type CallableFn = dyn Fn(&[Value]) -> Result<Value> + Send + Sync;

/// A closure exposed as a generic callable object
pub struct Callable {
    class_name: String,
    interfaces: Vec<String>,
    f: Box<CallableFn>,
}

impl Callable {
    /// Class reported by callables built with [`Callable::new`]
    pub const DEFAULT_CLASS: &'static str = "clojure.lang.AFunction";

    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            class_name: Self::DEFAULT_CLASS.to_string(),
            interfaces: vec!["clojure.lang.IFn".to_string()],
            f: Box::new(f),
        }
    }

    /// Declare an additional interface this callable's class implements
    pub fn implementing(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }
}

impl GenericCallable for Callable {
    fn invoke(&self, args: &[Value]) -> Result<Value> {
        (self.f)(args)
    }
}

impl HostObject for Callable {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn is_instance_of(&self, class: &str) -> bool {
        class == "java.lang.Object"
            || class == self.class_name
            || self.interfaces.iter().any(|i| i == class)
    }

    fn as_callable(&self) -> Option<&dyn GenericCallable> {
        Some(self)
    }
}

/// A loaded adapter type: the `convert` entry point of one [`AdapterSpec`]
#[derive(Debug, Clone)]
pub struct AdapterClass {
    spec: Arc<AdapterSpec>,
    class_name: Arc<str>,
}

impl AdapterClass {
    pub fn new(spec: AdapterSpec) -> Self {
        let class_name = Arc::from(binary_name(&spec.name));
        Self {
            spec: Arc::new(spec),
            class_name,
        }
    }

    pub fn spec(&self) -> &AdapterSpec {
        &self.spec
    }

    /// Binary name of the adapter type
    pub fn name(&self) -> &str {
        &self.class_name
    }

    /// Null passthrough, identity short-circuit, otherwise wrap the callable
    pub fn convert(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        if value.is_instance_of(&self.spec.target.name) {
            return Ok(value);
        }
        match value {
            Value::Object(obj) if obj.as_callable().is_some() => {
                log::trace!("wrapping {} in {}", obj.class_name(), self.class_name);
                Ok(Value::Object(Arc::new(SamAdapter {
                    spec: Arc::clone(&self.spec),
                    class_name: Arc::clone(&self.class_name),
                    delegate: obj,
                })))
            }
            other => Err(Error::TypeMismatch {
                expected: binary_name(&self.spec.callable.class),
                found: other.type_label(),
            }),
        }
    }
}

/// An adapter instance forwarding the SAM method to a captured callable
pub struct SamAdapter {
    spec: Arc<AdapterSpec>,
    class_name: Arc<str>,
    delegate: Arc<dyn HostObject>,
}

impl SamAdapter {
    /// Invoke the single abstract method
    pub fn call(&self, args: &[Value]) -> Result<Option<Value>> {
        let target = &self.spec.target;
        let params = &target.signature.params;
        if args.len() != params.len() {
            return Err(Error::InvalidArguments {
                method: target.method_label(),
                reason: format!("expected {} arguments, got {}", params.len(), args.len()),
            });
        }

        let mut forwarded = Vec::with_capacity(args.len());
        for (param, arg) in params.iter().zip(args) {
            match param {
                Kind::Primitive(kind) => {
                    let prim = coercion::expect_primitive(*kind, arg)?;
                    forwarded.push(box_primitive(prim));
                }
                Kind::Reference(class) => {
                    if !conforms(arg, class) {
                        return Err(Error::InvalidArguments {
                            method: target.method_label(),
                            reason: format!("{} is not a {}", arg.type_label(), binary_name(class)),
                        });
                    }
                    forwarded.push(arg.clone());
                }
            }
        }

        let callable = self.delegate.as_callable().ok_or_else(|| Error::TypeMismatch {
            expected: binary_name(&self.spec.callable.class),
            found: self.delegate.class_name().to_string(),
        })?;
        let result = callable.invoke(&forwarded)?;

        match &target.signature.ret {
            ReturnKind::Void => Ok(None),
            ReturnKind::Value(Kind::Primitive(kind)) => {
                Ok(Some(Value::Boxed(coercion::unbox(*kind, &result)?)))
            }
            ReturnKind::Value(Kind::Reference(class)) => {
                if conforms(&result, class) {
                    Ok(Some(result))
                } else {
                    Err(Error::TypeMismatch {
                        expected: binary_name(class),
                        found: result.type_label(),
                    })
                }
            }
        }
    }
}

impl HostObject for SamAdapter {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn is_instance_of(&self, class: &str) -> bool {
        class == "java.lang.Object" || class == self.spec.target.name || class == &*self.class_name
    }

    fn invoke_method(&self, method: &str, args: &[Value]) -> Result<Option<Value>> {
        if method == self.spec.target.method_name {
            self.call(args)
        } else {
            Err(Error::NoSuchMethod {
                class: self.class_name.to_string(),
                method: method.to_string(),
            })
        }
    }
}

/// Checkcast semantics: null and `java/lang/Object` always pass
fn conforms(value: &Value, class: &str) -> bool {
    value.is_null() || class == OBJECT_CLASS || value.is_instance_of(&binary_name(class))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxed_instance_checks() {
        let v = Value::int(3);
        assert!(v.is_instance_of("java.lang.Integer"));
        assert!(v.is_instance_of("java.lang.Number"));
        assert!(v.is_instance_of("java.lang.Object"));
        assert!(!v.is_instance_of("java.lang.Long"));

        let c = Value::Boxed(Primitive::Char(65));
        assert!(c.is_instance_of("java.lang.Character"));
        assert!(!c.is_instance_of("java.lang.Number"));
    }

    #[test]
    fn test_null_is_never_an_instance() {
        assert!(!Value::Null.is_instance_of("java.lang.Object"));
        assert!(conforms(&Value::Null, "java/lang/String"));
    }

    #[test]
    fn test_type_labels() {
        assert_eq!(Value::Null.type_label(), "null");
        assert_eq!(Value::long(1).type_label(), "java.lang.Long");
        assert_eq!(Value::string("x").type_label(), "java.lang.String");
        let f = Value::object(Callable::new(|_| Ok(Value::Null)));
        assert_eq!(f.type_label(), "clojure.lang.AFunction");
    }

    #[test]
    fn test_same_ref_is_identity() {
        let a = Value::string("x");
        let b = Value::string("x");
        assert!(Value::same_ref(&a, &a.clone()));
        assert!(!Value::same_ref(&a, &b));
        assert_eq!(a, b);
    }

    #[test]
    fn test_callable_invokes_closure() {
        let f = Callable::new(|args| Ok(Value::int(args.len() as i32)));
        let out = f.invoke(&[Value::Null, Value::Null]).unwrap();
        assert_eq!(out, Value::int(2));
        assert!(f.is_instance_of("clojure.lang.IFn"));
        assert!(!f.is_instance_of("java.lang.Runnable"));
    }

    #[test]
    fn test_invoke_method_on_primitive_fails() {
        let err = Value::int(1).invoke_method("get", &[]).unwrap_err();
        assert!(matches!(err, Error::NoSuchMethod { .. }));
    }
}
