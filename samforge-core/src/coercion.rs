//! Primitive coercion table
//!
//! For each of the eight primitive kinds this table supplies the boxing
//! call (`Integer.valueOf(int)`, ...) and the unboxing sequence
//! (`checkcast java/lang/Number; invokevirtual intValue()I`, ...) used by
//! the forwarding-method emitter, together with the equivalent operations
//! on dynamic [`Value`]s used by the in-process adapters.

use crate::descriptor::PrimitiveKind;
use crate::runtime::{Primitive, Value};
use crate::{Error, Result};

/// A method reference inside the constant pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodRef {
    pub owner: &'static str,
    pub name: &'static str,
    pub descriptor: &'static str,
}

/// Box and unbox operations for one primitive kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coercion {
    pub kind: PrimitiveKind,
    /// Wrapper class internal name (`java/lang/Integer`)
    pub boxed_class: &'static str,
    /// Static `valueOf` on the wrapper
    pub box_method: MethodRef,
    /// Class the generic result is cast to before unboxing
    pub unbox_owner: &'static str,
    /// Virtual `xValue()` on `unbox_owner`
    pub unbox_method: MethodRef,
}

const NUMBER_CLASS: &str = "java/lang/Number";

const fn numeric(
    kind: PrimitiveKind,
    boxed_class: &'static str,
    box_descriptor: &'static str,
    unbox_name: &'static str,
    unbox_descriptor: &'static str,
) -> Coercion {
    Coercion {
        kind,
        boxed_class,
        box_method: MethodRef {
            owner: boxed_class,
            name: "valueOf",
            descriptor: box_descriptor,
        },
        unbox_owner: NUMBER_CLASS,
        unbox_method: MethodRef {
            owner: NUMBER_CLASS,
            name: unbox_name,
            descriptor: unbox_descriptor,
        },
    }
}

// Indexed by `PrimitiveKind as usize`.
static TABLE: [Coercion; 8] = [
    Coercion {
        kind: PrimitiveKind::Boolean,
        boxed_class: "java/lang/Boolean",
        box_method: MethodRef {
            owner: "java/lang/Boolean",
            name: "valueOf",
            descriptor: "(Z)Ljava/lang/Boolean;",
        },
        unbox_owner: "java/lang/Boolean",
        unbox_method: MethodRef {
            owner: "java/lang/Boolean",
            name: "booleanValue",
            descriptor: "()Z",
        },
    },
    Coercion {
        kind: PrimitiveKind::Char,
        boxed_class: "java/lang/Character",
        box_method: MethodRef {
            owner: "java/lang/Character",
            name: "valueOf",
            descriptor: "(C)Ljava/lang/Character;",
        },
        unbox_owner: "java/lang/Character",
        unbox_method: MethodRef {
            owner: "java/lang/Character",
            name: "charValue",
            descriptor: "()C",
        },
    },
    numeric(
        PrimitiveKind::Byte,
        "java/lang/Byte",
        "(B)Ljava/lang/Byte;",
        "byteValue",
        "()B",
    ),
    numeric(
        PrimitiveKind::Short,
        "java/lang/Short",
        "(S)Ljava/lang/Short;",
        "shortValue",
        "()S",
    ),
    numeric(
        PrimitiveKind::Int,
        "java/lang/Integer",
        "(I)Ljava/lang/Integer;",
        "intValue",
        "()I",
    ),
    numeric(
        PrimitiveKind::Long,
        "java/lang/Long",
        "(J)Ljava/lang/Long;",
        "longValue",
        "()J",
    ),
    numeric(
        PrimitiveKind::Float,
        "java/lang/Float",
        "(F)Ljava/lang/Float;",
        "floatValue",
        "()F",
    ),
    numeric(
        PrimitiveKind::Double,
        "java/lang/Double",
        "(D)Ljava/lang/Double;",
        "doubleValue",
        "()D",
    ),
];

/// Look up the coercion entry for a primitive kind
pub fn coercion(kind: PrimitiveKind) -> &'static Coercion {
    &TABLE[kind as usize]
}

/// Box a primitive into its wrapper representation
pub fn box_primitive(value: Primitive) -> Value {
    Value::Boxed(value)
}

/// Unbox a dynamic value to `kind`, following `Number.xValue()` semantics
///
/// Numeric kinds accept any boxed number and narrow it the way the JVM
/// does; `boolean` and `char` only accept their own wrapper.
pub fn unbox(kind: PrimitiveKind, value: &Value) -> Result<Primitive> {
    let boxed = match value {
        Value::Boxed(p) => *p,
        other => return Err(coercion_error(kind, other)),
    };

    match (kind, boxed) {
        (PrimitiveKind::Boolean, Primitive::Boolean(b)) => Ok(Primitive::Boolean(b)),
        (PrimitiveKind::Char, Primitive::Char(c)) => Ok(Primitive::Char(c)),
        (PrimitiveKind::Boolean | PrimitiveKind::Char, _) => Err(coercion_error(kind, value)),
        (_, p) => match Number::of(p) {
            Some(n) => Ok(n.narrow(kind)),
            None => Err(coercion_error(kind, value)),
        },
    }
}

/// Check that an argument passed for a primitive parameter has exactly that kind
pub fn expect_primitive(kind: PrimitiveKind, value: &Value) -> Result<Primitive> {
    match value {
        Value::Boxed(p) if p.kind() == kind => Ok(*p),
        other => Err(coercion_error(kind, other)),
    }
}

fn coercion_error(kind: PrimitiveKind, found: &Value) -> Error {
    Error::Coercion {
        expected: kind.java_name().to_string(),
        found: found.type_label(),
    }
}

/// A boxed number, widened to its integral or floating representation
#[derive(Debug, Clone, Copy)]
enum Number {
    Integral(i64),
    Floating(f64),
    Float(f32),
}

impl Number {
    fn of(p: Primitive) -> Option<Self> {
        match p {
            Primitive::Byte(v) => Some(Number::Integral(v.into())),
            Primitive::Short(v) => Some(Number::Integral(v.into())),
            Primitive::Int(v) => Some(Number::Integral(v.into())),
            Primitive::Long(v) => Some(Number::Integral(v)),
            Primitive::Float(v) => Some(Number::Float(v)),
            Primitive::Double(v) => Some(Number::Floating(v)),
            Primitive::Boolean(_) | Primitive::Char(_) => None,
        }
    }

    fn narrow(self, kind: PrimitiveKind) -> Primitive {
        match (self, kind) {
            (Number::Integral(v), PrimitiveKind::Byte) => Primitive::Byte(v as i8),
            (Number::Integral(v), PrimitiveKind::Short) => Primitive::Short(v as i16),
            (Number::Integral(v), PrimitiveKind::Int) => Primitive::Int(v as i32),
            (Number::Integral(v), PrimitiveKind::Long) => Primitive::Long(v),
            (Number::Integral(v), PrimitiveKind::Float) => Primitive::Float(v as f32),
            (Number::Integral(v), PrimitiveKind::Double) => Primitive::Double(v as f64),
            (Number::Float(v), PrimitiveKind::Float) => Primitive::Float(v),
            (Number::Float(v), _) => Number::Floating(v.into()).narrow(kind),
            // Float-to-byte/short goes through int, as in the JVM's d2i + i2b.
            (Number::Floating(v), PrimitiveKind::Byte) => Primitive::Byte((v as i32) as i8),
            (Number::Floating(v), PrimitiveKind::Short) => Primitive::Short((v as i32) as i16),
            (Number::Floating(v), PrimitiveKind::Int) => Primitive::Int(v as i32),
            (Number::Floating(v), PrimitiveKind::Long) => Primitive::Long(v as i64),
            (Number::Floating(v), PrimitiveKind::Float) => Primitive::Float(v as f32),
            (Number::Floating(v), PrimitiveKind::Double) => Primitive::Double(v),
            (_, PrimitiveKind::Boolean | PrimitiveKind::Char) => {
                unreachable!("non-numeric kinds are handled by unbox")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Kind, MethodSignature, ReturnKind};

    #[test]
    fn test_table_is_total_and_ordered() {
        for kind in PrimitiveKind::ALL {
            let entry = coercion(kind);
            assert_eq!(entry.kind, kind);
            assert_eq!(entry.box_method.owner, entry.boxed_class);
            assert_eq!(entry.box_method.name, "valueOf");
        }
    }

    #[test]
    fn test_box_descriptors_are_consistent() {
        for kind in PrimitiveKind::ALL {
            let entry = coercion(kind);
            let sig = MethodSignature::parse(entry.box_method.descriptor).unwrap();
            assert_eq!(sig.params, vec![Kind::Primitive(kind)]);
            assert_eq!(
                sig.ret,
                ReturnKind::Value(Kind::Reference(entry.boxed_class.to_string()))
            );

            let unbox_sig = MethodSignature::parse(entry.unbox_method.descriptor).unwrap();
            assert!(unbox_sig.params.is_empty());
            assert_eq!(unbox_sig.ret, ReturnKind::Value(Kind::Primitive(kind)));
        }
    }

    #[test]
    fn test_unbox_owner_for_numeric_kinds_is_number() {
        assert_eq!(coercion(PrimitiveKind::Int).unbox_owner, "java/lang/Number");
        assert_eq!(coercion(PrimitiveKind::Double).unbox_owner, "java/lang/Number");
        assert_eq!(coercion(PrimitiveKind::Char).unbox_owner, "java/lang/Character");
        assert_eq!(coercion(PrimitiveKind::Boolean).unbox_owner, "java/lang/Boolean");
    }

    #[test]
    fn test_unbox_narrows_like_number() {
        let long = Value::Boxed(Primitive::Long(0x1_0000_0005));
        assert_eq!(unbox(PrimitiveKind::Int, &long).unwrap(), Primitive::Int(5));

        let double = Value::Boxed(Primitive::Double(300.7));
        assert_eq!(unbox(PrimitiveKind::Int, &double).unwrap(), Primitive::Int(300));
        assert_eq!(unbox(PrimitiveKind::Byte, &double).unwrap(), Primitive::Byte(44));

        let nan = Value::Boxed(Primitive::Float(f32::NAN));
        assert_eq!(unbox(PrimitiveKind::Long, &nan).unwrap(), Primitive::Long(0));

        let int = Value::Boxed(Primitive::Int(7));
        assert_eq!(unbox(PrimitiveKind::Double, &int).unwrap(), Primitive::Double(7.0));
    }

    #[test]
    fn test_unbox_rejects_incompatible_values() {
        assert!(matches!(
            unbox(PrimitiveKind::Int, &Value::Null),
            Err(Error::Coercion { .. })
        ));
        assert!(matches!(
            unbox(PrimitiveKind::Boolean, &Value::Boxed(Primitive::Int(1))),
            Err(Error::Coercion { .. })
        ));
        assert!(matches!(
            unbox(PrimitiveKind::Int, &Value::Boxed(Primitive::Char(65))),
            Err(Error::Coercion { .. })
        ));
        assert!(matches!(
            unbox(PrimitiveKind::Long, &Value::string("12")),
            Err(Error::Coercion { .. })
        ));
    }

    #[test]
    fn test_box_then_unbox_every_kind() {
        let samples = [
            Primitive::Boolean(true),
            Primitive::Char(0x263A),
            Primitive::Byte(-3),
            Primitive::Short(-300),
            Primitive::Int(70_000),
            Primitive::Long(-5_000_000_000),
            Primitive::Float(1.5),
            Primitive::Double(-2.25),
        ];
        for sample in samples {
            let boxed = box_primitive(sample);
            assert_eq!(unbox(sample.kind(), &boxed).unwrap(), sample);
        }
    }

    #[test]
    fn test_expect_primitive_is_strict() {
        let int = Value::Boxed(Primitive::Int(1));
        assert!(expect_primitive(PrimitiveKind::Int, &int).is_ok());
        assert!(expect_primitive(PrimitiveKind::Long, &int).is_err());
    }
}
