//! Value kinds, method signatures and JVM descriptor strings
//!
//! A [`TargetInterfaceDescriptor`] is the tagged description every emitter
//! works from: the interface identity plus the kind sequence of its single
//! abstract method. Kinds round-trip through JVM descriptor syntax
//! (JVMS §4.3) so that introspected class files and hand-written
//! signatures end up in the same representation.

use crate::{Error, Result};
use std::fmt;

/// The eight JVM primitive kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Char,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveKind {
    /// Every primitive kind, in descriptor-table order
    pub const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Char,
        PrimitiveKind::Byte,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ];

    /// Single-character descriptor (`Z`, `C`, `B`, `S`, `I`, `J`, `F`, `D`)
    pub fn descriptor_char(self) -> char {
        match self {
            PrimitiveKind::Boolean => 'Z',
            PrimitiveKind::Char => 'C',
            PrimitiveKind::Byte => 'B',
            PrimitiveKind::Short => 'S',
            PrimitiveKind::Int => 'I',
            PrimitiveKind::Long => 'J',
            PrimitiveKind::Float => 'F',
            PrimitiveKind::Double => 'D',
        }
    }

    pub fn from_descriptor_char(c: char) -> Option<Self> {
        PrimitiveKind::ALL
            .into_iter()
            .find(|kind| kind.descriptor_char() == c)
    }

    /// Java source keyword for this kind
    pub fn java_name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }

    /// Number of local-variable / operand-stack slots a value occupies
    pub fn slot_size(self) -> u16 {
        match self {
            PrimitiveKind::Long | PrimitiveKind::Double => 2,
            _ => 1,
        }
    }

    /// Whether the boxed form of this kind extends `java.lang.Number`
    pub fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveKind::Boolean | PrimitiveKind::Char)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.java_name())
    }
}

/// Kind of a parameter or non-void return value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    Primitive(PrimitiveKind),
    /// Class internal name (`java/lang/String`) or array descriptor (`[I`)
    Reference(String),
}

impl Kind {
    /// Reference kind for `java.lang.Object`
    pub fn object() -> Self {
        Kind::Reference(OBJECT_CLASS.to_string())
    }

    /// Reference kind from a binary class name (`java.lang.String`)
    pub fn class(binary_name: &str) -> Self {
        Kind::Reference(internal_name(binary_name))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Kind::Primitive(_))
    }

    pub fn slot_size(&self) -> u16 {
        match self {
            Kind::Primitive(p) => p.slot_size(),
            Kind::Reference(_) => 1,
        }
    }

    /// Field descriptor for this kind
    pub fn descriptor(&self) -> String {
        match self {
            Kind::Primitive(p) => p.descriptor_char().to_string(),
            Kind::Reference(name) if name.starts_with('[') => name.clone(),
            Kind::Reference(name) => format!("L{};", name),
        }
    }

    /// Parse a complete field descriptor
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut chars = descriptor.char_indices().peekable();
        let kind = parse_field_type(descriptor, &mut chars)?;
        if chars.next().is_some() {
            return Err(Error::bad_descriptor(descriptor, "trailing characters"));
        }
        Ok(kind)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Primitive(p) => write!(f, "{}", p),
            Kind::Reference(name) => {
                let dims = name.chars().take_while(|&c| c == '[').count();
                if dims == 0 {
                    return f.write_str(&binary_name(name));
                }
                match Kind::parse(&name[dims..]) {
                    Ok(element) => write!(f, "{}{}", element, "[]".repeat(dims)),
                    Err(_) => f.write_str(name),
                }
            }
        }
    }
}

/// Return kind of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    Void,
    Value(Kind),
}

impl ReturnKind {
    pub fn descriptor(&self) -> String {
        match self {
            ReturnKind::Void => "V".to_string(),
            ReturnKind::Value(kind) => kind.descriptor(),
        }
    }
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnKind::Void => f.write_str("void"),
            ReturnKind::Value(kind) => write!(f, "{}", kind),
        }
    }
}

/// Parameter kinds and return kind of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub params: Vec<Kind>,
    pub ret: ReturnKind,
}

impl MethodSignature {
    pub fn new(params: Vec<Kind>, ret: ReturnKind) -> Self {
        Self { params, ret }
    }

    /// Parse a method descriptor such as `(IJLjava/lang/String;)Z`
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut chars = descriptor.char_indices().peekable();
        if chars.next().map(|(_, c)| c) != Some('(') {
            return Err(Error::bad_descriptor(descriptor, "expected '('"));
        }

        let mut params = Vec::new();
        loop {
            match chars.peek() {
                Some((_, ')')) => {
                    chars.next();
                    break;
                }
                Some(_) => params.push(parse_field_type(descriptor, &mut chars)?),
                None => return Err(Error::bad_descriptor(descriptor, "unterminated parameter list")),
            }
        }

        let ret = match chars.peek() {
            Some((_, 'V')) => {
                chars.next();
                ReturnKind::Void
            }
            Some(_) => ReturnKind::Value(parse_field_type(descriptor, &mut chars)?),
            None => return Err(Error::bad_descriptor(descriptor, "missing return type")),
        };

        if chars.next().is_some() {
            return Err(Error::bad_descriptor(descriptor, "trailing characters"));
        }
        Ok(Self { params, ret })
    }

    /// Method descriptor string
    pub fn descriptor(&self) -> String {
        let params: String = self.params.iter().map(Kind::descriptor).collect();
        format!("({}){}", params, self.ret.descriptor())
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Local-variable slots taken by the parameters (excluding `this`)
    pub fn param_slots(&self) -> u16 {
        self.params.iter().map(Kind::slot_size).sum()
    }
}

fn parse_field_type(
    descriptor: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Result<Kind> {
    let (start, c) = chars
        .next()
        .ok_or_else(|| Error::bad_descriptor(descriptor, "unexpected end"))?;

    if let Some(p) = PrimitiveKind::from_descriptor_char(c) {
        return Ok(Kind::Primitive(p));
    }

    match c {
        'L' => {
            for (idx, c) in chars.by_ref() {
                if c == ';' {
                    let name = &descriptor[start + 1..idx];
                    if name.is_empty() {
                        return Err(Error::bad_descriptor(descriptor, "empty class name"));
                    }
                    return Ok(Kind::Reference(name.to_string()));
                }
            }
            Err(Error::bad_descriptor(descriptor, "unterminated class name"))
        }
        '[' => {
            let element = parse_field_type(descriptor, chars)?;
            Ok(Kind::Reference(format!("[{}", element.descriptor())))
        }
        other => Err(Error::bad_descriptor(
            descriptor,
            format!("unexpected character {:?}", other),
        )),
    }
}

/// `java/lang/Object`
pub const OBJECT_CLASS: &str = "java/lang/Object";

/// Convert a binary name (`java.util.function.Supplier`) to an internal name
pub fn internal_name(binary_name: &str) -> String {
    binary_name.replace('.', "/")
}

/// Convert an internal name (`java/util/function/Supplier`) to a binary name
pub fn binary_name(internal_name: &str) -> String {
    internal_name.replace('/', ".")
}

/// Identity and single abstract method of an adaptation target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetInterfaceDescriptor {
    /// Binary name of the interface (`java.util.function.IntPredicate`)
    pub name: String,
    /// Name of the single abstract method
    pub method_name: String,
    /// Signature of the single abstract method
    pub signature: MethodSignature,
}

impl TargetInterfaceDescriptor {
    pub fn new(
        name: impl Into<String>,
        method_name: impl Into<String>,
        signature: MethodSignature,
    ) -> Self {
        Self {
            name: name.into(),
            method_name: method_name.into(),
            signature,
        }
    }

    pub fn internal_name(&self) -> String {
        internal_name(&self.name)
    }

    /// `name(params)ret` in descriptor form, for diagnostics
    pub fn method_label(&self) -> String {
        format!(
            "{}.{}{}",
            self.name,
            self.method_name,
            self.signature.descriptor()
        )
    }
}

impl fmt::Display for TargetInterfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.signature.params.iter().map(|p| p.to_string()).collect();
        write!(
            f,
            "{} {}.{}({})",
            self.signature.ret,
            self.name,
            self.method_name,
            params.join(", ")
        )
    }
}
