//! Class-file parsing
//!
//! Decoding of the class structure and constant pool is done by
//! `classfile-parser`; this module turns its index-based output into
//! resolved names, keeps the raw `Code` and `StackMapTable` bodies, and
//! disassembles the instruction subset adapters use.

use super::code::opcodes::*;
use crate::{Error, Result};
use classfile_parser::attribute_info::{AttributeInfo, code_attribute_parser};
use classfile_parser::constant_info::ConstantInfo;
use classfile_parser::class_parser;

/// `Code` attribute of a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    /// Raw `StackMapTable` body, if present
    pub stack_map_table: Option<Vec<u8>>,
}

impl CodeAttribute {
    /// Absolute offsets of the stack map frames
    ///
    /// Only `same_frame` and `same_frame_extended` entries are decoded; a
    /// table containing any other frame type yields `None`.
    pub fn same_frame_offsets(&self) -> Option<Vec<u16>> {
        let Some(table) = &self.stack_map_table else {
            return Some(Vec::new());
        };
        let mut cur = Cursor::new(table);
        let count = cur.u16().ok()?;
        let mut offsets = Vec::with_capacity(usize::from(count));
        let mut previous: Option<u16> = None;
        for _ in 0..count {
            let delta = match cur.u8().ok()? {
                tag @ 0..=63 => u16::from(tag),
                251 => cur.u16().ok()?,
                _ => return None,
            };
            let offset = match previous {
                None => delta,
                Some(prev) => prev.checked_add(delta)?.checked_add(1)?,
            };
            offsets.push(offset);
            previous = Some(offset);
        }
        Some(offsets)
    }
}

/// A field or method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub code: Option<CodeAttribute>,
}

impl Member {
    pub fn has_flag(&self, flag: u16) -> bool {
        self.access_flags & flag != 0
    }
}

/// A parsed class file
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    /// Internal name of this class
    pub this_class: String,
    /// Internal name of the super class; `None` only for `java/lang/Object`
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    /// Constant pool without the unused entry 0
    constants: Vec<ConstantInfo>,
}

/// A resolved field or method reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl ClassFile {
    pub fn has_flag(&self, flag: u16) -> bool {
        self.access_flags & flag != 0
    }

    pub fn method(&self, name: &str) -> Option<&Member> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&Member> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Value of `constant_pool_count`
    pub fn constant_pool_count(&self) -> usize {
        self.constants.len() + 1
    }

    fn constant(&self, idx: u16) -> Option<&ConstantInfo> {
        usize::from(idx)
            .checked_sub(1)
            .and_then(|i| self.constants.get(i))
    }

    pub fn utf8(&self, idx: u16) -> Result<&str> {
        match self.constant(idx) {
            Some(ConstantInfo::Utf8(c)) => Ok(&c.utf8_string),
            _ => Err(bad_index(idx, "Utf8")),
        }
    }

    /// Name of a `CONSTANT_Class` entry
    pub fn class_name(&self, idx: u16) -> Result<&str> {
        match self.constant(idx) {
            Some(ConstantInfo::Class(c)) => self.utf8(c.name_index),
            _ => Err(bad_index(idx, "Class")),
        }
    }

    /// Resolve a field, method or interface-method reference
    pub fn member_ref(&self, idx: u16) -> Result<MemberRef> {
        let (class, nat) = match self.constant(idx) {
            Some(ConstantInfo::FieldRef(c)) => (c.class_index, c.name_and_type_index),
            Some(ConstantInfo::MethodRef(c)) => (c.class_index, c.name_and_type_index),
            Some(ConstantInfo::InterfaceMethodRef(c)) => (c.class_index, c.name_and_type_index),
            _ => return Err(bad_index(idx, "member reference")),
        };
        let (name, descriptor) = match self.constant(nat) {
            Some(ConstantInfo::NameAndType(c)) => (c.name_index, c.descriptor_index),
            _ => return Err(bad_index(nat, "NameAndType")),
        };
        Ok(MemberRef {
            owner: self.class_name(class)?.to_string(),
            name: self.utf8(name)?.to_string(),
            descriptor: self.utf8(descriptor)?.to_string(),
        })
    }

    fn member(
        &self,
        access_flags: u16,
        name_index: u16,
        descriptor_index: u16,
        attributes: &[AttributeInfo],
    ) -> Result<Member> {
        let mut code = None;
        for attribute in attributes {
            if self.utf8(attribute.attribute_name_index)? == "Code" {
                code = Some(self.code(&attribute.info)?);
            }
        }
        Ok(Member {
            access_flags,
            name: self.utf8(name_index)?.to_string(),
            descriptor: self.utf8(descriptor_index)?.to_string(),
            code,
        })
    }

    fn code(&self, body: &[u8]) -> Result<CodeAttribute> {
        let (_, parsed) = code_attribute_parser(body)
            .map_err(|e| Error::ClassFormat(format!("malformed Code attribute: {:?}", e)))?;
        let mut stack_map_table = None;
        for attribute in &parsed.attributes {
            if self.utf8(attribute.attribute_name_index)? == "StackMapTable" {
                stack_map_table = Some(attribute.info.clone());
            }
        }
        Ok(CodeAttribute {
            max_stack: parsed.max_stack,
            max_locals: parsed.max_locals,
            code: parsed.code,
            stack_map_table,
        })
    }
}

fn bad_index(idx: u16, expected: &str) -> Error {
    Error::ClassFormat(format!("constant #{} is not a {}", idx, expected))
}

/// Parse a class file
pub fn parse(bytes: &[u8]) -> Result<ClassFile> {
    let (rest, raw) = class_parser(bytes)
        .map_err(|e| Error::ClassFormat(format!("malformed class file: {:?}", e)))?;
    if !rest.is_empty() {
        return Err(Error::ClassFormat(format!("{} trailing bytes", rest.len())));
    }

    let mut class = ClassFile {
        minor_version: raw.minor_version,
        major_version: raw.major_version,
        access_flags: raw.access_flags.bits(),
        this_class: String::new(),
        super_class: None,
        interfaces: Vec::new(),
        fields: Vec::new(),
        methods: Vec::new(),
        constants: raw.const_pool,
    };

    class.this_class = class.class_name(raw.this_class)?.to_string();
    if raw.super_class != 0 {
        class.super_class = Some(class.class_name(raw.super_class)?.to_string());
    }
    class.interfaces = raw
        .interfaces
        .iter()
        .map(|&idx| class.class_name(idx).map(str::to_string))
        .collect::<Result<_>>()?;
    class.fields = raw
        .fields
        .iter()
        .map(|f| {
            class.member(
                f.access_flags.bits(),
                f.name_index,
                f.descriptor_index,
                &f.attributes,
            )
        })
        .collect::<Result<_>>()?;
    class.methods = raw
        .methods
        .iter()
        .map(|m| {
            class.member(
                m.access_flags.bits(),
                m.name_index,
                m.descriptor_index,
                &m.attributes,
            )
        })
        .collect::<Result<_>>()?;

    Ok(class)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                Error::ClassFormat(format!("unexpected end of data at offset {}", self.pos))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

/// A decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub offset: usize,
    pub opcode: u8,
    pub mnemonic: &'static str,
    pub operand: Operand,
}

/// Instruction operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    /// Local-variable slot
    Local(u16),
    /// Constant-pool index
    Constant(u16),
    /// Absolute branch target
    Target(usize),
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Local(slot) => write!(f, "{}", slot),
            Operand::Constant(idx) => write!(f, "#{}", idx),
            Operand::Target(target) => write!(f, "-> {}", target),
        }
    }
}

/// Decode bytecode produced by the adapter generator
///
/// Only the instruction set used by adapter classes is understood; any
/// other opcode is reported as a format error.
pub fn disassemble(code: &[u8]) -> Result<Vec<Instruction>> {
    let mut cur = Cursor::new(code);
    let mut out = Vec::new();
    while !cur.is_empty() {
        let offset = cur.pos;
        let mut opcode = cur.u8()?;
        let wide = opcode == WIDE;
        if wide {
            opcode = cur.u8()?;
        }

        let (mnemonic, operand) = match opcode {
            ACONST_NULL => ("aconst_null", Operand::None),
            POP => ("pop", Operand::None),
            POP2 => ("pop2", Operand::None),
            DUP => ("dup", Operand::None),
            IRETURN => ("ireturn", Operand::None),
            LRETURN => ("lreturn", Operand::None),
            FRETURN => ("freturn", Operand::None),
            DRETURN => ("dreturn", Operand::None),
            ARETURN => ("areturn", Operand::None),
            RETURN => ("return", Operand::None),
            ILOAD..=ALOAD => {
                let slot = if wide {
                    cur.u16()?
                } else {
                    u16::from(cur.u8()?)
                };
                let names = ["iload", "lload", "fload", "dload", "aload"];
                (names[usize::from(opcode - ILOAD)], Operand::Local(slot))
            }
            ILOAD_0..=0x2d => {
                let rel = opcode - ILOAD_0;
                let names = ["iload", "lload", "fload", "dload", "aload"];
                (names[usize::from(rel / 4)], Operand::Local(u16::from(rel % 4)))
            }
            GETFIELD => ("getfield", Operand::Constant(cur.u16()?)),
            PUTFIELD => ("putfield", Operand::Constant(cur.u16()?)),
            INVOKEVIRTUAL => ("invokevirtual", Operand::Constant(cur.u16()?)),
            INVOKESPECIAL => ("invokespecial", Operand::Constant(cur.u16()?)),
            INVOKESTATIC => ("invokestatic", Operand::Constant(cur.u16()?)),
            INVOKEINTERFACE => {
                let idx = cur.u16()?;
                cur.take(2)?;
                ("invokeinterface", Operand::Constant(idx))
            }
            NEW => ("new", Operand::Constant(cur.u16()?)),
            CHECKCAST => ("checkcast", Operand::Constant(cur.u16()?)),
            INSTANCEOF => ("instanceof", Operand::Constant(cur.u16()?)),
            IFEQ | IFNULL => {
                let rel = cur.u16()? as i16;
                let target = offset as i64 + i64::from(rel);
                let target = usize::try_from(target)
                    .map_err(|_| Error::ClassFormat(format!("branch before start at {}", offset)))?;
                let name = if opcode == IFEQ { "ifeq" } else { "ifnull" };
                (name, Operand::Target(target))
            }
            other => {
                return Err(Error::ClassFormat(format!(
                    "unsupported opcode 0x{:02x} at {}",
                    other, offset
                )));
            }
        };

        if wide && !matches!(operand, Operand::Local(_)) {
            return Err(Error::ClassFormat(format!("invalid wide prefix at {}", offset)));
        }
        out.push(Instruction {
            offset,
            opcode,
            mnemonic,
            operand,
        });
    }
    Ok(out)
}
