//! JVM class-file encoding and decoding
//!
//! Just enough of JVMS chapter 4 to write adapter classes byte for byte,
//! plus a reader for interface classes and generated output:
//!
//! - [`ConstantPool`]: deduplicating constant-pool builder
//! - [`CodeBuilder`]: bytecode assembler with operand-stack accounting,
//!   forward branches and `StackMapTable` frames
//! - [`ClassWriter`]: assembles the final class file
//! - [`reader`]: reads class files back through `classfile-parser` and
//!   disassembles adapter bytecode

mod code;
mod constant_pool;
pub mod reader;
mod writer;

pub use code::{CodeBuilder, Label, MethodBody, opcodes};
pub use constant_pool::ConstantPool;
pub use reader::{ClassFile, CodeAttribute, Instruction, Member, Operand, disassemble};
pub use writer::ClassWriter;

/// Class-file magic number
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Access and property flags (JVMS tables 4.1-B, 4.5-A, 4.6-A)
pub mod access {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SUPER: u16 = 0x0020;
    pub const BRIDGE: u16 = 0x0040;
    pub const VARARGS: u16 = 0x0080;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
    pub const SYNTHETIC: u16 = 0x1000;
}

/// Class-file format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClassVersion {
    pub major: u16,
    pub minor: u16,
}

impl ClassVersion {
    /// Java 8
    pub const JAVA_8: ClassVersion = ClassVersion {
        major: 52,
        minor: 0,
    };

    /// Whether methods carry a `StackMapTable` (introduced with version 50)
    pub fn requires_stack_maps(self) -> bool {
        self.major >= 50
    }
}

impl Default for ClassVersion {
    fn default() -> Self {
        Self::JAVA_8
    }
}

/// Encode a string in the class-file "modified UTF-8" form
///
/// NUL is written as two bytes and supplementary characters as surrogate
/// pairs, each surrogate encoded as three bytes.
pub fn encode_modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}
