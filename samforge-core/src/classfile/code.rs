//! Bytecode assembly
//!
//! [`CodeBuilder`] appends instructions, tracks operand-stack depth to
//! compute `max_stack`, resolves forward branches and records a stack map
//! frame for every branch target.
//!
//! Frames are restricted to the shape adapter code needs: at each branch
//! target the locals are those the method was entered with and the operand
//! stack is empty, so every frame is a `same_frame`.

use crate::descriptor::{Kind, PrimitiveKind, ReturnKind};
use crate::{Error, Result};

/// Opcodes emitted by the adapter generator
pub mod opcodes {
    pub const ACONST_NULL: u8 = 0x01;
    pub const ILOAD: u8 = 0x15;
    pub const LLOAD: u8 = 0x16;
    pub const FLOAD: u8 = 0x17;
    pub const DLOAD: u8 = 0x18;
    pub const ALOAD: u8 = 0x19;
    pub const ILOAD_0: u8 = 0x1a;
    pub const LLOAD_0: u8 = 0x1e;
    pub const FLOAD_0: u8 = 0x22;
    pub const DLOAD_0: u8 = 0x26;
    pub const ALOAD_0: u8 = 0x2a;
    pub const POP: u8 = 0x57;
    pub const POP2: u8 = 0x58;
    pub const DUP: u8 = 0x59;
    pub const IFEQ: u8 = 0x99;
    pub const IRETURN: u8 = 0xac;
    pub const LRETURN: u8 = 0xad;
    pub const FRETURN: u8 = 0xae;
    pub const DRETURN: u8 = 0xaf;
    pub const ARETURN: u8 = 0xb0;
    pub const RETURN: u8 = 0xb1;
    pub const GETFIELD: u8 = 0xb4;
    pub const PUTFIELD: u8 = 0xb5;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const NEW: u8 = 0xbb;
    pub const CHECKCAST: u8 = 0xc0;
    pub const INSTANCEOF: u8 = 0xc1;
    pub const WIDE: u8 = 0xc4;
    pub const IFNULL: u8 = 0xc6;
}

use opcodes::*;

/// A branch target, bound with [`CodeBuilder::mark`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Finished method body, ready to be wrapped in a `Code` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    /// Bytecode offsets of `same_frame` entries, ascending and unique
    pub frames: Vec<u16>,
}

impl MethodBody {
    /// Encode the `StackMapTable` attribute body, if there are any frames
    pub fn stack_map_table(&self) -> Option<Vec<u8>> {
        if self.frames.is_empty() {
            return None;
        }
        let mut out = Vec::new();
        out.extend_from_slice(&(self.frames.len() as u16).to_be_bytes());
        let mut previous: Option<u16> = None;
        for &offset in &self.frames {
            let delta = match previous {
                None => offset,
                Some(prev) => offset - prev - 1,
            };
            if delta <= 63 {
                out.push(delta as u8);
            } else {
                // same_frame_extended
                out.push(251);
                out.extend_from_slice(&delta.to_be_bytes());
            }
            previous = Some(offset);
        }
        Some(out)
    }
}

#[derive(Debug)]
struct Fixup {
    /// Offset of the branch opcode
    insn: usize,
    /// Offset of the 16-bit operand to patch
    operand: usize,
    label: Label,
}

/// Bytecode assembler for a single method
#[derive(Debug)]
pub struct CodeBuilder {
    code: Vec<u8>,
    depth: i32,
    max_depth: i32,
    max_locals: u16,
    labels: Vec<Option<usize>>,
    fixups: Vec<Fixup>,
    underflow: bool,
}

impl CodeBuilder {
    /// Start a method whose parameters (and `this`) occupy `max_locals` slots
    pub fn new(max_locals: u16) -> Self {
        Self {
            code: Vec::new(),
            depth: 0,
            max_depth: 0,
            max_locals,
            labels: Vec::new(),
            fixups: Vec::new(),
            underflow: false,
        }
    }

    /// Current bytecode offset
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    fn adjust(&mut self, delta: i32) {
        self.depth += delta;
        if self.depth < 0 {
            self.underflow = true;
            self.depth = 0;
        }
        self.max_depth = self.max_depth.max(self.depth);
    }

    fn op(&mut self, opcode: u8, delta: i32) -> &mut Self {
        self.code.push(opcode);
        self.adjust(delta);
        self
    }

    fn op_u16(&mut self, opcode: u8, operand: u16, delta: i32) -> &mut Self {
        self.code.push(opcode);
        self.code.extend_from_slice(&operand.to_be_bytes());
        self.adjust(delta);
        self
    }

    pub fn aconst_null(&mut self) -> &mut Self {
        self.op(ACONST_NULL, 1)
    }

    pub fn dup(&mut self) -> &mut Self {
        self.op(DUP, 1)
    }

    /// Discard a value of the given kind from the stack
    pub fn pop(&mut self, kind: &Kind) -> &mut Self {
        match kind.slot_size() {
            2 => self.op(POP2, -2),
            _ => self.op(POP, -1),
        }
    }

    /// Load a local variable of the given kind
    pub fn load(&mut self, kind: &Kind, slot: u16) -> &mut Self {
        let (short_base, long_form) = match kind {
            Kind::Primitive(PrimitiveKind::Long) => (LLOAD_0, LLOAD),
            Kind::Primitive(PrimitiveKind::Float) => (FLOAD_0, FLOAD),
            Kind::Primitive(PrimitiveKind::Double) => (DLOAD_0, DLOAD),
            Kind::Primitive(_) => (ILOAD_0, ILOAD),
            Kind::Reference(_) => (ALOAD_0, ALOAD),
        };
        let delta = i32::from(kind.slot_size());

        if slot <= 3 {
            self.op(short_base + slot as u8, delta)
        } else if let Ok(slot) = u8::try_from(slot) {
            self.code.push(long_form);
            self.code.push(slot);
            self.adjust(delta);
            self
        } else {
            self.code.push(WIDE);
            self.op_u16(long_form, slot, delta)
        }
    }

    /// `aload` shorthand
    pub fn aload(&mut self, slot: u16) -> &mut Self {
        self.load(&Kind::object(), slot)
    }

    pub fn getfield(&mut self, field_ref: u16, field: &Kind) -> &mut Self {
        self.op_u16(GETFIELD, field_ref, i32::from(field.slot_size()) - 1)
    }

    pub fn putfield(&mut self, field_ref: u16, field: &Kind) -> &mut Self {
        self.op_u16(PUTFIELD, field_ref, -(i32::from(field.slot_size()) + 1))
    }

    pub fn new_object(&mut self, class: u16) -> &mut Self {
        self.op_u16(NEW, class, 1)
    }

    pub fn checkcast(&mut self, class: u16) -> &mut Self {
        self.op_u16(CHECKCAST, class, 0)
    }

    pub fn instance_of(&mut self, class: u16) -> &mut Self {
        self.op_u16(INSTANCEOF, class, 0)
    }

    pub fn invokestatic(&mut self, method_ref: u16, params: &[Kind], ret: &ReturnKind) -> &mut Self {
        let delta = call_delta(params, ret);
        self.op_u16(INVOKESTATIC, method_ref, delta)
    }

    pub fn invokevirtual(&mut self, method_ref: u16, params: &[Kind], ret: &ReturnKind) -> &mut Self {
        let delta = call_delta(params, ret) - 1;
        self.op_u16(INVOKEVIRTUAL, method_ref, delta)
    }

    pub fn invokespecial(&mut self, method_ref: u16, params: &[Kind], ret: &ReturnKind) -> &mut Self {
        let delta = call_delta(params, ret) - 1;
        self.op_u16(INVOKESPECIAL, method_ref, delta)
    }

    pub fn invokeinterface(
        &mut self,
        method_ref: u16,
        params: &[Kind],
        ret: &ReturnKind,
    ) -> &mut Self {
        let arg_slots: u16 = params.iter().map(Kind::slot_size).sum();
        // count includes the receiver; the trailing byte is always zero
        let count = (arg_slots + 1).min(255) as u8;
        let delta = call_delta(params, ret) - 1;
        self.op_u16(INVOKEINTERFACE, method_ref, delta);
        self.code.push(count);
        self.code.push(0);
        self
    }

    /// Return a value of the given kind (or nothing)
    pub fn return_value(&mut self, ret: &ReturnKind) -> &mut Self {
        let (opcode, size) = match ret {
            ReturnKind::Void => (RETURN, 0),
            ReturnKind::Value(Kind::Reference(_)) => (ARETURN, 1),
            ReturnKind::Value(Kind::Primitive(p)) => match p {
                PrimitiveKind::Long => (LRETURN, 2),
                PrimitiveKind::Float => (FRETURN, 1),
                PrimitiveKind::Double => (DRETURN, 2),
                _ => (IRETURN, 1),
            },
        };
        self.op(opcode, -size)
    }

    /// Allocate an unbound label
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// `ifnull label`
    pub fn if_null(&mut self, label: Label) -> &mut Self {
        self.branch(IFNULL, label)
    }

    /// `ifeq label` (branch when the int on the stack is zero)
    pub fn if_zero(&mut self, label: Label) -> &mut Self {
        self.branch(IFEQ, label)
    }

    fn branch(&mut self, opcode: u8, label: Label) -> &mut Self {
        let insn = self.code.len();
        self.op_u16(opcode, 0, -1);
        self.fixups.push(Fixup {
            insn,
            operand: insn + 1,
            label,
        });
        self
    }

    /// Bind `label` to the current offset
    ///
    /// Code following a label starts with an empty operand stack.
    pub fn mark(&mut self, label: Label) -> &mut Self {
        if let Some(slot) = self.labels.get_mut(label.0) {
            *slot = Some(self.code.len());
        }
        self.depth = 0;
        self
    }

    /// Resolve branches and produce the method body
    pub fn finish(mut self) -> Result<MethodBody> {
        if self.underflow {
            return Err(Error::Encoding("operand stack underflow".to_string()));
        }
        if self.code.is_empty() || self.code.len() > usize::from(u16::MAX) {
            return Err(Error::Encoding(format!(
                "invalid code length {}",
                self.code.len()
            )));
        }

        let mut frames = Vec::new();
        for fixup in &self.fixups {
            let target = self.labels[fixup.label.0]
                .ok_or_else(|| Error::Encoding("branch to unbound label".to_string()))?;
            let relative = target as i64 - fixup.insn as i64;
            let relative = i16::try_from(relative)
                .map_err(|_| Error::Encoding("branch offset out of range".to_string()))?;
            self.code[fixup.operand..fixup.operand + 2].copy_from_slice(&relative.to_be_bytes());
            frames.push(target as u16);
        }
        frames.sort_unstable();
        frames.dedup();

        Ok(MethodBody {
            max_stack: self.max_depth as u16,
            max_locals: self.max_locals,
            code: self.code,
            frames,
        })
    }
}

/// Stack effect of a static call: pop the arguments, push the result
fn call_delta(params: &[Kind], ret: &ReturnKind) -> i32 {
    let popped: i32 = params.iter().map(|p| i32::from(p.slot_size())).sum();
    let pushed = match ret {
        ReturnKind::Void => 0,
        ReturnKind::Value(kind) => i32::from(kind.slot_size()),
    };
    pushed - popped
}
