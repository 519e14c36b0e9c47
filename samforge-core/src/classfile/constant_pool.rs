//! Constant-pool builder
//!
//! Entries are deduplicated and numbered in first-use order, so two classes
//! assembled by the same sequence of calls have identical pools.

use super::encode_modified_utf8;
use crate::{Error, Result};
use std::collections::HashMap;

const TAG_UTF8: u8 = 1;
const TAG_CLASS: u8 = 7;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Constant {
    Utf8(String),
    Class(u16),
    NameAndType(u16, u16),
    Fieldref(u16, u16),
    Methodref(u16, u16),
    InterfaceMethodref(u16, u16),
}

/// Deduplicating constant pool
#[derive(Debug, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    lookup: HashMap<Constant, u16>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `constant_pool_count` (entries + 1)
    pub fn count(&self) -> u16 {
        // `insert` keeps the length below u16::MAX
        self.entries.len() as u16 + 1
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, constant: Constant) -> Result<u16> {
        if let Some(&idx) = self.lookup.get(&constant) {
            return Ok(idx);
        }
        if self.entries.len() >= usize::from(u16::MAX) - 1 {
            return Err(Error::Encoding("constant pool overflow".to_string()));
        }
        self.entries.push(constant.clone());
        let idx = self.entries.len() as u16;
        self.lookup.insert(constant, idx);
        Ok(idx)
    }

    pub fn utf8(&mut self, value: &str) -> Result<u16> {
        if encode_modified_utf8(value).len() > usize::from(u16::MAX) {
            return Err(Error::Encoding(format!(
                "string constant too long ({} chars)",
                value.chars().count()
            )));
        }
        self.insert(Constant::Utf8(value.to_string()))
    }

    /// `CONSTANT_Class` for an internal name or array descriptor
    pub fn class(&mut self, internal_name: &str) -> Result<u16> {
        let name = self.utf8(internal_name)?;
        self.insert(Constant::Class(name))
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.insert(Constant::NameAndType(name, descriptor))
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.class(owner)?;
        let nat = self.name_and_type(name, descriptor)?;
        self.insert(Constant::Fieldref(class, nat))
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.class(owner)?;
        let nat = self.name_and_type(name, descriptor)?;
        self.insert(Constant::Methodref(class, nat))
    }

    pub fn interface_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16> {
        let class = self.class(owner)?;
        let nat = self.name_and_type(name, descriptor)?;
        self.insert(Constant::InterfaceMethodref(class, nat))
    }

    /// Append `constant_pool_count` and every entry to `out`
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.count().to_be_bytes());
        for constant in &self.entries {
            match constant {
                Constant::Utf8(value) => {
                    let bytes = encode_modified_utf8(value);
                    out.push(TAG_UTF8);
                    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                    out.extend_from_slice(&bytes);
                }
                Constant::Class(name) => {
                    out.push(TAG_CLASS);
                    out.extend_from_slice(&name.to_be_bytes());
                }
                Constant::NameAndType(name, descriptor) => {
                    out.push(TAG_NAME_AND_TYPE);
                    out.extend_from_slice(&name.to_be_bytes());
                    out.extend_from_slice(&descriptor.to_be_bytes());
                }
                Constant::Fieldref(class, nat) => encode_ref(out, TAG_FIELDREF, *class, *nat),
                Constant::Methodref(class, nat) => encode_ref(out, TAG_METHODREF, *class, *nat),
                Constant::InterfaceMethodref(class, nat) => {
                    encode_ref(out, TAG_INTERFACE_METHODREF, *class, *nat)
                }
            }
        }
    }
}

fn encode_ref(out: &mut Vec<u8>, tag: u8, class: u16, nat: u16) {
    out.push(tag);
    out.extend_from_slice(&class.to_be_bytes());
    out.extend_from_slice(&nat.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_deduplicated() {
        let mut pool = ConstantPool::new();
        let a = pool.class("java/lang/Object").unwrap();
        let b = pool.class("java/lang/Object").unwrap();
        assert_eq!(a, b);
        // utf8 + class
        assert_eq!(pool.count(), 3);
    }

    #[test]
    fn test_indices_follow_first_use() {
        let mut pool = ConstantPool::new();
        let utf8 = pool.utf8("delegate").unwrap();
        let method = pool
            .method_ref("java/lang/Integer", "valueOf", "(I)Ljava/lang/Integer;")
            .unwrap();
        assert_eq!(utf8, 1);
        // utf8 owner, class, utf8 name, utf8 desc, name_and_type, methodref
        assert_eq!(method, 7);
    }

    #[test]
    fn test_method_and_interface_refs_are_distinct() {
        let mut pool = ConstantPool::new();
        let m = pool.method_ref("a/B", "f", "()V").unwrap();
        let i = pool.interface_method_ref("a/B", "f", "()V").unwrap();
        assert_ne!(m, i);
    }

    #[test]
    fn test_encode_layout() {
        let mut pool = ConstantPool::new();
        pool.class("A").unwrap();
        let mut out = Vec::new();
        pool.encode(&mut out);
        assert_eq!(out, vec![0, 3, TAG_UTF8, 0, 1, b'A', TAG_CLASS, 0, 1]);
    }

    #[test]
    fn test_rejects_oversized_strings() {
        let mut pool = ConstantPool::new();
        let long = "x".repeat(70_000);
        assert!(matches!(pool.utf8(&long), Err(Error::Encoding(_))));
    }
}
