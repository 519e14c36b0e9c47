//! Class-file assembly

use super::code::MethodBody;
use super::constant_pool::ConstantPool;
use super::{ClassVersion, MAGIC};
use crate::{Error, Result};

#[derive(Debug)]
struct Attribute {
    name: u16,
    body: Vec<u8>,
}

#[derive(Debug)]
struct MemberData {
    access: u16,
    name: u16,
    descriptor: u16,
    attributes: Vec<Attribute>,
}

/// Builds one class file
///
/// Constants are interned in the order members are added, so the output is
/// a pure function of the call sequence.
#[derive(Debug)]
pub struct ClassWriter {
    version: ClassVersion,
    pool: ConstantPool,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<MemberData>,
    methods: Vec<MemberData>,
}

impl ClassWriter {
    pub fn new(
        version: ClassVersion,
        access: u16,
        name: &str,
        super_name: &str,
        interfaces: &[&str],
    ) -> Result<Self> {
        let mut pool = ConstantPool::new();
        let this_class = pool.class(name)?;
        let super_class = pool.class(super_name)?;
        let interfaces = interfaces
            .iter()
            .map(|i| pool.class(i))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            version,
            pool,
            access,
            this_class,
            super_class,
            interfaces,
            fields: Vec::new(),
            methods: Vec::new(),
        })
    }

    /// The constant pool, for resolving instruction operands
    pub fn pool(&mut self) -> &mut ConstantPool {
        &mut self.pool
    }

    /// `constant_pool_count` the class file will be written with
    pub fn constant_pool_count(&self) -> u16 {
        self.pool.count()
    }

    pub fn add_field(&mut self, access: u16, name: &str, descriptor: &str) -> Result<()> {
        let name = self.pool.utf8(name)?;
        let descriptor = self.pool.utf8(descriptor)?;
        self.fields.push(MemberData {
            access,
            name,
            descriptor,
            attributes: Vec::new(),
        });
        Ok(())
    }

    /// Add a method with a `Code` attribute built from `body`
    pub fn add_method(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        body: &MethodBody,
    ) -> Result<()> {
        let name = self.pool.utf8(name)?;
        let descriptor = self.pool.utf8(descriptor)?;
        let code = self.code_attribute(body)?;
        self.methods.push(MemberData {
            access,
            name,
            descriptor,
            attributes: vec![code],
        });
        Ok(())
    }

    /// Add a method without a `Code` attribute (abstract or native)
    pub fn add_abstract_method(&mut self, access: u16, name: &str, descriptor: &str) -> Result<()> {
        let name = self.pool.utf8(name)?;
        let descriptor = self.pool.utf8(descriptor)?;
        self.methods.push(MemberData {
            access,
            name,
            descriptor,
            attributes: Vec::new(),
        });
        Ok(())
    }

    fn code_attribute(&mut self, body: &MethodBody) -> Result<Attribute> {
        let name = self.pool.utf8("Code")?;

        let mut nested = Vec::new();
        if self.version.requires_stack_maps()
            && let Some(table) = body.stack_map_table()
        {
            nested.push(Attribute {
                name: self.pool.utf8("StackMapTable")?,
                body: table,
            });
        }

        let mut out = Vec::with_capacity(body.code.len() + 16);
        out.extend_from_slice(&body.max_stack.to_be_bytes());
        out.extend_from_slice(&body.max_locals.to_be_bytes());
        out.extend_from_slice(&(body.code.len() as u32).to_be_bytes());
        out.extend_from_slice(&body.code);
        // exception_table_length
        out.extend_from_slice(&0u16.to_be_bytes());
        encode_attributes(&mut out, &nested)?;

        Ok(Attribute { name, body: out })
    }

    /// Serialize the class file
    pub fn finish(self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&self.version.minor.to_be_bytes());
        out.extend_from_slice(&self.version.major.to_be_bytes());
        self.pool.encode(&mut out);

        out.extend_from_slice(&self.access.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());

        out.extend_from_slice(&count_u16(self.interfaces.len(), "interfaces")?.to_be_bytes());
        for interface in &self.interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }

        encode_members(&mut out, &self.fields, "fields")?;
        encode_members(&mut out, &self.methods, "methods")?;

        // no class-level attributes
        out.extend_from_slice(&0u16.to_be_bytes());
        Ok(out)
    }
}

fn encode_members(out: &mut Vec<u8>, members: &[MemberData], what: &str) -> Result<()> {
    out.extend_from_slice(&count_u16(members.len(), what)?.to_be_bytes());
    for member in members {
        out.extend_from_slice(&member.access.to_be_bytes());
        out.extend_from_slice(&member.name.to_be_bytes());
        out.extend_from_slice(&member.descriptor.to_be_bytes());
        encode_attributes(out, &member.attributes)?;
    }
    Ok(())
}

fn encode_attributes(out: &mut Vec<u8>, attributes: &[Attribute]) -> Result<()> {
    out.extend_from_slice(&count_u16(attributes.len(), "attributes")?.to_be_bytes());
    for attribute in attributes {
        let len = u32::try_from(attribute.body.len())
            .map_err(|_| Error::Encoding("attribute too large".to_string()))?;
        out.extend_from_slice(&attribute.name.to_be_bytes());
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&attribute.body);
    }
    Ok(())
}

fn count_u16(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::Encoding(format!("too many {}", what)))
}
