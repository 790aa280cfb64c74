//! In-memory model of a compiled class unit.

use std::fmt;

use sha2::{Digest, Sha256};

use super::codec::write_body;
use super::error::ClassFormatError;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

/// A compiled class: declarations, code and link-time verification metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassUnit {
    pub access: u16,
    /// Internal name, e.g. `dev/dsf/bpe/PingTask`.
    pub name: String,
    pub super_name: Option<String>,
    /// Generic class signature.
    pub signature: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldUnit>,
    pub methods: Vec<MethodUnit>,
    /// SHA-256 over the encoded body.
    pub digest: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUnit {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub constant: Option<Constant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodUnit {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub exceptions: Vec<String>,
    pub code: Vec<Instruction>,
    /// Verification types of the locals on method entry.
    pub entry_frame: Vec<VerificationType>,
}

impl MethodUnit {
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access & ACC_STATIC != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOp {
    New,
    CheckCast,
    InstanceOf,
    ANewArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    GetStatic,
    PutStatic,
    GetField,
    PutField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeOp {
    Virtual,
    Special,
    Static,
    Interface,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Opcode without symbolic operands.
    Simple(u8),
    Type {
        op: TypeOp,
        type_name: String,
    },
    Field {
        op: FieldOp,
        owner: String,
        name: String,
        descriptor: String,
    },
    Method {
        op: InvokeOp,
        owner: String,
        name: String,
        descriptor: String,
        interface: bool,
    },
    Ldc(Constant),
    InvokeDynamic {
        name: String,
        descriptor: String,
        bootstrap: MethodHandle,
        arguments: Vec<Constant>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHandle {
    pub tag: u8,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub interface: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Int(i32),
    Long(i64),
    Str(String),
    /// Internal name, array descriptor or method descriptor.
    Type(String),
    Handle(MethodHandle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Long,
    Double,
    Null,
    UninitializedThis,
    Object(String),
}

impl fmt::Display for VerificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationType::Top => f.write_str("top"),
            VerificationType::Integer => f.write_str("int"),
            VerificationType::Float => f.write_str("float"),
            VerificationType::Long => f.write_str("long"),
            VerificationType::Double => f.write_str("double"),
            VerificationType::Null => f.write_str("null"),
            VerificationType::UninitializedThis => f.write_str("uninitializedThis"),
            VerificationType::Object(name) => f.write_str(name),
        }
    }
}

impl ClassUnit {
    /// Creates an empty public class extending `java/lang/Object`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            access: ACC_PUBLIC,
            name: name.into(),
            super_name: Some("java/lang/Object".to_owned()),
            signature: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            digest: [0; 32],
        }
    }

    /// Resource path of the unit inside a class source.
    #[must_use]
    pub fn resource_path(name: &str) -> String {
        format!("{}.class", name.replace('.', "/"))
    }

    /// SHA-256 of the encoded body.
    ///
    /// # Errors
    ///
    /// Returns [`ClassFormatError::TooLarge`] if the unit cannot be encoded.
    pub fn compute_digest(&self) -> Result<[u8; 32], ClassFormatError> {
        let mut body = bytes::BytesMut::new();
        write_body(self, &mut body)?;
        Ok(Sha256::digest(&body).into())
    }

    /// # Errors
    ///
    /// See [`ClassUnit::compute_digest`]; the stored digest is left unchanged.
    pub fn refresh_digest(&mut self) -> Result<(), ClassFormatError> {
        self.digest = self.compute_digest()?;
        Ok(())
    }

    #[must_use]
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Recomputes entry frames and digest.
    ///
    /// A unit too large to encode keeps its previous digest and fails
    /// verification and encoding later.
    #[must_use]
    pub fn sealed(mut self) -> Self {
        super::verify::recompute_frames(&mut self);
        if let Ok(digest) = self.compute_digest() {
            self.digest = digest;
        }
        self
    }

    #[must_use]
    pub fn with_super(mut self, super_name: impl Into<String>) -> Self {
        self.super_name = Some(super_name.into());
        self
    }

    #[must_use]
    pub fn with_interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: FieldUnit) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: MethodUnit) -> Self {
        self.methods.push(method);
        self
    }
}

impl FieldUnit {
    #[must_use]
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            access: ACC_PUBLIC,
            name: name.into(),
            descriptor: descriptor.into(),
            signature: None,
            constant: None,
        }
    }
}

impl MethodUnit {
    #[must_use]
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            access: ACC_PUBLIC,
            name: name.into(),
            descriptor: descriptor.into(),
            signature: None,
            exceptions: Vec::new(),
            code: Vec::new(),
            entry_frame: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub fn with_code(mut self, code: Vec<Instruction>) -> Self {
        self.code = code;
        self
    }
}
