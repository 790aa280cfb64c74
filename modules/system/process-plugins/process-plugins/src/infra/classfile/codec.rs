//! Binary reader and writer for class units.
//!
//! Layout (big-endian):
//!
//! ```text
//! magic "PMCU" | u16 version | body | digest[32]
//! ```
//!
//! Strings are u16-length-prefixed UTF-8, optional strings carry a u8 presence
//! flag, and instructions, constants and verification types are tagged with a u8.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::ClassFormatError;
use super::model::{
    ClassUnit, Constant, FieldOp, FieldUnit, Instruction, InvokeOp, MethodHandle, MethodUnit,
    TypeOp, VerificationType,
};

pub const MAGIC: &[u8; 4] = b"PMCU";
pub const FORMAT_VERSION: u16 = 1;
const DIGEST_LEN: usize = 32;

impl ClassUnit {
    /// # Errors
    ///
    /// Returns [`ClassFormatError`] if `data` is not a well-formed version 1 unit.
    pub fn decode(data: &[u8]) -> Result<Self, ClassFormatError> {
        let mut r = Reader { buf: data };
        let magic = r.take(4)?;
        if magic != MAGIC {
            return Err(ClassFormatError::BadMagic);
        }
        let version = r.u16()?;
        if version != FORMAT_VERSION {
            return Err(ClassFormatError::UnsupportedVersion(version));
        }

        let access = r.u16()?;
        let name = r.string()?;
        let super_name = r.opt_string()?;
        let signature = r.opt_string()?;
        let interfaces = r.list(Reader::string)?;
        let fields = r.list(Reader::field)?;
        let methods = r.list(Reader::method)?;

        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(r.take(DIGEST_LEN)?);

        if !r.buf.is_empty() {
            return Err(ClassFormatError::TrailingBytes(r.buf.len()));
        }

        Ok(Self {
            access,
            name,
            super_name,
            signature,
            interfaces,
            fields,
            methods,
            digest,
        })
    }

    /// Encodes the unit with its current digest.
    ///
    /// # Errors
    ///
    /// Returns [`ClassFormatError::TooLarge`] if a string or list exceeds the format limits.
    pub fn encode(&self) -> Result<Bytes, ClassFormatError> {
        let mut out = BytesMut::with_capacity(256);
        out.put_slice(MAGIC);
        out.put_u16(FORMAT_VERSION);
        write_body(self, &mut out)?;
        out.put_slice(&self.digest);
        Ok(out.freeze())
    }
}

pub(super) fn write_body(unit: &ClassUnit, out: &mut BytesMut) -> Result<(), ClassFormatError> {
    out.put_u16(unit.access);
    put_string(out, &unit.name)?;
    put_opt_string(out, unit.super_name.as_deref())?;
    put_opt_string(out, unit.signature.as_deref())?;

    put_len(out, unit.interfaces.len(), "interfaces")?;
    for interface in &unit.interfaces {
        put_string(out, interface)?;
    }

    put_len(out, unit.fields.len(), "fields")?;
    for field in &unit.fields {
        out.put_u16(field.access);
        put_string(out, &field.name)?;
        put_string(out, &field.descriptor)?;
        put_opt_string(out, field.signature.as_deref())?;
        match &field.constant {
            None => out.put_u8(0),
            Some(constant) => {
                out.put_u8(1);
                put_constant(out, constant)?;
            }
        }
    }

    put_len(out, unit.methods.len(), "methods")?;
    for method in &unit.methods {
        out.put_u16(method.access);
        put_string(out, &method.name)?;
        put_string(out, &method.descriptor)?;
        put_opt_string(out, method.signature.as_deref())?;
        put_len(out, method.exceptions.len(), "exceptions")?;
        for exception in &method.exceptions {
            put_string(out, exception)?;
        }
        let code_len = u32::try_from(method.code.len())
            .map_err(|_| ClassFormatError::TooLarge { what: "code" })?;
        out.put_u32(code_len);
        for insn in &method.code {
            put_instruction(out, insn)?;
        }
        put_len(out, method.entry_frame.len(), "entry frame")?;
        for vtype in &method.entry_frame {
            put_verification_type(out, vtype)?;
        }
    }
    Ok(())
}

fn put_len(out: &mut BytesMut, len: usize, what: &'static str) -> Result<(), ClassFormatError> {
    let len = u16::try_from(len).map_err(|_| ClassFormatError::TooLarge { what })?;
    out.put_u16(len);
    Ok(())
}

fn put_string(out: &mut BytesMut, s: &str) -> Result<(), ClassFormatError> {
    put_len(out, s.len(), "string")?;
    out.put_slice(s.as_bytes());
    Ok(())
}

fn put_opt_string(out: &mut BytesMut, s: Option<&str>) -> Result<(), ClassFormatError> {
    match s {
        None => out.put_u8(0),
        Some(s) => {
            out.put_u8(1);
            put_string(out, s)?;
        }
    }
    Ok(())
}

fn put_handle(out: &mut BytesMut, handle: &MethodHandle) -> Result<(), ClassFormatError> {
    out.put_u8(handle.tag);
    put_string(out, &handle.owner)?;
    put_string(out, &handle.name)?;
    put_string(out, &handle.descriptor)?;
    out.put_u8(u8::from(handle.interface));
    Ok(())
}

fn put_constant(out: &mut BytesMut, constant: &Constant) -> Result<(), ClassFormatError> {
    match constant {
        Constant::Int(v) => {
            out.put_u8(0);
            out.put_i32(*v);
        }
        Constant::Long(v) => {
            out.put_u8(1);
            out.put_i64(*v);
        }
        Constant::Str(s) => {
            out.put_u8(2);
            put_string(out, s)?;
        }
        Constant::Type(t) => {
            out.put_u8(3);
            put_string(out, t)?;
        }
        Constant::Handle(h) => {
            out.put_u8(4);
            put_handle(out, h)?;
        }
    }
    Ok(())
}

fn put_instruction(out: &mut BytesMut, insn: &Instruction) -> Result<(), ClassFormatError> {
    match insn {
        Instruction::Simple(opcode) => {
            out.put_u8(0);
            out.put_u8(*opcode);
        }
        Instruction::Type { op, type_name } => {
            out.put_u8(1);
            out.put_u8(match op {
                TypeOp::New => 0,
                TypeOp::CheckCast => 1,
                TypeOp::InstanceOf => 2,
                TypeOp::ANewArray => 3,
            });
            put_string(out, type_name)?;
        }
        Instruction::Field {
            op,
            owner,
            name,
            descriptor,
        } => {
            out.put_u8(2);
            out.put_u8(match op {
                FieldOp::GetStatic => 0,
                FieldOp::PutStatic => 1,
                FieldOp::GetField => 2,
                FieldOp::PutField => 3,
            });
            put_string(out, owner)?;
            put_string(out, name)?;
            put_string(out, descriptor)?;
        }
        Instruction::Method {
            op,
            owner,
            name,
            descriptor,
            interface,
        } => {
            out.put_u8(3);
            out.put_u8(match op {
                InvokeOp::Virtual => 0,
                InvokeOp::Special => 1,
                InvokeOp::Static => 2,
                InvokeOp::Interface => 3,
            });
            put_string(out, owner)?;
            put_string(out, name)?;
            put_string(out, descriptor)?;
            out.put_u8(u8::from(*interface));
        }
        Instruction::Ldc(constant) => {
            out.put_u8(4);
            put_constant(out, constant)?;
        }
        Instruction::InvokeDynamic {
            name,
            descriptor,
            bootstrap,
            arguments,
        } => {
            out.put_u8(5);
            put_string(out, name)?;
            put_string(out, descriptor)?;
            put_handle(out, bootstrap)?;
            put_len(out, arguments.len(), "bootstrap arguments")?;
            for argument in arguments {
                put_constant(out, argument)?;
            }
        }
    }
    Ok(())
}

fn put_verification_type(out: &mut BytesMut, vtype: &VerificationType) -> Result<(), ClassFormatError> {
    match vtype {
        VerificationType::Top => out.put_u8(0),
        VerificationType::Integer => out.put_u8(1),
        VerificationType::Float => out.put_u8(2),
        VerificationType::Long => out.put_u8(3),
        VerificationType::Double => out.put_u8(4),
        VerificationType::Null => out.put_u8(5),
        VerificationType::UninitializedThis => out.put_u8(6),
        VerificationType::Object(name) => {
            out.put_u8(7);
            put_string(out, name)?;
        }
    }
    Ok(())
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn need(&self, n: usize) -> Result<(), ClassFormatError> {
        if self.buf.remaining() < n {
            return Err(ClassFormatError::UnexpectedEof {
                needed: n,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ClassFormatError> {
        self.need(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, ClassFormatError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self) -> Result<u16, ClassFormatError> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    fn u32(&mut self) -> Result<u32, ClassFormatError> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    fn flag(&mut self) -> Result<bool, ClassFormatError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            tag => Err(ClassFormatError::UnknownTag { kind: "flag", tag }),
        }
    }

    fn string(&mut self) -> Result<String, ClassFormatError> {
        let len = usize::from(self.u16()?);
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| ClassFormatError::InvalidUtf8)
    }

    fn opt_string(&mut self) -> Result<Option<String>, ClassFormatError> {
        if self.flag()? {
            Ok(Some(self.string()?))
        } else {
            Ok(None)
        }
    }

    fn list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, ClassFormatError>,
    ) -> Result<Vec<T>, ClassFormatError> {
        let count = self.u16()?;
        let mut items = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            items.push(item(self)?);
        }
        Ok(items)
    }

    fn field(&mut self) -> Result<FieldUnit, ClassFormatError> {
        let access = self.u16()?;
        let name = self.string()?;
        let descriptor = self.string()?;
        let signature = self.opt_string()?;
        let constant = if self.flag()? {
            Some(self.constant()?)
        } else {
            None
        };
        Ok(FieldUnit {
            access,
            name,
            descriptor,
            signature,
            constant,
        })
    }

    fn method(&mut self) -> Result<MethodUnit, ClassFormatError> {
        let access = self.u16()?;
        let name = self.string()?;
        let descriptor = self.string()?;
        let signature = self.opt_string()?;
        let exceptions = self.list(Reader::string)?;
        let code_len = self.u32()?;
        let mut code = Vec::new();
        for _ in 0..code_len {
            code.push(self.instruction()?);
        }
        let entry_frame = self.list(Reader::verification_type)?;
        Ok(MethodUnit {
            access,
            name,
            descriptor,
            signature,
            exceptions,
            code,
            entry_frame,
        })
    }

    fn handle(&mut self) -> Result<MethodHandle, ClassFormatError> {
        Ok(MethodHandle {
            tag: self.u8()?,
            owner: self.string()?,
            name: self.string()?,
            descriptor: self.string()?,
            interface: self.flag()?,
        })
    }

    fn constant(&mut self) -> Result<Constant, ClassFormatError> {
        match self.u8()? {
            0 => {
                self.need(4)?;
                Ok(Constant::Int(self.buf.get_i32()))
            }
            1 => {
                self.need(8)?;
                Ok(Constant::Long(self.buf.get_i64()))
            }
            2 => Ok(Constant::Str(self.string()?)),
            3 => Ok(Constant::Type(self.string()?)),
            4 => Ok(Constant::Handle(self.handle()?)),
            tag => Err(ClassFormatError::UnknownTag {
                kind: "constant",
                tag,
            }),
        }
    }

    fn instruction(&mut self) -> Result<Instruction, ClassFormatError> {
        match self.u8()? {
            0 => Ok(Instruction::Simple(self.u8()?)),
            1 => {
                let op = match self.u8()? {
                    0 => TypeOp::New,
                    1 => TypeOp::CheckCast,
                    2 => TypeOp::InstanceOf,
                    3 => TypeOp::ANewArray,
                    tag => return Err(ClassFormatError::UnknownTag { kind: "type op", tag }),
                };
                Ok(Instruction::Type {
                    op,
                    type_name: self.string()?,
                })
            }
            2 => {
                let op = match self.u8()? {
                    0 => FieldOp::GetStatic,
                    1 => FieldOp::PutStatic,
                    2 => FieldOp::GetField,
                    3 => FieldOp::PutField,
                    tag => return Err(ClassFormatError::UnknownTag { kind: "field op", tag }),
                };
                Ok(Instruction::Field {
                    op,
                    owner: self.string()?,
                    name: self.string()?,
                    descriptor: self.string()?,
                })
            }
            3 => {
                let op = match self.u8()? {
                    0 => InvokeOp::Virtual,
                    1 => InvokeOp::Special,
                    2 => InvokeOp::Static,
                    3 => InvokeOp::Interface,
                    tag => return Err(ClassFormatError::UnknownTag { kind: "invoke op", tag }),
                };
                Ok(Instruction::Method {
                    op,
                    owner: self.string()?,
                    name: self.string()?,
                    descriptor: self.string()?,
                    interface: self.flag()?,
                })
            }
            4 => Ok(Instruction::Ldc(self.constant()?)),
            5 => {
                let name = self.string()?;
                let descriptor = self.string()?;
                let bootstrap = self.handle()?;
                let arguments = self.list(Reader::constant)?;
                Ok(Instruction::InvokeDynamic {
                    name,
                    descriptor,
                    bootstrap,
                    arguments,
                })
            }
            tag => Err(ClassFormatError::UnknownTag {
                kind: "instruction",
                tag,
            }),
        }
    }

    fn verification_type(&mut self) -> Result<VerificationType, ClassFormatError> {
        match self.u8()? {
            0 => Ok(VerificationType::Top),
            1 => Ok(VerificationType::Integer),
            2 => Ok(VerificationType::Float),
            3 => Ok(VerificationType::Long),
            4 => Ok(VerificationType::Double),
            5 => Ok(VerificationType::Null),
            6 => Ok(VerificationType::UninitializedThis),
            7 => Ok(VerificationType::Object(self.string()?)),
            tag => Err(ClassFormatError::UnknownTag {
                kind: "verification type",
                tag,
            }),
        }
    }
}
