//! Compiled class unit format.

mod codec;
pub mod error;
pub mod model;
pub mod verify;

pub use codec::{FORMAT_VERSION, MAGIC};
pub use error::{ClassFormatError, VerifyError};
pub use model::{
    ClassUnit, Constant, FieldOp, FieldUnit, Instruction, InvokeOp, MethodHandle, MethodUnit,
    TypeOp, VerificationType,
};
