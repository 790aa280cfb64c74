//! Infrastructure: class unit format and loading contexts.

pub mod classfile;
pub mod loader;
