pub mod codec;
pub mod container;
pub mod definition;
pub mod descriptor;
pub mod diagnostics;
pub mod error;
pub mod lifecycle;
pub mod recovery;
pub mod registry;
pub mod router;
