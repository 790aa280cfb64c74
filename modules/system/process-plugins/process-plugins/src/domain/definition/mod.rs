pub mod element;
pub mod interceptor;
pub mod model;

pub use interceptor::{API_VERSION_PROPERTY, DefinitionParsingInterceptor, TASK_CREATE_EVENT};
pub use model::{BindingKind, InvocationBinding, ParsedActivity, ParsedProcess};
