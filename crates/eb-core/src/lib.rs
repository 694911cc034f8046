pub mod call;
pub mod error;
pub mod types;
pub mod value;

pub use call::CallArgs;
pub use error::{BridgeError, ErrorKind};
pub use types::*;
pub use value::*;
