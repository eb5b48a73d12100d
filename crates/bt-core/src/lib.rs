pub mod error;
pub mod types;
pub mod value;

pub use error::BtError;
pub use types::*;
pub use value::*;
