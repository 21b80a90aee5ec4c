pub mod error;
pub mod payloads;
pub mod stats;
pub mod traits;
pub mod types;

pub use error::*;
pub use payloads::*;
pub use traits::*;
pub use types::*;
