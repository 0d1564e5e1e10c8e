// crates/types/src/lib.rs
pub mod session;
pub mod summary;
pub mod wire;

pub use session::*;
pub use summary::*;
pub use wire::*;
