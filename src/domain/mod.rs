pub mod error;
pub mod panel;

pub use error::*;
pub use panel::*;
