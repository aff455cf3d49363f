pub mod catalog;
pub mod common;
pub mod icon;
pub mod selection;
pub mod session;

pub use catalog::*;
pub use common::*;
pub use icon::*;
pub use selection::*;
pub use session::*;
