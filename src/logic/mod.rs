pub mod admin;
pub mod cascade;
pub mod catalog;
pub mod estimate;
pub mod pdf;
pub mod quote;

pub use admin::*;
pub use cascade::*;
pub use catalog::*;
pub use estimate::*;
pub use pdf::render_pdf;
pub use quote::*;
