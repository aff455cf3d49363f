pub mod auth;
pub mod estimate_cache;
pub mod memory;
pub mod postgres;
pub mod rest;
pub mod traits;

pub use auth::*;
pub use estimate_cache::*;
pub use memory::*;
pub use postgres::*;
pub use rest::*;
pub use traits::*;
