pub mod admin_handlers;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod session_extractor;

pub use error::*;
pub use handlers::*;
pub use routes::*;
pub use session_extractor::AdminSession;
