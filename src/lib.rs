pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use error::{AuthError, GatewayError, GatewayResult};

pub use logic::{
    CascadeDeleter, CascadeError, CascadeReport, Catalog, CatalogEditor, CatalogReader,
    EditorError, Estimate, QuoteDocument, QuoteStyle,
};

// Export all model types
pub use model::*;

// Export seed module
pub use seed::*;

// Export store types
pub use store::{
    AuthProvider, EstimateCache, HostedAuth, MemoryStore, PostgresStore, RestStore,
    SessionContext, StaticAuth, Store,
};
