pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod identity;
pub mod log;
pub mod manifest;
pub mod middleware;
pub mod resource;

pub use database::{Collection, DocumentStore, FieldDef, FieldType, Filter, MemoryStore, PgStore, Schema, SchemaOptions};
pub use error::ApiError;
pub use identity::{Identity, IdentityConfig, OwnedResources};
pub use middleware::Middleware;
pub use resource::{Operation, OperationHandler, ResourceConfig};
