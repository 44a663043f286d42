pub mod collection;
pub mod filter;
pub mod manager;
pub mod memory;
pub mod postgres;
pub mod schema;
pub mod store;

pub use collection::Collection;
pub use filter::Filter;
pub use manager::{ConnectionMonitor, DatabaseError};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use schema::{Document, FieldDef, FieldType, Schema, SchemaError, SchemaOptions};
pub use store::{CollectionSpec, DocumentStore, StoreError, StoreResult};
