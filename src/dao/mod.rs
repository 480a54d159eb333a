/// Database model definitions.
pub mod models;
/// Quiz record storage backends.
pub mod quiz_store;
/// Typed record tables and queries.
pub mod records;
/// Storage abstraction layer for database operations.
pub mod storage;
