pub mod database;
pub mod memstore;
pub mod persistence;

pub use database::Database;
pub use memstore::MemStore;
pub use persistence::Persistence;
