pub mod operations;
pub mod schema;

#[cfg(test)]
mod tests;

pub use operations::{registry_path, AddressPayload, AddressRecord, Database, TransactionRow};
pub use schema::{initialize_schema, run_migrations, SCHEMA_VERSION};
