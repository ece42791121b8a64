pub mod memory;
pub mod row_store;
pub mod sqlite;
