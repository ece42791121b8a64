pub mod config;
pub mod error;
pub mod log_record;
pub mod log_row;
