pub mod completion;
pub mod transport;
