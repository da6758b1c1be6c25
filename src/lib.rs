pub mod config;
pub mod infoshare;
pub mod releases;
pub mod reshape;
pub mod session;
pub mod table;
pub mod utils;
