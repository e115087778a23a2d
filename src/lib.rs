pub mod catalog;
pub mod config;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod refresher;
pub mod store;
pub mod wal;
