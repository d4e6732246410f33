pub mod config;
pub mod database;
pub mod repository;

pub use config::StoreConfig;
pub use database::Database;
pub use repository::JobRepository;
