pub mod database;
pub mod file_store;
pub mod maintenance;
pub mod oscar;
pub mod store;
pub mod subscription;
pub mod telegram;
