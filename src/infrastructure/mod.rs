pub mod cache;
pub mod json_store;
pub mod woo_client;
