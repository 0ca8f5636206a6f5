pub mod provider;
pub mod types;
