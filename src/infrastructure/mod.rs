// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod export;
pub mod file_repository;
pub mod http_data_source;
pub mod http_response;
