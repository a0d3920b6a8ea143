// Application layer - Use cases and the ports they depend on
pub mod dashboard_repository;
pub mod dashboard_service;
pub mod dashboard_store;
pub mod query_cache;
pub mod report_export;
pub mod widget_data_service;
pub mod widget_data_source;
