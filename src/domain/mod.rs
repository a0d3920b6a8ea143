// Domain layer - Pure dashboard types and algorithms
pub mod dashboard;
pub mod layout;
pub mod report;
pub mod widget;
