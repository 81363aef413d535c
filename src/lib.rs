pub mod application;
pub mod config;
pub mod domain;
pub mod function_service;
pub mod infrastructure;
