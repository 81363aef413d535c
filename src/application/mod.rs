pub mod loader_service;
