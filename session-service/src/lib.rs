//! session-service: CRUD over session records with version-token concurrency.
pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
