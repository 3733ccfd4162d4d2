// FICHIER : backend/src/commands/mod.rs

pub mod rest_service;

pub use rest_service::{Method, RestResponse, RestService};
