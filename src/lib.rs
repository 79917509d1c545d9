pub mod app;
pub mod auth;
pub mod catalog;
pub mod chat;
pub mod client;
pub mod config;
pub mod gateway;
pub mod jwt;
pub mod models;
pub mod prompt;
pub mod quiz_session;
pub mod session_store;
pub mod setup;
pub mod summary;
pub mod upstream;
pub mod validation;
