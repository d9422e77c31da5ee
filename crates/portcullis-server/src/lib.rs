//! # portcullis-server
//!
//! The Portcullis gateway server: the pluggable request pipeline, built-in
//! services and the HTTP surface.
//!
//! ## Modules
//!
//! - [`config`] - Configuration structs and loader
//! - [`observability`] - Tracing initialization
//! - [`pipeline`] - Unit traits, registry, resolver and executor
//! - [`services`] - Built-in ping and echo services
//! - [`interceptors`] - Built-in non-service units
//! - [`server`] - axum wiring and the server builder

pub mod config;
pub mod interceptors;
pub mod observability;
pub mod pipeline;
pub mod server;
pub mod services;

pub use config::AppConfig;
pub use server::{PortcullisServer, ServerBuilder, build_app};
