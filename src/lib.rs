//! Library crate for storefront-back, exposing the domain services, the API
//! gateway and their shared plumbing to the binaries and tests.

pub mod auth;
pub mod config;
pub mod dao;
mod dto;
mod error;
pub mod gateway;
pub mod routes;
pub mod services;
pub mod state;
