//! Library exports for the URL shortener service
//!
//! This module exposes internal components for testing and for the binary.

pub mod config;
pub mod cookie;
pub mod database;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod password;
pub mod route;
pub mod state;
pub mod token;
