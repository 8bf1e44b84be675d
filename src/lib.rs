//! Explore feed ranking service: assembles, personalizes and caches
//! short-video property feeds.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
