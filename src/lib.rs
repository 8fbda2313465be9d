pub mod api;
pub mod config;
pub mod download;
pub mod engine;
pub mod generation;
pub mod humanize;
pub mod observability;
