mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;
mod validation;
pub mod ws;

pub use error::ApiError;
pub use server::{router, run};
