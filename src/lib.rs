pub mod config;
pub mod errors;
pub mod models;
pub mod routes;
pub mod utils;

pub use config::Config;
pub use routes::register;
