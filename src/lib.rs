pub mod app;
pub mod audit;
pub mod authz;
pub mod counters;
pub mod db;
pub mod docs;
pub mod errors;
pub mod extract;
pub mod jwt;
pub mod models;
pub mod page;
pub mod routes;
pub mod utils;

// Re-export commonly used items for tests
pub use app::{build_router, create_app, AppState};
