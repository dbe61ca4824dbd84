// Handler modules
pub mod analyze;
pub mod auth;
pub mod cache;
pub mod filters;

// Re-export all handler functions
pub use analyze::handle_analyze;
pub use auth::handle_auth;
pub use cache::handle_cache;
pub use filters::handle_filters;
