/// Middleware for the API server
///
/// Session authentication lives in [`crate::app::auth_layer`] since it
/// needs the application state.

pub mod security;
