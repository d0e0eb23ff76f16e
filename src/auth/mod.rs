//! # Auth Module
//!
//! Everything identity: credential strategies, the identity resolver that
//! maps every credential to one canonical user, session tokens, and the
//! SessionUser extractor for protected routes.

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod repo;
pub mod resolver;
pub mod routes;
pub mod session;
pub mod strategies;

#[cfg(test)]
mod tests;

pub use extractors::SessionUser;
pub use models::User;
pub use routes::auth_routes;
