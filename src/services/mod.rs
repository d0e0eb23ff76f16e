// src/services/mod.rs
pub mod email;
pub mod oauth;
pub mod tokens;
pub mod verification;

pub use email::{Mailer, SesMailer};
pub use oauth::OAuthClient;
pub use tokens::{TokenPurpose, TokenService};
pub use verification::{MagicLinkTarget, VerificationService};
