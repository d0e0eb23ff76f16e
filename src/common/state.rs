// Application state shared across all modules

use std::sync::Arc;

use crate::auth::repo::UserRepository;
use crate::auth::resolver::IdentityResolver;
use crate::services::{OAuthClient, TokenService, VerificationService};

/// Application state containing services and configuration
#[derive(Clone)]
pub struct AppState {
    pub jwt_secret: String,
    pub frontend_url: String,
    pub backend_url: String,
    pub repo: Arc<dyn UserRepository>,
    pub resolver: Arc<IdentityResolver>,
    pub tokens: Arc<TokenService>,
    pub oauth: Arc<OAuthClient>,
    pub verification: Arc<VerificationService>,
}
