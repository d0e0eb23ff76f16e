//! Tests for auth module
//!
//! These tests run the resolver and strategies against a real in-memory
//! SQLite database, so the uniqueness constraints behave exactly as they
//! do in production.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Duration;
    use sqlx::SqlitePool;
    use uuid::Uuid;

    use crate::auth::models::{ProfileFields, ProviderKind, User, UserDraft, UserPatch};
    use crate::auth::repo::{RepoError, SqliteUserRepository, UserRepository};
    use crate::auth::resolver::{AuthError, IdentityResolver};
    use crate::auth::strategies::{github, google, magic_link};
    use crate::common::migrations::run_migrations;
    use crate::services::oauth::{GithubProfile, GoogleProfile};
    use crate::services::tokens::{TokenClaims, TokenPurpose, TokenService};

    async fn sqlite_repo() -> Arc<SqliteUserRepository> {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        Arc::new(SqliteUserRepository::new(pool))
    }

    async fn resolver() -> IdentityResolver {
        IdentityResolver::new(sqlite_repo().await)
    }

    fn tokens() -> TokenService {
        TokenService::new(
            "test_secret_key",
            "http://localhost:8080",
            "http://localhost:5173",
        )
    }

    fn profile(name: &str) -> ProfileFields {
        ProfileFields {
            name: Some(name.to_string()),
            avatar_url: Some(format!("https://example.com/{}.png", name)),
            email_verified: None,
        }
    }

    // ---- password strategy ----

    #[tokio::test]
    async fn test_register_and_login_round_trip() {
        let resolver = resolver().await;

        let registered = resolver
            .register_local("a@x.com", "hunter2hunter2", Some("A"))
            .await
            .unwrap();
        assert!(registered.password.is_some());
        assert!(!registered.is_email_verified);

        let logged_in = resolver
            .resolve_by_password("a@x.com", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(logged_in.id, registered.id);
    }

    #[tokio::test]
    async fn test_credential_failures_are_indistinguishable() {
        let resolver = resolver().await;
        resolver
            .register_local("a@x.com", "hunter2hunter2", None)
            .await
            .unwrap();

        // unknown email, wrong password, and a password attempt against a
        // provider-only account all collapse into the same error
        let unknown = resolver
            .resolve_by_password("ghost@x.com", "hunter2hunter2")
            .await
            .unwrap_err();
        let wrong = resolver
            .resolve_by_password("a@x.com", "not-the-password")
            .await
            .unwrap_err();

        resolver
            .resolve_or_link_provider(
                ProviderKind::Github,
                "octocat",
                "oauth-only@x.com",
                profile("octo"),
            )
            .await
            .unwrap();
        let passwordless = resolver
            .resolve_by_password("oauth-only@x.com", "anything-at-all")
            .await
            .unwrap_err();

        assert!(matches!(unknown, AuthError::Credential));
        assert!(matches!(wrong, AuthError::Credential));
        assert!(matches!(passwordless, AuthError::Credential));
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let resolver = resolver().await;
        resolver
            .register_local("a@x.com", "hunter2hunter2", None)
            .await
            .unwrap();

        let err = resolver
            .register_local("A@X.COM", "hunter2hunter2", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    // ---- provider linking ----

    #[tokio::test]
    async fn test_provider_links_to_existing_local_account() {
        let resolver = resolver().await;
        let local = resolver
            .register_local("a@x.com", "hunter2hunter2", Some("A"))
            .await
            .unwrap();

        let linked = resolver
            .resolve_or_link_provider(ProviderKind::Github, "octocat", "a@x.com", profile("octo"))
            .await
            .unwrap();

        // same canonical row, now carrying the provider link; the
        // verification flag belongs to the verification flow, not to linking
        assert_eq!(linked.id, local.id);
        assert_eq!(linked.github_id.as_deref(), Some("octocat"));
        assert!(!linked.is_email_verified);

        // linking never disturbs the local credential
        let still_logs_in = resolver
            .resolve_by_password("a@x.com", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(still_logs_in.id, local.id);
    }

    #[tokio::test]
    async fn test_provider_creation_leaves_email_unverified() {
        let resolver = resolver().await;

        let verified = ProfileFields {
            email_verified: Some(true),
            ..profile("A")
        };

        // even a provider-asserted verified email does not pre-verify the
        // account; only the verification callback flips the flag
        let created = resolver
            .resolve_or_link_provider(ProviderKind::Google, "g-1", "a@x.com", verified)
            .await
            .unwrap();
        assert!(!created.is_email_verified);
    }

    #[tokio::test]
    async fn test_repeat_provider_login_is_idempotent_and_write_free() {
        let inner = sqlite_repo().await;
        let counting = Arc::new(CountingRepo {
            inner,
            writes: AtomicUsize::new(0),
        });
        let resolver = IdentityResolver::new(counting.clone());

        let first = resolver
            .resolve_or_link_provider(ProviderKind::Google, "g-1", "a@x.com", profile("A"))
            .await
            .unwrap();
        let writes_after_first = counting.writes.load(Ordering::SeqCst);

        let second = resolver
            .resolve_or_link_provider(ProviderKind::Google, "g-1", "a@x.com", profile("A"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        // the second resolution takes the read-only fast path
        assert_eq!(counting.writes.load(Ordering::SeqCst), writes_after_first);
    }

    #[tokio::test]
    async fn test_two_providers_converge_on_one_row() {
        let resolver = resolver().await;

        let via_github = resolver
            .resolve_or_link_provider(ProviderKind::Github, "octocat", "a@x.com", profile("A"))
            .await
            .unwrap();
        let via_google = resolver
            .resolve_or_link_provider(ProviderKind::Google, "g-1", "a@x.com", profile("A"))
            .await
            .unwrap();

        assert_eq!(via_github.id, via_google.id);
        assert_eq!(via_google.github_id.as_deref(), Some("octocat"));
        assert_eq!(via_google.google_id.as_deref(), Some("g-1"));
    }

    #[tokio::test]
    async fn test_provider_link_found_by_id_despite_changed_email() {
        let resolver = resolver().await;

        let created = resolver
            .resolve_or_link_provider(ProviderKind::Google, "g-1", "a@x.com", profile("A"))
            .await
            .unwrap();

        // the provider now reports a different email; the existing link wins
        // over the email match, so no second row is created
        let resolved = resolver
            .resolve_or_link_provider(ProviderKind::Google, "g-1", "b@x.com", profile("A"))
            .await
            .unwrap();

        assert_eq!(resolved.id, created.id);
        assert_eq!(resolved.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_unverified_provider_email_cannot_create_account() {
        let resolver = resolver().await;

        let unverified = ProfileFields {
            email_verified: Some(false),
            ..profile("A")
        };

        let err = resolver
            .resolve_or_link_provider(ProviderKind::Google, "g-1", "a@x.com", unverified.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        // but the same unverified identity may link to an existing account
        resolver
            .register_local("a@x.com", "hunter2hunter2", None)
            .await
            .unwrap();
        let linked = resolver
            .resolve_or_link_provider(ProviderKind::Google, "g-1", "a@x.com", unverified)
            .await
            .unwrap();
        assert_eq!(linked.google_id.as_deref(), Some("g-1"));
    }

    // ---- profile normalization ----

    #[test]
    fn test_github_profile_without_email_gets_actionable_error() {
        let profile = GithubProfile {
            id: 1,
            login: "octocat".to_string(),
            name: Some("Octo".to_string()),
            email: None,
            avatar_url: None,
        };

        let err = github::normalize(profile).unwrap_err();
        match err {
            AuthError::Validation(msg) => {
                assert!(msg.contains("public on GitHub"), "got: {}", msg)
            }
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_github_profile_blank_fields_become_none() {
        let profile = GithubProfile {
            id: 1,
            login: "octocat".to_string(),
            name: Some("   ".to_string()),
            email: Some("a@x.com".to_string()),
            avatar_url: Some("".to_string()),
        };

        let (login, email, fields) = github::normalize(profile).unwrap();
        assert_eq!(login, "octocat");
        assert_eq!(email, "a@x.com");
        assert!(fields.name.is_none());
        assert!(fields.avatar_url.is_none());
    }

    #[test]
    fn test_google_profile_forwards_verification_flag() {
        let profile = GoogleProfile {
            sub: "g-1".to_string(),
            email: Some("a@x.com".to_string()),
            email_verified: None,
            name: Some("A".to_string()),
            picture: None,
        };

        // an absent assertion counts as unverified
        let (_, _, fields) = google::normalize(profile).unwrap();
        assert_eq!(fields.email_verified, Some(false));
    }

    /// Repository wrapper that counts mutating calls, so tests can assert
    /// which resolution paths are read-only.
    struct CountingRepo {
        inner: Arc<SqliteUserRepository>,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl UserRepository for CountingRepo {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
            self.inner.find_by_email(email).await
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepoError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_provider_id(
            &self,
            provider: ProviderKind,
            provider_id: &str,
        ) -> Result<Option<User>, RepoError> {
            self.inner.find_by_provider_id(provider, provider_id).await
        }

        async fn create(&self, draft: UserDraft) -> Result<User, RepoError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.create(draft).await
        }

        async fn update_by_email(
            &self,
            email: &str,
            patch: UserPatch,
        ) -> Result<Option<User>, RepoError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.update_by_email(email, patch).await
        }

        async fn delete(&self, id: &str) -> Result<(), RepoError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.delete(id).await
        }
    }

    // ---- creation races ----

    /// Repository wrapper that makes the first `create` lose a race: a
    /// conflicting row with the same email appears underneath it and the
    /// call reports a unique violation, exactly as a concurrent insert would.
    struct RacingRepo {
        inner: Arc<SqliteUserRepository>,
        raced: AtomicBool,
    }

    #[async_trait]
    impl UserRepository for RacingRepo {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
            self.inner.find_by_email(email).await
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepoError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_provider_id(
            &self,
            provider: ProviderKind,
            provider_id: &str,
        ) -> Result<Option<User>, RepoError> {
            self.inner.find_by_provider_id(provider, provider_id).await
        }

        async fn create(&self, draft: UserDraft) -> Result<User, RepoError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let winner = UserDraft {
                    email: draft.email.clone(),
                    name: Some("Winner".to_string()),
                    ..Default::default()
                };
                self.inner.create(winner).await?;
                return Err(RepoError::UniqueViolation);
            }
            self.inner.create(draft).await
        }

        async fn update_by_email(
            &self,
            email: &str,
            patch: UserPatch,
        ) -> Result<Option<User>, RepoError> {
            self.inner.update_by_email(email, patch).await
        }

        async fn delete(&self, id: &str) -> Result<(), RepoError> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_provider_creation_race_links_to_winner() {
        let inner = sqlite_repo().await;
        let resolver = IdentityResolver::new(Arc::new(RacingRepo {
            inner: inner.clone(),
            raced: AtomicBool::new(false),
        }));

        let resolved = resolver
            .resolve_or_link_provider(ProviderKind::Github, "octocat", "a@x.com", profile("A"))
            .await
            .unwrap();

        // one row, owned by the race winner, now carrying the link
        let winner = inner.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(resolved.id, winner.id);
        assert_eq!(winner.github_id.as_deref(), Some("octocat"));
    }

    #[tokio::test]
    async fn test_email_creation_race_returns_winner_as_existing() {
        let inner = sqlite_repo().await;
        let resolver = IdentityResolver::new(Arc::new(RacingRepo {
            inner,
            raced: AtomicBool::new(false),
        }));

        let (user, created) = resolver
            .resolve_or_create_by_email("a@x.com", Some("A"))
            .await
            .unwrap();

        assert!(!created);
        assert_eq!(user.name.as_deref(), Some("Winner"));
    }

    // ---- magic link strategy ----

    fn magic_token(
        tokens: &TokenService,
        subject: &str,
        purpose: TokenPurpose,
        email: &str,
        name: Option<&str>,
    ) -> String {
        tokens
            .issue(
                subject,
                purpose,
                Duration::minutes(10),
                TokenClaims {
                    purpose,
                    email: Some(email.to_string()),
                    name: name.map(str::to_string),
                },
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_magic_link_signup_creates_unverified_user() {
        let resolver = resolver().await;
        let tokens = tokens();

        let token = magic_token(
            &tokens,
            &Uuid::new_v4().to_string(),
            TokenPurpose::MagicLinkSignUp,
            "new@x.com",
            Some("New"),
        );

        let user = magic_link::authenticate(&resolver, &tokens, &token)
            .await
            .unwrap();
        assert_eq!(user.email, "new@x.com");
        assert_eq!(user.name.as_deref(), Some("New"));
        // clicking the link logs the user in but verification has its own
        // flow; the fresh account starts unverified
        assert!(!user.is_email_verified);

        // replaying the link after the account exists is a conflict
        let err = magic_link::authenticate(&resolver, &tokens, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_magic_link_login_requires_matching_subject() {
        let resolver = resolver().await;
        let tokens = tokens();

        let user = resolver
            .register_local("a@x.com", "hunter2hunter2", None)
            .await
            .unwrap();

        let good = magic_token(
            &tokens,
            &user.id,
            TokenPurpose::MagicLinkLogin,
            "a@x.com",
            None,
        );
        let resolved = magic_link::authenticate(&resolver, &tokens, &good)
            .await
            .unwrap();
        assert_eq!(resolved.id, user.id);

        // minted for some other user id, e.g. a deleted-and-recreated account
        let stale = magic_token(
            &tokens,
            &Uuid::new_v4().to_string(),
            TokenPurpose::MagicLinkLogin,
            "a@x.com",
            None,
        );
        let err = magic_link::authenticate(&resolver, &tokens, &stale)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }

    #[tokio::test]
    async fn test_magic_link_login_for_unknown_email_is_validation_error() {
        let resolver = resolver().await;
        let tokens = tokens();

        let token = magic_token(
            &tokens,
            &Uuid::new_v4().to_string(),
            TokenPurpose::MagicLinkLogin,
            "ghost@x.com",
            None,
        );

        let err = magic_link::authenticate(&resolver, &tokens, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn test_verification_token_rejected_at_magic_link_callback() {
        let resolver = resolver().await;
        let tokens = tokens();

        let user = resolver
            .register_local("a@x.com", "hunter2hunter2", None)
            .await
            .unwrap();

        let token = magic_token(
            &tokens,
            &user.id,
            TokenPurpose::EmailVerification,
            "a@x.com",
            None,
        );

        let err = magic_link::authenticate(&resolver, &tokens, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }

    // ---- verification ----

    #[tokio::test]
    async fn test_mark_email_verified_is_idempotent() {
        let resolver = resolver().await;
        resolver
            .register_local("a@x.com", "hunter2hunter2", None)
            .await
            .unwrap();

        let (user, already) = resolver.mark_email_verified("a@x.com").await.unwrap();
        assert!(user.is_email_verified);
        assert!(!already);

        let (user, already) = resolver.mark_email_verified("a@x.com").await.unwrap();
        assert!(user.is_email_verified);
        assert!(already);
    }
}
