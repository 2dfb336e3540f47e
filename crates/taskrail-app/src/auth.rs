//! Single authority for authentication state.
//!
//! All transitions go through [`AuthManager`]; consumers only ever see
//! cloned [`AuthState`] snapshots. Only one authentication transition may be
//! in flight at a time: a login/register issued while another is pending is
//! rejected, never interleaved into the shared state.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use taskrail_core::{ApiError, AuthSession, Credentials, User};

use crate::credential::{CredentialError, CredentialStore};
use crate::gateway::RemoteGateway;
use crate::task_cache::TaskCacheCoordinator;

/// Phase of the authentication state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// No session; the default resting state.
    Unauthenticated,
    /// A login or register call is in flight.
    Authenticating,
    /// A stored credential is being checked against the backend at startup.
    SessionCheckPending,
    /// A session is established.
    Authenticated,
}

/// Snapshot of the authoritative authentication state.
///
/// Derived, not independently settable: instances are only built by the
/// manager's transitions, so `is_authenticated()` is true iff both user and
/// token are present and the last credential check succeeded.
#[derive(Debug, Clone)]
pub struct AuthState {
    user: Option<User>,
    token: Option<String>,
    phase: AuthPhase,
}

impl AuthState {
    const fn unauthenticated() -> Self {
        Self {
            user: None,
            token: None,
            phase: AuthPhase::Unauthenticated,
        }
    }

    const fn authenticating() -> Self {
        Self {
            user: None,
            token: None,
            phase: AuthPhase::Authenticating,
        }
    }

    const fn session_check_pending(token: String) -> Self {
        Self {
            user: None,
            token: Some(token),
            phase: AuthPhase::SessionCheckPending,
        }
    }

    const fn authenticated(user: User, token: String) -> Self {
        Self {
            user: Some(user),
            token: Some(token),
            phase: AuthPhase::Authenticated,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> AuthPhase {
        self.phase
    }

    /// The signed-in user, present only while authenticated.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// The active bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// True iff a session is established.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.phase == AuthPhase::Authenticated
    }

    /// True while a transition or startup check is pending.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(
            self.phase,
            AuthPhase::Authenticating | AuthPhase::SessionCheckPending
        )
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::unauthenticated()
    }
}

/// Failures surfaced by authentication transitions.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A login/register was issued while another one is still pending.
    #[error("another authentication attempt is already in progress")]
    TransitionInFlight,
    /// Registration hit an email that is already taken.
    #[error("an account with this email already exists")]
    AccountExists,
    /// The credential file could not be updated.
    #[error(transparent)]
    Credential(#[from] CredentialError),
    /// The gateway reported a typed failure.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Orchestrates login/register/logout and owns the authoritative [`AuthState`].
pub struct AuthManager<G> {
    gateway: Arc<G>,
    credentials: Arc<CredentialStore>,
    cache: Arc<TaskCacheCoordinator<G>>,
    state: RwLock<AuthState>,
    transition: Mutex<()>,
}

impl<G: RemoteGateway> AuthManager<G> {
    /// Create a manager over the shared gateway, credential store and cache.
    pub fn new(
        gateway: Arc<G>,
        credentials: Arc<CredentialStore>,
        cache: Arc<TaskCacheCoordinator<G>>,
    ) -> Self {
        Self {
            gateway,
            credentials,
            cache,
            state: RwLock::new(AuthState::unauthenticated()),
            transition: Mutex::new(()),
        }
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> AuthState {
        self.state.read().await.clone()
    }

    /// Resolve the startup session: check any stored credential against the
    /// backend. A rejected credential is cleared and silently downgraded to
    /// `Unauthenticated`; it is not an error.
    ///
    /// # Errors
    /// Propagates non-`Unauthorized` gateway failures (the stored credential
    /// is kept so a later start can retry) and credential-store failures.
    pub async fn bootstrap(&self) -> Result<AuthState, AuthError> {
        let _guard = self.transition.lock().await;
        let Some(token) = self.credentials.get() else {
            *self.state.write().await = AuthState::unauthenticated();
            return Ok(self.state().await);
        };

        *self.state.write().await = AuthState::session_check_pending(token.clone());
        match self.gateway.current_user().await {
            Ok(user) => {
                info!(email = %user.email, "restored session");
                *self.state.write().await = AuthState::authenticated(user, token);
            }
            Err(ApiError::Unauthorized) => {
                info!("stored session rejected by the backend; signing out");
                *self.state.write().await = AuthState::unauthenticated();
                self.credentials.clear()?;
            }
            Err(err) => {
                *self.state.write().await = AuthState::unauthenticated();
                return Err(err.into());
            }
        }
        Ok(self.state().await)
    }

    /// Sign in and persist the returned credential.
    ///
    /// # Errors
    /// [`AuthError::TransitionInFlight`] when another login/register is
    /// pending; otherwise the gateway failure, with the state rolled back to
    /// `Unauthenticated`.
    pub async fn login(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let _guard = self
            .transition
            .try_lock()
            .map_err(|_| AuthError::TransitionInFlight)?;
        *self.state.write().await = AuthState::authenticating();
        let result = self.gateway.login(credentials).await;
        let user = self.finish_authentication(result).await?;
        info!(email = %user.email, "signed in");
        Ok(user)
    }

    /// Create an account and sign in; identical transition shape to
    /// [`login`](Self::login), with `Conflict` mapped to
    /// [`AuthError::AccountExists`].
    ///
    /// # Errors
    /// Same as [`login`](Self::login), plus [`AuthError::AccountExists`].
    pub async fn register(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let _guard = self
            .transition
            .try_lock()
            .map_err(|_| AuthError::TransitionInFlight)?;
        *self.state.write().await = AuthState::authenticating();
        let result = self.gateway.register(credentials).await;
        match self.finish_authentication(result).await {
            Ok(user) => {
                info!(email = %user.email, "account created");
                Ok(user)
            }
            Err(AuthError::Api(ApiError::Conflict(_))) => Err(AuthError::AccountExists),
            Err(err) => Err(err),
        }
    }

    /// Resolve an `Authenticating` transition. Any failure, including one
    /// from persisting the credential after a successful gateway call, rolls
    /// the state back to `Unauthenticated` before the error is surfaced.
    async fn finish_authentication(
        &self,
        result: Result<AuthSession, ApiError>,
    ) -> Result<User, AuthError> {
        let err = match result {
            Ok(session) => match self.credentials.set(&session.token) {
                Ok(()) => {
                    let user = session.user.clone();
                    *self.state.write().await =
                        AuthState::authenticated(session.user, session.token);
                    return Ok(user);
                }
                Err(err) => AuthError::Credential(err),
            },
            Err(err) => AuthError::Api(err),
        };
        *self.state.write().await = AuthState::unauthenticated();
        Err(err)
    }

    /// Sign out: best-effort server-side invalidation, then local cleanup.
    ///
    /// A failed gateway call never blocks the local cleanup; the credential
    /// is cleared, the task cache purged and the state reset regardless.
    ///
    /// # Errors
    /// Only credential-store failures; gateway failures are logged at warn.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let _guard = self.transition.lock().await;
        if let Err(err) = self.gateway.logout().await {
            warn!(error = %err, "server-side logout failed; clearing local session anyway");
        }
        self.credentials.clear()?;
        self.cache.purge().await;
        *self.state.write().await = AuthState::unauthenticated();
        info!("signed out");
        Ok(())
    }

    /// Replace the cached user in place after a profile-affecting operation.
    ///
    /// Token and authentication status are untouched; ignored unless a
    /// session is established.
    pub async fn update_user(&self, user: User) {
        let mut state = self.state.write().await;
        if state.phase == AuthPhase::Authenticated {
            state.user = Some(user);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::credential::CREDENTIAL_FILE;
    use std::sync::Mutex as StdMutex;
    use taskrail_core::{
        Task, TaskDraft, TaskFilter, TaskId, TaskPage, TaskPatch, UserId,
    };
    use tempfile::{TempDir, tempdir};
    use time::OffsetDateTime;
    use tokio::sync::oneshot;

    fn user(email: &str) -> User {
        User {
            id: UserId::new(),
            email: email.into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn session(email: &str, token: &str) -> AuthSession {
        AuthSession {
            user: user(email),
            token: token.into(),
        }
    }

    #[derive(Default)]
    struct AuthGateway {
        login_response: StdMutex<Option<Result<AuthSession, ApiError>>>,
        register_response: StdMutex<Option<Result<AuthSession, ApiError>>>,
        current_user_response: StdMutex<Option<Result<User, ApiError>>>,
        logout_response: StdMutex<Option<Result<(), ApiError>>>,
        login_gate: StdMutex<Option<oneshot::Receiver<()>>>,
        logout_calls: StdMutex<u32>,
        list_calls: StdMutex<u32>,
    }

    impl AuthGateway {
        fn with_login(self, response: Result<AuthSession, ApiError>) -> Self {
            *self.login_response.lock().unwrap() = Some(response);
            self
        }

        fn with_register(self, response: Result<AuthSession, ApiError>) -> Self {
            *self.register_response.lock().unwrap() = Some(response);
            self
        }

        fn with_current_user(self, response: Result<User, ApiError>) -> Self {
            *self.current_user_response.lock().unwrap() = Some(response);
            self
        }

        fn with_logout(self, response: Result<(), ApiError>) -> Self {
            *self.logout_response.lock().unwrap() = Some(response);
            self
        }

        fn gate_login(&self) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            *self.login_gate.lock().unwrap() = Some(rx);
            tx
        }

        fn logout_calls(&self) -> u32 {
            *self.logout_calls.lock().unwrap()
        }

        fn list_calls(&self) -> u32 {
            *self.list_calls.lock().unwrap()
        }
    }

    impl RemoteGateway for AuthGateway {
        async fn login(&self, _credentials: &Credentials) -> Result<AuthSession, ApiError> {
            let gate = self.login_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.login_response
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(ApiError::Unauthorized))
        }

        async fn register(&self, _credentials: &Credentials) -> Result<AuthSession, ApiError> {
            self.register_response
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(ApiError::Unauthorized))
        }

        async fn logout(&self) -> Result<(), ApiError> {
            *self.logout_calls.lock().unwrap() += 1;
            self.logout_response.lock().unwrap().take().unwrap_or(Ok(()))
        }

        async fn current_user(&self) -> Result<User, ApiError> {
            self.current_user_response
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(ApiError::Unauthorized))
        }

        async fn list_tasks(&self, _filter: &TaskFilter) -> Result<TaskPage, ApiError> {
            *self.list_calls.lock().unwrap() += 1;
            Ok(TaskPage::default())
        }

        async fn create_task(&self, _draft: &TaskDraft) -> Result<Task, ApiError> {
            unreachable!("mutations are not exercised in auth tests")
        }

        async fn update_task(&self, _id: TaskId, _patch: &TaskPatch) -> Result<Task, ApiError> {
            unreachable!("mutations are not exercised in auth tests")
        }

        async fn delete_task(&self, _id: TaskId) -> Result<(), ApiError> {
            unreachable!("mutations are not exercised in auth tests")
        }
    }

    struct Fixture {
        manager: AuthManager<AuthGateway>,
        gateway: Arc<AuthGateway>,
        credentials: Arc<CredentialStore>,
        cache: Arc<TaskCacheCoordinator<AuthGateway>>,
        _dir: TempDir,
    }

    fn fixture(gateway: AuthGateway) -> Fixture {
        let dir = tempdir().unwrap();
        let credentials = Arc::new(CredentialStore::open(dir.path()).unwrap());
        let gateway = Arc::new(gateway);
        let cache = Arc::new(TaskCacheCoordinator::new(Arc::clone(&gateway)));
        let manager = AuthManager::new(
            Arc::clone(&gateway),
            Arc::clone(&credentials),
            Arc::clone(&cache),
        );
        Fixture {
            manager,
            gateway,
            credentials,
            cache,
            _dir: dir,
        }
    }

    fn creds() -> Credentials {
        Credentials {
            email: "a@b.com".into(),
            password: "secret1".into(),
        }
    }

    #[tokio::test]
    async fn successful_login_authenticates_and_persists_the_token() {
        let fx = fixture(AuthGateway::default().with_login(Ok(session("a@b.com", "tok-1"))));

        let user = fx.manager.login(&creds()).await.unwrap();
        assert_eq!(user.email, "a@b.com");

        let state = fx.manager.state().await;
        assert!(state.is_authenticated());
        assert!(!state.is_loading());
        assert_eq!(state.token(), Some("tok-1"));
        assert_eq!(state.user().unwrap().email, "a@b.com");
        assert_eq!(fx.credentials.get().as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn failed_login_rolls_back_to_unauthenticated() {
        let fx = fixture(AuthGateway::default().with_login(Err(ApiError::Unauthorized)));

        let err = fx.manager.login(&creds()).await.unwrap_err();
        assert!(matches!(err, AuthError::Api(ApiError::Unauthorized)));

        let state = fx.manager.state().await;
        assert!(!state.is_authenticated());
        assert_eq!(state.phase(), AuthPhase::Unauthenticated);
        assert!(!fx.credentials.has());
    }

    #[tokio::test]
    async fn login_rolls_back_when_the_credential_cannot_be_persisted() {
        let fx = fixture(AuthGateway::default().with_login(Ok(session("a@b.com", "tok-1"))));
        // A directory occupying the credential path makes every write fail.
        std::fs::create_dir_all(fx._dir.path().join(CREDENTIAL_FILE)).unwrap();

        let err = fx.manager.login(&creds()).await.unwrap_err();
        assert!(matches!(err, AuthError::Credential(_)));

        let state = fx.manager.state().await;
        assert_eq!(state.phase(), AuthPhase::Unauthenticated);
        assert!(!state.is_loading());
        // The transition resolved; a fresh login attempt is not rejected.
        let err = fx.manager.login(&creds()).await.unwrap_err();
        assert!(!matches!(err, AuthError::TransitionInFlight));
    }

    #[tokio::test]
    async fn register_rolls_back_when_the_credential_cannot_be_persisted() {
        let fx =
            fixture(AuthGateway::default().with_register(Ok(session("new@b.com", "tok-9"))));
        std::fs::create_dir_all(fx._dir.path().join(CREDENTIAL_FILE)).unwrap();

        let err = fx.manager.register(&creds()).await.unwrap_err();
        assert!(matches!(err, AuthError::Credential(_)));
        assert_eq!(fx.manager.state().await.phase(), AuthPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn bootstrap_resolves_the_state_even_when_the_clear_fails() {
        let fx = fixture(AuthGateway::default().with_current_user(Err(ApiError::Unauthorized)));
        fx.credentials.set("tok-expired").unwrap();
        // Swap the credential file for a directory so `clear` cannot remove it.
        let path = fx._dir.path().join(CREDENTIAL_FILE);
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let err = fx.manager.bootstrap().await.unwrap_err();
        assert!(matches!(err, AuthError::Credential(_)));
        // The state is already resolved, not stuck at SessionCheckPending.
        let state = fx.manager.state().await;
        assert_eq!(state.phase(), AuthPhase::Unauthenticated);
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn register_conflict_maps_to_account_exists() {
        let fx = fixture(
            AuthGateway::default().with_register(Err(ApiError::Conflict("email taken".into()))),
        );

        let err = fx.manager.register(&creds()).await.unwrap_err();
        assert!(matches!(err, AuthError::AccountExists));
        assert!(!fx.manager.state().await.is_authenticated());
    }

    #[tokio::test]
    async fn successful_register_behaves_like_login() {
        let fx = fixture(AuthGateway::default().with_register(Ok(session("new@b.com", "tok-9"))));

        fx.manager.register(&creds()).await.unwrap();
        let state = fx.manager.state().await;
        assert!(state.is_authenticated());
        assert_eq!(fx.credentials.get().as_deref(), Some("tok-9"));
    }

    #[tokio::test]
    async fn second_login_while_one_is_in_flight_is_rejected() {
        let gateway = AuthGateway::default().with_login(Ok(session("a@b.com", "tok-1")));
        let release = gateway.gate_login();
        let fx = fixture(gateway);

        let credentials = creds();
        let first = fx.manager.login(&credentials);
        let second = async {
            tokio::task::yield_now().await;
            let err = fx.manager.login(&creds()).await.unwrap_err();
            assert!(matches!(err, AuthError::TransitionInFlight));
            release.send(()).unwrap();
        };
        let (first_result, ()) = tokio::join!(first, second);
        // The first attempt still wins and resolves normally.
        first_result.unwrap();
        assert!(fx.manager.state().await.is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_everything_even_when_the_server_call_fails() {
        let fx = fixture(
            AuthGateway::default()
                .with_login(Ok(session("a@b.com", "tok-1")))
                .with_logout(Err(ApiError::NetworkFailure("down".into()))),
        );
        fx.manager.login(&creds()).await.unwrap();
        fx.cache.read(&TaskFilter::default()).await.unwrap();
        let calls_before = fx.gateway.list_calls();

        fx.manager.logout().await.unwrap();

        assert_eq!(fx.gateway.logout_calls(), 1);
        assert!(!fx.credentials.has());
        assert!(!fx.manager.state().await.is_authenticated());
        // The purge dropped the cached view, so the next read fetches again.
        fx.cache.read(&TaskFilter::default()).await.unwrap();
        assert_eq!(fx.gateway.list_calls(), calls_before + 1);
    }

    #[tokio::test]
    async fn bootstrap_without_a_stored_token_goes_straight_to_unauthenticated() {
        let fx = fixture(AuthGateway::default());
        let state = fx.manager.bootstrap().await.unwrap();
        assert_eq!(state.phase(), AuthPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn bootstrap_with_a_valid_token_restores_the_session() {
        let fx = fixture(AuthGateway::default().with_current_user(Ok(user("a@b.com"))));
        fx.credentials.set("tok-stored").unwrap();

        let state = fx.manager.bootstrap().await.unwrap();
        assert!(state.is_authenticated());
        assert_eq!(state.token(), Some("tok-stored"));
        assert_eq!(state.user().unwrap().email, "a@b.com");
    }

    #[tokio::test]
    async fn bootstrap_with_a_rejected_token_downgrades_silently() {
        let fx = fixture(AuthGateway::default().with_current_user(Err(ApiError::Unauthorized)));
        fx.credentials.set("tok-expired").unwrap();

        // Not an error: the expired session resolves to Unauthenticated.
        let state = fx.manager.bootstrap().await.unwrap();
        assert_eq!(state.phase(), AuthPhase::Unauthenticated);
        assert!(!fx.credentials.has());
    }

    #[tokio::test]
    async fn bootstrap_network_failure_keeps_the_stored_token() {
        let fx = fixture(
            AuthGateway::default()
                .with_current_user(Err(ApiError::NetworkFailure("offline".into()))),
        );
        fx.credentials.set("tok-keep").unwrap();

        let err = fx.manager.bootstrap().await.unwrap_err();
        assert!(matches!(err, AuthError::Api(ApiError::NetworkFailure(_))));
        assert_eq!(fx.credentials.get().as_deref(), Some("tok-keep"));
        assert!(!fx.manager.state().await.is_authenticated());
    }

    #[tokio::test]
    async fn update_user_replaces_only_the_user_field() {
        let fx = fixture(AuthGateway::default().with_login(Ok(session("a@b.com", "tok-1"))));
        fx.manager.login(&creds()).await.unwrap();

        fx.manager.update_user(user("renamed@b.com")).await;
        let state = fx.manager.state().await;
        assert_eq!(state.user().unwrap().email, "renamed@b.com");
        assert_eq!(state.token(), Some("tok-1"));
        assert!(state.is_authenticated());
    }

    #[tokio::test]
    async fn update_user_is_ignored_while_unauthenticated() {
        let fx = fixture(AuthGateway::default());
        fx.manager.update_user(user("ghost@b.com")).await;
        assert!(fx.manager.state().await.user().is_none());
    }
}
