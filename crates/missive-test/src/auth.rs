//! An in-memory [`AuthProvider`].

use chrono::{DateTime, Duration, Utc};
use missive_auth::{AuthProvider, AuthResult, AuthSession, Session, SessionInfo, User};
use missive_core::{AuthError, BoxFuture};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug)]
struct Account {
    user: User,
    password: String,
}

#[derive(Debug, Default)]
struct Store {
    accounts: HashMap<String, Account>,
    sessions: HashMap<String, Session>,
}

/// Keeps users and sessions in memory.
///
/// Passwords are compared as plain text. Sessions last 30 days unless
/// configured otherwise; expired sessions are reported as
/// [`AuthError::token_expired`] once and then forgotten.
///
/// # Example
///
/// ```
/// use missive_auth::AuthProvider;
/// use missive_test::MemoryAuthProvider;
///
/// # tokio_test::block_on(async {
/// let provider = MemoryAuthProvider::new();
/// let signed_up = provider.sign_up("ada@example.com", "correct horse", "Ada").await.unwrap();
/// let found = provider.get_session(&signed_up.session.token).await.unwrap();
/// assert_eq!(found.user.email, "ada@example.com");
/// # });
/// ```
#[derive(Debug)]
pub struct MemoryAuthProvider {
    store: RwLock<Store>,
    session_ttl: Duration,
    unavailable: RwLock<Option<String>>,
}

impl Default for MemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuthProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: RwLock::new(Store::default()),
            session_ttl: Duration::days(30),
            unavailable: RwLock::new(None),
        }
    }

    /// Sets the lifetime of new sessions.
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Makes every operation fail with [`AuthError::unavailable`] until
    /// [`restore`](Self::restore) is called.
    pub fn set_unavailable(&self, message: impl Into<String>) {
        *self.unavailable.write() = Some(message.into());
    }

    /// Undoes [`set_unavailable`](Self::set_unavailable).
    pub fn restore(&self) {
        *self.unavailable.write() = None;
    }

    /// Moves the expiry of the session for `token` to `at`.
    ///
    /// Returns false when the token is unknown.
    pub fn expire_session_at(&self, token: &str, at: DateTime<Utc>) -> bool {
        match self.store.write().sessions.get_mut(token) {
            Some(session) => {
                session.expires_at = at;
                true
            }
            None => false,
        }
    }

    /// Returns the number of registered users.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.store.read().accounts.len()
    }

    /// Returns the number of open sessions, expired ones included.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.store.read().sessions.len()
    }

    fn check_available(&self) -> AuthResult<()> {
        match self.unavailable.read().as_deref() {
            Some(message) => Err(AuthError::unavailable(message)),
            None => Ok(()),
        }
    }

    fn open_session(&self, store: &mut Store, user: &User) -> AuthSession {
        let session = Session {
            token: Uuid::now_v7().simple().to_string(),
            user_id: user.id.clone(),
            expires_at: Utc::now() + self.session_ttl,
        };
        store
            .sessions
            .insert(session.token.clone(), session.clone());
        AuthSession {
            user: user.clone(),
            session,
        }
    }

    fn register(&self, email: &str, password: &str, name: &str) -> AuthResult<AuthSession> {
        self.check_available()?;
        let key = email.to_lowercase();
        let mut store = self.store.write();
        if store.accounts.contains_key(&key) {
            return Err(AuthError::rejected("User already exists"));
        }
        let user = User::new(Uuid::now_v7().to_string(), email, name, Utc::now());
        let session = self.open_session(&mut store, &user);
        store.accounts.insert(
            key,
            Account {
                user,
                password: password.to_string(),
            },
        );
        Ok(session)
    }

    fn authenticate(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        self.check_available()?;
        let mut store = self.store.write();
        let user = match store.accounts.get(&email.to_lowercase()) {
            Some(account) if account.password == password => account.user.clone(),
            _ => return Err(AuthError::invalid_credentials()),
        };
        Ok(self.open_session(&mut store, &user))
    }

    fn revoke(&self, token: &str) -> AuthResult<()> {
        self.check_available()?;
        self.store
            .write()
            .sessions
            .remove(token)
            .map(|_| ())
            .ok_or_else(AuthError::invalid_token)
    }

    fn lookup(&self, token: &str) -> AuthResult<SessionInfo> {
        self.check_available()?;
        let mut store = self.store.write();
        let session = store
            .sessions
            .get(token)
            .cloned()
            .ok_or_else(AuthError::invalid_token)?;
        if session.is_expired_at(Utc::now()) {
            store.sessions.remove(token);
            return Err(AuthError::token_expired());
        }
        let user = store
            .accounts
            .values()
            .find(|account| account.user.id == session.user_id)
            .map(|account| account.user.clone())
            .ok_or_else(AuthError::invalid_token)?;
        Ok(SessionInfo { user, session })
    }
}

impl AuthProvider for MemoryAuthProvider {
    fn sign_up<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, AuthResult<AuthSession>> {
        Box::pin(async move { self.register(email, password, name) })
    }

    fn sign_in<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, AuthResult<AuthSession>> {
        Box::pin(async move { self.authenticate(email, password) })
    }

    fn sign_out<'a>(&'a self, token: &'a str) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move { self.revoke(token) })
    }

    fn get_session<'a>(&'a self, token: &'a str) -> BoxFuture<'a, AuthResult<SessionInfo>> {
        Box::pin(async move { self.lookup(token) })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
