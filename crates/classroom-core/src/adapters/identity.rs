use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::password::{hash_password, verify_password};
use crate::types::{CreateUser, Session, User};

/// Hosted identity provider: owns users, credentials and sessions.
///
/// The service never stores credentials itself; every authentication flow
/// goes through this trait.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Register a user with email and password.
    async fn sign_up(&self, user: CreateUser) -> AppResult<User>;

    /// Verify credentials and open a session.
    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> AppResult<(User, Session)>;

    /// Resolve a live session token. Expired or unknown tokens yield `None`.
    async fn get_session(&self, token: &str) -> AppResult<Option<(User, Session)>>;

    async fn get_user(&self, id: &str) -> AppResult<Option<User>>;

    /// End a session. Unknown tokens are an error.
    async fn sign_out(&self, token: &str) -> AppResult<()>;
}

struct StoredUser {
    user: User,
    password_hash: String,
}

/// In-memory identity provider for testing and development.
pub struct MemoryIdentityProvider {
    users: Mutex<HashMap<String, StoredUser>>,
    email_index: Mutex<HashMap<String, String>>,
    sessions: Mutex<HashMap<String, Session>>,
    session_ttl: Duration,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            email_index: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            session_ttl: Duration::hours(24 * 7),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    fn open_session(&self, user_id: &str) -> AppResult<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            token: format!("session_{}", Uuid::new_v4()),
            user_id: user_id.to_string(),
            expires_at: now + self.session_ttl,
            created_at: now,
        };
        let mut sessions = lock(&self.sessions)?;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        if sessions.len() < before {
            tracing::debug!(expired = before - sessions.len(), "expired sessions pruned");
        }
        sessions.insert(session.token.clone(), session.clone());
        Ok(session)
    }

    /// Sessions currently held, expired ones included until the next sign-in.
    pub fn session_count(&self) -> AppResult<usize> {
        Ok(lock(&self.sessions)?.len())
    }
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> AppResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| AppError::identity("identity store unavailable"))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_up(&self, create: CreateUser) -> AppResult<User> {
        let email = normalize_email(&create.email);
        // Hash before taking any lock; argon2 is slow.
        let password_hash = hash_password(&create.password)?;

        let mut email_index = lock(&self.email_index)?;
        if email_index.contains_key(&email) {
            return Err(AppError::conflict("User already registered"));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            name: create.name,
            role: create.role,
            created_at: Utc::now(),
        };

        lock(&self.users)?.insert(
            user.id.clone(),
            StoredUser {
                user: user.clone(),
                password_hash,
            },
        );
        email_index.insert(email, user.id.clone());

        Ok(user)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> AppResult<(User, Session)> {
        let email = normalize_email(email);
        let (user, password_hash) = {
            let user_id = lock(&self.email_index)?
                .get(&email)
                .cloned()
                .ok_or(AppError::InvalidCredentials)?;
            let users = lock(&self.users)?;
            let stored = users.get(&user_id).ok_or(AppError::InvalidCredentials)?;
            (stored.user.clone(), stored.password_hash.clone())
        };

        verify_password(password, &password_hash)?;

        let session = self.open_session(&user.id)?;
        Ok((user, session))
    }

    async fn get_session(&self, token: &str) -> AppResult<Option<(User, Session)>> {
        let session = {
            let mut sessions = lock(&self.sessions)?;
            match sessions.get(token) {
                Some(session) if session.is_expired() => {
                    sessions.remove(token);
                    return Ok(None);
                }
                Some(session) => session.clone(),
                None => return Ok(None),
            }
        };

        let users = lock(&self.users)?;
        Ok(users
            .get(&session.user_id)
            .map(|stored| (stored.user.clone(), session)))
    }

    async fn get_user(&self, id: &str) -> AppResult<Option<User>> {
        let users = lock(&self.users)?;
        Ok(users.get(id).map(|stored| stored.user.clone()))
    }

    async fn sign_out(&self, token: &str) -> AppResult<()> {
        lock(&self.sessions)?
            .remove(token)
            .map(|_| ())
            .ok_or(AppError::SessionNotFound)
    }
}
