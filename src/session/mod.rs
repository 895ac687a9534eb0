//! Authentication session: token, user id, and their durable copy.

pub mod storage;

use tracing::{info, warn};

use crate::gateway::{AuthApi, GatewayError};
use crate::model::{Credentials, Registration, User, UserId};
use storage::{KeyValueStore, StorageOp};

pub const TOKEN_KEY: &str = "token";
pub const LOGGED_IN_KEY: &str = "loggedIn";
pub const USER_ID_KEY: &str = "user_id";

/// In-memory session. Logged in exactly when a non-empty token is held.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSession {
    token: Option<String>,
    user_id: Option<UserId>,
}

impl AuthSession {
    pub fn logged_in(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }
}

/// What a successful login hands back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub token: String,
    pub user_id: Option<UserId>,
}

/// Owns the session and its durable copy. Token attachment goes through
/// whatever gateway the caller passes in.
pub struct SessionManager<S> {
    storage: S,
    session: AuthSession,
}

impl<S: KeyValueStore> SessionManager<S> {
    /// Load the session from storage and attach its token to `gateway`.
    /// No stored token means logged out, whatever `loggedIn` says.
    pub fn restore(storage: S, gateway: &impl AuthApi) -> Self {
        let token = storage.get(TOKEN_KEY).filter(|t| !t.is_empty());
        let session = match token {
            Some(token) => AuthSession {
                user_id: storage
                    .get(USER_ID_KEY)
                    .filter(|id| !id.is_empty())
                    .map(|id| UserId::parse(&id)),
                token: Some(token),
            },
            None => AuthSession::default(),
        };
        gateway.set_auth_token(session.token());
        SessionManager { storage, session }
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.logged_in()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Log in. Returns `None` on any failure: a gateway error, a response
    /// without a token, or a session that could not be persisted. A failed
    /// attempt leaves the session logged out.
    pub fn login(
        &mut self,
        gateway: &impl AuthApi,
        credentials: &Credentials,
    ) -> Option<SessionInfo> {
        let response = match gateway.login(credentials) {
            Ok(response) => response,
            Err(e) => {
                warn!(email = %credentials.email, error = %e, "login failed");
                self.invalidate(gateway);
                return None;
            }
        };
        let Some(token) = response.token.filter(|t| !t.is_empty()) else {
            warn!(email = %credentials.email, "login response carried no token");
            self.invalidate(gateway);
            return None;
        };

        let user_id = response.user_id;
        let user_id_text = user_id.as_ref().map(|id| id.to_string());
        let persisted = {
            let mut ops = vec![
                StorageOp::Set(TOKEN_KEY, &token),
                StorageOp::Set(LOGGED_IN_KEY, "true"),
            ];
            match &user_id_text {
                Some(id) => ops.push(StorageOp::Set(USER_ID_KEY, id)),
                None => ops.push(StorageOp::Remove(USER_ID_KEY)),
            }
            self.storage.write_batch(&ops)
        };
        if let Err(e) = persisted {
            warn!(error = %e, "could not persist session");
            self.invalidate(gateway);
            return None;
        }

        gateway.set_auth_token(Some(&token));
        self.session = AuthSession {
            token: Some(token.clone()),
            user_id: user_id.clone(),
        };
        info!(user_id = ?user_id, "logged in");
        Some(SessionInfo { token, user_id })
    }

    /// Drop the session locally: clear storage, detach the token. Makes no
    /// remote call. Returns whether a session was active.
    pub fn logout(&mut self, gateway: &impl AuthApi) -> bool {
        let was_logged_in = self.session.logged_in();
        if let Err(e) = self.storage.write_batch(&[
            StorageOp::Remove(TOKEN_KEY),
            StorageOp::Set(LOGGED_IN_KEY, "false"),
            StorageOp::Remove(USER_ID_KEY),
        ]) {
            warn!(error = %e, "could not clear stored session");
        }
        gateway.set_auth_token(None);
        self.session = AuthSession::default();
        info!("logged out");
        was_logged_in
    }

    /// Create an account. Registration does not log in.
    pub fn register(
        &self,
        gateway: &impl AuthApi,
        data: &Registration,
    ) -> Result<User, GatewayError> {
        gateway.register(data).inspect_err(|e| {
            warn!(email = %data.email, error = %e, "registration failed");
        })
    }

    /// Mark the session logged out after a failed login. Storage is only
    /// rewritten when it still holds a token.
    fn invalidate(&mut self, gateway: &impl AuthApi) {
        if self.storage.get(TOKEN_KEY).is_some() {
            if let Err(e) = self.storage.write_batch(&[
                StorageOp::Remove(TOKEN_KEY),
                StorageOp::Set(LOGGED_IN_KEY, "false"),
                StorageOp::Remove(USER_ID_KEY),
            ]) {
                warn!(error = %e, "could not clear stored session");
            }
        }
        gateway.set_auth_token(None);
        self.session = AuthSession::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use storage::MemoryStorage;

    fn creds(password: &str) -> Credentials {
        Credentials {
            email: "ada@example.com".into(),
            password: password.into(),
        }
    }

    fn gateway() -> MemoryGateway {
        let gw = MemoryGateway::new();
        gw.add_account("Ada", "ada@example.com", "pw");
        gw
    }

    #[test]
    fn login_persists_and_attaches() {
        let gw = gateway();
        let mut sm = SessionManager::restore(MemoryStorage::new(), &gw);
        assert!(!sm.is_logged_in());

        let info = sm.login(&gw, &creds("pw")).unwrap();
        assert!(sm.is_logged_in());
        assert_eq!(sm.session().token(), Some(info.token.as_str()));
        assert_eq!(gw.attached_token(), Some(info.token.clone()));
        assert_eq!(sm.storage().get(TOKEN_KEY), Some(info.token));
        assert_eq!(sm.storage().get(LOGGED_IN_KEY), Some("true".into()));
        assert_eq!(
            sm.storage().get(USER_ID_KEY),
            info.user_id.map(|id| id.to_string())
        );
    }

    #[test]
    fn missing_token_is_a_failed_login_without_writes() {
        let gw = gateway();
        gw.omit_login_token(true);
        let mut sm = SessionManager::restore(MemoryStorage::new(), &gw);

        assert_eq!(sm.login(&gw, &creds("pw")), None);
        assert!(!sm.is_logged_in());
        assert!(sm.storage().is_empty());
        assert_eq!(sm.storage().writes(), 0);
        assert_eq!(gw.attached_token(), None);
    }

    #[test]
    fn rejected_login_marks_logged_out() {
        let gw = gateway();
        let mut sm = SessionManager::restore(MemoryStorage::new(), &gw);
        sm.login(&gw, &creds("pw")).unwrap();

        assert_eq!(sm.login(&gw, &creds("wrong")), None);
        assert!(!sm.is_logged_in());
        assert_eq!(sm.storage().get(TOKEN_KEY), None);
        assert_eq!(sm.storage().get(LOGGED_IN_KEY), Some("false".into()));
        assert_eq!(gw.attached_token(), None);
    }

    #[test]
    fn logout_clears_everything_locally() {
        let gw = gateway();
        let mut sm = SessionManager::restore(MemoryStorage::new(), &gw);
        sm.login(&gw, &creds("pw")).unwrap();
        let calls_before = gw.calls().len();

        assert!(sm.logout(&gw));
        assert!(!sm.is_logged_in());
        assert_eq!(sm.session().user_id(), None);
        assert_eq!(sm.storage().get(TOKEN_KEY), None);
        assert_eq!(sm.storage().get(USER_ID_KEY), None);
        assert_eq!(sm.storage().get(LOGGED_IN_KEY), Some("false".into()));
        assert_eq!(gw.attached_token(), None);
        assert_eq!(gw.calls().len(), calls_before, "logout must not call out");
    }

    #[test]
    fn restore_requires_a_token() {
        let gw = gateway();
        let mut storage = MemoryStorage::new();
        storage.set(LOGGED_IN_KEY, "true").unwrap();
        let sm = SessionManager::restore(storage, &gw);
        assert!(!sm.is_logged_in());
        assert_eq!(gw.attached_token(), None);

        let mut storage = MemoryStorage::new();
        storage
            .write_batch(&[
                StorageOp::Set(TOKEN_KEY, "tok-1"),
                StorageOp::Set(USER_ID_KEY, "3"),
            ])
            .unwrap();
        let sm = SessionManager::restore(storage, &gw);
        assert!(sm.is_logged_in());
        assert_eq!(sm.session().user_id(), Some(&UserId::from(3)));
        assert_eq!(gw.attached_token(), Some("tok-1".into()));
    }

    #[test]
    fn register_leaves_session_alone() {
        let gw = gateway();
        let sm = SessionManager::restore(MemoryStorage::new(), &gw);
        let user = sm
            .register(
                &gw,
                &Registration {
                    name: "Grace".into(),
                    email: "grace@example.com".into(),
                    password: "pw".into(),
                },
            )
            .unwrap();
        assert_eq!(user.name, "Grace");
        assert!(!sm.is_logged_in());
        assert!(sm.storage().is_empty());

        let dup = sm.register(
            &gw,
            &Registration {
                name: "Ada again".into(),
                email: "ada@example.com".into(),
                password: "x".into(),
            },
        );
        assert!(matches!(dup, Err(GatewayError::Rejected { status: 409, .. })));
    }
}
