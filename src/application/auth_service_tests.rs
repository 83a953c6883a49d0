#[cfg(test)]
mod tests {
    use super::super::auth_service::{AuthService, AuthServiceImpl};
    use super::super::error::AppError;
    use crate::domain::{
        repository::{SessionRepository, UserRepository},
        session::{Session, SessionId},
        user::{NewUser, User, UserId},
    };
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct InMemoryUsers {
        users: Arc<Mutex<Vec<User>>>,
        /// Lookups miss, as when another request registers the same email
        /// between the check and the insert.
        stale_lookups: bool,
    }

    #[async_trait]
    impl UserRepository for InMemoryUsers {
        async fn create(&self, input: NewUser) -> Result<Option<User>> {
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.email == input.email) {
                return Ok(None);
            }
            let user = User {
                id: UserId(users.len() as i64 + 1),
                name: input.name,
                email: input.email,
                password_hash: input.password_hash,
                created_at: Utc::now(),
            };
            users.push(user.clone());
            Ok(Some(user))
        }
        async fn get(&self, id: UserId) -> Result<Option<User>> {
            Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
        }
        async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
            if self.stale_lookups {
                return Ok(None);
            }
            Ok(self.users.lock().unwrap().iter().find(|u| u.email == email).cloned())
        }
    }

    #[derive(Clone, Default)]
    struct InMemorySessions {
        sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
    }

    #[async_trait]
    impl SessionRepository for InMemorySessions {
        async fn insert(&self, session: &Session) -> Result<()> {
            self.sessions.lock().unwrap().insert(session.id, session.clone());
            Ok(())
        }
        async fn get(&self, id: SessionId) -> Result<Option<Session>> {
            Ok(self.sessions.lock().unwrap().get(&id).cloned())
        }
        async fn save(&self, session: &Session) -> Result<()> {
            self.sessions.lock().unwrap().insert(session.id, session.clone());
            Ok(())
        }
        async fn delete(&self, id: SessionId) -> Result<bool> {
            Ok(self.sessions.lock().unwrap().remove(&id).is_some())
        }
        async fn purge_idle_since(&self, cutoff: DateTime<Utc>) -> Result<u64> {
            let mut map = self.sessions.lock().unwrap();
            let before = map.len();
            map.retain(|_, s| s.last_seen_at >= cutoff);
            Ok((before - map.len()) as u64)
        }
    }

    fn service() -> (AuthServiceImpl<InMemoryUsers, InMemorySessions>, InMemorySessions) {
        let sessions = InMemorySessions::default();
        (AuthServiceImpl::new(InMemoryUsers::default(), sessions.clone(), Duration::minutes(120)), sessions)
    }

    fn alice() -> serde_json::Value {
        json!({"name": "Alice", "email": "alice@example.com", "password": "wonderland"})
    }

    #[tokio::test]
    async fn handshake_opens_then_reuses_the_token() {
        let (auth, _) = service();
        let first = auth.handshake(None).await.unwrap();
        assert_eq!(first.user_id, None);

        let again = auth.handshake(Some(first.id)).await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.csrf_token, first.csrf_token);
        assert!(auth.verify_csrf(Some(first.id), Some(&first.csrf_token)).await.is_ok());

        let unknown = auth.handshake(Some(SessionId::generate())).await.unwrap();
        assert_ne!(unknown.id, first.id);
    }

    #[tokio::test]
    async fn csrf_requires_matching_token() {
        let (auth, _) = service();
        let session = auth.handshake(None).await.unwrap();
        assert!(auth.verify_csrf(Some(session.id), Some(&session.csrf_token)).await.is_ok());
        assert!(matches!(auth.verify_csrf(Some(session.id), Some("forged")).await, Err(AppError::TokenMismatch)));
        assert!(matches!(auth.verify_csrf(Some(session.id), None).await, Err(AppError::TokenMismatch)));
        assert!(matches!(auth.verify_csrf(None, Some(&session.csrf_token)).await, Err(AppError::TokenMismatch)));
    }

    #[tokio::test]
    async fn register_logs_in_with_a_new_session() {
        let (auth, sessions) = service();
        let anonymous = auth.handshake(None).await.unwrap();
        assert!(matches!(auth.require_user(Some(anonymous.id)).await, Err(AppError::Unauthenticated)));

        let (user, session) = auth.register(Some(anonymous.id), &alice()).await.unwrap();
        assert_ne!(session.id, anonymous.id);
        assert!(sessions.get(anonymous.id).await.unwrap().is_none());
        assert_eq!(auth.require_user(Some(session.id)).await.unwrap(), user.id);
        assert_eq!(auth.current_user(Some(session.id)).await.unwrap().email, "alice@example.com");
    }

    #[tokio::test]
    async fn duplicate_email_and_bad_password_are_validation_errors() {
        let (auth, _) = service();
        auth.register(None, &alice()).await.unwrap();

        let err = auth.register(None, &alice()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.get("email").is_some()));

        let err = auth.login(None, &json!({"email": "alice@example.com", "password": "wrong-pass"})).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let (user, _) = auth.login(None, &json!({"email": " ALICE@example.com ", "password": "wonderland"})).await.unwrap();
        assert_eq!(user.name, "Alice");
    }

    #[tokio::test]
    async fn email_claimed_between_check_and_insert_is_taken() {
        let users = InMemoryUsers { stale_lookups: true, ..InMemoryUsers::default() };
        let auth = AuthServiceImpl::new(users, InMemorySessions::default(), Duration::minutes(120));
        auth.register(None, &alice()).await.unwrap();

        match auth.register(None, &alice()).await.unwrap_err() {
            AppError::Validation(errors) => {
                assert_eq!(errors.get("email").unwrap(), ["The email has already been taken."]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn anonymous_handshake_sweeps_expired_sessions() {
        let sessions = InMemorySessions::default();
        let auth = AuthServiceImpl::new(InMemoryUsers::default(), sessions.clone(), Duration::minutes(120))
            .with_sweep_odds(1, 1);
        let mut idle = Session::anonymous(Utc::now());
        idle.last_seen_at = Utc::now() - Duration::days(1);
        sessions.insert(&idle).await.unwrap();

        let fresh = auth.handshake(None).await.unwrap();
        assert!(sessions.get(idle.id).await.unwrap().is_none());
        assert!(sessions.get(fresh.id).await.unwrap().is_some());

        let never = AuthServiceImpl::new(InMemoryUsers::default(), sessions.clone(), Duration::minutes(120))
            .with_sweep_odds(0, 1);
        sessions.insert(&idle).await.unwrap();
        never.handshake(None).await.unwrap();
        assert!(sessions.get(idle.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_sessions_are_absent() {
        let (auth, sessions) = service();
        let (_, session) = auth.register(None, &alice()).await.unwrap();

        let mut stale = session.clone();
        stale.last_seen_at = Utc::now() - Duration::minutes(121);
        sessions.save(&stale).await.unwrap();

        assert!(matches!(auth.require_user(Some(session.id)).await, Err(AppError::Unauthenticated)));
        assert!(sessions.get(session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn logout_and_purge_drop_sessions() {
        let (auth, sessions) = service();
        let (_, session) = auth.register(None, &alice()).await.unwrap();
        auth.logout(Some(session.id)).await.unwrap();
        assert!(matches!(auth.require_user(Some(session.id)).await, Err(AppError::Unauthenticated)));

        let mut idle = Session::anonymous(Utc::now() - Duration::days(1));
        idle.last_seen_at = Utc::now() - Duration::days(1);
        sessions.insert(&idle).await.unwrap();
        assert_eq!(auth.purge_expired().await.unwrap(), 1);
    }
}
