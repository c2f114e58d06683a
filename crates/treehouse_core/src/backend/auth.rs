//! Local single-user authenticator.

use super::{Authenticator, BackendError, BackendResult, User};
use log::info;
use std::sync::Mutex;

const DEFAULT_LOCAL_USER: &str = "local";

/// Authenticator for an offline, single-user session.
///
/// `login` always succeeds with the configured user.
#[derive(Debug)]
pub struct LocalAuthenticator {
    user: User,
    session: Mutex<Option<User>>,
}

impl Default for LocalAuthenticator {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_USER)
    }
}

impl LocalAuthenticator {
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            user: User {
                display_name: username.clone(),
                username,
            },
            session: Mutex::new(None),
        }
    }
}

impl Authenticator for LocalAuthenticator {
    fn login(&self) -> BackendResult<User> {
        if self.user.username.trim().is_empty() {
            return Err(BackendError::Auth("local username is blank".to_string()));
        }
        let mut session = self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *session = Some(self.user.clone());
        info!("event=auth_login module=backend status=ok provider=local");
        Ok(self.user.clone())
    }

    fn logout(&self) -> BackendResult<()> {
        let mut session = self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *session = None;
        info!("event=auth_logout module=backend status=ok provider=local");
        Ok(())
    }

    fn current_user(&self) -> Option<User> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
