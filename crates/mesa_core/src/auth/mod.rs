use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Authenticated caller as handed to the engine. Credential refresh/expiry is managed upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user: String,
    pub role: String,
}

impl Session {
    pub fn new(user: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            role: role.into(),
        }
    }
}

/// Mutation capability check: the caller must hold one of a fixed set of privileged roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    privileged: BTreeSet<String>,
}

impl AccessPolicy {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            privileged: roles
                .into_iter()
                .map(|r| r.as_ref().trim().to_lowercase())
                .filter(|r| !r.is_empty())
                .collect(),
        }
    }

    pub fn can_mutate(&self, session: &Session) -> bool {
        self.privileged
            .contains(&session.role.trim().to_lowercase())
    }

    /// `action` names the attempted operation for the denial message.
    pub fn require_mutation(&self, session: &Session, action: &str) -> Result<(), AppError> {
        if self.can_mutate(session) {
            return Ok(());
        }
        Err(AppError::authorization(
            "AUTH_DENIED",
            format!("Your role is not allowed to {action} reports"),
        )
        .with_details(format!("user={}; role={}", session.user, session.role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn roles_compare_case_insensitively() {
        let policy = AccessPolicy::new(["admin", " Soporte "]);
        assert!(policy.can_mutate(&Session::new("ana", "ADMIN")));
        assert!(policy.can_mutate(&Session::new("luis", "soporte")));
        let err = policy
            .require_mutation(&Session::new("eva", "funcionario"), "delete")
            .expect_err("denied");
        assert_eq!(err.kind, ErrorKind::Authorization);
        assert!(!err.retryable);
    }
}
