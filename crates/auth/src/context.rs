//! Authorization context for authenticated callers

use serde::Serialize;
use uuid::Uuid;

/// Application role supplied by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Participant,
    Operator,
}

impl Role {
    /// Parse a role claim; unknown or missing roles are participants
    pub fn from_claim(claim: Option<&str>) -> Self {
        match claim.map(str::to_ascii_lowercase).as_deref() {
            Some("operator") | Some("admin") => Role::Operator,
            _ => Role::Participant,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Participant => write!(f, "participant"),
            Role::Operator => write!(f, "operator"),
        }
    }
}

/// Verified identity of the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    pub email: Option<String>,
}

impl AuthContext {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            role,
            email: None,
        }
    }

    /// Check if caller is an operator
    pub fn is_operator(&self) -> bool {
        self.role == Role::Operator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_claim() {
        assert_eq!(Role::from_claim(Some("operator")), Role::Operator);
        assert_eq!(Role::from_claim(Some("OPERATOR")), Role::Operator);
        assert_eq!(Role::from_claim(Some("admin")), Role::Operator);
        assert_eq!(Role::from_claim(Some("participant")), Role::Participant);
        assert_eq!(Role::from_claim(Some("authenticated")), Role::Participant);
        assert_eq!(Role::from_claim(None), Role::Participant);
    }

    #[test]
    fn test_is_operator() {
        let id = Uuid::new_v4();
        assert!(AuthContext::new(id, Role::Operator).is_operator());
        assert!(!AuthContext::new(id, Role::Participant).is_operator());
    }
}
