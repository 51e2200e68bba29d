use super::policy::AccessPolicy;
use super::principal::{ConsentKind, Principal};
use crate::utils::encode_query_value;

/// Where a refused request is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Login,
    Consent(ConsentKind),
    Denied,
}

impl Destination {
    pub fn path(&self) -> &'static str {
        match self {
            Destination::Login => "/login",
            Destination::Consent(ConsentKind::Privacy) => "/privacy",
            Destination::Consent(ConsentKind::Terms) => "/terms",
            Destination::Consent(ConsentKind::Copyright) => "/copyright",
            Destination::Denied => "/denied",
        }
    }

    /// Redirect target. Login and consent pages remember where the user was
    /// heading; the denied page does not.
    pub fn location(&self, next: Option<&str>) -> String {
        match (self, next) {
            (Destination::Denied, _) | (_, None) => self.path().to_string(),
            (_, Some(next)) => format!("{}?next={}", self.path(), encode_query_value(next)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect(Destination),
}

/// Policy evaluator trait for pluggable authorization logic
pub trait PolicyEvaluator: Send + Sync {
    fn evaluate(&self, principal: Option<&Principal>, policy: &AccessPolicy) -> Decision;
}

/// Default policy evaluator
///
/// Evaluation order, first failure wins:
/// 1. authenticated (anonymous requests skip 2-4 and only fail on login-required routes)
/// 2. privacy, terms, copyright consent
/// 3. every permission the policy names
/// 4. allow
#[derive(Debug, Clone, Default)]
pub struct DefaultPolicyEvaluator;

impl DefaultPolicyEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl PolicyEvaluator for DefaultPolicyEvaluator {
    fn evaluate(&self, principal: Option<&Principal>, policy: &AccessPolicy) -> Decision {
        // 1. Anonymous
        let Some(principal) = principal else {
            return if policy.login {
                Decision::Redirect(Destination::Login)
            } else {
                Decision::Allow
            };
        };

        // 2. Consents
        if policy.consent {
            if let Some(missing) = principal.consent.first_missing() {
                tracing::debug!(
                    user_id = %principal.user_id,
                    policy = policy.name,
                    consent = missing.as_str(),
                    "consent missing"
                );
                return Decision::Redirect(Destination::Consent(missing));
            }
        }

        // 3. Permissions
        if let Some(missing) = policy
            .permissions
            .iter()
            .find(|permission| !principal.has_permission(permission))
        {
            tracing::debug!(
                user_id = %principal.user_id,
                policy = policy.name,
                permission = %missing,
                "permission denied"
            );
            return Decision::Redirect(Destination::Denied);
        }

        Decision::Allow
    }
}
