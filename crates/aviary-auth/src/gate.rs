use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::validator::{Rejection, TokenValidator};

/// A channel-open attempt as seen by the gate: the query parameters of the
/// upgrade request. The bearer token travels as the `token` parameter.
#[derive(Debug, Clone, Default)]
pub struct OpenRequest {
    pub query: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Identity context handed to the transport layer alongside the decision.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DecisionContext {
    Granted {
        subject: String,
        email: String,
        decided_at: String,
    },
    Refused {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub effect: Effect,
    pub principal: String,
    pub context: DecisionContext,
}

/// Decides whether a channel-open request is admitted.
///
/// Every open attempt is evaluated independently; decisions are never
/// cached. Enforcement is the caller's job — the gate only decides.
#[derive(Clone)]
pub struct ConnectionGate {
    validator: TokenValidator,
}

impl ConnectionGate {
    pub fn new(validator: TokenValidator) -> Self {
        Self { validator }
    }

    /// Any failure, including a missing token, becomes a Deny decision;
    /// nothing escapes the gate boundary.
    pub async fn authorize(&self, req: &OpenRequest) -> Decision {
        let outcome = match req.query.get("token") {
            Some(token) => self.validator.validate(token).await,
            None => Err(Rejection::MissingToken),
        };

        match outcome {
            Ok(identity) => {
                info!("channel open allowed for {}", identity.subject);
                Decision {
                    effect: Effect::Allow,
                    principal: identity.subject.clone(),
                    context: DecisionContext::Granted {
                        subject: identity.subject,
                        email: identity.email.unwrap_or_default(),
                        decided_at: Utc::now().to_rfc3339(),
                    },
                }
            }
            Err(rejection) => {
                warn!("channel open denied: {}", rejection);
                Decision {
                    effect: Effect::Deny,
                    principal: "unauthorized".to_string(),
                    context: DecisionContext::Refused {
                        error: rejection.to_string(),
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkeys;

    fn request_with_token(token: &str) -> OpenRequest {
        let mut query = HashMap::new();
        query.insert("token".to_string(), token.to_string());
        OpenRequest { query }
    }

    #[tokio::test]
    async fn valid_token_allows_with_subject_as_principal() {
        let gate = ConnectionGate::new(testkeys::validator());
        let token = testkeys::token(testkeys::claims("user-7", testkeys::future_exp()));

        let decision = gate.authorize(&request_with_token(&token)).await;
        assert_eq!(decision.effect, Effect::Allow);
        assert_eq!(decision.principal, "user-7");
        match decision.context {
            DecisionContext::Granted { subject, email, decided_at } => {
                assert_eq!(subject, "user-7");
                assert_eq!(email, "user-7@example.com");
                assert!(!decided_at.is_empty());
            }
            DecisionContext::Refused { .. } => panic!("expected granted context"),
        }
    }

    #[tokio::test]
    async fn missing_token_denies() {
        let gate = ConnectionGate::new(testkeys::validator());

        let decision = gate.authorize(&OpenRequest::default()).await;
        assert_eq!(decision.effect, Effect::Deny);
        assert_eq!(decision.principal, "unauthorized");
        match decision.context {
            DecisionContext::Refused { error } => assert!(error.contains("missing")),
            DecisionContext::Granted { .. } => panic!("expected refused context"),
        }
    }

    #[tokio::test]
    async fn expired_token_denies() {
        let gate = ConnectionGate::new(testkeys::validator());
        let token = testkeys::token(testkeys::claims("user-7", testkeys::past_exp()));

        let decision = gate.authorize(&request_with_token(&token)).await;
        assert_eq!(decision.effect, Effect::Deny);
    }

    #[tokio::test]
    async fn tampered_token_denies() {
        let gate = ConnectionGate::new(testkeys::validator());
        let token = testkeys::token(testkeys::claims("user-7", testkeys::future_exp()));
        let tampered = format!("{}AAAA", &token[..token.len() - 4]);

        let decision = gate.authorize(&request_with_token(&tampered)).await;
        assert_eq!(decision.effect, Effect::Deny);
    }
}
