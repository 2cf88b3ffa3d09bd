pub mod gate;
pub mod validator;

#[cfg(test)]
pub(crate) mod testkeys;

pub use gate::{ConnectionGate, Decision, DecisionContext, Effect, OpenRequest};
pub use validator::{Identity, Rejection, TokenValidator, ValidatorConfig};
