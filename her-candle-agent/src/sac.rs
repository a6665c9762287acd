//! Goal-conditioned soft actor-critic (SAC) agent.
//!
//! The critic target is `r + gamma * not_done * (min_i Q_i'(s', a') - alpha * log pi(a'|s'))`
//! with `a' ~ pi(.|s')`, clamped into a configured range. The policy and the entropy
//! coefficient are updated every `actor_update_interval` critic updates.
mod base;
mod config;
mod ent_coef;
pub use base::Sac;
pub use config::SacConfig;
pub use ent_coef::{EntCoef, EntCoefMode};
