//! Twin Q-network agent for discrete actions.
//!
//! Two online networks are trained toward a shared target computed from the
//! minimum of the greedy values of two target networks, reducing the
//! overestimation of a single maximizing network.
mod base;
mod config;
pub use base::Td3;
pub use config::Td3Config;
