//! Action types shared by environments and agents.
use super::Act;
use serde::{Deserialize, Serialize};

/// Index of an action in a finite action set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiscreteAct(pub i64);

impl Act for DiscreteAct {
    fn len(&self) -> usize {
        1
    }
}

impl From<i64> for DiscreteAct {
    fn from(a: i64) -> Self {
        Self(a)
    }
}

/// Real-valued action vector.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ContinuousAct(pub Vec<f32>);

impl Act for ContinuousAct {
    fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<f32>> for ContinuousAct {
    fn from(a: Vec<f32>) -> Self {
        Self(a)
    }
}
