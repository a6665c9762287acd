//! Goal-conditioned observation.
use crate::error::HerError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Observation of a goal-conditioned environment.
///
/// The environment reports its own state together with the goal currently
/// achieved and the goal the agent is asked to reach. Grid-world tasks may
/// add a vector of extra features (e.g. an inventory).
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GoalObs {
    /// State of the environment.
    pub state: Vec<f32>,

    /// Goal achieved in the current state.
    pub achieved_goal: Vec<f32>,

    /// Goal to be reached.
    pub desired_goal: Vec<f32>,

    /// Additional features appended to the network input.
    pub extra: Option<Vec<f32>>,
}

impl GoalObs {
    /// Constructs an observation without extra features.
    pub fn new(state: Vec<f32>, achieved_goal: Vec<f32>, desired_goal: Vec<f32>) -> Self {
        Self {
            state,
            achieved_goal,
            desired_goal,
            extra: None,
        }
    }

    /// Sets extra features.
    pub fn extra(mut self, v: Vec<f32>) -> Self {
        self.extra = Some(v);
        self
    }

    /// Builds an observation from a dictionary as returned by gym-style environments.
    ///
    /// The state is read from `observation` or `state`. Extra features are read from
    /// `inventory` or `extra` if present. A missing state or goal key is an error.
    pub fn from_dict(dict: &HashMap<String, Vec<f32>>) -> Result<Self, HerError> {
        let get = |keys: &[&str]| keys.iter().find_map(|k| dict.get(*k)).cloned();
        let state = get(&["observation", "state"])
            .ok_or_else(|| HerError::MissingObsKey("observation".to_string()))?;
        let achieved_goal =
            get(&["achieved_goal"]).ok_or_else(|| HerError::MissingObsKey("achieved_goal".to_string()))?;
        let desired_goal =
            get(&["desired_goal"]).ok_or_else(|| HerError::MissingObsKey("desired_goal".to_string()))?;
        let extra = get(&["inventory", "extra"]);

        Ok(Self {
            state,
            achieved_goal,
            desired_goal,
            extra,
        })
    }

    /// Network input: `state ++ desired_goal ++ extra`.
    pub fn input(&self) -> Vec<f32> {
        concat(&self.state, &self.desired_goal, &self.extra)
    }

    /// Features accumulated by the input normalizer: `state ++ achieved_goal ++ extra`.
    ///
    /// The layout matches [`GoalObs::input`], so the statistics apply to both.
    pub fn history_features(&self) -> Vec<f32> {
        concat(&self.state, &self.achieved_goal, &self.extra)
    }
}

pub(crate) fn concat(state: &[f32], goal: &[f32], extra: &Option<Vec<f32>>) -> Vec<f32> {
    let n_extra = extra.as_ref().map_or(0, |e| e.len());
    let mut v = Vec::with_capacity(state.len() + goal.len() + n_extra);
    v.extend_from_slice(state);
    v.extend_from_slice(goal);
    if let Some(e) = extra {
        v.extend_from_slice(e);
    }
    v
}
