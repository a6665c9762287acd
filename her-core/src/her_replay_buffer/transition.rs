//! A single environment step.
use crate::{base::GoalObs, reward::RewardFn};

/// Transition `(s_t, g, a_t, s_t+1, ag_t+1, r_t)` of a goal-conditioned task.
///
/// `achieved_goal` is the goal achieved after the action. The desired goal is
/// shared by the current and the next input; it is the only field rewritten
/// by relabeling.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition<A> {
    /// State before the action.
    pub state: Vec<f32>,

    /// Goal the agent was conditioned on.
    pub desired_goal: Vec<f32>,

    /// Action.
    pub action: A,

    /// State after the action.
    pub next_state: Vec<f32>,

    /// Goal achieved after the action.
    pub achieved_goal: Vec<f32>,

    /// Reward.
    pub reward: f32,

    /// `1` if the episode terminated at this step.
    pub is_terminated: i8,

    /// `1` if the episode was cut by a time limit at this step.
    pub is_truncated: i8,

    /// Extra features before the action.
    pub extra: Option<Vec<f32>>,

    /// Extra features after the action.
    pub next_extra: Option<Vec<f32>>,
}

impl<A: Clone> Transition<A> {
    /// Creates a transition from the observations before and after an action.
    pub fn new(
        obs: &GoalObs,
        action: A,
        next_obs: &GoalObs,
        reward: f32,
        is_terminated: i8,
        is_truncated: i8,
    ) -> Self {
        Self {
            state: obs.state.clone(),
            desired_goal: obs.desired_goal.clone(),
            action,
            next_state: next_obs.state.clone(),
            achieved_goal: next_obs.achieved_goal.clone(),
            reward,
            is_terminated,
            is_truncated,
            extra: obs.extra.clone(),
            next_extra: next_obs.extra.clone(),
        }
    }

    /// Returns a copy of the transition conditioned on `goal`.
    ///
    /// The reward is recomputed for `(achieved_goal, goal)`. With
    /// `done_on_success`, episodes end when their goal is reached, so the
    /// termination flag is recomputed too: it is raised on success under the new
    /// goal, and a termination of the original that was not a success under the
    /// original goal is carried over. Without it the original flag is kept.
    /// `is_truncated` is never changed.
    pub fn substitute_goal<F: RewardFn>(
        &self,
        goal: &[f32],
        reward_fn: &F,
        done_on_success: bool,
    ) -> Self {
        let mut tr = self.clone();
        tr.reward = reward_fn.reward(&self.achieved_goal, goal);
        if done_on_success {
            let reached = reward_fn.is_success(&self.achieved_goal, goal);
            let other_end = self.is_terminated == 1
                && !reward_fn.is_success(&self.achieved_goal, &self.desired_goal);
            tr.is_terminated = (reached || other_end) as i8;
        }
        tr.desired_goal = goal.to_vec();
        tr
    }

    /// Network input before the action.
    pub fn input(&self) -> Vec<f32> {
        crate::base::concat(&self.state, &self.desired_goal, &self.extra)
    }

    /// Network input after the action.
    pub fn next_input(&self) -> Vec<f32> {
        crate::base::concat(&self.next_state, &self.desired_goal, &self.next_extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{base::DiscreteAct, reward::SparseReward};

    fn transition() -> Transition<DiscreteAct> {
        let obs = GoalObs::new(vec![0.0], vec![0.0], vec![3.0]).extra(vec![9.0]);
        let next_obs = GoalObs::new(vec![1.0], vec![1.0], vec![3.0]).extra(vec![8.0]);
        Transition::new(&obs, DiscreteAct(1), &next_obs, -1.0, 0, 0)
    }

    #[test]
    fn test_inputs() {
        let tr = transition();
        assert_eq!(tr.input(), vec![0.0, 3.0, 9.0]);
        assert_eq!(tr.next_input(), vec![1.0, 3.0, 8.0]);
    }

    #[test]
    fn test_substitute_goal() {
        let tr = transition();
        let reward_fn = SparseReward::new(0.1);

        let tr1 = tr.substitute_goal(&[1.0], &reward_fn, false);
        assert_eq!(tr1.desired_goal, vec![1.0]);
        assert_eq!(tr1.reward, 0.0);
        assert_eq!(tr1.is_terminated, 0);
        assert_eq!(tr1.next_input(), vec![1.0, 1.0, 8.0]);

        let tr2 = tr.substitute_goal(&[1.0], &reward_fn, true);
        assert_eq!(tr2.is_terminated, 1);

        let tr3 = tr.substitute_goal(&[5.0], &reward_fn, true);
        assert_eq!(tr3.reward, -1.0);
        assert_eq!(tr3.is_terminated, 0);

        // Original is untouched.
        assert_eq!(tr.desired_goal, vec![3.0]);
    }

    #[test]
    fn test_substitute_goal_recomputes_termination() {
        let reward_fn = SparseReward::new(0.1);
        let obs = GoalObs::new(vec![0.0], vec![0.0], vec![1.0]);
        let next_obs = GoalObs::new(vec![1.0], vec![1.0], vec![1.0]);

        // Terminated by reaching its goal.
        let tr = Transition::new(&obs, DiscreteAct(1), &next_obs, 0.0, 1, 0);
        let tr1 = tr.substitute_goal(&[4.0], &reward_fn, true);
        assert_eq!(tr1.reward, -1.0);
        assert_eq!(tr1.is_terminated, 0);
        let tr2 = tr.substitute_goal(&[1.0], &reward_fn, true);
        assert_eq!(tr2.is_terminated, 1);

        // Without termination on success the flag is kept.
        let tr3 = tr.substitute_goal(&[4.0], &reward_fn, false);
        assert_eq!(tr3.is_terminated, 1);

        // Terminated for another reason, truncation untouched.
        let next_obs = GoalObs::new(vec![2.0], vec![2.0], vec![1.0]);
        let tr = Transition::new(&obs, DiscreteAct(1), &next_obs, -1.0, 1, 1);
        let tr4 = tr.substitute_goal(&[4.0], &reward_fn, true);
        assert_eq!(tr4.is_terminated, 1);
        assert_eq!(tr4.is_truncated, 1);
    }
}
