//! Trajectory of transitions and its hindsight copies.
use super::{GoalStrategy, Transition};
use crate::reward::RewardFn;
use rand::Rng;

/// Transitions of one trajectory.
///
/// The original transitions are kept apart from their relabeled copies, so
/// relabeling always reads goals actually achieved in this episode.
#[derive(Clone, Debug)]
pub struct Episode<A> {
    transitions: Vec<Transition<A>>,
    relabeled: Vec<Transition<A>>,
    is_relabeled: bool,
}

impl<A: Clone> Default for Episode<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Clone> Episode<A> {
    /// Creates an empty episode.
    pub fn new() -> Self {
        Self {
            transitions: vec![],
            relabeled: vec![],
            is_relabeled: false,
        }
    }

    /// Appends a transition.
    pub fn push(&mut self, tr: Transition<A>) {
        self.transitions.push(tr);
    }

    /// Number of original transitions.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Returns `true` if no transition has been pushed.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Original transitions.
    pub fn transitions(&self) -> &[Transition<A>] {
        &self.transitions
    }

    /// Relabeled copies.
    pub fn relabeled(&self) -> &[Transition<A>] {
        &self.relabeled
    }

    /// Returns `true` after [`Episode::relabel`].
    pub fn is_relabeled(&self) -> bool {
        self.is_relabeled
    }

    /// Number of transitions including relabeled copies.
    pub fn n_transitions(&self) -> usize {
        self.transitions.len() + self.relabeled.len()
    }

    /// Adds `k` relabeled copies of every transition.
    ///
    /// Calling this method again on a relabeled episode does nothing.
    pub fn relabel<F: RewardFn, R: Rng>(
        &mut self,
        strategy: GoalStrategy,
        k: usize,
        reward_fn: &F,
        done_on_success: bool,
        rng: &mut R,
    ) {
        if self.is_relabeled {
            return;
        }
        let n = self.transitions.len();
        let mut relabeled = Vec::with_capacity(n * k);
        for (t, tr) in self.transitions.iter().enumerate() {
            for _ in 0..k {
                let ix = match strategy {
                    GoalStrategy::Future => rng.gen_range(t..n),
                    GoalStrategy::Final => n - 1,
                    GoalStrategy::Episode => rng.gen_range(0..n),
                };
                let goal = &self.transitions[ix].achieved_goal;
                relabeled.push(tr.substitute_goal(goal, reward_fn, done_on_success));
            }
        }
        self.relabeled = relabeled;
        self.is_relabeled = true;
    }

    /// Consumes the episode and returns the originals followed by the relabeled copies.
    pub fn into_transitions(self) -> impl Iterator<Item = Transition<A>> {
        self.transitions.into_iter().chain(self.relabeled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        base::{DiscreteAct, GoalObs},
        reward::SparseReward,
    };
    use rand::{rngs::StdRng, SeedableRng};

    /// Walk along a line from 0 to `len`, goal fixed at 100.
    fn episode(len: usize) -> Episode<DiscreteAct> {
        let mut ep = Episode::new();
        for t in 0..len {
            let obs = GoalObs::new(vec![t as f32], vec![t as f32], vec![100.0]);
            let next = GoalObs::new(vec![t as f32 + 1.0], vec![t as f32 + 1.0], vec![100.0]);
            ep.push(Transition::new(&obs, DiscreteAct(1), &next, -1.0, 0, 0));
        }
        ep
    }

    #[test]
    fn test_future_goals_come_from_later_steps() {
        let mut rng = StdRng::seed_from_u64(0);
        let reward_fn = SparseReward::new(0.5);
        let mut ep = episode(6);
        ep.relabel(GoalStrategy::Future, 4, &reward_fn, false, &mut rng);

        assert_eq!(ep.n_transitions(), 6 * 5);
        for (i, tr) in ep.relabeled().iter().enumerate() {
            let t = i / 4;
            let g = tr.desired_goal[0];
            // Achieved goals of steps t..6 are t+1..=6.
            assert!(g >= t as f32 + 1.0 && g <= 6.0, "t={}, g={}", t, g);
            assert_eq!(tr.reward, reward_fn.reward(&tr.achieved_goal, &tr.desired_goal));
        }
    }

    #[test]
    fn test_final_and_episode_strategies() {
        let mut rng = StdRng::seed_from_u64(1);
        let reward_fn = SparseReward::new(0.5);

        let mut ep = episode(3);
        ep.relabel(GoalStrategy::Final, 2, &reward_fn, false, &mut rng);
        assert!(ep.relabeled().iter().all(|tr| tr.desired_goal == vec![3.0]));

        let mut ep = episode(3);
        ep.relabel(GoalStrategy::Episode, 10, &reward_fn, false, &mut rng);
        assert!(ep
            .relabeled()
            .iter()
            .all(|tr| (1.0..=3.0).contains(&tr.desired_goal[0])));
    }

    #[test]
    fn test_relabel_once() {
        let mut rng = StdRng::seed_from_u64(2);
        let reward_fn = SparseReward::new(0.5);
        let mut ep = episode(2);
        ep.relabel(GoalStrategy::Future, 3, &reward_fn, false, &mut rng);
        ep.relabel(GoalStrategy::Future, 3, &reward_fn, false, &mut rng);
        assert_eq!(ep.relabeled().len(), 6);
        assert_eq!(ep.into_transitions().count(), 8);
    }
}
