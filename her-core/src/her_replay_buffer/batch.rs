//! Minibatch of transitions.

/// A batch of transitions with network inputs already assembled.
///
/// `obs` and `next_obs` are rows of `state ++ desired_goal ++ extra`; the agent
/// scales them with its normalizer before the forward pass.
#[derive(Clone, Debug)]
pub struct GoalTransitionBatch<A> {
    /// Inputs before the action.
    pub obs: Vec<Vec<f32>>,

    /// Actions.
    pub act: Vec<A>,

    /// Inputs after the action.
    pub next_obs: Vec<Vec<f32>>,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Termination flags.
    pub is_terminated: Vec<i8>,

    /// Truncation flags.
    pub is_truncated: Vec<i8>,

    /// Indices of the sampled transitions, used for priority updates.
    pub ix_sample: Option<Vec<usize>>,

    /// Importance sampling weights.
    pub weight: Option<Vec<f32>>,
}

impl<A> GoalTransitionBatch<A> {
    /// Number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }

    /// Unpacks the batch.
    #[allow(clippy::type_complexity)]
    pub fn unpack(
        self,
    ) -> (
        Vec<Vec<f32>>,
        Vec<A>,
        Vec<Vec<f32>>,
        Vec<f32>,
        Vec<i8>,
        Vec<i8>,
        Option<Vec<usize>>,
        Option<Vec<f32>>,
    ) {
        (
            self.obs,
            self.act,
            self.next_obs,
            self.reward,
            self.is_terminated,
            self.is_truncated,
            self.ix_sample,
            self.weight,
        )
    }
}
