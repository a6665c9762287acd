//! Hindsight replay buffer.
mod iw_scheduler;
mod sum_tree;
use super::{
    Episode, GoalStrategy, GoalTransitionBatch, HerReplayBufferConfig, PerConfig, Transition,
};
use crate::{
    base::{Act, ExperienceBufferBase, ReplayBufferBase},
    error::HerError,
    reward::{RewardFn, SparseReward},
};
use anyhow::Result;
pub use iw_scheduler::IwScheduler;
use log::trace;
use rand::{rngs::StdRng, Rng, SeedableRng};
pub use sum_tree::{SumTree, WeightNormalizer};

/// State of prioritized experience replay.
struct PerState {
    sum_tree: SumTree,
    iw_scheduler: IwScheduler,
    rng: fastrand::Rng,
}

impl PerState {
    fn new(capacity: usize, seed: u64, per_config: &PerConfig) -> Self {
        Self {
            sum_tree: SumTree::new(
                capacity,
                per_config.alpha,
                per_config.eps,
                per_config.normalize,
            ),
            iw_scheduler: IwScheduler::new(
                per_config.beta_0,
                per_config.beta_final,
                per_config.n_opts_final,
            ),
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

/// Replay buffer with hindsight goal relabeling.
///
/// The buffer has two stages. Transitions of running and closed episodes are
/// pending: they are not visible to [`ReplayBufferBase::batch`]. Closed episodes
/// are relabeled by [`HerReplayBuffer::modify_episodes`] and moved into a ring of
/// `capacity` transitions by [`HerReplayBuffer::store_episodes`]. Once in the ring,
/// a transition is never modified; the oldest one is overwritten when the ring
/// is full.
///
/// ```rust
/// use her_core::{
///     DiscreteAct, GoalObs, HerReplayBuffer, HerReplayBufferConfig, ReplayBufferBase,
///     SparseReward, Transition,
/// };
///
/// let config = HerReplayBufferConfig::default().capacity(100).sampled_goal_num(4);
/// let mut buffer = HerReplayBuffer::<DiscreteAct>::build(&config, SparseReward::new(0.5)).unwrap();
///
/// for t in 0..5 {
///     let obs = GoalObs::new(vec![t as f32], vec![t as f32], vec![10.0]);
///     let next = GoalObs::new(vec![t as f32 + 1.0], vec![t as f32 + 1.0], vec![10.0]);
///     let tr = Transition::new(&obs, DiscreteAct(0), &next, -1.0, 0, 0);
///     buffer.store_experience(t == 0, tr);
/// }
/// buffer.close_episode();
/// buffer.modify_episodes();
/// buffer.store_episodes().unwrap();
/// assert_eq!(buffer.len(), 25);
/// ```
pub struct HerReplayBuffer<A, F = SparseReward> {
    strategy: GoalStrategy,
    sampled_goal_num: usize,
    done_on_success: bool,
    reward_fn: F,

    /// Episode being recorded.
    current: Option<Episode<A>>,

    /// Closed episodes not yet flattened.
    closed: Vec<Episode<A>>,

    capacity: usize,
    i: usize,
    size: usize,
    ring: Vec<Transition<A>>,
    rng: StdRng,
    per_state: Option<PerState>,
}

impl<A: Act, F: RewardFn> HerReplayBuffer<A, F> {
    /// Builds a buffer with the reward function used for relabeling.
    pub fn build(config: &HerReplayBufferConfig, reward_fn: F) -> Result<Self> {
        if config.capacity == 0 {
            return Err(HerError::InvalidConfig("capacity must be positive".to_string()).into());
        }
        if let Some(per_config) = config.per_config.as_ref() {
            if !(per_config.eps > 0.0) {
                return Err(HerError::InvalidConfig(format!(
                    "priority eps must be positive, got {}",
                    per_config.eps
                ))
                .into());
            }
        }
        let per_state = config
            .per_config
            .as_ref()
            .map(|per_config| PerState::new(config.capacity, config.seed, per_config));

        Ok(Self {
            strategy: config.strategy,
            sampled_goal_num: config.sampled_goal_num,
            done_on_success: config.done_on_success,
            reward_fn,
            current: None,
            closed: vec![],
            capacity: config.capacity,
            i: 0,
            size: 0,
            ring: Vec::with_capacity(config.capacity.min(1 << 16)),
            rng: StdRng::seed_from_u64(config.seed),
            per_state,
        })
    }

    /// Appends a transition to the episode being recorded.
    ///
    /// If `new_episode` is `true`, the episode being recorded is closed first and
    /// the transition starts a new one.
    pub fn store_experience(&mut self, new_episode: bool, tr: Transition<A>) {
        if new_episode {
            self.close_episode();
        }
        self.current.get_or_insert_with(Episode::new).push(tr);
    }

    /// Closes the episode being recorded, making it available for relabeling.
    pub fn close_episode(&mut self) {
        if let Some(episode) = self.current.take() {
            if !episode.is_empty() {
                self.closed.push(episode);
            }
        }
    }

    /// Relabels every closed episode that has not been relabeled yet.
    ///
    /// Each original transition gets `sampled_goal_num` copies whose desired goal
    /// is an achieved goal of the same episode.
    pub fn modify_episodes(&mut self) {
        for episode in self.closed.iter_mut() {
            episode.relabel(
                self.strategy,
                self.sampled_goal_num,
                &self.reward_fn,
                self.done_on_success,
                &mut self.rng,
            );
        }
    }

    /// Flattens the closed episodes into the ring, originals first.
    ///
    /// Returns the number of transitions written.
    pub fn store_episodes(&mut self) -> Result<usize> {
        let mut n = 0;
        for episode in std::mem::take(&mut self.closed) {
            for tr in episode.into_transitions() {
                self.push(tr)?;
                n += 1;
            }
        }
        trace!("Stored {} transitions, buffer size {}", n, self.size);
        Ok(n)
    }

    /// Number of transitions in running and closed episodes, without relabeled copies.
    pub fn n_pending(&self) -> usize {
        self.current.as_ref().map_or(0, |e| e.len())
            + self.closed.iter().map(|e| e.n_transitions()).sum::<usize>()
    }

    /// Capacity of the ring.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reward function used for relabeling.
    pub fn reward_fn(&self) -> &F {
        &self.reward_fn
    }

    /// Returns `true` if `achieved` reaches `desired` under the reward function.
    pub fn is_success(&self, achieved: &[f32], desired: &[f32]) -> bool {
        self.reward_fn.is_success(achieved, desired)
    }

    /// Iterates over stored transitions from the oldest.
    pub fn iter(&self) -> impl Iterator<Item = &Transition<A>> {
        // Slots before `i` were written after the ones from `i` on.
        let (newer, older) = self.ring.split_at(self.i.min(self.ring.len()));
        older.iter().chain(newer.iter())
    }

    fn sample_ixs(&mut self, size: usize) -> (Vec<usize>, Option<Vec<f32>>) {
        match self.per_state.as_mut() {
            Some(per_state) => {
                let beta = per_state.iw_scheduler.beta();
                let (ixs, ws) = per_state.sum_tree.sample(size, beta, &mut per_state.rng);
                (ixs, Some(ws))
            }
            None => {
                let ixs = (0..size)
                    .map(|_| self.rng.gen_range(0..self.size))
                    .collect();
                (ixs, None)
            }
        }
    }
}

impl<A: Act, F: RewardFn> ExperienceBufferBase for HerReplayBuffer<A, F> {
    type Item = Transition<A>;

    fn len(&self) -> usize {
        self.size
    }

    /// Writes a transition into the ring, overwriting the oldest one if full.
    fn push(&mut self, tr: Self::Item) -> Result<()> {
        if self.ring.len() < self.capacity {
            self.ring.push(tr);
        } else {
            self.ring[self.i] = tr;
        }

        if let Some(per_state) = self.per_state.as_mut() {
            let max_p = per_state.sum_tree.max();
            per_state.sum_tree.add(self.i, max_p);
        }

        self.i = (self.i + 1) % self.capacity;
        self.size = (self.size + 1).min(self.capacity);
        Ok(())
    }
}

impl<A: Act, F: RewardFn> ReplayBufferBase for HerReplayBuffer<A, F> {
    type Config = HerReplayBufferConfig;
    type Batch = GoalTransitionBatch<A>;

    fn len(&self) -> usize {
        self.size
    }

    /// Samples a batch of transitions.
    ///
    /// Returns `Ok(None)` if fewer than `size` transitions are stored or `size` is zero.
    fn batch(&mut self, size: usize) -> Result<Option<Self::Batch>> {
        if size == 0 || self.size < size {
            return Ok(None);
        }
        let (ixs, weight) = self.sample_ixs(size);

        let mut batch = GoalTransitionBatch {
            obs: Vec::with_capacity(size),
            act: Vec::with_capacity(size),
            next_obs: Vec::with_capacity(size),
            reward: Vec::with_capacity(size),
            is_terminated: Vec::with_capacity(size),
            is_truncated: Vec::with_capacity(size),
            ix_sample: None,
            weight,
        };
        for &ix in ixs.iter() {
            let tr = &self.ring[ix];
            batch.obs.push(tr.input());
            batch.act.push(tr.action.clone());
            batch.next_obs.push(tr.next_input());
            batch.reward.push(tr.reward);
            batch.is_terminated.push(tr.is_terminated);
            batch.is_truncated.push(tr.is_truncated);
        }
        batch.ix_sample = Some(ixs);

        Ok(Some(batch))
    }

    /// Overwrites the priorities of the given slots with `|td_err|`.
    fn update_priority(&mut self, ixs: &Option<Vec<usize>>, td_errs: &Option<Vec<f32>>) {
        if let (Some(per_state), Some(ixs), Some(td_errs)) =
            (self.per_state.as_mut(), ixs.as_ref(), td_errs.as_ref())
        {
            for (&ix, &td_err) in ixs.iter().zip(td_errs.iter()) {
                if ix < self.size {
                    per_state.sum_tree.update(ix, td_err);
                }
            }
            per_state.iw_scheduler.add_n_opts();
        }
    }
}
