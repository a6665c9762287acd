/// Counters and statistics of a training run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainerState {
    /// Current epoch.
    pub epoch: usize,

    /// Current cycle in the epoch.
    pub cycle: usize,

    /// Number of training episodes run so far.
    pub episodes: usize,

    /// Number of environment steps of training episodes.
    pub env_steps: usize,

    /// Number of learning calls that updated the agent.
    pub opt_steps: usize,

    /// Average return of training episodes per cycle.
    pub cycle_returns: Vec<f32>,

    /// Success rate of training episodes per cycle.
    pub cycle_success_rates: Vec<f32>,

    /// Average return of test passes.
    pub test_returns: Vec<f32>,

    /// Success rate of test passes.
    pub test_success_rates: Vec<f32>,
}
