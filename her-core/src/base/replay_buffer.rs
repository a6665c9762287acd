//! Replay buffer interface.
use anyhow::Result;

/// Interface for buffers that store experiences from environments.
pub trait ExperienceBufferBase {
    /// The type of items stored in the buffer.
    type Item;

    /// Pushes a new experience into the buffer.
    fn push(&mut self, tr: Self::Item) -> Result<()>;

    /// Returns the current number of experiences in the buffer.
    fn len(&self) -> usize;
}

/// Interface for replay buffers that generate batches for training.
pub trait ReplayBufferBase {
    /// Configuration parameters for the replay buffer.
    type Config: Clone;

    /// The type of batch generated for training.
    type Batch;

    /// Returns the number of transitions available for sampling.
    fn len(&self) -> usize;

    /// Constructs a batch of experiences for training.
    ///
    /// Returns `Ok(None)` when the buffer holds fewer than `size` transitions.
    /// This is the "not ready" status, not a failure.
    fn batch(&mut self, size: usize) -> Result<Option<Self::Batch>>;

    /// Updates the priorities of experiences in the buffer.
    ///
    /// `ixs` are indices returned with the batch and `td_err` the corresponding
    /// absolute TD errors. Buffers without prioritization ignore the call.
    fn update_priority(&mut self, ixs: &Option<Vec<usize>>, td_err: &Option<Vec<f32>>);
}
