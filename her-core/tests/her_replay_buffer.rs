use anyhow::Result;
use her_core::{
    DiscreteAct, GoalObs, GoalStrategy, HerReplayBuffer, HerReplayBufferConfig, PerConfig,
    ReplayBufferBase, RewardFn, SparseReward, Transition,
};

type Buffer = HerReplayBuffer<DiscreteAct>;

/// Stores an episode moving from `start` by +1 per step; the desired goal is
/// the final achieved goal, so the last step is a success.
fn store_episode(buffer: &mut Buffer, start: f32, len: usize) {
    let goal = start + len as f32;
    let reward_fn = buffer.reward_fn().clone();
    for t in 0..len {
        let p = start + t as f32;
        let obs = GoalObs::new(vec![p], vec![p], vec![goal]);
        let next = GoalObs::new(vec![p + 1.0], vec![p + 1.0], vec![goal]);
        let reward = reward_fn.reward(&next.achieved_goal, &next.desired_goal);
        let is_terminated = (t == len - 1) as i8;
        let tr = Transition::new(&obs, DiscreteAct(1), &next, reward, is_terminated, 0);
        buffer.store_experience(t == 0, tr);
    }
    buffer.close_episode();
}

#[test]
fn test_relabel_and_store_one_episode() -> Result<()> {
    let config = HerReplayBufferConfig::default()
        .capacity(100)
        .sampled_goal_num(4)
        .strategy(GoalStrategy::Future);
    let reward_fn = SparseReward::new(0.5);
    let mut buffer = Buffer::build(&config, reward_fn.clone())?;

    store_episode(&mut buffer, 0.0, 5);
    buffer.modify_episodes();
    assert_eq!(buffer.store_episodes()?, 25);
    assert_eq!(buffer.len(), 25);
    assert_eq!(buffer.n_pending(), 0);

    let n_zero = buffer.iter().filter(|tr| tr.reward == 0.0).count();
    assert!(n_zero >= 5, "n_zero = {}", n_zero);

    for tr in buffer.iter() {
        assert_eq!(tr.reward, reward_fn.reward(&tr.achieved_goal, &tr.desired_goal));
    }

    // Originals come first, oldest first.
    let states = buffer.iter().take(5).map(|tr| tr.state[0]).collect::<Vec<_>>();
    assert_eq!(states, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    Ok(())
}

#[test]
fn test_relabel_goals_stay_in_episode() -> Result<()> {
    let config = HerReplayBufferConfig::default()
        .capacity(1000)
        .strategy(GoalStrategy::Episode);
    let mut buffer = Buffer::build(&config, SparseReward::new(0.5))?;

    store_episode(&mut buffer, 0.0, 6);
    store_episode(&mut buffer, 100.0, 6);
    buffer.modify_episodes();
    buffer.store_episodes()?;
    assert_eq!(buffer.len(), 2 * 6 * 5);

    for tr in buffer.iter() {
        let (lo, hi) = if tr.state[0] < 50.0 {
            (1.0, 6.0)
        } else {
            (101.0, 106.0)
        };
        assert!(
            tr.desired_goal[0] >= lo && tr.desired_goal[0] <= hi,
            "state {:?}, goal {:?}",
            tr.state,
            tr.desired_goal
        );
    }
    Ok(())
}

#[test]
fn test_without_hindsight_stores_originals() -> Result<()> {
    let config = HerReplayBufferConfig::default().capacity(100);
    let mut buffer = Buffer::build(&config, SparseReward::new(0.5))?;
    store_episode(&mut buffer, 0.0, 5);
    buffer.store_episodes()?;
    assert_eq!(buffer.len(), 5);

    // Episodes already stored are not relabeled afterwards.
    buffer.modify_episodes();
    assert_eq!(buffer.store_episodes()?, 0);
    assert_eq!(buffer.len(), 5);
    Ok(())
}

#[test]
fn test_capacity_bound_over_episodes() -> Result<()> {
    let capacity = 32;
    let config = HerReplayBufferConfig::default()
        .capacity(capacity)
        .per_config(Some(PerConfig::default()));
    let mut buffer = Buffer::build(&config, SparseReward::new(0.5))?;

    for i in 0..10 {
        store_episode(&mut buffer, 10.0 * i as f32, 3);
        buffer.modify_episodes();
        buffer.store_episodes()?;
        assert!(buffer.len() <= capacity);
    }
    assert_eq!(buffer.len(), capacity);

    // The oldest transitions are those of later episodes only.
    assert!(buffer.iter().all(|tr| tr.state[0] >= 70.0));

    let batch = buffer.batch(16)?.unwrap();
    assert_eq!(batch.len(), 16);
    assert_eq!(batch.weight.as_ref().map(|w| w.len()), Some(16));
    buffer.update_priority(&batch.ix_sample, &Some(vec![0.5; 16]));
    Ok(())
}

#[test]
fn test_relabeled_termination_follows_new_goal() -> Result<()> {
    let config = HerReplayBufferConfig::default()
        .capacity(100)
        .sampled_goal_num(4)
        .strategy(GoalStrategy::Future);
    let reward_fn = SparseReward::new(0.5);
    let mut buffer = Buffer::build(&config, reward_fn.clone())?;

    // The last of three steps reaches the goal and ends the episode.
    store_episode(&mut buffer, 0.0, 3);
    buffer.modify_episodes();
    buffer.store_episodes()?;
    assert_eq!(buffer.len(), 15);

    for tr in buffer.iter() {
        let success = reward_fn.is_success(&tr.achieved_goal, &tr.desired_goal);
        assert_eq!(tr.is_terminated, success as i8, "{:?}", tr);
        assert_eq!(tr.is_truncated, 0);
    }
    assert!(buffer.iter().skip(3).any(|tr| tr.is_terminated == 1));

    // Without termination on success, copies keep the original flag.
    let mut buffer = Buffer::build(&config.clone().done_on_success(false), reward_fn)?;
    store_episode(&mut buffer, 0.0, 3);
    buffer.modify_episodes();
    buffer.store_episodes()?;
    let flags = buffer.iter().skip(3).map(|tr| tr.is_terminated).collect::<Vec<_>>();
    assert_eq!(flags, [vec![0; 8], vec![1; 4]].concat());
    Ok(())
}
