//! Bit flipping with hindsight experience replay.
//!
//! The state is a vector of `n` bits and the goal is another such vector. An
//! action flips one bit. The reward is `-1` until the state equals the goal,
//! which is rarely reached by random exploration when `n` is large.
use anyhow::Result;
use clap::{Parser, ValueEnum};
use her_candle_agent::{
    dqn::{Dqn, DqnConfig, DqnModelConfig, EpsilonGreedy},
    mlp::{Mlp, MlpConfig},
    opt::OptimizerConfig,
    td3::{Td3, Td3Config},
    util::CriticLoss,
};
use her_core::{
    record::BufferedRecorder, Agent, DefaultEvaluator, DiscreteAct, Env, GoalObs, HerReplayBuffer,
    HerReplayBufferConfig, NormalizerConfig, RewardFn, SparseReward, Step, Trainer,
    TrainerConfig, TrainerState,
};
use log::info;

const LR: f64 = 0.001;
const WEIGHT_DECAY: f64 = 1e-4;
const DISCOUNT_FACTOR: f64 = 0.98;
const BATCH_SIZE: usize = 128;
const N_UPDATES_PER_OPT: usize = 40;
const TAU: f64 = 0.05;
const REPLAY_BUFFER_CAPACITY: usize = 1_000_000;
const MODEL_DIR: &str = "./her-candle-agent/examples/model/her_bit_flip";

mod env {
    use super::*;

    /// Flips one of `n_bits` bits per step until the state matches the goal.
    pub struct BitFlipEnv {
        n_bits: usize,
        state: Vec<f32>,
        goal: Vec<f32>,
        reward_fn: SparseReward,
        rng: fastrand::Rng,
    }

    impl BitFlipEnv {
        fn random_bits(&self) -> Vec<f32> {
            (0..self.n_bits)
                .map(|_| self.rng.bool() as i32 as f32)
                .collect()
        }

        fn obs(&self) -> GoalObs {
            GoalObs::new(self.state.clone(), self.state.clone(), self.goal.clone())
        }

        fn reset_(&mut self) -> GoalObs {
            self.state = self.random_bits();
            self.goal = self.random_bits();
            while self.goal == self.state {
                self.goal = self.random_bits();
            }
            self.obs()
        }
    }

    impl Env for BitFlipEnv {
        type Config = usize;
        type Act = DiscreteAct;
        type Info = ();

        fn build(n_bits: &usize, seed: i64) -> Result<Self> {
            Ok(Self {
                n_bits: *n_bits,
                state: vec![0.0; *n_bits],
                goal: vec![0.0; *n_bits],
                reward_fn: reward_fn(),
                rng: fastrand::Rng::with_seed(seed as u64),
            })
        }

        fn reset(&mut self) -> Result<GoalObs> {
            Ok(self.reset_())
        }

        fn reset_with_index(&mut self, ix: usize) -> Result<GoalObs> {
            self.rng.seed(ix as u64);
            Ok(self.reset_())
        }

        fn step(&mut self, a: &DiscreteAct) -> Result<Step<Self>> {
            let ix = a.0 as usize % self.n_bits;
            self.state[ix] = 1.0 - self.state[ix];
            let reward = self.reward_fn.reward(&self.state, &self.goal);
            let success = self.reward_fn.is_success(&self.state, &self.goal);
            Ok(Step::new(self.obs(), *a, reward, success as i8, 0, ()))
        }
    }

    /// Bit vectors differ by a distance of at least one.
    pub fn reward_fn() -> SparseReward {
        SparseReward::new(0.5)
    }
}

use env::{reward_fn, BitFlipEnv};

type Buffer = HerReplayBuffer<DiscreteAct, SparseReward>;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Algo {
    Dqn,
    Td3,
}

/// Train/eval an agent in the bit flipping environment
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Agent
    #[arg(short, long, value_enum, default_value_t = Algo::Dqn)]
    algo: Algo,

    /// Number of bits
    #[arg(short, long, default_value_t = 15)]
    n_bits: usize,

    /// Number of epochs
    #[arg(long, default_value_t = 30)]
    epochs: usize,

    /// Disable hindsight relabeling
    #[arg(long, default_value_t = false)]
    no_her: bool,

    /// Evaluate the parameters saved at this epoch instead of training
    #[arg(short, long)]
    eval: Option<usize>,

    /// Directory of saved parameters
    #[arg(short, long, default_value_t = MODEL_DIR.to_string())]
    model_dir: String,
}

fn model_config(n_bits: usize) -> DqnModelConfig<MlpConfig> {
    DqnModelConfig::default()
        .q_config(MlpConfig::new(2 * n_bits, vec![256], n_bits, false))
        .opt_config(OptimizerConfig::default().learning_rate(LR))
}

/// Targets are bounded by the returns of rewards in `[-1, 0]`.
fn clip_target() -> Option<(f64, f64)> {
    Some((-1.0 / (1.0 - DISCOUNT_FACTOR), 0.0))
}

fn dqn_config(n_bits: usize) -> DqnConfig<Mlp> {
    DqnConfig::default()
        .model_config(model_config(n_bits))
        .n_updates_per_opt(N_UPDATES_PER_OPT)
        .batch_size(BATCH_SIZE)
        .discount_factor(DISCOUNT_FACTOR)
        .tau(TAU)
        .double_dqn(true)
        .clip_target(clip_target())
        .critic_loss(CriticLoss::Mse)
        .explorer(EpsilonGreedy::new(1.0, 0.05, 200.0))
        .normalizer_config(NormalizerConfig::mean_std(2 * n_bits))
}

fn td3_config(n_bits: usize) -> Td3Config<Mlp> {
    let opt_config = OptimizerConfig::adam_w(LR, WEIGHT_DECAY);
    Td3Config::default()
        .model_config(model_config(n_bits).opt_config(opt_config))
        .n_updates_per_opt(N_UPDATES_PER_OPT)
        .batch_size(BATCH_SIZE)
        .discount_factor(DISCOUNT_FACTOR)
        .tau(TAU)
        .clip_target(clip_target())
        .critic_loss(CriticLoss::Mse)
        .explorer(EpsilonGreedy::new(1.0, 0.05, 200.0))
        .normalizer_config(NormalizerConfig::mean_std(2 * n_bits))
}

fn trainer_config(args: &Args) -> TrainerConfig {
    TrainerConfig::default()
        .epochs(args.epochs)
        .cycles(50)
        .episodes(16)
        .test_interval(1)
        .test_episodes(20)
        .save_interval(args.epochs.max(1))
        .max_episode_steps(Some(args.n_bits))
        .hindsight(!args.no_her)
        .model_dir(args.model_dir.clone())
}

fn train<A>(args: &Args, config: TrainerConfig, agent: &mut A) -> Result<TrainerState>
where
    A: Agent<BitFlipEnv, Buffer>,
{
    let mut env = BitFlipEnv::build(&args.n_bits, 0)?;
    let mut buffer = Buffer::build(
        &HerReplayBufferConfig::default().capacity(REPLAY_BUFFER_CAPACITY),
        reward_fn(),
    )?;
    let mut recorder = BufferedRecorder::new();
    let mut evaluator = DefaultEvaluator::<BitFlipEnv, _>::new(
        &args.n_bits,
        1,
        config.test_episodes,
        reward_fn(),
    )?
    .max_steps(Some(args.n_bits));

    let mut trainer = Trainer::<BitFlipEnv, SparseReward>::build(config);
    let state = trainer.train(&mut env, agent, &mut buffer, &mut recorder, &mut evaluator)?;
    info!("Test success rates {:?}", state.test_success_rates);
    Ok(state)
}

fn eval<A>(args: &Args, config: TrainerConfig, agent: &mut A, epoch: usize) -> Result<f32>
where
    A: Agent<BitFlipEnv, Buffer>,
{
    let mut evaluator = DefaultEvaluator::<BitFlipEnv, _>::new(
        &args.n_bits,
        1,
        config.test_episodes,
        reward_fn(),
    )?
    .max_steps(Some(args.n_bits));
    let trainer = Trainer::<BitFlipEnv, SparseReward>::build(config);
    let record = trainer.evaluate(agent, &mut evaluator, Some(epoch))?;
    let success_rate = record.get_scalar("success_rate")?;
    info!("Success rate {:.2}", success_rate);
    Ok(success_rate)
}

fn run<A>(args: &Args, config: TrainerConfig, agent: &mut A) -> Result<()>
where
    A: Agent<BitFlipEnv, Buffer>,
{
    match args.eval {
        Some(epoch) => {
            eval(args, config, agent, epoch)?;
        }
        None => {
            train(args, config, agent)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = trainer_config(&args);

    match args.algo {
        Algo::Dqn => {
            let mut agent = Dqn::<BitFlipEnv, Mlp, Buffer>::build(dqn_config(args.n_bits))?;
            run(&args, config, &mut agent)
        }
        Algo::Td3 => {
            let mut agent = Td3::<BitFlipEnv, Mlp, Buffer>::build(td3_config(args.n_bits))?;
            run(&args, config, &mut agent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use her_core::util::ckpt_path;
    use tempdir::TempDir;

    fn args(algo: Algo, model_dir: &str) -> Args {
        Args {
            algo,
            n_bits: 4,
            epochs: 2,
            no_her: false,
            eval: None,
            model_dir: model_dir.to_string(),
        }
    }

    fn small_config(args: &Args) -> TrainerConfig {
        trainer_config(args).cycles(2).episodes(4).test_episodes(3)
    }

    #[test]
    fn test_her_bit_flip_dqn() -> Result<()> {
        let tmp_dir = TempDir::new("her_bit_flip_dqn")?;
        let model_dir = match tmp_dir.as_ref().to_str() {
            Some(s) => s,
            None => panic!("Failed to get string of temporary directory"),
        };
        let args = args(Algo::Dqn, model_dir);
        let config = small_config(&args);
        let agent_config = dqn_config(args.n_bits).batch_size(16).n_updates_per_opt(2);

        let mut agent = Dqn::<BitFlipEnv, Mlp, Buffer>::build(agent_config.clone())?;
        let state = train(&args, config.clone(), &mut agent)?;
        assert_eq!(state.episodes, 16);
        assert_eq!(state.test_success_rates.len(), 2);
        assert!(state.opt_steps > 0);
        assert!(ckpt_path(model_dir, "qnet", 2).is_file());

        let mut agent = Dqn::<BitFlipEnv, Mlp, Buffer>::build(agent_config)?;
        let success_rate = eval(&args, config, &mut agent, 2)?;
        assert!((0.0..=1.0).contains(&success_rate));
        Ok(())
    }

    #[test]
    fn test_her_bit_flip_td3() -> Result<()> {
        let tmp_dir = TempDir::new("her_bit_flip_td3")?;
        let model_dir = match tmp_dir.as_ref().to_str() {
            Some(s) => s,
            None => panic!("Failed to get string of temporary directory"),
        };
        let args = args(Algo::Td3, model_dir);
        let config = small_config(&args);
        let agent_config = td3_config(args.n_bits).batch_size(16).n_updates_per_opt(2);

        let mut agent = Td3::<BitFlipEnv, Mlp, Buffer>::build(agent_config)?;
        let state = train(&args, config, &mut agent)?;
        assert_eq!(state.cycle_returns.len(), 4);
        assert!(ckpt_path(model_dir, "qnet2_tgt", 2).is_file());
        Ok(())
    }
}
