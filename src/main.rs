//! ani-train: cross-validation driven training of an ANI-1 style potential.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::info;

use ani_train::config::{expand_tilde, save_dir, TrainPaths};
use ani_train::{
    AniTrainer, ClipPolicy, DataLoader, DeviceSet, EvalSet, LoopConfig, ModelSpec, OptimizerKind,
    TrainerConfig, TrainingData, TrainingLoop,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OptimizerArg {
    Sgd,
    Adam,
}

impl From<OptimizerArg> for OptimizerKind {
    fn from(arg: OptimizerArg) -> Self {
        match arg {
            OptimizerArg::Sgd => OptimizerKind::Sgd,
            OptimizerArg::Adam => OptimizerKind::Adam,
        }
    }
}

/// Run ANI1 neural net training.
#[derive(Debug, Parser)]
#[command(name = "ani-train", version, about)]
struct Cli {
    /// Use least-squares fitted self energies instead of isolated-atom energies
    #[arg(long)]
    fitted: bool,

    /// Add the forcefield rotamer data to the training set
    #[arg(long = "add_ffdata", alias = "add-ffdata")]
    add_ffdata: bool,

    /// Number of devices to train on
    #[arg(long, default_value_t = 1)]
    gpus: usize,

    /// Location where work data (checkpoints) is dumped
    #[arg(long, default_value = "~/work")]
    work_dir: PathBuf,

    /// Location of the training data
    #[arg(long, default_value = "~/ANI-1_release")]
    train_dir: PathBuf,

    /// JSON architecture file; defaults to the ANI-1 layout
    #[arg(long)]
    model_spec: Option<PathBuf>,

    /// Initial learning rate for a fresh run
    #[arg(long, default_value_t = 1e-3)]
    learning_rate: f64,

    /// Molecules per gradient step
    #[arg(long, default_value_t = 1024)]
    batch_size: usize,

    /// Non-improving epochs tolerated before a learning-rate decay
    #[arg(long, default_value_t = 100)]
    patience: u64,

    /// Learning-rate multiplier applied on every decay
    #[arg(long, default_value_t = 0.5)]
    decay_factor: f64,

    /// Clip parameter norms after every batch instead of once per epoch
    #[arg(long)]
    clip_per_batch: bool,

    /// Maximum incoming weight norm per neuron
    #[arg(long, default_value_t = 3.0)]
    max_norm: f64,

    #[arg(long, value_enum, default_value_t = OptimizerArg::Adam)]
    optimizer: OptimizerArg,

    /// Share of gdb8 held out as the test set
    #[arg(long, default_value_t = 0.2)]
    test_fraction: f64,

    /// Seed for the data split, initialization and shuffling
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    // Fail before any work when there is nothing to train on.
    let devices = DeviceSet::detect(cli.gpus).context("claiming compute devices")?;
    info!("Arguments {cli:?}");

    let train_dir = expand_tilde(&cli.train_dir);
    let work_dir = expand_tilde(&cli.work_dir);
    let paths = TrainPaths::new(&train_dir);

    let mut loader = DataLoader::new(cli.fitted)
        .with_seed(cli.seed)
        .with_test_fraction(cli.test_fraction);
    let ff_train_dir = cli.add_ffdata.then_some(paths.rotamer_train.as_path());
    let (train, test) = loader
        .load_gdb8(&paths.root, &paths.calibration_train, ff_train_dir)
        .context("loading gdb8")?;
    let gdb11 = loader
        .load_gdb11(&paths.root, &paths.calibration_test)
        .context("loading gdb11")?;

    let mut eval_sets = Vec::new();
    for (name, dir) in [
        ("Neutral Rotamers", &paths.rotamer_test),
        ("Neutral Rotamers CCSDT", &paths.ccsdt_rotamer_test),
        ("Charged Rotamers", &paths.charged_rotamer_test),
    ] {
        let (dataset, groups) = loader
            .load_ff(dir)
            .with_context(|| format!("loading {name} from {}", dir.display()))?;
        eval_sets.push(EvalSet::new(name, dataset, groups));
    }

    let model = match &cli.model_spec {
        Some(path) => ModelSpec::load_json(path)
            .with_context(|| format!("reading model spec {}", path.display()))?,
        None => ModelSpec::default(),
    };
    let trainer_config = TrainerConfig {
        model,
        optimizer: cli.optimizer.into(),
        max_norm: cli.max_norm,
        seed: cli.seed,
    };
    let mut trainer = AniTrainer::new(trainer_config, loader.feature_size(), devices)?;

    let data = TrainingData { train, test, gdb11: Some(gdb11), eval_sets };
    let loop_config = LoopConfig {
        max_local_epochs: cli.patience,
        decay_factor: cli.decay_factor,
        initial_learning_rate: cli.learning_rate,
        batch_size: cli.batch_size,
        clip_policy: if cli.clip_per_batch { ClipPolicy::PerBatch } else { ClipPolicy::PerEpoch },
        checkpoint_dir: Some(save_dir(&work_dir)),
        ..LoopConfig::default()
    };

    let summary = TrainingLoop::start(&mut trainer, &data, &loop_config)?.run()?;
    info!(
        "done: {} epochs, {} decays, best test rmse {:.4} kcal/mol",
        summary.epochs, summary.decays, summary.state.best_test_score
    );
    Ok(())
}
