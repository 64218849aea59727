//! The in-process trainer: learning, sharding, checkpoints, and the
//! convergence loop driving it end to end.

use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ani_train::data::MoleculeRecord;
use ani_train::{
    ActivationFunction, AniTrainer, ClipPolicy, DataLoader, Dataset, DeviceSet, Element,
    EpochOptions, Error, EvalGroup, EvalSet, FeaturizerParams, LayerSpec, LoopConfig, ModelSpec, Molecule,
    OptimizerKind, Trainer, TrainerConfig, TrainingData, TrainingLoop, TrainingState,
};

const FEATURES: usize = 6;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Molecules whose energy is a smooth per-atom function of the features.
fn synthetic(name: &str, n: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let molecules = (0..n)
        .map(|_| {
            let atoms = rng.gen_range(2..5);
            let species: Vec<Element> = (0..atoms)
                .map(|_| Element::ALL[rng.gen_range(0..2)])
                .collect();
            let features: Vec<Vec<f64>> = (0..atoms)
                .map(|_| (0..FEATURES).map(|_| rng.gen_range(0.0..1.0)).collect())
                .collect();
            let energy = species.iter().zip(features.iter())
                .map(|(e, f)| {
                    let scale = if *e == Element::H { 0.05 } else { 0.1 };
                    scale * (f[0] - 0.5 * f[1] + f[2] * f[3])
                })
                .sum();
            Molecule { name: None, species, features, energy }
        })
        .collect();
    Dataset::new(name, molecules)
}

fn config(optimizer: OptimizerKind, seed: u64) -> TrainerConfig {
    TrainerConfig {
        model: ModelSpec {
            name: "tiny".into(),
            hidden: vec![LayerSpec { size: 8, activation: ActivationFunction::Celu { alpha: 0.1 } }],
        },
        optimizer,
        max_norm: 3.0,
        seed,
    }
}

fn opts(batch_size: usize, shuffle: bool) -> EpochOptions {
    EpochOptions { batch_size, shuffle, clip: ClipPolicy::PerEpoch }
}

#[test]
fn a_few_epochs_reduce_the_error() {
    init_logger();
    let train = synthetic("train", 48, 1);
    let mut trainer = AniTrainer::new(config(OptimizerKind::Adam, 2), FEATURES, DeviceSet::fixed(2).unwrap()).unwrap();
    let state = TrainingState::new(1e-2);

    let before = trainer.eval_abs_rmse(&train).unwrap();
    for _ in 0..40 {
        trainer.train_epoch(&train, &opts(8, true), &state).unwrap();
    }
    let after = trainer.eval_abs_rmse(&train).unwrap();
    assert!(after < 0.5 * before, "rmse {before} -> {after}");
}

#[test]
fn sharding_across_devices_matches_a_single_device() {
    let train = synthetic("train", 30, 3);
    let state = TrainingState::new(1e-3);
    let mut single = AniTrainer::new(config(OptimizerKind::Sgd, 9), FEATURES, DeviceSet::fixed(1).unwrap()).unwrap();
    let mut multi = AniTrainer::new(config(OptimizerKind::Sgd, 9), FEATURES, DeviceSet::fixed(3).unwrap()).unwrap();
    assert_eq!(single.model().max_param_diff(multi.model()), 0.0);

    let a = single.train_epoch(&train, &opts(10, false), &state).unwrap();
    let b = multi.train_epoch(&train, &opts(10, false), &state).unwrap();

    assert_eq!(a.squared_errors.len(), 30);
    for (x, y) in a.squared_errors.iter().zip(b.squared_errors.iter()) {
        assert!((x - y).abs() < 1e-12);
    }
    assert!(single.model().max_param_diff(multi.model()) < 1e-12);
    assert_eq!(single.predict(&train).len(), multi.predict(&train).len());
}

#[test]
fn per_batch_clipping_bounds_weights_after_the_epoch() {
    let train = synthetic("train", 16, 4);
    let mut cfg = config(OptimizerKind::Sgd, 5);
    cfg.max_norm = 0.2;
    let mut trainer = AniTrainer::new(cfg, FEATURES, DeviceSet::fixed(1).unwrap()).unwrap();
    let state = TrainingState::new(1e-2);
    let clip = EpochOptions { clip: ClipPolicy::PerBatch, ..opts(4, true) };
    trainer.train_epoch(&train, &clip, &state).unwrap();

    for net in &trainer.model().nets {
        for layer in &net.layers {
            for j in 0..layer.weights.cols {
                assert!(layer.weights.column_norm(j) <= 0.2 + 1e-12);
            }
        }
    }
}

#[test]
fn checkpoint_restores_state_parameters_and_best_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let train = synthetic("train", 20, 6);
    let mut trainer = AniTrainer::new(config(OptimizerKind::Adam, 1), FEATURES, DeviceSet::fixed(1).unwrap()).unwrap();
    let mut state = TrainingState::new(1e-2);

    trainer.train_epoch(&train, &opts(5, true), &state).unwrap();
    trainer.save_best_params();
    let best_score = trainer.eval_abs_rmse(&train).unwrap();
    trainer.train_epoch(&train, &opts(5, true), &state).unwrap();
    state.record_improvement(best_score);
    trainer.save(dir.path(), &state).unwrap();
    assert!(dir.path().join("checkpoint.json").exists());

    let mut restored = AniTrainer::new(config(OptimizerKind::Adam, 77), FEATURES, DeviceSet::fixed(2).unwrap()).unwrap();
    let loaded = restored.load(dir.path()).unwrap();
    assert_eq!(loaded, state);
    assert!(restored.model().max_param_diff(trainer.model()) < 1e-12);
    assert!(restored.best_model().max_param_diff(trainer.best_model()) < 1e-12);

    restored.load_best_params();
    let again = restored.eval_abs_rmse(&train).unwrap();
    assert!((again - best_score).abs() < 1e-9);
}

#[test]
fn checkpoint_with_other_feature_width_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = AniTrainer::new(config(OptimizerKind::Sgd, 1), FEATURES, DeviceSet::fixed(1).unwrap()).unwrap();
    trainer.save(dir.path(), &TrainingState::new(1e-3)).unwrap();

    let mut wider = AniTrainer::new(config(OptimizerKind::Sgd, 1), FEATURES + 1, DeviceSet::fixed(1).unwrap()).unwrap();
    assert!(matches!(wider.load(dir.path()), Err(Error::Checkpoint(_))));
}

#[test]
fn empty_test_set_is_an_error() {
    let trainer = AniTrainer::new(config(OptimizerKind::Sgd, 1), FEATURES, DeviceSet::fixed(1).unwrap()).unwrap();
    assert!(matches!(
        trainer.eval_abs_rmse(&Dataset::new("empty", vec![])),
        Err(Error::EmptyDataset(_))
    ));
}

#[test]
fn group_members_outside_the_dataset_are_rejected() {
    let data = synthetic("rotamers", 2, 8);
    let trainer = AniTrainer::new(config(OptimizerKind::Sgd, 1), FEATURES, DeviceSet::fixed(1).unwrap()).unwrap();
    assert!(trainer.eval_eh_rmse(&data, &EvalGroup::new(vec![vec![0, 1]])).is_ok());
    assert!(matches!(
        trainer.eval_eh_rmse(&data, &EvalGroup::new(vec![vec![0, 5]])),
        Err(Error::InvalidConfig(_))
    ));
}

fn loop_data(seed: u64) -> TrainingData {
    TrainingData {
        train: synthetic("train", 24, seed),
        test: synthetic("test", 8, seed + 1),
        gdb11: None,
        eval_sets: vec![],
    }
}

#[test]
fn resumed_run_keeps_the_best_snapshot_score() {
    let dir = tempfile::tempdir().unwrap();
    let data = loop_data(20);

    // Snapshot the initial parameters, then let the current ones drift.
    let mut first = AniTrainer::new(config(OptimizerKind::Adam, 3), FEATURES, DeviceSet::fixed(1).unwrap()).unwrap();
    first.save_best_params();
    let best = first.eval_abs_rmse(&data.test).unwrap();
    let mut state = TrainingState::new(5e-2);
    state.record_improvement(best);
    for _ in 0..5 {
        first.train_epoch(&data.train, &opts(4, true), &state).unwrap();
        state.record_stagnation();
    }
    let drifted = first.eval_abs_rmse(&data.test).unwrap();
    assert_ne!(drifted, best);
    first.save(dir.path(), &state).unwrap();

    let mut resumed = AniTrainer::new(config(OptimizerKind::Adam, 11), FEATURES, DeviceSet::fixed(2).unwrap()).unwrap();
    let loop_config = LoopConfig { checkpoint_dir: Some(dir.path().to_path_buf()), ..LoopConfig::default() };
    let mut lp = TrainingLoop::start(&mut resumed, &data, &loop_config).unwrap();
    assert_eq!(lp.state().best_test_score, best);
    assert_eq!(lp.state().local_epoch_count, 5);
    assert_eq!(lp.trainer().eval_abs_rmse(&data.test).unwrap(), drifted);

    lp.decay();
    assert_eq!(lp.trainer().eval_abs_rmse(&data.test).unwrap(), best);
}

#[test]
fn checkpoint_dir_without_a_checkpoint_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let save = dir.path().join("save");
    fs::create_dir_all(&save).unwrap();
    let data = loop_data(30);

    let mut trainer = AniTrainer::new(config(OptimizerKind::Sgd, 2), FEATURES, DeviceSet::fixed(1).unwrap()).unwrap();
    let loop_config = LoopConfig {
        initial_learning_rate: 1e-2,
        checkpoint_dir: Some(save.clone()),
        ..LoopConfig::default()
    };
    let mut lp = TrainingLoop::start(&mut trainer, &data, &loop_config).unwrap();
    assert_eq!(lp.state().learning_rate, 1e-2);
    assert_eq!(lp.state().global_epoch_count, 0);

    lp.run_epoch().unwrap();
    assert!(save.join("checkpoint.json").is_file());
}

fn write_records(path: &Path, records: &[MoleculeRecord]) {
    fs::write(path, serde_json::to_string(records).unwrap()).unwrap();
}

fn conformers(rng: &mut StdRng, base: &[[f64; 3]], species: &[Element], n: usize) -> Vec<MoleculeRecord> {
    (0..n)
        .map(|i| {
            let coordinates: Vec<[f64; 3]> = base.iter()
                .map(|p| [
                    p[0] + rng.gen_range(-0.05..0.05),
                    p[1] + rng.gen_range(-0.05..0.05),
                    p[2] + rng.gen_range(-0.05..0.05),
                ])
                .collect();
            let stretch: f64 = coordinates.iter().flatten().sum::<f64>() * 1e-3;
            MoleculeRecord {
                name: Some(format!("conf{i}")),
                species: species.to_vec(),
                coordinates,
                energy: -40.5 + stretch,
            }
        })
        .collect()
}

#[test]
fn loop_over_loaded_data_restores_best_after_decay() {
    init_logger();
    let root = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(12);
    let methane_species = [Element::C, Element::H, Element::H, Element::H, Element::H];
    let methane = [
        [0.0, 0.0, 0.0],
        [0.63, 0.63, 0.63],
        [-0.63, -0.63, 0.63],
        [-0.63, 0.63, -0.63],
        [0.63, -0.63, -0.63],
    ];
    write_records(&root.path().join("ani_gdb_s01.json"), &conformers(&mut rng, &methane, &methane_species, 30));

    let rot = root.path().join("rotamers").join("test");
    fs::create_dir_all(&rot).unwrap();
    write_records(&rot.join("methane.json"), &conformers(&mut rng, &methane, &methane_species, 6));

    let params = FeaturizerParams {
        radial_shifts: vec![0.8, 1.1, 1.4],
        angle_shifts: vec![1.0, 2.0],
        angular_radial_shifts: vec![1.0],
        ..FeaturizerParams::default()
    };
    let mut loader = DataLoader::new(false).with_featurizer(params).with_seed(3);
    let (train, test) = loader.load_gdb8(root.path(), &root.path().join("cal.txt"), None).unwrap();
    let (rot_ds, rot_groups) = loader.load_ff(&rot).unwrap();

    let data = TrainingData {
        train,
        test,
        gdb11: None,
        eval_sets: vec![EvalSet::new("Neutral Rotamers", rot_ds, rot_groups)],
    };
    let mut trainer = AniTrainer::new(
        config(OptimizerKind::Adam, 4),
        loader.feature_size(),
        DeviceSet::fixed(1).unwrap(),
    )
    .unwrap();
    let save = root.path().join("work").join("save");
    let loop_config = LoopConfig {
        initial_learning_rate: 1e-3,
        batch_size: 8,
        checkpoint_dir: Some(save.clone()),
        ..LoopConfig::default()
    };

    let mut lp = TrainingLoop::start(&mut trainer, &data, &loop_config).unwrap();
    for _ in 0..5 {
        lp.run_epoch().unwrap();
    }
    assert!(save.join("checkpoint.json").exists());
    assert_eq!(lp.state().global_epoch_count, 5);

    let best = lp.state().best_test_score;
    lp.decay();
    assert_eq!(lp.state().learning_rate, 5e-4);
    let restored = lp.trainer().eval_abs_rmse(&data.test).unwrap();
    assert_eq!(restored, best);
}
