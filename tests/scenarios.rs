//! End-to-end behaviour of the fading engine driven the way a discrete-event
//! scheduler drives it.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use satfading::{
    db_to_linear, linear_to_db, ChannelType, Fader, FadingConfig, FadingError,
    FadingOrchestrator, GeometryAccessors, LooFader, LooParams, ParameterConfig, RayleighParams,
    SetConfig, SimTime, StateModel,
};

// ============================================================================
// Helpers
// ============================================================================

fn params(config: FadingConfig) -> Arc<ParameterConfig> {
    Arc::new(ParameterConfig::new(config).unwrap())
}

fn fixed(config: FadingConfig, elevation_deg: f64, velocity_mps: f64) -> FadingOrchestrator {
    FadingOrchestrator::new(
        params(config),
        GeometryAccessors::fixed(elevation_deg, velocity_mps),
        || SimTime::ZERO,
    )
}

/// Default tables with the upper bracket starting at 50 deg.
fn brackets_0_30_50() -> FadingConfig {
    let mut config = FadingConfig::default();
    config.sets[2].min_elevation_deg = 50.0;
    config
}

/// Three states below 30 deg, two between 30 and 60, one above.
fn shrinking_config() -> FadingConfig {
    let loo = |mean: f64| StateModel::Loo(LooParams::new(mean, 1.0, -20.0));
    FadingConfig {
        sets: vec![
            SetConfig {
                min_elevation_deg: 0.0,
                matrix: vec![
                    vec![0.5, 0.25, 0.25],
                    vec![0.25, 0.5, 0.25],
                    vec![0.25, 0.25, 0.5],
                ],
                states: vec![loo(0.0), loo(-6.0), loo(-18.0)],
            },
            SetConfig {
                min_elevation_deg: 30.0,
                matrix: vec![vec![0.6, 0.4], vec![0.4, 0.6]],
                states: vec![
                    loo(0.0),
                    StateModel::Rayleigh(RayleighParams::new(20.0, 8)),
                ],
            },
            SetConfig {
                min_elevation_deg: 60.0,
                matrix: vec![vec![1.0]],
                states: vec![StateModel::Rayleigh(RayleighParams::new(40.0, 12))],
            },
        ],
        ..FadingConfig::default()
    }
}

fn two_state_config() -> FadingConfig {
    FadingConfig {
        sets: vec![SetConfig {
            min_elevation_deg: 0.0,
            matrix: vec![vec![0.9, 0.1], vec![0.3, 0.7]],
            states: vec![
                StateModel::Loo(LooParams::new(0.0, 0.5, -25.0)),
                StateModel::Loo(LooParams::new(-15.0, 3.0, -25.0)),
            ],
        }],
        ..FadingConfig::default()
    }
}

fn occupancy(config: FadingConfig, queries: u64, step: SimTime) -> Vec<f64> {
    let mut orchestrator = fixed(config, 10.0, 1.0);
    let mut counts = vec![0u64; 2];
    for k in 1..=queries {
        let now = SimTime::from_nanos(step.as_nanos() * k);
        orchestrator.fading_at(ChannelType::ForwardUser, now).unwrap();
        let chain = orchestrator.chain(ChannelType::ForwardUser).unwrap();
        counts[chain.state_index()] += 1;
    }
    counts.iter().map(|&c| c as f64 / queries as f64).collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn rayleigh_only_queries_stay_finite_and_bounded() {
    let config = FadingConfig {
        gain_floor_db: -40.0,
        gain_ceiling_db: 40.0,
        ..FadingConfig::single_state(StateModel::Rayleigh(RayleighParams::new(30.0, 10)))
    };
    let mut orchestrator = fixed(config, 40.0, 15.0);

    for k in 1..=1000u64 {
        let now = SimTime::from_nanos(500_000 * k);
        let gain = orchestrator.fading_at(ChannelType::ForwardUser, now).unwrap();
        assert!(gain.is_finite(), "non-finite gain at {now}");
        assert!((-40.0..=40.0).contains(&gain), "gain {gain} dB at {now}");
    }
}

#[test]
fn loo_fader_mean_gain_is_sane() {
    let loo = LooParams::new(0.5, 0.5, -8.0);
    let params = params(FadingConfig::single_state(StateModel::Loo(loo.clone())));
    let mut rng = ChaCha8Rng::seed_from_u64(10);
    let mut fader = LooFader::new(params, 0, 0, &mut rng).unwrap();

    let mut sum = 0.0;
    for k in 1..=1000u64 {
        let gain = fader.sample_gain_db(SimTime::from_millis(500 * k), 20.0, &mut rng);
        assert!(gain.is_finite());
        sum += gain;
    }
    let mean = sum / 1000.0;
    // Direct power dominates the composite at these parameters
    assert!((mean - loo.direct_mean_db).abs() < 2.0, "mean gain {mean} dB");
}

#[test]
fn loo_fader_mean_power_includes_multipath() {
    let loo = LooParams::new(0.5, 0.5, -8.0);
    let params = params(FadingConfig::single_state(StateModel::Loo(loo.clone())));
    let mut rng = ChaCha8Rng::seed_from_u64(10);
    let mut fader = LooFader::new(params, 0, 0, &mut rng).unwrap();

    let mut power = 0.0;
    for k in 1..=1000u64 {
        let gain = fader.sample_gain_db(SimTime::from_millis(500 * k), 20.0, &mut rng);
        power += db_to_linear(gain);
    }
    let mean_db = linear_to_db(power / 1000.0);
    let composite_db = linear_to_db(
        db_to_linear(loo.direct_mean_db) + db_to_linear(loo.multipath_power_db),
    );
    assert!(
        (mean_db - composite_db).abs() < 1.0,
        "mean power {mean_db} dB, composite {composite_db} dB"
    );
    // Multipath power lifts the composite above the direct mean
    assert!(mean_db > loo.direct_mean_db, "mean power {mean_db} dB");
}

#[test]
fn elevation_change_rebinds_set_and_keeps_state() {
    // No transitions are ever drawn: zero velocity never covers a distance
    let config = FadingConfig {
        initial_state: 2,
        min_position_change_m: Some(0.0),
        ..brackets_0_30_50()
    };
    let elevation = Rc::new(Cell::new(45.0));
    let geometry = GeometryAccessors::new(
        {
            let elevation = Rc::clone(&elevation);
            move || elevation.get()
        },
        || 0.0,
    );
    let mut orchestrator = FadingOrchestrator::new(params(config), geometry, || SimTime::ZERO);

    let first = orchestrator
        .fading_at(ChannelType::ForwardUser, SimTime::from_millis(10))
        .unwrap();
    assert!(first.is_finite());
    let chain = orchestrator.chain(ChannelType::ForwardUser).unwrap();
    assert_eq!((chain.set_index(), chain.state_index()), (1, 2));

    orchestrator
        .fading_at(ChannelType::ForwardUser, SimTime::from_millis(30))
        .unwrap();
    elevation.set(55.0);
    orchestrator
        .fading_at(ChannelType::ForwardUser, SimTime::from_millis(50))
        .unwrap();
    let chain = orchestrator.chain(ChannelType::ForwardUser).unwrap();
    assert_eq!((chain.set_index(), chain.state_index()), (2, 2));
}

#[test]
fn logic_schedule_runs_and_follows_elevation() {
    let elevation = Rc::new(Cell::new(45.0));
    let clock = Rc::new(Cell::new(SimTime::ZERO));
    let geometry = GeometryAccessors::new(
        {
            let elevation = Rc::clone(&elevation);
            move || elevation.get()
        },
        || 0.0,
    );
    let mut orchestrator = FadingOrchestrator::new(params(brackets_0_30_50()), geometry, {
        let clock = Rc::clone(&clock);
        move || clock.get()
    });

    let mut sets = Vec::new();
    for ms in [10u64, 30, 45, 50, 60, 90, 95, 100, 130, 200] {
        clock.set(SimTime::from_millis(ms));
        match ms {
            45 => elevation.set(55.0),
            95 => elevation.set(75.0),
            _ => {
                let value = orchestrator.fading(ChannelType::ForwardUser).unwrap();
                assert!(value.is_finite());
                let chain = orchestrator.chain(ChannelType::ForwardUser).unwrap();
                assert!(chain.state_index() < 3);
                sets.push(chain.set_index());
            }
        }
    }
    assert_eq!(sets, vec![1, 1, 2, 2, 2, 2, 2, 2]);
}

#[test]
fn unknown_channel_fails_fast() {
    let mut orchestrator = FadingOrchestrator::with_channels(
        params(FadingConfig::default()),
        GeometryAccessors::fixed(45.0, 0.0),
        || SimTime::from_millis(1),
        [ChannelType::ForwardUser, ChannelType::ReturnUser],
    );
    assert!(matches!(
        orchestrator.fading(ChannelType::ForwardFeeder),
        Err(FadingError::UnknownChannel(_))
    ));
    assert!(orchestrator.fading(ChannelType::ReturnUser).is_ok());
}

#[test]
fn invalid_tables_refuse_to_build() {
    let mut config = FadingConfig::default();
    config.sets[0].matrix[1] = vec![0.3, 0.3, 0.3];
    let built = FadingOrchestrator::from_config(
        config,
        GeometryAccessors::fixed(45.0, 0.0),
        || SimTime::ZERO,
    );
    assert!(matches!(built, Err(FadingError::InvalidConfig(_))));
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn identical_seeds_give_identical_traces() {
    let run = || {
        let mut orchestrator = fixed(shrinking_config(), 35.0, 12.0);
        let mut values = Vec::new();
        for k in 1..=300u64 {
            for channel in [ChannelType::ForwardUser, ChannelType::ReturnFeeder] {
                let now = SimTime::from_micros(700 * k);
                values.push(orchestrator.fading_at(channel, now).unwrap().to_bits());
            }
        }
        values
    };
    assert_eq!(run(), run());
}

#[test]
fn different_seeds_give_different_traces() {
    let run = |seed| {
        let config = FadingConfig {
            seed,
            ..FadingConfig::default()
        };
        let mut orchestrator = fixed(config, 20.0, 5.0);
        (1..=50u64)
            .map(|k| {
                orchestrator
                    .fading_at(ChannelType::ForwardUser, SimTime::from_millis(k))
                    .unwrap()
            })
            .collect::<Vec<_>>()
    };
    assert_ne!(run(1), run(2));
}

#[test]
fn repeated_instant_consumes_no_draw() {
    let times = [3u64, 7, 12, 40, 41];
    let plain = {
        let mut orchestrator = fixed(FadingConfig::default(), 20.0, 5.0);
        times
            .iter()
            .map(|&ms| {
                orchestrator
                    .fading_at(ChannelType::ForwardUser, SimTime::from_millis(ms))
                    .unwrap()
            })
            .collect::<Vec<_>>()
    };

    let mut orchestrator = fixed(FadingConfig::default(), 20.0, 5.0);
    let mut doubled = Vec::new();
    for &ms in &times {
        let now = SimTime::from_millis(ms);
        let first = orchestrator.fading_at(ChannelType::ForwardUser, now).unwrap();
        let second = orchestrator.fading_at(ChannelType::ForwardUser, now).unwrap();
        assert_eq!(first, second);
        doubled.push(first);
    }
    assert_eq!(plain, doubled);
}

#[test]
fn occupancy_converges_to_stationary_distribution() {
    let stationary = params(two_state_config()).set(0).stationary_distribution().to_vec();
    assert!((stationary[0] - 0.75).abs() < 1e-9);

    let observed = occupancy(two_state_config(), 100_000, SimTime::from_millis(1));
    assert!(
        (observed[0] - stationary[0]).abs() < 0.02,
        "occupancy {observed:?}, stationary {stationary:?}"
    );
}

#[test]
fn fractional_steps_converge_to_the_same_distribution() {
    let observed = occupancy(two_state_config(), 100_000, SimTime::from_micros(400));
    assert!((observed[0] - 0.75).abs() < 0.03, "occupancy {observed:?}");
}

#[test]
fn below_domain_elevation_selects_lowest_set() {
    let params = params(FadingConfig::default());
    let clamped = params.lookup(-10.0);
    assert!(clamped.clamped);
    assert_eq!(clamped.index, params.lookup(0.0).index);

    let mut orchestrator = fixed(FadingConfig::default(), -10.0, 0.0);
    orchestrator
        .fading_at(ChannelType::ReturnUser, SimTime::from_millis(1))
        .unwrap();
    assert_eq!(orchestrator.chain(ChannelType::ReturnUser).unwrap().set_index(), 0);
}

#[test]
#[should_panic(expected = "time regression")]
fn time_regression_is_a_contract_violation() {
    let mut orchestrator = fixed(FadingConfig::default(), 45.0, 0.0);
    orchestrator
        .fading_at(ChannelType::ForwardUser, SimTime::from_millis(20))
        .unwrap();
    let _ = orchestrator.fading_at(ChannelType::ForwardUser, SimTime::from_millis(10));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn state_index_stays_below_state_count(
        walk in prop::collection::vec((-30.0f64..120.0, 0u64..50), 1..60),
        seed in any::<u64>(),
    ) {
        let config = FadingConfig { seed, ..shrinking_config() };
        let mut orchestrator = fixed(config, 0.0, 0.0);
        let chain_params = Arc::clone(orchestrator.params());
        let mut now = 0u64;
        for (elevation, step_ms) in walk {
            now += step_ms;
            let chain = orchestrator.chain_mut(ChannelType::ForwardUser).unwrap();
            let gain = chain.evaluate(
                elevation,
                3.0,
                SimTime::from_millis(now),
                &mut ChaCha8Rng::seed_from_u64(seed ^ now),
            ).unwrap();
            prop_assert!(gain.is_finite());
            let set = chain.set_index();
            prop_assert!(chain.state_index() < chain_params.state_count(set));
            prop_assert_eq!(set, chain_params.set_index(elevation));
        }
    }

    #[test]
    fn scaled_rows_are_distributions(
        state in 0usize..3,
        steps in 0.0f64..1.0e6,
        set in 0usize..3,
    ) {
        let params = params(FadingConfig::default());
        let row = params.set(set).matrix().row_after(state, steps);
        let sum: f64 = row.iter().sum();
        prop_assert!((sum - 1.0).abs() < 1e-9);
        prop_assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
    }
}
