mod common;

use common::{test_config, CountingPin, RecordingDelay, ScriptedAdc};
use embassy_futures::block_on;
use embedded_hal_mock::eh1::digital::{
    Mock as PinMock, State as PinState, Transaction as PinTrans,
};
use stepnode_core::utils::{
    controllers::{
        EnergySampler, MotionController, MotionPhase, MotionRequest, NodeState, SelfTest,
        SharedSampler, StepperMotor,
    },
    math::energy::{index_of_maximum, peak_position},
    NodeConfig,
};

type CountingMotor = StepperMotor<CountingPin, CountingPin, CountingPin>;

fn counting_motor(config: &NodeConfig) -> (CountingMotor, CountingPin) {
    let step = CountingPin::default();
    let motor = StepperMotor::new(
        CountingPin::default(),
        CountingPin::default(),
        step.clone(),
        config.steps_per_revolution,
    );
    (motor, step)
}

#[test]
fn first_maximum_wins() {
    assert_eq!(index_of_maximum(&[3u16, 5, 5, 2]), Some(1));
    assert_eq!(index_of_maximum(&[7u16, 7, 7]), Some(0));
    assert_eq!(index_of_maximum::<u16>(&[]), None);
    assert_eq!(
        index_of_maximum(&[10u16, 20, 20, 15, 5, 10, 20, 15, 30, 5]),
        Some(8)
    );
}

#[test]
fn peak_position_halves_the_stride() {
    assert_eq!(peak_position(&[10, 20, 20, 15, 5, 10, 20, 15, 30, 5], 40), Some(160));
    assert_eq!(peak_position(&[3, 5, 5, 2], 100), Some(50));
    assert_eq!(peak_position(&[], 40), None);
}

#[test]
fn scan_returns_to_strongest_sample() {
    let config = test_config();
    let state = NodeState::new();
    let adc = ScriptedAdc::new(&[10, 20, 20, 15, 5, 10, 20, 15, 30, 5]);
    let reads = adc.reads.clone();
    let sampler = SharedSampler::new(EnergySampler::from_config(adc, &config));
    let delay = RecordingDelay::watching(&state);
    let (total_ns, busy_seen) = (delay.total_ns.clone(), delay.busy_seen.clone());
    let (motor, step) = counting_motor(&config);

    let mut ctrl = MotionController::new(motor, &sampler, delay, &state, config);
    let follow_up = block_on(ctrl.execute(MotionRequest::Scan)).unwrap();

    assert_eq!(follow_up, None);
    assert_eq!(reads.get(), 10);
    // full sweep (200 steps) plus 160 steps back to the peak
    assert_eq!(step.falling.get(), 200 + 160);
    assert_eq!(ctrl.position(), 160);
    assert_eq!(ctrl.phase(), MotionPhase::Idle);

    let snapshot = state.snapshot();
    assert_eq!(snapshot.position, 160);
    assert!(!snapshot.busy);
    assert!(busy_seen.get(), "busy must be raised while scanning");

    // 10 settle waits, one return pause, 10 ms after each of 400 + 320 edges
    assert_eq!(total_ns.get() / 1_000_000, 10 * 1000 + 1000 + 720 * 10);
}

#[test]
fn scan_ties_go_to_the_earliest_sample() {
    let config = NodeConfig {
        energy_samples: 4,
        ..test_config()
    };
    let state = NodeState::new();
    let sampler = SharedSampler::new(EnergySampler::from_config(
        ScriptedAdc::new(&[3, 5, 5, 2]),
        &config,
    ));
    let (motor, _step) = counting_motor(&config);

    let mut ctrl = MotionController::new(motor, &sampler, RecordingDelay::new(), &state, config);
    block_on(ctrl.execute(MotionRequest::Scan)).unwrap();

    // stride is 100 edges, sample 1 sits 50 steps in
    assert_eq!(ctrl.position(), 50);
}

#[test]
fn scan_from_offset_walks_back_counter_clockwise() {
    let config = test_config();
    let state = NodeState::new();
    let sampler = SharedSampler::new(EnergySampler::from_config(
        ScriptedAdc::new(&[0, 9, 0, 0, 0, 0, 0, 0, 0, 0]),
        &config,
    ));
    let (motor, step) = counting_motor(&config);

    let mut ctrl = MotionController::new(motor, &sampler, RecordingDelay::new(), &state, config);
    block_on(ctrl.execute(MotionRequest::Move { steps: 100 })).unwrap();
    assert_eq!(ctrl.position(), 100);

    block_on(ctrl.execute(MotionRequest::Scan)).unwrap();
    assert_eq!(ctrl.position(), 20);
    assert_eq!(step.falling.get(), 100 + 200 + 80);
}

#[test]
fn scan_already_on_peak_skips_return() {
    let config = test_config();
    let state = NodeState::new();
    let sampler = SharedSampler::new(EnergySampler::from_config(
        ScriptedAdc::new(&[50, 1, 1, 1, 1, 1, 1, 1, 1, 1]),
        &config,
    ));
    let (motor, step) = counting_motor(&config);

    let mut ctrl = MotionController::new(motor, &sampler, RecordingDelay::new(), &state, config);
    block_on(ctrl.execute(MotionRequest::Scan)).unwrap();

    assert_eq!(ctrl.position(), 0);
    assert_eq!(step.falling.get(), 200);
}

#[test]
fn move_steps_exactly_n_times() {
    let config = test_config();
    let state = NodeState::new();
    let sampler = SharedSampler::new(EnergySampler::from_config(ScriptedAdc::constant(0), &config));

    let step_expect: Vec<PinTrans> = (0..5)
        .flat_map(|_| [PinTrans::set(PinState::High), PinTrans::set(PinState::Low)])
        .collect();
    let dir = PinMock::new(&[PinTrans::set(PinState::Low)]);
    let en = PinMock::new(&[PinTrans::set(PinState::Low)]);
    let step = PinMock::new(&step_expect);
    let (mut d, mut e, mut s) = (dir.clone(), en.clone(), step.clone());

    let motor = StepperMotor::new(dir, en, step, config.steps_per_revolution);
    let delay = RecordingDelay::watching(&state);
    let busy_seen = delay.busy_seen.clone();
    let mut ctrl = MotionController::new(motor, &sampler, delay, &state, config);

    block_on(ctrl.execute(MotionRequest::Move { steps: -5 })).unwrap();

    assert_eq!(ctrl.position(), 195);
    assert_eq!(state.snapshot().position, 195);
    assert!(!state.snapshot().busy);
    assert!(busy_seen.get());

    d.done();
    e.done();
    s.done();
}

#[test]
fn move_changes_position_by_n_mod_revolution() {
    let config = test_config();
    let state = NodeState::new();
    let sampler = SharedSampler::new(EnergySampler::from_config(ScriptedAdc::constant(0), &config));
    let (motor, step) = counting_motor(&config);
    let mut ctrl = MotionController::new(motor, &sampler, RecordingDelay::new(), &state, config);

    let mut expected: i32 = 0;
    let mut pulses = 0;
    for n in [127i8, 127, -128, 3, 0, -1] {
        block_on(ctrl.execute(MotionRequest::Move { steps: n })).unwrap();
        expected = (expected + i32::from(n)).rem_euclid(200);
        pulses += i32::from(n).unsigned_abs();
        assert_eq!(i32::from(ctrl.position()), expected);
    }
    assert_eq!(step.falling.get(), pulses);
    assert_eq!(step.rising.get(), pulses);
}

#[test]
fn self_test_entries_are_consumed_in_order() {
    let config = test_config();
    let state = NodeState::new();
    let sampler = SharedSampler::new(EnergySampler::from_config(ScriptedAdc::constant(1), &config));
    let (motor, _step) = counting_motor(&config);
    let sequence = [MotionRequest::Move { steps: 2 }, MotionRequest::Scan];

    let mut ctrl = MotionController::new(motor, &sampler, RecordingDelay::new(), &state, config)
        .with_self_test(SelfTest::new(&sequence));

    let first = block_on(ctrl.execute(MotionRequest::Move { steps: 1 })).unwrap();
    assert_eq!(first, Some(MotionRequest::Move { steps: 2 }));
    let second = block_on(ctrl.execute(first.unwrap())).unwrap();
    assert_eq!(second, Some(MotionRequest::Scan));
    assert_eq!(ctrl.position(), 3);
    let third = block_on(ctrl.execute(MotionRequest::Move { steps: 1 })).unwrap();
    assert_eq!(third, None);
    assert_eq!(ctrl.self_test().map(SelfTest::index), Some(2));
}

#[test]
fn self_test_is_capped() {
    let mut st = SelfTest::new(&[MotionRequest::Scan; 12]);
    let mut taken = 0;
    while st.next_request().is_some() {
        taken += 1;
    }
    assert_eq!(taken, 10);
}
