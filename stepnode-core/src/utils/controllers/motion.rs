//! Motion state machine.
//!
//! ```text
//!        Scan              sweep + return done
//! Idle ────────► Scanning ─────────────────────► Idle
//!   │  Move(n)              n steps done
//!   └──────────► Moving ───────────────────────► Idle
//! ```
//!
//! A request always runs to completion; the controller only looks at the next
//! request once it is back in `Idle`.

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use heapless::Vec;

use super::{
    motor::{Direction, MotorError, StepperMotor},
    sampler::AnalogInput,
    MotionRequest, MotionSnapshot, NodeState, SharedSampler,
};
use crate::utils::{
    config::{NodeConfig, MAX_ENERGY_SAMPLES},
    math::energy,
};

/// Longest self-test sequence the controller keeps.
pub const SELF_TEST_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
    Idle,
    Scanning,
    Moving,
}

/// Fixed list of motion requests replayed one at a time after each completed
/// motion. Only used to exercise the mechanics without a coordinator.
#[derive(Debug, Clone, Default)]
pub struct SelfTest {
    sequence: Vec<MotionRequest, SELF_TEST_LEN>,
    index: usize,
}

impl SelfTest {
    /// Keep at most `SELF_TEST_LEN` entries of `sequence`.
    pub fn new(sequence: &[MotionRequest]) -> Self {
        let len = sequence.len().min(SELF_TEST_LEN);
        SelfTest {
            sequence: Vec::from_slice(&sequence[..len]).unwrap_or_default(),
            index: 0,
        }
    }

    /// Consume the next entry, if any.
    pub fn next_request(&mut self) -> Option<MotionRequest> {
        let request = self.sequence.get(self.index).copied()?;
        self.index += 1;
        Some(request)
    }

    /// Entries consumed so far.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Owns the motor and runs scan / move requests against it.
pub struct MotionController<'a, DIR, EN, STEP, A, D> {
    motor: StepperMotor<DIR, EN, STEP>,
    sampler: &'a SharedSampler<A>,
    delay: D,
    state: &'a NodeState,
    config: NodeConfig,
    phase: MotionPhase,
    self_test: Option<SelfTest>,
}

impl<'a, DIR, EN, STEP, A, D, E> MotionController<'a, DIR, EN, STEP, A, D>
where
    DIR: OutputPin<Error = E>,
    EN: OutputPin<Error = E>,
    STEP: OutputPin<Error = E>,
    E: core::fmt::Debug,
    A: AnalogInput,
    D: DelayNs,
{
    pub fn new(
        motor: StepperMotor<DIR, EN, STEP>,
        sampler: &'a SharedSampler<A>,
        delay: D,
        state: &'a NodeState,
        config: NodeConfig,
    ) -> Self {
        let controller = MotionController {
            motor,
            sampler,
            delay,
            state,
            config,
            phase: MotionPhase::Idle,
            self_test: None,
        };
        controller.publish();
        controller
    }

    /// Attach a self-test sequence consumed after each completed motion.
    pub fn with_self_test(
        mut self,
        self_test: SelfTest,
    ) -> Self {
        self.self_test = Some(self_test);
        self
    }

    pub fn phase(&self) -> MotionPhase {
        self.phase
    }

    pub fn position(&self) -> u16 {
        self.motor.position()
    }

    pub fn self_test(&self) -> Option<&SelfTest> {
        self.self_test.as_ref()
    }

    /// Run `request` to completion.
    ///
    /// The busy flag is raised for the whole motion and dropped again even if a
    /// pin write fails. On success, returns the self-test entry consumed by
    /// this completion, if any.
    pub async fn execute(
        &mut self,
        request: MotionRequest,
    ) -> Result<Option<MotionRequest>, MotorError<E>> {
        let result = match request {
            MotionRequest::Scan => {
                self.enter(MotionPhase::Scanning);
                self.scan().await.map(|_| ())
            }
            MotionRequest::Move { steps } => {
                self.enter(MotionPhase::Moving);
                self.move_by(i32::from(steps)).await
            }
        };
        self.enter(MotionPhase::Idle);
        result?;

        Ok(self.self_test.as_mut().and_then(SelfTest::next_request))
    }

    /// Sweep one revolution clockwise sampling energy every stride, then return
    /// to the position of the strongest sample. Returns that position.
    async fn scan(&mut self) -> Result<u16, MotorError<E>> {
        let stride = self.config.stride();
        let wanted = self.config.sample_count();
        let mut samples: Vec<u16, MAX_ENERGY_SAMPLES> = Vec::new();

        tracing::debug!(stride, samples = wanted, "scanning");
        self.motor.set_enabled(true)?;
        self.motor.set_direction(Direction::Clockwise)?;

        for edge in 0..self.config.sweep_edges() {
            if edge % stride == 0 && samples.len() < wanted {
                self.delay.delay_ms(self.config.settle_delay_ms).await;
                let reading = self.sampler.lock().await.read_averaged();
                tracing::debug!(
                    sample = samples.len(),
                    reading,
                    position = self.motor.position(),
                    "energy sample"
                );
                let _ = samples.push(reading);
            }
            self.edge().await?;
        }

        let peak = energy::peak_position(&samples, stride).unwrap_or(0);
        let target = (peak % u32::from(self.motor.steps_per_revolution())) as u16;
        let current = self.motor.position();
        tracing::debug!(current, target, "max energy position");

        self.delay.delay_ms(self.config.return_pause_ms).await;
        self.travel(i32::from(target) - i32::from(current)).await?;
        tracing::info!(position = self.motor.position(), "scan ended");
        Ok(target)
    }

    async fn move_by(
        &mut self,
        steps: i32,
    ) -> Result<(), MotorError<E>> {
        tracing::debug!(steps, "moving");
        self.motor.set_enabled(true)?;
        self.travel(steps).await
    }

    /// `|delta|` full steps, clockwise for positive `delta`.
    async fn travel(
        &mut self,
        delta: i32,
    ) -> Result<(), MotorError<E>> {
        self.motor.set_direction(Direction::from_steps(delta))?;
        for _ in 0..delta.unsigned_abs() {
            self.edge().await?;
            self.edge().await?;
        }
        Ok(())
    }

    /// One step-output edge followed by the inter-edge delay.
    async fn edge(&mut self) -> Result<(), MotorError<E>> {
        self.motor.toggle_step()?;
        self.publish();
        self.delay.delay_ms(self.config.step_delay_ms).await;
        Ok(())
    }

    fn enter(
        &mut self,
        phase: MotionPhase,
    ) {
        self.phase = phase;
        self.publish();
    }

    fn publish(&self) {
        self.state.publish(MotionSnapshot {
            busy: self.phase != MotionPhase::Idle,
            position: self.motor.position(),
        });
    }
}
