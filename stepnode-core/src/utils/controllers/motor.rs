//! Step/direction stepper driver.
//!
//! Drives three GPIO outputs: direction (high = clockwise), enable (active low)
//! and step. Tracks the absolute shaft position modulo one revolution by
//! counting falling edges on the step output.

use embedded_hal::digital::OutputPin;

/// Shaft rotation sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

impl Direction {
    /// Positive step counts turn clockwise, everything else counter-clockwise.
    pub fn from_steps(steps: i32) -> Self {
        if steps > 0 {
            Direction::Clockwise
        } else {
            Direction::CounterClockwise
        }
    }
}

/// Pin-level failure, tagged with the output that failed.
#[derive(Debug)]
pub enum MotorError<E: core::fmt::Debug> {
    DirectionPin(E),
    EnablePin(E),
    StepPin(E),
}

pub struct StepperMotor<DIR, EN, STEP> {
    dir_pin: DIR,
    enable_pin: EN,
    step_pin: STEP,
    direction: Direction,
    step_high: bool,
    position: u16,
    steps_per_revolution: u16,
}

impl<DIR, EN, STEP, E> StepperMotor<DIR, EN, STEP>
where
    DIR: OutputPin<Error = E>,
    EN: OutputPin<Error = E>,
    STEP: OutputPin<Error = E>,
    E: core::fmt::Debug,
{
    /// Wrap the three outputs. The pins are not touched until the first command;
    /// the step output is assumed to idle low and the shaft to sit at position 0.
    pub fn new(
        dir_pin: DIR,
        enable_pin: EN,
        step_pin: STEP,
        steps_per_revolution: u16,
    ) -> Self {
        StepperMotor {
            dir_pin,
            enable_pin,
            step_pin,
            direction: Direction::Clockwise,
            step_high: false,
            position: 0,
            steps_per_revolution: steps_per_revolution.max(1),
        }
    }

    /// Power the driver stage on or off.
    pub fn set_enabled(
        &mut self,
        on: bool,
    ) -> Result<(), MotorError<E>> {
        let result = if on {
            self.enable_pin.set_low()
        } else {
            self.enable_pin.set_high()
        };
        result.map_err(MotorError::EnablePin)
    }

    pub fn set_direction(
        &mut self,
        direction: Direction,
    ) -> Result<(), MotorError<E>> {
        let result = match direction {
            Direction::Clockwise => self.dir_pin.set_high(),
            Direction::CounterClockwise => self.dir_pin.set_low(),
        };
        result.map_err(MotorError::DirectionPin)?;
        self.direction = direction;
        Ok(())
    }

    /// Flip the step output. A full step is two toggles; the position moves on
    /// the falling edge.
    pub fn toggle_step(&mut self) -> Result<(), MotorError<E>> {
        if self.step_high {
            self.step_pin.set_low().map_err(MotorError::StepPin)?;
            self.step_high = false;
            self.advance();
        } else {
            self.step_pin.set_high().map_err(MotorError::StepPin)?;
            self.step_high = true;
        }
        Ok(())
    }

    pub fn position(&self) -> u16 {
        self.position
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn steps_per_revolution(&self) -> u16 {
        self.steps_per_revolution
    }

    fn advance(&mut self) {
        self.position = match self.direction {
            Direction::Clockwise => (self.position + 1) % self.steps_per_revolution,
            Direction::CounterClockwise if self.position == 0 => self.steps_per_revolution - 1,
            Direction::CounterClockwise => self.position - 1,
        };
    }
}
