//! A discrete PID controller with an optional PWM duty-cycle output.
//!
//! This crate drives an actuator with an analog 0–100% input — typically a
//! heater — toward a target setpoint. The controller recomputes its output at
//! a configurable refresh interval, independently of how often the control
//! loop polls it, and clamps the result to the 0–100 range. For actuators
//! that only support switched control, a built-in PWM adapter converts the
//! percent output into an on/off signal by holding the output high for the
//! matching fraction of a fixed cycle window.
//!
//! # Control algorithm
//!
//! On each recompute the proportional term follows the error
//! (`setpoint - feedback`) and the derivative term follows the error's rate
//! of change. The integral term is a trapezoidal approximation over the raw
//! feedback signal rather than over the error, so tuning `ki` behaves
//! differently from a textbook PID; start with `ki = 0` and introduce it
//! carefully.
//!
//! # Timing
//!
//! The controller holds no clock of its own. Every call to
//! [`Controller::tick`] takes the current time as a [`Duration`] measured
//! from any fixed epoch the caller chooses, which keeps the controller fully
//! deterministic under test. With the `std` feature enabled (the default),
//! [`Controller::update`] samples the system clock and manages the epoch
//! internally.
//!
//! # No-std support
//!
//! `#[no_std]` support can be enabled by disabling the default crate-level
//! features. This disables the `Controller::update` method which samples the
//! system clock. Instead use the `Controller::tick` method which takes an
//! externally supplied timestamp.
//!
//! # Examples
//!
//! ```no_run
//! use pid_pwm::Controller;
//! use std::thread;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), pid_pwm::Error> {
//! let mut controller = Controller::new();
//! controller.configure(2.0, 0.0, 0.05, Duration::from_secs(1));
//! controller.set_setpoint(92.0);
//!
//! loop {
//!     controller.set_feedback(read_temperature());
//!     controller.update()?;
//!     drive_heater(controller.output());
//!     thread::sleep(Duration::from_millis(100));
//! }
//! # }
//! # fn read_temperature() -> f64 { todo!() }
//! # fn drive_heater(_: f64) { todo!() }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
#![deny(missing_debug_implementations, nonstandard_style)]
#![warn(missing_docs, future_incompatible, unreachable_pub, rust_2018_idioms)]

use core::time::Duration;
use num_traits::float::FloatCore;
#[cfg(feature = "std")]
use std::time::Instant;

/// The error type returned by [`Controller`] operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[non_exhaustive]
pub enum Error {
    /// The refresh interval is unset, or no gain is positive. Call
    /// [`Controller::configure`] before ticking the controller.
    #[cfg_attr(
        feature = "std",
        error("controller gains and refresh interval must be configured before use")
    )]
    NotConfigured,

    /// The PWM output was read while PWM is disabled. Call
    /// [`Controller::enable_pwm`] first, or read the percent output instead.
    #[cfg_attr(
        feature = "std",
        error("the PWM output is only available while PWM is enabled")
    )]
    PwmDisabled,
}

/// A discrete PID controller with an optional PWM duty-cycle output.
///
/// A freshly constructed controller is unconfigured: all gains and the
/// refresh interval are zero, and [`tick`][Controller::tick] fails with
/// [`Error::NotConfigured`] until [`configure`][Controller::configure] has
/// been called with a non-zero refresh interval and at least one positive
/// gain.
///
/// # Examples
///
/// ```
/// use pid_pwm::Controller;
/// use core::time::Duration;
///
/// # fn main() -> Result<(), pid_pwm::Error> {
/// let mut controller = Controller::new();
/// controller.configure(1.0, 0.0, 0.0, Duration::from_secs(1));
/// controller.set_setpoint(50.0);
/// controller.set_feedback(20.0);
///
/// controller.tick(Duration::ZERO)?;          // records the first timestamp
/// controller.tick(Duration::from_secs(1))?;  // recomputes the output
/// assert_eq!(controller.output(), 30.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Controller {
    proportional_gain: f64,
    integral_gain: f64,
    derivative_gain: f64,

    setpoint: f64,
    feedback: f64,
    refresh_interval: Duration,

    last_sample: Option<Duration>,
    last_feedback_sample: f64,
    last_error: f64,

    raw_output: f64,
    output: f64,

    pwm_enabled: bool,
    pwm_cycle_time: Duration,
    pwm_cycle_start: Option<Duration>,
    pwm_output: bool,

    #[cfg(feature = "std")]
    origin: Option<Instant>,
}

impl Controller {
    /// Create a new, unconfigured instance of `Controller`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pid_pwm::Controller;
    ///
    /// let controller = Controller::new();
    /// assert_eq!(controller.output(), 0.0);
    /// ```
    pub const fn new() -> Self {
        Self {
            proportional_gain: 0.0,
            integral_gain: 0.0,
            derivative_gain: 0.0,
            setpoint: 0.0,
            feedback: 0.0,
            refresh_interval: Duration::ZERO,
            last_sample: None,
            last_feedback_sample: 0.0,
            last_error: 0.0,
            raw_output: 0.0,
            output: 0.0,
            pwm_enabled: false,
            pwm_cycle_time: Duration::ZERO,
            pwm_cycle_start: None,
            pwm_output: false,
            #[cfg(feature = "std")]
            origin: None,
        }
    }

    /// Set the gains and the refresh interval.
    ///
    /// The refresh interval is the minimum time between recomputations; calls
    /// to [`tick`][Controller::tick] that arrive sooner leave the output
    /// untouched, decoupling the control rate from the caller's poll rate.
    ///
    /// The values are stored as-is. Validation happens on the next
    /// [`tick`][Controller::tick], which fails unless the refresh interval is
    /// non-zero and at least one of the three gains is positive. Note the
    /// exact boundary: a negative `ki` or `kd` next to a positive `kp` is
    /// accepted.
    ///
    /// # Examples
    ///
    /// ```
    /// use pid_pwm::Controller;
    /// use core::time::Duration;
    ///
    /// let mut controller = Controller::new();
    /// controller.configure(0.0, 0.0, 0.0, Duration::ZERO); // stored, but..
    /// assert!(controller.tick(Duration::ZERO).is_err());   // ..rejected here
    /// ```
    pub fn configure(&mut self, kp: f64, ki: f64, kd: f64, refresh_interval: Duration) {
        self.proportional_gain = kp;
        self.integral_gain = ki;
        self.derivative_gain = kd;
        self.refresh_interval = refresh_interval;
    }

    /// Get the setpoint.
    pub const fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// Set the target value for the controlled variable.
    ///
    /// # Examples
    ///
    /// ```
    /// use pid_pwm::Controller;
    ///
    /// let mut controller = Controller::new();
    /// controller.set_setpoint(60.0);
    /// assert_eq!(controller.setpoint(), 60.0);
    /// ```
    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    /// Get the last reported sensor value.
    pub const fn feedback(&self) -> f64 {
        self.feedback
    }

    /// Report the current sensor value.
    ///
    /// Call this before each [`tick`][Controller::tick]; the stored value is
    /// overwritten every time.
    pub fn set_feedback(&mut self, feedback: f64) {
        self.feedback = feedback;
    }

    /// Get the clamped percent output in `[0, 100]`.
    ///
    /// The value is rounded to two decimal places and only changes when a
    /// tick crosses the refresh interval. Before the first recomputation it
    /// is `0.0`.
    #[must_use = "the percent output does nothing unless applied to the actuator"]
    pub const fn output(&self) -> f64 {
        self.output
    }

    /// Get the unclamped sum of the three control terms from the last
    /// recomputation. Useful to see how far the controller is into
    /// saturation.
    pub const fn raw_output(&self) -> f64 {
        self.raw_output
    }

    /// Enable the PWM adapter.
    ///
    /// While enabled, each [`tick`][Controller::tick] also derives an on/off
    /// signal from the percent output: within every cycle window the signal
    /// is on for `output()`% of the configured cycle time, then off for the
    /// remainder. The cycle time must be set before the next tick.
    ///
    /// # Examples
    ///
    /// ```
    /// use pid_pwm::Controller;
    /// use core::time::Duration;
    ///
    /// # fn main() -> Result<(), pid_pwm::Error> {
    /// let mut controller = Controller::new();
    /// controller.configure(1.0, 0.0, 0.0, Duration::from_secs(1));
    /// controller.set_setpoint(100.0);
    /// controller.enable_pwm();
    /// controller.set_pwm_cycle_time(Duration::from_secs(2));
    ///
    /// controller.tick(Duration::ZERO)?;
    /// controller.tick(Duration::from_secs(1))?; // full output: duty covers the cycle
    /// assert!(controller.pwm_output()?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn enable_pwm(&mut self) {
        self.pwm_enabled = true;
    }

    /// Disable the PWM adapter. The stored PWM signal drops to off
    /// immediately.
    pub fn disable_pwm(&mut self) {
        self.pwm_enabled = false;
        self.pwm_output = false;
    }

    /// Whether the PWM adapter is enabled.
    pub const fn pwm_enabled(&self) -> bool {
        self.pwm_enabled
    }

    /// Set the length of one PWM cycle window.
    pub fn set_pwm_cycle_time(&mut self, cycle_time: Duration) {
        self.pwm_cycle_time = cycle_time;
    }

    /// Get the PWM on/off signal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PwmDisabled`] while PWM is disabled. The readback is
    /// deliberately not a silent always-off fallback: a caller driving a
    /// switched actuator must opt into PWM mode explicitly.
    pub fn pwm_output(&self) -> Result<bool, Error> {
        if !self.pwm_enabled {
            return Err(Error::PwmDisabled);
        }
        Ok(self.pwm_output)
    }

    /// Advance the controller to the given timestamp.
    ///
    /// `now` is the current time measured from any fixed epoch; successive
    /// calls must use monotonically non-decreasing values. The first call
    /// records the timestamp, and a recomputation happens on each later call
    /// where the time since the last recomputation reaches the refresh
    /// interval. Calls in between leave the whole output state untouched.
    ///
    /// While PWM is enabled the on/off signal advances on every call, against
    /// the same timestamp the PID terms see.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConfigured`] when the refresh interval is zero or
    /// no gain is positive, and also when PWM is enabled without a cycle
    /// time. Preconditions are checked up front; a failed call mutates no
    /// state.
    ///
    /// # Panics
    ///
    /// This function may panic if `now` is earlier than a previously supplied
    /// timestamp. Supplying a non-monotonic clock is a caller contract
    /// violation.
    ///
    /// # Examples
    ///
    /// ```
    /// use pid_pwm::Controller;
    /// use core::time::Duration;
    ///
    /// # fn main() -> Result<(), pid_pwm::Error> {
    /// let mut controller = Controller::new();
    /// controller.configure(1.0, 0.0, 0.0, Duration::from_secs(1));
    /// controller.set_setpoint(50.0);
    ///
    /// controller.tick(Duration::ZERO)?;
    /// controller.tick(Duration::from_millis(500))?; // below the interval: no-op
    /// assert_eq!(controller.output(), 0.0);
    /// controller.tick(Duration::from_secs(1))?;
    /// assert_eq!(controller.output(), 50.0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn tick(&mut self, now: Duration) -> Result<(), Error> {
        let configured = !self.refresh_interval.is_zero()
            && (self.proportional_gain > 0.0
                || self.integral_gain > 0.0
                || self.derivative_gain > 0.0);
        if !configured {
            return Err(Error::NotConfigured);
        }
        if self.pwm_enabled && self.pwm_cycle_time.is_zero() {
            return Err(Error::NotConfigured);
        }

        let last_sample = *self.last_sample.get_or_insert(now);
        let time_delta = now - last_sample;
        if time_delta >= self.refresh_interval {
            let dt = time_delta.as_secs_f64();
            let error = self.setpoint - self.feedback;

            let p = self.proportional_gain * error;
            let i = self.integral_gain * (self.last_feedback_sample + self.feedback) * dt / 2.0;
            let d = self.derivative_gain * (error - self.last_error) / dt;

            self.raw_output = p + i + d;
            self.output = if self.raw_output < 0.0 {
                0.0
            } else if self.raw_output > 100.0 {
                100.0
            } else {
                round_hundredths(self.raw_output)
            };

            self.last_error = error;
            self.last_sample = Some(now);
        }

        if self.pwm_enabled {
            let cycle_start = *self.pwm_cycle_start.get_or_insert(now);
            let elapsed = now - cycle_start;
            let on_threshold = self.pwm_cycle_time.mul_f64(self.output / 100.0);
            self.pwm_output = elapsed <= on_threshold;
            // The window always runs its full length, even at low duty.
            if elapsed >= self.pwm_cycle_time {
                self.pwm_cycle_start = Some(now);
            }
        } else {
            self.pwm_output = false;
        }

        Ok(())
    }

    /// Advance the controller against the system clock.
    ///
    /// Equivalent to [`tick`][Controller::tick] with a timestamp taken from
    /// `Instant::now()`; the epoch is seeded on the first call.
    ///
    /// # Errors
    ///
    /// Same as [`tick`][Controller::tick].
    #[cfg(feature = "std")]
    pub fn update(&mut self) -> Result<(), Error> {
        let now = Instant::now();
        let origin = *self.origin.get_or_insert(now);
        self.tick(now.duration_since(origin))
    }

    /// Return the gain and timing state to the unconfigured baseline.
    ///
    /// Gains, the refresh interval and the integral/derivative history are
    /// zeroed, so [`tick`][Controller::tick] fails again until the controller
    /// is reconfigured. The setpoint, feedback and PWM settings are left
    /// alone. Intended for when the physical loop is disabled and later
    /// re-enabled, so stale history cannot corrupt the resumed loop.
    ///
    /// # Examples
    ///
    /// ```
    /// use pid_pwm::Controller;
    /// use core::time::Duration;
    ///
    /// # fn main() -> Result<(), pid_pwm::Error> {
    /// let mut controller = Controller::new();
    /// controller.configure(1.0, 0.0, 0.0, Duration::from_secs(1));
    /// controller.set_setpoint(80.0);
    /// controller.tick(Duration::ZERO)?;
    ///
    /// controller.reset();
    /// assert!(controller.tick(Duration::from_secs(1)).is_err());
    /// assert_eq!(controller.setpoint(), 80.0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn reset(&mut self) {
        self.proportional_gain = 0.0;
        self.integral_gain = 0.0;
        self.derivative_gain = 0.0;
        self.refresh_interval = Duration::ZERO;
        self.last_sample = None;
        self.last_feedback_sample = 0.0;
        self.last_error = 0.0;
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

/// Round to two decimal places, the precision the percent output is
/// reported at.
fn round_hundredths(value: f64) -> f64 {
    FloatCore::round(value * 100.0) / 100.0
}
