//! Playback driver
//!
//! Turns elapsed time into frame indices and drives the controller once per
//! tick: `decode(frame)` followed by `get_image()`.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use super::MovieController;
use crate::native::Status;
use crate::utils::config::PlaybackConfig;

/// Elapsed-time counter that picks the frame for each tick.
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    /// Seconds since the start of the current loop
    elapsed: f64,

    /// Wrap to frame 0 at the end instead of finishing
    looping: bool,
}

/// Result of advancing a [`PlaybackClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockTick {
    Frame(i32),
    Finished,
}

impl PlaybackClock {
    pub fn new(looping: bool) -> Self {
        Self { elapsed: 0.0, looping }
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }

    /// Frame for the current time, then advance by `delta`.
    ///
    /// Once the frame reaches `total_frames` the clock wraps to frame 0, or
    /// reports [`ClockTick::Finished`] when not looping.
    pub fn advance(&mut self, delta: Duration, frame_rate: f32, total_frames: u32) -> ClockTick {
        let frame = (self.elapsed * frame_rate as f64).floor() as i64;
        self.elapsed += delta.as_secs_f64();

        // frames past i32::MAX are not addressable by the engine
        match i32::try_from(frame) {
            Ok(frame) if i64::from(frame) < i64::from(total_frames) => ClockTick::Frame(frame),
            _ => {
                self.elapsed = 0.0;
                if self.looping {
                    ClockTick::Frame(0)
                } else {
                    ClockTick::Finished
                }
            }
        }
    }
}

/// What one driver tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickReport {
    /// No movie is open
    Idle,
    /// `decode` ran with `decode` status; `get_image` ran only if it succeeded
    Frame {
        frame: i32,
        decode: Status,
        image: Option<Status>,
    },
    /// The last frame was reached and looping is off
    Finished,
}

/// Per-tick caller of a [`MovieController`].
#[derive(Debug, Clone)]
pub struct PlaybackDriver {
    clock: PlaybackClock,
    tick_interval: Duration,
    max_duration: Option<Duration>,
}

impl PlaybackDriver {
    pub fn new(looping: bool, tick_rate: f64) -> Self {
        Self {
            clock: PlaybackClock::new(looping),
            tick_interval: Duration::from_secs_f64(1.0 / tick_rate.max(f64::EPSILON)),
            max_duration: None,
        }
    }

    pub fn from_config(config: &PlaybackConfig) -> Self {
        let mut driver = Self::new(config.loop_playback, config.tick_rate);
        driver.max_duration = config.max_duration_secs.map(Duration::from_secs_f64);
        driver
    }

    /// Stop [`run`](Self::run) after `duration` of wall time.
    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Run one tick with `delta` elapsed since the previous one.
    pub fn tick(&mut self, controller: &mut MovieController, delta: Duration) -> TickReport {
        if controller.movie_info().is_none() {
            return TickReport::Idle;
        }

        let frame = match self.clock.advance(delta, controller.frame_rate(), controller.total_frames()) {
            ClockTick::Frame(frame) => frame,
            ClockTick::Finished => return TickReport::Finished,
        };

        let decode = status_of(controller.decode(frame));
        let image = decode.is_success().then(|| status_of(controller.get_image()));
        TickReport::Frame { frame, decode, image }
    }

    /// Tick in real time until playback finishes, the maximum duration
    /// passes, or no movie is open. Returns the number of ticks run.
    pub fn run(&mut self, controller: &mut MovieController) -> u64 {
        let started = Instant::now();
        let mut last = started;
        let mut ticks = 0;

        loop {
            if self.max_duration.is_some_and(|max| started.elapsed() >= max) {
                debug!("Playback time limit reached");
                break;
            }

            let now = Instant::now();
            let report = self.tick(controller, now - last);
            last = now;

            match report {
                TickReport::Idle => break,
                TickReport::Finished => {
                    info!("Playback finished");
                    break;
                }
                TickReport::Frame { frame, decode, image } => {
                    ticks += 1;
                    if !decode.is_success() || image.is_some_and(|s| !s.is_success()) {
                        debug!("Tick {} frame {}: decode {}, image {:?}", ticks, frame, decode, image);
                    }
                }
            }

            if let Some(rest) = self.tick_interval.checked_sub(now.elapsed()) {
                thread::sleep(rest);
            }
        }

        ticks
    }
}

fn status_of(result: crate::utils::error::Result<()>) -> Status {
    match result {
        Ok(()) => Status::SUCCESS,
        Err(e) => e.status(),
    }
}
