use chrono::{DateTime, DurationRound, Local, TimeDelta};
use derive_more::AddAssign;
use serde::Serialize;
use solarflow_quantities::{KilowattHours, Watts};

use crate::{
    core::{flow::PowerFlow, interval::Interval},
    prelude::*,
};

/// Energy integrated so far, along with the time it covers.
#[derive(Copy, Clone, Debug, Default, AddAssign)]
pub struct EnergyAccumulator {
    pub time: TimeDelta,
    pub energy: PowerFlow<KilowattHours>,
}

/// Energy of one completed window.
#[must_use]
#[derive(Copy, Clone, Debug, Serialize)]
pub struct WindowTotals {
    pub interval: Interval,

    /// Time actually covered by samples, shorter than the window after a start-up or an outage.
    #[serde(skip)]
    pub covered: TimeDelta,

    pub energy: PowerFlow<KilowattHours>,
}

#[derive(Copy, Clone)]
struct Sample {
    timestamp: DateTime<Local>,
    power: PowerFlow<Watts>,
}

/// Trapezoidal integrator of power snapshots over aligned windows.
///
/// Uses the actual time between the samples, so a missed tick is bridged by the next one.
pub struct Integrator {
    window: TimeDelta,
    interval: Option<Interval>,
    accumulator: EnergyAccumulator,
    last_sample: Option<Sample>,
}

impl Integrator {
    pub fn new(window: TimeDelta) -> Self {
        Self { window, interval: None, accumulator: EnergyAccumulator::default(), last_sample: None }
    }

    /// Add the next snapshot, and return the windows it has completed.
    pub fn push(
        &mut self,
        timestamp: DateTime<Local>,
        power: PowerFlow<Watts>,
    ) -> Result<Vec<WindowTotals>> {
        let (Some(mut interval), Some(last_sample)) = (self.interval, self.last_sample) else {
            let start = timestamp
                .duration_trunc(self.window)
                .with_context(|| format!("failed to align `{timestamp}` to the energy window"))?;
            self.interval = Some(Interval::new(start, start + self.window));
            self.last_sample = Some(Sample { timestamp, power });
            return Ok(Vec::new());
        };

        if timestamp <= last_sample.timestamp {
            warn!(%timestamp, last = %last_sample.timestamp, "ignoring an out-of-order sample");
            return Ok(Vec::new());
        }

        let mut completed = Vec::new();
        let mut from = last_sample;
        while timestamp >= interval.end {
            // Split the segment at the window boundary.
            let fraction = (interval.end - from.timestamp).as_seconds_f64()
                / (timestamp - from.timestamp).as_seconds_f64();
            let boundary =
                Sample { timestamp: interval.end, power: from.power + (power - from.power) * fraction };
            self.accumulate(from, boundary);
            completed.push(self.complete(interval));
            interval = interval.next();
            from = boundary;
        }
        self.accumulate(from, Sample { timestamp, power });

        self.interval = Some(interval);
        self.last_sample = Some(Sample { timestamp, power });
        Ok(completed)
    }

    /// Complete the current partial window, if any sample has been integrated into it.
    pub fn flush(&mut self) -> Option<WindowTotals> {
        let interval = self.interval?;
        if self.accumulator.time.is_zero() {
            return None;
        }
        Some(self.complete(interval))
    }

    fn accumulate(&mut self, from: Sample, to: Sample) {
        let time = to.timestamp - from.timestamp;
        self.accumulator += EnergyAccumulator { time, energy: (from.power + to.power) * 0.5 * time };
    }

    fn complete(&mut self, interval: Interval) -> WindowTotals {
        let accumulator = std::mem::take(&mut self.accumulator);
        debug!(?interval, covered = ?accumulator.time, "completed the energy window");
        WindowTotals { interval, covered: accumulator.time, energy: accumulator.energy }
    }
}
