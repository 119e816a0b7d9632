//! Events produced for the external consumers.

use chrono::TimeDelta;
use derive_more::Display;
use serde::Serialize;
use serde_with::{DurationSecondsWithFrac, serde_as};
use solarflow_quantities::KilowattHours;
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    core::{aggregator::FleetSnapshot, flow::PowerFlow, interval::Interval, unit::UnitId},
    energy::{money::Money, rates::Rates},
    prelude::*,
};

/// What the energy totals are integrated over.
#[derive(Clone, Debug, Display, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[display("fleet")]
    Fleet,

    #[display("{_0}")]
    Unit(UnitId),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Emitted on every accepted tick.
    PowerFlow(FleetSnapshot),

    /// Emitted per metric at the end of each energy window.
    EnergyTotals(EnergyTotals),

    /// Emitted once per scope at the end of each energy window.
    EnergySummary(Box<EnergySummary>),
}

#[derive(Clone, Debug, Serialize)]
pub struct EnergyTotals {
    pub scope: Scope,
    pub metric: &'static str,
    pub value: KilowattHours,

    #[serde(flatten)]
    pub interval: Interval,
}

#[serde_as]
#[derive(Clone, Debug, Serialize)]
pub struct EnergySummary {
    pub scope: Scope,

    #[serde(flatten)]
    pub interval: Interval,

    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub covered: TimeDelta,

    pub energy: PowerFlow<KilowattHours>,

    /// Only with the prices configured.
    pub money: Option<Money>,

    pub self_consumption: Rates,
    pub self_sufficiency: Rates,
}

/// Sink for the produced events.
pub trait Emitter {
    fn emit(&mut self, event: Event) -> Result;
}

impl Emitter for UnboundedSender<Event> {
    fn emit(&mut self, event: Event) -> Result {
        self.send(event).context("the event consumer has stopped")
    }
}

impl Emitter for Vec<Event> {
    fn emit(&mut self, event: Event) -> Result {
        self.push(event);
        Ok(())
    }
}
