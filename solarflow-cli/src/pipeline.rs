use std::collections::BTreeMap;

use bon::Builder;
use chrono::{DateTime, Local};
use solarflow_quantities::Watts;

use crate::{
    config::Config,
    core::{
        aggregator::{FleetSnapshot, UnitSnapshot, aggregate},
        combiner::combine,
        flow::PowerFlow,
        reconciler::reconcile,
        unit::UnitRole,
        validation::JumpGuard,
    },
    energy::{
        integrator::{Integrator, WindowTotals},
        money::Money,
        rates::Rates,
    },
    event::{EnergySummary, EnergyTotals, Emitter, Event, Scope},
    prelude::*,
    reading::Tick,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TickOutcome {
    /// The fleet snapshot has been emitted and integrated.
    Accepted,

    /// The leader could not be read.
    Missed,

    /// The fleet snapshot failed the plausibility checks.
    Rejected,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct Statistics {
    pub n_accepted: usize,
    pub n_missed: usize,
    pub n_rejected: usize,
    pub n_skipped_units: usize,
}

/// Per-tick processing: combine, reconcile, aggregate, validate, emit, and integrate.
#[derive(Builder)]
pub struct Pipeline<E> {
    config: Config,
    emitter: E,

    #[builder(skip)]
    integrators: BTreeMap<Scope, Integrator>,

    #[builder(skip)]
    jump_guard: JumpGuard,

    #[builder(skip)]
    statistics: Statistics,
}

impl<E: Emitter> Pipeline<E> {
    #[instrument(skip_all, fields(timestamp = %tick.timestamp))]
    pub fn on_tick(&mut self, tick: &Tick) -> Result<TickOutcome> {
        for unit in tick.units.keys() {
            if !self.config.units().any(|config| &config.id == unit) {
                debug!(%unit, "ignoring an unconfigured unit");
            }
        }

        let mut units = Vec::with_capacity(1 + self.config.followers.len());
        for config in self.config.units() {
            let Some(readings) = tick.units.get(&config.id) else {
                if config.role == UnitRole::Leader {
                    info!(unit = %config.id, "the leader is missing");
                    self.statistics.n_missed += 1;
                    return Ok(TickOutcome::Missed);
                }
                warn!(unit = %config.id, "the unit is missing, skipping");
                self.statistics.n_skipped_units += 1;
                continue;
            };
            match combine(config, tick.timestamp, readings) {
                Ok(readings) => {
                    let flow = reconcile(&readings);
                    debug!(unit = %readings.unit, timestamp = %readings.timestamp, ?flow, "reconciled");
                    units.push(UnitSnapshot { unit: readings.unit, flow });
                }
                Err(error) if config.role == UnitRole::Leader => {
                    warn!(%error, "failed to combine the leader readings");
                    self.statistics.n_missed += 1;
                    return Ok(TickOutcome::Missed);
                }
                Err(error) => {
                    warn!(%error, "skipping the unit");
                    self.statistics.n_skipped_units += 1;
                }
            }
        }

        let Some(snapshot) = aggregate(tick.timestamp, units) else {
            return Ok(self.on_missed_tick());
        };
        if let Err(error) = snapshot.total.validate(self.config.powerflow.external_production) {
            warn!(%error, "rejecting the fleet snapshot");
            self.statistics.n_rejected += 1;
            return Ok(TickOutcome::Rejected);
        }
        if self.config.powerflow.reject_sudden_pv_jumps
            && self.jump_guard.is_sudden_jump(snapshot.total.pv_production)
        {
            warn!(pv_production = %snapshot.total.pv_production, "rejecting a sudden PV production jump");
            self.statistics.n_rejected += 1;
            return Ok(TickOutcome::Rejected);
        }

        self.emitter.emit(Event::PowerFlow(snapshot.clone()))?;
        self.integrate(&snapshot)?;
        self.statistics.n_accepted += 1;
        Ok(TickOutcome::Accepted)
    }

    /// Nothing to reconcile this tick, the integrators will bridge the gap on the next one.
    pub fn on_missed_tick(&mut self) -> TickOutcome {
        self.statistics.n_missed += 1;
        TickOutcome::Missed
    }

    /// Emit the partially covered windows, and return the final statistics.
    pub fn finish(mut self) -> Result<Statistics> {
        let integrators = std::mem::take(&mut self.integrators);
        for (scope, mut integrator) in integrators {
            if let Some(totals) = integrator.flush() {
                self.emit_window(&scope, totals)?;
            }
        }
        info!(
            n_accepted = self.statistics.n_accepted,
            n_missed = self.statistics.n_missed,
            n_rejected = self.statistics.n_rejected,
            n_skipped_units = self.statistics.n_skipped_units,
            "finished",
        );
        Ok(self.statistics)
    }

    fn integrate(&mut self, snapshot: &FleetSnapshot) -> Result {
        let scopes = std::iter::once((Scope::Fleet, snapshot.total)).chain(
            snapshot.units.iter().map(|unit| (Scope::Unit(unit.unit.clone()), unit.flow)),
        );
        for (scope, flow) in scopes {
            for totals in self.push(&scope, snapshot.timestamp, flow)? {
                self.emit_window(&scope, totals)?;
            }
        }
        Ok(())
    }

    fn push(
        &mut self,
        scope: &Scope,
        timestamp: DateTime<Local>,
        flow: PowerFlow<Watts>,
    ) -> Result<Vec<WindowTotals>> {
        let window = self.config.window;
        self.integrators
            .entry(scope.clone())
            .or_insert_with(|| Integrator::new(window))
            .push(timestamp, flow)
    }

    fn emit_window(&mut self, scope: &Scope, totals: WindowTotals) -> Result {
        info!(
            %scope,
            start = %totals.interval.start,
            covered = ?totals.covered,
            production = %totals.energy.inverter.production,
            consumption = %totals.energy.consumer.total,
            "energy window",
        );
        for (metric, value) in totals.energy.metrics() {
            self.emitter.emit(Event::EnergyTotals(EnergyTotals {
                scope: scope.clone(),
                metric,
                value,
                interval: totals.interval,
            }))?;
        }
        self.emitter.emit(Event::EnergySummary(Box::new(EnergySummary {
            scope: scope.clone(),
            interval: totals.interval,
            covered: totals.covered,
            energy: totals.energy,
            money: self.config.prices.as_ref().map(|prices| Money::new(prices, &totals.energy)),
            self_consumption: Rates::self_consumption(&totals.energy),
            self_sufficiency: Rates::self_sufficiency(&totals.energy),
        })))
    }
}
