//! Plausibility checks on the reconciled fleet snapshot.

use solarflow_quantities::Watts;

use crate::core::flow::PowerFlow;

/// Signed metrics, everything else must be non-negative.
const SIGNED_METRICS: [&str; 3] = ["inverter_power", "battery_power", "grid_power"];

/// PV production coming straight from zero above this is a glitch rather than a sunrise.
const MAX_PV_JUMP: Watts = Watts::new(100.0);

#[derive(Debug, thiserror::Error)]
pub enum InvalidFlow {
    #[error("`{metric}` is negative: {value}")]
    Negative { metric: &'static str, value: Watts },

    #[error("consumer total {total} does not add up to {sum}")]
    ConsumerTotalMismatch { total: Watts, sum: Watts },

    #[error("used production {used} exceeds the inverter production {production}")]
    UsedProductionExceeded { used: Watts, production: Watts },

    #[error("grid delivery {delivery} exceeds the inverter production {production}")]
    DeliveryExceedsProduction { delivery: Watts, production: Watts },
}

impl PowerFlow<Watts> {
    /// Check the invariants of a power snapshot.
    ///
    /// With `external_production`, another producer sits behind the grid meter, and the grid
    /// delivery may legitimately exceed the inverter production.
    pub fn validate(&self, external_production: bool) -> Result<(), InvalidFlow> {
        for (metric, value) in self.metrics() {
            if value < Watts::ZERO && !SIGNED_METRICS.contains(&metric) {
                return Err(InvalidFlow::Negative { metric, value });
            }
        }

        let consumer = &self.consumer;
        let sum = consumer.house + consumer.evcharger + consumer.inverter;
        if consumer.total != sum {
            return Err(InvalidFlow::ConsumerTotalMismatch { total: consumer.total, sum });
        }

        let production = self.inverter.production;
        if consumer.used_production > production {
            return Err(InvalidFlow::UsedProductionExceeded {
                used: consumer.used_production,
                production,
            });
        }
        if !external_production && self.grid.delivery > production {
            return Err(InvalidFlow::DeliveryExceedsProduction {
                delivery: self.grid.delivery,
                production,
            });
        }

        Ok(())
    }
}

/// Remembers the PV production of the previous snapshot to catch sudden jumps.
#[derive(Default)]
pub struct JumpGuard {
    last_pv_production: Option<Watts>,
}

impl JumpGuard {
    /// Check the production against the previous one, and remember it for the next check.
    ///
    /// A rejected production is remembered too, so that a glitch costs exactly one snapshot.
    #[must_use]
    pub fn is_sudden_jump(&mut self, pv_production: Watts) -> bool {
        self.last_pv_production
            .replace(pv_production)
            .is_some_and(|last| last.is_zero() && pv_production > MAX_PV_JUMP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flow::{ConsumerFlow, GridFlow, InverterFlow};

    fn flow() -> PowerFlow<Watts> {
        PowerFlow {
            pv_production: Watts::from(2000),
            inverter: InverterFlow {
                power: Watts::from(2000),
                production: Watts::from(2000),
                pv_production: Watts::from(2000),
                ..Default::default()
            },
            grid: GridFlow {
                power: Watts::from(500),
                consumption: Watts::ZERO,
                delivery: Watts::from(500),
            },
            consumer: ConsumerFlow {
                house: Watts::from(1500),
                total: Watts::from(1500),
                used_production: Watts::from(1500),
                used_pv_production: Watts::from(1500),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_valid() {
        assert!(flow().validate(false).is_ok());
    }

    #[test]
    fn test_signed_metrics_may_be_negative() {
        let mut flow = flow();
        flow.grid.power = Watts::from(-500);
        flow.battery.power = Watts::from(-100);
        assert!(flow.validate(false).is_ok());
    }

    #[test]
    fn test_negative() {
        let mut flow = flow();
        flow.battery.charge = Watts::from(-1);
        assert!(matches!(
            flow.validate(false),
            Err(InvalidFlow::Negative { metric: "battery_charge", .. }),
        ));
    }

    #[test]
    fn test_consumer_total_mismatch() {
        let mut flow = flow();
        flow.consumer.total = Watts::from(1501);
        assert!(matches!(flow.validate(false), Err(InvalidFlow::ConsumerTotalMismatch { .. })));
    }

    #[test]
    fn test_used_production_exceeded() {
        let mut flow = flow();
        flow.consumer.used_production = Watts::from(2001);
        assert!(matches!(flow.validate(false), Err(InvalidFlow::UsedProductionExceeded { .. })));
    }

    #[test]
    fn test_delivery_exceeds_production() {
        let mut flow = flow();
        flow.grid.power = Watts::from(2500);
        flow.grid.delivery = Watts::from(2500);
        assert!(matches!(
            flow.validate(false),
            Err(InvalidFlow::DeliveryExceedsProduction { .. }),
        ));
        assert!(flow.validate(true).is_ok());
    }

    #[test]
    fn test_jump_guard() {
        let mut guard = JumpGuard::default();
        assert!(!guard.is_sudden_jump(Watts::from(5000)), "nothing to compare with yet");
        assert!(!guard.is_sudden_jump(Watts::ZERO));
        assert!(!guard.is_sudden_jump(Watts::from(100)));
        assert!(!guard.is_sudden_jump(Watts::from(50)));
        assert!(!guard.is_sudden_jump(Watts::from(3000)));
    }

    #[test]
    fn test_jump_guard_rejects_a_glitch_once() {
        let mut guard = JumpGuard::default();
        assert!(!guard.is_sudden_jump(Watts::ZERO));
        assert!(guard.is_sudden_jump(Watts::from(2000)));
        assert!(!guard.is_sudden_jump(Watts::from(2000)));
        assert!(!guard.is_sudden_jump(Watts::from(2100)));
    }
}
