use serde::Serialize;
use solarflow_quantities::KilowattHours;

use crate::core::flow::PowerFlow;

/// Split of an energy amount by source, in whole percent.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Rates {
    pub grid: i64,
    pub battery: i64,
    pub pv: i64,
    pub total: i64,
}

impl Rates {
    /// Where the inverter production went: delivered to the grid, or used on site from the
    /// batteries or straight from the panels.
    pub fn self_consumption(energy: &PowerFlow<KilowattHours>) -> Self {
        Self::split(
            energy.grid.delivery,
            energy.consumer.used_battery_production,
            energy.inverter.production,
        )
    }

    /// Where the consumed energy came from.
    pub fn self_sufficiency(energy: &PowerFlow<KilowattHours>) -> Self {
        Self::split(
            energy.grid.consumption,
            energy.consumer.used_battery_production,
            energy.consumer.total,
        )
    }

    fn split(grid: KilowattHours, battery: KilowattHours, whole: KilowattHours) -> Self {
        if whole <= KilowattHours::ZERO {
            return Self::default();
        }
        let grid = percent(grid, whole);
        let battery = percent(battery, whole);
        let pv = 100 - grid - battery;
        Self { grid, battery, pv, total: battery + pv }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn percent(part: KilowattHours, whole: KilowattHours) -> i64 {
    ((part / whole).0 * 100.0).round() as i64
}
