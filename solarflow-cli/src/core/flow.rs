use std::{
    iter::Sum,
    ops::{Add, Mul},
};

use derive_more::{Add, AddAssign, Sub};
use serde::Serialize;

/// Reconciled power flow of a unit or of the whole fleet.
///
/// `PowerFlow<Watts>` is an instantaneous snapshot, `PowerFlow<KilowattHours>` holds energy
/// integrated over a window. Everything is non-negative except the signed `power` fields.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Add, AddAssign, Sub)]
pub struct PowerFlow<T> {
    /// Panel output without the battery contribution.
    pub pv_production: T,

    pub inverter: InverterFlow<T>,
    pub battery: BatteryFlow<T>,
    pub grid: GridFlow<T>,
    pub consumer: ConsumerFlow<T>,
}

#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Add, AddAssign, Sub)]
pub struct InverterFlow<T> {
    /// Signed AC power, negative when the inverter draws from the AC side.
    pub power: T,

    pub production: T,
    pub consumption: T,

    /// Part of the production sourced from the panels.
    pub pv_production: T,

    /// Part of the production sourced from the batteries.
    pub battery_production: T,
}

#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Add, AddAssign, Sub)]
pub struct BatteryFlow<T> {
    /// Signed, positive while charging.
    pub power: T,

    pub charge: T,
    pub discharge: T,
}

#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Add, AddAssign, Sub)]
pub struct GridFlow<T> {
    /// Signed, negative while importing.
    pub power: T,

    /// Import from the grid.
    pub consumption: T,

    /// Export to the grid.
    pub delivery: T,
}

#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Add, AddAssign, Sub)]
pub struct ConsumerFlow<T> {
    pub house: T,
    pub evcharger: T,
    pub inverter: T,

    /// Always `house + evcharger + inverter`.
    pub total: T,

    /// Always `used_pv_production + used_battery_production`.
    pub used_production: T,

    pub used_pv_production: T,
    pub used_battery_production: T,
}

impl<T: Copy> PowerFlow<T> {
    /// Flat view with the metric names used by the downstream consumers.
    pub fn metrics(&self) -> [(&'static str, T); 19] {
        [
            ("pv_production", self.pv_production),
            ("inverter_power", self.inverter.power),
            ("inverter_production", self.inverter.production),
            ("inverter_consumption", self.inverter.consumption),
            ("inverter_pv_production", self.inverter.pv_production),
            ("inverter_battery_production", self.inverter.battery_production),
            ("battery_power", self.battery.power),
            ("battery_charge", self.battery.charge),
            ("battery_discharge", self.battery.discharge),
            ("grid_power", self.grid.power),
            ("grid_consumption", self.grid.consumption),
            ("grid_delivery", self.grid.delivery),
            ("consumer_house", self.consumer.house),
            ("consumer_evcharger", self.consumer.evcharger),
            ("consumer_inverter", self.consumer.inverter),
            ("consumer_total", self.consumer.total),
            ("consumer_used_production", self.consumer.used_production),
            ("consumer_used_pv_production", self.consumer.used_pv_production),
            ("consumer_used_battery_production", self.consumer.used_battery_production),
        ]
    }
}

impl<T: Default + Add<Output = T>> Sum for PowerFlow<T> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<T: Mul<Rhs>, Rhs: Copy> Mul<Rhs> for PowerFlow<T> {
    type Output = PowerFlow<<T as Mul<Rhs>>::Output>;

    fn mul(self, rhs: Rhs) -> Self::Output {
        PowerFlow {
            pv_production: self.pv_production * rhs,
            inverter: self.inverter * rhs,
            battery: self.battery * rhs,
            grid: self.grid * rhs,
            consumer: self.consumer * rhs,
        }
    }
}

impl<T: Mul<Rhs>, Rhs: Copy> Mul<Rhs> for InverterFlow<T> {
    type Output = InverterFlow<<T as Mul<Rhs>>::Output>;

    fn mul(self, rhs: Rhs) -> Self::Output {
        InverterFlow {
            power: self.power * rhs,
            production: self.production * rhs,
            consumption: self.consumption * rhs,
            pv_production: self.pv_production * rhs,
            battery_production: self.battery_production * rhs,
        }
    }
}

impl<T: Mul<Rhs>, Rhs: Copy> Mul<Rhs> for BatteryFlow<T> {
    type Output = BatteryFlow<<T as Mul<Rhs>>::Output>;

    fn mul(self, rhs: Rhs) -> Self::Output {
        BatteryFlow {
            power: self.power * rhs,
            charge: self.charge * rhs,
            discharge: self.discharge * rhs,
        }
    }
}

impl<T: Mul<Rhs>, Rhs: Copy> Mul<Rhs> for GridFlow<T> {
    type Output = GridFlow<<T as Mul<Rhs>>::Output>;

    fn mul(self, rhs: Rhs) -> Self::Output {
        GridFlow {
            power: self.power * rhs,
            consumption: self.consumption * rhs,
            delivery: self.delivery * rhs,
        }
    }
}

impl<T: Mul<Rhs>, Rhs: Copy> Mul<Rhs> for ConsumerFlow<T> {
    type Output = ConsumerFlow<<T as Mul<Rhs>>::Output>;

    fn mul(self, rhs: Rhs) -> Self::Output {
        ConsumerFlow {
            house: self.house * rhs,
            evcharger: self.evcharger * rhs,
            inverter: self.inverter * rhs,
            total: self.total * rhs,
            used_production: self.used_production * rhs,
            used_pv_production: self.used_pv_production * rhs,
            used_battery_production: self.used_battery_production * rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use solarflow_quantities::{KilowattHours, Watts};

    use super::*;

    #[test]
    fn test_metrics_follow_fields() {
        let mut flow = PowerFlow::<Watts>::default();
        flow.consumer.used_battery_production = Watts::from(42);
        let metrics = flow.metrics();
        assert_eq!(metrics[18], ("consumer_used_battery_production", Watts::from(42)));
        assert!(metrics[..18].iter().all(|(_, value)| value.is_zero()));
    }

    #[test]
    fn test_power_over_time() {
        let mut flow = PowerFlow::<Watts>::default();
        flow.grid.power = Watts::from(-2000);
        flow.grid.consumption = Watts::from(2000);
        let energy = flow * TimeDelta::minutes(15);
        assert_eq!(energy.grid.consumption, KilowattHours::from(0.5));
        assert_eq!(energy.grid.power, KilowattHours::from(-0.5));
        assert!(energy.grid.delivery.is_zero());
    }

    #[test]
    fn test_sum_of_nothing_is_zero() {
        let total: PowerFlow<Watts> = std::iter::empty().sum();
        assert_eq!(total, PowerFlow::default());
    }
}
