use solarflow_quantities::Watts;

use crate::core::{
    combiner::UnitReadings,
    flow::{BatteryFlow, ConsumerFlow, GridFlow, InverterFlow, PowerFlow},
};

/// Decompose the raw readings of one unit into a consistent power flow.
///
/// Every output is rounded to whole watts, so the sums below hold exactly. Numeric edge cases
/// never fail, the affected values just fall back to zero.
pub fn reconcile(readings: &UnitReadings) -> PowerFlow<Watts> {
    let inverter_power = readings.inverter.ac_power.round();
    let (production, consumption) = if inverter_power >= Watts::ZERO {
        (inverter_power, Watts::ZERO)
    } else {
        (Watts::ZERO, -inverter_power)
    };

    let battery_sum = readings.batteries.iter().map(|battery| battery.power).sum::<Watts>();
    let battery_power = battery_sum.round();
    let battery = BatteryFlow {
        power: battery_power,
        charge: battery_power.max(Watts::ZERO),
        discharge: (-battery_power).max(Watts::ZERO),
    };

    let dc_power = readings.inverter.dc_power;
    let pv_production = if production > Watts::ZERO {
        (dc_power + battery_sum).round().max(Watts::ZERO)
    } else {
        Watts::ZERO
    };

    // The battery share of the DC bus, zero whenever it cannot be determined.
    let factor = if production > Watts::ZERO && battery.discharge > Watts::ZERO && !dc_power.is_zero()
    {
        (battery.discharge / dc_power).0
    } else {
        0.0
    };
    let battery_production =
        if factor > 0.0 { (production * factor).round().min(production) } else { Watts::ZERO };
    let inverter = InverterFlow {
        power: inverter_power,
        production,
        consumption,
        pv_production: production - battery_production,
        battery_production,
    };

    let grid_power = readings.meters.iter().map(|meter| meter.power).sum::<Watts>().round();
    let grid = GridFlow {
        power: grid_power,
        consumption: (-grid_power).max(Watts::ZERO),
        delivery: grid_power.max(Watts::ZERO),
    };

    let wallbox = readings.wallbox.unwrap_or_default().round();
    let house_raw = (grid_power - inverter_power).abs();
    let evcharger = if house_raw > wallbox { wallbox } else { Watts::ZERO };
    let house = house_raw - evcharger;

    let available = production - grid.delivery;
    let used_pv_production = used_share(inverter.pv_production, available, grid.delivery);
    let used_battery_production = used_share(inverter.battery_production, available, grid.delivery);
    let consumer = ConsumerFlow {
        house,
        evcharger,
        inverter: consumption,
        total: house + evcharger + consumption,
        used_production: used_pv_production + used_battery_production,
        used_pv_production,
        used_battery_production,
    };

    PowerFlow { pv_production, inverter, battery, grid, consumer }
}

/// Part of a produced amount that stayed on site rather than being delivered to the grid.
fn used_share(produced: Watts, available: Watts, delivery: Watts) -> Watts {
    let used = if produced <= available { produced } else { produced - delivery };
    used.max(Watts::ZERO)
}

#[cfg(test)]
mod tests {
    use chrono::Local;

    use super::*;
    use crate::{
        core::unit::UnitId,
        reading::{BatteryReading, InverterReading, MeterReading},
    };

    fn readings(
        ac_power: f64,
        dc_power: f64,
        batteries: &[f64],
        meters: &[f64],
        wallbox: Option<f64>,
    ) -> UnitReadings {
        UnitReadings {
            unit: UnitId::from("leader"),
            timestamp: Local::now(),
            inverter: InverterReading {
                ac_power: Watts::from(ac_power),
                dc_power: Watts::from(dc_power),
                status: None,
            },
            meters: meters
                .iter()
                .enumerate()
                .map(|(slot, power)| MeterReading { slot, power: Watts::from(*power) })
                .collect(),
            batteries: batteries
                .iter()
                .enumerate()
                .map(|(slot, power)| BatteryReading {
                    slot,
                    power: Watts::from(*power),
                    state_of_charge: None,
                })
                .collect(),
            wallbox: wallbox.map(Watts::from),
        }
    }

    fn assert_invariants(flow: &PowerFlow<Watts>) {
        assert_eq!(
            flow.consumer.total,
            flow.consumer.house + flow.consumer.evcharger + flow.consumer.inverter,
        );
        assert!(flow.consumer.used_production <= flow.inverter.production);
        for (name, value) in flow.metrics() {
            if !name.ends_with("_power") {
                assert!(value >= Watts::ZERO, "{name} = {value:?}");
            }
        }
    }

    #[test]
    fn test_grid_import() {
        let flow = reconcile(&readings(3000.0, 3000.0, &[0.0], &[-1200.0], Some(0.0)));
        assert_eq!(flow.pv_production, Watts::from(3000));
        assert_eq!(flow.inverter.production, Watts::from(3000));
        assert_eq!(flow.inverter.pv_production, Watts::from(3000));
        assert_eq!(flow.grid.delivery, Watts::ZERO);
        assert_eq!(flow.grid.consumption, Watts::from(1200));
        assert_eq!(flow.consumer.house, Watts::from(4200));
        assert_eq!(flow.consumer.evcharger, Watts::ZERO);
        assert_eq!(flow.consumer.total, Watts::from(4200));
        assert_eq!(flow.consumer.used_pv_production, Watts::from(3000));
        assert_invariants(&flow);
    }

    #[test]
    fn test_battery_discharge() {
        let flow = reconcile(&readings(1000.0, 200.0, &[-800.0], &[500.0], None));
        assert_eq!(flow.pv_production, Watts::ZERO);
        assert_eq!(flow.battery.discharge, Watts::from(800));
        assert_eq!(flow.battery.charge, Watts::ZERO);
        assert_eq!(flow.inverter.battery_production, Watts::from(1000));
        assert_eq!(flow.inverter.pv_production, Watts::ZERO);
        assert_eq!(flow.grid.delivery, Watts::from(500));
        assert_eq!(flow.consumer.used_battery_production, Watts::from(500));
        assert_eq!(flow.consumer.house, Watts::from(500));
        assert_invariants(&flow);
    }

    #[test]
    fn test_zero_dc_power() {
        let flow = reconcile(&readings(300.0, 0.0, &[-500.0], &[], None));
        assert_eq!(flow.inverter.battery_production, Watts::ZERO);
        assert_eq!(flow.inverter.pv_production, Watts::from(300));
        assert_invariants(&flow);
    }

    #[test]
    fn test_negative_dc_power() {
        let flow = reconcile(&readings(300.0, -100.0, &[-500.0], &[], None));
        assert_eq!(flow.inverter.battery_production, Watts::ZERO);
        assert_invariants(&flow);
    }

    #[test]
    fn test_idle_inverter() {
        let flow = reconcile(&readings(0.0, 50.0, &[-400.0], &[-400.0], None));
        assert_eq!(flow.pv_production, Watts::ZERO);
        assert_eq!(flow.inverter.production, Watts::ZERO);
        assert_eq!(flow.inverter.consumption, Watts::ZERO);
        assert_eq!(flow.inverter.pv_production, Watts::ZERO);
        assert_eq!(flow.inverter.battery_production, Watts::ZERO);
        assert_eq!(flow.consumer.used_production, Watts::ZERO);
        assert_eq!(flow.consumer.inverter, Watts::ZERO);
        assert_invariants(&flow);
    }

    #[test]
    fn test_pv_production_is_rounded_once() {
        let flow = reconcile(&readings(100.0, 100.4, &[0.4], &[], None));
        assert_eq!(flow.pv_production, Watts::from(101));
        assert_eq!(flow.battery.power, Watts::ZERO);
    }

    #[test]
    fn test_tiny_inverter_draw_is_not_negative_zero() -> crate::prelude::Result {
        let flow = reconcile(&readings(-0.3, 0.0, &[], &[], None));
        assert!(flow.inverter.power.is_zero());
        assert!(flow.inverter.production.is_zero());
        assert!(flow.inverter.consumption.is_zero());

        let value = serde_json::to_value(flow)?;
        for field in ["power", "production", "consumption"] {
            let watts = value["inverter"][field].as_f64();
            assert!(watts.is_some_and(f64::is_sign_positive), "{field}: {watts:?}");
        }
        Ok(())
    }

    #[test]
    fn test_inverter_consumption() {
        let flow = reconcile(&readings(-35.4, 0.0, &[1500.0], &[-1600.0], None));
        assert_eq!(flow.inverter.power, Watts::from(-35));
        assert_eq!(flow.inverter.consumption, Watts::from(35));
        assert_eq!(flow.consumer.inverter, Watts::from(35));
        assert_eq!(flow.battery.charge, Watts::from(1500));
        assert_eq!(flow.consumer.total, Watts::from(1565) + Watts::from(35));
        assert_invariants(&flow);
    }

    #[test]
    fn test_evcharger_attributed() {
        let flow = reconcile(&readings(2000.0, 2000.0, &[], &[-5000.0], Some(4000.0)));
        assert_eq!(flow.consumer.evcharger, Watts::from(4000));
        assert_eq!(flow.consumer.house, Watts::from(3000));
        assert_eq!(flow.consumer.total, Watts::from(7000));
        assert_invariants(&flow);
    }

    #[test]
    fn test_evcharger_exceeding_house_is_dropped() {
        let flow = reconcile(&readings(2000.0, 2000.0, &[], &[-1000.0], Some(3500.0)));
        assert_eq!(flow.consumer.evcharger, Watts::ZERO);
        assert_eq!(flow.consumer.house, Watts::from(3000));
        assert_invariants(&flow);
    }

    #[test]
    fn test_multiple_meters_and_batteries() {
        let flow = reconcile(&readings(4000.0, 4600.0, &[300.0, 300.4], &[700.0, -200.0], None));
        assert_eq!(flow.battery.power, Watts::from(600));
        assert_eq!(flow.pv_production, Watts::from(5200));
        assert_eq!(flow.grid.power, Watts::from(500));
        assert_eq!(flow.grid.delivery, Watts::from(500));
        assert_eq!(flow.consumer.house, Watts::from(3500));
        assert_eq!(flow.consumer.used_pv_production, Watts::from(3500));
        assert_invariants(&flow);
    }

    #[test]
    fn test_missing_meters_and_batteries() {
        let flow = reconcile(&readings(1234.6, 1300.0, &[], &[], None));
        assert_eq!(flow.inverter.production, Watts::from(1235));
        assert_eq!(flow.grid.power, Watts::ZERO);
        assert_eq!(flow.consumer.house, Watts::from(1235));
        assert_invariants(&flow);
    }
}
