//! Merges the per-component readings of one unit into a single record.

use chrono::{DateTime, Local};
use solarflow_quantities::Watts;

use crate::{
    config::UnitConfig,
    core::unit::UnitId,
    prelude::*,
    reading::{BatteryReading, ComponentReading, InvalidReading, InverterReading, MeterReading},
};

#[derive(Debug, thiserror::Error)]
pub enum CombineError {
    #[error("unit `{0}` did not report its inverter")]
    MissingInverter(UnitId),

    #[error("unit `{unit}` reported an invalid inverter reading")]
    InvalidInverter {
        unit: UnitId,

        #[source]
        source: InvalidReading,
    },
}

/// Complete reading of one unit at one instant.
#[derive(Clone, Debug)]
pub struct UnitReadings {
    pub unit: UnitId,
    pub timestamp: DateTime<Local>,
    pub inverter: InverterReading,

    /// Only from enabled and responsive slots.
    pub meters: Vec<MeterReading>,

    /// Only from enabled and responsive slots.
    pub batteries: Vec<BatteryReading>,

    /// Only set for the unit with the EV charger.
    pub wallbox: Option<Watts>,
}

/// Combine the raw readings of a single unit.
///
/// A missing or invalid inverter fails the whole unit. A disabled, unknown, duplicated, or
/// invalid meter, battery, or wallbox reading is dropped, and the unit is combined without it.
#[instrument(skip_all, fields(unit = %config.id))]
pub fn combine(
    config: &UnitConfig,
    timestamp: DateTime<Local>,
    readings: &[ComponentReading],
) -> Result<UnitReadings, CombineError> {
    let mut inverter = None;
    let mut meters: Vec<MeterReading> = Vec::new();
    let mut batteries: Vec<BatteryReading> = Vec::new();
    let mut wallbox = None;

    for reading in readings {
        let component = reading.component();
        match reading {
            ComponentReading::Inverter(reading) => {
                if inverter.is_some() {
                    warn!(%component, "duplicate reading, keeping the first one");
                    continue;
                }
                if let Err(source) = ComponentReading::Inverter(*reading).validate() {
                    return Err(CombineError::InvalidInverter { unit: config.id.clone(), source });
                }
                trace!(status = ?reading.status, "inverter");
                inverter = Some(*reading);
                continue;
            }
            ComponentReading::Meter(meter) => {
                if !config.meters.get(meter.slot).copied().unwrap_or(false) {
                    debug!(%component, "slot is disabled or unknown, ignoring");
                    continue;
                }
                if meters.iter().any(|known| known.slot == meter.slot) {
                    warn!(%component, "duplicate reading, keeping the first one");
                    continue;
                }
            }
            ComponentReading::Battery(battery) => {
                if !config.batteries.get(battery.slot).copied().unwrap_or(false) {
                    debug!(%component, "slot is disabled or unknown, ignoring");
                    continue;
                }
                if batteries.iter().any(|known| known.slot == battery.slot) {
                    warn!(%component, "duplicate reading, keeping the first one");
                    continue;
                }
            }
            ComponentReading::Wallbox(_) => {
                if !config.has_wallbox {
                    debug!(%component, "no wallbox is attached to this unit, ignoring");
                    continue;
                }
                if wallbox.is_some() {
                    warn!(%component, "duplicate reading, keeping the first one");
                    continue;
                }
            }
        }

        if let Err(error) = reading.validate() {
            warn!(%component, %error, "dropping invalid reading");
            continue;
        }
        match reading {
            ComponentReading::Meter(meter) => meters.push(*meter),
            ComponentReading::Battery(battery) => batteries.push(*battery),
            ComponentReading::Wallbox(reading) => wallbox = Some(reading.power),
            ComponentReading::Inverter(_) => {}
        }
    }

    let inverter = inverter.ok_or_else(|| CombineError::MissingInverter(config.id.clone()))?;
    meters.sort_by_key(|meter| meter.slot);
    batteries.sort_by_key(|battery| battery.slot);
    trace!(n_meters = meters.len(), n_batteries = batteries.len(), "combined");
    Ok(UnitReadings { unit: config.id.clone(), timestamp, inverter, meters, batteries, wallbox })
}
