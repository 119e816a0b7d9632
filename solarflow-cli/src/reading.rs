//! Raw component readings as delivered by the collector.

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use solarflow_quantities::Watts;

use crate::core::unit::UnitId;

/// Anything above is a register glitch rather than a residential installation.
const MAX_PLAUSIBLE_POWER: Watts = Watts::new(1_000_000.0);

/// Everything the collector managed to read during one tick.
///
/// A unit that could not be read is simply missing from [`Tick::units`], and so is a component
/// within a unit.
#[derive(Clone, Debug, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Local>,

    #[serde(default)]
    pub units: BTreeMap<UnitId, Vec<ComponentReading>>,
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "component", rename_all = "snake_case")]
pub enum ComponentReading {
    Inverter(InverterReading),
    Meter(MeterReading),
    Battery(BatteryReading),
    Wallbox(WallboxReading),
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize)]
pub struct InverterReading {
    pub ac_power: Watts,

    /// DC bus power, which includes the battery contribution.
    pub dc_power: Watts,

    /// Operating state as reported by the inverter.
    #[serde(default)]
    pub status: Option<u16>,
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize)]
pub struct MeterReading {
    pub slot: usize,

    /// Negative while importing from the grid.
    pub power: Watts,
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize)]
pub struct BatteryReading {
    pub slot: usize,

    /// Positive while charging.
    pub power: Watts,

    #[serde(default)]
    pub state_of_charge: Option<f64>,
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize)]
pub struct WallboxReading {
    pub power: Watts,
}

/// Which physical component a reading belongs to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Component {
    Inverter,
    Meter(usize),
    Battery(usize),
    Wallbox,
}

impl Display for Component {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inverter => write!(f, "inverter"),
            Self::Meter(slot) => write!(f, "meter{}", slot + 1),
            Self::Battery(slot) => write!(f, "battery{}", slot + 1),
            Self::Wallbox => write!(f, "wallbox"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidReading {
    #[error("{field} is not a finite number")]
    NotFinite { field: &'static str },

    #[error("{field} of {value} is implausible")]
    Implausible { field: &'static str, value: Watts },

    #[error("state of charge {0}% is out of range")]
    StateOfCharge(f64),
}

impl ComponentReading {
    pub const fn component(&self) -> Component {
        match self {
            Self::Inverter(_) => Component::Inverter,
            Self::Meter(meter) => Component::Meter(meter.slot),
            Self::Battery(battery) => Component::Battery(battery.slot),
            Self::Wallbox(_) => Component::Wallbox,
        }
    }

    /// Reject readings that cannot come from a working device.
    pub fn validate(&self) -> Result<(), InvalidReading> {
        match self {
            Self::Inverter(inverter) => {
                check_power("ac_power", inverter.ac_power)?;
                check_power("dc_power", inverter.dc_power)
            }
            Self::Meter(meter) => check_power("power", meter.power),
            Self::Battery(battery) => {
                check_power("power", battery.power)?;
                match battery.state_of_charge {
                    Some(soc) if !(0.0..=100.0).contains(&soc) => {
                        Err(InvalidReading::StateOfCharge(soc))
                    }
                    _ => Ok(()),
                }
            }
            Self::Wallbox(wallbox) => {
                check_power("power", wallbox.power)?;
                if wallbox.power < Watts::ZERO {
                    return Err(InvalidReading::Implausible { field: "power", value: wallbox.power });
                }
                Ok(())
            }
        }
    }
}

fn check_power(field: &'static str, value: Watts) -> Result<(), InvalidReading> {
    if !value.is_finite() {
        Err(InvalidReading::NotFinite { field })
    } else if value.abs() > MAX_PLAUSIBLE_POWER {
        Err(InvalidReading::Implausible { field, value })
    } else {
        Ok(())
    }
}
