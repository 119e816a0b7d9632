use chrono::{DateTime, Local};
use serde::Serialize;
use solarflow_quantities::Watts;

use crate::core::{flow::PowerFlow, unit::UnitId};

/// Reconciled power flow of a single unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnitSnapshot {
    pub unit: UnitId,

    #[serde(flatten)]
    pub flow: PowerFlow<Watts>,
}

/// Whole-fleet view of one tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FleetSnapshot {
    pub timestamp: DateTime<Local>,

    /// Field-wise sum over [`FleetSnapshot::units`].
    pub total: PowerFlow<Watts>,

    /// Only the units that were read successfully, ordered by their names.
    pub units: Vec<UnitSnapshot>,
}

/// Sum the unit snapshots into a fleet snapshot, or [`None`] when no unit is available.
pub fn aggregate(timestamp: DateTime<Local>, mut units: Vec<UnitSnapshot>) -> Option<FleetSnapshot> {
    if units.is_empty() {
        return None;
    }
    units.sort_by(|lhs, rhs| lhs.unit.cmp(&rhs.unit));
    let total = units.iter().map(|snapshot| snapshot.flow).sum();
    Some(FleetSnapshot { timestamp, total, units })
}
