use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};
use solarflow_quantities::Cost;

use crate::{config::Config, event::EnergySummary};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

pub fn build_units_table(config: &Config) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Unit", "Role", "Endpoint", "Meters", "Batteries", "Wallbox"]);
    for unit in config.units() {
        table.add_row(vec![
            Cell::new(&unit.id).add_attribute(Attribute::Bold),
            Cell::new(unit.role),
            Cell::new(&unit.endpoint).add_attribute(Attribute::Dim),
            Cell::new(format_slots(&unit.meters)),
            Cell::new(format_slots(&unit.batteries)),
            Cell::new(if unit.has_wallbox { "yes" } else { "no" }),
        ]);
    }
    table
}

/// Enabled slots, numbered from one.
fn format_slots(slots: &[bool]) -> String {
    let enabled: Vec<String> = slots
        .iter()
        .enumerate()
        .filter(|(_, enabled)| **enabled)
        .map(|(index, _)| (index + 1).to_string())
        .collect();
    if enabled.is_empty() { "none".to_owned() } else { enabled.join(", ") }
}

pub fn build_energy_table(summaries: &[EnergySummary]) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Date",
        "Start",
        "End",
        "Covered",
        "PV",
        "Production",
        "Consumption",
        "Import",
        "Export",
        "Self-cons.",
        "Self-suff.",
        "Balance",
    ]);
    for summary in summaries {
        let covered = summary.covered.to_std().map_or_else(
            |_| "?".to_owned(),
            |covered| humantime::format_duration(covered).to_string(),
        );
        table.add_row(vec![
            Cell::new(summary.interval.start.format("%b %d")).add_attribute(Attribute::Dim),
            Cell::new(summary.interval.start.format("%H:%M")),
            Cell::new(summary.interval.end.format("%H:%M")).add_attribute(Attribute::Dim),
            Cell::new(covered).set_alignment(CellAlignment::Right).add_attribute(
                if summary.covered < summary.interval.duration() {
                    Attribute::Italic
                } else {
                    Attribute::NormalIntensity
                },
            ),
            Cell::new(summary.energy.pv_production).set_alignment(CellAlignment::Right),
            Cell::new(summary.energy.inverter.production).set_alignment(CellAlignment::Right),
            Cell::new(summary.energy.consumer.total).set_alignment(CellAlignment::Right),
            Cell::new(summary.energy.grid.consumption)
                .set_alignment(CellAlignment::Right)
                .fg(Color::Red),
            Cell::new(summary.energy.grid.delivery)
                .set_alignment(CellAlignment::Right)
                .fg(Color::Green),
            Cell::new(format!("{}%", summary.self_consumption.total))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{}%", summary.self_sufficiency.total))
                .set_alignment(CellAlignment::Right),
            match &summary.money {
                Some(money) => {
                    Cell::new(format!("{} {}", money.balance_total, money.currency))
                        .set_alignment(CellAlignment::Right)
                        .fg(if money.balance_total >= Cost::ZERO { Color::Green } else { Color::Red })
                }
                None => Cell::new("n/a").add_attribute(Attribute::Dim),
            },
        ]);
    }
    table
}
