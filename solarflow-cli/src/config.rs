//! Static configuration, validated once at startup.

use std::{
    collections::HashSet,
    fmt::{Display, Formatter},
    path::Path,
};

use chrono::TimeDelta;
use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use solarflow_quantities::KilowattHourRate;

use crate::{
    core::unit::{UnitId, UnitRole},
    energy::money::Prices,
    prelude::*,
};

pub const MAX_FOLLOWERS: usize = 10;
pub const MAX_METERS: usize = 3;
pub const MAX_BATTERIES: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse the configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unit `{0}` has no host configured")]
    MissingHost(UnitId),

    #[error("unit name `{0}` is used more than once")]
    DuplicateUnit(UnitId),

    #[error("{0} followers are configured, at most 10 are supported")]
    TooManyFollowers(usize),

    #[error("unit `{unit}` lists {count} {kind} slots, at most {max} are supported")]
    TooManySlots { unit: UnitId, kind: &'static str, count: usize, max: usize },

    #[error("the energy window must be at least one whole second, got {0}")]
    InvalidWindow(humantime::Duration),

    #[error("the {0} price must not be negative")]
    NegativePrice(&'static str),

    #[error("a currency is required when a price is configured")]
    MissingCurrency,
}

/// Validated configuration, immutable for the process lifetime.
#[must_use]
#[derive(Clone, Debug)]
pub struct Config {
    pub leader: UnitConfig,
    pub followers: Vec<UnitConfig>,

    /// Energy aggregation window.
    pub window: TimeDelta,

    /// Only set when at least one price is configured.
    pub prices: Option<Prices>,

    pub powerflow: PowerFlowSettings,
}

#[must_use]
#[derive(Clone, Debug)]
pub struct UnitConfig {
    pub id: UnitId,
    pub role: UnitRole,
    pub endpoint: Endpoint,
    pub meters: [bool; MAX_METERS],
    pub batteries: [bool; MAX_BATTERIES],

    /// The EV charger is attached to the leader only.
    pub has_wallbox: bool,
}

/// Where the collector reaches the unit.
#[derive(Clone, Debug)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub unit: u8,
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}#{}", self.host, self.port, self.unit)
    }
}

#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PowerFlowSettings {
    /// Another producer behind the grid meter, so the delivery may exceed the inverter production.
    pub external_production: bool,

    /// Drop a tick where PV production jumps from zero straight to over 100 W.
    pub reject_sudden_pv_jumps: bool,
}

impl Default for PowerFlowSettings {
    fn default() -> Self {
        Self { external_production: false, reject_sudden_pv_jumps: true }
    }
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("invalid configuration in `{}`", path.display()))?;
        info!(
            leader = %config.leader.id,
            n_followers = config.followers.len(),
            window = ?config.window,
            "loaded the configuration",
        );
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str::<Settings>(text)?.validate()
    }

    /// Leader first, then the followers in the configured order.
    pub fn units(&self) -> impl Iterator<Item = &UnitConfig> {
        std::iter::once(&self.leader).chain(&self.followers)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Settings {
    leader: UnitSettings,

    #[serde(default)]
    followers: Vec<UnitSettings>,

    #[serde(default)]
    wallbox: WallboxSettings,

    #[serde(default)]
    energy: EnergySettings,

    #[serde(default)]
    prices: PriceSettings,

    #[serde(default)]
    powerflow: PowerFlowSettings,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct UnitSettings {
    name: Option<String>,
    host: Option<String>,

    #[serde(default = "UnitSettings::default_port")]
    port: u16,

    #[serde(default = "UnitSettings::default_unit")]
    unit: u8,

    /// Missing slots are enabled.
    #[serde(default)]
    meters: Vec<bool>,

    /// Missing slots are enabled.
    #[serde(default)]
    batteries: Vec<bool>,
}

#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct WallboxSettings {
    enabled: bool,
}

#[serde_as]
#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct EnergySettings {
    #[serde_as(as = "DisplayFromStr")]
    window: humantime::Duration,
}

impl Default for EnergySettings {
    fn default() -> Self {
        Self { window: std::time::Duration::from_secs(3600).into() }
    }
}

#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PriceSettings {
    consumption: Option<KilowattHourRate>,
    delivery: Option<KilowattHourRate>,
    currency: Option<String>,
}

impl Settings {
    fn validate(self) -> Result<Config, ConfigError> {
        if self.followers.len() > MAX_FOLLOWERS {
            return Err(ConfigError::TooManyFollowers(self.followers.len()));
        }

        let leader = self.leader.validate(UnitRole::Leader, "leader".into(), self.wallbox.enabled)?;
        let followers = self
            .followers
            .into_iter()
            .enumerate()
            .map(|(index, settings)| {
                let default_name = format!("follower{}", index + 1);
                settings.validate(UnitRole::Follower, default_name, false)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        for unit in std::iter::once(&leader).chain(&followers) {
            if !seen.insert(&unit.id) {
                return Err(ConfigError::DuplicateUnit(unit.id.clone()));
            }
        }

        Ok(Config {
            leader,
            followers,
            window: self.energy.validate()?,
            prices: self.prices.validate()?,
            powerflow: self.powerflow,
        })
    }
}

impl UnitSettings {
    const fn default_port() -> u16 {
        1502
    }

    const fn default_unit() -> u8 {
        1
    }

    fn validate(
        self,
        role: UnitRole,
        default_name: String,
        has_wallbox: bool,
    ) -> Result<UnitConfig, ConfigError> {
        let id = UnitId::from(self.name.unwrap_or(default_name));
        let host = match self.host {
            Some(host) if !host.trim().is_empty() => host,
            _ => return Err(ConfigError::MissingHost(id)),
        };
        let meters = slots::<MAX_METERS>(&id, "meter", &self.meters)?;
        let batteries = slots::<MAX_BATTERIES>(&id, "battery", &self.batteries)?;
        Ok(UnitConfig {
            id,
            role,
            endpoint: Endpoint { host, port: self.port, unit: self.unit },
            meters,
            batteries,
            has_wallbox,
        })
    }
}

/// Expand the configured flags to the fixed slot count, enabling the unlisted slots.
fn slots<const N: usize>(
    unit: &UnitId,
    kind: &'static str,
    flags: &[bool],
) -> Result<[bool; N], ConfigError> {
    if flags.len() > N {
        return Err(ConfigError::TooManySlots {
            unit: unit.clone(),
            kind,
            count: flags.len(),
            max: N,
        });
    }
    let mut slots = [true; N];
    slots[..flags.len()].copy_from_slice(flags);
    Ok(slots)
}

impl EnergySettings {
    fn validate(self) -> Result<TimeDelta, ConfigError> {
        let duration: std::time::Duration = self.window.into();
        if duration.as_secs() == 0 || duration.subsec_nanos() != 0 {
            return Err(ConfigError::InvalidWindow(self.window));
        }
        TimeDelta::from_std(duration).map_err(|_| ConfigError::InvalidWindow(self.window))
    }
}

impl PriceSettings {
    fn validate(self) -> Result<Option<Prices>, ConfigError> {
        for (kind, price) in [("consumption", self.consumption), ("delivery", self.delivery)] {
            if price.is_some_and(|price| price < KilowattHourRate::ZERO) {
                return Err(ConfigError::NegativePrice(kind));
            }
        }
        if self.consumption.is_none() && self.delivery.is_none() {
            return Ok(None);
        }
        let currency = self.currency.ok_or(ConfigError::MissingCurrency)?;
        Ok(Some(Prices { consumption: self.consumption, delivery: self.delivery, currency }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [leader]
        host = "192.168.1.10"
    "#;

    #[test]
    fn test_minimal() -> Result {
        let config = Config::from_toml(MINIMAL)?;
        assert_eq!(config.leader.id, UnitId::from("leader"));
        assert_eq!(config.leader.role, UnitRole::Leader);
        assert_eq!(config.leader.endpoint.to_string(), "192.168.1.10:1502#1");
        assert_eq!(config.leader.meters, [true; 3]);
        assert_eq!(config.leader.batteries, [true; 2]);
        assert!(!config.leader.has_wallbox);
        assert!(config.followers.is_empty());
        assert_eq!(config.window, TimeDelta::hours(1));
        assert!(config.prices.is_none());
        assert!(config.powerflow.reject_sudden_pv_jumps);
        assert!(!config.powerflow.external_production);
        Ok(())
    }

    #[test]
    fn test_full() -> Result {
        let config = Config::from_toml(
            r#"
            [leader]
            host = "192.168.1.10"
            meters = [true, false]
            batteries = [false]

            [[followers]]
            host = "192.168.1.11"
            unit = 2

            [[followers]]
            name = "garage"
            host = "192.168.1.12"
            port = 502

            [wallbox]
            enabled = true

            [energy]
            window = "10min"

            [prices]
            consumption = 0.3
            delivery = 0.08
            currency = "EUR"

            [powerflow]
            external_production = true
            "#,
        )?;
        assert_eq!(config.leader.meters, [true, false, true]);
        assert_eq!(config.leader.batteries, [false, true]);
        assert!(config.leader.has_wallbox);
        assert_eq!(config.followers[0].id, UnitId::from("follower1"));
        assert_eq!(config.followers[0].endpoint.unit, 2);
        assert!(!config.followers[0].has_wallbox);
        assert_eq!(config.followers[1].id, UnitId::from("garage"));
        assert_eq!(config.followers[1].endpoint.port, 502);
        assert_eq!(config.window, TimeDelta::minutes(10));
        assert_eq!(config.units().count(), 3);
        let prices = config.prices.context("prices must be configured")?;
        assert_eq!(prices.currency, "EUR");
        assert_eq!(prices.price_in(), KilowattHourRate::from(0.3));
        assert!(config.powerflow.external_production);
        assert!(config.powerflow.reject_sudden_pv_jumps);
        Ok(())
    }

    #[test]
    fn test_follower_without_host() {
        let result = Config::from_toml(&format!("{MINIMAL}\n[[followers]]\nport = 1502\n"));
        assert!(matches!(result, Err(ConfigError::MissingHost(id)) if id == UnitId::from("follower1")));
    }

    #[test]
    fn test_too_many_followers() {
        let followers = "[[followers]]\nhost = \"10.0.0.2\"\n".repeat(MAX_FOLLOWERS + 1);
        let result = Config::from_toml(&format!("{MINIMAL}\n{followers}"));
        assert!(matches!(result, Err(ConfigError::TooManyFollowers(11))));
    }

    #[test]
    fn test_too_many_meters() {
        let result = Config::from_toml(
            "[leader]\nhost = \"10.0.0.1\"\nmeters = [true, true, true, true]\n",
        );
        assert!(matches!(result, Err(ConfigError::TooManySlots { kind: "meter", count: 4, .. })));
    }

    #[test]
    fn test_duplicate_names() {
        let result = Config::from_toml(&format!(
            "{MINIMAL}\n[[followers]]\nname = \"leader\"\nhost = \"10.0.0.2\"\n"
        ));
        assert!(matches!(result, Err(ConfigError::DuplicateUnit(_))));
    }

    #[test]
    fn test_fractional_window() {
        let result = Config::from_toml(&format!("{MINIMAL}\n[energy]\nwindow = \"1500ms\"\n"));
        assert!(matches!(result, Err(ConfigError::InvalidWindow(_))));
    }

    #[test]
    fn test_price_without_currency() {
        let result = Config::from_toml(&format!("{MINIMAL}\n[prices]\nconsumption = 0.3\n"));
        assert!(matches!(result, Err(ConfigError::MissingCurrency)));
    }

    #[test]
    fn test_negative_price() {
        let result = Config::from_toml(&format!(
            "{MINIMAL}\n[prices]\ndelivery = -0.1\ncurrency = \"EUR\"\n"
        ));
        assert!(matches!(result, Err(ConfigError::NegativePrice("delivery"))));
    }

    #[test]
    fn test_unknown_field() {
        let result = Config::from_toml(&format!("{MINIMAL}\n[wallbox]\nhost = \"10.0.0.5\"\n"));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
