use serde::Serialize;
use solarflow_quantities::{Cost, KilowattHourRate, KilowattHours};

use crate::core::flow::PowerFlow;

/// Grid prices, an unconfigured one counts as zero.
#[derive(Clone, Debug)]
pub struct Prices {
    /// What a kilowatt-hour from the grid costs.
    pub consumption: Option<KilowattHourRate>,

    /// What a kilowatt-hour delivered to the grid earns.
    pub delivery: Option<KilowattHourRate>,

    pub currency: String,
}

impl Prices {
    pub fn price_in(&self) -> KilowattHourRate {
        self.consumption.unwrap_or_default()
    }

    pub fn price_out(&self) -> KilowattHourRate {
        self.delivery.unwrap_or_default()
    }
}

/// Earnings and savings over an energy window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Money {
    pub currency: String,

    /// Earned by delivering to the grid.
    pub delivered: Cost,

    /// Not spent thanks to the own production.
    pub saved: Cost,

    /// Spent on the grid consumption.
    pub consumed: Cost,

    pub balance_grid: Cost,
    pub balance_total: Cost,
}

impl Money {
    pub fn new(prices: &Prices, energy: &PowerFlow<KilowattHours>) -> Self {
        let delivered = energy.grid.delivery * prices.price_out();
        let saved = energy.consumer.used_production * prices.price_in();
        let consumed = energy.grid.consumption * prices.price_in();
        let balance_grid = delivered - consumed;
        Self {
            currency: prices.currency.clone(),
            delivered,
            saved,
            consumed,
            balance_grid,
            balance_total: balance_grid + saved,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_money() {
        let prices = Prices {
            consumption: Some(KilowattHourRate::from(0.30)),
            delivery: Some(KilowattHourRate::from(0.08)),
            currency: "EUR".to_owned(),
        };
        let mut energy = PowerFlow::<KilowattHours>::default();
        energy.grid.delivery = KilowattHours::from(10.0);
        energy.grid.consumption = KilowattHours::from(2.0);
        energy.consumer.used_production = KilowattHours::from(5.0);

        let money = Money::new(&prices, &energy);
        assert_eq!(money.currency, "EUR");
        assert_abs_diff_eq!(money.delivered.0.0, 0.8, epsilon = 1e-9);
        assert_abs_diff_eq!(money.saved.0.0, 1.5, epsilon = 1e-9);
        assert_abs_diff_eq!(money.consumed.0.0, 0.6, epsilon = 1e-9);
        assert_abs_diff_eq!(money.balance_grid.0.0, 0.2, epsilon = 1e-9);
        assert_abs_diff_eq!(money.balance_total.0.0, 1.7, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_delivery_price() {
        let prices = Prices {
            consumption: Some(KilowattHourRate::from(0.25)),
            delivery: None,
            currency: "EUR".to_owned(),
        };
        let mut energy = PowerFlow::<KilowattHours>::default();
        energy.grid.delivery = KilowattHours::from(10.0);
        energy.grid.consumption = KilowattHours::from(4.0);

        let money = Money::new(&prices, &energy);
        assert!(money.delivered.is_zero());
        assert_abs_diff_eq!(money.balance_grid.0.0, -1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(money.balance_total.0.0, -1.0, epsilon = 1e-9);
    }
}
