use std::fmt::{Debug, Display, Formatter};

use crate::Quantity;

pub type Cost = Quantity<0, 0, 1>;

impl Display for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Debug for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::{KilowattHourRate, KilowattHours};

    #[test]
    fn test_energy_times_rate() {
        let cost = KilowattHours::from(2.5) * KilowattHourRate::from(0.3);
        assert_abs_diff_eq!(cost.0.0, 0.75);
    }
}
