//! Fuel depletion and radiation level

use rand::Rng;
use std::collections::BTreeMap;

use crate::lattice::ElementId;

/// Fuel burned per unit of channel flux per tick [%]
pub const BURN_RATE: f64 = 0.00008;

/// Depletion only happens above this power [%]
pub const DEPLETION_POWER_THRESHOLD: f64 = 1.0;

pub const BACKGROUND_RADIATION: f64 = 0.1;
pub const RADIATION_PER_POWER: f64 = 0.5;
pub const RADIATION_PER_BURNUP: f64 = 0.01;
pub const RADIATION_JITTER: f64 = 0.05;

/// Burn fuel in every channel according to its flux. No-op at low power.
pub fn deplete(fuel: &mut BTreeMap<ElementId, f64>, flux: &BTreeMap<ElementId, f64>, power: f64) {
    if power <= DEPLETION_POWER_THRESHOLD {
        return;
    }
    for (id, fraction) in fuel.iter_mut() {
        let local = flux.get(id).copied().unwrap_or(0.0).max(0.0);
        *fraction = (*fraction - local * BURN_RATE).max(0.0);
    }
}

/// Radiation level [mSv/h]
pub fn radiation<R: Rng>(power: f64, avg_fuel: f64, rng: &mut R) -> f64 {
    let level = BACKGROUND_RADIATION
        + (power / 100.0) * RADIATION_PER_POWER
        + (100.0 - avg_fuel) * RADIATION_PER_BURNUP
        + rng.gen_range(-RADIATION_JITTER..=RADIATION_JITTER);
    level.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_depletion_monotone_and_floored() {
        let mut fuel: BTreeMap<ElementId, f64> = [(1, 100.0), (2, 0.00001)].into_iter().collect();
        let flux: BTreeMap<ElementId, f64> = [(1, 1.0), (2, 1.0)].into_iter().collect();
        let mut previous = fuel.clone();
        for _ in 0..100 {
            deplete(&mut fuel, &flux, 100.0);
            for (id, v) in &fuel {
                assert!(*v <= previous[id]);
                assert!(*v >= 0.0);
            }
            previous = fuel.clone();
        }
        assert_eq!(fuel[&2], 0.0);
        assert!(fuel[&1] < 100.0);
    }

    #[test]
    fn test_no_depletion_at_low_power() {
        let mut fuel: BTreeMap<ElementId, f64> = [(1, 100.0)].into_iter().collect();
        let flux: BTreeMap<ElementId, f64> = [(1, 1.0)].into_iter().collect();
        deplete(&mut fuel, &flux, 0.5);
        assert_eq!(fuel[&1], 100.0);
    }

    #[test]
    fn test_radiation_components() {
        let mut rng = StdRng::seed_from_u64(11);
        let cold = radiation(0.0, 100.0, &mut rng);
        assert!((cold - BACKGROUND_RADIATION).abs() <= RADIATION_JITTER + 1e-12);
        let hot = radiation(100.0, 50.0, &mut rng);
        assert!((hot - 1.1).abs() <= RADIATION_JITTER + 1e-12);
    }
}
