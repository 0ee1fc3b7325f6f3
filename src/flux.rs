//! Neutron flux and core power
//!
//! Power is an emergent quantity: each fuel channel's flux is attenuated by
//! every absorber rod within `ROD_INFLUENCE_RADIUS`, and core power is the mean
//! channel flux. Operators only reach power through rods and cooling.

use rand::Rng;
use std::collections::BTreeMap;

use crate::lattice::{ElementId, ElementKind, Lattice};
use crate::state::ControlSurface;

/// Rods at or beyond this distance do not affect a channel [cell pitches]
pub const ROD_INFLUENCE_RADIUS: f64 = 4.0;

/// Absorption strength of a fully inserted rod at unit-ish distance
pub const ROD_ABSORPTION: f64 = 0.45;

/// Softens absorption for adjacent rods
pub const DISTANCE_OFFSET: f64 = 0.2;

/// Upper clamp for channel flux
pub const MAX_FLUX: f64 = 3.5;

/// Upper clamp for core power [%]
pub const MAX_POWER: f64 = 150.0;

/// Channels below this fuel fraction are exhausted [%]
pub const EXHAUSTED_FUEL: f64 = 1.0;

/// Multiplicative jitter applied to every channel
pub const JITTER: (f64, f64) = (0.97, 1.03);

/// Decay-heat relaxation factor per tick while the chain reaction is off
pub const DECAY_FACTOR: f64 = 0.92;

/// Fraction of neutrons a rod removes from a channel
pub fn absorption(insertion: f64, distance: f64) -> f64 {
    (insertion / 100.0) * (1.0 / (distance + DISTANCE_OFFSET)) * ROD_ABSORPTION
}

/// Unattenuated flux of a channel from its remaining fuel
pub fn base_flux(fuel_fraction: f64) -> f64 {
    if fuel_fraction < EXHAUSTED_FUEL {
        0.0
    } else {
        fuel_fraction / 100.0
    }
}

#[derive(Debug, Clone)]
struct FuelChannel {
    id: ElementId,
    /// Rods within influence radius, with their distance
    rods: Vec<(ElementId, f64)>,
}

/// Precomputed rod neighbourhoods of every fuel channel
#[derive(Debug, Clone)]
pub struct FluxGeometry {
    channels: Vec<FuelChannel>,
}

impl FluxGeometry {
    pub fn new(lattice: &Lattice) -> Self {
        let channels = lattice
            .elements_of_type(ElementKind::Fuel)
            .into_iter()
            .map(|fuel| FuelChannel {
                id: fuel.id,
                rods: lattice
                    .neighbors_within(fuel.id, ROD_INFLUENCE_RADIUS)
                    .into_iter()
                    .filter(|(e, _)| e.kind.is_rod())
                    .map(|(e, d)| (e.id, d))
                    .collect(),
            })
            .collect();
        Self { channels }
    }

    pub fn fuel_ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.channels.iter().map(|c| c.id)
    }

    /// Rods that influence `fuel`, with distances
    pub fn rods_near(&self, fuel: ElementId) -> &[(ElementId, f64)] {
        self.channels
            .iter()
            .find(|c| c.id == fuel)
            .map(|c| c.rods.as_slice())
            .unwrap_or(&[])
    }

    /// Product of `(1 - absorption)` over every influencing rod
    pub fn multiplier(&self, fuel: ElementId, surface: &ControlSurface) -> f64 {
        self.rods_near(fuel)
            .iter()
            .fold(1.0, |m, &(rod, d)| {
                let insertion = surface.insertion(rod).unwrap_or(0.0);
                m * (1.0 - absorption(insertion, d))
            })
    }

    /// Flux of one channel before jitter
    pub fn channel_flux(&self, fuel: ElementId, surface: &ControlSurface, fuel_fraction: f64) -> f64 {
        base_flux(fuel_fraction) * self.multiplier(fuel, surface)
    }

    /// Flux of every fuel channel for this tick
    pub fn compute<R: Rng>(
        &self,
        surface: &ControlSurface,
        fuel: &BTreeMap<ElementId, f64>,
        rng: &mut R,
    ) -> BTreeMap<ElementId, f64> {
        self.channels
            .iter()
            .map(|c| {
                let fraction = fuel.get(&c.id).copied().unwrap_or(0.0);
                let jitter = rng.gen_range(JITTER.0..=JITTER.1);
                let flux = self.channel_flux(c.id, surface, fraction) * jitter;
                (c.id, flux.clamp(0.0, MAX_FLUX))
            })
            .collect()
    }
}

/// Mean channel flux expressed as percent power; 0 with no fuel channels
pub fn aggregate_power(flux: &BTreeMap<ElementId, f64>) -> f64 {
    if flux.is_empty() {
        return 0.0;
    }
    let mean = flux.values().sum::<f64>() / flux.len() as f64;
    (mean * 100.0).clamp(0.0, MAX_POWER)
}

/// Residual power after one tick without a chain reaction
pub fn decay_power(power: f64) -> f64 {
    let next = power * DECAY_FACTOR;
    if next < 0.01 {
        0.0
    } else {
        next.clamp(0.0, MAX_POWER)
    }
}

/// Max/min ratio over channels that still carry flux
pub fn flux_tilt(flux: &BTreeMap<ElementId, f64>) -> Option<f64> {
    let live = flux.values().copied().filter(|&f| f > 0.0);
    let (min, max) = live.fold((f64::INFINITY, 0.0_f64), |(lo, hi), f| (lo.min(f), hi.max(f)));
    if min.is_finite() {
        Some(max / min)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn full_fuel(geometry: &FluxGeometry) -> BTreeMap<ElementId, f64> {
        geometry.fuel_ids().map(|id| (id, 100.0)).collect()
    }

    #[test]
    fn test_flux_non_increasing_with_nearby_insertion() {
        let lattice = Lattice::default();
        let geometry = FluxGeometry::new(&lattice);
        let mut surface = ControlSurface::new(&lattice, 0);
        for v in surface.rods.values_mut() {
            *v = 0.0;
        }

        let fuel = geometry.fuel_ids().next().unwrap();
        let &(rod, _) = geometry.rods_near(fuel).first().unwrap();

        let mut previous = f64::INFINITY;
        for step in 0..=100 {
            surface.set_insertion(rod, step as f64);
            let flux = geometry.channel_flux(fuel, &surface, 100.0);
            assert!(flux <= previous, "flux rose at insertion {step}");
            previous = flux;
        }
    }

    #[test]
    fn test_all_rods_out_gives_nominal_power() {
        let lattice = Lattice::default();
        let geometry = FluxGeometry::new(&lattice);
        let mut surface = ControlSurface::new(&lattice, 0);
        for v in surface.rods.values_mut() {
            *v = 0.0;
        }
        let mut rng = StdRng::seed_from_u64(7);
        let flux = geometry.compute(&surface, &full_fuel(&geometry), &mut rng);
        let power = aggregate_power(&flux);
        assert!((power - 100.0).abs() <= 3.0, "power {power}");
    }

    #[test]
    fn test_full_insertion_suppresses_power() {
        let lattice = Lattice::default();
        let geometry = FluxGeometry::new(&lattice);
        let surface = ControlSurface::new(&lattice, 0);
        let mut rng = StdRng::seed_from_u64(7);
        let flux = geometry.compute(&surface, &full_fuel(&geometry), &mut rng);
        assert!(aggregate_power(&flux) < 15.0);
    }

    #[test]
    fn test_exhausted_channel_has_no_flux() {
        assert_eq!(base_flux(0.5), 0.0);
        assert_eq!(base_flux(50.0), 0.5);
    }

    #[test]
    fn test_power_is_zero_without_fuel() {
        let lattice = Lattice::from_rows(&["GC", "RG"]).unwrap();
        let geometry = FluxGeometry::new(&lattice);
        let surface = ControlSurface::new(&lattice, 0);
        let mut rng = StdRng::seed_from_u64(1);
        let flux = geometry.compute(&surface, &BTreeMap::new(), &mut rng);
        assert_eq!(aggregate_power(&flux), 0.0);
    }

    #[test]
    fn test_power_clamped() {
        let flux: BTreeMap<ElementId, f64> = [(1, 3.5), (2, 3.5)].into_iter().collect();
        assert_eq!(aggregate_power(&flux), MAX_POWER);
    }

    #[test]
    fn test_decay_power_relaxes_to_zero() {
        let mut p = 100.0;
        for _ in 0..500 {
            p = decay_power(p);
        }
        assert_eq!(p, 0.0);
    }

    #[test]
    fn test_flux_tilt() {
        let flux: BTreeMap<ElementId, f64> = [(1, 0.5), (2, 1.0), (3, 0.0)].into_iter().collect();
        assert_eq!(flux_tilt(&flux), Some(2.0));
        assert_eq!(flux_tilt(&BTreeMap::new()), None);
    }
}
