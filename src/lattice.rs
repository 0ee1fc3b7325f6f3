//! RBMK Core Lattice
//!
//! Static topology of the core: a square grid of channel symbols, numbered
//! row-major from 1 across every non-placeholder cell. The lattice is built
//! once from its symbolic definition and never mutated afterwards.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Stable element identifier (1-based)
pub type ElementId = u32;

/// Default 13x13 core layout
pub const DEFAULT_GRID: [&str; 13] = [
    "PPPPPRRRPPPPP",
    "PPPPRGGGRPPPP",
    "PPPRGGTGGRPPP",
    "PPRGGFAFGGRPP",
    "PRGGFCFCFGGRP",
    "RGGFCFCFCFGGR",
    "RGTAFCTCFATGR",
    "RGGFCFCFCFGGR",
    "PRGGFCFCFGGRP",
    "PPRGGFAFGGRPP",
    "PPPRGGTGGRPPP",
    "PPPPRGGGRPPPP",
    "PPPPPRRRPPPPP",
];

/// Kind of channel occupying a lattice cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementKind {
    Reflector,
    Graphite,
    TemperatureSensor,
    AutoRod,
    Fuel,
    ControlRod,
    /// Empty cell outside the core outline, never numbered
    Placeholder,
}

impl ElementKind {
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            'R' => Some(Self::Reflector),
            'G' => Some(Self::Graphite),
            'T' => Some(Self::TemperatureSensor),
            'A' => Some(Self::AutoRod),
            'F' => Some(Self::Fuel),
            'C' => Some(Self::ControlRod),
            'P' => Some(Self::Placeholder),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Self::Reflector => 'R',
            Self::Graphite => 'G',
            Self::TemperatureSensor => 'T',
            Self::AutoRod => 'A',
            Self::Fuel => 'F',
            Self::ControlRod => 'C',
            Self::Placeholder => 'P',
        }
    }

    /// Absorber rods that carry an insertion percentage
    pub fn is_rod(self) -> bool {
        matches!(self, Self::ControlRod | Self::AutoRod)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Reflector => "reflector",
            Self::Graphite => "graphite",
            Self::TemperatureSensor => "temperature sensor",
            Self::AutoRod => "auto rod",
            Self::Fuel => "fuel",
            Self::ControlRod => "control rod",
            Self::Placeholder => "placeholder",
        }
    }
}

/// A numbered lattice cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    pub row: usize,
    pub col: usize,
}

impl Element {
    pub fn distance_to(&self, other: &Element) -> f64 {
        distance((self.row, self.col), (other.row, other.col))
    }
}

/// Euclidean distance between two grid positions, in cell pitches
pub fn distance(a: (usize, usize), b: (usize, usize)) -> f64 {
    let dr = a.0 as f64 - b.0 as f64;
    let dc = a.1 as f64 - b.1 as f64;
    (dr * dr + dc * dc).sqrt()
}

/// Immutable core topology
#[derive(Debug, Clone)]
pub struct Lattice {
    grid: Array2<ElementKind>,
    /// Indexed by `id - 1`
    elements: Vec<Element>,
}

impl Lattice {
    /// Build the lattice from rows of kind symbols (`R G T A F C P`).
    /// Whitespace inside a row is ignored.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, ConfigError> {
        let rows: Vec<Vec<char>> = rows
            .iter()
            .map(|r| r.as_ref().chars().filter(|c| !c.is_whitespace()).collect())
            .collect();

        let n = rows.len();
        if n == 0 {
            return Err(ConfigError::EmptyGrid);
        }

        let mut grid = Array2::from_elem((n, n), ElementKind::Placeholder);
        let mut elements = Vec::new();

        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != n {
                return Err(ConfigError::NotSquare {
                    row,
                    len: cells.len(),
                    expected: n,
                });
            }
            for (col, &symbol) in cells.iter().enumerate() {
                let kind = ElementKind::from_symbol(symbol)
                    .ok_or(ConfigError::UnknownSymbol { row, col, symbol })?;
                grid[[row, col]] = kind;
                if kind != ElementKind::Placeholder {
                    elements.push(Element {
                        id: elements.len() as ElementId + 1,
                        kind,
                        row,
                        col,
                    });
                }
            }
        }

        Ok(Self { grid, elements })
    }

    /// Side length of the square grid
    pub fn size(&self) -> usize {
        self.grid.nrows()
    }

    /// Number of numbered elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn kind_at(&self, row: usize, col: usize) -> Option<ElementKind> {
        self.grid.get((row, col)).copied()
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        let idx = (id as usize).checked_sub(1)?;
        self.elements.get(idx)
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn elements_of_type(&self, kind: ElementKind) -> Vec<&Element> {
        self.elements.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn ids_of_type(&self, kind: ElementKind) -> Vec<ElementId> {
        self.elements
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.id)
            .collect()
    }

    /// All elements strictly closer than `radius` to `id`, excluding itself,
    /// paired with their distance. Unknown ids yield an empty list.
    pub fn neighbors_within(&self, id: ElementId, radius: f64) -> Vec<(&Element, f64)> {
        let Some(center) = self.element(id) else {
            return Vec::new();
        };
        self.elements
            .iter()
            .filter(|e| e.id != id)
            .map(|e| (e, center.distance_to(e)))
            .filter(|(_, d)| *d < radius)
            .collect()
    }

    pub fn distance(&self, a: ElementId, b: ElementId) -> Option<f64> {
        Some(self.element(a)?.distance_to(self.element(b)?))
    }
}

impl Default for Lattice {
    fn default() -> Self {
        // The built-in layout only uses known symbols and is square.
        match Self::from_rows(&DEFAULT_GRID) {
            Ok(lattice) => lattice,
            Err(e) => unreachable!("built-in lattice is valid: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lattice_counts() {
        let lattice = Lattice::default();
        assert_eq!(lattice.size(), 13);
        assert_eq!(lattice.len(), 109);
        assert_eq!(lattice.elements_of_type(ElementKind::Fuel).len(), 20);
        assert_eq!(lattice.elements_of_type(ElementKind::ControlRod).len(), 12);
        assert_eq!(lattice.elements_of_type(ElementKind::AutoRod).len(), 4);
        assert_eq!(lattice.elements_of_type(ElementKind::TemperatureSensor).len(), 5);
        assert!(lattice.elements_of_type(ElementKind::Placeholder).is_empty());
    }

    #[test]
    fn test_row_major_numbering() {
        let lattice = Lattice::default();
        let first = lattice.element(1).unwrap();
        assert_eq!((first.row, first.col, first.kind), (0, 5, ElementKind::Reflector));
        let centre = lattice.element(55).unwrap();
        assert_eq!((centre.row, centre.col), (6, 6));
        assert_eq!(centre.kind, ElementKind::TemperatureSensor);
        assert!(lattice.element(0).is_none());
        assert!(lattice.element(110).is_none());

        assert_eq!(lattice.kind_at(0, 0), Some(ElementKind::Placeholder));
        assert_eq!(lattice.kind_at(6, 6), Some(ElementKind::TemperatureSensor));
        assert_eq!(lattice.kind_at(13, 0), None);
    }

    #[test]
    fn test_neighbors_within_is_strict_and_excludes_self() {
        let lattice = Lattice::default();
        let near = lattice.neighbors_within(55, 1.0);
        assert!(near.is_empty());

        let near = lattice.neighbors_within(55, 1.5);
        assert_eq!(near.len(), 8);
        assert!(near.iter().all(|(e, d)| e.id != 55 && *d < 1.5));
    }

    #[test]
    fn test_unknown_symbol_is_config_error() {
        let err = Lattice::from_rows(&["FX", "GG"]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSymbol { row: 0, col: 1, symbol: 'X' }));
    }

    #[test]
    fn test_non_square_is_config_error() {
        let err = Lattice::from_rows(&["FFF", "GG"]).unwrap_err();
        assert!(matches!(err, ConfigError::NotSquare { .. }));
        let err = Lattice::from_rows::<&str>(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyGrid));
    }
}
