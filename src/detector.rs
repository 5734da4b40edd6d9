//! Forward-detector geometry and per-event signal buffers.
//!
//! The detector is three sub-detectors of silicon rings around the beam pipe:
//! detector 1 has an inner ring only, detectors 2 and 3 each have an inner
//! and an outer ring, giving the five ring units 1i, 2i, 2o, 3i, 3o. Inner
//! rings are segmented into 20 azimuthal sectors of 512 radial strips, outer
//! rings into 40 sectors of 256 strips.

use serde::{Deserialize, Serialize};

/// Number of ring units in the detector.
pub const N_RINGS: usize = 5;

/// Inner/outer ring within a sub-detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RingKind {
    Inner,
    Outer,
}

/// One ring unit, identified by sub-detector number (1..=3) and ring kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RingId {
    pub detector: u8,
    pub kind: RingKind,
}

impl RingId {
    /// All five ring units, innermost sub-detector first.
    pub const ALL: [Self; N_RINGS] = [
        Self { detector: 1, kind: RingKind::Inner },
        Self { detector: 2, kind: RingKind::Inner },
        Self { detector: 2, kind: RingKind::Outer },
        Self { detector: 3, kind: RingKind::Inner },
        Self { detector: 3, kind: RingKind::Outer },
    ];

    /// Dense index 0..5 used for per-ring arrays.
    pub fn index(self) -> usize {
        match (self.detector, self.kind) {
            (1, RingKind::Inner) => 0,
            (2, RingKind::Inner) => 1,
            (2, RingKind::Outer) => 2,
            (3, RingKind::Inner) => 3,
            _ => 4,
        }
    }

    /// Azimuthal sector count.
    pub const fn sectors(self) -> u16 {
        match self.kind {
            RingKind::Inner => 20,
            RingKind::Outer => 40,
        }
    }

    /// Radial strips per sector.
    pub const fn strips(self) -> u16 {
        match self.kind {
            RingKind::Inner => 512,
            RingKind::Outer => 256,
        }
    }

    /// Total readout channels in this ring.
    pub const fn channels(self) -> usize {
        self.sectors() as usize * self.strips() as usize
    }

    /// Pseudorapidity coverage (low edge, high edge). Sub-detector 3 sits on
    /// the opposite side of the interaction point.
    pub const fn eta_range(self) -> (f64, f64) {
        match (self.detector, self.kind) {
            (1, RingKind::Inner) => (3.68, 5.03),
            (2, RingKind::Inner) => (2.28, 3.68),
            (2, RingKind::Outer) => (1.70, 2.29),
            (3, RingKind::Inner) => (-3.40, -2.01),
            _ => (-2.29, -1.70),
        }
    }

    /// Azimuthal angle of a sector center, in radians.
    pub fn sector_phi(self, sector: u16) -> f64 {
        (f64::from(sector) + 0.5) * std::f64::consts::TAU / f64::from(self.sectors())
    }

    /// Pseudorapidity of a strip center within this ring's coverage.
    pub fn strip_eta(self, strip: u16) -> f64 {
        let (lo, hi) = self.eta_range();
        lo + (f64::from(strip) + 0.5) * (hi - lo) / f64::from(self.strips())
    }
}

impl std::fmt::Display for RingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let k = match self.kind {
            RingKind::Inner => 'i',
            RingKind::Outer => 'o',
        };
        write!(f, "{}{}", self.detector, k)
    }
}

// ============================================================================
// Raw payload (sparse per-channel signals, mutated in place by the fixer)
// ============================================================================

/// One above-threshold readout channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelHit {
    pub ring: RingId,
    pub sector: u16,
    pub strip: u16,
    /// Deposited signal in units of the most-probable single-particle energy
    /// loss (MIP).
    pub signal: f64,
}

/// Raw detector payload for one event: the channels that fired, in readout
/// order. Sparse on purpose — typical occupancy is a few percent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorPayload {
    pub hits: Vec<ChannelHit>,
}

impl DetectorPayload {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Signals of every hit, for sample statistics.
    pub fn signals(&self) -> impl Iterator<Item = f64> + '_ {
        self.hits.iter().map(|h| h.signal)
    }
}

// ============================================================================
// Snapshot (dense merged-hit grids, owned by the controller)
// ============================================================================

/// Dense per-ring grid of merged-hit multiplicities, indexed sector-major.
#[derive(Debug, Clone)]
pub struct RingGrid {
    pub ring: RingId,
    mult: Vec<f64>,
}

impl RingGrid {
    fn new(ring: RingId) -> Self {
        Self { ring, mult: vec![0.0; ring.channels()] }
    }

    fn idx(&self, sector: u16, strip: u16) -> Option<usize> {
        if sector >= self.ring.sectors() || strip >= self.ring.strips() {
            return None;
        }
        Some(sector as usize * self.ring.strips() as usize + strip as usize)
    }

    pub fn get(&self, sector: u16, strip: u16) -> f64 {
        self.idx(sector, strip).map_or(0.0, |i| self.mult[i])
    }

    pub fn set(&mut self, sector: u16, strip: u16, value: f64) {
        if let Some(i) = self.idx(sector, strip) {
            self.mult[i] = value;
        }
    }

    pub fn add(&mut self, sector: u16, strip: u16, value: f64) {
        if let Some(i) = self.idx(sector, strip) {
            self.mult[i] += value;
        }
    }

    /// Sum of multiplicities over all channels.
    pub fn total(&self) -> f64 {
        self.mult.iter().sum()
    }

    /// Fraction of channels above zero.
    pub fn occupancy(&self) -> f64 {
        let hit = self.mult.iter().filter(|&&m| m > 0.0).count();
        hit as f64 / self.mult.len() as f64
    }

    /// Iterate (sector, strip, multiplicity) over non-empty channels.
    pub fn entries(&self) -> impl Iterator<Item = (u16, u16, f64)> + '_ {
        let strips = self.ring.strips();
        self.mult.iter().enumerate().filter(|(_, &m)| m > 0.0).map(move |(i, &m)| {
            #[allow(clippy::cast_possible_truncation)]
            let (s, t) = ((i / strips as usize) as u16, (i % strips as usize) as u16);
            (s, t, m)
        })
    }

    fn clear(&mut self) {
        self.mult.iter_mut().for_each(|m| *m = 0.0);
    }
}

/// Per-event snapshot of repaired, merged hit multiplicities for all five
/// rings. Owned exclusively by the pipeline controller and cleared at the
/// start of every event.
#[derive(Debug, Clone)]
pub struct DetectorSnapshot {
    rings: [RingGrid; N_RINGS],
}

impl Default for DetectorSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorSnapshot {
    pub fn new() -> Self {
        Self {
            rings: RingId::ALL.map(RingGrid::new),
        }
    }

    pub fn ring(&self, id: RingId) -> &RingGrid {
        &self.rings[id.index()]
    }

    pub fn ring_mut(&mut self, id: RingId) -> &mut RingGrid {
        &mut self.rings[id.index()]
    }

    pub fn rings(&self) -> impl Iterator<Item = &RingGrid> {
        self.rings.iter()
    }

    /// Zero every channel in every ring.
    pub fn clear(&mut self) {
        for ring in &mut self.rings {
            ring.clear();
        }
    }

    /// Total multiplicity over the whole detector.
    pub fn total(&self) -> f64 {
        self.rings.iter().map(RingGrid::total).sum()
    }
}

// ============================================================================
// Vertex binning
// ============================================================================

/// Discretization of the primary-vertex z position, used to select the
/// correction maps and the ring-sum accumulator slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VertexAxis {
    pub min_cm: f64,
    pub max_cm: f64,
    pub bins: u16,
}

impl Default for VertexAxis {
    fn default() -> Self {
        Self { min_cm: -10.0, max_cm: 10.0, bins: 10 }
    }
}

impl VertexAxis {
    /// Bin index for a vertex z, or `None` outside the accepted window.
    pub fn bin(&self, z_cm: f64) -> Option<u16> {
        if !(self.min_cm..self.max_cm).contains(&z_cm) {
            return None;
        }
        let frac = (z_cm - self.min_cm) / (self.max_cm - self.min_cm);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(((frac * f64::from(self.bins)) as u16).min(self.bins - 1))
    }
}
