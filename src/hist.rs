//! Density histograms and their long-lived accumulators.
//!
//! Everything here is a plain η×φ 2-D histogram: the per-ring working set
//! filled by the density calculator, the per-event summary carried by the
//! output record, the per-vertex-bin ring sums, and the run-long minimum-bias
//! accumulator.

use crate::detector::{RingId, VertexAxis, N_RINGS};
use serde::{Deserialize, Serialize};

/// Default pseudorapidity axis: 200 bins over [-4, 6].
pub const ETA_BINS: usize = 200;
pub const ETA_MIN: f64 = -4.0;
pub const ETA_MAX: f64 = 6.0;

/// Default azimuthal axis: 20 bins over [0, 2π).
pub const PHI_BINS: usize = 20;

// ============================================================================
// Hist2D
// ============================================================================

/// Fixed-axis η×φ histogram with f64 bin contents.
///
/// Entries outside either axis are dropped, matching how the out-of-
/// acceptance tails are treated everywhere in the reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist2D {
    n_eta: usize,
    eta_min: f64,
    eta_max: f64,
    n_phi: usize,
    bins: Vec<f64>,
    entries: u64,
}

impl Default for Hist2D {
    fn default() -> Self {
        Self::new(ETA_BINS, ETA_MIN, ETA_MAX, PHI_BINS)
    }
}

impl Hist2D {
    pub fn new(n_eta: usize, eta_min: f64, eta_max: f64, n_phi: usize) -> Self {
        Self {
            n_eta,
            eta_min,
            eta_max,
            n_phi,
            bins: vec![0.0; n_eta * n_phi],
            entries: 0,
        }
    }

    fn bin_index(&self, eta: f64, phi: f64) -> Option<usize> {
        if !(self.eta_min..self.eta_max).contains(&eta) {
            return None;
        }
        let phi = phi.rem_euclid(std::f64::consts::TAU);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ie = (((eta - self.eta_min) / (self.eta_max - self.eta_min)) * self.n_eta as f64)
            as usize;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ip = ((phi / std::f64::consts::TAU) * self.n_phi as f64) as usize;
        Some(ie.min(self.n_eta - 1) * self.n_phi + ip.min(self.n_phi - 1))
    }

    /// Add `weight` at (η, φ).
    pub fn fill(&mut self, eta: f64, phi: f64, weight: f64) {
        if let Some(i) = self.bin_index(eta, phi) {
            self.bins[i] += weight;
            self.entries += 1;
        }
    }

    /// Bin content by (η bin, φ bin) index.
    pub fn content(&self, ieta: usize, iphi: usize) -> f64 {
        if ieta >= self.n_eta || iphi >= self.n_phi {
            return 0.0;
        }
        self.bins[ieta * self.n_phi + iphi]
    }

    /// Multiply the bin at (η, φ) by `factor`. Used by the correction maps.
    pub fn scale_at(&mut self, eta: f64, phi: f64, factor: f64) {
        if let Some(i) = self.bin_index(eta, phi) {
            self.bins[i] *= factor;
        }
    }

    /// Multiply every bin by `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.bins.iter_mut().for_each(|b| *b *= factor);
    }

    /// Bin-wise addition. Axes must match; the caller constructs both sides
    /// from the same axis constants.
    pub fn add(&mut self, other: &Self) {
        debug_assert_eq!(self.bins.len(), other.bins.len());
        for (a, b) in self.bins.iter_mut().zip(&other.bins) {
            *a += b;
        }
        self.entries += other.entries;
    }

    /// Sum of all bin contents.
    pub fn integral(&self) -> f64 {
        self.bins.iter().sum()
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0 && self.integral() == 0.0
    }

    /// Zero every bin and the entry count; the allocation is kept.
    pub fn reset(&mut self) {
        self.bins.iter_mut().for_each(|b| *b = 0.0);
        self.entries = 0;
    }

    /// Iterate (η-bin center, φ-bin center, content) over non-empty bins.
    pub fn cells(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        let eta_w = (self.eta_max - self.eta_min) / self.n_eta as f64;
        let phi_w = std::f64::consts::TAU / self.n_phi as f64;
        self.bins.iter().enumerate().filter(|(_, &c)| c != 0.0).map(move |(i, &c)| {
            let (ie, ip) = (i / self.n_phi, i % self.n_phi);
            (
                self.eta_min + (ie as f64 + 0.5) * eta_w,
                (ip as f64 + 0.5) * phi_w,
                c,
            )
        })
    }
}

// ============================================================================
// Per-ring working set
// ============================================================================

/// One ring's working histogram plus its per-event quality flag.
#[derive(Debug, Clone)]
pub struct RingHist {
    pub ring: RingId,
    pub hist: Hist2D,
    /// Set by the density calculator when this ring's data is an outlier for
    /// the event; read by the controller's quality-skip scan.
    pub skip: bool,
}

/// The per-event working histogram set, one entry per ring unit.
#[derive(Debug, Clone)]
pub struct RingHistos {
    rings: [RingHist; N_RINGS],
}

impl Default for RingHistos {
    fn default() -> Self {
        Self::new()
    }
}

impl RingHistos {
    pub fn new() -> Self {
        Self {
            rings: RingId::ALL.map(|ring| RingHist {
                ring,
                hist: Hist2D::default(),
                skip: false,
            }),
        }
    }

    pub fn get(&self, id: RingId) -> &RingHist {
        &self.rings[id.index()]
    }

    pub fn get_mut(&mut self, id: RingId) -> &mut RingHist {
        &mut self.rings[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &RingHist> {
        self.rings.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RingHist> {
        self.rings.iter_mut()
    }

    /// Number of rings flagged as outliers.
    pub fn skipped(&self) -> usize {
        self.rings.iter().filter(|r| r.skip).count()
    }

    /// Reset all histograms and clear all skip flags.
    pub fn clear(&mut self) {
        for r in &mut self.rings {
            r.hist.reset();
            r.skip = false;
        }
    }
}

// ============================================================================
// Ring-sum accumulators
// ============================================================================

/// Run-long per-vertex-bin, per-ring sum histograms.
///
/// Updated only by the histogram collector on accepted events; flushed to the
/// run output at finalize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingSums {
    sums: Vec<Vec<Hist2D>>,
}

impl RingSums {
    pub fn new(vertex_axis: &VertexAxis) -> Self {
        Self {
            sums: (0..vertex_axis.bins)
                .map(|_| (0..N_RINGS).map(|_| Hist2D::default()).collect())
                .collect(),
        }
    }

    pub fn vertex_bins(&self) -> usize {
        self.sums.len()
    }

    pub fn get(&self, vertex_bin: u16, ring: RingId) -> Option<&Hist2D> {
        self.sums.get(vertex_bin as usize).map(|v| &v[ring.index()])
    }

    /// Add a ring's working histogram into the slot for `vertex_bin`.
    pub fn accumulate(&mut self, vertex_bin: u16, ring: RingId, hist: &Hist2D) {
        if let Some(slot) = self.sums.get_mut(vertex_bin as usize) {
            slot[ring.index()].add(hist);
        }
    }

    /// Total content over all vertex bins and rings.
    pub fn integral(&self) -> f64 {
        self.sums.iter().flatten().map(Hist2D::integral).sum()
    }
}
