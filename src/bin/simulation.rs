//! Forward-detector event simulation
//!
//! Generates synthetic raw events for exercising the reduction pipeline.
//! Covers the structural edge cases a real run feeds the controller:
//! - Events with no trigger information or an empty readout
//! - Missing or out-of-window vertices
//! - Pile-up tagged events
//! - Strip-to-strip signal sharing and low-amplitude noise hits
//!
//! # Usage
//! ```bash
//! ./simulation --events 10000 --system pbpb | ./forward-mult --stdin
//! ```

use std::io::{self, Write};

use clap::{Parser, ValueEnum};
use rand::prelude::*;
use rand_distr::{Distribution, Normal, Poisson, Uniform};

use forward_mult::detector::{ChannelHit, DetectorPayload, RingId};
use forward_mult::types::{CollisionSystem, RawEvent};

// ============================================================================
// Simulation constants
// ============================================================================

/// MIP peak position of a single-particle signal.
const MIP_PEAK: f64 = 1.0;
/// Gaussian width of the single-particle response.
const MIP_SIGMA: f64 = 0.25;
/// Fraction of hits that share signal with the next strip.
const SHARE_FRACTION: f64 = 0.2;
/// Fraction of signal spilled into the neighbour when sharing.
const SHARE_SPLIT: f64 = 0.35;
/// Per-ring count of low-amplitude noise hits.
const NOISE_HITS_PER_RING: f64 = 3.0;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Debug, Clone, Copy, ValueEnum)]
enum System {
    Pp,
    Ppb,
    Pbpb,
}

#[derive(Parser, Debug)]
#[command(name = "forward-mult-sim")]
#[command(about = "Synthetic forward-detector event generator")]
#[command(version)]
struct Args {
    /// Number of events to generate
    #[arg(long, default_value = "1000")]
    events: u64,

    /// Collision system
    #[arg(long, value_enum, default_value = "pp")]
    system: System,

    /// RNG seed (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Fraction of events tagged as pile-up
    #[arg(long, default_value = "0.05")]
    pileup_fraction: f64,

    /// Fraction of events with no reconstructed vertex
    #[arg(long, default_value = "0.03")]
    no_vertex_fraction: f64,

    /// Gaussian sigma of the vertex-z distribution (cm)
    #[arg(long, default_value = "5.0")]
    vertex_sigma_cm: f64,

    /// Mean charged particles per inner ring (0 = per-system default)
    #[arg(long, default_value = "0")]
    mean_hits: u64,
}

impl Args {
    fn collision_system(&self) -> CollisionSystem {
        match self.system {
            System::Pp => CollisionSystem::PP,
            System::Ppb => CollisionSystem::PPb,
            System::Pbpb => CollisionSystem::PbPb,
        }
    }

    fn snn_gev(&self) -> f64 {
        match self.system {
            System::Pp => 13000.0,
            System::Ppb => 8160.0,
            System::Pbpb => 5020.0,
        }
    }

    fn ring_mean_hits(&self) -> f64 {
        if self.mean_hits > 0 {
            return self.mean_hits as f64;
        }
        match self.system {
            System::Pp => 15.0,
            System::Ppb => 40.0,
            System::Pbpb => 900.0,
        }
    }
}

// ============================================================================
// Event generation
// ============================================================================

fn generate_payload(
    rng: &mut StdRng,
    mean_hits: f64,
    centrality_scale: f64,
) -> DetectorPayload {
    let mip = Normal::new(MIP_PEAK, MIP_SIGMA).unwrap();
    let noise_amp = Uniform::new(0.01, 0.12);

    let mut hits: Vec<ChannelHit> = Vec::new();
    for ring in RingId::ALL {
        let lambda = (mean_hits * centrality_scale).max(0.5);
        let n_particles = Poisson::new(lambda).unwrap().sample(rng) as usize;
        for _ in 0..n_particles {
            let sector = rng.gen_range(0..ring.sectors());
            let strip = rng.gen_range(0..ring.strips());
            let signal: f64 = mip.sample(rng).max(0.05);

            if rng.gen_bool(SHARE_FRACTION) && strip + 1 < ring.strips() {
                // Split the deposit across two adjacent strips.
                hits.push(ChannelHit {
                    ring,
                    sector,
                    strip,
                    signal: signal * (1.0 - SHARE_SPLIT),
                });
                hits.push(ChannelHit {
                    ring,
                    sector,
                    strip: strip + 1,
                    signal: signal * SHARE_SPLIT,
                });
            } else {
                hits.push(ChannelHit {
                    ring,
                    sector,
                    strip,
                    signal,
                });
            }
        }

        let n_noise = Poisson::new(NOISE_HITS_PER_RING).unwrap().sample(rng) as usize;
        for _ in 0..n_noise {
            hits.push(ChannelHit {
                ring,
                sector: rng.gen_range(0..ring.sectors()),
                strip: rng.gen_range(0..ring.strips()),
                signal: noise_amp.sample(rng),
            });
        }
    }
    DetectorPayload { hits }
}

fn generate_event(rng: &mut StdRng, n: u64, args: &Args) -> RawEvent {
    // A sliver of fully empty readouts keeps the first gate honest.
    if rng.gen_bool(0.005) {
        return RawEvent::shell(n);
    }

    let system = args.collision_system();
    let centrality: f64 = if system == CollisionSystem::PbPb {
        rng.gen_range(0.0..100.0)
    } else {
        -1.0
    };
    // Central events produce more particles than peripheral ones.
    let centrality_scale = if centrality >= 0.0 {
        1.5 - centrality / 100.0
    } else {
        1.0
    };

    let mut trigger_lines = Vec::new();
    if rng.gen_bool(0.98) {
        trigger_lines.push("MB".to_string());
        if rng.gen_bool(0.7) {
            trigger_lines.push("INEL>0".to_string());
        }
        if rng.gen_bool(0.4) {
            trigger_lines.push("NSD".to_string());
        }
    }

    let vertex = if rng.gen_bool(1.0 - args.no_vertex_fraction) {
        let xy = Normal::new(0.0, 0.01).unwrap();
        let z = Normal::new(0.0, args.vertex_sigma_cm).unwrap();
        Some([xy.sample(rng), xy.sample(rng), z.sample(rng)])
    } else {
        None
    };

    let cluster_mean = match args.system {
        System::Pp => 30.0,
        System::Ppb => 80.0,
        System::Pbpb => 600.0 * centrality_scale,
    };
    let n_clusters = Poisson::new(cluster_mean.max(1.0)).unwrap().sample(rng) as u16;

    RawEvent {
        event_number: n,
        timestamp: 1_756_339_200 + n,
        system,
        snn_gev: args.snn_gev(),
        trigger_lines,
        pileup_tagged: rng.gen_bool(args.pileup_fraction),
        has_cluster_data: rng.gen_bool(0.99),
        n_clusters,
        vertex,
        centrality,
        payload: Some(generate_payload(rng, args.ring_mean_hits(), centrality_scale)),
    }
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    for n in 1..=args.events {
        let event = generate_event(&mut rng, n, &args);
        let line = serde_json::to_string(&event).map_err(io::Error::other)?;
        writeln!(out, "{line}")?;
    }
    out.flush()
}
