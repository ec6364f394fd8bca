//! Tuning advisor: concurrency parameters for the bulk-copy backend
//!
//! Thread count and inter-packet gap are derived from the active link speed
//! and a named profile, optionally throttled during business hours. Link
//! speed lookups hit hardware, so results are cached with a short TTL and a
//! failed probe falls back to a conservative default rather than erroring.

use crate::models::{TuningParams, TuningProfile};
use std::io;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Link speed assumed when the hardware query fails.
pub const FALLBACK_LINK_MBPS: u64 = 100;

/// How long a probed link speed stays valid.
pub const LINK_SPEED_TTL: Duration = Duration::from_secs(30);

/// Business-hours window (local hour, half-open) for the optional throttle.
pub const BUSINESS_HOURS: std::ops::Range<u32> = 8..18;

/// Thread count floor enforced by the business-hours throttle.
pub const THROTTLE_MIN_THREADS: u32 = 16;

/// Baseline thread count as a monotonic step function of link speed.
#[must_use]
pub fn baseline_threads(link_speed_mbps: u64) -> u32 {
    match link_speed_mbps {
        0..1_000 => 48,
        1_000..2_500 => 96,
        2_500..5_000 => 128,
        5_000..10_000 => 192,
        _ => 256,
    }
}

/// Compute tuning parameters for one backend invocation.
///
/// Named profiles override the link-speed baseline outright; `Auto` uses the
/// baseline with no gap. The business-hours throttle applies after any
/// profile override (literal behavior of the source tooling): thread count
/// is halved with a floor of 16 and the gap is forced to 10 ms.
#[must_use]
pub fn compute(
    profile: TuningProfile,
    link_speed_mbps: u64,
    business_hours_throttle: bool,
    current_hour: u32,
) -> TuningParams {
    let (mut threads, mut gap_ms) = match profile {
        TuningProfile::Auto => (baseline_threads(link_speed_mbps), 0),
        TuningProfile::Conservative => (16, 20),
        TuningProfile::Balanced => (64, 5),
        TuningProfile::Aggressive => (256, 0),
        TuningProfile::Wifi => (24, 10),
    };

    if business_hours_throttle && BUSINESS_HOURS.contains(&current_hour) {
        threads = (threads / 2).max(THROTTLE_MIN_THREADS);
        gap_ms = 10;
    }

    TuningParams {
        thread_count: threads.max(1),
        inter_packet_gap_ms: gap_ms,
        profile,
    }
}

/// Seam for the hardware link-speed query so tests can substitute a probe.
pub trait LinkSpeedProbe: Send + Sync {
    /// Query the active link speed in Mbps.
    fn link_speed_mbps(&self) -> io::Result<u64>;
}

/// Default probe: reads `/sys/class/net/*/speed` on Linux and reports the
/// fastest link that is up. Other platforms report unsupported and callers
/// fall back to [`FALLBACK_LINK_MBPS`].
#[derive(Debug, Default)]
pub struct SystemLinkSpeedProbe;

impl LinkSpeedProbe for SystemLinkSpeedProbe {
    #[cfg(target_os = "linux")]
    fn link_speed_mbps(&self) -> io::Result<u64> {
        let mut best: Option<u64> = None;
        for entry in std::fs::read_dir("/sys/class/net")? {
            let entry = entry?;
            if entry.file_name().to_string_lossy() == "lo" {
                continue;
            }
            let speed_path = entry.path().join("speed");
            if let Ok(raw) = std::fs::read_to_string(&speed_path) {
                // Downed interfaces report -1.
                if let Ok(mbps) = raw.trim().parse::<i64>() {
                    if mbps > 0 {
                        let mbps = mbps as u64;
                        best = Some(best.map_or(mbps, |b| b.max(mbps)));
                    }
                }
            }
        }
        best.ok_or_else(|| io::Error::other("no active network link found"))
    }

    #[cfg(not(target_os = "linux"))]
    fn link_speed_mbps(&self) -> io::Result<u64> {
        Err(io::Error::other(
            "link speed probing is not supported on this platform",
        ))
    }
}

/// TTL cache in front of the link-speed probe.
pub struct LinkSpeedCache {
    probe: Box<dyn LinkSpeedProbe>,
    ttl: Duration,
    slot: Mutex<Option<(Instant, u64)>>,
}

impl std::fmt::Debug for LinkSpeedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSpeedCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl Default for LinkSpeedCache {
    fn default() -> Self {
        Self::new(Box::new(SystemLinkSpeedProbe), LINK_SPEED_TTL)
    }
}

impl LinkSpeedCache {
    #[must_use]
    pub fn new(probe: Box<dyn LinkSpeedProbe>, ttl: Duration) -> Self {
        Self {
            probe,
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Current link speed in Mbps: cached value within the TTL, otherwise a
    /// fresh probe, otherwise the conservative fallback.
    pub fn current_mbps(&self) -> u64 {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((probed_at, mbps)) = *slot {
            if probed_at.elapsed() < self.ttl {
                return mbps;
            }
        }
        let mbps = match self.probe.link_speed_mbps() {
            Ok(mbps) => mbps,
            Err(e) => {
                log::warn!("Link speed probe failed, assuming {FALLBACK_LINK_MBPS} Mbps: {e}");
                FALLBACK_LINK_MBPS
            }
        };
        *slot = Some((Instant::now(), mbps));
        mbps
    }
}
