use std::num::NonZeroUsize;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_MIN_PACKET_RATE: u32 = 10_000;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(300);

/// Immutable scan settings, built once and shared read-only by every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    min_packet_rate: u32,
    inter_job_delay: Duration,
    worker_count: usize,
    connect_timeout: Duration,
}

impl ScanConfig {
    pub fn new(
        min_packet_rate: u32,
        inter_job_delay: Duration,
        worker_count: usize,
        connect_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if min_packet_rate == 0 {
            return Err(ConfigError::InvalidPacketRate(min_packet_rate.to_string()));
        }
        if worker_count == 0 {
            return Err(ConfigError::InvalidThreadCount(worker_count.to_string()));
        }
        if connect_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(format!("{connect_timeout:?}")));
        }
        Ok(Self {
            min_packet_rate,
            inter_job_delay,
            worker_count,
            connect_timeout,
        })
    }

    pub fn min_packet_rate(&self) -> u32 {
        self.min_packet_rate
    }

    pub fn inter_job_delay(&self) -> Duration {
        self.inter_job_delay
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Pause each worker takes after every job to honor the packet rate.
    pub fn packet_delay(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.min_packet_rate))
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_packet_rate: DEFAULT_MIN_PACKET_RATE,
            inter_job_delay: Duration::ZERO,
            worker_count: default_worker_count(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Number of available processors, or 1 when it cannot be determined.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Parse a duration such as `250ms`, `1.5s` or `1m30s`.
///
/// Each component is a decimal number followed by one of `ns`, `us` (`µs`),
/// `ms`, `s`, `m`, `h`. A bare `0` is also accepted. Signs are rejected.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(s.to_string());

    let mut rest = s.trim();
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (num, tail) = rest.split_at(num_len);
        if num.is_empty() || num == "." {
            return Err(invalid());
        }
        let value: f64 = num.parse().map_err(|_| invalid())?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3_600e9,
            _ => return Err(invalid()),
        };

        total_nanos += value * scale;
        rest = next;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ScanConfig::default();
        assert_eq!(cfg.min_packet_rate(), 10_000);
        assert_eq!(cfg.inter_job_delay(), Duration::ZERO);
        assert_eq!(cfg.connect_timeout(), Duration::from_millis(300));
        assert!(cfg.worker_count() >= 1);
        assert_eq!(cfg.packet_delay(), Duration::from_micros(100));
    }

    #[test]
    fn rejects_zero_rate_threads_and_timeout() {
        let d = Duration::ZERO;
        let t = DEFAULT_CONNECT_TIMEOUT;
        assert!(matches!(
            ScanConfig::new(0, d, 4, t),
            Err(ConfigError::InvalidPacketRate(_))
        ));
        assert!(matches!(
            ScanConfig::new(100, d, 0, t),
            Err(ConfigError::InvalidThreadCount(_))
        ));
        assert!(matches!(
            ScanConfig::new(100, d, 4, Duration::ZERO),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn packet_delay_is_inverse_of_rate() {
        let cfg = ScanConfig::new(1, Duration::ZERO, 1, DEFAULT_CONNECT_TIMEOUT).unwrap();
        assert_eq!(cfg.packet_delay(), Duration::from_secs(1));
        let cfg = ScanConfig::new(3, Duration::ZERO, 1, DEFAULT_CONNECT_TIMEOUT).unwrap();
        assert_eq!(cfg.packet_delay(), Duration::from_nanos(333_333_333));
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("250us").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_duration("250µs").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_duration("42ns").unwrap(), Duration::from_nanos(42));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        for bad in ["", "5", "ms", "-1s", "1.2.3s", "10x", "1s2", "."] {
            assert!(
                matches!(parse_duration(bad), Err(ConfigError::InvalidDuration(_))),
                "accepted {bad:?}"
            );
        }
    }
}
