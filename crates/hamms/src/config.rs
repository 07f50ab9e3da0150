//! Runtime settings shared by every behavior.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::DEFAULT_BASE_PORT;

const DEFAULT_SHORT_DRIP: Duration = Duration::from_secs(5);
const DEFAULT_LONG_DRIP: Duration = Duration::from_secs(30);
const DEFAULT_SLEEP: Duration = Duration::from_secs(5);
const DEFAULT_DROP_RATE: f64 = 0.05;

/// Settings for a hamms instance, see [`HammsConfig::builder`].
#[derive(Debug, Clone, PartialEq)]
pub struct HammsConfig {
    host: IpAddr,
    base_port: u16,
    short_drip: Duration,
    long_drip: Duration,
    default_sleep: Duration,
    drop_rate: f64,
    seed: Option<u64>,
}

impl HammsConfig {
    pub fn builder() -> HammsConfigBuilder {
        HammsConfigBuilder::new()
    }

    /// Address every listener binds to.
    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn base_port(&self) -> u16 {
        self.base_port
    }

    /// Spacing between bytes on the fast byte-drip port.
    pub fn short_drip(&self) -> Duration {
        self.short_drip
    }

    /// Spacing between bytes on the slow byte-drip port.
    pub fn long_drip(&self) -> Duration {
        self.long_drip
    }

    /// Delay of the sleep behavior when the request names none.
    pub fn default_sleep(&self) -> Duration {
        self.default_sleep
    }

    /// Fraction of requests dropped when the request names no `failrate`.
    pub fn drop_rate(&self) -> f64 {
        self.drop_rate
    }

    /// Seed for the drop-random behavior, `None` seeds from the operating system.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

impl Default for HammsConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone)]
pub struct HammsConfigBuilder {
    host: IpAddr,
    base_port: u16,
    short_drip: Duration,
    long_drip: Duration,
    default_sleep: Duration,
    drop_rate: f64,
    seed: Option<u64>,
}

impl HammsConfigBuilder {
    fn new() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            base_port: DEFAULT_BASE_PORT,
            short_drip: DEFAULT_SHORT_DRIP,
            long_drip: DEFAULT_LONG_DRIP,
            default_sleep: DEFAULT_SLEEP,
            drop_rate: DEFAULT_DROP_RATE,
            seed: None,
        }
    }

    pub fn host(mut self, host: impl Into<IpAddr>) -> Self {
        self.host = host.into();
        self
    }

    pub fn base_port(mut self, base_port: u16) -> Self {
        self.base_port = base_port;
        self
    }

    pub fn drip_units(mut self, short_drip: Duration, long_drip: Duration) -> Self {
        self.short_drip = short_drip;
        self.long_drip = long_drip;
        self
    }

    pub fn default_sleep(mut self, default_sleep: Duration) -> Self {
        self.default_sleep = default_sleep;
        self
    }

    pub fn drop_rate(mut self, drop_rate: f64) -> Self {
        self.drop_rate = drop_rate;
        self
    }

    pub fn seed(mut self, seed: impl Into<Option<u64>>) -> Self {
        self.seed = seed.into();
        self
    }

    pub fn build(self) -> HammsConfig {
        HammsConfig {
            host: self.host,
            base_port: self.base_port,
            short_drip: self.short_drip,
            long_drip: self.long_drip,
            default_sleep: self.default_sleep,
            drop_rate: self.drop_rate,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HammsConfig::default();
        assert_eq!(config.base_port(), 5500);
        assert_eq!(config.short_drip(), Duration::from_secs(5));
        assert_eq!(config.long_drip(), Duration::from_secs(30));
        assert_eq!(config.default_sleep(), Duration::from_secs(5));
        assert!((config.drop_rate() - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.seed(), None);
        assert!(config.host().is_unspecified());
    }

    #[test]
    fn builder_overrides() {
        let config = HammsConfig::builder()
            .host(Ipv4Addr::LOCALHOST)
            .base_port(14100)
            .drip_units(Duration::from_millis(10), Duration::from_millis(20))
            .seed(42)
            .build();

        assert_eq!(config.host(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.base_port(), 14100);
        assert_eq!(config.long_drip(), Duration::from_millis(20));
        assert_eq!(config.seed(), Some(42));
    }
}
