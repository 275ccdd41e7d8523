//! Configuration types for the TSPV processor

use std::time::Duration;

use crate::protocol::PACKET_LENGTH;

/// Processor-level configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Exact packet length accepted by the decoder (default: 20)
    pub packet_length: usize,

    /// How often the idle run loop re-checks the stop signal
    pub tick_interval: Duration,

    /// Upper bound on backfill requests per gap (None = unlimited)
    pub max_backfill: Option<u8>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            packet_length: PACKET_LENGTH,
            tick_interval: Duration::from_secs(1),
            max_backfill: None,
        }
    }
}

impl ProcessorConfig {
    /// Create a configuration with a custom tick interval
    pub fn with_tick_interval(tick_interval: Duration) -> Self {
        Self {
            tick_interval,
            ..Default::default()
        }
    }

    /// Create a configuration that caps backfill requests per gap
    pub fn with_max_backfill(max_backfill: u8) -> Self {
        Self {
            max_backfill: Some(max_backfill),
            ..Default::default()
        }
    }

    /// Create a configuration for a non-standard packet length
    pub fn with_packet_length(packet_length: usize) -> Self {
        Self {
            packet_length,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processor_config_default() {
        let config = ProcessorConfig::default();
        assert_eq!(config.packet_length, 20);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert!(config.max_backfill.is_none());
    }

    #[test]
    fn test_processor_config_builders() {
        let config = ProcessorConfig::with_tick_interval(Duration::from_millis(5));
        assert_eq!(config.tick_interval, Duration::from_millis(5));
        assert_eq!(config.packet_length, 20);

        assert_eq!(ProcessorConfig::with_max_backfill(8).max_backfill, Some(8));
        assert_eq!(ProcessorConfig::with_packet_length(24).packet_length, 24);
    }
}
