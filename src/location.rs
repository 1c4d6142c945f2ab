// src/location.rs
//
// Cached device position. The frame path only ever reads the snapshot;
// whatever acquires positions (a GPS worker, a fixed installation value
// from config) writes it out of band. A stale snapshot is acceptable at
// finalization time, so reads never block on a lookup.

use crate::types::{GeoPosition, LocationConfig};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

#[derive(Clone)]
pub struct LocationProvider {
    current: Arc<RwLock<Option<GeoPosition>>>,
}

impl LocationProvider {
    pub fn from_config(config: &LocationConfig) -> Self {
        let initial = match (config.latitude, config.longitude) {
            (Some(latitude), Some(longitude)) => {
                info!("Device position: {:.4}, {:.4}", latitude, longitude);
                Some(GeoPosition {
                    latitude,
                    longitude,
                })
            }
            (None, None) => {
                warn!("No device position configured; events will carry a placeholder");
                None
            }
            _ => {
                warn!("Partial coordinates in config (need both latitude and longitude); treating position as unavailable");
                None
            }
        };
        Self {
            current: Arc::new(RwLock::new(initial)),
        }
    }

    /// Last-known position, possibly stale, possibly absent.
    pub fn snapshot(&self) -> Option<GeoPosition> {
        *self.current.read().expect("location lock poisoned")
    }

    /// Out-of-band update from whatever supplies fresh fixes.
    pub fn update(&self, position: GeoPosition) {
        *self.current.write().expect("location lock poisoned") = Some(position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_position_is_available() {
        let provider = LocationProvider::from_config(&LocationConfig {
            latitude: Some(51.5),
            longitude: Some(-0.12),
        });
        let pos = provider.snapshot().unwrap();
        assert!((pos.latitude - 51.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_position_is_unavailable() {
        let provider = LocationProvider::from_config(&LocationConfig {
            latitude: None,
            longitude: None,
        });
        assert!(provider.snapshot().is_none());
    }

    #[test]
    fn test_partial_coordinates_are_unavailable() {
        let provider = LocationProvider::from_config(&LocationConfig {
            latitude: Some(51.5),
            longitude: None,
        });
        assert!(provider.snapshot().is_none());
    }

    #[test]
    fn test_update_is_visible_through_clones() {
        let provider = LocationProvider::from_config(&LocationConfig {
            latitude: None,
            longitude: None,
        });
        let handle = provider.clone();
        handle.update(GeoPosition {
            latitude: 40.7,
            longitude: -74.0,
        });
        assert!((provider.snapshot().unwrap().latitude - 40.7).abs() < 1e-9);
    }
}
