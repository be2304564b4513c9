//! Rider position cache for delivery tracking.

use crate::ids::OrderId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A rider position fix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiderLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// RFC 3339.
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

/// Where a position came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixSource {
    Live,
    Simulated,
}

/// Latest known rider position per order.
#[derive(Debug, Clone, Default)]
pub struct RiderTracker {
    fixes: HashMap<OrderId, RiderLocation>,
}

impl RiderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fix, ignoring ones older than what is cached.
    pub fn record(&mut self, order: OrderId, fix: RiderLocation) {
        match self.fixes.get(&order) {
            Some(prev) if is_newer(&prev.timestamp, &fix.timestamp) => {}
            _ => {
                self.fixes.insert(order, fix);
            }
        }
    }

    pub fn latest(&self, order: &OrderId) -> Option<&RiderLocation> {
        self.fixes.get(order)
    }

    pub fn forget(&mut self, order: &OrderId) {
        self.fixes.remove(order);
    }

    /// Live fix if cached, else a point `progress` of the way from
    /// `origin` to `destination` (`[lat, lng]`).
    pub fn position(
        &self,
        order: &OrderId,
        origin: [f64; 2],
        destination: [f64; 2],
        progress: f64,
    ) -> (RiderLocation, FixSource) {
        if let Some(fix) = self.latest(order) {
            return (fix.clone(), FixSource::Live);
        }
        (
            interpolate(origin, destination, progress),
            FixSource::Simulated,
        )
    }
}

/// Linear interpolation between two coordinates, `progress` clamped to 0..=1.
pub fn interpolate(origin: [f64; 2], destination: [f64; 2], progress: f64) -> RiderLocation {
    let t = if progress.is_finite() {
        progress.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let heading = (destination[1] - origin[1])
        .atan2(destination[0] - origin[0])
        .to_degrees()
        .rem_euclid(360.0);
    RiderLocation {
        latitude: origin[0] + (destination[0] - origin[0]) * t,
        longitude: origin[1] + (destination[1] - origin[1]) * t,
        timestamp: chrono::Utc::now().to_rfc3339(),
        speed: None,
        heading: Some(heading),
    }
}

fn is_newer(cached: &str, incoming: &str) -> bool {
    use crate::catalog::parse_timestamp_millis;
    match (parse_timestamp_millis(cached), parse_timestamp_millis(incoming)) {
        (Some(c), Some(i)) => c > i,
        _ => false,
    }
}
