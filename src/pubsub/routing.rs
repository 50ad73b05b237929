// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Topic-to-subscriber routing table.
//!
//! Routing is data, not a chain of `if topic == ...` branches scattered
//! through the engine: the mapping from a topic to the subscribers that
//! should see it is built once, at pipeline construction, from the two
//! configured channel names (§4.C), and `RoutingTable::route` is the only
//! place that consults it.

use std::collections::HashMap;

/// Registered subscriber names.
pub const LAT_LON_PLOT: &str = "lat_lon_plot";
pub const VELOCITY_PLOT: &str = "velocity_plot";
pub const MATLAB_WRITER: &str = "matlab_writer";

/// Every subscriber that must see `Init`/`Eof` regardless of topic routing.
pub const ALL_SUBSCRIBERS: &[&str] = &[LAT_LON_PLOT, VELOCITY_PLOT, MATLAB_WRITER];

/// A topic -> subscriber-names table, built once from the two configured
/// channel names and consulted for every message.
///
/// - the configured position topic routes to the lat/lon plot and the raw
///   writer
/// - the configured vehicle-state topic routes to the velocity plot and the
///   raw writer
/// - everything else still routes to the raw writer, which records every
///   signal in the run regardless of topic
pub struct RoutingTable {
    routes: HashMap<String, Vec<&'static str>>,
    default_route: Vec<&'static str>,
}

impl RoutingTable {
    /// Builds the table from the schema names carrying GPS position and
    /// vehicle wheel-speed state (§8's worked examples: `pos.GPS`,
    /// `veh.VehicleData`). A deployment with differently-named schemas
    /// passes its own names here; the mapping itself never changes.
    pub fn new(position_topic: impl Into<String>, vehicle_state_topic: impl Into<String>) -> Self {
        let mut routes = HashMap::new();
        routes.insert(position_topic.into(), vec![LAT_LON_PLOT, MATLAB_WRITER]);
        routes.insert(vehicle_state_topic.into(), vec![VELOCITY_PLOT, MATLAB_WRITER]);
        Self {
            routes,
            default_route: vec![MATLAB_WRITER],
        }
    }

    /// Which subscribers should receive a message published on `topic`.
    pub fn route(&self, topic: &str) -> &[&'static str] {
        self.routes.get(topic).map(Vec::as_slice).unwrap_or(&self.default_route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RoutingTable {
        RoutingTable::new("pos.GPS", "veh.VehicleData")
    }

    #[test]
    fn position_topic_routes_to_lat_lon_plot_and_writer() {
        assert_eq!(table().route("pos.GPS"), &[LAT_LON_PLOT, MATLAB_WRITER]);
    }

    #[test]
    fn vehicle_state_topic_routes_to_velocity_plot_and_writer() {
        assert_eq!(table().route("veh.VehicleData"), &[VELOCITY_PLOT, MATLAB_WRITER]);
    }

    #[test]
    fn other_topics_route_to_writer_only() {
        assert_eq!(table().route("veh.BrakeTemp"), &[MATLAB_WRITER]);
    }

    #[test]
    fn configured_names_are_exact_matches_not_suffix_patterns() {
        let table = table();
        assert_eq!(table.route("other.pos.GPS"), &[MATLAB_WRITER]);
    }
}
