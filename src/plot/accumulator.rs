// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Plot accumulator subscribers.
//!
//! Each accumulator buffers points across the whole run and renders one PNG
//! on `Eof`; there's no incremental/streaming render, since `plotters`
//! draws a chart as a single pass over its series.

use std::path::PathBuf;

use plotters::prelude::*;

use crate::core::{DecodedMessage, IngestError, Result};
use crate::pubsub::Event;

/// Canvas size in pixels, chosen to match a 25cm x 25cm print at 96 DPI.
const CANVAS_PX: u32 = 945;

/// Mean Earth radius in meters, used for the equirectangular projection.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Drive wheel diameter in meters.
const WHEEL_DIAMETER_M: f64 = 0.4064;

/// Final drive gear ratio.
const GEAR_RATIO: f64 = 11.86;

fn field_f64(message: &DecodedMessage, path: &str) -> Option<f64> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = message.get(first)?;
    for segment in segments {
        current = current.as_struct()?.get(segment)?;
    }
    current.as_f64()
}

/// Projects latitude/longitude onto local meters around the track's first
/// observed fix, using an equirectangular approximation valid over a single
/// track's footprint.
fn project(origin: (f64, f64), lat: f64, lon: f64) -> (f64, f64) {
    let (origin_lat, origin_lon) = origin;
    let origin_lat_rad = origin_lat.to_radians();
    let x = EARTH_RADIUS_M * (lon - origin_lon).to_radians() * origin_lat_rad.cos();
    let y = EARTH_RADIUS_M * (lat - origin_lat).to_radians();
    (x, y)
}

/// Converts engine RPM to vehicle speed in meters per second.
fn rpm_to_velocity_mps(rpm: f64) -> f64 {
    rpm * std::f64::consts::PI * WHEEL_DIAMETER_M / (GEAR_RATIO * 60.0)
}

/// Accumulates a lat/lon track and renders it as a scatter plot on `Eof`.
pub struct LatLonPlotAccumulator {
    output_path: PathBuf,
    lat_path: String,
    lon_path: String,
    origin: Option<(f64, f64)>,
    points: Vec<(f64, f64)>,
}

impl LatLonPlotAccumulator {
    /// `lat_path`/`lon_path` are dotted field paths into the decoded
    /// position message (e.g. `"lat"`, `"lon"`, or `"fix.latitude"`).
    pub fn new(output_path: PathBuf, lat_path: impl Into<String>, lon_path: impl Into<String>) -> Self {
        Self {
            output_path,
            lat_path: lat_path.into(),
            lon_path: lon_path.into(),
            origin: None,
            points: Vec::new(),
        }
    }

    fn render(&self) -> Result<()> {
        if self.points.is_empty() {
            return Ok(());
        }
        let root = BitMapBackend::new(&self.output_path, (CANVAS_PX, CANVAS_PX)).into_drawing_area();
        root.fill(&WHITE)
            .map_err(|e| IngestError::plot_render_failure("lat_lon", e.to_string()))?;

        let (min_x, max_x, min_y, max_y) = bounds(&self.points);
        let (axis_min, axis_max) = (min_x.min(min_y), max_x.max(max_y));
        let mut chart = ChartBuilder::on(&root)
            .caption("Track position", ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(axis_min..axis_max, axis_min..axis_max)
            .map_err(|e| IngestError::plot_render_failure("lat_lon", e.to_string()))?;

        chart
            .configure_mesh()
            .x_desc("east (m)")
            .y_desc("north (m)")
            .draw()
            .map_err(|e| IngestError::plot_render_failure("lat_lon", e.to_string()))?;

        chart
            .draw_series(self.points.iter().map(|(x, y)| Circle::new((*x, *y), 2, BLUE.filled())))
            .map_err(|e| IngestError::plot_render_failure("lat_lon", e.to_string()))?;

        root.present()
            .map_err(|e| IngestError::plot_render_failure("lat_lon", e.to_string()))?;
        Ok(())
    }
}

impl crate::pubsub::Subscriber for LatLonPlotAccumulator {
    fn name(&self) -> &str {
        crate::pubsub::routing::LAT_LON_PLOT
    }

    fn handle(&mut self, event: &Event) -> Result<()> {
        let Event::Message { message, .. } = event else {
            return Ok(());
        };
        let (Some(lat), Some(lon)) = (
            field_f64(message, &self.lat_path),
            field_f64(message, &self.lon_path),
        ) else {
            return Ok(());
        };
        if lat == 0.0 || lon == 0.0 {
            return Ok(());
        }
        let origin = *self.origin.get_or_insert((lat, lon));
        self.points.push(project(origin, lat, lon));
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        self.render()
    }
}

/// Accumulates RPM samples converted to velocity and renders a time-series
/// chart on `Eof`.
pub struct VelocityPlotAccumulator {
    output_path: PathBuf,
    rpm_path: String,
    samples: Vec<(f64, f64)>,
    /// Log-time of the first accepted sample; every plotted time is
    /// seconds since this anchor, not seconds since the Unix epoch.
    first_log_time: Option<u64>,
}

impl VelocityPlotAccumulator {
    pub fn new(output_path: PathBuf, rpm_path: impl Into<String>) -> Self {
        Self {
            output_path,
            rpm_path: rpm_path.into(),
            samples: Vec::new(),
            first_log_time: None,
        }
    }

    fn render(&self) -> Result<()> {
        if self.samples.is_empty() {
            return Ok(());
        }
        let root = BitMapBackend::new(&self.output_path, (CANVAS_PX, CANVAS_PX)).into_drawing_area();
        root.fill(&WHITE)
            .map_err(|e| IngestError::plot_render_failure("velocity", e.to_string()))?;

        let (min_x, max_x, _, max_y) = bounds(&self.samples);
        let mut chart = ChartBuilder::on(&root)
            .caption("Velocity", ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(min_x..max_x, 0.0..max_y.max(1.0))
            .map_err(|e| IngestError::plot_render_failure("velocity", e.to_string()))?;

        chart
            .configure_mesh()
            .x_desc("time (s)")
            .y_desc("velocity (m/s)")
            .draw()
            .map_err(|e| IngestError::plot_render_failure("velocity", e.to_string()))?;

        chart
            .draw_series(LineSeries::new(self.samples.iter().copied(), &RED))
            .map_err(|e| IngestError::plot_render_failure("velocity", e.to_string()))?;

        root.present()
            .map_err(|e| IngestError::plot_render_failure("velocity", e.to_string()))?;
        Ok(())
    }
}

impl crate::pubsub::Subscriber for VelocityPlotAccumulator {
    fn name(&self) -> &str {
        crate::pubsub::routing::VELOCITY_PLOT
    }

    fn handle(&mut self, event: &Event) -> Result<()> {
        let Event::Message { message, log_time, .. } = event else {
            return Ok(());
        };
        let Some(rpm) = field_f64(message, &self.rpm_path) else {
            return Ok(());
        };
        if rpm == 0.0 {
            return Ok(());
        }
        let anchor = *self.first_log_time.get_or_insert(*log_time);
        let seconds = log_time.saturating_sub(anchor) as f64 / 1_000_000_000.0;
        self.samples.push((seconds, rpm_to_velocity_mps(rpm)));
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        self.render()
    }
}

fn bounds(points: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    let mut min_x = f64::MAX;
    let mut max_x = f64::MIN;
    let mut min_y = f64::MAX;
    let mut max_y = f64::MIN;
    for (x, y) in points {
        min_x = min_x.min(*x);
        max_x = max_x.max(*x);
        min_y = min_y.min(*y);
        max_y = max_y.max(*y);
    }
    if (max_x - min_x).abs() < f64::EPSILON {
        max_x = min_x + 1.0;
    }
    if (max_y - min_y).abs() < f64::EPSILON {
        max_y = min_y + 1.0;
    }
    (min_x, max_x, min_y, max_y)
}
