//! Flow figures derived from commissioning check readings.
//!
//! Depths are in millimetres, velocities in m/s, flows in L/s. Readings of
//! zero are treated as "not taken" and left out of the averages.

use std::f64::consts::PI;

use crate::models::VerificationReading;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlowFigures {
    pub avg_depth_meas_mm: f64,
    pub avg_depth_meter_mm: f64,
    pub avg_vel_meas_ms: f64,
    pub avg_vel_meter_ms: f64,
    pub flow_meas_lps: f64,
    pub flow_meter_lps: f64,
    pub flow_diff_lps: f64,
    pub flow_diff_percent: f64,
}

/// Primary check readings taken at commissioning
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimaryReadings {
    pub depth_meas_mm: f64,
    pub depth_meter_mm: f64,
    pub vel_meas_ms: f64,
    pub vel_meter_ms: f64,
}

/// Wetted cross-section of a part-full circular pipe in m²
pub fn wetted_area_circular_m2(depth_mm: f64, diameter_mm: f64) -> f64 {
    if diameter_mm <= 0.0 || depth_mm <= 0.0 {
        return 0.0;
    }

    let d = diameter_mm / 1000.0;
    let r = d / 2.0;
    let h = depth_mm / 1000.0;

    if h >= d {
        return PI * r * r;
    }

    r * r * ((r - h) / r).acos() - (r - h) * (2.0 * r * h - h * h).sqrt()
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn taken(first: f64, rest: impl Iterator<Item = f64>) -> Vec<f64> {
    std::iter::once(first).chain(rest).filter(|v| *v > 0.0).collect()
}

pub fn calculate_flow(
    pipe_diameter_mm: f64,
    primary: PrimaryReadings,
    extra: &[VerificationReading],
) -> FlowFigures {
    let d_meas = taken(primary.depth_meas_mm, extra.iter().map(|r| r.depth_meas_mm));
    let d_meter = taken(primary.depth_meter_mm, extra.iter().map(|r| r.depth_meter_mm));
    let v_meas = taken(primary.vel_meas_ms, extra.iter().map(|r| r.vel_meas_ms));
    let v_meter = taken(primary.vel_meter_ms, extra.iter().map(|r| r.vel_meter_ms));

    let avg_depth_meas_mm = average(&d_meas);
    let avg_depth_meter_mm = average(&d_meter);
    let avg_vel_meas_ms = average(&v_meas);
    let avg_vel_meter_ms = average(&v_meter);

    let flow_meas_lps =
        wetted_area_circular_m2(avg_depth_meas_mm, pipe_diameter_mm) * avg_vel_meas_ms * 1000.0;
    let flow_meter_lps =
        wetted_area_circular_m2(avg_depth_meter_mm, pipe_diameter_mm) * avg_vel_meter_ms * 1000.0;
    let flow_diff_lps = flow_meter_lps - flow_meas_lps;
    let flow_diff_percent = if flow_meas_lps != 0.0 {
        flow_diff_lps / flow_meas_lps * 100.0
    } else {
        0.0
    };

    FlowFigures {
        avg_depth_meas_mm,
        avg_depth_meter_mm,
        avg_vel_meas_ms,
        avg_vel_meter_ms,
        flow_meas_lps,
        flow_meter_lps,
        flow_diff_lps,
        flow_diff_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_full_and_half_pipe_areas() {
        let full = wetted_area_circular_m2(300.0, 300.0);
        assert!(approx(full, PI * 0.15 * 0.15));

        let surcharged = wetted_area_circular_m2(500.0, 300.0);
        assert!(approx(surcharged, full));

        let half = wetted_area_circular_m2(150.0, 300.0);
        assert!(approx(half, full / 2.0));
    }

    #[test]
    fn test_zero_inputs_give_zero_area() {
        assert_eq!(wetted_area_circular_m2(0.0, 300.0), 0.0);
        assert_eq!(wetted_area_circular_m2(100.0, 0.0), 0.0);
    }

    #[test]
    fn test_extra_readings_are_averaged_and_zeros_skipped() {
        let primary = PrimaryReadings {
            depth_meas_mm: 100.0,
            depth_meter_mm: 110.0,
            vel_meas_ms: 0.5,
            vel_meter_ms: 0.0,
        };
        let extra = vec![VerificationReading {
            depth_meas_mm: 120.0,
            depth_meter_mm: 0.0,
            vel_meas_ms: 0.7,
            vel_meter_ms: 0.6,
            comment: String::new(),
        }];

        let figures = calculate_flow(300.0, primary, &extra);
        assert!(approx(figures.avg_depth_meas_mm, 110.0));
        assert!(approx(figures.avg_depth_meter_mm, 110.0));
        assert!(approx(figures.avg_vel_meas_ms, 0.6));
        assert!(approx(figures.avg_vel_meter_ms, 0.6));
        assert!(approx(figures.flow_meas_lps, figures.flow_meter_lps));
        assert!(approx(figures.flow_diff_percent, 0.0));
    }

    #[test]
    fn test_no_measured_flow_means_no_percentage() {
        let primary = PrimaryReadings {
            depth_meter_mm: 100.0,
            vel_meter_ms: 1.0,
            ..Default::default()
        };
        let figures = calculate_flow(300.0, primary, &[]);
        assert_eq!(figures.flow_meas_lps, 0.0);
        assert!(figures.flow_meter_lps > 0.0);
        assert_eq!(figures.flow_diff_percent, 0.0);
    }
}
