//! # Constants and type definitions for aquiflow
//!
//! This module centralizes the **unit conversions**, **analysis defaults**, and **numerical
//! thresholds** shared by the grid, neighborhood, fitting, and flow modules.
//!
//! ## Overview
//!
//! - Unit conversions (feet ↔ meters, degrees ↔ radians)
//! - Default analysis parameters (spacing, radius, required neighbor count)
//! - Conic model dimensions
//! - Robust-regression tuning constants
//!
//! Coordinates are planar projected coordinates in **meters** (e.g. a UTM zone); heads
//! are elevations in **meters**.

// -------------------------------------------------------------------------------------------------
// Unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for angular wrapping
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// International foot → meters
pub const FEET_TO_METERS: f64 = 0.3048;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

// -------------------------------------------------------------------------------------------------
// Conic potential model
// -------------------------------------------------------------------------------------------------

/// Number of free parameters in the conic potential model `[a, b, c, d, e, f]`.
pub const CONIC_PARAMETERS: usize = 6;

/// Length of an aquifer code (Minnesota Geological Survey style, e.g. `"QBAA"`).
pub const AQUIFER_CODE_LEN: usize = 4;

// -------------------------------------------------------------------------------------------------
// Analysis defaults
// -------------------------------------------------------------------------------------------------

/// Default grid spacing between target locations [m].
pub const DEFAULT_SPACING: f64 = 1000.0;

/// Default search radius around each target [m].
pub const DEFAULT_RADIUS: f64 = 3000.0;

/// Default minimum number of neighboring wells.
pub const DEFAULT_REQUIRED: usize = 25;

/// Default ceiling on the design-matrix condition number.
pub const DEFAULT_MAX_CONDITION_NUMBER: f64 = 1e10;

/// Default cap on IRLS iterations for robust methods.
pub const DEFAULT_ROBUST_MAX_ITERATIONS: usize = 50;

/// Default relative coefficient change that stops IRLS.
pub const DEFAULT_ROBUST_TOLERANCE: f64 = 1e-8;

/// Half-width of the direction window used for the "p10" confidence value [rad].
pub const P10_HALF_WIDTH: f64 = 10.0 * RADEG;

// -------------------------------------------------------------------------------------------------
// Robust regression
// -------------------------------------------------------------------------------------------------

/// Tukey biweight tuning constant (95 % efficiency under normal errors).
pub const TUKEY_C: f64 = 4.685;

/// Huber tuning constant (95 % efficiency under normal errors).
pub const HUBER_T: f64 = 1.345;

/// Consistency constant turning a MAD into a normal standard deviation.
pub const MAD_NORMAL_CONSISTENCY: f64 = 0.6745;

/// Inverse-distance weights use `max(d, floor · radius)` to stay bounded.
pub const INVERSE_DISTANCE_FLOOR: f64 = 0.01;

/// Vertices used to discretise a circular venue.
pub const CIRCLE_VERTICES: usize = 128;
