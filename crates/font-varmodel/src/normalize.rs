//! Axis coordinate normalization and piecewise-linear axis maps.

use crate::{Location, designspace::Axis};

/// Normalize a value against a (lower, default, upper) triple.
///
/// Values below the default map to [-1, 0], values above to [0, 1], and
/// values outside the range are clamped.
///
/// Axes whose default lies outside their range are normalized with a fixed
/// compatibility formula instead of failing: with `lower > default`, values
/// at or below `lower` map to 0 and the rest scale by `upper - lower`; with
/// `upper < default` the mirror image applies.
pub fn normalize_value(value: f64, lower: f64, default: f64, upper: f64) -> f64 {
    if lower > default {
        if value <= lower || upper <= lower {
            return 0.0;
        }
        return (value.min(upper) - lower) / (upper - lower);
    }
    if upper < default {
        if value >= upper || upper <= lower {
            return 0.0;
        }
        return (value.max(lower) - upper) / (upper - lower);
    }
    if lower == upper {
        return 0.0;
    }

    let value = value.clamp(lower, upper);
    if value < default {
        (value - default) / (default - lower)
    } else if value > default {
        (value - default) / (upper - default)
    } else {
        0.0
    }
}

/// Map a normalized value back to the (lower, default, upper) range.
pub fn unnormalize_value(value: f64, lower: f64, default: f64, upper: f64) -> f64 {
    if value < 0.0 {
        default + value * (default - lower)
    } else {
        default + value * (upper - default)
    }
}

/// Normalize every axis of `location`.
///
/// Axes missing from the location normalize to 0; coordinates for axes not
/// in `axes` are dropped.
pub fn normalize_location(location: &Location, axes: &[Axis]) -> Location {
    axes.iter()
        .map(|axis| {
            let value = location.get(&axis.name).copied().unwrap_or(axis.default_value);
            (axis.name.clone(), axis.normalize(value))
        })
        .collect()
}

/// Inverse of [`normalize_location`]; missing axes come back at their default.
pub fn unnormalize_location(location: &Location, axes: &[Axis]) -> Location {
    axes.iter()
        .map(|axis| {
            let value = location
                .get(&axis.name)
                .map(|&value| axis.unnormalize(value))
                .unwrap_or(axis.default_value);
            (axis.name.clone(), value)
        })
        .collect()
}

/// Evaluate a piecewise-linear map given as (input, output) pairs.
///
/// Between keys the map interpolates linearly. Outside the key range it
/// extrapolates with slope 1 from the nearest key, not with the slope of the
/// outermost segment. An empty map is the identity.
pub fn piecewise_linear_map(value: f64, mapping: &[(f64, f64)]) -> f64 {
    if mapping.is_empty() {
        return value;
    }
    if let Some(&(_, output)) = mapping.iter().find(|(input, _)| *input == value) {
        return output;
    }

    let lowest = mapping.iter().copied().min_by(|a, b| a.0.total_cmp(&b.0));
    let highest = mapping.iter().copied().max_by(|a, b| a.0.total_cmp(&b.0));
    let (Some((low_in, low_out)), Some((high_in, high_out))) = (lowest, highest) else {
        return value;
    };
    if value < low_in {
        return value + low_out - low_in;
    }
    if value > high_in {
        return value + high_out - high_in;
    }

    let below = mapping
        .iter()
        .filter(|(input, _)| *input < value)
        .max_by(|a, b| a.0.total_cmp(&b.0));
    let above = mapping
        .iter()
        .filter(|(input, _)| *input > value)
        .min_by(|a, b| a.0.total_cmp(&b.0));
    match (below, above) {
        (Some(&(a, va)), Some(&(b, vb))) => va + (vb - va) * (value - a) / (b - a),
        _ => value,
    }
}

/// Apply each axis' user-to-source mapping to `location`.
///
/// Coordinates for axes without a mapping, or not in `axes`, pass through.
pub fn map_forward(location: &Location, axes: &[Axis]) -> Location {
    map_with(location, axes, |value, axis| piecewise_linear_map(value, &axis.mapping))
}

/// Apply the inverse of each axis' mapping to `location`.
pub fn map_backward(location: &Location, axes: &[Axis]) -> Location {
    map_with(location, axes, |value, axis| {
        let inverted: Vec<(f64, f64)> =
            axis.mapping.iter().map(|&(input, output)| (output, input)).collect();
        piecewise_linear_map(value, &inverted)
    })
}

fn map_with(location: &Location, axes: &[Axis], map: impl Fn(f64, &Axis) -> f64) -> Location {
    location
        .iter()
        .map(|(name, &value)| {
            let mapped = axes
                .iter()
                .find(|axis| &axis.name == name && !axis.mapping.is_empty())
                .map_or(value, |axis| map(value, axis));
            (name.clone(), mapped)
        })
        .collect()
}
