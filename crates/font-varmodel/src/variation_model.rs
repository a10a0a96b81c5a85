//! Variation model for computing master deltas.
//!
//! Implements the core algorithm for deciding how much each master
//! contributes at any location of the design space. Masters are sorted so
//! that a master can only be influenced by masters before it, each master
//! gets a support region, and the resulting lower-triangular weight matrix
//! converts master values to deltas and back.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, log_enabled, trace};
use ordered_float::OrderedFloat;

use crate::{
    Location,
    error::{Error, Result},
    payload::Blend,
};

/// Sort position for axes missing from the axis order hint.
const UNORDERED_AXIS: usize = 0x10000;

/// The (lower, peak, upper) influence of a master on one axis.
///
/// The contribution is 0 at `lower`, 1 at `peak`, and 0 again at `upper`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tent {
    pub lower: f64,
    pub peak: f64,
    pub upper: f64,
}

impl Tent {
    pub fn new(lower: f64, peak: f64, upper: f64) -> Self {
        Self { lower, peak, upper }
    }

    /// Whether an OpenType variation region could express this tent.
    fn is_ot_encodable(&self) -> bool {
        if self.lower > self.peak || self.peak > self.upper {
            return false;
        }
        !(self.lower < 0.0 && self.upper > 0.0)
    }

    fn scalar_at(&self, value: f64) -> f64 {
        let Tent { lower, peak, upper } = *self;
        if value == peak {
            1.0
        } else if value <= lower || upper <= value {
            0.0
        } else if value < peak {
            (value - lower) / (peak - lower)
        } else {
            (value - upper) / (peak - upper)
        }
    }
}

impl From<(f64, f64, f64)> for Tent {
    fn from((lower, peak, upper): (f64, f64, f64)) -> Self {
        Self::new(lower, peak, upper)
    }
}

/// The region of design space over which one master has influence.
///
/// Axes without a tent do not limit the region.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Support {
    tents: BTreeMap<String, Tent>,
}

impl Support {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, axis: &str, tent: impl Into<Tent>) {
        self.tents.insert(axis.to_string(), tent.into());
    }

    pub fn get(&self, axis: &str) -> Option<&Tent> {
        self.tents.get(axis)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Tent)> {
        self.tents.iter()
    }

    /// The default master's support covers the whole space.
    pub fn is_default(&self) -> bool {
        self.tents.is_empty()
    }

    /// The OpenType-compatible scalar of this support at `location`.
    pub fn scalar_at(&self, location: &Location) -> f64 {
        support_scalar(location, self, true)
    }

    fn same_axes(&self, other: &Support) -> bool {
        self.tents.len() == other.tents.len() && self.tents.keys().eq(other.tents.keys())
    }
}

impl<S: Into<String>, T: Into<Tent>> FromIterator<(S, T)> for Support {
    fn from_iter<I: IntoIterator<Item = (S, T)>>(iter: I) -> Self {
        Self {
            tents: iter.into_iter().map(|(axis, tent)| (axis.into(), tent.into())).collect(),
        }
    }
}

/// Compute the influence of `support` at `location`.
///
/// The result is the product of the tents of every axis in `support`,
/// reading missing coordinates as 0. With `ot` set, tents peaking at 0 (and
/// tents an OpenType region cannot encode) are ignored, since OpenType
/// variation data cannot depend on an axis sitting at its default.
pub fn support_scalar(location: &Location, support: &Support, ot: bool) -> f64 {
    let mut scalar = 1.0;
    for (axis, tent) in support.iter() {
        if ot && (tent.peak == 0.0 || !tent.is_ot_encodable()) {
            continue;
        }
        let value = location.get(axis).copied().unwrap_or(0.0);
        let axis_scalar = tent.scalar_at(value);
        if axis_scalar == 0.0 {
            return 0.0;
        }
        scalar *= axis_scalar;
    }
    scalar
}

/// Variation model for computing deltas from master values.
///
/// Master values are passed in the order of the locations given to
/// [`VariationModel::new`]; deltas come out in the model's sorted order.
#[derive(Debug, Clone, PartialEq)]
pub struct VariationModel {
    axis_order: Vec<String>,
    /// Master locations in sorted order, with zero coordinates removed
    locations: Vec<Location>,
    /// mapping[original index] = sorted index
    mapping: Vec<usize>,
    /// reverse_mapping[sorted index] = original index
    reverse_mapping: Vec<usize>,
    supports: Vec<Support>,
    /// delta_weights[i] holds (j, weight) for every earlier master j influencing master i
    delta_weights: Vec<Vec<(usize, f64)>>,
}

impl VariationModel {
    /// Create a model from normalized master locations.
    ///
    /// `axis_order` lists axes whose masters should sort first; it may be
    /// empty.
    ///
    /// # Errors
    ///
    /// - `Error::LocationsNotUnique` if two locations are the same
    /// - `Error::MissingBaseSource` if no location is at the default
    pub fn new(locations: &[Location], axis_order: &[String]) -> Result<Self> {
        let stripped: Vec<Location> = locations
            .iter()
            .map(|location| {
                location
                    .iter()
                    .filter(|(_, value)| **value != 0.0)
                    .map(|(axis, value)| (axis.clone(), *value))
                    .collect()
            })
            .collect();

        let mut seen = HashSet::new();
        for location in &stripped {
            let key: Vec<(&str, OrderedFloat<f64>)> = location
                .iter()
                .map(|(axis, value)| (axis.as_str(), OrderedFloat(*value)))
                .collect();
            if !seen.insert(key) {
                return Err(Error::LocationsNotUnique);
            }
        }
        if !stripped.iter().any(Location::is_empty) {
            return Err(Error::MissingBaseSource);
        }

        let sorter = LocationSorter::new(&stripped, axis_order);
        let mut reverse_mapping: Vec<usize> = (0..stripped.len()).collect();
        reverse_mapping.sort_by_cached_key(|&index| sorter.key_for(&stripped[index]));

        let mut mapping = vec![0; stripped.len()];
        for (sorted, &original) in reverse_mapping.iter().enumerate() {
            mapping[original] = sorted;
        }

        let sorted: Vec<Location> =
            reverse_mapping.iter().map(|&index| stripped[index].clone()).collect();
        let supports = master_supports(&sorted);
        let delta_weights = delta_weights(&sorted, &supports);

        debug!(
            "Variation model: {} masters, {} delta weights",
            sorted.len(),
            delta_weights.iter().map(Vec::len).sum::<usize>()
        );
        if log_enabled!(log::Level::Trace) {
            for (location, support) in sorted.iter().zip(&supports) {
                trace!("  {location:?} {support:?}");
            }
        }

        Ok(Self {
            axis_order: axis_order.to_vec(),
            locations: sorted,
            mapping,
            reverse_mapping,
            supports,
            delta_weights,
        })
    }

    /// Number of masters in the model.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn axis_order(&self) -> &[String] {
        &self.axis_order
    }

    /// Master locations in sorted order.
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// Original master index to sorted index.
    pub fn mapping(&self) -> &[usize] {
        &self.mapping
    }

    /// Sorted index to original master index.
    pub fn reverse_mapping(&self) -> &[usize] {
        &self.reverse_mapping
    }

    /// Supports in sorted order.
    pub fn supports(&self) -> &[Support] {
        &self.supports
    }

    pub fn delta_weights(&self) -> &[Vec<(usize, f64)>] {
        &self.delta_weights
    }

    /// Compute deltas from master values.
    ///
    /// `master_values` are indexed by original master index. The returned
    /// deltas are in sorted order and reproduce every master value through
    /// [`interpolate_from_deltas`](Self::interpolate_from_deltas).
    pub fn get_deltas<V: Blend>(&self, master_values: &[V]) -> Result<Vec<V>> {
        self.check_count(master_values.len())?;

        let mut deltas: Vec<V> = Vec::with_capacity(master_values.len());
        for (index, weights) in self.delta_weights.iter().enumerate() {
            let mut delta = master_values[self.reverse_mapping[index]].clone();
            // Subtract what earlier masters already contribute at this location
            for &(prev_index, weight) in weights {
                let prev = &deltas[prev_index];
                delta = if weight == 1.0 {
                    delta.try_sub(prev)?
                } else {
                    delta.try_sub(&prev.scale(weight))?
                };
            }
            deltas.push(delta);
        }
        Ok(deltas)
    }

    /// The support scalar of every master at a normalized location, in sorted order.
    pub fn get_scalars(&self, location: &Location) -> Vec<f64> {
        self.supports.iter().map(|support| support.scalar_at(location)).collect()
    }

    /// Evaluate the model at a normalized location.
    pub fn interpolate_from_deltas<V: Blend>(&self, location: &Location, deltas: &[V]) -> Result<V> {
        self.check_count(deltas.len())?;
        blend(deltas, &self.get_scalars(location))
    }

    /// How much each master contributes to the value at `location`.
    ///
    /// The coefficients are in original master order and apply to raw master
    /// values, so `Σ contribution[i] · value[i]` equals the interpolated
    /// value. They may be negative.
    pub fn get_source_contributions(&self, location: &Location) -> Vec<f64> {
        let mut scalars = self.get_scalars(location);
        for index in (0..scalars.len()).rev() {
            let scalar = scalars[index];
            for &(prev_index, weight) in &self.delta_weights[index] {
                scalars[prev_index] -= scalar * weight;
            }
        }
        self.mapping.iter().map(|&sorted| scalars[sorted]).collect()
    }

    /// Evaluate the model directly from master values, without deltas.
    pub fn interpolate_from_sources<V: Blend>(&self, location: &Location, master_values: &[V]) -> Result<V> {
        self.check_count(master_values.len())?;
        blend(master_values, &self.get_source_contributions(location))
    }

    fn check_count(&self, actual: usize) -> Result<()> {
        if actual != self.locations.len() {
            return Err(Error::SourceCountMismatch { expected: self.locations.len(), actual });
        }
        Ok(())
    }
}

/// Weighted sum of `values`; zero weights are skipped.
fn blend<V: Blend>(values: &[V], scalars: &[f64]) -> Result<V> {
    let mut result: Option<V> = None;
    for (value, &scalar) in values.iter().zip(scalars) {
        if scalar == 0.0 {
            continue;
        }
        let contribution = if scalar == 1.0 { value.clone() } else { value.scale(scalar) };
        result = Some(match result {
            None => contribution,
            Some(acc) => acc.try_add(&contribution)?,
        });
    }
    Ok(result.unwrap_or_else(|| values[0].scale(0.0)))
}

/// Orders master locations so that no master can influence an earlier one.
///
/// From most to least influential: the default master, masters on a single
/// axis, then masters off-axis on more and more axes. Within a rank,
/// coordinates shared with on-axis masters sort first, then the hinted axis
/// order, then axis names, signs and magnitudes for a deterministic result.
struct LocationSorter<'a> {
    axis_order: &'a [String],
    axis_points: HashMap<&'a str, HashSet<OrderedFloat<f64>>>,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct LocationSortKey {
    rank: usize,
    on_axis_points: isize,
    known_axes: Vec<usize>,
    ordered_axes: Vec<String>,
    axis_value_signs: Vec<i8>,
    axis_value_abs: Vec<OrderedFloat<f64>>,
}

impl<'a> LocationSorter<'a> {
    fn new(locations: &'a [Location], axis_order: &'a [String]) -> Self {
        let mut axis_points: HashMap<&str, HashSet<OrderedFloat<f64>>> = HashMap::new();
        for location in locations {
            let mut axes = location.iter();
            if let (Some((axis, value)), None) = (axes.next(), axes.next()) {
                let points = axis_points.entry(axis.as_str()).or_default();
                points.insert(OrderedFloat(0.0));
                points.insert(OrderedFloat(*value));
            }
        }
        Self { axis_order, axis_points }
    }

    fn key_for(&self, location: &Location) -> LocationSortKey {
        let on_axis_points = location
            .iter()
            .filter(|(axis, value)| {
                self.axis_points
                    .get(axis.as_str())
                    .is_some_and(|points| points.contains(&OrderedFloat(**value)))
            })
            .count();

        let mut ordered_axes: Vec<String> = self
            .axis_order
            .iter()
            .filter(|axis| location.contains_key(*axis))
            .cloned()
            .collect();
        // Location keys are already sorted by name
        ordered_axes.extend(location.keys().filter(|axis| !self.axis_order.contains(axis)).cloned());

        let known_axes = ordered_axes
            .iter()
            .map(|axis| {
                self.axis_order.iter().position(|known| known == axis).unwrap_or(UNORDERED_AXIS)
            })
            .collect();
        let axis_value_signs = ordered_axes
            .iter()
            .map(|axis| match location[axis] {
                value if value < 0.0 => -1,
                value if value > 0.0 => 1,
                _ => 0,
            })
            .collect();
        let axis_value_abs =
            ordered_axes.iter().map(|axis| OrderedFloat(location[axis].abs())).collect();

        let key = LocationSortKey {
            rank: location.len(),
            on_axis_points: -(on_axis_points as isize),
            known_axes,
            ordered_axes,
            axis_value_signs,
            axis_value_abs,
        };
        trace!("key for {location:?} is {key:?}");
        key
    }
}

/// Compute the support of every master.
///
/// Each master starts with a box reaching from the default to the extreme
/// master coordinate on each of its axes. Earlier masters on the same axes
/// that fall inside the box then cut it, along whichever axis leaves the
/// largest share of the box.
fn master_supports(locations: &[Location]) -> Vec<Support> {
    let mut minimum: HashMap<&str, f64> = HashMap::new();
    let mut maximum: HashMap<&str, f64> = HashMap::new();
    for location in locations {
        for (axis, &value) in location {
            let min = minimum.entry(axis.as_str()).or_insert(value);
            *min = min.min(value);
            let max = maximum.entry(axis.as_str()).or_insert(value);
            *max = max.max(value);
        }
    }

    let mut supports: Vec<Support> = Vec::with_capacity(locations.len());
    for location in locations {
        let mut region: Support = location
            .iter()
            .map(|(axis, &peak)| {
                let tent = if peak > 0.0 {
                    Tent::new(0.0, peak, maximum[axis.as_str()])
                } else {
                    Tent::new(minimum[axis.as_str()], peak, 0.0)
                };
                (axis.clone(), tent)
            })
            .collect();

        for prev in &supports {
            if !prev.same_axes(&region) {
                continue;
            }
            let inside = region.iter().all(|(axis, tent)| {
                let prev_peak = prev.tents[axis].peak;
                prev_peak == tent.peak || (tent.lower < prev_peak && prev_peak < tent.upper)
            });
            if !inside {
                continue;
            }

            let mut best_axes: BTreeMap<String, Tent> = BTreeMap::new();
            let mut best_ratio = -1.0;
            for (axis, prev_tent) in prev.iter() {
                let cut = prev_tent.peak;
                let mut tent = region.tents[axis];
                let ratio = if cut < tent.peak {
                    let ratio = (cut - tent.peak) / (tent.lower - tent.peak);
                    tent.lower = cut;
                    ratio
                } else if tent.peak < cut {
                    let ratio = (cut - tent.peak) / (tent.upper - tent.peak);
                    tent.upper = cut;
                    ratio
                } else {
                    // Can't split the box in this direction
                    continue;
                };
                if ratio > best_ratio {
                    best_axes.clear();
                    best_ratio = ratio;
                }
                if ratio == best_ratio {
                    best_axes.insert(axis.clone(), tent);
                }
            }
            region.tents.extend(best_axes);
        }
        supports.push(region);
    }
    supports
}

/// For every master, the scalars of the earlier supports at its location.
fn delta_weights(locations: &[Location], supports: &[Support]) -> Vec<Vec<(usize, f64)>> {
    locations
        .iter()
        .enumerate()
        .map(|(index, location)| {
            supports[..index]
                .iter()
                .enumerate()
                .filter_map(|(prev_index, support)| {
                    let scalar = support.scalar_at(location);
                    (scalar != 0.0).then_some((prev_index, scalar))
                })
                .collect()
        })
        .collect()
}
