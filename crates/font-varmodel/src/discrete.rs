//! Variation models over a mix of continuous and discrete axes.
//!
//! Discrete axes (italic on/off, for example) are never interpolated across.
//! Sources are grouped into buckets by their discrete coordinates and every
//! bucket gets its own [`VariationModel`]. Problems with a single bucket are
//! reported as [`Diagnostic`]s next to a best-effort value, so callers can
//! keep rendering while the sources are incomplete.

use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use log::{debug, warn};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{
    Location,
    designspace::Axis,
    error::{Error, Result},
    normalize::normalize_location,
    payload::Blend,
    variation_model::VariationModel,
};

/// The kind of a non-fatal diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    ModelError,
    ModelWarning,
    InterpolationError,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiagnosticKind::ModelError => "model-error",
            DiagnosticKind::ModelWarning => "model-warning",
            DiagnosticKind::InterpolationError => "interpolation-error",
        })
    }
}

/// A problem found while building deltas or interpolating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    #[serde(rename = "type")]
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn model_error(message: impl Into<String>) -> Self {
        Self { kind: DiagnosticKind::ModelError, message: message.into() }
    }

    pub fn model_warning(message: impl Into<String>) -> Self {
        Self { kind: DiagnosticKind::ModelWarning, message: message.into() }
    }

    pub fn interpolation_error(message: impl Into<String>) -> Self {
        Self { kind: DiagnosticKind::InterpolationError, message: message.into() }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A best-effort value together with the diagnostics produced on the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interpolation<V> {
    pub instance: V,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Diagnostic>,
}

/// The discrete coordinates of a location, in axis order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscreteKey(Vec<(String, OrderedFloat<f64>)>);

impl DiscreteKey {
    fn for_location(location: &Location, discrete_axes: &[Axis]) -> Self {
        Self(
            discrete_axes
                .iter()
                .map(|axis| {
                    let value = location.get(&axis.name).copied().unwrap_or(axis.default_value);
                    (axis.name.clone(), OrderedFloat(value))
                })
                .collect(),
        )
    }

    /// Distance between two keys, with each axis scaled to its value span.
    fn distance(&self, other: &DiscreteKey, discrete_axes: &[Axis]) -> f64 {
        self.0
            .iter()
            .zip(&other.0)
            .zip(discrete_axes)
            .map(|(((_, a), (_, b)), axis)| {
                let span = axis.maximum() - axis.minimum();
                let span = if span > 0.0 { span } else { 1.0 };
                (a.0 - b.0).abs() / span
            })
            .sum()
    }

    /// Prefix a message with this key's label, if there is one.
    fn label(&self, message: impl fmt::Display) -> String {
        if self.0.is_empty() { message.to_string() } else { format!("{self}: {message}") }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DiscreteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (axis, value)) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{axis}={}", value.0)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    /// Global indices of the sources in this bucket
    source_indices: Vec<usize>,
    /// Global index of the source used when the model is unusable
    fallback_source: usize,
    model: std::result::Result<VariationModel, Arc<Error>>,
}

/// Deltas for one bucket.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaSet<V> {
    /// Deltas in the bucket model's sorted order.
    Deltas(Vec<V>),
    /// The bucket could not be decomposed; this raw source value stands in.
    Fallback(V),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketDeltas<V> {
    pub deltas: DeltaSet<V>,
    pub errors: Vec<Diagnostic>,
}

/// Deltas for every bucket of a [`DiscreteVariationModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteDeltas<V> {
    buckets: IndexMap<DiscreteKey, BucketDeltas<V>>,
}

impl<V> DiscreteDeltas<V> {
    pub fn get(&self, key: &DiscreteKey) -> Option<&BucketDeltas<V>> {
        self.buckets.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DiscreteKey, &BucketDeltas<V>)> {
        self.buckets.iter()
    }

    /// All diagnostics produced while computing the deltas.
    pub fn errors(&self) -> Vec<Diagnostic> {
        self.buckets.values().flat_map(|bucket| bucket.errors.iter().cloned()).collect()
    }
}

/// One variation model per combination of discrete axis values.
#[derive(Debug, Clone)]
pub struct DiscreteVariationModel {
    discrete_axes: Vec<Axis>,
    continuous_axes: Vec<Axis>,
    source_count: usize,
    buckets: IndexMap<DiscreteKey, Bucket>,
}

impl DiscreteVariationModel {
    /// Build bucket models for source locations given in axis units.
    ///
    /// A bucket whose locations cannot form a model does not fail
    /// construction; it is reported when deltas are computed.
    ///
    /// # Errors
    ///
    /// - `Error::NoSources` if `locations` is empty
    pub fn new(locations: &[Location], axes: &[Axis]) -> Result<Self> {
        if locations.is_empty() {
            return Err(Error::NoSources);
        }

        let (discrete_axes, continuous_axes): (Vec<Axis>, Vec<Axis>) =
            axes.iter().cloned().partition(Axis::is_discrete);
        let axis_order: Vec<String> = continuous_axes.iter().map(|axis| axis.name.clone()).collect();

        let mut grouped: IndexMap<DiscreteKey, (Vec<usize>, Vec<Location>)> = IndexMap::new();
        for (index, location) in locations.iter().enumerate() {
            let key = DiscreteKey::for_location(location, &discrete_axes);
            let (indices, normalized) = grouped.entry(key).or_default();
            indices.push(index);
            normalized.push(normalize_location(location, &continuous_axes));
        }

        let buckets: IndexMap<DiscreteKey, Bucket> = grouped
            .into_iter()
            .map(|(key, (source_indices, normalized))| {
                let model = VariationModel::new(&normalized, &axis_order).map_err(|error| {
                    warn!("{}", key.label(&error));
                    Arc::new(error)
                });
                let fallback_source = normalized
                    .iter()
                    .position(|location| location.values().all(|value| *value == 0.0))
                    .map_or(source_indices[0], |position| source_indices[position]);
                let bucket = Bucket { source_indices, fallback_source, model };
                (key, bucket)
            })
            .collect();

        debug!(
            "Discrete variation model: {} sources in {} buckets",
            locations.len(),
            buckets.len()
        );

        Ok(Self { discrete_axes, continuous_axes, source_count: locations.len(), buckets })
    }

    pub fn discrete_axes(&self) -> &[Axis] {
        &self.discrete_axes
    }

    pub fn continuous_axes(&self) -> &[Axis] {
        &self.continuous_axes
    }

    /// Bucket keys in order of first appearance.
    pub fn bucket_keys(&self) -> impl Iterator<Item = &DiscreteKey> {
        self.buckets.keys()
    }

    /// The model of a bucket, or the reason it could not be built.
    pub fn model(&self, key: &DiscreteKey) -> Option<std::result::Result<&VariationModel, &Error>> {
        self.buckets.get(key).map(|bucket| bucket.model.as_ref().map_err(|error| &**error))
    }

    /// Compute deltas for every bucket.
    ///
    /// `values` are indexed like the locations passed to [`new`](Self::new).
    /// Buckets that cannot be decomposed get a diagnostic and keep a raw
    /// source value instead.
    pub fn get_deltas<V: Blend>(&self, values: &[V]) -> Result<DiscreteDeltas<V>> {
        if values.len() != self.source_count {
            return Err(Error::SourceCountMismatch {
                expected: self.source_count,
                actual: values.len(),
            });
        }

        let mut buckets = IndexMap::with_capacity(self.buckets.len());
        for (key, bucket) in &self.buckets {
            let fallback = || DeltaSet::Fallback(values[bucket.fallback_source].clone());
            let bucket_deltas = match &bucket.model {
                Err(error) => BucketDeltas {
                    deltas: fallback(),
                    errors: vec![Diagnostic::model_error(key.label(error))],
                },
                Ok(model) => {
                    let bucket_values: Vec<V> =
                        bucket.source_indices.iter().map(|&index| values[index].clone()).collect();
                    match model.get_deltas(&bucket_values) {
                        Ok(deltas) => BucketDeltas { deltas: DeltaSet::Deltas(deltas), errors: Vec::new() },
                        Err(error) => {
                            warn!("{}", key.label(&error));
                            BucketDeltas {
                                deltas: fallback(),
                                errors: vec![Diagnostic::interpolation_error(key.label(&error))],
                            }
                        }
                    }
                }
            };
            buckets.insert(key.clone(), bucket_deltas);
        }
        Ok(DiscreteDeltas { buckets })
    }

    /// Evaluate the deltas at a location given in axis units.
    ///
    /// When no source shares the location's discrete coordinates, the
    /// nearest populated bucket is used and a `model-warning` is attached.
    ///
    /// # Errors
    ///
    /// - `Error::ForeignDeltas` if `deltas` came from another model
    pub fn interpolate_from_deltas<V: Blend>(
        &self,
        location: &Location,
        deltas: &DiscreteDeltas<V>,
    ) -> Result<Interpolation<V>> {
        let mut errors = Vec::new();
        let (key, bucket) = self.select_bucket(location, &mut errors)?;
        let bucket_deltas =
            deltas.get(key).ok_or_else(|| Error::ForeignDeltas(key.to_string()))?;
        errors.extend(bucket_deltas.errors.iter().cloned());

        let instance = match (&bucket.model, &bucket_deltas.deltas) {
            (_, DeltaSet::Fallback(value)) => value.clone(),
            (Ok(model), DeltaSet::Deltas(values)) => {
                let normalized = normalize_location(location, &self.continuous_axes);
                match model.interpolate_from_deltas(&normalized, values) {
                    Ok(instance) => instance,
                    Err(error) => {
                        errors.push(Diagnostic::interpolation_error(key.label(&error)));
                        values.first().cloned().ok_or_else(|| Error::ForeignDeltas(key.to_string()))?
                    }
                }
            }
            (Err(_), DeltaSet::Deltas(_)) => return Err(Error::ForeignDeltas(key.to_string())),
        };

        Ok(Interpolation { instance, errors })
    }

    /// How much each source contributes at a location given in axis units.
    ///
    /// Returns one coefficient per source; sources outside the selected
    /// bucket get 0, and a broken bucket puts all weight on its fallback
    /// source.
    pub fn get_source_contributions(&self, location: &Location) -> Result<Interpolation<Vec<f64>>> {
        let mut errors = Vec::new();
        let (key, bucket) = self.select_bucket(location, &mut errors)?;
        let mut contributions = vec![0.0; self.source_count];

        match &bucket.model {
            Ok(model) => {
                let normalized = normalize_location(location, &self.continuous_axes);
                let bucket_contributions = model.get_source_contributions(&normalized);
                for (&index, contribution) in bucket.source_indices.iter().zip(bucket_contributions) {
                    contributions[index] = contribution;
                }
            }
            Err(error) => {
                errors.push(Diagnostic::model_error(key.label(error)));
                contributions[bucket.fallback_source] = 1.0;
            }
        }

        Ok(Interpolation { instance: contributions, errors })
    }

    fn select_bucket(
        &self,
        location: &Location,
        errors: &mut Vec<Diagnostic>,
    ) -> Result<(&DiscreteKey, &Bucket)> {
        let key = DiscreteKey::for_location(location, &self.discrete_axes);
        if let Some(found) = self.buckets.get_key_value(&key) {
            return Ok(found);
        }

        let message = format!("there are no sources for {key}");
        warn!("{message}");
        errors.push(Diagnostic::model_warning(message));

        self.buckets
            .iter()
            .min_by(|(a, _), (b, _)| {
                let a = key.distance(a, &self.discrete_axes);
                let b = key.distance(b, &self.discrete_axes);
                a.total_cmp(&b)
            })
            .ok_or(Error::NoSources)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::payload::Payload;

    fn loc(pairs: &[(&str, f64)]) -> Location {
        pairs.iter().map(|(axis, value)| (axis.to_string(), *value)).collect()
    }

    fn axes() -> Vec<Axis> {
        vec![Axis::new("Weight", 400.0, 400.0, 700.0), Axis::discrete("Italic", vec![0.0, 1.0], 0.0)]
    }

    #[test]
    fn without_discrete_axes_behaves_like_a_plain_model() {
        let axes = vec![Axis::new("Weight", 400.0, 400.0, 700.0)];
        let locations = vec![loc(&[]), loc(&[("Weight", 700.0)])];
        let model = DiscreteVariationModel::new(&locations, &axes).unwrap();
        let deltas = model.get_deltas(&[100.0, 200.0]).unwrap();
        assert!(deltas.errors().is_empty());

        let result = model.interpolate_from_deltas(&loc(&[("Weight", 550.0)]), &deltas).unwrap();
        assert_eq!(result, Interpolation { instance: 150.0, errors: Vec::new() });
    }

    #[test]
    fn axes_are_split_by_kind() {
        let locations = vec![loc(&[]), loc(&[("Italic", 1.0)])];
        let model = DiscreteVariationModel::new(&locations, &axes()).unwrap();
        let names = |axes: &[Axis]| axes.iter().map(|axis| axis.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(model.discrete_axes()), vec!["Italic"]);
        assert_eq!(names(model.continuous_axes()), vec!["Weight"]);
        assert!(model.bucket_keys().all(|key| !key.is_empty()));

        let plain = DiscreteVariationModel::new(&locations[..1], &axes()[..1]).unwrap();
        assert!(plain.discrete_axes().is_empty());
        assert!(plain.bucket_keys().all(DiscreteKey::is_empty));
    }

    #[test]
    fn buckets_are_interpolated_independently() {
        let locations = vec![
            loc(&[("Weight", 400.0), ("Italic", 0.0)]),
            loc(&[("Weight", 700.0), ("Italic", 0.0)]),
            loc(&[("Weight", 400.0), ("Italic", 1.0)]),
            loc(&[("Weight", 700.0), ("Italic", 1.0)]),
        ];
        let model = DiscreteVariationModel::new(&locations, &axes()).unwrap();
        assert_eq!(model.bucket_keys().count(), 2);

        let deltas = model.get_deltas(&[10.0, 20.0, 100.0, 300.0]).unwrap();
        let upright = model.interpolate_from_deltas(&loc(&[("Weight", 550.0)]), &deltas).unwrap();
        let italic = model
            .interpolate_from_deltas(&loc(&[("Weight", 550.0), ("Italic", 1.0)]), &deltas)
            .unwrap();
        assert_eq!(upright.instance, 15.0);
        assert_eq!(italic.instance, 200.0);
        assert!(italic.errors.is_empty());
    }

    #[test]
    fn missing_bucket_falls_back_with_warning() {
        let locations = vec![loc(&[("Italic", 0.0)]), loc(&[("Weight", 700.0)])];
        let model = DiscreteVariationModel::new(&locations, &axes()).unwrap();
        let deltas = model.get_deltas(&[100.0, 200.0]).unwrap();

        let upright = model.interpolate_from_deltas(&loc(&[("Italic", 0.0)]), &deltas).unwrap();
        let italic = model.interpolate_from_deltas(&loc(&[("Italic", 1.0)]), &deltas).unwrap();
        assert_eq!(italic.instance, upright.instance);
        assert_eq!(italic.errors, vec![Diagnostic::model_warning("there are no sources for Italic=1")]);
    }

    #[test]
    fn nearest_bucket_is_used() {
        let axes = vec![
            Axis::new("Weight", 400.0, 400.0, 700.0),
            Axis::discrete("Serif", vec![0.0, 1.0, 2.0, 3.0], 0.0),
        ];
        let locations = vec![loc(&[]), loc(&[("Serif", 3.0)])];
        let model = DiscreteVariationModel::new(&locations, &axes).unwrap();
        let deltas = model.get_deltas(&[1.0, 2.0]).unwrap();

        let near_three = model.interpolate_from_deltas(&loc(&[("Serif", 2.0)]), &deltas).unwrap();
        assert_eq!(near_three.instance, 2.0);
        let near_zero = model.interpolate_from_deltas(&loc(&[("Serif", 1.0)]), &deltas).unwrap();
        assert_eq!(near_zero.instance, 1.0);
    }

    #[test]
    fn broken_bucket_reports_model_error() {
        // The italic bucket has no source at the default weight
        let locations = vec![loc(&[]), loc(&[("Weight", 700.0), ("Italic", 1.0)])];
        let model = DiscreteVariationModel::new(&locations, &axes()).unwrap();
        let deltas = model.get_deltas(&[100.0, 250.0]).unwrap();

        let keys: Vec<&DiscreteKey> = model.bucket_keys().collect();
        assert_eq!(keys.len(), 2);
        assert!(model.model(keys[0]).is_some_and(|model| model.is_ok()));
        assert!(matches!(model.model(keys[1]), Some(Err(Error::MissingBaseSource))));

        let expected =
            Diagnostic::model_error("Italic=1: locations must contain default (missing base source)");
        assert_eq!(deltas.errors(), vec![expected.clone()]);

        let italic = model.interpolate_from_deltas(&loc(&[("Italic", 1.0)]), &deltas).unwrap();
        assert_eq!(italic, Interpolation { instance: 250.0, errors: vec![expected] });

        let upright = model.interpolate_from_deltas(&loc(&[]), &deltas).unwrap();
        assert_eq!(upright, Interpolation { instance: 100.0, errors: Vec::new() });
    }

    #[test]
    fn shape_mismatch_reports_interpolation_error() {
        let axes = vec![Axis::new("Weight", 400.0, 400.0, 700.0)];
        let locations = vec![loc(&[]), loc(&[("Weight", 700.0)])];
        let model = DiscreteVariationModel::new(&locations, &axes).unwrap();
        let values = [Payload::from(vec![1.0, 2.0]), Payload::from(vec![1.0, 2.0, 3.0])];
        let deltas = model.get_deltas(&values).unwrap();

        let errors = deltas.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::InterpolationError);

        let result = model.interpolate_from_deltas(&loc(&[("Weight", 700.0)]), &deltas).unwrap();
        assert_eq!(result.instance, values[0]);
        assert_eq!(result.errors, errors);
    }

    #[test]
    fn value_count_must_match() {
        let model = DiscreteVariationModel::new(&[loc(&[])], &axes()).unwrap();
        assert!(matches!(
            model.get_deltas(&[1.0, 2.0]),
            Err(Error::SourceCountMismatch { expected: 1, actual: 2 })
        ));
        assert!(matches!(DiscreteVariationModel::new(&[], &axes()), Err(Error::NoSources)));
    }

    #[test]
    fn source_contributions_span_all_sources() {
        let locations = vec![
            loc(&[]),
            loc(&[("Italic", 1.0)]),
            loc(&[("Weight", 700.0)]),
            loc(&[("Weight", 700.0), ("Italic", 1.0)]),
        ];
        let model = DiscreteVariationModel::new(&locations, &axes()).unwrap();

        let result =
            model.get_source_contributions(&loc(&[("Weight", 550.0), ("Italic", 1.0)])).unwrap();
        assert_eq!(result.instance, vec![0.0, 0.5, 0.0, 0.5]);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn diagnostics_serialize_with_type_tag() {
        let diagnostic = Diagnostic::model_warning("there are no sources for Italic=1");
        assert_eq!(
            serde_json::to_value(&diagnostic).unwrap(),
            json!({"type": "model-warning", "message": "there are no sources for Italic=1"})
        );
        let result = Interpolation { instance: Payload::from(1.0), errors: Vec::new() };
        assert_eq!(serde_json::to_value(&result).unwrap(), json!({"instance": 1.0}));
    }
}
