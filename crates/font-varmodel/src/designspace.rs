//! Design-space axes, sources and the JSON document that ties them together.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    Location,
    cross_axis::MappingEntry,
    error::{Error, Result},
    normalize::{normalize_value, piecewise_linear_map, unnormalize_value},
    payload::Payload,
};

/// A design-space axis.
///
/// Continuous axes carry `minValue`/`maxValue`; discrete axes carry the list
/// of allowed `values` and are never interpolated across.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Axis {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    pub default_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    /// Allowed values of a discrete axis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,
    /// User-to-source coordinate map as (input, output) pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mapping: Vec<(f64, f64)>,
}

impl Axis {
    /// Create a continuous axis.
    pub fn new(name: &str, minimum: f64, default: f64, maximum: f64) -> Self {
        Self {
            name: name.to_string(),
            min_value: Some(minimum),
            default_value: default,
            max_value: Some(maximum),
            values: None,
            mapping: Vec::new(),
        }
    }

    /// Create a discrete axis.
    pub fn discrete(name: &str, values: impl Into<Vec<f64>>, default: f64) -> Self {
        Self {
            name: name.to_string(),
            min_value: None,
            default_value: default,
            max_value: None,
            values: Some(values.into()),
            mapping: Vec::new(),
        }
    }

    /// Set the user-to-source mapping.
    pub fn with_mapping(mut self, mapping: Vec<(f64, f64)>) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn is_discrete(&self) -> bool {
        self.values.is_some()
    }

    /// Lowest value on this axis.
    pub fn minimum(&self) -> f64 {
        match (&self.values, self.min_value) {
            (Some(values), _) => values.iter().copied().fold(self.default_value, f64::min),
            (None, Some(minimum)) => minimum,
            (None, None) => self.default_value,
        }
    }

    /// Highest value on this axis.
    pub fn maximum(&self) -> f64 {
        match (&self.values, self.max_value) {
            (Some(values), _) => values.iter().copied().fold(self.default_value, f64::max),
            (None, Some(maximum)) => maximum,
            (None, None) => self.default_value,
        }
    }

    /// Normalize a value on this axis to [-1, 1].
    pub fn normalize(&self, value: f64) -> f64 {
        normalize_value(value, self.minimum(), self.default_value, self.maximum())
    }

    /// Map a normalized value back to axis units.
    pub fn unnormalize(&self, value: f64) -> f64 {
        unnormalize_value(value, self.minimum(), self.default_value, self.maximum())
    }

    /// This axis with its limits expressed in source coordinates.
    ///
    /// The mapping is consumed: the returned axis has none.
    pub fn to_source_space(&self) -> Self {
        let map = |value: f64| piecewise_linear_map(value, &self.mapping);
        Self {
            name: self.name.clone(),
            min_value: self.min_value.map(map),
            default_value: map(self.default_value),
            max_value: self.max_value.map(map),
            values: self.values.as_ref().map(|values| values.iter().copied().map(map).collect()),
            mapping: Vec::new(),
        }
    }
}

/// A source (master) in the design space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Location in source coordinates; omitted axes sit at their default.
    #[serde(default)]
    pub location: Location,
    /// The value this source contributes.
    pub value: Payload,
}

impl Source {
    /// Create a new source at the given location.
    pub fn new<K: Into<String>>(location: impl IntoIterator<Item = (K, f64)>, value: impl Into<Payload>) -> Self {
        Self {
            name: None,
            location: location.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            value: value.into(),
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

/// A complete design space: axes, sources and cross-axis mappings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DesignSpace {
    pub axes: Vec<Axis>,
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mappings: Vec<MappingEntry>,
}

impl DesignSpace {
    /// Create a new design space with the given axes and sources.
    pub fn new(axes: Vec<Axis>, sources: Vec<Source>) -> Self {
        Self { axes, sources, mappings: Vec::new() }
    }

    /// Add cross-axis mappings.
    pub fn with_mappings(mut self, mappings: Vec<MappingEntry>) -> Self {
        self.mappings = mappings;
        self
    }

    /// Parse a design space from its JSON form.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a JSON design-space document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&text)
    }

    pub fn axis(&self, name: &str) -> Option<&Axis> {
        self.axes.iter().find(|axis| axis.name == name)
    }

    /// Axes with limits in source coordinates.
    pub fn source_axes(&self) -> Vec<Axis> {
        self.axes.iter().map(Axis::to_source_space).collect()
    }

    /// Check that every source refers to declared axes only.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(Error::NoSources);
        }
        for source in &self.sources {
            if let Some(name) = source.location.keys().find(|name| self.axis(name).is_none()) {
                return Err(Error::UnknownAxis(name.clone()));
            }
        }
        Ok(())
    }
}
