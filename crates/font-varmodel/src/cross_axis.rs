//! Cross-axis mappings, where the value of one axis drives other axes.
//!
//! A mapping is a list of entries pairing an input location with an output
//! location. For example, a "Diagonal" axis can drive "Horizontal" and
//! "Vertical": positions between two entries get the linear blend of the two
//! entries' outputs.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    Location,
    designspace::Axis,
    error::{Error, Result},
    normalize::normalize_location,
    payload::Payload,
    variation_model::VariationModel,
};

/// One entry of a cross-axis mapping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    #[serde(default)]
    pub input_location: Location,
    #[serde(default)]
    pub output_location: Location,
}

impl MappingEntry {
    pub fn new<I, O>(input: impl IntoIterator<Item = (I, f64)>, output: impl IntoIterator<Item = (O, f64)>) -> Self
    where
        I: Into<String>,
        O: Into<String>,
    {
        Self {
            input_location: input.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            output_location: output.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    fn is_empty(&self) -> bool {
        self.input_location.is_empty() && self.output_location.is_empty()
    }
}

#[derive(Debug, Clone)]
enum Mapper {
    Identity,
    /// Entries sorted by the driving coordinate, with one value per output axis.
    SingleInput { input_axis: Axis, stops: Vec<(f64, Vec<f64>)> },
    /// Normalized outputs, blended by a model over the normalized inputs.
    MultiInput { input_axes: Vec<Axis>, model: VariationModel, deltas: Vec<Payload> },
}

/// A cross-axis mapping, ready to be applied to locations.
#[derive(Debug, Clone)]
pub struct CrossAxisMapping {
    output_axes: Vec<Axis>,
    mapper: Mapper,
}

impl CrossAxisMapping {
    /// Prepare `mappings` for the given axes.
    ///
    /// Entries may omit axes; omitted coordinates are read as the axis
    /// default. An empty list, or a list of empty entries, maps every
    /// location to itself.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownAxis` if an entry names an axis not in `axes`
    /// - model construction errors when more than one axis drives the mapping
    pub fn new(axes: &[Axis], mappings: &[MappingEntry]) -> Result<Self> {
        let identity = Self { output_axes: Vec::new(), mapper: Mapper::Identity };
        if mappings.iter().all(MappingEntry::is_empty) {
            return Ok(identity);
        }

        for entry in mappings {
            let names = entry.input_location.keys().chain(entry.output_location.keys());
            if let Some(name) = names.into_iter().find(|name| !axes.iter().any(|axis| &axis.name == *name)) {
                return Err(Error::UnknownAxis(name.clone()));
            }
        }

        let used_by = |select: fn(&MappingEntry) -> &Location| -> Vec<Axis> {
            axes.iter()
                .filter(|axis| mappings.iter().any(|entry| select(entry).contains_key(&axis.name)))
                .cloned()
                .collect()
        };
        let input_axes = used_by(|entry| &entry.input_location);
        let output_axes = used_by(|entry| &entry.output_location);

        let mapper = match input_axes.as_slice() {
            [] => {
                warn!("Cross-axis mapping has no input axes; ignoring it");
                return Ok(identity);
            }
            [input_axis] => {
                let mut stops: Vec<(f64, Vec<f64>)> = mappings
                    .iter()
                    .map(|entry| {
                        let input = coordinate(&entry.input_location, input_axis);
                        let outputs = output_axes
                            .iter()
                            .map(|axis| coordinate(&entry.output_location, axis))
                            .collect();
                        (input, outputs)
                    })
                    .collect();
                stops.sort_by(|a, b| a.0.total_cmp(&b.0));
                Mapper::SingleInput { input_axis: input_axis.clone(), stops }
            }
            _ => {
                let locations: Vec<Location> = mappings
                    .iter()
                    .map(|entry| normalize_location(&entry.input_location, &input_axes))
                    .collect();
                let axis_order: Vec<String> = input_axes.iter().map(|axis| axis.name.clone()).collect();
                let model = VariationModel::new(&locations, &axis_order)?;
                let values: Vec<Payload> = mappings
                    .iter()
                    .map(|entry| {
                        let outputs = normalize_location(&entry.output_location, &output_axes);
                        Payload::from(output_axes.iter().map(|axis| outputs[&axis.name]).collect::<Vec<_>>())
                    })
                    .collect();
                let deltas = model.get_deltas(&values)?;
                Mapper::MultiInput { input_axes: input_axes.clone(), model, deltas }
            }
        };

        debug!(
            "Cross-axis mapping: {} entries, {} input axes, {} output axes",
            mappings.len(),
            input_axes.len(),
            output_axes.len()
        );
        Ok(Self { output_axes, mapper })
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.mapper, Mapper::Identity)
    }

    /// Apply the mapping to a location in axis units.
    ///
    /// Driving axes missing from `location` are filled in with their
    /// default; every output axis is overwritten; all other coordinates pass
    /// through.
    pub fn map_location(&self, location: &Location) -> Location {
        let mut mapped = location.clone();
        match &self.mapper {
            Mapper::Identity => {}
            Mapper::SingleInput { input_axis, stops } => {
                let value = *mapped.entry(input_axis.name.clone()).or_insert(input_axis.default_value);
                let outputs = interpolate_stops(stops, value);
                for (axis, output) in self.output_axes.iter().zip(outputs) {
                    mapped.insert(axis.name.clone(), output);
                }
            }
            Mapper::MultiInput { input_axes, model, deltas } => {
                for axis in input_axes {
                    mapped.entry(axis.name.clone()).or_insert(axis.default_value);
                }
                let normalized = normalize_location(&mapped, input_axes);
                match model.interpolate_from_deltas(&normalized, deltas) {
                    Ok(Payload::Sequence(outputs)) => {
                        for (axis, output) in self.output_axes.iter().zip(outputs) {
                            if let Some(value) = output.as_number() {
                                mapped.insert(axis.name.clone(), axis.unnormalize(value));
                            }
                        }
                    }
                    Ok(other) => warn!("Unexpected cross-axis mapping output: {other:?}"),
                    Err(error) => warn!("Cross-axis mapping failed: {error}"),
                }
            }
        }
        mapped
    }
}

fn coordinate(location: &Location, axis: &Axis) -> f64 {
    location.get(&axis.name).copied().unwrap_or(axis.default_value)
}

/// Blend the outputs of the two stops around `value`.
///
/// Values outside the stops take the outputs of the nearest end.
fn interpolate_stops(stops: &[(f64, Vec<f64>)], value: f64) -> Vec<f64> {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return Vec::new();
    };
    if value <= first.0 {
        return first.1.clone();
    }
    if value >= last.0 {
        return last.1.clone();
    }
    stops
        .windows(2)
        .find(|pair| pair[0].0 <= value && value <= pair[1].0)
        .map(|pair| {
            let (a, b) = (&pair[0], &pair[1]);
            if a.0 == b.0 {
                return a.1.clone();
            }
            let t = (value - a.0) / (b.0 - a.0);
            a.1.iter().zip(&b.1).map(|(x, y)| x + (y - x) * t).collect()
        })
        .unwrap_or_else(|| last.1.clone())
}
