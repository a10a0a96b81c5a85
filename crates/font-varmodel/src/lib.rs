//! # Font Variation Model
//!
//! Interpolate font source data (metrics, kerning, glyph coordinates) across
//! a design space.
//!
//! A Rust take on fonttools varLib.models, extended with discrete axes and
//! cross-axis mappings for working with source files rather than compiled
//! variable fonts.
//!
//! ## Example
//!
//! ```
//! use font_varmodel::{Location, VariationModel};
//!
//! let location = |pairs: &[(&str, f64)]| -> Location {
//!     pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
//! };
//! let masters = [location(&[]), location(&[("wght", 1.0)])];
//! let model = VariationModel::new(&masters, &["wght".to_string()]).unwrap();
//!
//! let deltas = model.get_deltas(&[100.0, 200.0]).unwrap();
//! let value = model.interpolate_from_deltas(&location(&[("wght", 0.5)]), &deltas).unwrap();
//! assert_eq!(value, 150.0);
//! ```
//!
//! Whole design spaces, with user-space axis mappings, discrete axes and
//! payloads of any shape, go through [`SourceInstancer`]:
//!
//! ```
//! use font_varmodel::{DesignSpace, SourceInstancer};
//!
//! let ds = DesignSpace::from_json(
//!     r#"{
//!         "axes": [{"name": "Weight", "minValue": 400, "defaultValue": 400, "maxValue": 700}],
//!         "sources": [
//!             {"location": {}, "value": {"advance": 500}},
//!             {"location": {"Weight": 700}, "value": {"advance": 600}}
//!         ]
//!     }"#,
//! )
//! .unwrap();
//! let instancer = SourceInstancer::new(&ds).unwrap();
//! let result = instancer.instantiate(&[("Weight".to_string(), 550.0)].into()).unwrap();
//! assert_eq!(result.instance.get("advance"), Some(&550.0.into()));
//! ```

use std::collections::BTreeMap;

mod cross_axis;
mod designspace;
mod discrete;
mod error;
mod instancer;
mod normalize;
mod payload;
mod variation_model;

pub use cross_axis::{CrossAxisMapping, MappingEntry};
pub use designspace::{Axis, DesignSpace, Source};
pub use discrete::{
    BucketDeltas, DeltaSet, Diagnostic, DiagnosticKind, DiscreteDeltas, DiscreteKey,
    DiscreteVariationModel, Interpolation,
};
pub use error::{Error, Result};
pub use instancer::SourceInstancer;
pub use normalize::{
    map_backward, map_forward, normalize_location, normalize_value, piecewise_linear_map,
    unnormalize_location, unnormalize_value,
};
pub use payload::{Blend, Payload, ShapeMismatch};
pub use variation_model::{Support, Tent, VariationModel, support_scalar};

/// Axis name to coordinate, in user, source or normalized units.
///
/// Axes absent from a location sit at their default.
pub type Location = BTreeMap<String, f64>;
