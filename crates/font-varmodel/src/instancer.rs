//! Instantiate design-space sources at user locations.

use log::{debug, warn};

use crate::{
    Location,
    cross_axis::CrossAxisMapping,
    designspace::{Axis, DesignSpace},
    discrete::{DiscreteDeltas, DiscreteVariationModel, Interpolation},
    error::{Error, Result},
    normalize::map_forward,
    payload::Payload,
};

/// A design space prepared for repeated instantiation.
///
/// Locations passed in are in user coordinates. They go through the
/// cross-axis mappings, then through each axis' user-to-source map, and are
/// finally interpolated by a [`DiscreteVariationModel`] over the sources.
#[derive(Debug, Clone)]
pub struct SourceInstancer {
    axes: Vec<Axis>,
    cross_axis: CrossAxisMapping,
    model: DiscreteVariationModel,
    deltas: DiscreteDeltas<Payload>,
}

impl SourceInstancer {
    /// # Errors
    ///
    /// - `Error::NoSources` if the design space has no sources
    /// - `Error::UnknownAxis` if a source or mapping names an undeclared axis
    /// - cross-axis mapping construction errors
    pub fn new(designspace: &DesignSpace) -> Result<Self> {
        designspace.validate()?;

        let source_axes = designspace.source_axes();
        let locations: Vec<Location> =
            designspace.sources.iter().map(|source| source.location.clone()).collect();
        let values: Vec<Payload> = designspace.sources.iter().map(|source| source.value.clone()).collect();

        let model = DiscreteVariationModel::new(&locations, &source_axes)?;
        let deltas = model.get_deltas(&values)?;
        for diagnostic in deltas.errors() {
            warn!("{diagnostic}");
        }

        let cross_axis = CrossAxisMapping::new(&designspace.axes, &designspace.mappings)?;

        debug!(
            "Source instancer: {} axes, {} sources, {} cross-axis mappings",
            designspace.axes.len(),
            designspace.sources.len(),
            designspace.mappings.len()
        );

        Ok(Self { axes: designspace.axes.clone(), cross_axis, model, deltas })
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn model(&self) -> &DiscreteVariationModel {
        &self.model
    }

    /// Translate a user location into source coordinates.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownAxis` if the location names an undeclared axis
    pub fn source_location(&self, user_location: &Location) -> Result<Location> {
        if let Some(name) = user_location.keys().find(|name| !self.axes.iter().any(|axis| &axis.name == *name)) {
            return Err(Error::UnknownAxis(name.clone()));
        }
        let mapped = self.cross_axis.map_location(user_location);
        Ok(map_forward(&mapped, &self.axes))
    }

    /// Interpolate the source values at a user location.
    pub fn instantiate(&self, user_location: &Location) -> Result<Interpolation<Payload>> {
        let location = self.source_location(user_location)?;
        self.model.interpolate_from_deltas(&location, &self.deltas)
    }

    /// How much each source contributes at a user location, in source order.
    pub fn source_contributions(&self, user_location: &Location) -> Result<Interpolation<Vec<f64>>> {
        let location = self.source_location(user_location)?;
        self.model.get_source_contributions(&location)
    }
}
