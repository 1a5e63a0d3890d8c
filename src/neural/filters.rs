//! Default filter selection
//!
//! The conv stack is normally given explicitly through `conv_filters`. When it
//! is not, a [`FilterResolver`] proposes one for the observation shape. Any
//! closure `Fn(&ObservationShape) -> Result<Vec<FilterSpec>, ResolverError>`
//! is a resolver, which keeps the network testable without the built-in table.

use crate::neural::observation::ObservationShape;
use crate::neural::options::FilterSpec;

/// No default conv stack is known for a shape
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolverError {
    #[error(
        "No default configuration for obs shape {shape:?}, you must specify `conv_filters` manually as a model option"
    )]
    NoDefault { shape: [i64; 3] },
}

pub trait FilterResolver {
    fn resolve(&self, shape: &ObservationShape) -> Result<Vec<FilterSpec>, ResolverError>;
}

impl<F> FilterResolver for F
where
    F: Fn(&ObservationShape) -> Result<Vec<FilterSpec>, ResolverError>,
{
    fn resolve(&self, shape: &ObservationShape) -> Result<Vec<FilterSpec>, ResolverError> {
        self(shape)
    }
}

const FILTERS_84X84: [FilterSpec; 3] = [
    FilterSpec::new(16, 8, 4),
    FilterSpec::new(32, 4, 2),
    FilterSpec::new(256, 11, 1),
];

const FILTERS_42X42: [FilterSpec; 3] = [
    FilterSpec::new(16, 4, 2),
    FilterSpec::new(32, 4, 2),
    FilterSpec::new(256, 11, 1),
];

/// Built-in table keyed on the spatial size (any channel count).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFilterResolver;

impl FilterResolver for DefaultFilterResolver {
    fn resolve(&self, shape: &ObservationShape) -> Result<Vec<FilterSpec>, ResolverError> {
        match shape.spatial() {
            [84, 84] => Ok(FILTERS_84X84.to_vec()),
            [42, 42] => Ok(FILTERS_42X42.to_vec()),
            _ => Err(ResolverError::NoDefault { shape: shape.dims() }),
        }
    }
}
