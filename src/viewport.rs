//! Viewport bounds and axis-aligned culling

use crate::marker::MarkerItem;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A geographic viewport as degree bounds
///
/// A bounds is well-formed when `north >= south` and `east >= west`. Inverted
/// bounds are legal input to the culler and simply match nothing.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ViewportBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl ViewportBounds {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// Whether the bounds describe a non-empty region
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.north >= self.south && self.east >= self.west
    }

    /// Inclusive containment test on all four edges
    #[inline]
    pub fn contains(&self, coordinate: crate::Coordinate) -> bool {
        self.contains_with_buffer(coordinate, 0.0)
    }

    /// Inclusive containment with an additive degree buffer on every edge
    ///
    /// Inverted bounds contain nothing, and malformed (NaN) coordinates are
    /// never contained.
    #[inline]
    pub fn contains_with_buffer(&self, coordinate: crate::Coordinate, buffer: f64) -> bool {
        if !self.is_valid() {
            return false;
        }
        coordinate.latitude >= self.south - buffer
            && coordinate.latitude <= self.north + buffer
            && coordinate.longitude >= self.west - buffer
            && coordinate.longitude <= self.east + buffer
    }

    /// View as a `geo` rectangle ((x, y) = (lon, lat))
    pub fn to_rect(&self) -> geo::Rect<f64> {
        geo::Rect::new(
            geo::Coord {
                x: self.west,
                y: self.south,
            },
            geo::Coord {
                x: self.east,
                y: self.north,
            },
        )
    }

    /// Build bounds from a `geo` rectangle ((x, y) = (lon, lat))
    pub fn from_rect(rect: geo::Rect<f64>) -> Self {
        Self {
            north: rect.max().y,
            south: rect.min().y,
            east: rect.max().x,
            west: rect.min().x,
        }
    }
}

/// Keep only the markers inside the (buffered) viewport
///
/// Inverted bounds yield an empty result rather than an error.
pub fn filter_in_viewport<T>(
    items: Vec<MarkerItem<T>>,
    bounds: &ViewportBounds,
    buffer: f64,
) -> Vec<MarkerItem<T>> {
    if !bounds.is_valid() {
        return Vec::new();
    }
    let mut items = items;
    items.retain(|item| bounds.contains_with_buffer(item.coordinate, buffer));
    items
}
