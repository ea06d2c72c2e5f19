// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Spatial damage tracking for partial redraws.

use alloc::vec::Vec;

use kurbo::Rect;

/// A region of the output that needs redrawing.
///
/// Damage accumulates between draws: redraw requests, activation diffs, and
/// full invalidations are merged into one region, which the next draw
/// consumes.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum DamageRegion {
    /// Nothing changed; the previous frame can be kept.
    #[default]
    None,
    /// A list of rectangles in output space.
    Rects(Vec<Rect>),
    /// The entire output needs redrawing.
    Full,
}

impl DamageRegion {
    /// Returns `true` if no region needs redrawing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns `true` if the whole output is damaged.
    #[must_use]
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full)
    }

    /// Adds one rectangle. Empty or non-finite rectangles are ignored.
    pub fn add_rect(&mut self, rect: Rect) {
        let rect = rect.abs();
        if rect.is_zero_area() || !rect.is_finite() {
            return;
        }
        match self {
            Self::Full => {}
            Self::None => *self = Self::Rects(alloc::vec![rect]),
            Self::Rects(rects) => rects.push(rect),
        }
    }

    /// Marks the whole output as damaged.
    pub fn set_full(&mut self) {
        *self = Self::Full;
    }

    /// Merges another damage region into this one.
    pub fn merge(&mut self, other: &Self) {
        match (&mut *self, other) {
            (Self::Full, _) | (_, Self::None) => {}
            (_, Self::Full) => *self = Self::Full,
            (Self::None, _) => *self = other.clone(),
            (Self::Rects(a), Self::Rects(b)) => a.extend_from_slice(b),
        }
    }

    /// Returns the bounding rectangle of the damage, clipped to `viewport`.
    ///
    /// Returns `None` when nothing inside the viewport is damaged.
    #[must_use]
    pub fn bounds_within(&self, viewport: Rect) -> Option<Rect> {
        let bounds = match self {
            Self::None => return None,
            Self::Full => viewport,
            Self::Rects(rects) => {
                let mut iter = rects.iter().map(|r| r.intersect(viewport));
                let first = iter.next()?;
                iter.fold(first, |acc, r| {
                    if r.is_zero_area() {
                        acc
                    } else if acc.is_zero_area() {
                        r
                    } else {
                        acc.union(r)
                    }
                })
            }
        };
        (!bounds.is_zero_area()).then_some(bounds)
    }

    /// Takes the accumulated damage, leaving [`DamageRegion::None`].
    pub fn take(&mut self) -> Self {
        core::mem::take(self)
    }
}
