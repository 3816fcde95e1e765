/// Axis-aligned bounding box in local space

use glam::Vec3;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AABB {
    /// Minimum corner (x, y, z)
    pub min: Vec3,
    /// Maximum corner (x, y, z)
    pub max: Vec3,
}

impl AABB {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box starting at `position` with the given extents
    pub fn from_position_size(position: Vec3, size: Vec3) -> Self {
        Self { min: position, max: position + size }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Whether the box has zero volume on every axis
    pub fn is_empty(&self) -> bool {
        self.min == self.max
    }

    /// Smallest box containing both
    pub fn merged(&self, other: &AABB) -> AABB {
        AABB {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Merge a sequence of boxes (empty sequence gives the default box)
    pub fn merge_all<'a>(boxes: impl IntoIterator<Item = &'a AABB>) -> AABB {
        let mut iter = boxes.into_iter();
        match iter.next() {
            Some(first) => iter.fold(*first, |acc, b| acc.merged(b)),
            None => AABB::default(),
        }
    }
}
