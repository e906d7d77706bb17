//! Large-world coordinates.
//!
//! A position is split into an integer segment index per axis and a small
//! single-precision offset inside that segment. The offset never exceeds
//! half a segment after [`LargeWorldCoord::translate`], so its precision
//! does not degrade no matter how far from the origin the point lies.

use std::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Edge length of one segment, in metres.
pub const SEGMENT_LEN: f64 = 1024.0;

#[derive(Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LargeWorldCoord {
    pub seg: Vector3<i64>,
    pub offs: Vector3<f32>,
}

impl LargeWorldCoord {
    pub fn new(seg: Vector3<i64>, offs: Vector3<f32>) -> Self {
        let mut lwc = Self {
            seg,
            offs: Vector3::zeros(),
        };
        lwc.translate(&offs.cast::<f64>());
        lwc
    }

    pub fn origin() -> Self {
        Self::default()
    }

    pub fn from_meters(v: &Vector3<f64>) -> Self {
        let mut lwc = Self::origin();
        lwc.translate(v);
        lwc
    }

    /// Move by `d` metres, carrying whole segments into `seg`.
    pub fn translate(&mut self, d: &Vector3<f64>) {
        for axis in 0..3 {
            let fine = f64::from(self.offs[axis]) + d[axis];
            let carry = (fine / SEGMENT_LEN).round();
            self.seg[axis] += carry as i64;
            self.offs[axis] = (fine - carry * SEGMENT_LEN) as f32;
        }
    }

    #[must_use]
    pub fn translated(&self, d: &Vector3<f64>) -> Self {
        let mut lwc = *self;
        lwc.translate(d);
        lwc
    }

    /// Vector from `other` to `self` in metres.
    ///
    /// The segment difference is taken in integers first, so two nearby
    /// points far from the origin keep their full relative precision.
    pub fn delta(&self, other: &Self) -> Vector3<f64> {
        Vector3::from_fn(|axis, _| {
            (self.seg[axis] - other.seg[axis]) as f64 * SEGMENT_LEN
                + (f64::from(self.offs[axis]) - f64::from(other.offs[axis]))
        })
    }

    pub fn distance(&self, other: &Self) -> f64 {
        self.delta(other).norm()
    }

    /// Absolute position in metres. Lossy for large coordinates.
    pub fn to_meters(&self) -> Vector3<f64> {
        self.delta(&Self::origin())
    }
}

impl fmt::Debug for LargeWorldCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LWC[({}, {}, {}) + ({:.3}, {:.3}, {:.3})]",
            self.seg.x, self.seg.y, self.seg.z, self.offs.x, self.offs.y, self.offs.z
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn translate_carries_into_segments() {
        let mut p = LargeWorldCoord::origin();
        p.translate(&Vector3::new(3000.0, -700.0, 100.0));
        assert_eq!(p.seg, Vector3::new(3, -1, 0));
        assert_relative_eq!(f64::from(p.offs.x), 3000.0 - 3072.0, epsilon = 1e-3);
        assert_relative_eq!(f64::from(p.offs.y), -700.0 + 1024.0, epsilon = 1e-3);
        assert!(p.offs.iter().all(|o| f64::from(o.abs()) <= SEGMENT_LEN / 2.0));
        assert_relative_eq!(p.to_meters(), Vector3::new(3000.0, -700.0, 100.0), epsilon = 1e-3);
    }

    #[test]
    fn delta_is_stable_far_from_origin() {
        // About 1.5e11 m, where an f32 has a resolution of kilometres.
        let au = 149_597_870_000.0;
        let a = LargeWorldCoord::from_meters(&Vector3::new(au, au, -au));
        let b = a.translated(&Vector3::new(0.25, -1.5, 10.0));
        let d = b.delta(&a);
        assert_relative_eq!(d, Vector3::new(0.25, -1.5, 10.0), epsilon = 1e-3);
        assert_relative_eq!(a.distance(&b), d.norm());
        assert_relative_eq!(a.delta(&b), -d);
    }

    #[test]
    fn new_normalises_offsets() {
        let p = LargeWorldCoord::new(Vector3::new(1, 2, 3), Vector3::new(2048.0, 0.0, -512.0));
        assert_eq!(p.seg, Vector3::new(3, 2, 3));
        assert_relative_eq!(p.offs.x, 0.0);
    }
}
