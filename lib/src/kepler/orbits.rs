//! Elliptical orbits sampled at equal time intervals.

use std::f64::consts;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::time::SECONDS_PER_DAY;

/// Default number of samples around an [`OrbitEllipse`].
pub const DEFAULT_SAMPLES: usize = 360;

const KEPLER_TOL: f64 = 1e-12;
const KEPLER_MAXITER: u64 = 50;

/// Classical elements of a closed orbit.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeplerianElements {
    /// Semi-major axis (m).
    pub a: f64,
    /// Eccentricity, in `[0, 1)`.
    pub e: f64,
    /// Inclination (radians).
    pub i: f64,
    /// Longitude of ascending node (radians).
    pub lan: f64,
    /// Argument of periapsis (radians).
    pub argpe: f64,
    /// Mean anomaly at `epoch` (radians).
    pub ma_epoch: f64,
    /// Reference epoch (Julian date).
    pub epoch: f64,
    /// Orbital period (days).
    pub period: f64,
}

impl KeplerianElements {
    pub fn semi_minor(&self) -> f64 {
        semi_minor(self.a, self.e)
    }

    pub fn period_seconds(&self) -> f64 {
        self.period * SECONDS_PER_DAY
    }

    fn pqw_ijk_matrix(&self) -> Matrix3<f64> {
        let m11 = libm::cos(self.lan) * libm::cos(self.argpe)
            - libm::sin(self.lan) * libm::sin(self.argpe) * libm::cos(self.i);
        let m12 = -libm::cos(self.lan) * libm::sin(self.argpe)
            - libm::sin(self.lan) * libm::cos(self.argpe) * libm::cos(self.i);
        let m13 = libm::sin(self.lan) * libm::sin(self.i);
        let m21 = libm::sin(self.lan) * libm::cos(self.argpe)
            + libm::cos(self.lan) * libm::sin(self.argpe) * libm::cos(self.i);
        let m22 = -libm::sin(self.lan) * libm::sin(self.argpe)
            + libm::cos(self.lan) * libm::cos(self.argpe) * libm::cos(self.i);
        let m23 = -libm::cos(self.lan) * libm::sin(self.i);
        let m31 = libm::sin(self.argpe) * libm::sin(self.i);
        let m32 = libm::cos(self.argpe) * libm::sin(self.i);
        let m33 = libm::cos(self.i);

        Matrix3::new(m11, m12, m13, m21, m22, m23, m31, m32, m33)
    }

    /// Position relative to the focus at the given mean anomaly.
    pub fn position_at_mean_anomaly(&self, ma: f64) -> Vector3<f64> {
        let ea = ma_to_ea(ma, self.e, KEPLER_TOL, KEPLER_MAXITER);
        let pqw = Vector3::new(
            self.a * (libm::cos(ea) - self.e),
            self.semi_minor() * libm::sin(ea),
            0.0,
        );
        self.pqw_ijk_matrix() * pqw
    }
}

pub fn semi_minor(a: f64, e: f64) -> f64 {
    a * libm::sqrt(1.0 - e * e)
}

/// Period in seconds of an orbit with semi-major axis `a` (m) around a
/// total gravitational parameter `gm` (m³/s²).
pub fn orbital_period(a: f64, gm: f64) -> f64 {
    2.0 * consts::PI * libm::sqrt(a.powi(3) / gm)
}

/// Sphere-of-influence radius of a mass `m` orbiting a mass `big_m` at
/// semi-major axis `a`.
pub fn sphere_of_influence(a: f64, m: f64, big_m: f64) -> f64 {
    a * (m / big_m).powf(0.4)
}

/// Solve Kepler's equation `E - e·sin E = M` by Newton iteration.
///
/// On non-convergence the last iterate is returned and a warning logged.
pub fn ma_to_ea(ma: f64, e: f64, tol: f64, maxiter: u64) -> f64 {
    let ma = (ma + consts::PI).rem_euclid(2.0 * consts::PI) - consts::PI;

    let mut ea_new = if -consts::PI < ma && ma < 0.0 || ma > consts::PI {
        ma - e
    } else {
        ma + e
    };

    let mut ea;
    let mut iter = 0;
    while iter < maxiter {
        ea = ea_new;
        ea_new = ea + (ma - ea + e * libm::sin(ea)) / (1.0 - e * libm::cos(ea));

        if (ea_new - ea).abs() < tol {
            return ea_new;
        }

        iter += 1;
    }
    warn!(ma, e, maxiter, "Kepler's equation failed to converge");
    ea_new
}

/// A closed orbit, precomputed as positions at equal time steps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrbitEllipse {
    pub elements: KeplerianElements,
    samples: Vec<Vector3<f64>>,
}

impl OrbitEllipse {
    pub fn new(elements: KeplerianElements, samples: usize) -> Self {
        let samples = samples.max(2);
        let samples = (0..samples)
            .map(|k| {
                let ma = elements.ma_epoch + 2.0 * consts::PI * k as f64 / samples as f64;
                elements.position_at_mean_anomaly(ma)
            })
            .collect();
        Self { elements, samples }
    }

    pub fn samples(&self) -> &[Vector3<f64>] {
        &self.samples
    }

    /// Elapsed fraction of an orbit at Julian date `jd`, in `[0, 1)`.
    pub fn fraction_at(&self, jd: f64) -> f64 {
        ((jd - self.elements.epoch) / self.elements.period).rem_euclid(1.0)
    }

    /// Position at `fraction` of an orbit past the epoch, linearly
    /// interpolated between the neighbouring samples.
    pub fn position_at(&self, fraction: f64) -> Vector3<f64> {
        let n = self.samples.len();
        let x = fraction.rem_euclid(1.0) * n as f64;
        let i0 = (x.floor() as usize).min(n - 1);
        let i1 = (i0 + 1) % n;
        let t = x - i0 as f64;
        self.samples[i0].lerp(&self.samples[i1], t)
    }

    pub fn position_at_jd(&self, jd: f64) -> Vector3<f64> {
        self.position_at(self.fraction_at(jd))
    }

    /// Orbital velocity (m/s) at `fraction`, by central difference over
    /// one sample interval.
    pub fn velocity_at(&self, fraction: f64) -> Vector3<f64> {
        let h = 1.0 / self.samples.len() as f64;
        let d = self.position_at(fraction + h) - self.position_at(fraction - h);
        d / (2.0 * h * self.elements.period_seconds())
    }

    pub fn velocity_at_jd(&self, jd: f64) -> Vector3<f64> {
        self.velocity_at(self.fraction_at(jd))
    }
}
