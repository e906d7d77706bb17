//! Mass properties and rigid-body state.
//!
//! [`Mass`] stores the inertia tensor about the body's reference point
//! (not about the centre of gravity), so that masses built around the
//! same reference point compose by simple addition.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    math::{self, Quat},
};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mass {
    /// Total mass (kg).
    pub mass: f64,
    /// Centre of gravity relative to the reference point.
    pub cog: Vector3<f64>,
    /// Inertia tensor about the reference point.
    pub inertia: Matrix3<f64>,
    /// The mass is never adjusted below this value.
    pub min_mass: f64,
}

impl Default for Mass {
    fn default() -> Self {
        Self::zero()
    }
}

/// `|v|² E − v vᵀ`, the inertia of a unit point mass at `v`.
fn point_inertia(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::identity() * v.norm_squared() - v * v.transpose()
}

impl Mass {
    pub fn zero() -> Self {
        Self {
            mass: 0.0,
            cog: Vector3::zeros(),
            inertia: Matrix3::zeros(),
            min_mass: 0.0,
        }
    }

    pub fn point(mass: f64) -> Self {
        Self {
            mass,
            ..Self::zero()
        }
    }

    /// Uniform solid sphere centred on the reference point.
    pub fn sphere(mass: f64, radius: f64) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self {
            mass,
            inertia: Matrix3::from_diagonal_element(i),
            ..Self::zero()
        }
    }

    /// Set every parameter at once. The off-diagonal products of inertia
    /// are mirrored, so the tensor is always symmetric.
    #[allow(clippy::too_many_arguments)]
    pub fn set(
        &mut self,
        mass: f64,
        cog: Vector3<f64>,
        i11: f64,
        i22: f64,
        i33: f64,
        i12: f64,
        i13: f64,
        i23: f64,
    ) {
        self.mass = mass;
        self.cog = cog;
        self.inertia = Matrix3::new(i11, i12, i13, i12, i22, i23, i13, i23, i33);
    }

    /// Change the total mass, scaling the inertia tensor with it.
    pub fn adjust(&mut self, new_mass: f64) {
        let new_mass = new_mass.max(self.min_mass);
        if self.mass > 0.0 {
            self.inertia *= new_mass / self.mass;
        }
        self.mass = new_mass;
    }

    /// Combine `other` into this mass. Both must share a reference point.
    pub fn add(&mut self, other: &Mass) {
        let total = self.mass + other.mass;
        if total > 0.0 {
            self.cog = (self.cog * self.mass + other.cog * other.mass) / total;
        }
        self.mass = total;
        self.inertia += other.inertia;
        self.min_mass += other.min_mass;
    }

    /// Move the mass by `offset` relative to its reference point
    /// (parallel-axis theorem).
    pub fn translate(&mut self, offset: &Vector3<f64>) {
        let moved = self.cog + offset;
        self.inertia += self.mass * (point_inertia(&moved) - point_inertia(&self.cog));
        self.cog = moved;
    }

    /// Rotate the mass about its reference point.
    pub fn rotate(&mut self, r: &Matrix3<f64>) {
        self.inertia = r * self.inertia * r.transpose();
        self.cog = r * self.cog;
    }

    pub fn set_minimum(&mut self, min_mass: f64) {
        self.min_mass = min_mass;
        if self.mass < min_mass {
            self.adjust(min_mass);
        }
    }

    /// Inertia tensor about the centre of gravity.
    pub fn inertia_about_cog(&self) -> Matrix3<f64> {
        self.inertia - self.mass * point_inertia(&self.cog)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigidBody {
    pub mass: Mass,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub orientation: Quat,
    /// Angular velocity in the world frame (rad/s).
    pub angular_velocity: Vector3<f64>,
    pub force: Vector3<f64>,
    pub torque: Vector3<f64>,
    pub enabled: bool,
}

impl RigidBody {
    pub fn new(mass: Mass) -> Self {
        Self {
            mass,
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            orientation: Quat::identity(),
            angular_velocity: Vector3::zeros(),
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
            enabled: true,
        }
    }

    /// Angular velocity as a pure quaternion `(ω, 0)`.
    pub fn spin(&self) -> Quat {
        Quat::from_imag(self.angular_velocity)
    }

    pub fn apply_force(&mut self, force: &Vector3<f64>) {
        if !self.enabled {
            return;
        }
        self.force += force;
    }

    pub fn apply_torque(&mut self, torque: &Vector3<f64>) {
        if !self.enabled {
            return;
        }
        self.torque += torque;
    }

    /// Apply `force` at the world-frame point `pos`, producing torque about
    /// the body's position.
    pub fn apply_force_at_position(&mut self, pos: &Vector3<f64>, force: &Vector3<f64>) {
        if !self.enabled {
            return;
        }
        self.force += force;
        self.torque += (pos - self.position).cross(force);
    }

    /// Apply a body-frame `force` at the body-frame point `pos`.
    pub fn apply_force_relative(&mut self, pos: &Vector3<f64>, force: &Vector3<f64>) {
        if !self.enabled {
            return;
        }
        let r = math::quat_to_matrix3(&self.orientation);
        let world_force = r * force;
        let world_pos = r * pos;
        self.force += world_force;
        self.torque += world_pos.cross(&world_force);
    }

    pub fn clear_accumulators(&mut self) {
        self.force = Vector3::zeros();
        self.torque = Vector3::zeros();
    }

    /// Inertia tensor about the centre of gravity, in the world frame.
    pub fn inertia_world(&self) -> Matrix3<f64> {
        let r = math::quat_to_matrix3(&self.orientation);
        r * self.mass.inertia_about_cog() * r.transpose()
    }

    /// Fails with [`crate::error::PhysicsError::SingularMatrix`] for bodies
    /// without rotational inertia, such as point masses.
    pub fn inverse_inertia_world(&self) -> Result<Matrix3<f64>> {
        let inertia = self.inertia_world();
        // Pad with an entry of the same magnitude so the singularity test
        // stays relative to the tensor alone.
        let pad = if inertia.amax() > 0.0 { inertia.amax() } else { 1.0 };
        let mut m = math::Matrix::from_diagonal_element(pad);
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&inertia);
        let inv = math::inverse(&m)?;
        Ok(inv.fixed_view::<3, 3>(0, 0).into_owned())
    }

    pub fn kinetic_energy(&self) -> f64 {
        let linear = 0.5 * self.mass.mass * self.velocity.norm_squared();
        let w = self.angular_velocity;
        let angular = 0.5 * w.dot(&(self.inertia_world() * w));
        linear + angular
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::error::PhysicsError;

    #[test]
    fn adjust_scales_inertia() {
        let mut m = Mass::sphere(2.0, 1.0);
        m.adjust(4.0);
        assert_relative_eq!(m.mass, 4.0);
        assert_relative_eq!(m.inertia[(0, 0)], 1.6);
    }

    #[test]
    fn translate_follows_parallel_axis_theorem() {
        let mut m = Mass::sphere(3.0, 1.0);
        let i0 = m.inertia;
        m.translate(&Vector3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(m.cog, Vector3::new(2.0, 0.0, 0.0));
        // Axes perpendicular to the shift gain m·d².
        assert_relative_eq!(m.inertia[(0, 0)], i0[(0, 0)]);
        assert_relative_eq!(m.inertia[(1, 1)], i0[(1, 1)] + 12.0);
        assert_relative_eq!(m.inertia[(2, 2)], i0[(2, 2)] + 12.0);
        // And about the centre of gravity nothing changed.
        assert_relative_eq!(m.inertia_about_cog(), i0, epsilon = 1e-12);

        m.translate(&Vector3::new(-2.0, 0.0, 0.0));
        assert_relative_eq!(m.inertia, i0, epsilon = 1e-12);
    }

    #[test]
    fn add_combines_centre_of_gravity() {
        let mut a = Mass::point(1.0);
        a.translate(&Vector3::new(-1.0, 0.0, 0.0));
        let mut b = Mass::point(3.0);
        b.translate(&Vector3::new(1.0, 0.0, 0.0));
        a.add(&b);
        assert_relative_eq!(a.mass, 4.0);
        assert_relative_eq!(a.cog, Vector3::new(0.5, 0.0, 0.0));
        assert_relative_eq!(a.inertia[(1, 1)], 4.0);
    }

    #[test]
    fn set_minimum_raises_mass() {
        let mut m = Mass::point(1.0);
        m.set_minimum(5.0);
        assert_relative_eq!(m.mass, 5.0);
        m.adjust(2.0);
        assert_relative_eq!(m.mass, 5.0);
    }

    #[test]
    fn set_mirrors_products_of_inertia() {
        let mut m = Mass::zero();
        m.set(1.0, Vector3::zeros(), 1.0, 2.0, 3.0, 0.1, 0.2, 0.3);
        assert_eq!(m.inertia, m.inertia.transpose());
        assert_eq!(m.inertia[(2, 1)], 0.3);
    }

    #[test]
    fn force_at_position_produces_torque() {
        let mut body = RigidBody::new(Mass::sphere(1.0, 1.0));
        body.position = Vector3::new(1.0, 1.0, 1.0);
        body.apply_force_at_position(&Vector3::new(2.0, 1.0, 1.0), &Vector3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(body.force, Vector3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(body.torque, Vector3::new(0.0, 0.0, 1.0));
        body.clear_accumulators();
        assert_eq!(body.force, Vector3::zeros());
        assert_eq!(body.torque, Vector3::zeros());
    }

    #[test]
    fn relative_force_is_rotated_into_world_frame() {
        let mut body = RigidBody::new(Mass::sphere(1.0, 1.0));
        body.orientation =
            math::quat_rotation(&Vector3::z(), std::f64::consts::FRAC_PI_2).unwrap();
        body.apply_force_relative(&Vector3::new(0.0, 1.0, 0.0), &Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(body.force, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(body.torque, Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-12);
    }

    #[test]
    fn disabled_bodies_ignore_forces() {
        let mut body = RigidBody::new(Mass::point(1.0));
        body.enabled = false;
        body.apply_force(&Vector3::x());
        body.apply_force_at_position(&Vector3::y(), &Vector3::x());
        body.apply_force_relative(&Vector3::y(), &Vector3::x());
        body.apply_torque(&Vector3::z());
        assert_eq!(body.force, Vector3::zeros());
        assert_eq!(body.torque, Vector3::zeros());
    }

    #[test]
    fn point_mass_has_no_inverse_inertia() {
        let body = RigidBody::new(Mass::point(1.0));
        assert!(matches!(
            body.inverse_inertia_world(),
            Err(PhysicsError::SingularMatrix { .. })
        ));
        let body = RigidBody::new(Mass::sphere(10.0, 2.0));
        let inv = body.inverse_inertia_world().unwrap();
        assert_relative_eq!(inv[(0, 0)], 1.0 / 16.0, epsilon = 1e-12);
    }
}
