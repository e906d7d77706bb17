use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{math, math::Quat, rigid::RigidBody};

/// Numerical integration scheme used for every body of a world.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Integrator {
    /// `r += v·dt` with the old velocity, then `v += a·dt`.
    ExplicitEuler,
    /// `v += a·dt` first, then `r += v·dt` with the new velocity.
    /// Symplectic, so orbits do not spiral outwards.
    #[default]
    SemiImplicitEuler,
}

impl Integrator {
    /// Advance `body` by `dt` seconds from its accumulated force and
    /// torque, then clear the accumulators. Disabled bodies only have
    /// their accumulators cleared.
    pub fn step(self, body: &mut RigidBody, dt: f64) {
        if body.enabled {
            let accel = if body.mass.mass > 0.0 {
                body.force / body.mass.mass
            } else {
                Vector3::zeros()
            };

            match self {
                Self::ExplicitEuler => {
                    body.position += body.velocity * dt;
                    body.velocity += accel * dt;
                }
                Self::SemiImplicitEuler => {
                    body.velocity += accel * dt;
                    body.position += body.velocity * dt;
                }
            }

            // Point masses have no rotational inertia and keep spinning
            // at whatever rate they were given.
            if let Ok(inv) = body.inverse_inertia_world() {
                body.angular_velocity += inv * body.torque * dt;
            }
            let w = Quat::from_imag(body.angular_velocity);
            let dq = w * body.orientation * (0.5 * dt);
            body.orientation = math::quat_normalize(&(body.orientation + dq));
        }
        body.clear_accumulators();
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::rigid::Mass;

    #[test]
    fn constant_force_explicit_vs_semi_implicit() {
        let mut a = RigidBody::new(Mass::point(2.0));
        let mut b = a.clone();
        a.apply_force(&Vector3::new(4.0, 0.0, 0.0));
        b.apply_force(&Vector3::new(4.0, 0.0, 0.0));
        Integrator::ExplicitEuler.step(&mut a, 0.5);
        Integrator::SemiImplicitEuler.step(&mut b, 0.5);
        assert_relative_eq!(a.velocity.x, 1.0);
        assert_relative_eq!(a.position.x, 0.0);
        assert_relative_eq!(b.velocity.x, 1.0);
        assert_relative_eq!(b.position.x, 0.5);
        assert_eq!(a.force, Vector3::zeros());
    }

    #[test]
    fn disabled_body_does_not_move() {
        let mut body = RigidBody::new(Mass::point(1.0));
        body.velocity = Vector3::x();
        body.force = Vector3::y();
        body.enabled = false;
        Integrator::default().step(&mut body, 1.0);
        assert_eq!(body.position, Vector3::zeros());
        assert_eq!(body.force, Vector3::zeros());
    }

    #[test]
    fn spin_keeps_orientation_normalised() {
        let mut body = RigidBody::new(Mass::sphere(1.0, 1.0));
        body.angular_velocity = Vector3::new(0.0, 0.0, 1.0);
        for _ in 0..1000 {
            Integrator::default().step(&mut body, 0.001);
        }
        assert_relative_eq!(body.orientation.norm(), 1.0, epsilon = 1e-12);
        // One radian about z, to first order.
        let x = math::rotate(&body.orientation, &Vector3::x());
        assert_relative_eq!(x.x, 1f64.cos(), epsilon = 1e-2);
        assert_relative_eq!(x.y, 1f64.sin(), epsilon = 1e-2);
    }

    #[test]
    fn torque_spins_up_body() {
        let mut body = RigidBody::new(Mass::sphere(10.0, 2.0));
        body.apply_torque(&Vector3::new(0.0, 0.0, 16.0));
        Integrator::default().step(&mut body, 1.0);
        assert_relative_eq!(body.angular_velocity, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }
}
