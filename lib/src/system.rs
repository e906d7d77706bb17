//! The orbit hierarchy.
//!
//! A [`World`] is a tree of [`System`]s. Each system models one
//! gravitationally dominant body sitting at the origin of its own local
//! frame, owns a fixed-capacity pool of [`Body`]s moving in that frame,
//! and may itself follow an [`OrbitEllipse`] around its parent.
//!
//! Bodies only feel their own system's dominant mass. Sibling systems do
//! not attract each other, and neither do bodies.

use std::sync::Arc;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::{
    arena::{Arena, IdLike},
    bodies::{Body, BodyHandle},
    config,
    error::{PhysicsError, Result},
    integrator::Integrator,
    kepler::orbits::{self, OrbitEllipse},
    lwc::LargeWorldCoord,
    math::{self, Quat},
    pool::Pool,
    render::{DrawableId, LightId, RenderSink, SceneId},
};

/// Default guard radius for the inverse-square law (m).
pub const DEFAULT_MIN_SEPARATION: f64 = 1.0e-3;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SystemId(u64);

impl IdLike for SystemId {
    fn from_raw(index: usize) -> Self {
        Self(index as u64)
    }

    fn into_raw(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemPhase {
    #[default]
    Idle,
    Stepping,
    Compacting,
    Recursing,
}

/// Construction parameters of a [`System`].
#[derive(Clone, Debug)]
pub struct SystemDesc {
    pub name: Arc<str>,
    /// Mass of the dominant body (kg).
    pub mass: f64,
    /// Gravitational parameter of the dominant body (m³/s²).
    pub gm: f64,
    /// G used to derive `gm` from `mass` when either changes.
    pub gravitational_constant: f64,
    /// Uniform gravitational field applied to every body (m/s²).
    pub g: Vector3<f64>,
    pub radius: f64,
    /// Number of body slots.
    pub capacity: usize,
    pub orbit: Option<OrbitEllipse>,
    pub orientation: Quat,
    /// Angular velocity of the dominant body (rad/s).
    pub spin: Vector3<f64>,
    pub drawable: Option<DrawableId>,
    pub light: Option<LightId>,
}

impl SystemDesc {
    pub fn new(name: impl Into<Arc<str>>, gm: f64, capacity: usize) -> Self {
        Self {
            name: name.into(),
            mass: gm / config::G,
            gm,
            gravitational_constant: config::G,
            g: Vector3::zeros(),
            radius: 0.0,
            capacity,
            orbit: None,
            orientation: Quat::identity(),
            spin: Vector3::zeros(),
            drawable: None,
            light: None,
        }
    }

    #[must_use]
    pub fn with_orbit(mut self, orbit: OrbitEllipse) -> Self {
        self.orbit = Some(orbit);
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct System {
    pub id: SystemId,
    pub name: Arc<str>,
    pub parent: Option<SystemId>,
    /// In insertion order.
    pub children: Vec<SystemId>,
    /// Depth in the tree; the root is level 0.
    pub level: u32,
    pub bodies: Pool<Body>,
    pub mass: f64,
    pub gm: f64,
    pub gravitational_constant: f64,
    /// Uniform field added to every body's gravity (m/s²).
    pub g: Vector3<f64>,
    /// Mass of the enabled bodies after the last step (kg).
    pub total_mass: f64,
    /// Their mass-weighted mean position in the local frame, or the
    /// origin when they have no mass.
    pub centre_of_mass: Vector3<f64>,
    pub radius: f64,
    pub orbit: Option<OrbitEllipse>,
    /// Offset from the parent's origin (m).
    pub local_position: Vector3<f64>,
    /// Velocity relative to the parent (m/s).
    pub local_velocity: Vector3<f64>,
    pub world_position: LargeWorldCoord,
    pub orientation: Quat,
    pub spin: Vector3<f64>,
    pub drawable: Option<DrawableId>,
    pub light: Option<LightId>,
    pub phase: SystemPhase,
    /// Sphere-of-influence radius (m). Infinite for the root and for
    /// systems whose parent has no gravitational parameter.
    pub soi: f64,
}

impl System {
    fn new(id: SystemId, parent: Option<(SystemId, u32, f64)>, desc: SystemDesc) -> Self {
        let soi = match (&desc.orbit, parent) {
            (Some(orbit), Some((_, _, parent_gm))) if parent_gm > 0.0 => {
                orbits::sphere_of_influence(orbit.elements.a, desc.gm, parent_gm)
            }
            _ => f64::INFINITY,
        };
        Self {
            id,
            name: desc.name,
            parent: parent.map(|(p, _, _)| p),
            children: Vec::new(),
            level: parent.map_or(0, |(_, level, _)| level + 1),
            bodies: Pool::with_capacity(desc.capacity),
            mass: desc.mass,
            gm: desc.gm,
            gravitational_constant: desc.gravitational_constant,
            g: desc.g,
            total_mass: 0.0,
            centre_of_mass: Vector3::zeros(),
            radius: desc.radius,
            orbit: desc.orbit,
            local_position: Vector3::zeros(),
            local_velocity: Vector3::zeros(),
            world_position: LargeWorldCoord::origin(),
            orientation: desc.orientation,
            spin: desc.spin,
            drawable: desc.drawable,
            light: desc.light,
            phase: SystemPhase::Idle,
            soi,
        }
    }

    /// Replace this system's G. The dominant body keeps its mass, so its
    /// gravitational parameter is recomputed.
    pub fn set_gravitational_constant(&mut self, g: f64) {
        self.gravitational_constant = g;
        self.gm = g * self.mass;
    }

    /// Add `g` to the uniform field felt by every body in this system.
    pub fn apply_gravity(&mut self, g: &Vector3<f64>) {
        self.g += g;
    }

    /// Whether a body at `pos` in the parent's frame is inside this
    /// system's sphere of influence. Systems without an orbit never are.
    fn contains(&self, pos: &Vector3<f64>) -> bool {
        self.orbit.is_some() && self.soi.is_finite() && (pos - self.local_position).norm() < self.soi
    }

    fn update_mass_distribution(&mut self) {
        let (m, weighted) = self
            .bodies
            .iter()
            .filter(|(_, b)| b.rigid.enabled)
            .fold((0.0, Vector3::zeros()), |(m, acc), (_, b)| {
                (m + b.mass(), acc + b.rigid.position * b.mass())
            });
        self.total_mass = m;
        self.centre_of_mass = if m > 0.0 { weighted / m } else { Vector3::zeros() };
    }

    /// Evaluate the orbit at Julian date `jd`, if there is one.
    fn update_orbit_position(&mut self, jd: f64) {
        if let Some(orbit) = &self.orbit {
            self.local_position = orbit.position_at_jd(jd);
            self.local_velocity = orbit.velocity_at_jd(jd);
            trace!(system = %self.name, jd, position = ?self.local_position, "orbit position");
        }
    }

    fn rotate(&mut self, dt: f64) {
        if self.spin == Vector3::zeros() {
            return;
        }
        let dq = Quat::from_imag(self.spin) * self.orientation * (0.5 * dt);
        self.orientation = math::quat_normalize(&(self.orientation + dq));
    }
}

/// Inverse-square attraction of a body of mass `m` at `position` towards
/// a dominant mass `gm` at the origin.
///
/// The distance used is at least `min_separation`. A body exactly at the
/// origin has no direction to fall in and feels no force.
pub fn gravity_force(position: &Vector3<f64>, m: f64, gm: f64, min_separation: f64) -> Vector3<f64> {
    let r = position.norm();
    if r == 0.0 || !r.is_finite() {
        return Vector3::zeros();
    }
    let r_eff = r.max(min_separation);
    -(gm * m / (r_eff * r_eff)) * (position / r)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct World {
    pub name: Arc<str>,
    systems: Arena<SystemId, System>,
    root: SystemId,
    pub scene: Option<SceneId>,
    pub integrator: Integrator,
    pub min_separation: f64,
}

impl World {
    pub fn new(name: impl Into<Arc<str>>, root: SystemDesc) -> Self {
        let mut systems = Arena::new();
        let id = systems.next_id();
        info!(system = %root.name, "creating root system");
        systems.push(System::new(id, None, root));
        Self {
            name: name.into(),
            systems,
            root: id,
            scene: None,
            integrator: Integrator::default(),
            min_separation: DEFAULT_MIN_SEPARATION,
        }
    }

    pub fn root_id(&self) -> SystemId {
        self.root
    }

    pub fn root(&self) -> &System {
        &self.systems[self.root]
    }

    pub fn systems(&self) -> impl Iterator<Item = &System> {
        self.systems.iter().map(|(_, s)| s)
    }

    pub fn system(&self, id: SystemId) -> Result<&System> {
        self.systems.get(id).ok_or(PhysicsError::InvalidHandle {
            what: "system",
            index: id.into_raw(),
        })
    }

    pub fn system_mut(&mut self, id: SystemId) -> Result<&mut System> {
        self.systems.get_mut(id).ok_or(PhysicsError::InvalidHandle {
            what: "system",
            index: id.into_raw(),
        })
    }

    pub fn add_child(&mut self, parent: SystemId, desc: SystemDesc) -> Result<SystemId> {
        let p = self.system(parent)?;
        let parent_info = (parent, p.level, p.gm);
        let id = self.systems.next_id();
        info!(system = %desc.name, parent = %p.name, "attaching child system");
        self.systems.push(System::new(id, Some(parent_info), desc));
        self.systems[parent].children.push(id);
        Ok(id)
    }

    /// Slash-separated names from the root down to `id`.
    pub fn path_of(&self, id: SystemId) -> Result<String> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            let s = self.system(c)?;
            names.push(&*s.name);
            current = s.parent;
        }
        names.reverse();
        Ok(names.join("/"))
    }

    /// Resolve a path such as `"Sol/Earth/Moon"`.
    ///
    /// The first segment names the root. Every further segment is matched
    /// against the current system's children in insertion order; the first
    /// exact match wins.
    pub fn lookup(&self, path: &str) -> Result<SystemId> {
        let mut segments = path.split('/');
        match segments.next() {
            Some(first) if !first.is_empty() && first == &*self.root().name => {}
            _ => return Err(PhysicsError::not_found(path)),
        }
        let mut current = self.root;
        for segment in segments {
            current = self.systems[current]
                .children
                .iter()
                .copied()
                .find(|&c| !segment.is_empty() && &*self.systems[c].name == segment)
                .ok_or_else(|| PhysicsError::not_found(path))?;
        }
        Ok(current)
    }

    /// Absolute velocity of a system's origin (m/s).
    pub fn world_velocity(&self, id: SystemId) -> Result<Vector3<f64>> {
        let mut v = Vector3::zeros();
        let mut current = Some(id);
        while let Some(c) = current {
            let s = self.system(c)?;
            v += s.local_velocity;
            current = s.parent;
        }
        Ok(v)
    }

    /// Put `body` into `system`'s pool.
    pub fn spawn_body(&mut self, system: SystemId, body: Body) -> Result<BodyHandle> {
        let s = self.system_mut(system)?;
        match s.bodies.insert(body) {
            Ok(slot) => {
                debug!(system = %s.name, slot = slot.index, "spawned body");
                Ok(BodyHandle { system, slot })
            }
            Err(body) => {
                warn!(system = %s.name, body = %body.name, "no free slot for body");
                Err(PhysicsError::DestinationFull {
                    system: s.name.to_string(),
                    capacity: s.bodies.capacity(),
                })
            }
        }
    }

    pub fn body(&self, handle: BodyHandle) -> Result<&Body> {
        self.system(handle.system)?
            .bodies
            .get(handle.slot)
            .ok_or(PhysicsError::InvalidHandle {
                what: "body",
                index: handle.slot.index as usize,
            })
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Result<&mut Body> {
        self.system_mut(handle.system)?
            .bodies
            .get_mut(handle.slot)
            .ok_or(PhysicsError::InvalidHandle {
                what: "body",
                index: handle.slot.index as usize,
            })
    }

    pub fn remove_body(&mut self, handle: BodyHandle) -> Result<Body> {
        self.system_mut(handle.system)?
            .bodies
            .remove(handle.slot)
            .ok_or(PhysicsError::InvalidHandle {
                what: "body",
                index: handle.slot.index as usize,
            })
    }

    pub fn body_world_position(&self, handle: BodyHandle) -> Result<LargeWorldCoord> {
        let body = self.body(handle)?;
        Ok(self
            .system(handle.system)?
            .world_position
            .translated(&body.rigid.position))
    }

    /// Move a body into `dest`'s pool, copying its state verbatim.
    ///
    /// Fails with [`PhysicsError::DestinationFull`] if `dest` has no free
    /// slot, leaving the source untouched. On success the old handle is
    /// stale and the returned one must be used instead.
    pub fn migrate(&mut self, dest: SystemId, handle: BodyHandle) -> Result<BodyHandle> {
        self.transfer(dest, handle, false)
    }

    /// Like [`World::migrate`], but re-expresses position and velocity in
    /// `dest`'s frame.
    pub fn migrate_rebased(&mut self, dest: SystemId, handle: BodyHandle) -> Result<BodyHandle> {
        self.transfer(dest, handle, true)
    }

    fn transfer(&mut self, dest: SystemId, handle: BodyHandle, rebase: bool) -> Result<BodyHandle> {
        let mut body = self.body(handle)?.clone();
        if dest == handle.system {
            return Ok(handle);
        }

        if rebase {
            let src = self.system(handle.system)?;
            let dst = self.system(dest)?;
            body.rigid.position += src.world_position.delta(&dst.world_position);
            body.rigid.velocity += self.world_velocity(handle.system)? - self.world_velocity(dest)?;
        }

        let d = self.system_mut(dest)?;
        let slot = match d.bodies.insert(body) {
            Ok(slot) => slot,
            Err(body) => {
                warn!(
                    body = %body.name,
                    dest = %d.name,
                    "no space in destination system, cannot migrate object"
                );
                return Err(PhysicsError::DestinationFull {
                    system: d.name.to_string(),
                    capacity: d.bodies.capacity(),
                });
            }
        };
        let dest_name = d.name.clone();

        let s = self.system_mut(handle.system)?;
        s.bodies.remove(handle.slot);
        debug!(from = %s.name, to = %dest_name, rebase, "migrated body");

        Ok(BodyHandle { system: dest, slot })
    }

    /// Bodies that have left their system's sphere of influence, or
    /// entered the sphere of one of its children, paired with the system
    /// they should move to.
    pub fn soi_transitions(&self) -> Vec<(BodyHandle, SystemId)> {
        let mut out = Vec::new();
        for (id, system) in self.systems.iter() {
            for (slot, body) in system.bodies.iter() {
                let handle = BodyHandle { system: id, slot };
                let pos = body.rigid.position;
                if let Some(parent) = system.parent {
                    if pos.norm() > system.soi {
                        out.push((handle, parent));
                        continue;
                    }
                }
                let entered = system
                    .children
                    .iter()
                    .copied()
                    .find(|&c| self.systems[c].contains(&pos));
                if let Some(child) = entered {
                    out.push((handle, child));
                }
            }
        }
        out
    }

    /// Evaluate every orbit at `jd` and recompute world positions, without
    /// integrating any body.
    pub fn update_positions(&mut self, jd: f64) {
        self.update_positions_from(self.root, jd, LargeWorldCoord::origin());
    }

    fn update_positions_from(&mut self, id: SystemId, jd: f64, parent_world: LargeWorldCoord) {
        let s = &mut self.systems[id];
        s.update_orbit_position(jd);
        s.world_position = parent_world.translated(&s.local_position);
        let world = s.world_position;
        for child in s.children.clone() {
            self.update_positions_from(child, jd, world);
        }
    }

    /// Advance the whole tree by `dt` seconds, with orbits evaluated at
    /// Julian date `jd`, and publish the result to `sink`.
    pub fn step(&mut self, dt: f64, jd: f64, sink: &mut dyn RenderSink) {
        sink.begin_frame(self.scene);
        self.step_system(self.root, dt, jd, LargeWorldCoord::origin(), sink);
    }

    fn step_system(
        &mut self,
        id: SystemId,
        dt: f64,
        jd: f64,
        parent_world: LargeWorldCoord,
        sink: &mut dyn RenderSink,
    ) {
        let integrator = self.integrator;
        let min_separation = self.min_separation;
        let s = &mut self.systems[id];

        if !s.bodies.is_empty() {
            s.phase = SystemPhase::Stepping;
            let (gm, g) = (s.gm, s.g);
            for (_, body) in s.bodies.iter_mut() {
                let m = body.mass();
                let force = gravity_force(&body.rigid.position, m, gm, min_separation) + g * m;
                body.rigid.apply_force(&force);
            }
            for (_, body) in s.bodies.iter_mut() {
                integrator.step(&mut body.rigid, dt);
            }
        }
        s.update_mass_distribution();
        let needs_compaction = s.bodies.needs_compaction();

        s.update_orbit_position(jd);
        s.rotate(dt);
        s.world_position = parent_world.translated(&s.local_position);
        let world = s.world_position;

        if !s.children.is_empty() {
            s.phase = SystemPhase::Recursing;
            for child in s.children.clone() {
                self.step_system(child, dt, jd, world, sink);
            }
        }

        let s = &mut self.systems[id];
        if needs_compaction {
            s.phase = SystemPhase::Compacting;
            s.bodies.compact();
        }

        if let Some(drawable) = s.drawable {
            sink.update_drawable(drawable, &world, &s.orientation);
        }
        if let Some(light) = s.light {
            sink.update_light(light, &world);
        }
        for (_, body) in s.bodies.iter() {
            if let Some(drawable) = body.drawable {
                let p = world.translated(&body.rigid.position);
                sink.update_drawable(drawable, &p, &body.rigid.orientation);
            }
            if let Some(light) = body.light {
                sink.update_light(light, &world.translated(&body.rigid.position));
            }
        }
        s.phase = SystemPhase::Idle;
    }
}
