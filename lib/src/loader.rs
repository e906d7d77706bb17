//! Building worlds and spacecraft from configuration records.

use std::f64::consts;

use nalgebra::Vector3;
use tracing::info;

use crate::{
    bodies::Body,
    config::{CelestialRecord, OrbitRecord, PhysicalRecord, SpacecraftRecord, StageRecord, AU},
    error::{PhysicsError, Result},
    integrator::Integrator,
    kepler::orbits::{self, KeplerianElements, OrbitEllipse, DEFAULT_SAMPLES},
    math::{self, Quat},
    render::{DrawableId, LightId},
    rigid::Mass,
    spacecraft::{Engine, Spacecraft, Stage, StageState},
    system::{SystemDesc, SystemId, World, DEFAULT_MIN_SEPARATION},
    time::SECONDS_PER_DAY,
};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LoadOptions {
    /// Body slots for records that do not set a capacity.
    pub capacity: usize,
    pub integrator: Integrator,
    /// Samples per orbit ellipse.
    pub samples: usize,
    pub min_separation: f64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            capacity: 64,
            integrator: Integrator::default(),
            samples: DEFAULT_SAMPLES,
            min_separation: DEFAULT_MIN_SEPARATION,
        }
    }
}

/// Orbital elements in SI units for an orbit around a combined
/// gravitational parameter `gm_total`.
pub fn orbital_elements(orbit: &OrbitRecord, gm_total: f64) -> KeplerianElements {
    let a = orbit.semimajor_axis * AU;
    let lan = math::deg_to_rad(orbit.longitude_ascending_node);
    let lp = math::deg_to_rad(orbit.longitude_periapsis);
    let ml = math::deg_to_rad(orbit.mean_longitude);
    KeplerianElements {
        a,
        e: orbit.eccentricity,
        i: math::deg_to_rad(orbit.inclination),
        lan,
        argpe: lp - lan,
        ma_epoch: ml - lp,
        epoch: orbit.reference_date,
        period: orbits::orbital_period(a, gm_total) / SECONDS_PER_DAY,
    }
}

/// Orientation from the axial tilt and angular velocity from the sidereal
/// period, spinning about the tilted pole.
fn rotation(phys: &PhysicalRecord) -> Result<(Quat, Vector3<f64>)> {
    let orientation = math::quat_rotation(&Vector3::x(), math::deg_to_rad(phys.axial_tilt))?;
    let spin = if phys.sidereal_rotational_period == 0.0 {
        Vector3::zeros()
    } else {
        let rate = 2.0 * consts::PI / (phys.sidereal_rotational_period * SECONDS_PER_DAY);
        math::rotate(&orientation, &Vector3::z()) * rate
    };
    Ok((orientation, spin))
}

fn system_desc(rec: &CelestialRecord, opts: &LoadOptions) -> Result<SystemDesc> {
    let (orientation, spin) = rotation(&rec.physical)?;
    Ok(SystemDesc {
        name: rec.name.as_str().into(),
        mass: rec.physical.mass,
        gm: rec.physical.gm(),
        gravitational_constant: rec.physical.gravitational_constant(),
        g: vec3(rec.physical.uniform_gravity),
        radius: rec.physical.radius,
        capacity: rec.capacity.unwrap_or(opts.capacity),
        orbit: None,
        orientation,
        spin,
        drawable: rec.drawable.map(DrawableId),
        light: rec.light.map(LightId),
    })
}

/// Build a world from a root record (star → planets → moons).
///
/// The whole tree is validated first; an invalid record anywhere fails
/// the load before any system exists.
pub fn load_world(name: &str, root: &CelestialRecord, opts: &LoadOptions) -> Result<World> {
    root.validate(true)?;

    let mut world = World::new(name, system_desc(root, opts)?);
    world.integrator = opts.integrator;
    world.min_separation = opts.min_separation;

    let root_id = world.root_id();
    for sat in &root.satellites {
        load_satellite(&mut world, root_id, root.physical.gm(), sat, opts)?;
    }
    info!(world = name, systems = world.systems().count(), "world loaded");
    Ok(world)
}

fn load_satellite(
    world: &mut World,
    parent: SystemId,
    parent_gm: f64,
    rec: &CelestialRecord,
    opts: &LoadOptions,
) -> Result<()> {
    let Some(orbit) = &rec.orbit else {
        return Err(PhysicsError::invalid_config(&rec.name, "non-root body has no orbit"));
    };
    let gm = rec.physical.gm();
    let gm_total = parent_gm + gm;
    if gm_total <= 0.0 {
        return Err(PhysicsError::invalid_config(
            &rec.name,
            "orbit has no gravitational parameter",
        ));
    }

    let elements = orbital_elements(orbit, gm_total);
    let desc = system_desc(rec, opts)?.with_orbit(OrbitEllipse::new(elements, opts.samples));
    let id = world.add_child(parent, desc)?;

    for sat in &rec.satellites {
        load_satellite(world, id, gm, sat, opts)?;
    }
    Ok(())
}

fn vec3(v: [f64; 3]) -> Vector3<f64> {
    Vector3::from(v)
}

/// Stage mass: base inertia for unit mass, scaled to the stage mass,
/// moved to the stage's centre of gravity, with its dry mass as minimum.
pub fn stage_mass(rec: &StageRecord) -> Mass {
    let m = &rec.mass;
    let [i11, i22, i33, i12, i13, i23] = m.inertia;
    let mut mass = Mass::zero();
    mass.set(1.0, Vector3::zeros(), i11, i22, i33, i12, i13, i23);
    mass.adjust(m.mass);
    mass.translate(&(vec3(rec.offset) + vec3(m.cog)));
    mass.set_minimum(m.min_mass);
    mass
}

fn build_stage(rec: &StageRecord) -> Result<Stage> {
    let engines = rec
        .engines
        .iter()
        .map(|e| {
            let mut engine = Engine::new(e.name.as_str(), vec3(e.mount), vec3(e.force));
            engine.state = e.state;
            engine.set_throttle(e.throttle)?;
            Ok(engine)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Stage {
        name: rec.name.as_str().into(),
        state: StageState::Attached,
        mass: stage_mass(rec),
        offset: vec3(rec.offset),
        engines,
        detach_order: rec.detach_order,
        primary_engine: rec.primary_engine,
        separation_force: vec3(rec.separation_force),
    })
}

/// Spawn a spacecraft's body into the system its record names.
pub fn load_spacecraft(world: &mut World, rec: &SpacecraftRecord) -> Result<Spacecraft> {
    rec.validate()?;
    let system = world.lookup(&rec.system)?;
    let stages = rec.stages.iter().map(build_stage).collect::<Result<Vec<_>>>()?;

    let [x, y, z, w] = rec.orientation;
    let mut body = Body::new(rec.name.as_str(), Mass::zero());
    body.rigid.position = vec3(rec.position);
    body.rigid.velocity = vec3(rec.velocity);
    body.rigid.orientation = math::quat_normalize(&Quat::new(w, x, y, z));
    body.rigid.angular_velocity = vec3(rec.angular_velocity);
    body.drawable = rec.drawable.map(DrawableId);

    let handle = world.spawn_body(system, body)?;
    let sc = Spacecraft::new(rec.name.as_str(), handle, stages, rec.separation_delay);
    world.body_mut(handle)?.rigid.mass = sc.composite_mass();
    info!(spacecraft = %sc.name, system = %rec.system, stages = sc.stages.len(), "spacecraft loaded");
    Ok(sc)
}
