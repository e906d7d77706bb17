//! Configuration records.
//!
//! These are the plain parameter records produced by whatever parses the
//! scenario documents. Field names follow the document keys
//! (`semimajor-axis`, `longitude-ascending-node`, ...). Units are the
//! document's: AU for semi-major axes, degrees for angles, days for the
//! sidereal period, Julian dates for epochs. [`crate::loader`] converts
//! them to SI.
//!
//! Every record has a `validate` method; the loader calls it before
//! building anything, so a bad record aborts construction of its subtree
//! instead of producing a half-built system.

use serde::{Deserialize, Serialize};

use crate::{
    error::{PhysicsError, Result},
    spacecraft::EngineState,
    time::J2000,
};

/// Gravitational constant (m³ kg⁻¹ s⁻²).
pub const G: f64 = 6.67428e-11;

/// Astronomical unit (m).
pub const AU: f64 = 149_597_870_000.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CelestialRecord {
    pub name: String,
    pub physical: PhysicalRecord,
    /// Absent only for the root of a hierarchy.
    #[serde(default)]
    pub orbit: Option<OrbitRecord>,
    #[serde(default)]
    pub satellites: Vec<CelestialRecord>,
    /// Number of body slots; the loader's default when absent.
    #[serde(default)]
    pub capacity: Option<usize>,
    #[serde(default)]
    pub drawable: Option<u64>,
    #[serde(default)]
    pub light: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PhysicalRecord {
    /// kg
    pub mass: f64,
    /// m
    pub radius: f64,
    /// Days. Zero means the body does not rotate.
    #[serde(default)]
    pub sidereal_rotational_period: f64,
    /// Degrees.
    #[serde(default)]
    pub axial_tilt: f64,
    /// m³/s². Falls back to `mass * G`.
    #[serde(default)]
    pub gm: Option<f64>,
    /// This system's G, when it differs from [`G`].
    #[serde(default)]
    pub gravitational_constant: Option<f64>,
    /// Uniform field felt by every body in the system (m/s²).
    #[serde(default)]
    pub uniform_gravity: [f64; 3],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OrbitRecord {
    /// AU
    pub semimajor_axis: f64,
    pub eccentricity: f64,
    /// Degrees.
    pub inclination: f64,
    /// Degrees.
    pub longitude_ascending_node: f64,
    /// Degrees.
    pub longitude_periapsis: f64,
    /// Degrees.
    pub mean_longitude: f64,
    /// Julian date.
    #[serde(default = "default_reference_date")]
    pub reference_date: f64,
}

fn default_reference_date() -> f64 {
    J2000
}

fn check(ok: bool, record: &str, reason: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(PhysicsError::invalid_config(record, reason))
    }
}

impl PhysicalRecord {
    pub fn gravitational_constant(&self) -> f64 {
        self.gravitational_constant.unwrap_or(G)
    }

    pub fn gm(&self) -> f64 {
        self.gm.unwrap_or(self.mass * self.gravitational_constant())
    }
}

impl CelestialRecord {
    /// Check this record and all its satellites. `is_root` records may
    /// omit their orbit; every other record must have one.
    pub fn validate(&self, is_root: bool) -> Result<()> {
        let name = self.name.as_str();
        check(!name.is_empty(), "<unnamed>", "name is empty")?;
        check(!name.contains('/'), name, "name contains '/'")?;

        let p = &self.physical;
        check(p.mass.is_finite() && p.mass >= 0.0, name, "mass must be finite and non-negative")?;
        check(p.radius.is_finite() && p.radius >= 0.0, name, "radius must be finite and non-negative")?;
        check(
            p.sidereal_rotational_period.is_finite(),
            name,
            "sidereal rotational period must be finite",
        )?;
        check(p.axial_tilt.is_finite(), name, "axial tilt must be finite")?;
        if let Some(gm) = p.gm {
            check(gm.is_finite() && gm >= 0.0, name, "gm must be finite and non-negative")?;
        }
        if let Some(g) = p.gravitational_constant {
            check(g.is_finite() && g > 0.0, name, "gravitational constant must be positive")?;
        }
        check(
            p.uniform_gravity.iter().all(|x| x.is_finite()),
            name,
            "uniform gravity must be finite",
        )?;
        if let Some(capacity) = self.capacity {
            check(capacity > 0, name, "capacity must be positive")?;
        }

        match &self.orbit {
            Some(orbit) => orbit.validate(name)?,
            None => check(is_root, name, "non-root body has no orbit")?,
        }

        for sat in &self.satellites {
            sat.validate(false)?;
        }
        Ok(())
    }
}

impl OrbitRecord {
    pub fn validate(&self, record: &str) -> Result<()> {
        check(
            self.semimajor_axis.is_finite() && self.semimajor_axis > 0.0,
            record,
            "semi-major axis must be positive",
        )?;
        check(
            (0.0..1.0).contains(&self.eccentricity),
            record,
            "eccentricity must be in [0, 1)",
        )?;
        check(
            [
                self.inclination,
                self.longitude_ascending_node,
                self.longitude_periapsis,
                self.mean_longitude,
                self.reference_date,
            ]
            .iter()
            .all(|x| x.is_finite()),
            record,
            "orbital elements must be finite",
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SpacecraftRecord {
    pub name: String,
    /// Path of the system the spacecraft starts in, e.g. `"Sol/Earth"`.
    pub system: String,
    /// m, in the system's frame.
    #[serde(default)]
    pub position: [f64; 3],
    /// m/s
    #[serde(default)]
    pub velocity: [f64; 3],
    /// Quaternion as `[x, y, z, w]`.
    #[serde(default = "identity_quat")]
    pub orientation: [f64; 4],
    /// rad/s
    #[serde(default)]
    pub angular_velocity: [f64; 3],
    /// In any order; sorted by `detach-order` on load.
    pub stages: Vec<StageRecord>,
    /// Seconds between a detach and its completion.
    #[serde(default = "default_separation_delay")]
    pub separation_delay: f64,
    #[serde(default)]
    pub drawable: Option<u64>,
}

fn identity_quat() -> [f64; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn default_separation_delay() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StageRecord {
    pub name: String,
    pub detach_order: u32,
    pub mass: MassRecord,
    /// Stage reference point in the spacecraft frame (m).
    #[serde(default)]
    pub offset: [f64; 3],
    /// Engine armed and fired when this stage becomes active.
    #[serde(default)]
    pub primary_engine: Option<usize>,
    /// Impulse-like push given to the assembly on separation (N, body frame).
    #[serde(default)]
    pub separation_force: [f64; 3],
    #[serde(default)]
    pub engines: Vec<EngineRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MassRecord {
    /// kg
    pub mass: f64,
    /// Inertia of the stage at unit mass: `[i11, i22, i33, i12, i13, i23]`.
    pub inertia: [f64; 6],
    /// Centre of gravity relative to the stage offset (m).
    #[serde(default)]
    pub cog: [f64; 3],
    /// Dry mass (kg).
    #[serde(default)]
    pub min_mass: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineRecord {
    pub name: String,
    #[serde(default)]
    pub state: EngineState,
    /// Mount point relative to the stage offset (m).
    pub mount: [f64; 3],
    /// Rated force at full throttle (N, body frame).
    pub force: [f64; 3],
    #[serde(default)]
    pub throttle: f64,
}

impl SpacecraftRecord {
    pub fn validate(&self) -> Result<()> {
        let name = self.name.as_str();
        check(!name.is_empty(), "<unnamed>", "name is empty")?;
        check(!self.stages.is_empty(), name, "spacecraft has no stages")?;
        check(
            self.separation_delay.is_finite() && self.separation_delay >= 0.0,
            name,
            "separation delay must be finite and non-negative",
        )?;
        let finite = self
            .position
            .iter()
            .chain(&self.velocity)
            .chain(&self.orientation)
            .chain(&self.angular_velocity)
            .all(|x| x.is_finite());
        check(finite, name, "initial state must be finite")?;
        check(
            self.orientation.iter().any(|&x| x != 0.0),
            name,
            "orientation quaternion is zero",
        )?;
        for stage in &self.stages {
            stage.validate()?;
        }
        Ok(())
    }
}

impl StageRecord {
    pub fn validate(&self) -> Result<()> {
        let name = self.name.as_str();
        check(!name.is_empty(), "<unnamed stage>", "name is empty")?;
        let m = &self.mass;
        check(m.mass.is_finite() && m.mass >= 0.0, name, "mass must be finite and non-negative")?;
        check(
            m.min_mass.is_finite() && (0.0..=m.mass).contains(&m.min_mass),
            name,
            "minimum mass must be between zero and the stage mass",
        )?;
        check(
            m.inertia.iter().chain(&m.cog).all(|x| x.is_finite()),
            name,
            "mass parameters must be finite",
        )?;
        if let Some(primary) = self.primary_engine {
            check(primary < self.engines.len(), name, "primary engine index out of range")?;
        }
        for engine in &self.engines {
            check(
                (0.0..=1.0).contains(&engine.throttle),
                &engine.name,
                "throttle must be in [0, 1]",
            )?;
            check(
                engine.mount.iter().chain(&engine.force).all(|x| x.is_finite()),
                &engine.name,
                "engine vectors must be finite",
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EARTH: &str = r#"
        name = "Earth"

        [physical]
        mass = 5.9736e24
        radius = 6371000.0
        sidereal-rotational-period = 0.99726968
        axial-tilt = 23.44

        [orbit]
        semimajor-axis = 1.00000261
        eccentricity = 0.01671123
        inclination = -0.00001531
        longitude-ascending-node = 0.0
        longitude-periapsis = 102.93768193
        mean-longitude = 100.46457166
    "#;

    #[test]
    fn parses_kebab_case_documents() {
        let rec: CelestialRecord = toml::from_str(EARTH).unwrap();
        assert_eq!(rec.name, "Earth");
        let orbit = rec.orbit.as_ref().unwrap();
        assert_eq!(orbit.reference_date, J2000);
        assert_eq!(rec.physical.gm, None);
        assert!((rec.physical.gm() - 5.9736e24 * G).abs() < 1.0);
        assert_eq!(rec.physical.uniform_gravity, [0.0; 3]);
        rec.validate(false).unwrap();
    }

    #[test]
    fn rejects_physically_meaningless_values() {
        let mut rec: CelestialRecord = toml::from_str(EARTH).unwrap();
        rec.physical.mass = -1.0;
        assert!(matches!(
            rec.validate(false),
            Err(PhysicsError::InvalidConfiguration { .. })
        ));

        let mut rec: CelestialRecord = toml::from_str(EARTH).unwrap();
        rec.orbit.as_mut().unwrap().eccentricity = 1.0;
        assert!(rec.validate(false).is_err());

        let mut rec: CelestialRecord = toml::from_str(EARTH).unwrap();
        rec.orbit = None;
        assert!(rec.validate(false).is_err());
        assert!(rec.validate(true).is_ok());

        let mut rec: CelestialRecord = toml::from_str(EARTH).unwrap();
        rec.capacity = Some(0);
        assert!(rec.validate(false).is_err());

        let mut rec: CelestialRecord = toml::from_str(EARTH).unwrap();
        rec.physical.gravitational_constant = Some(0.0);
        assert!(rec.validate(false).is_err());
    }

    #[test]
    fn gravitational_constant_feeds_gm() {
        let doc = r#"
            name = "Toy"
            [physical]
            mass = 2.0
            radius = 1.0
            gravitational-constant = 0.5
            uniform-gravity = [0.0, 0.0, -9.81]
        "#;
        let rec: CelestialRecord = toml::from_str(doc).unwrap();
        assert_eq!(rec.physical.gm(), 1.0);
        assert_eq!(rec.physical.uniform_gravity[2], -9.81);
        rec.validate(true).unwrap();
    }

    #[test]
    fn invalid_satellite_fails_parent() {
        let mut sol: CelestialRecord = toml::from_str(EARTH).unwrap();
        sol.orbit = None;
        let mut moon: CelestialRecord = toml::from_str(EARTH).unwrap();
        moon.orbit.as_mut().unwrap().semimajor_axis = 0.0;
        moon.name = "Moon".into();
        sol.satellites.push(moon);
        match sol.validate(true) {
            Err(PhysicsError::InvalidConfiguration { record, .. }) => assert_eq!(record, "Moon"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn spacecraft_validation() {
        let doc = r#"
            name = "Probe"
            system = "Sol/Earth"
            position = [7.0e6, 0.0, 0.0]

            [[stages]]
            name = "Booster"
            detach-order = 0
            primary-engine = 0
            mass = { mass = 1000.0, inertia = [1.0, 1.0, 1.0, 0.0, 0.0, 0.0], min-mass = 100.0 }

            [[stages.engines]]
            name = "Main"
            mount = [0.0, 0.0, -1.0]
            force = [0.0, 0.0, 1.0e5]
        "#;
        let mut rec: SpacecraftRecord = toml::from_str(doc).unwrap();
        rec.validate().unwrap();
        assert_eq!(rec.orientation, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(rec.separation_delay, 1.0);
        assert_eq!(rec.stages[0].engines[0].state, EngineState::Disabled);

        rec.stages[0].primary_engine = Some(3);
        assert!(rec.validate().is_err());
        rec.stages[0].primary_engine = Some(0);
        rec.stages[0].engines[0].throttle = 1.5;
        assert!(rec.validate().is_err());
        rec.stages.clear();
        assert!(rec.validate().is_err());
    }
}
