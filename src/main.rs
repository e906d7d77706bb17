#![warn(clippy::unwrap_used, clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::too_many_lines,
    clippy::similar_names,
    clippy::doc_markdown
)]
use std::{env, fs, path::PathBuf};

use color_eyre::eyre::{self, WrapErr};
use orbsim::{
    config::{CelestialRecord, SpacecraftRecord},
    integrator::Integrator,
    loader::{self, LoadOptions},
    lwc::LargeWorldCoord,
    math::Quat,
    render::{DrawableId, LightId, RenderSink, SceneId},
    sim::{Command, Simulation},
    time::SimClock,
};
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, error, info, trace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_SCENARIO: &str = "demos/sol.toml";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct Scenario {
    run: RunRecord,
    system: CelestialRecord,
    #[serde(default)]
    spacecraft: Vec<SpacecraftRecord>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct RunRecord {
    /// Step length in seconds.
    dt: f64,
    steps: u64,
    /// Defaults to J2000.
    #[serde(default, with = "time::serde::rfc3339::option")]
    epoch: Option<OffsetDateTime>,
    #[serde(default)]
    integrator: Integrator,
    /// Throttle set on every spacecraft's active stage before the first step.
    #[serde(default)]
    throttle: Option<f64>,
    /// Steps at which every spacecraft is told to drop its active stage.
    #[serde(default)]
    detach_at: Vec<u64>,
    /// Log a summary every this many steps.
    #[serde(default = "default_report_every")]
    report_every: u64,
}

fn default_report_every() -> u64 {
    100
}

/// Logs what a renderer would be told.
#[derive(Default)]
struct TraceSink {
    frames: u64,
}

impl RenderSink for TraceSink {
    fn begin_frame(&mut self, scene: Option<SceneId>) {
        self.frames += 1;
        trace!(frame = self.frames, ?scene, "begin frame");
    }

    fn update_drawable(&mut self, id: DrawableId, position: &LargeWorldCoord, orientation: &Quat) {
        trace!(?id, ?position, ?orientation, "drawable");
    }

    fn update_light(&mut self, id: LightId, position: &LargeWorldCoord) {
        trace!(?id, ?position, "light");
    }
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let path = env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_SCENARIO), PathBuf::from);
    let doc = fs::read_to_string(&path)
        .wrap_err_with(|| format!("could not read scenario {}", path.display()))?;
    let scenario: Scenario = toml::from_str(&doc).wrap_err("could not parse scenario")?;
    let run = &scenario.run;

    let opts = LoadOptions {
        integrator: run.integrator,
        ..LoadOptions::default()
    };
    let world = loader::load_world(&scenario.system.name, &scenario.system, &opts)?;
    let clock = run.epoch.map_or_else(SimClock::j2000, SimClock::new);
    let mut sim = Simulation::new(world, clock);

    let mut craft = Vec::with_capacity(scenario.spacecraft.len());
    for rec in &scenario.spacecraft {
        craft.push(sim.load_spacecraft(rec)?);
    }

    let commands = sim.commands();
    if let Some(throttle) = run.throttle {
        for &spacecraft in &craft {
            commands.push(Command::SetThrottle {
                spacecraft,
                throttle,
            });
        }
    }

    info!(
        path = %path.display(),
        dt = run.dt,
        steps = run.steps,
        epoch = %sim.clock.now(),
        "starting run"
    );

    let mut sink = TraceSink::default();
    for step in 0..run.steps {
        if run.detach_at.contains(&step) {
            for &spacecraft in &craft {
                commands.push(Command::Detach { spacecraft });
            }
        }

        let report = sim.step(run.dt, &mut sink);
        for e in &report.errors {
            error!(step, error = %e, "step error");
        }
        if report.detached > 0 || report.migrations > 0 {
            debug!(step, detached = report.detached, migrations = report.migrations, "step");
        }

        if run.report_every > 0 && (step + 1) % run.report_every == 0 {
            for &id in &craft {
                let sc = sim.spacecraft(id)?;
                let path = sim.world.path_of(sc.body.system)?;
                let body = sim.world.body(sc.body)?;
                info!(
                    time = %sim.clock.elapsed,
                    spacecraft = %sc.name,
                    system = %path,
                    mass = sc.total_mass(),
                    altitude = body.rigid.position.norm(),
                    speed = body.rigid.velocity.norm(),
                    "status"
                );
            }
        }
    }

    info!(frames = sink.frames, time = %sim.clock.elapsed, now = %sim.clock.now(), "run finished");
    Ok(())
}
