//! The boundary to the rendering collaborator.
//!
//! The physics core never owns anything drawable. Bodies and systems
//! carry optional ids, and every step pushes absolute positions and
//! orientations for those ids into a [`RenderSink`]. A sink must not
//! mutate physics state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{lwc::LargeWorldCoord, math::Quat};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct DrawableId(pub u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct LightId(pub u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SceneId(pub u64);

pub trait RenderSink {
    fn begin_frame(&mut self, scene: Option<SceneId>);

    fn update_drawable(&mut self, id: DrawableId, position: &LargeWorldCoord, orientation: &Quat);

    fn update_light(&mut self, _id: LightId, _position: &LargeWorldCoord) {}
}

/// Discards everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn begin_frame(&mut self, _scene: Option<SceneId>) {}

    fn update_drawable(&mut self, _id: DrawableId, _position: &LargeWorldCoord, _orientation: &Quat) {}
}

/// Keeps the latest update per id.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    pub frames: u64,
    pub drawables: HashMap<DrawableId, (LargeWorldCoord, Quat)>,
    pub lights: HashMap<LightId, LargeWorldCoord>,
}

impl RenderSink for RecordingSink {
    fn begin_frame(&mut self, _scene: Option<SceneId>) {
        self.frames += 1;
    }

    fn update_drawable(&mut self, id: DrawableId, position: &LargeWorldCoord, orientation: &Quat) {
        self.drawables.insert(id, (*position, *orientation));
    }

    fn update_light(&mut self, id: LightId, position: &LargeWorldCoord) {
        self.lights.insert(id, *position);
    }
}
