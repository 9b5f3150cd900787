use crate::{
    sensor::CoordinateMapper,
    types::{DepthImageFormat, SkeletonPoint},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

/// Maps sensor-space joints onto a fixed-size overlay.
#[derive(Clone, Copy, Debug)]
pub struct SkeletonProjector {
    width: f32,
    height: f32,
}

impl SkeletonProjector {
    pub fn new(width: f32, height: f32) -> Self {
        SkeletonProjector {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn bounds(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Joints near the edge of the field of view can project outside the
    /// depth image; they are pinned to the border instead of dropped.
    pub fn project<M>(
        &self,
        mapper: &M,
        position: SkeletonPoint,
        depth_format: DepthImageFormat,
    ) -> ScreenPoint
    where
        M: CoordinateMapper + ?Sized,
    {
        let point = mapper.map_skeleton_point_to_depth_point(position, depth_format);
        self.clamp(point.x as f32, point.y as f32)
    }

    pub fn clamp(&self, x: f32, y: f32) -> ScreenPoint {
        ScreenPoint {
            x: ensure_range(x, 0.0, self.width),
            y: ensure_range(y, 0.0, self.height),
        }
    }
}

/// `min(max(value, min), max)`; NaN collapses to `min`.
pub fn ensure_range(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}
