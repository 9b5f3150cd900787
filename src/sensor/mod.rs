#[cfg(test)]
pub mod recording;
pub mod session;
pub mod simulated;

use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::{
    config::StreamConfig,
    error::SensorResult,
    types::{
        ColorFrame, ColorImageFormat, ColorImagePoint, DepthFrame, DepthImageFormat,
        DepthImagePixel, DepthImagePoint, DepthRange, FrameReady, SkeletonFrame, SkeletonPoint,
    },
};

pub use session::SensorSession;
pub use simulated::SimulatedSensor;

/// Calibration-aware projections between the sensor's coordinate spaces.
pub trait CoordinateMapper {
    fn map_depth_frame_to_color_frame(
        &self,
        depth_format: DepthImageFormat,
        depth_pixels: &[DepthImagePixel],
        color_format: ColorImageFormat,
    ) -> Vec<ColorImagePoint>;

    fn map_skeleton_point_to_depth_point(
        &self,
        point: SkeletonPoint,
        depth_format: DepthImageFormat,
    ) -> DepthImagePoint;
}

/// A depth camera as seen by the pipeline.
///
/// Every `open_*` call hands out an owned frame or `None` when nothing new is
/// available; callers treat `None` as a skipped frame.
pub trait Sensor: CoordinateMapper + Send + Sync + 'static {
    fn name(&self) -> &str;

    fn enable_streams(&self, config: &StreamConfig) -> SensorResult<()>;

    /// Fails with `SensorError::UnsupportedRange` when the device refuses the range.
    fn set_depth_range(&self, range: DepthRange, near_range_tracking: bool) -> SensorResult<()>;

    fn disable_streams(&self);

    /// Fires once per arriving frame on any enabled stream.
    fn frame_events(&self) -> Receiver<FrameReady>;

    fn open_depth_frame(&self) -> Option<DepthFrame>;

    fn open_color_frame(&self) -> Option<ColorFrame>;

    /// Waits up to `timeout` for the most recent skeleton frame.
    fn open_skeleton_frame(&self, timeout: Duration) -> Option<SkeletonFrame>;
}
