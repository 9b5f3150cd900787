use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::types::{ColorImageFormat, DepthImageFormat, DepthRange};

pub const SCREEN_WIDTH: f32 = 640.0;
pub const SCREEN_HEIGHT: f32 = 480.0;
pub const PRESENCE_TIMER_PERIOD: Duration = Duration::from_millis(500);
pub const SKELETON_FRAME_WAIT: Duration = Duration::from_millis(50);
const DEFAULT_RUN_DURATION: Duration = Duration::from_secs(5);
const DEFAULT_ELEVATION_ANGLE: i32 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkeletonTrackingMode {
    #[allow(dead_code)]
    Default,
    Seated,
}

/// Filter parameters the sensor applies to joint positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformSmoothParameters {
    pub smoothing: f32,
    pub correction: f32,
    pub prediction: f32,
    pub jitter_radius: f32,
    pub max_deviation_radius: f32,
}

impl Default for TransformSmoothParameters {
    fn default() -> Self {
        TransformSmoothParameters {
            smoothing: 0.5,
            correction: 0.5,
            prediction: 0.5,
            jitter_radius: 0.05,
            max_deviation_radius: 0.04,
        }
    }
}

/// What gets enabled on a sensor when it is attached.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamConfig {
    pub depth_format: DepthImageFormat,
    pub color_format: ColorImageFormat,
    pub depth_range: DepthRange,
    pub near_range_tracking: bool,
    pub tracking_mode: SkeletonTrackingMode,
    pub smoothing: TransformSmoothParameters,
    pub elevation_angle: i32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            depth_format: DepthImageFormat::Resolution640x480Fps30,
            color_format: ColorImageFormat::RgbResolution640x480Fps30,
            depth_range: DepthRange::Near,
            near_range_tracking: true,
            tracking_mode: SkeletonTrackingMode::Seated,
            smoothing: TransformSmoothParameters::default(),
            elevation_angle: DEFAULT_ELEVATION_ANGLE,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub stream: StreamConfig,
    pub screen_width: f32,
    pub screen_height: f32,
    pub presence_period: Duration,
    pub skeleton_wait: Duration,
    pub run_duration: Duration,
    /// Where the presenter writes its last images on shutdown, if anywhere.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        ViewerConfig {
            stream: StreamConfig::default(),
            screen_width: SCREEN_WIDTH,
            screen_height: SCREEN_HEIGHT,
            presence_period: PRESENCE_TIMER_PERIOD,
            skeleton_wait: SKELETON_FRAME_WAIT,
            run_duration: DEFAULT_RUN_DURATION,
            snapshot_dir: None,
        }
    }
}

impl ViewerConfig {
    /// Defaults, overridden by any `DSV_*` variables that parse.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ViewerConfig::default();

        if let Some(ms) = parse_var::<u64, _>(&lookup, "DSV_PRESENCE_PERIOD_MS") {
            config.presence_period = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "DSV_SKELETON_WAIT_MS") {
            config.skeleton_wait = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "DSV_RUN_SECS") {
            config.run_duration = Duration::from_secs(secs);
        }
        if let Some(angle) = parse_var::<i32, _>(&lookup, "DSV_ELEVATION_ANGLE") {
            config.stream.elevation_angle = angle.clamp(-27, 27);
        }
        if let Some(near) = parse_var::<bool, _>(&lookup, "DSV_NEAR_RANGE") {
            config.stream.depth_range = if near {
                DepthRange::Near
            } else {
                DepthRange::Default
            };
            config.stream.near_range_tracking = near;
        }

        if let Some(dir) = lookup("DSV_SNAPSHOT_DIR").filter(|dir| !dir.trim().is_empty()) {
            config.snapshot_dir = Some(PathBuf::from(dir));
        }

        config
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring {key}={raw:?}: not a valid value");
            None
        }
    }
}
