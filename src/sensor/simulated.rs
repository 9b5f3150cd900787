use std::{
    sync::{Mutex, PoisonError},
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, bounded, select, tick};

use super::{CoordinateMapper, Sensor};
use crate::{
    config::StreamConfig,
    error::{SensorError, SensorResult},
    types::{
        BGR32_BYTES_PER_PIXEL, ColorFrame, ColorImageFormat, ColorImagePoint, DepthFrame,
        DepthImageFormat, DepthImagePixel, DepthImagePoint, DepthRange, DepthSentinels,
        FrameReady, JointCollection, JointTrackingState, JointType, SKELETON_COUNT, Skeleton,
        SkeletonFrame, SkeletonPoint, SkeletonTrackingState,
    },
};

const DEFAULT_FRAME_RATE: u64 = 30;
const FRAME_EVENT_CAPACITY: usize = 8;
// Focal length in pixels at 320x240, scaled with the depth resolution.
const DEPTH_FOCAL_LENGTH_320: f32 = 285.63;
const UNKNOWN_BORDER_PX: u32 = 8;
const TOO_FAR_BORDER_PX: u32 = 4;
const FLOOR_BASE_MM: i32 = 1_200;

/// Joint offsets from the hip center, meters.
const BODY_LAYOUT: [(JointType, f32, f32); JointType::COUNT] = [
    (JointType::HipCenter, 0.0, 0.0),
    (JointType::Spine, 0.0, 0.3),
    (JointType::ShoulderCenter, 0.0, 0.55),
    (JointType::Head, 0.0, 0.75),
    (JointType::ShoulderLeft, -0.2, 0.5),
    (JointType::ElbowLeft, -0.35, 0.3),
    (JointType::WristLeft, -0.4, 0.1),
    (JointType::HandLeft, -0.42, 0.02),
    (JointType::ShoulderRight, 0.2, 0.5),
    (JointType::ElbowRight, 0.35, 0.3),
    (JointType::WristRight, 0.4, 0.1),
    (JointType::HandRight, 0.42, 0.02),
    (JointType::HipLeft, -0.1, -0.05),
    (JointType::KneeLeft, -0.12, -0.45),
    (JointType::AnkleLeft, -0.12, -0.85),
    (JointType::FootLeft, -0.12, -0.92),
    (JointType::HipRight, 0.1, -0.05),
    (JointType::KneeRight, 0.12, -0.45),
    (JointType::AnkleRight, 0.12, -0.85),
    (JointType::FootRight, 0.12, -0.92),
];

/// What the simulated sensor sees in front of it.
#[derive(Clone, Debug)]
pub enum Scene {
    Empty,
    /// One person, every joint tracked, swaying left and right.
    FullBody(SkeletonPoint),
    /// One person half out of view: right side lost, legs inferred.
    PartialBody(SkeletonPoint),
    /// Someone detected but not yet skeletonized.
    PositionOnly(SkeletonPoint),
}

#[derive(Debug)]
struct SimState {
    config: Option<StreamConfig>,
    depth_range: DepthRange,
    near_range_tracking: bool,
    frame_number: u64,
    scene: Scene,
}

#[derive(Debug)]
struct FrameClock {
    stop_tx: Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FrameClock {
    fn stop(mut self) {
        drop(self.stop_tx);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Software stand-in for a depth camera.
///
/// Frames are synthesized on demand from the current `Scene`; a clock thread
/// emits frame-ready events at the configured rate while streams are enabled.
#[derive(Debug)]
pub struct SimulatedSensor {
    name: String,
    supports_near_range: bool,
    registration_offset: (i32, i32),
    frame_interval: Duration,
    state: Mutex<SimState>,
    events_tx: Sender<FrameReady>,
    events_rx: Receiver<FrameReady>,
    clock: Mutex<Option<FrameClock>>,
}

impl SimulatedSensor {
    pub fn new(name: impl Into<String>) -> Self {
        let (events_tx, events_rx) = bounded(FRAME_EVENT_CAPACITY);
        SimulatedSensor {
            name: name.into(),
            supports_near_range: true,
            registration_offset: (0, 0),
            frame_interval: Duration::from_millis(1_000 / DEFAULT_FRAME_RATE),
            state: Mutex::new(SimState {
                config: None,
                depth_range: DepthRange::Default,
                near_range_tracking: false,
                frame_number: 0,
                scene: Scene::Empty,
            }),
            events_tx,
            events_rx,
            clock: Mutex::new(None),
        }
    }

    /// Behave like hardware that refuses near mode.
    #[cfg(test)]
    pub fn reject_near_range(mut self) -> Self {
        self.supports_near_range = false;
        self
    }

    /// Shift between the depth and color cameras, in color pixels.
    #[cfg(test)]
    pub fn with_registration_offset(mut self, dx: i32, dy: i32) -> Self {
        self.registration_offset = (dx, dy);
        self
    }

    #[cfg(test)]
    pub fn with_frame_rate(mut self, fps: u64) -> Self {
        self.frame_interval = Duration::from_millis(1_000 / fps.max(1));
        self
    }

    #[cfg(test)]
    pub fn with_scene(self, scene: Scene) -> Self {
        self.set_scene(scene);
        self
    }

    pub fn set_scene(&self, scene: Scene) {
        self.lock_state().scene = scene;
    }

    #[cfg(test)]
    pub fn depth_range(&self) -> DepthRange {
        self.lock_state().depth_range
    }

    #[cfg(test)]
    pub fn near_range_tracking(&self) -> bool {
        self.lock_state().near_range_tracking
    }

    #[cfg(test)]
    pub fn is_streaming(&self) -> bool {
        self.lock_state().config.is_some()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_clock(&self) {
        let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        if clock.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let events_tx = self.events_tx.clone();
        let ticker = tick(self.frame_interval);
        let handle = thread::spawn(move || {
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        for event in [FrameReady::Depth, FrameReady::Color, FrameReady::Skeleton] {
                            // Drop events nobody is keeping up with.
                            let _ = events_tx.try_send(event);
                        }
                    }
                }
            }
        });

        *clock = Some(FrameClock {
            stop_tx,
            handle: Some(handle),
        });
    }

    fn stop_clock(&self) {
        let clock = self
            .clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(clock) = clock {
            clock.stop();
        }
        while self.events_rx.try_recv().is_ok() {}
    }

    fn next_frame_number(state: &mut SimState) -> u64 {
        state.frame_number += 1;
        state.frame_number
    }

    fn sway(frame_number: u64, center: SkeletonPoint) -> SkeletonPoint {
        let phase = frame_number as f32 * 0.05;
        SkeletonPoint::new(center.x + 0.3 * phase.sin(), center.y, center.z)
    }

    fn scene_skeletons(scene: &Scene, frame_number: u64) -> Vec<Skeleton> {
        let mut skeletons = match scene {
            Scene::Empty => Vec::new(),
            Scene::FullBody(center) => {
                vec![build_body(1, Self::sway(frame_number, *center), false)]
            }
            Scene::PartialBody(center) => {
                vec![build_body(1, Self::sway(frame_number, *center), true)]
            }
            Scene::PositionOnly(center) => vec![Skeleton {
                tracking_id: 1,
                tracking_state: SkeletonTrackingState::PositionOnly,
                position: *center,
                joints: JointCollection::new(),
            }],
        };
        skeletons.resize_with(SKELETON_COUNT, Skeleton::default);
        skeletons
    }
}

fn build_body(tracking_id: u32, center: SkeletonPoint, partial: bool) -> Skeleton {
    let mut joints = JointCollection::new();
    for (joint_type, dx, dy) in BODY_LAYOUT {
        let state = if partial {
            partial_joint_state(joint_type)
        } else {
            JointTrackingState::Tracked
        };
        joints.set(
            joint_type,
            SkeletonPoint::new(center.x + dx, center.y + dy, center.z),
            state,
        );
    }

    Skeleton {
        tracking_id,
        tracking_state: SkeletonTrackingState::Tracked,
        position: center,
        joints,
    }
}

fn partial_joint_state(joint_type: JointType) -> JointTrackingState {
    match joint_type {
        JointType::ShoulderRight
        | JointType::ElbowRight
        | JointType::WristRight
        | JointType::HandRight => JointTrackingState::NotTracked,
        JointType::ShoulderLeft
        | JointType::KneeLeft
        | JointType::AnkleLeft
        | JointType::FootLeft
        | JointType::KneeRight
        | JointType::AnkleRight
        | JointType::FootRight => JointTrackingState::Inferred,
        _ => JointTrackingState::Tracked,
    }
}

impl CoordinateMapper for SimulatedSensor {
    fn map_depth_frame_to_color_frame(
        &self,
        depth_format: DepthImageFormat,
        depth_pixels: &[DepthImagePixel],
        color_format: ColorImageFormat,
    ) -> Vec<ColorImagePoint> {
        let dw = depth_format.width() as i64;
        let dh = depth_format.height() as i64;
        let cw = color_format.width() as i64;
        let ch = color_format.height() as i64;
        let (ox, oy) = self.registration_offset;

        (0..depth_pixels.len() as i64)
            .map(|i| {
                let x = i % dw;
                let y = i / dw;
                ColorImagePoint {
                    x: (x * cw / dw) as i32 + ox,
                    y: (y * ch / dh) as i32 + oy,
                }
            })
            .collect()
    }

    fn map_skeleton_point_to_depth_point(
        &self,
        point: SkeletonPoint,
        depth_format: DepthImageFormat,
    ) -> DepthImagePoint {
        if point.z <= f32::EPSILON {
            return DepthImagePoint::default();
        }

        let width = depth_format.width() as f32;
        let height = depth_format.height() as f32;
        let focal = DEPTH_FOCAL_LENGTH_320 * width / 320.0;
        DepthImagePoint {
            x: (width / 2.0 + focal * point.x / point.z).round() as i32,
            y: (height / 2.0 - focal * point.y / point.z).round() as i32,
            depth: (point.z * 1_000.0) as i32,
        }
    }
}

impl Sensor for SimulatedSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn enable_streams(&self, config: &StreamConfig) -> SensorResult<()> {
        {
            let mut state = self.lock_state();
            state.config = Some(config.clone());
        }
        self.start_clock();
        log::debug!(
            "{}: streams enabled ({:?}, {:?}, {:?} tracking, elevation {}, {:?})",
            self.name,
            config.depth_format,
            config.color_format,
            config.tracking_mode,
            config.elevation_angle,
            config.smoothing
        );
        Ok(())
    }

    fn set_depth_range(&self, range: DepthRange, near_range_tracking: bool) -> SensorResult<()> {
        let mut state = self.lock_state();
        if state.config.is_none() {
            return Err(SensorError::StreamNotEnabled("depth"));
        }
        if range == DepthRange::Near && !self.supports_near_range {
            return Err(SensorError::UnsupportedRange(range));
        }
        state.depth_range = range;
        state.near_range_tracking = near_range_tracking;
        Ok(())
    }

    fn disable_streams(&self) {
        self.stop_clock();
        let mut state = self.lock_state();
        state.config = None;
        log::debug!("{}: streams disabled", self.name);
    }

    fn frame_events(&self) -> Receiver<FrameReady> {
        self.events_rx.clone()
    }

    fn open_depth_frame(&self) -> Option<DepthFrame> {
        let mut state = self.lock_state();
        let format = state.config.as_ref()?.depth_format;
        let frame_number = Self::next_frame_number(&mut state);
        let sentinels = DepthSentinels::default();

        let silhouette = match &state.scene {
            Scene::FullBody(center) | Scene::PartialBody(center) => {
                let center = Self::sway(frame_number, *center);
                Some((self.map_skeleton_point_to_depth_point(center, format), center.z))
            }
            _ => None,
        };

        let (width, height) = (format.width(), format.height());
        let mut pixels = Vec::with_capacity(format.pixel_count());
        for y in 0..height {
            for x in 0..width {
                pixels.push(synth_depth_pixel(x, y, width, height, &sentinels, silhouette));
            }
        }

        Some(DepthFrame {
            format,
            pixels,
            sentinels,
            frame_number,
            timestamp: Instant::now(),
        })
    }

    fn open_color_frame(&self) -> Option<ColorFrame> {
        let mut state = self.lock_state();
        let format = state.config.as_ref()?.color_format;
        let frame_number = Self::next_frame_number(&mut state);
        let (width, height) = (format.width(), format.height());

        let mut bgr32 = vec![0u8; format.stride() * height as usize];
        for (i, px) in bgr32.chunks_exact_mut(BGR32_BYTES_PER_PIXEL).enumerate() {
            let x = (i as u32 % width) as u64;
            let y = (i as u32 / width) as u64;
            px[0] = ((x + frame_number) % 256) as u8;
            px[1] = (y % 256) as u8;
            px[2] = ((x + y) % 256) as u8;
            px[3] = 255;
        }

        Some(ColorFrame {
            format,
            bgr32,
            frame_number,
            timestamp: Instant::now(),
        })
    }

    // Frames are synthesized on demand, so there is never anything to wait for.
    fn open_skeleton_frame(&self, _timeout: Duration) -> Option<SkeletonFrame> {
        let mut state = self.lock_state();
        state.config.as_ref()?;
        let frame_number = Self::next_frame_number(&mut state);
        let skeletons = Self::scene_skeletons(&state.scene, frame_number);

        Some(SkeletonFrame {
            skeletons,
            frame_number,
            timestamp: Instant::now(),
        })
    }
}

impl Drop for SimulatedSensor {
    fn drop(&mut self) {
        self.stop_clock();
    }
}

fn synth_depth_pixel(
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    sentinels: &DepthSentinels,
    silhouette: Option<(DepthImagePoint, f32)>,
) -> DepthImagePixel {
    let (depth, source_index) = if x < UNKNOWN_BORDER_PX {
        (sentinels.unknown, 0)
    } else if y < TOO_FAR_BORDER_PX {
        (sentinels.too_far, 0)
    } else if y >= height - TOO_FAR_BORDER_PX && x >= width - width / 8 {
        (sentinels.too_near, 0)
    } else {
        match silhouette {
            Some((center, z)) if inside_silhouette(x, y, &center, width) => {
                ((z * 1_000.0) as i32, 1)
            }
            _ => (FLOOR_BASE_MM + y as i32 * 4, 0),
        }
    };

    DepthImagePixel {
        depth,
        source_index,
    }
}

fn inside_silhouette(x: u32, y: u32, center: &DepthImagePoint, width: u32) -> bool {
    let rx = (width / 10).max(1) as i64;
    let ry = rx * 3;
    let dx = x as i64 - center.x as i64;
    let dy = y as i64 - center.y as i64;
    dx * dx * ry * ry + dy * dy * rx * rx <= rx * rx * ry * ry
}
