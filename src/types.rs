use std::{ops::Index, time::Instant};

/// Maximum number of skeleton slots the sensor reports per frame.
pub const SKELETON_COUNT: usize = 6;

/// Bytes per pixel of a BGR32 buffer (B, G, R, unused).
pub const BGR32_BYTES_PER_PIXEL: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthImageFormat {
    #[allow(dead_code)]
    Resolution80x60Fps30,
    #[allow(dead_code)]
    Resolution320x240Fps30,
    Resolution640x480Fps30,
}

impl DepthImageFormat {
    pub fn width(&self) -> u32 {
        match self {
            DepthImageFormat::Resolution80x60Fps30 => 80,
            DepthImageFormat::Resolution320x240Fps30 => 320,
            DepthImageFormat::Resolution640x480Fps30 => 640,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            DepthImageFormat::Resolution80x60Fps30 => 60,
            DepthImageFormat::Resolution320x240Fps30 => 240,
            DepthImageFormat::Resolution640x480Fps30 => 480,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorImageFormat {
    RgbResolution640x480Fps30,
    #[allow(dead_code)]
    RgbResolution1280x960Fps12,
}

impl ColorImageFormat {
    pub fn width(&self) -> u32 {
        match self {
            ColorImageFormat::RgbResolution640x480Fps30 => 640,
            ColorImageFormat::RgbResolution1280x960Fps12 => 1280,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            ColorImageFormat::RgbResolution640x480Fps30 => 480,
            ColorImageFormat::RgbResolution1280x960Fps12 => 960,
        }
    }

    pub fn stride(&self) -> usize {
        self.width() as usize * BGR32_BYTES_PER_PIXEL
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthRange {
    Default,
    Near,
}

/// Depth values the stream uses to flag samples it could not measure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthSentinels {
    pub unknown: i32,
    pub too_near: i32,
    pub too_far: i32,
}

impl Default for DepthSentinels {
    fn default() -> Self {
        DepthSentinels {
            unknown: -1,
            too_near: 0,
            too_far: 4095,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DepthImagePixel {
    /// Distance in millimeters, or one of the frame's sentinels.
    pub depth: i32,
    /// Index of the body this pixel belongs to, 0 when none.
    pub source_index: u8,
}

#[derive(Clone, Debug)]
pub struct DepthFrame {
    pub format: DepthImageFormat,
    pub pixels: Vec<DepthImagePixel>,
    pub sentinels: DepthSentinels,
    pub frame_number: u64,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

/// A color frame straight from the sensor, BGR32 packed.
#[derive(Clone, Debug)]
pub struct ColorFrame {
    pub format: ColorImageFormat,
    pub bgr32: Vec<u8>,
    pub frame_number: u64,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

impl ColorFrame {
    pub fn width(&self) -> u32 {
        self.format.width()
    }

    pub fn height(&self) -> u32 {
        self.format.height()
    }
}

/// Colorized output buffer ready for bitmap construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bgr32Image {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub bytes: Vec<u8>,
}

impl Bgr32Image {
    pub fn new(width: u32, height: u32) -> Self {
        let stride = width as usize * BGR32_BYTES_PER_PIXEL;
        Bgr32Image {
            width,
            height,
            stride,
            bytes: vec![0u8; stride * height as usize],
        }
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y as usize * self.stride + x as usize * BGR32_BYTES_PER_PIXEL;
        self.bytes.get(idx..idx + BGR32_BYTES_PER_PIXEL)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColorImagePoint {
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DepthImagePoint {
    pub x: i32,
    pub y: i32,
    pub depth: i32,
}

/// A position in sensor space, meters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SkeletonPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SkeletonPoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        SkeletonPoint { x, y, z }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum JointType {
    HipCenter = 0,
    Spine = 1,
    ShoulderCenter = 2,
    Head = 3,
    ShoulderLeft = 4,
    ElbowLeft = 5,
    WristLeft = 6,
    HandLeft = 7,
    ShoulderRight = 8,
    ElbowRight = 9,
    WristRight = 10,
    HandRight = 11,
    HipLeft = 12,
    KneeLeft = 13,
    AnkleLeft = 14,
    FootLeft = 15,
    HipRight = 16,
    KneeRight = 17,
    AnkleRight = 18,
    FootRight = 19,
}

impl JointType {
    pub const COUNT: usize = 20;

    pub const ALL: [JointType; JointType::COUNT] = [
        JointType::HipCenter,
        JointType::Spine,
        JointType::ShoulderCenter,
        JointType::Head,
        JointType::ShoulderLeft,
        JointType::ElbowLeft,
        JointType::WristLeft,
        JointType::HandLeft,
        JointType::ShoulderRight,
        JointType::ElbowRight,
        JointType::WristRight,
        JointType::HandRight,
        JointType::HipLeft,
        JointType::KneeLeft,
        JointType::AnkleLeft,
        JointType::FootLeft,
        JointType::HipRight,
        JointType::KneeRight,
        JointType::AnkleRight,
        JointType::FootRight,
    ];
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JointTrackingState {
    #[default]
    NotTracked,
    Inferred,
    Tracked,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Joint {
    pub joint_type: JointType,
    pub position: SkeletonPoint,
    pub tracking_state: JointTrackingState,
}

/// All 20 joints of one skeleton, addressable by `JointType`.
#[derive(Clone, Debug, PartialEq)]
pub struct JointCollection([Joint; JointType::COUNT]);

impl JointCollection {
    pub fn new() -> Self {
        JointCollection(JointType::ALL.map(|joint_type| Joint {
            joint_type,
            position: SkeletonPoint::default(),
            tracking_state: JointTrackingState::NotTracked,
        }))
    }

    pub fn set(&mut self, joint_type: JointType, position: SkeletonPoint, state: JointTrackingState) {
        self.0[joint_type as usize] = Joint {
            joint_type,
            position,
            tracking_state: state,
        };
    }

    pub fn iter(&self) -> impl Iterator<Item = &Joint> {
        self.0.iter()
    }
}

impl Default for JointCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<JointType> for JointCollection {
    type Output = Joint;

    fn index(&self, joint_type: JointType) -> &Joint {
        &self.0[joint_type as usize]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SkeletonTrackingState {
    #[default]
    NotTracked,
    PositionOnly,
    Tracked,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Skeleton {
    pub tracking_id: u32,
    pub tracking_state: SkeletonTrackingState,
    pub position: SkeletonPoint,
    pub joints: JointCollection,
}

#[derive(Clone, Debug)]
pub struct SkeletonFrame {
    pub skeletons: Vec<Skeleton>,
    pub frame_number: u64,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

/// Which stream has a new frame waiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameReady {
    Depth,
    Color,
    Skeleton,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenceStatus {
    Initializing,
    NoSensor,
    NoPersonDetected,
    PersonPartiallyVisible,
    PersonFullyVisible,
}

impl PresenceStatus {
    pub fn display_text(&self) -> &'static str {
        match self {
            PresenceStatus::Initializing => "Initializing sensor...",
            PresenceStatus::NoSensor => "Sensor is not connected :(",
            PresenceStatus::NoPersonDetected => {
                "Sensor is running!!\nPlease stand/sit in front of the sensor :)"
            }
            PresenceStatus::PersonPartiallyVisible => {
                "Please stand right in front of the sensor :("
            }
            PresenceStatus::PersonFullyVisible => "You are detected :D",
        }
    }
}
