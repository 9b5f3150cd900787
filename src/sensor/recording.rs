use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, bounded};

use super::{CoordinateMapper, Sensor};
use crate::{
    config::StreamConfig,
    error::SensorResult,
    types::{
        ColorFrame, ColorImageFormat, ColorImagePoint, DepthFrame, DepthImageFormat,
        DepthImagePixel, DepthImagePoint, DepthRange, FrameReady, Skeleton, SkeletonFrame,
        SkeletonPoint,
    },
};

pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Writes `enable <name>` / `disable <name>` to a shared journal and hands out
/// a fixed skeleton frame, if it has one. Never fires frame events.
pub struct RecordingSensor {
    name: String,
    journal: Journal,
    skeletons: Option<Vec<Skeleton>>,
    skeleton_reads: AtomicUsize,
    _events_tx: Sender<FrameReady>,
    events_rx: Receiver<FrameReady>,
}

impl RecordingSensor {
    pub fn new(name: &str, journal: Journal) -> Self {
        let (events_tx, events_rx) = bounded(1);
        RecordingSensor {
            name: name.to_string(),
            journal,
            skeletons: None,
            skeleton_reads: AtomicUsize::new(0),
            _events_tx: events_tx,
            events_rx,
        }
    }

    pub fn with_skeletons(mut self, skeletons: Vec<Skeleton>) -> Self {
        self.skeletons = Some(skeletons);
        self
    }

    /// Skeleton frames actually handed out.
    pub fn skeleton_reads(&self) -> usize {
        self.skeleton_reads.load(Ordering::SeqCst)
    }

    fn record(&self, action: &str) {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("{action} {}", self.name));
    }
}

impl CoordinateMapper for RecordingSensor {
    fn map_depth_frame_to_color_frame(
        &self,
        _depth_format: DepthImageFormat,
        depth_pixels: &[DepthImagePixel],
        _color_format: ColorImageFormat,
    ) -> Vec<ColorImagePoint> {
        vec![ColorImagePoint::default(); depth_pixels.len()]
    }

    fn map_skeleton_point_to_depth_point(
        &self,
        _point: SkeletonPoint,
        _depth_format: DepthImageFormat,
    ) -> DepthImagePoint {
        DepthImagePoint::default()
    }
}

impl Sensor for RecordingSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn enable_streams(&self, _config: &StreamConfig) -> SensorResult<()> {
        self.record("enable");
        Ok(())
    }

    fn set_depth_range(&self, _range: DepthRange, _near_range_tracking: bool) -> SensorResult<()> {
        Ok(())
    }

    fn disable_streams(&self) {
        self.record("disable");
    }

    fn frame_events(&self) -> Receiver<FrameReady> {
        self.events_rx.clone()
    }

    fn open_depth_frame(&self) -> Option<DepthFrame> {
        None
    }

    fn open_color_frame(&self) -> Option<ColorFrame> {
        None
    }

    fn open_skeleton_frame(&self, _timeout: Duration) -> Option<SkeletonFrame> {
        let skeletons = self.skeletons.clone()?;
        let frame_number = self.skeleton_reads.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        Some(SkeletonFrame {
            skeletons,
            frame_number,
            timestamp: Instant::now(),
        })
    }
}
