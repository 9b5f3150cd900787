use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::{Context, Result};

use super::Sensor;
use crate::{
    config::{StreamConfig, ViewerConfig},
    error::{SensorError, SensorResult},
    pipeline::{
        drawing::DrawingSurface,
        projector::SkeletonProjector,
        sensor_stream::{FrameProcessor, SensorStream, start_sensor_stream},
        sink::ResultSink,
        skeleton::RenderStyle,
    },
    types::{DepthRange, PresenceStatus},
};

/// The currently attached sensor and the thread processing its frames.
///
/// Sensor changes are serialized: the old sensor's stream is stopped and its
/// streams disabled before the new one is configured and started, so at most
/// one producer ever writes to the shared drawing surface.
pub struct SensorSession {
    stream_config: StreamConfig,
    projector: SkeletonProjector,
    style: RenderStyle,
    surface: DrawingSurface,
    sink: Arc<dyn ResultSink>,
    current: RwLock<Option<Arc<dyn Sensor>>>,
    transition: Mutex<Option<SensorStream>>,
    // Held across a presence poll and across a sensor change.
    status_gate: Mutex<()>,
}

impl SensorSession {
    pub fn new(config: &ViewerConfig, style: RenderStyle, sink: Arc<dyn ResultSink>) -> Self {
        sink.present_status(PresenceStatus::Initializing);
        SensorSession {
            stream_config: config.stream.clone(),
            projector: SkeletonProjector::new(config.screen_width, config.screen_height),
            style,
            surface: DrawingSurface::new(),
            sink,
            current: RwLock::new(None),
            transition: Mutex::new(None),
            status_gate: Mutex::new(()),
        }
    }

    pub fn current_sensor(&self) -> Option<Arc<dyn Sensor>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs `f` against the attached sensor with sensor changes held off, so
    /// a status `f` publishes cannot land after a later attach or detach.
    pub fn with_current_sensor<R>(&self, f: impl FnOnce(Option<&dyn Sensor>) -> R) -> R {
        let _gate = self
            .status_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let sensor = self.current_sensor();
        f(sensor.as_deref())
    }

    pub fn surface(&self) -> &DrawingSurface {
        &self.surface
    }

    pub fn attach(&self, sensor: Arc<dyn Sensor>) -> Result<()> {
        self.change_sensor(Some(sensor))
    }

    pub fn detach(&self) -> Result<()> {
        self.change_sensor(None)
    }

    /// Hot-swap: tear down whatever is attached, then bring up `new`.
    pub fn change_sensor(&self, new: Option<Arc<dyn Sensor>>) -> Result<()> {
        let mut stream = self
            .transition
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let _gate = self
            .status_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let old = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = stream.take() {
            running.stop();
        }
        if let Some(old) = old {
            release_streams(old.as_ref());
            log::info!("{}: detached", old.name());
        }

        let Some(new) = new else {
            self.sink.present_status(PresenceStatus::NoSensor);
            return Ok(());
        };

        if let Err(err) = configure_streams(new.as_ref(), &self.stream_config) {
            self.sink.present_status(PresenceStatus::NoSensor);
            return Err(err).with_context(|| format!("failed to configure {}", new.name()));
        }

        let processor = FrameProcessor::new(
            new.clone(),
            self.stream_config.depth_format,
            self.stream_config.color_format,
            self.projector,
            self.style,
            self.surface.clone(),
            self.sink.clone(),
        );
        *stream = Some(start_sensor_stream(processor));
        log::info!("{}: attached", new.name());
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(new);
        self.sink.present_status(PresenceStatus::NoPersonDetected);
        Ok(())
    }
}

impl Drop for SensorSession {
    fn drop(&mut self) {
        if let Err(err) = self.detach() {
            log::warn!("failed to detach sensor on shutdown: {err:?}");
        }
    }
}

/// Enables all streams, preferring near range when configured. Returns the
/// range that actually took effect.
pub fn configure_streams(sensor: &dyn Sensor, config: &StreamConfig) -> SensorResult<DepthRange> {
    sensor.enable_streams(config)?;

    if config.depth_range == DepthRange::Default {
        sensor.set_depth_range(DepthRange::Default, false)?;
        return Ok(DepthRange::Default);
    }

    match sensor.set_depth_range(DepthRange::Near, config.near_range_tracking) {
        Ok(()) => Ok(DepthRange::Near),
        Err(SensorError::UnsupportedRange(range)) => {
            log::info!(
                "{}: {range:?} range rejected, falling back to default range",
                sensor.name()
            );
            sensor.set_depth_range(DepthRange::Default, false)?;
            Ok(DepthRange::Default)
        }
        Err(err) => {
            sensor.disable_streams();
            Err(err)
        }
    }
}

fn release_streams(sensor: &dyn Sensor) {
    if let Err(err) = sensor.set_depth_range(DepthRange::Default, false) {
        log::debug!("{}: could not reset depth range: {err}", sensor.name());
    }
    sensor.disable_streams();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::{drawing::DrawCommand, sink::ChannelSink},
        sensor::{
            SimulatedSensor,
            recording::{self, RecordingSensor},
            simulated::Scene,
        },
        types::SkeletonPoint,
    };
    use std::time::{Duration, Instant};

    fn session() -> (SensorSession, crate::pipeline::sink::Presentation) {
        let (sink, presentation) = ChannelSink::new();
        let session = SensorSession::new(
            &ViewerConfig::default(),
            RenderStyle::default(),
            Arc::new(sink),
        );
        (session, presentation)
    }

    #[test]
    fn near_range_is_used_when_supported() {
        let sensor = SimulatedSensor::new("near");
        let range = configure_streams(&sensor, &StreamConfig::default()).unwrap();
        assert_eq!(range, DepthRange::Near);
        assert!(sensor.near_range_tracking());
        sensor.disable_streams();
    }

    #[test]
    fn rejected_near_range_falls_back_to_default() {
        let sensor = SimulatedSensor::new("far").reject_near_range();
        let range = configure_streams(&sensor, &StreamConfig::default()).unwrap();
        assert_eq!(range, DepthRange::Default);
        assert_eq!(sensor.depth_range(), DepthRange::Default);
        assert!(!sensor.near_range_tracking());
        assert!(sensor.is_streaming());
        sensor.disable_streams();
    }

    #[test]
    fn attach_and_detach_publish_status() {
        let (session, presentation) = session();
        assert!(session.current_sensor().is_none());

        let sensor = Arc::new(SimulatedSensor::new("one"));
        session.attach(sensor.clone()).unwrap();
        assert!(sensor.is_streaming());
        assert_eq!(session.current_sensor().unwrap().name(), "one");

        session.detach().unwrap();
        assert!(!sensor.is_streaming());
        assert_eq!(sensor.depth_range(), DepthRange::Default);
        assert!(session.current_sensor().is_none());

        let statuses: Vec<_> = presentation.status_rx.try_iter().collect();
        assert_eq!(
            statuses,
            vec![
                PresenceStatus::Initializing,
                PresenceStatus::NoPersonDetected,
                PresenceStatus::NoSensor
            ]
        );
    }

    #[test]
    fn hot_swap_releases_old_sensor_before_configuring_new() {
        let (session, _presentation) = session();
        let journal = recording::journal();

        session
            .attach(Arc::new(RecordingSensor::new("first", journal.clone())))
            .unwrap();
        session
            .change_sensor(Some(Arc::new(RecordingSensor::new(
                "second",
                journal.clone(),
            ))))
            .unwrap();
        session.detach().unwrap();

        assert_eq!(
            recording::entries(&journal),
            vec![
                "enable first",
                "disable first",
                "enable second",
                "disable second"
            ]
        );
    }

    #[test]
    fn hot_swap_moves_drawing_to_new_sensor() {
        let (session, presentation) = session();
        let first = Arc::new(SimulatedSensor::new("first").with_frame_rate(100));
        let second = Arc::new(
            SimulatedSensor::new("second")
                .with_frame_rate(100)
                .with_scene(Scene::FullBody(SkeletonPoint::new(0.0, 0.0, 2.0))),
        );

        session.attach(first.clone()).unwrap();
        session.change_sensor(Some(second.clone())).unwrap();

        assert!(!first.is_streaming());
        assert!(second.is_streaming());
        assert_eq!(session.current_sensor().unwrap().name(), "second");

        // Only the second sensor's scene has bones in it.
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut saw_bones = false;
        while !saw_bones && Instant::now() < deadline {
            if let Ok(drawing) = presentation
                .skeleton_rx
                .recv_timeout(Duration::from_millis(100))
            {
                saw_bones = drawing
                    .iter()
                    .any(|command| matches!(command, DrawCommand::Line { .. }));
            }
        }
        assert!(saw_bones);
        assert!(session.surface().generation() >= 1);
    }
}
