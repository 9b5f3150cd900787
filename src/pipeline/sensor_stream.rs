use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossbeam_channel::RecvTimeoutError;

use super::{
    depth::map_depth_to_color,
    drawing::DrawingSurface,
    projector::SkeletonProjector,
    sink::ResultSink,
    skeleton::{RenderStyle, SkeletonRenderer},
};
use crate::{
    sensor::Sensor,
    types::{ColorImageFormat, DepthImageFormat, FrameReady},
};

// How long the stream thread waits for an event before rechecking the stop flag.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Turns one sensor's frame-ready events into presented results.
pub struct FrameProcessor {
    sensor: Arc<dyn Sensor>,
    depth_format: DepthImageFormat,
    color_format: ColorImageFormat,
    projector: SkeletonProjector,
    style: RenderStyle,
    surface: DrawingSurface,
    sink: Arc<dyn ResultSink>,
}

impl FrameProcessor {
    pub fn new(
        sensor: Arc<dyn Sensor>,
        depth_format: DepthImageFormat,
        color_format: ColorImageFormat,
        projector: SkeletonProjector,
        style: RenderStyle,
        surface: DrawingSurface,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        FrameProcessor {
            sensor,
            depth_format,
            color_format,
            projector,
            style,
            surface,
            sink,
        }
    }

    pub fn handle(&self, event: FrameReady) -> Result<()> {
        match event {
            FrameReady::Depth => self.process_depth(),
            FrameReady::Color => self.process_color(),
            FrameReady::Skeleton => self.process_skeleton(),
        }
    }

    fn process_depth(&self) -> Result<()> {
        let Some(frame) = self.sensor.open_depth_frame() else {
            log::trace!("depth frame not ready");
            return Ok(());
        };

        let color_points = self.sensor.map_depth_frame_to_color_frame(
            frame.format,
            &frame.pixels,
            self.color_format,
        );
        let image = map_depth_to_color(&frame, &color_points, self.color_format)
            .with_context(|| format!("failed to colorize depth frame {}", frame.frame_number))?;
        self.sink.present_depth(image);
        Ok(())
    }

    fn process_color(&self) -> Result<()> {
        let Some(frame) = self.sensor.open_color_frame() else {
            log::trace!("color frame not ready");
            return Ok(());
        };
        self.sink.present_color(frame);
        Ok(())
    }

    fn process_skeleton(&self) -> Result<()> {
        let Some(frame) = self.sensor.open_skeleton_frame(Duration::ZERO) else {
            log::trace!("skeleton frame not ready");
            return Ok(());
        };

        let renderer = SkeletonRenderer::new(
            self.sensor.as_ref(),
            self.projector,
            self.depth_format,
            &self.style,
        );
        let mut ctx = self.surface.open();
        renderer.draw_frame(&mut ctx, &frame);
        let drawing = ctx.commit();
        log::trace!(
            "skeleton frame {}: {} draw commands",
            frame.frame_number,
            drawing.len()
        );
        self.sink.present_skeletons(drawing);
        Ok(())
    }
}

#[derive(Debug)]
pub struct SensorStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SensorStream {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SensorStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn start_sensor_stream(processor: FrameProcessor) -> SensorStream {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let events = processor.sensor.frame_events();
    let name = processor.sensor.name().to_string();

    let handle = thread::spawn(move || {
        log::info!("{name}: frame processing started");

        while !stop_flag.load(Ordering::Relaxed) {
            let event = match events.recv_timeout(EVENT_POLL_INTERVAL) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("{name}: frame events disconnected");
                    break;
                }
            };

            let started = Instant::now();
            // A failed frame is dropped; the next one starts clean.
            if let Err(err) = processor.handle(event) {
                log::warn!(
                    "{name}: {event:?} frame failed (after {:?}): {err:?}",
                    started.elapsed()
                );
            }
        }

        log::info!("{name}: frame processing stopped");
    });

    SensorStream {
        stop,
        handle: Some(handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::StreamConfig,
        pipeline::{
            drawing::DrawCommand,
            projector::ScreenPoint,
            sink::{ChannelSink, Presentation},
        },
        sensor::{SimulatedSensor, simulated::Scene},
        types::SkeletonPoint,
    };

    fn processor_for(
        sensor: Arc<SimulatedSensor>,
    ) -> (FrameProcessor, Presentation, DrawingSurface) {
        let (sink, presentation) = ChannelSink::new();
        let surface = DrawingSurface::new();
        let config = StreamConfig::default();
        let processor = FrameProcessor::new(
            sensor,
            config.depth_format,
            config.color_format,
            SkeletonProjector::new(640.0, 480.0),
            RenderStyle::default(),
            surface.clone(),
            Arc::new(sink),
        );
        (processor, presentation, surface)
    }

    #[test]
    fn events_without_frames_are_skipped() {
        let sensor = Arc::new(SimulatedSensor::new("sim"));
        let (processor, presentation, surface) = processor_for(sensor);

        for event in [FrameReady::Depth, FrameReady::Color, FrameReady::Skeleton] {
            processor.handle(event).unwrap();
        }
        assert!(presentation.depth_rx.try_recv().is_err());
        assert!(presentation.color_rx.try_recv().is_err());
        assert!(presentation.skeleton_rx.try_recv().is_err());
        assert_eq!(surface.generation(), 0);
    }

    #[test]
    fn each_stream_reaches_the_sink() {
        let scene = Scene::FullBody(SkeletonPoint::new(0.0, 0.0, 2.0));
        let sensor = Arc::new(SimulatedSensor::new("sim").with_scene(scene));
        sensor.enable_streams(&StreamConfig::default()).unwrap();
        let (processor, presentation, surface) = processor_for(sensor.clone());

        processor.handle(FrameReady::Depth).unwrap();
        let depth = presentation.depth_rx.try_recv().unwrap();
        assert_eq!((depth.width, depth.height), (640, 480));
        // Left border columns are unknown depth.
        assert_eq!(depth.pixel(0, 100).unwrap(), &[66, 66, 33, 0xFF]);

        processor.handle(FrameReady::Color).unwrap();
        let color = presentation.color_rx.try_recv().unwrap();
        assert_eq!(color.bgr32.len(), 640 * 480 * 4);

        processor.handle(FrameReady::Skeleton).unwrap();
        let drawing = presentation.skeleton_rx.try_recv().unwrap();
        assert!(matches!(drawing[0], DrawCommand::Rectangle { .. }));
        assert!(drawing.len() > 1);
        assert_eq!(surface.generation(), 1);
        assert_eq!(surface.snapshot().len(), drawing.len());

        sensor.disable_streams();
    }

    #[test]
    fn position_only_scene_draws_body_center() {
        let scene = Scene::PositionOnly(SkeletonPoint::new(0.0, 0.0, 2.0));
        let sensor = Arc::new(SimulatedSensor::new("sim").with_scene(scene));
        sensor.enable_streams(&StreamConfig::default()).unwrap();
        let (processor, presentation, _surface) = processor_for(sensor.clone());

        processor.handle(FrameReady::Skeleton).unwrap();
        let drawing = presentation.skeleton_rx.try_recv().unwrap();
        let style = RenderStyle::default();
        assert_eq!(drawing.len(), 2);
        assert!(matches!(drawing[0], DrawCommand::Rectangle { .. }));
        assert_eq!(
            drawing[1],
            DrawCommand::Ellipse {
                fill: style.body_center,
                center: ScreenPoint { x: 320.0, y: 240.0 },
                radius: style.body_center_radius,
            }
        );

        sensor.disable_streams();
    }

    #[test]
    fn stream_thread_processes_events_until_stopped() {
        let sensor = Arc::new(SimulatedSensor::new("sim").with_frame_rate(100));
        sensor.enable_streams(&StreamConfig::default()).unwrap();
        let (processor, presentation, _surface) = processor_for(sensor.clone());

        let stream = start_sensor_stream(processor);
        let depth = presentation
            .depth_rx
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(depth.bytes.len(), 640 * 480 * 4);
        stream.stop();
        sensor.disable_streams();
    }
}
