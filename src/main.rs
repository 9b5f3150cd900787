mod config;
mod error;
mod pipeline;
mod presenter;
mod sensor;
mod types;

use std::{sync::Arc, time::Instant};

use anyhow::{Context, Result};
use config::ViewerConfig;
use pipeline::{ChannelSink, PresenceMonitor, RenderStyle, ResultSink, start_presence_monitor};
use presenter::Presenter;
use sensor::{SensorSession, SimulatedSensor, simulated::Scene};
use types::SkeletonPoint;

fn main() -> Result<()> {
    env_logger::init();

    let config = ViewerConfig::from_env();
    log::debug!("{config:?}");

    let (sink, presentation) = ChannelSink::new();
    let sink: Arc<dyn ResultSink> = Arc::new(sink);
    let session = Arc::new(SensorSession::new(
        &config,
        RenderStyle::default(),
        sink.clone(),
    ));

    let center = SkeletonPoint::new(0.0, 0.0, 2.2);
    let sensor = Arc::new(SimulatedSensor::new("simulated sensor"));
    session
        .attach(sensor.clone())
        .context("failed to attach sensor")?;

    let timer = start_presence_monitor(
        session.clone(),
        PresenceMonitor::new(config.skeleton_wait),
        config.presence_period,
        sink,
    );

    // Someone walks up, half leaves the frame, steps back out of range, then leaves.
    let scenes = [
        Scene::FullBody(center),
        Scene::PartialBody(center),
        Scene::PositionOnly(center),
        Scene::Empty,
    ];
    let started = Instant::now();
    let slot = config.run_duration / scenes.len() as u32;
    let mut presenter = Presenter::new(config.screen_width as u32, config.screen_height as u32);
    for (i, scene) in scenes.into_iter().enumerate() {
        log::info!("scene: {scene:?}");
        sensor.set_scene(scene);
        presenter.run(&presentation, started + slot * (i as u32 + 1));
    }

    timer.stop();
    session.detach().context("failed to detach sensor")?;
    presenter.drain_status(&presentation);

    let counts = presenter.counts();
    log::info!(
        "presented {} depth, {} color, {} skeleton frames ({} drawings committed), final status {:?}",
        counts.depth,
        counts.color,
        counts.skeleton,
        session.surface().generation(),
        presenter.status()
    );

    if let Some(dir) = &config.snapshot_dir {
        presenter.save_snapshots(dir)?;
    }

    Ok(())
}
