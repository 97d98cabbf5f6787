// ABOUTME: Demo entry point: renders a PSX-style frame sequence to PNG files.
// ABOUTME: Usage: psx-demo [config.toml] [output-dir]

mod particles;
mod scene;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::Instant;

use psx_core::Config;
use psx_particles::{ParticleService, SceneDrawSet};
use psx_post::{EffectComposer, Framebuffer, SceneTransform};

use particles::BURST_DURATION;
use scene::Scene;

/// Gap between one burst expiring and the next one starting
const BURST_PAUSE: Duration = Duration::from_millis(400);

fn write_png(fb: &Framebuffer, path: &Path) -> Result<()> {
    let image = image::RgbaImage::from_raw(fb.width as u32, fb.height as u32, fb.to_rgba8())
        .context("Framebuffer does not match its dimensions")?;
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    tracing::info!("Starting psx-demo");

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => Config::load(Path::new(&path))
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => Config::load_or_default(),
    };
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "psx-frames".to_string()));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let width = config.frame.width.max(1) as usize;
    let height = config.frame.height.max(1) as usize;
    let interval = Duration::from_millis(config.frame.frame_interval_ms);

    let scene = Scene::new(
        SceneTransform::from_settings(&config.vertex_snap),
        width as f32 / height as f32,
    );
    let mut composer = EffectComposer::from_config(&config.effects);
    let mut fb = Framebuffer::new(width, height);

    let draw_set = SceneDrawSet::new();
    let reader = draw_set.reader();
    let service = ParticleService::spawn(draw_set);
    let emitter = service.emitter();
    let mut rng = StdRng::from_entropy();
    let mut burst_started: Option<Instant> = None;

    for frame in 0..config.frame.frames {
        let due = burst_started.map_or(true, |t| t.elapsed() >= BURST_DURATION + BURST_PAUSE);
        if due {
            emitter.add_particle_group(particles::burst(&mut rng))?;
            burst_started = Some(Instant::now());
        }

        // Lets the particle service apply requests and expire old bursts
        tokio::time::sleep(interval).await;

        let time = frame as f32 * interval.as_secs_f32();
        scene.draw(&mut fb, time);

        let progress = burst_started.map_or(0.0, |t| {
            t.elapsed().as_secs_f32() / BURST_DURATION.as_secs_f32()
        });
        for batch in reader.snapshot() {
            particles::splat(&mut fb, &scene, &batch, progress.min(1.0));
        }

        composer.render(&mut fb.target(), interval.as_secs_f32());

        write_png(&fb, &out_dir.join(format!("frame_{:04}.png", frame)))?;
        tracing::debug!("Frame {} written", frame);
    }

    let disposed = service.shutdown().await?;
    tracing::info!(
        "Rendered {} frames to {} ({} particle groups left at exit)",
        config.frame.frames,
        out_dir.display(),
        disposed
    );

    Ok(())
}
