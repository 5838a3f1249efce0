mod audio;
mod cli;
mod renderer;
mod ui;
mod utils;

use anyhow::{bail, Result};
use audio::{SourcePipe, SpectrumAnalyzer};
use clap::Parser;
use cli::Cli;
use glam::Vec3;
use nannou::prelude::*;
use night_flight_core::{
    BeatClassifier, CameraController, CityChunks, FlightDirector, TurnController,
};
use renderer::{HudInfo, Renderer};
use std::cell::Cell;
use std::rc::Rc;
use ui::bindings::{parse_key, Action};
use utils::Config;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    if cli.list_devices {
        SourcePipe::list_devices();
        return Ok(());
    }

    if let Some(path) = &cli.config {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                bail!("config directory {} does not exist", parent.display());
            }
        }
    }

    nannou::app(model).update(update).run();
    Ok(())
}

struct Model {
    config: Config,
    source: SourcePipe,
    spectrum: SpectrumAnalyzer,
    classifier: BeatClassifier,
    director: FlightDirector,
    camera: CameraController,
    city: CityChunks,
    renderer: Renderer,
}

fn model(app: &App) -> Model {
    let cli = Cli::parse();
    app.set_exit_on_escape(false);

    let mut win = app
        .new_window()
        .view(view)
        .key_pressed(key_pressed)
        .size(1280, 720)
        .min_size(400, 300);
    if !cli.windowed {
        win = win.fullscreen();
    }
    let window_id = win.build().unwrap_or_else(|e| {
        log::error!("Failed to open window: {}", e);
        std::process::exit(1);
    });
    if !cli.windowed {
        if let Some(window) = app.window(window_id) {
            window.set_cursor_visible(false);
        }
    }

    let config = Config::load(cli.config.as_deref());
    let grid = config.grid();
    let seed = cli.seed.unwrap_or_else(|| config.seed());
    log::info!("City seed {}", seed);

    let source = SourcePipe::new(&config);
    let spectrum = SpectrumAnalyzer::new(source.sample_rate());

    let pulse = Rc::new(Cell::new(0.0f32));
    let mut classifier = BeatClassifier::with_config(config.classifier());
    {
        let pulse = Rc::clone(&pulse);
        classifier.on_beat(move |intensity| pulse.set(pulse.get().max(*intensity)));
    }
    classifier.on_transition(|intensity| log::info!("Transition ({:.2})", intensity));
    classifier.on_heavy_beat_shift(|intensity| log::info!("Heavy beat shift ({:.2})", intensity));

    let turn = TurnController::with_grid(config.turn(), grid);
    let mut camera = CameraController::new(config.flight(&grid), config.camera(), turn, Vec3::ZERO);
    camera.on_perspective_change(|p| log::info!("Perspective: {:?}", p));

    let city = CityChunks::new(grid, seed)
        .with_view_radius(config.view_radius())
        .with_empty_lot_chance(config.empty_lot_chance());

    let mut renderer = Renderer::new(pulse);
    if cli.debug {
        renderer.toggle_debug_viz();
    }

    Model {
        director: FlightDirector::new(config.director()),
        config,
        source,
        spectrum,
        classifier,
        camera,
        city,
        renderer,
    }
}

fn update(app: &App, model: &mut Model, update: Update) {
    let dt = update.since_last.as_secs_f32().min(0.1);
    let now_ms = app.time as f64 * 1000.0;

    let samples = model.source.stream();
    model.spectrum.analyze(&samples);

    // Classification first: the director reacts within the same frame
    let events = model.classifier.update(&model.spectrum, now_ms);
    model.director.apply(&events, &mut model.camera);
    model.camera.update(dt);
    model.city.update(model.camera.pose().bullet);

    model.renderer.update(HudInfo {
        energy: model.classifier.last_energy(),
        short_mean: model.classifier.short_mean(),
        long_mean: model.classifier.long_mean(),
        beat_intensity: model.classifier.beat_intensity(),
        speed: model.camera.current_speed(),
        base_speed: model.camera.base_speed(),
        heading: model.camera.heading(),
        perspective: Some(model.camera.perspective()),
        turning: model.camera.is_turning(),
        turns_taken: model.director.turns_taken(),
        turns_skipped: model.director.turns_skipped(),
        buildings: model.city.building_count(),
        device: model.source.current_device_name().map(str::to_string),
    });
}

fn view(app: &App, model: &Model, frame: Frame) {
    let bounds = app.window_rect();
    let draw = app.draw();

    model
        .renderer
        .draw(&draw, bounds, model.camera.pose(), &model.city);
    model.renderer.draw_debug_viz(&draw, bounds);

    if let Err(e) = draw.to_frame(app, &frame) {
        log::error!("Failed to render frame: {:?}", e);
    }
}

fn key_pressed(app: &App, model: &mut Model, key: Key) {
    match parse_key(key, app.keys.mods.shift()) {
        Some(Action::Quit) => app.quit(),
        Some(Action::TogglePerspective) => model.camera.toggle_perspective(),
        Some(Action::Turn(direction)) => {
            let outcome = model.director.request_turn(&mut model.camera, direction);
            log::info!("Manual turn {:?}: {:?}", direction, outcome);
        }
        Some(Action::ToggleDebugViz) => model.renderer.toggle_debug_viz(),
        Some(Action::AdjustSpeed(delta)) => {
            let speed = (model.camera.base_speed() + delta).max(0.0);
            model.camera.set_base_speed(speed);
            log::info!("Base speed {:.0}", speed);
        }
        Some(Action::SelectDevice(index)) => {
            match model.source.select_device(index, &mut model.config) {
                Ok(name) => {
                    log::info!("[{}] {}", index, name);
                    model.spectrum.set_sample_rate(model.source.sample_rate());
                    model.spectrum.reset();
                    model.classifier.reset();
                }
                Err(e) => log::warn!("[{}] device switch failed: {}", index, e),
            }
        }
        None => {}
    }
}
