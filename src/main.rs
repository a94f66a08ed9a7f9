mod app;
mod cli;
mod engine;
mod style;

use clap::Parser;
use eframe::egui;
use log::info;

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = cli::Args::parse();
    info!("starting {}", app::window_title(None));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 768.0])
            .with_min_inner_size([480.0, 360.0])
            .with_title(app::window_title(None)),
        ..Default::default()
    };
    eframe::run_native(
        "pixelpeek",
        options,
        Box::new(move |cc| Ok(Box::new(app::ViewerApp::new(cc, args.image)))),
    )
}
