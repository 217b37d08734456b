#![windows_subsystem = "windows"]

mod app;

use app::HexpickApp;
use eframe::egui;
use hexpick::settings::AppSettings;
use hexpick::{i18n, logger, t};

fn main() -> Result<(), eframe::Error> {
    // Session log (overwrites the previous session's log)
    logger::init();
    if let Some(path) = logger::log_path() {
        hexpick::log_info!("Session log: {}", path.display());
    }

    let settings = AppSettings::load();
    // First launch: leave an editable settings file behind.
    if AppSettings::settings_path().is_some_and(|p| !p.exists()) {
        settings.save();
    }
    i18n::init(&settings.language);
    hexpick::log_info!("Language: {}", i18n::current_language());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 720.0])
            .with_min_inner_size([640.0, 420.0])
            .with_title(t!("app.title")),
        ..Default::default()
    };

    eframe::run_native(
        "Hexpick",
        options,
        Box::new(move |cc| Box::new(HexpickApp::new(cc, settings))),
    )
}
