//! Hexpick: pick pixel colors out of an image and keep a short history of them.
//!
//! The core is UI-agnostic: [`controller::PickerController`] takes pointer gestures
//! in display-box coordinates and reports results as values. The eframe front end
//! in `main.rs` / `app.rs` is one host for it.

#[macro_use]
pub mod logger;
#[macro_use]
pub mod i18n;

pub mod clipboard;
pub mod color;
pub mod controller;
pub mod error;
pub mod history;
pub mod io;
pub mod settings;
pub mod stage;
pub mod storage;

pub use color::{ColorField, ColorSample};
pub use controller::{PickerController, PickerEvent};
pub use error::LoadError;
pub use history::{HistoryChange, HistoryStore, ImageHistoryEntry};
pub use stage::{ImageStage, StagePhase};
