// ============================================================================
// PICKER CONTROLLER: gestures in, stage / history updates out
// ============================================================================

use image::{DynamicImage, RgbaImage};
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use crate::clipboard::ClipboardWriter;
use crate::color::{ColorField, ColorSample};
use crate::error::{ClipboardError, LoadError};
use crate::history::{HistoryChange, HistoryStore, ImageHistoryEntry};
use crate::io;
use crate::stage::{ImageStage, LoadOutcome, LoadTicket, StagePhase, ZoomDirection};
use crate::storage::KeyValueStore;

/// What the host has to react to after [`PickerController::poll`].
#[derive(Debug)]
pub enum PickerEvent {
    /// A load finished and its raster is on stage.
    Displayed {
        name: String,
        width: u32,
        height: u32,
    },
    /// A load failed; the stage is back to empty. Show an alert.
    LoadFailed { name: String, error: LoadError },
    HistoryChanged(HistoryChange),
}

/// Decode result sent back from a load thread.
struct LoadResult {
    ticket: LoadTicket,
    name: String,
    /// Thumbnail for the image history; `None` when the load should not be recorded.
    thumbnail: Option<Result<Vec<u8>, LoadError>>,
    image: Result<RgbaImage, LoadError>,
}

/// Owns the stage and the history and dispatches user gestures to them.
pub struct PickerController<S: KeyValueStore> {
    stage: ImageStage,
    history: HistoryStore<S>,
    current: Option<ColorSample>,
    hover: Option<ColorSample>,
    viewport: (f32, f32),
    pan_last: Option<(f32, f32)>,
    loading_name: Option<String>,
    load_sender: mpsc::Sender<LoadResult>,
    load_receiver: mpsc::Receiver<LoadResult>,
}

impl<S: KeyValueStore> PickerController<S> {
    pub fn new(history: HistoryStore<S>) -> Self {
        let (load_sender, load_receiver) = mpsc::channel();
        Self {
            stage: ImageStage::new(),
            history,
            current: None,
            hover: None,
            viewport: (800.0, 600.0),
            pan_last: None,
            loading_name: None,
            load_sender,
            load_receiver,
        }
    }

    pub fn stage(&self) -> &ImageStage {
        &self.stage
    }

    pub fn history(&self) -> &HistoryStore<S> {
        &self.history
    }

    pub fn phase(&self) -> StagePhase {
        self.stage.phase()
    }

    /// The color shown in the hex / rgb / hsl fields.
    pub fn current(&self) -> Option<&ColorSample> {
        self.current.as_ref()
    }

    /// Live preview under the pointer.
    pub fn hover_sample(&self) -> Option<&ColorSample> {
        self.hover.as_ref()
    }

    /// Name of the file being decoded, while loading.
    pub fn loading_name(&self) -> Option<&str> {
        self.loading_name.as_deref()
    }

    pub fn is_panning(&self) -> bool {
        self.pan_last.is_some()
    }

    /// Space available for the displayed box. A displayed image is refit when it
    /// changes.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        if (width, height) == self.viewport {
            return;
        }
        self.viewport = (width, height);
        if self.stage.phase() == StagePhase::Displayed {
            self.stage.fit_to_viewport(width, height);
        }
    }

    // ------------------------------------------------------------------------
    //  Loading
    // ------------------------------------------------------------------------

    /// Open an image file from disk. Non-images are rejected without touching the
    /// stage; everything else is read and decoded on a background thread.
    pub fn open_path(&mut self, path: &Path) -> Result<(), LoadError> {
        let name = io::display_name(path);
        io::check_image_type(&name, None)?;
        let mime = io::mime_for_name(&name);
        let path = path.to_path_buf();
        self.spawn_load(name, true, move || {
            let bytes = io::read_file(&path)?;
            io::decode_image(&bytes, Some(mime))
        });
        Ok(())
    }

    /// Open an image from memory (drag-and-drop payloads).
    pub fn open_bytes(
        &mut self,
        name: &str,
        mime: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<(), LoadError> {
        io::check_image_type(name, mime)?;
        // Past the type gate the payload counts as an image, so unreadable bytes
        // are a decode failure.
        let mime = mime.unwrap_or_else(|| io::mime_for_name(name)).to_owned();
        self.spawn_load(name.to_string(), true, move || {
            io::decode_image(&bytes, Some(&mime))
        });
        Ok(())
    }

    /// Show a thumbnail from the image history. Returns false for an unknown
    /// timestamp.
    pub fn open_history_image(&mut self, timestamp: u64) -> bool {
        let Some(entry) = self.history.image(timestamp) else {
            return false;
        };
        let name = entry.name.clone();
        let thumbnail = entry.thumbnail.clone();
        self.spawn_load(name, false, move || {
            io::decode_thumbnail(&thumbnail).map(DynamicImage::ImageRgba8)
        });
        true
    }

    fn spawn_load<F>(&mut self, name: String, record: bool, decode: F)
    where
        F: FnOnce() -> Result<DynamicImage, LoadError> + Send + 'static,
    {
        let ticket = self.stage.begin_load();
        self.hover = None;
        self.pan_last = None;
        self.loading_name = Some(name.clone());
        log_info!("Loading '{}' (generation {})", name, ticket.generation());

        let sender = self.load_sender.clone();
        std::thread::spawn(move || {
            let result = match decode() {
                Ok(img) => LoadResult {
                    ticket,
                    name,
                    thumbnail: record.then(|| io::make_thumbnail(&img)),
                    image: Ok(img.to_rgba8()),
                },
                Err(e) => LoadResult {
                    ticket,
                    name,
                    thumbnail: None,
                    image: Err(e),
                },
            };
            let _ = sender.send(result);
        });
    }

    /// Apply every finished load without blocking.
    pub fn poll(&mut self) -> Vec<PickerEvent> {
        let mut events = Vec::new();
        while let Ok(result) = self.load_receiver.try_recv() {
            self.apply_load(result, &mut events);
        }
        events
    }

    /// Wait up to `timeout` for one load to finish, then drain the rest.
    pub fn poll_blocking(&mut self, timeout: Duration) -> Vec<PickerEvent> {
        let mut events = Vec::new();
        if let Ok(result) = self.load_receiver.recv_timeout(timeout) {
            self.apply_load(result, &mut events);
        }
        events.extend(self.poll());
        events
    }

    fn apply_load(&mut self, result: LoadResult, events: &mut Vec<PickerEvent>) {
        let LoadResult {
            ticket,
            name,
            thumbnail,
            image,
        } = result;

        if !self.stage.is_current(ticket) {
            log_info!("Discarding superseded load of '{}'", name);
            return;
        }
        self.loading_name = None;

        let img = match image {
            Ok(img) => img,
            Err(error) => {
                log_warn!("Loading '{}' failed: {}", name, error);
                self.stage.abort_load(ticket);
                events.push(PickerEvent::LoadFailed { name, error });
                return;
            }
        };

        let LoadOutcome::Installed { width, height } =
            self.stage.finish_load(ticket, img, self.viewport)
        else {
            return;
        };
        log_info!("Displaying '{}' ({}x{})", name, width, height);

        match thumbnail {
            Some(Ok(thumbnail)) => {
                let entry = ImageHistoryEntry {
                    name: name.clone(),
                    thumbnail,
                    timestamp: self.history.next_timestamp(),
                };
                let change = self.history.add_image(entry);
                events.push(PickerEvent::Displayed {
                    name,
                    width,
                    height,
                });
                events.push(PickerEvent::HistoryChanged(change));
            }
            Some(Err(e)) => {
                log_warn!("Thumbnail for '{}' failed, not recorded: {}", name, e);
                events.push(PickerEvent::Displayed {
                    name,
                    width,
                    height,
                });
            }
            None => events.push(PickerEvent::Displayed {
                name,
                width,
                height,
            }),
        }
    }

    // ------------------------------------------------------------------------
    //  Pointer gestures (display-box coordinates)
    // ------------------------------------------------------------------------

    /// Pick the pixel at `(x, y)`: it becomes the current color and is pushed into
    /// the color history. `None` when nothing is under the pointer.
    pub fn click(&mut self, x: f32, y: f32) -> Option<HistoryChange> {
        let sample = self.stage.sample_at(x, y)?;
        self.current = Some(sample.clone());
        Some(self.history.add_color(sample))
    }

    /// Update the live preview. Leaves the previous preview in place when the
    /// pointer is off the raster.
    pub fn hover(&mut self, x: f32, y: f32) -> Option<&ColorSample> {
        if let Some(sample) = self.stage.sample_at(x, y) {
            self.hover = Some(sample);
        }
        self.hover.as_ref()
    }

    /// Pointer left the canvas.
    pub fn leave(&mut self) {
        self.hover = None;
    }

    /// Zoom one step around `anchor`. Returns the new scale, or `None` when no
    /// image is displayed or the delta is zero.
    pub fn wheel(&mut self, scroll_dy: f32, anchor: (f32, f32)) -> Option<f32> {
        if self.stage.phase() != StagePhase::Displayed {
            return None;
        }
        let direction = ZoomDirection::from_scroll_delta(scroll_dy)?;
        Some(self.stage.zoom(direction, anchor))
    }

    /// Start a pan drag at a screen position.
    pub fn begin_pan(&mut self, screen: (f32, f32)) {
        if self.stage.phase() == StagePhase::Displayed {
            self.pan_last = Some(screen);
        }
    }

    pub fn drag_to(&mut self, screen: (f32, f32)) {
        if let Some(last) = self.pan_last {
            self.stage.pan(screen.0 - last.0, screen.1 - last.1);
            self.pan_last = Some(screen);
        }
    }

    pub fn end_pan(&mut self) {
        self.pan_last = None;
    }

    // ------------------------------------------------------------------------
    //  History and fields
    // ------------------------------------------------------------------------

    /// Show a color from the history in the fields. The history is not reordered.
    pub fn select_history_color(&mut self, hex: &str) -> bool {
        match self.history.color(hex) {
            Some(sample) => {
                self.current = Some(sample.clone());
                true
            }
            None => false,
        }
    }

    pub fn delete_history_color(&mut self, hex: &str) -> HistoryChange {
        self.history.delete_color(hex)
    }

    pub fn delete_history_image(&mut self, timestamp: u64) -> HistoryChange {
        self.history.delete_image(timestamp)
    }

    /// Copy one field of the current color. `Ok(None)` when no color is shown.
    pub fn copy_field(
        &self,
        field: ColorField,
        clipboard: &mut dyn ClipboardWriter,
    ) -> Result<Option<String>, ClipboardError> {
        let Some(sample) = &self.current else {
            return Ok(None);
        };
        let text = field.value(sample);
        clipboard.write_text(&text)?;
        Ok(Some(text))
    }

    /// Back to the empty stage. Loads still in flight are dropped when they land.
    pub fn reset(&mut self) {
        self.stage.reset();
        self.hover = None;
        self.pan_last = None;
        self.loading_name = None;
    }
}
