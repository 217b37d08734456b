// ============================================================================
// IMAGE STAGE: the displayed raster, its fit, zoom/pan and pixel sampling
// ============================================================================

use image::RgbaImage;

use crate::color::ColorSample;
use crate::error::LoadError;

pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 5.0;
const ZOOM_IN_FACTOR: f32 = 1.1;
const ZOOM_OUT_FACTOR: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

impl ZoomDirection {
    /// Map a vertical scroll delta (egui convention: positive when the wheel
    /// turns away from the user) to a zoom step.
    pub fn from_scroll_delta(dy: f32) -> Option<Self> {
        if dy > 0.0 {
            Some(ZoomDirection::In)
        } else if dy < 0.0 {
            Some(ZoomDirection::Out)
        } else {
            None
        }
    }

    fn factor(self) -> f32 {
        match self {
            ZoomDirection::In => ZOOM_IN_FACTOR,
            ZoomDirection::Out => ZOOM_OUT_FACTOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePhase {
    Empty,
    Loading,
    Displayed,
}

/// Proof that a load was started under a given stage generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

impl LoadTicket {
    pub fn generation(self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Installed { width: u32, height: u32 },
    /// A newer load or a reset happened since the ticket was issued.
    Stale,
}

/// Uniform scale-down of `width × height` into `max_w × max_h`: width is
/// constrained first, then height against the already-shrunk result.
/// Never upscales.
pub fn fit_within(width: f32, height: f32, max_w: f32, max_h: f32) -> (f32, f32) {
    let (mut w, mut h) = (width, height);
    if w > max_w {
        h = max_w * h / w;
        w = max_w;
    }
    if h > max_h {
        w = max_h * w / h;
        h = max_h;
    }
    (w, h)
}

/// Holds the current raster and the view transform it is drawn with.
///
/// Coordinates passed to [`ImageStage::sample_at`] are relative to the top-left of
/// the displayed box, which moves with [`ImageStage::pan`] but is not scaled by
/// [`ImageStage::zoom`].
#[derive(Debug)]
pub struct ImageStage {
    raster: Option<RgbaImage>,
    display_size: (f32, f32),
    scale: f32,
    /// Translation left behind by anchored zooms, in display-box units.
    zoom_offset: (f32, f32),
    pan_offset: (f32, f32),
    generation: u64,
    pending: bool,
}

impl Default for ImageStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageStage {
    pub fn new() -> Self {
        Self {
            raster: None,
            display_size: (0.0, 0.0),
            scale: 1.0,
            zoom_offset: (0.0, 0.0),
            pan_offset: (0.0, 0.0),
            generation: 0,
            pending: false,
        }
    }

    pub fn phase(&self) -> StagePhase {
        if self.raster.is_some() {
            StagePhase::Displayed
        } else if self.pending {
            StagePhase::Loading
        } else {
            StagePhase::Empty
        }
    }

    pub fn raster(&self) -> Option<&RgbaImage> {
        self.raster.as_ref()
    }

    pub fn display_size(&self) -> (f32, f32) {
        self.display_size
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn pan_offset(&self) -> (f32, f32) {
        self.pan_offset
    }

    /// Bumped by every load and reset. Hosts re-upload their texture when it moves.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // ------------------------------------------------------------------------
    //  Loading
    // ------------------------------------------------------------------------

    /// Decode `bytes` and make them the displayed raster at native size. On any
    /// error the stage keeps what it had.
    pub fn load_from_bytes(
        &mut self,
        bytes: &[u8],
        mime: Option<&str>,
    ) -> Result<(u32, u32), LoadError> {
        let img = crate::io::decode_image(bytes, mime)?.to_rgba8();
        let dims = img.dimensions();
        self.clear_view();
        self.generation += 1;
        self.pending = false;
        self.display_size = (dims.0 as f32, dims.1 as f32);
        self.raster = Some(img);
        Ok(dims)
    }

    /// Start an asynchronous load: the stage is emptied and every earlier ticket
    /// goes stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.reset();
        self.pending = true;
        LoadTicket {
            generation: self.generation,
        }
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Install a decoded raster for `ticket` and fit it into the viewport.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        img: RgbaImage,
        viewport: (f32, f32),
    ) -> LoadOutcome {
        if !self.is_current(ticket) {
            return LoadOutcome::Stale;
        }
        let (width, height) = img.dimensions();
        self.raster = Some(img);
        self.pending = false;
        self.fit_to_viewport(viewport.0, viewport.1);
        LoadOutcome::Installed { width, height }
    }

    /// Give up on the load behind `ticket`. Returns false when the ticket is stale.
    pub fn abort_load(&mut self, ticket: LoadTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.reset();
        true
    }

    /// Drop the raster and all transform state.
    pub fn reset(&mut self) {
        self.raster = None;
        self.display_size = (0.0, 0.0);
        self.clear_view();
        self.pending = false;
        self.generation += 1;
    }

    fn clear_view(&mut self) {
        self.scale = 1.0;
        self.zoom_offset = (0.0, 0.0);
        self.pan_offset = (0.0, 0.0);
    }

    // ------------------------------------------------------------------------
    //  Layout
    // ------------------------------------------------------------------------

    /// Size the displayed box to fit the viewport. Returns the new box size,
    /// `(0, 0)` when nothing is loaded.
    pub fn fit_to_viewport(&mut self, viewport_w: f32, viewport_h: f32) -> (f32, f32) {
        let Some(raster) = &self.raster else {
            return (0.0, 0.0);
        };
        let (w, h) = raster.dimensions();
        self.display_size = fit_within(
            w as f32,
            h as f32,
            viewport_w.max(1.0),
            viewport_h.max(1.0),
        );
        self.display_size
    }

    /// On-screen rectangle `(min, size)` of the raster when the untransformed box
    /// would sit at `origin`.
    pub fn visual_rect(&self, origin: (f32, f32)) -> ((f32, f32), (f32, f32)) {
        let min = (
            origin.0 + self.pan_offset.0 + self.zoom_offset.0,
            origin.1 + self.pan_offset.1 + self.zoom_offset.1,
        );
        let size = (
            self.display_size.0 * self.scale,
            self.display_size.1 * self.scale,
        );
        (min, size)
    }

    /// Display-box coordinates of a screen point. `origin` is where the box sits
    /// before panning. Zoom is not undone.
    pub fn box_local(&self, screen: (f32, f32), origin: (f32, f32)) -> (f32, f32) {
        (
            screen.0 - origin.0 - self.pan_offset.0,
            screen.1 - origin.1 - self.pan_offset.1,
        )
    }

    // ------------------------------------------------------------------------
    //  View transform
    // ------------------------------------------------------------------------

    /// Step the zoom and keep `anchor` (display-box coordinates) fixed on screen.
    /// Sampling is unaffected.
    pub fn zoom(&mut self, direction: ZoomDirection, anchor: (f32, f32)) -> f32 {
        let old = self.scale;
        self.scale = (self.scale * direction.factor()).clamp(MIN_SCALE, MAX_SCALE);
        let f = self.scale / old;
        // translate(anchor) · scale(f) · translate(-anchor)
        self.zoom_offset = (
            anchor.0 + (self.zoom_offset.0 - anchor.0) * f,
            anchor.1 + (self.zoom_offset.1 - anchor.1) * f,
        );
        self.scale
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.pan_offset.0 += dx;
        self.pan_offset.1 += dy;
    }

    // ------------------------------------------------------------------------
    //  Sampling
    // ------------------------------------------------------------------------

    /// Raster pixel under a display-box coordinate, if any.
    pub fn pixel_at(&self, x: f32, y: f32) -> Option<(u32, u32)> {
        let raster = self.raster.as_ref()?;
        let (dw, dh) = self.display_size;
        if dw <= 0.0 || dh <= 0.0 {
            return None;
        }
        let px = (x * raster.width() as f32 / dw).round();
        let py = (y * raster.height() as f32 / dh).round();
        if px < 0.0 || py < 0.0 || px >= raster.width() as f32 || py >= raster.height() as f32 {
            return None;
        }
        Some((px as u32, py as u32))
    }

    pub fn sample_at(&self, x: f32, y: f32) -> Option<ColorSample> {
        let (px, py) = self.pixel_at(x, y)?;
        let [r, g, b, _] = self.raster.as_ref()?.get_pixel(px, py).0;
        Some(ColorSample::from_rgb(r, g, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn red_corner(w: u32, h: u32) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(w, h, Rgba([0, 0, 255, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img
    }

    fn displayed(img: RgbaImage, viewport: (f32, f32)) -> ImageStage {
        let mut stage = ImageStage::new();
        let ticket = stage.begin_load();
        stage.finish_load(ticket, img, viewport);
        stage
    }

    #[test]
    fn wide_image_is_width_constrained() {
        assert_eq!(fit_within(4000.0, 2000.0, 800.0, 600.0), (800.0, 400.0));
    }

    #[test]
    fn tall_image_is_then_height_constrained() {
        let (w, h) = fit_within(1000.0, 2000.0, 800.0, 600.0);
        assert_eq!(h, 600.0);
        assert!((w - 300.0).abs() < 1e-3, "width {w}");
    }

    #[test]
    fn small_image_is_not_upscaled() {
        assert_eq!(fit_within(320.0, 200.0, 800.0, 600.0), (320.0, 200.0));
    }

    #[test]
    fn fit_preserves_aspect_ratio() {
        let mut stage = displayed(RgbaImage::new(4000, 2000), (800.0, 600.0));
        let (w, h) = stage.display_size();
        assert_eq!(w, 800.0);
        assert!(h <= 600.0);
        assert!((w / h - 2.0).abs() < 0.01);

        // A later viewport change refits the same raster.
        assert_eq!(stage.fit_to_viewport(400.0, 400.0), (400.0, 200.0));
    }

    #[test]
    fn sample_at_reads_the_top_left_pixel() {
        let stage = displayed(red_corner(4, 4), (100.0, 100.0));
        let sample = stage.sample_at(0.0, 0.0).expect("inside raster");
        assert_eq!(sample.hex, "#ff0000");
        assert_eq!(sample.rgb_string(), "rgb(255, 0, 0)");
        assert_eq!(sample.hsl_string(), "hsl(0, 100%, 50%)");
    }

    #[test]
    fn sample_outside_the_raster_is_none() {
        let stage = displayed(red_corner(4, 4), (100.0, 100.0));
        assert!(stage.sample_at(-5.0, 1.0).is_none());
        assert!(stage.sample_at(1.0, 4.0).is_none());
        assert!(stage.sample_at(3.6, 0.0).is_none(), "rounds to column 4");
        assert!(ImageStage::new().sample_at(0.0, 0.0).is_none());
    }

    #[test]
    fn sampling_maps_through_the_display_ratio() {
        // 400×200 raster shown at 200×100: every display unit covers two pixels.
        let mut img = RgbaImage::from_pixel(400, 200, Rgba([0, 0, 0, 255]));
        img.put_pixel(100, 50, Rgba([0, 255, 0, 255]));
        let stage = displayed(img, (200.0, 150.0));
        assert_eq!(stage.display_size(), (200.0, 100.0));
        assert_eq!(stage.pixel_at(50.0, 25.0), Some((100, 50)));
        assert_eq!(stage.sample_at(50.0, 25.0).unwrap().hex, "#00ff00");
    }

    #[test]
    fn zoom_clamps_and_keeps_sampling_untransformed() {
        let mut stage = displayed(red_corner(10, 10), (10.0, 10.0));
        assert!((stage.zoom(ZoomDirection::In, (0.0, 0.0)) - 1.1).abs() < 1e-6);
        for _ in 0..100 {
            stage.zoom(ZoomDirection::In, (5.0, 5.0));
        }
        assert_eq!(stage.scale(), MAX_SCALE);
        for _ in 0..100 {
            stage.zoom(ZoomDirection::Out, (5.0, 5.0));
        }
        assert_eq!(stage.scale(), MIN_SCALE);
        // Zoom never moves what sample_at reads.
        assert_eq!(stage.sample_at(0.0, 0.0).unwrap().hex, "#ff0000");
    }

    #[test]
    fn zoom_keeps_anchor_fixed_on_screen() {
        let mut stage = displayed(RgbaImage::new(100, 100), (100.0, 100.0));
        let anchor = (30.0, 70.0);
        stage.zoom(ZoomDirection::In, anchor);
        stage.zoom(ZoomDirection::In, anchor);
        let ((x, y), (w, _)) = stage.visual_rect((0.0, 0.0));
        // The anchor's position within the scaled box is unchanged on screen.
        let screen_x = x + anchor.0 / 100.0 * w;
        let screen_y = y + anchor.1 / 100.0 * w;
        assert!((screen_x - anchor.0).abs() < 1e-3, "x drifted to {screen_x}");
        assert!((screen_y - anchor.1).abs() < 1e-3, "y drifted to {screen_y}");
    }

    #[test]
    fn pan_accumulates() {
        let mut stage = displayed(RgbaImage::new(10, 10), (10.0, 10.0));
        stage.pan(3.0, -2.0);
        stage.pan(1.0, 1.0);
        assert_eq!(stage.pan_offset(), (4.0, -1.0));
        assert_eq!(stage.visual_rect((10.0, 10.0)).0, (14.0, 9.0));
        assert_eq!(stage.box_local((14.0, 9.0), (10.0, 10.0)), (0.0, 0.0));
    }

    #[test]
    fn box_local_ignores_zoom() {
        let mut stage = displayed(red_corner(10, 10), (10.0, 10.0));
        stage.zoom(ZoomDirection::In, (5.0, 5.0));
        let local = stage.box_local((100.0, 50.0), (100.0, 50.0));
        assert_eq!(local, (0.0, 0.0));
        assert_eq!(stage.sample_at(local.0, local.1).unwrap().hex, "#ff0000");
    }

    #[test]
    fn stale_ticket_is_discarded() {
        let mut stage = ImageStage::new();
        let first = stage.begin_load();
        let second = stage.begin_load();
        assert_eq!(stage.phase(), StagePhase::Loading);

        let out = stage.finish_load(first, red_corner(2, 2), (50.0, 50.0));
        assert_eq!(out, LoadOutcome::Stale);
        assert_eq!(stage.phase(), StagePhase::Loading);

        let out = stage.finish_load(second, red_corner(2, 3), (50.0, 50.0));
        assert_eq!(
            out,
            LoadOutcome::Installed {
                width: 2,
                height: 3
            }
        );
        assert_eq!(stage.phase(), StagePhase::Displayed);
        assert!(!stage.abort_load(first));
    }

    #[test]
    fn reset_supersedes_in_flight_load() {
        let mut stage = ImageStage::new();
        let ticket = stage.begin_load();
        stage.reset();
        assert_eq!(stage.phase(), StagePhase::Empty);
        assert_eq!(
            stage.finish_load(ticket, red_corner(2, 2), (9.0, 9.0)),
            LoadOutcome::Stale
        );
        assert!(stage.raster().is_none());
    }

    #[test]
    fn reset_clears_transforms() {
        let mut stage = displayed(RgbaImage::new(10, 10), (10.0, 10.0));
        stage.zoom(ZoomDirection::Out, (1.0, 1.0));
        stage.pan(5.0, 5.0);
        stage.reset();
        assert_eq!(stage.phase(), StagePhase::Empty);
        assert_eq!(stage.scale(), 1.0);
        assert_eq!(stage.pan_offset(), (0.0, 0.0));
        assert_eq!(stage.display_size(), (0.0, 0.0));
    }

    #[test]
    fn failed_load_from_bytes_keeps_prior_state() {
        let mut stage = displayed(red_corner(3, 3), (30.0, 30.0));
        let generation = stage.generation();
        assert!(matches!(
            stage.load_from_bytes(b"plain text", Some("text/plain")),
            Err(LoadError::InvalidFileType(_))
        ));
        assert!(matches!(
            stage.load_from_bytes(b"\x89PNG broken", Some("image/png")),
            Err(LoadError::DecodeFailure(_))
        ));
        assert_eq!(stage.generation(), generation);
        assert_eq!(stage.sample_at(0.0, 0.0).unwrap().hex, "#ff0000");
    }

    #[test]
    fn load_from_bytes_replaces_the_raster() {
        let png = crate::io::encode_png(&RgbaImage::from_pixel(5, 4, Rgba([1, 2, 3, 255]))).unwrap();
        let mut stage = displayed(red_corner(3, 3), (30.0, 30.0));
        assert_eq!(stage.load_from_bytes(&png, Some("image/png")).unwrap(), (5, 4));
        assert_eq!(stage.display_size(), (5.0, 4.0));
        assert_eq!(stage.sample_at(0.0, 0.0).unwrap().hex, "#010203");
    }

    #[test]
    fn scroll_delta_maps_to_direction() {
        assert_eq!(ZoomDirection::from_scroll_delta(12.0), Some(ZoomDirection::In));
        assert_eq!(ZoomDirection::from_scroll_delta(-3.0), Some(ZoomDirection::Out));
        assert_eq!(ZoomDirection::from_scroll_delta(0.0), None);
    }
}
