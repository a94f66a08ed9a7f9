use std::path::{Path, PathBuf};

use image::{ColorType, DynamicImage, ImageFormat, ImageReader};
use log::{info, warn};
use thiserror::Error;

/// Invoked after every operation that changes which document is open or
/// what it is called. Runs synchronously inside the mutating call.
pub type ChangeCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("could not save {}: {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no image is open")]
    NoImage,
}

/// Read-only snapshot of the open document, computed on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageProperties {
    pub filepath: PathBuf,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub format: &'static str,
    pub mode: &'static str,
}

/// Stateful facade over the `image` crate: at most one open document,
/// CRUD-style lifecycle operations, and a single change observer.
///
/// Invariant: `filepath` is present exactly when `image` is, and the saved
/// flag is only meaningful while an image is open.
pub struct ImageEngine {
    image: Option<DynamicImage>,
    format: Option<ImageFormat>,
    filepath: Option<PathBuf>,
    saved: Option<bool>,
    on_change: Option<ChangeCallback>,
}

impl ImageEngine {
    pub fn new() -> Self {
        Self {
            image: None,
            format: None,
            filepath: None,
            saved: None,
            on_change: None,
        }
    }

    pub fn set_change_callback(&mut self, callback: ChangeCallback) {
        self.on_change = Some(callback);
    }

    fn notify(&self) {
        if let Some(callback) = &self.on_change {
            callback();
        }
    }

    /// Decodes `path` into the document slot, replacing whatever was open.
    /// On failure the slot is cleared and the observer is not notified.
    pub fn open(&mut self, path: &Path) -> Result<(), EngineError> {
        match decode(path) {
            Ok((image, format)) => {
                info!(
                    "opened {} ({}x{})",
                    path.display(),
                    image.width(),
                    image.height()
                );
                self.image = Some(image);
                self.format = format;
                self.filepath = Some(path.to_path_buf());
                self.saved = Some(true);
                self.notify();
                Ok(())
            }
            Err(source) => {
                warn!("open failed for {}: {source}", path.display());
                self.image = None;
                self.format = None;
                self.filepath = None;
                self.saved = None;
                Err(EngineError::Open {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    /// Re-encodes the open image to the path it was opened from.
    pub fn save(&mut self) -> Result<(), EngineError> {
        let (image, path) = match (&self.image, &self.filepath) {
            (Some(image), Some(path)) => (image, path.clone()),
            _ => return Err(EngineError::NoImage),
        };
        match image.save(&path) {
            Ok(()) => {
                info!("saved {}", path.display());
                self.saved = Some(true);
                Ok(())
            }
            Err(source) => {
                warn!("save failed for {}: {source}", path.display());
                self.saved = Some(false);
                Err(EngineError::Save { path, source })
            }
        }
    }

    /// Encodes the open image to `path`. The source path is only updated
    /// once the encode has succeeded, so a failed save-as leaves the
    /// document pointing at its previous file.
    pub fn save_as(&mut self, path: &Path) -> Result<(), EngineError> {
        let image = self.image.as_ref().ok_or(EngineError::NoImage)?;
        match image.save(path) {
            Ok(()) => {
                info!("saved {}", path.display());
                self.filepath = Some(path.to_path_buf());
                self.saved = Some(true);
                self.notify();
                Ok(())
            }
            Err(source) => {
                warn!("save failed for {}: {source}", path.display());
                self.saved = Some(false);
                Err(EngineError::Save {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    /// Clears the document slot. Idempotent; always notifies.
    pub fn close(&mut self) {
        info!("closed document");
        self.image = None;
        self.format = None;
        self.filepath = None;
        self.saved = None;
        self.notify();
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        self.image.as_ref()
    }

    pub fn saved(&self) -> Option<bool> {
        self.saved
    }

    pub fn properties(&self) -> Option<ImageProperties> {
        let image = self.image.as_ref()?;
        let filepath = self.filepath.clone()?;
        let filename = filepath
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("Unknown")
            .to_string();
        Some(ImageProperties {
            filename,
            filepath,
            width: image.width(),
            height: image.height(),
            format: self.format.map(format_label).unwrap_or("Unknown"),
            mode: mode_label(image.color()),
        })
    }

    pub fn properties_text(&self) -> String {
        match self.properties() {
            Some(p) => format!(
                "File Name: {}\nWidth:     {}\nHeight:    {}\nFormat:    {}\nMode:      {}",
                p.filename, p.width, p.height, p.format, p.mode
            ),
            None => "No image".to_string(),
        }
    }
}

fn decode(path: &Path) -> Result<(DynamicImage, Option<ImageFormat>), image::ImageError> {
    let reader = ImageReader::open(path)
        .map_err(image::ImageError::IoError)?
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    let format = reader.format();
    let image = reader.decode()?;
    Ok((image, format))
}

pub fn format_label(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Png => "PNG",
        ImageFormat::WebP => "WebP",
        ImageFormat::Gif => "GIF",
        ImageFormat::Bmp => "BMP",
        ImageFormat::Tiff => "TIFF",
        ImageFormat::Ico => "ICO",
        _ => "Unknown",
    }
}

pub fn mode_label(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 => "L",
        ColorType::La8 => "LA",
        ColorType::Rgb8 => "RGB",
        ColorType::Rgba8 => "RGBA",
        ColorType::L16 => "L16",
        ColorType::La16 => "LA16",
        ColorType::Rgb16 => "RGB16",
        ColorType::Rgba16 => "RGBA16",
        ColorType::Rgb32F => "RGB32F",
        ColorType::Rgba32F => "RGBA32F",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fixture_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pixelpeek-tests-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn write_rgb(name: &str, width: u32, height: u32) -> PathBuf {
        let path = fixture_path(name);
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 251) as u8, (y % 241) as u8, 60u8])
        });
        img.save(&path).unwrap();
        path
    }

    fn engine_with_counter() -> (ImageEngine, Arc<AtomicUsize>) {
        let mut engine = ImageEngine::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let observed = counter.clone();
        engine.set_change_callback(Box::new(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        }));
        (engine, counter)
    }

    #[test]
    fn open_reports_properties_and_notifies_once() {
        let path = write_rgb("photo.jpg", 640, 480);
        let (mut engine, calls) = engine_with_counter();

        engine.open(&path).unwrap();

        let props = engine.properties().unwrap();
        assert_eq!(props.filepath, path);
        assert_eq!(props.filename, "photo.jpg");
        assert_eq!(props.width, 640);
        assert_eq!(props.height, 480);
        assert_eq!(props.format, "JPEG");
        assert_eq!(props.mode, "RGB");
        assert_eq!(engine.saved(), Some(true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_open_clears_state_and_does_not_notify() {
        let good = write_rgb("before-bad-open.png", 8, 8);
        let (mut engine, calls) = engine_with_counter();
        engine.open(&good).unwrap();

        let missing = fixture_path("does-not-exist.png");
        let result = engine.open(&missing);

        assert!(matches!(result, Err(EngineError::Open { .. })));
        assert!(!engine.has_image());
        assert!(engine.properties().is_none());
        assert_eq!(engine.saved(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn open_rejects_corrupt_data() {
        let path = fixture_path("garbage.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();
        let (mut engine, calls) = engine_with_counter();

        assert!(engine.open(&path).is_err());
        assert!(!engine.has_image());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn close_is_idempotent_and_always_notifies() {
        let (mut engine, calls) = engine_with_counter();

        engine.close();
        engine.close();

        assert!(!engine.has_image());
        assert!(engine.properties().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn save_round_trips_pixels() {
        let path = write_rgb("roundtrip.png", 31, 17);
        let (mut engine, _) = engine_with_counter();

        engine.open(&path).unwrap();
        let before = engine.image().unwrap().to_rgba8().into_raw();
        engine.save().unwrap();
        engine.open(&path).unwrap();

        let after = engine.image().unwrap().to_rgba8().into_raw();
        assert_eq!(before, after);
        let props = engine.properties().unwrap();
        assert_eq!((props.width, props.height), (31, 17));
        assert_eq!(props.mode, "RGB");
    }

    #[test]
    fn save_without_image_is_an_error() {
        let (mut engine, calls) = engine_with_counter();

        assert!(matches!(engine.save(), Err(EngineError::NoImage)));
        assert!(matches!(
            engine.save_as(&fixture_path("never.png")),
            Err(EngineError::NoImage)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn save_as_updates_filename_and_notifies() {
        let original = write_rgb("original.png", 12, 12);
        let copy = fixture_path("copy.png");
        let (mut engine, calls) = engine_with_counter();
        engine.open(&original).unwrap();

        engine.save_as(&copy).unwrap();

        let props = engine.properties().unwrap();
        assert_eq!(props.filename, "copy.png");
        assert_eq!(engine.saved(), Some(true));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(copy.exists());
    }

    #[test]
    fn failed_save_as_keeps_previous_path() {
        let original = write_rgb("keep-path.png", 12, 12);
        let (mut engine, _) = engine_with_counter();
        engine.open(&original).unwrap();

        let bogus = fixture_path("no-such-codec.xyz");
        let result = engine.save_as(&bogus);

        assert!(matches!(result, Err(EngineError::Save { .. })));
        assert_eq!(engine.properties().unwrap().filename, "keep-path.png");
        assert_eq!(engine.saved(), Some(false));
    }

    #[test]
    fn properties_text_uses_fixed_layout() {
        let path = write_rgb("layout.png", 20, 10);
        let (mut engine, _) = engine_with_counter();
        engine.open(&path).unwrap();

        assert_eq!(
            engine.properties_text(),
            "File Name: layout.png\nWidth:     20\nHeight:    10\nFormat:    PNG\nMode:      RGB"
        );
    }

    #[test]
    fn properties_text_without_image_is_the_sentinel() {
        let engine = ImageEngine::new();
        assert_eq!(engine.properties_text(), "No image");
    }

    #[test]
    fn labels_match_library_tags() {
        assert_eq!(format_label(ImageFormat::Jpeg), "JPEG");
        assert_eq!(format_label(ImageFormat::WebP), "WebP");
        assert_eq!(mode_label(ColorType::Rgba8), "RGBA");
        assert_eq!(mode_label(ColorType::L8), "L");
    }
}
