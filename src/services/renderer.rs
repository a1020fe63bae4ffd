use image::{imageops, imageops::FilterType, DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

/// Height of the blank band under the composite, kept for captions.
const CAPTION_BAND: u32 = 50;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Viewer `{viewer}` is not installed")]
    ViewerMissing { viewer: String },

    #[error("Viewer `{viewer}` failed with {status}")]
    ViewerFailed { viewer: String, status: String },
}

/// Shows two images to the user. Purely presentational; file details are
/// printed by the session through its console.
pub trait ComparisonRenderer {
    fn render_and_display(&mut self, first: &Path, second: &Path) -> Result<(), RenderError>;
}

impl<T: ComparisonRenderer + ?Sized> ComparisonRenderer for Box<T> {
    fn render_and_display(&mut self, first: &Path, second: &Path) -> Result<(), RenderError> {
        (**self).render_and_display(first, second)
    }
}

/// Composes a side-by-side PNG and hands it to a terminal image viewer.
pub struct ViuRenderer {
    viewer: String,
}

impl ViuRenderer {
    pub fn new() -> Self {
        Self::with_viewer("viu")
    }

    pub fn with_viewer(viewer: impl Into<String>) -> Self {
        Self {
            viewer: viewer.into(),
        }
    }
}

impl Default for ViuRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ComparisonRenderer for ViuRenderer {
    fn render_and_display(&mut self, first: &Path, second: &Path) -> Result<(), RenderError> {
        let img1 = image::open(first)?;
        let img2 = image::open(second)?;
        let combined = compose_side_by_side(&img1, &img2);

        // removed when `temp` drops
        let temp = tempfile::Builder::new()
            .prefix("dupcull-")
            .suffix(".png")
            .tempfile()?;
        combined.save_with_format(temp.path(), ImageFormat::Png)?;

        let status = match Command::new(&self.viewer).arg(temp.path()).status() {
            Ok(status) => status,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(RenderError::ViewerMissing {
                    viewer: self.viewer.clone(),
                });
            }
            Err(e) => return Err(RenderError::Io(e)),
        };
        if !status.success() {
            return Err(RenderError::ViewerFailed {
                viewer: self.viewer.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

/// Displays nothing, for terminals without image support.
pub struct TextOnlyRenderer;

impl ComparisonRenderer for TextOnlyRenderer {
    fn render_and_display(&mut self, first: &Path, second: &Path) -> Result<(), RenderError> {
        log::debug!("Image display disabled for {} and {}", first.display(), second.display());
        Ok(())
    }
}

/// Put `first` and `second` next to each other on a white canvas.
///
/// The image with the larger area is scaled down to roughly the area of the
/// other one so neither dominates the comparison.
pub fn compose_side_by_side(first: &DynamicImage, second: &DynamicImage) -> RgbImage {
    let (first, second) = equalize_area(first, second);

    let total_width = first.width() + second.width();
    let max_height = first.height().max(second.height());
    let mut combined = RgbImage::from_pixel(total_width, max_height + CAPTION_BAND, Rgb([255, 255, 255]));

    imageops::overlay(&mut combined, &first.to_rgb8(), 0, 0);
    imageops::overlay(&mut combined, &second.to_rgb8(), i64::from(first.width()), 0);
    combined
}

fn equalize_area(first: &DynamicImage, second: &DynamicImage) -> (DynamicImage, DynamicImage) {
    let area1 = u64::from(first.width()) * u64::from(first.height());
    let area2 = u64::from(second.width()) * u64::from(second.height());

    if area1 > area2 {
        (scale_to_area(first, area2 as f64 / area1 as f64), second.clone())
    } else if area2 > area1 {
        (first.clone(), scale_to_area(second, area1 as f64 / area2 as f64))
    } else {
        (first.clone(), second.clone())
    }
}

fn scale_to_area(img: &DynamicImage, area_ratio: f64) -> DynamicImage {
    let scale = area_ratio.sqrt();
    let (width, height) = img.dimensions();
    let new_width = ((width as f64 * scale) as u32).max(1);
    let new_height = ((height as f64 * scale) as u32).max(1);
    img.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

/// `WxH - N.NKB` for `path`, falling back to whatever is readable.
pub fn caption(path: &Path) -> String {
    let size = fs::metadata(path)
        .map(|m| format!("{:.1}KB", m.len() as f64 / 1024.0))
        .unwrap_or_else(|_| "?KB".to_string());
    match image::image_dimensions(path) {
        Ok((w, h)) => format!("{} ({}x{} - {})", path.display(), w, h, size),
        Err(e) => {
            log::debug!("Could not read dimensions for {}: {}", path.display(), e);
            format!("{} ({})", path.display(), size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;
    use tempfile::TempDir;

    fn solid(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([value, value, value])))
    }

    #[test]
    fn test_compose_equal_sizes() {
        let combined = compose_side_by_side(&solid(40, 30, 0), &solid(40, 30, 0));
        assert_eq!(combined.dimensions(), (80, 30 + CAPTION_BAND));
        // caption band stays white
        assert_eq!(combined.get_pixel(10, 30 + 10), &Rgb([255, 255, 255]));
        assert_eq!(combined.get_pixel(50, 10), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_compose_scales_larger_image_down() {
        let combined = compose_side_by_side(&solid(200, 100, 0), &solid(100, 50, 0));
        // 200x100 shrinks by half on both axes
        assert_eq!(combined.dimensions(), (200, 50 + CAPTION_BAND));
    }

    #[test]
    fn test_caption_includes_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("shot.png");
        solid(12, 8, 100).save(&path).unwrap();

        let text = caption(&path);
        assert!(text.contains("12x8"), "{}", text);
        assert!(text.ends_with("KB)"), "{}", text);
    }

    #[test]
    fn test_text_only_renderer_accepts_missing_files() {
        let temp_dir = TempDir::new().unwrap();
        let gone = temp_dir.path().join("gone.png");
        assert!(TextOnlyRenderer.render_and_display(&gone, &gone).is_ok());
    }

    #[test]
    fn test_missing_viewer_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.png");
        let b = temp_dir.path().join("b.png");
        solid(4, 4, 0).save(&a).unwrap();
        solid(4, 4, 255).save(&b).unwrap();

        let mut renderer = ViuRenderer::with_viewer("dupcull-no-such-viewer");
        let err = renderer.render_and_display(&a, &b).unwrap_err();
        assert!(matches!(err, RenderError::ViewerMissing { .. }));
    }

    #[test]
    fn test_unreadable_image_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.png");
        std::fs::write(&a, b"not an image").unwrap();

        let mut renderer = ViuRenderer::new();
        assert!(renderer.render_and_display(&a, &a).is_err());
    }
}
