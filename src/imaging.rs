//! Metadata and resize collaborators.
//!
//! The pipeline talks to image processing through the [`ImageProbe`] and
//! [`ImageScaler`] traits; [`ImagingBackend`] implements both on the pure
//! Rust `image` crate, with EXIF via `kamadak-exif`. Decode and encode are
//! CPU-bound, so the backend runs them under `spawn_blocking` to keep the
//! async pool responsive.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{ColorType, DynamicImage, ImageFormat, ImageReader};

use crate::error::{UploadError, UploadResult};
use crate::types::ImageMetadata;

/// Knobs for metadata extraction
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeOptions {
    /// Include the EXIF block in the result
    pub want_exif: bool,
    /// Report orientation-corrected dimensions
    pub auto_orient: bool,
}

/// Reads source image properties.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn read(&self, path: &Path, opts: ProbeOptions) -> UploadResult<ImageMetadata>;
}

/// Target geometry and encoding for one resize.
#[derive(Debug, Clone)]
pub struct ResizeTarget {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// Encode quality 1-100 (JPEG only)
    pub quality: u8,
    /// Output format as a file extension; inferred from the output path if unset
    pub format: Option<String>,
}

/// A rendered variant written to local disk.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub path: PathBuf,
    /// Achieved width; the scaler picks the binding dimension
    pub width: u32,
    pub height: u32,
}

/// Renders one resized variant of a source image.
#[async_trait]
pub trait ImageScaler: Send + Sync {
    /// Render `source` into `output` within the target bounds, preserving
    /// aspect ratio, and report the achieved dimensions.
    async fn scale(
        &self,
        source: &Path,
        output: &Path,
        target: &ResizeTarget,
    ) -> UploadResult<RenderedImage>;
}

/// Pure Rust probe + scaler on the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagingBackend;

impl ImagingBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageProbe for ImagingBackend {
    async fn read(&self, path: &Path, opts: ProbeOptions) -> UploadResult<ImageMetadata> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || probe_blocking(&path, opts))
            .await
            .map_err(|e| UploadError::Internal(format!("probe task failed: {e}")))?
    }
}

#[async_trait]
impl ImageScaler for ImagingBackend {
    async fn scale(
        &self,
        source: &Path,
        output: &Path,
        target: &ResizeTarget,
    ) -> UploadResult<RenderedImage> {
        let source = source.to_path_buf();
        let output = output.to_path_buf();
        let target = target.clone();
        tokio::task::spawn_blocking(move || scale_blocking(&source, &output, &target))
            .await
            .map_err(|e| UploadError::Internal(format!("resize task failed: {e}")))?
    }
}

fn probe_blocking(path: &Path, opts: ProbeOptions) -> UploadResult<ImageMetadata> {
    let size_bytes = std::fs::metadata(path)?.len();

    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader.format().ok_or_else(|| {
        UploadError::metadata(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unrecognized image format: {}", path.display()),
        ))
    })?;
    let img = reader.decode().map_err(UploadError::metadata)?;

    let (mut width, mut height) = (img.width(), img.height());
    let (exif, orientation) = read_exif(path, opts.want_exif);

    // Orientations 5-8 rotate by 90 degrees, swapping the rendered axes.
    if opts.auto_orient && matches!(orientation, Some(5..=8)) {
        std::mem::swap(&mut width, &mut height);
    }

    Ok(ImageMetadata {
        width,
        height,
        format: primary_extension(format).to_string(),
        size_bytes,
        colorspace: colorspace_name(img.color()).to_string(),
        exif,
    })
}

fn scale_blocking(source: &Path, output: &Path, target: &ResizeTarget) -> UploadResult<RenderedImage> {
    let img = ImageReader::open(source)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| UploadError::resize(None, e))?;

    let max_width = target.max_width.unwrap_or(u32::MAX);
    let max_height = target.max_height.unwrap_or(u32::MAX);
    let resized = if img.width() <= max_width && img.height() <= max_height {
        img
    } else {
        img.thumbnail(max_width, max_height)
    };

    let format = match &target.format {
        Some(ext) => ImageFormat::from_extension(ext).ok_or_else(|| {
            UploadError::resize(
                None,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("unsupported output format: {ext}"),
                ),
            )
        })?,
        None => ImageFormat::from_path(output).map_err(|e| UploadError::resize(None, e))?,
    };

    match format {
        ImageFormat::Jpeg => {
            // The JPEG encoder rejects alpha channels.
            let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
            let mut file = File::create(output)?;
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut file, target.quality);
            rgb.write_with_encoder(encoder)
                .map_err(|e| UploadError::resize(None, e))?;
            Ok(RenderedImage {
                path: output.to_path_buf(),
                width: rgb.width(),
                height: rgb.height(),
            })
        }
        other => {
            resized
                .save_with_format(output, other)
                .map_err(|e| UploadError::resize(None, e))?;
            Ok(RenderedImage {
                path: output.to_path_buf(),
                width: resized.width(),
                height: resized.height(),
            })
        }
    }
}

/// EXIF block and orientation, when present. A missing or unreadable EXIF
/// segment is not an error.
fn read_exif(path: &Path, want_fields: bool) -> (Option<BTreeMap<String, String>>, Option<u32>) {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return (None, None),
    };
    let exif = match exif::Reader::new().read_from_container(&mut BufReader::new(file)) {
        Ok(e) => e,
        Err(_) => return (None, None),
    };

    let orientation = exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0));

    let fields = want_fields.then(|| {
        exif.fields()
            .map(|f| (f.tag.to_string(), f.display_value().with_unit(&exif).to_string()))
            .collect()
    });

    (fields, orientation)
}

/// Primary file extension for a decoded format, e.g. Jpeg → "jpg"
fn primary_extension(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("bin")
}

fn colorspace_name(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 | ColorType::L16 => "Gray",
        ColorType::La8 | ColorType::La16 => "GrayA",
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB",
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA",
        _ => "Unknown",
    }
}
