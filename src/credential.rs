use base64::{Engine, engine::general_purpose::STANDARD};
use handlebars::html_escape;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use lazy_static::lazy_static;
use qrcode::{EcLevel, QrCode};
use regex::Regex;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::Result;

lazy_static! {
    static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).unwrap();
}

/// Pixel size of one QR module in a generated credential
const MODULE_PIXELS: u32 = 10;

/// A generated login credential: a QR code of the owner's email
#[derive(Debug, Clone)]
pub struct CredentialImage {
    /// Where the PNG was written
    pub path: PathBuf,
    /// Encoded PNG bytes
    pub png: Vec<u8>,
}

impl CredentialImage {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// `data:` URI embedding the PNG, usable as an `<img src>` or download link
    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }

    /// HTML anchor that downloads the credential under its file name
    pub fn download_link(&self) -> String {
        format!(
            r#"<a href="{}" download="{}">Download QR Code</a>"#,
            self.data_uri(),
            html_escape(&self.file_name())
        )
    }
}

/// Location of the credential image for `email`
///
/// Deterministic in the email, so issuing again for the same address
/// overwrites the earlier image.
pub fn credential_path(dir: &Path, email: &str) -> PathBuf {
    let stem = UNSAFE_FILENAME_CHARS.replace_all(email.trim(), "_");
    dir.join(format!("{stem}.png"))
}

/// Render `email` as a QR code PNG
///
/// Low error correction, 10 px modules and the standard 4-module quiet zone.
pub fn render_png(email: &str) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(email.as_bytes(), EcLevel::L)?;
    let img: GrayImage = code
        .render::<Luma<u8>>()
        .module_dimensions(MODULE_PIXELS, MODULE_PIXELS)
        .quiet_zone(true)
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(img).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

/// Generate the credential image for `email` and write it under `dir`
///
/// The directory is created on first use.
pub fn issue(dir: &Path, email: &str) -> Result<CredentialImage> {
    let png = render_png(email)?;
    fs::create_dir_all(dir)?;

    let path = credential_path(dir, email);
    fs::write(&path, &png)?;

    Ok(CredentialImage { path, png })
}

/// A single grayscale camera frame
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    luma: Vec<u8>,
}

impl Frame {
    pub fn from_gray(img: GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Frame {
            width,
            height,
            luma: img.into_raw(),
        }
    }

    pub fn from_image(img: &DynamicImage) -> Self {
        Self::from_gray(img.to_luma8())
    }

    /// Decode an encoded image (PNG, JPEG, ...) into a frame
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::from_image(&image::load_from_memory(bytes)?))
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_image(&image::open(path)?))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Look for QR codes in a frame and return the first payload that decodes
///
/// When several codes are visible the detector's order decides which wins.
pub fn decode(frame: &Frame) -> Option<String> {
    let (w, h) = (frame.width as usize, frame.height as usize);
    if w == 0 || h == 0 {
        return None;
    }

    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| frame.luma[y * w + x]);
    prepared
        .detect_grids()
        .into_iter()
        .find_map(|grid| grid.decode().ok().map(|(_, content)| content))
}
