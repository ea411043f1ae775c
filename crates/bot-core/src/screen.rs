//! Captured frames and their PNG encoding.

use std::io::Cursor;
use std::path::Path;

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, RgbImage};

pub const LCD_WIDTH: u32 = 160;
pub const LCD_HEIGHT: u32 = 144;

/// An RGB8 pixel grid, row-major, captured at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> anyhow::Result<Self> {
        if width == 0 || height == 0 {
            anyhow::bail!("frame dimensions must be nonzero, got {width}x{height}");
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(3))
            .ok_or_else(|| anyhow::anyhow!("frame {width}x{height} is too large"))?;
        if rgb.len() != expected {
            anyhow::bail!(
                "frame {width}x{height} needs {expected} rgb bytes, got {}",
                rgb.len()
            );
        }
        Ok(Self { width, height, rgb })
    }

    /// A uniformly filled frame of the LCD size.
    pub fn solid(rgb: [u8; 3]) -> Self {
        let pixels = LCD_WIDTH as usize * LCD_HEIGHT as usize;
        Self {
            width: LCD_WIDTH,
            height: LCD_HEIGHT,
            rgb: rgb.repeat(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }

    fn to_image(&self) -> anyhow::Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.rgb.clone())
            .ok_or_else(|| anyhow::anyhow!("frame buffer does not match its dimensions"))
    }

    /// Lossless PNG bytes.
    pub fn encode_png(&self) -> anyhow::Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.to_image()?
            .write_to(&mut out, ImageFormat::Png)
            .context("png encode failed")?;
        Ok(out.into_inner())
    }

    /// PNG bytes as standard base64, for embedding in a request payload.
    pub fn encode_png_base64(&self) -> anyhow::Result<String> {
        Ok(STANDARD.encode(self.encode_png()?))
    }

    pub fn save_png(&self, path: &Path) -> anyhow::Result<()> {
        self.to_image()?
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("write screenshot {}", path.display()))
    }
}
