// 该文件是 Qingjie （清洁） 项目的一部分。
// src/input.rs - Base64 图像载荷解码
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, GrayImage, ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, warn};

/// 默认最大像素数（4000 万像素）
pub const DEFAULT_MAX_PIXELS: u64 = 40_000_000;

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("no image data provided")]
  Empty,
  #[error("expected base64 image data, received a URL instead")]
  UrlPayload,
  #[error("invalid base64 data: {0}")]
  Base64(#[from] base64::DecodeError),
  #[error("unsupported or corrupt image: {0}")]
  Image(#[from] image::ImageError),
  #[error("failed to read image: {0}")]
  Io(#[from] std::io::Error),
  #[error("invalid image dimensions: {width}x{height}")]
  InvalidDimensions { width: u32, height: u32 },
  #[error("image too large: {width}x{height} pixels (max: {max})")]
  TooLarge { width: u32, height: u32, max: u64 },
}

/// 解码后的 RGB 图像，通道数固定为 3
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
  image: RgbImage,
}

impl From<RgbImage> for RasterImage {
  fn from(image: RgbImage) -> Self {
    Self { image }
  }
}

impl From<DynamicImage> for RasterImage {
  // 丢弃 alpha 通道，灰度图提升为 RGB
  fn from(image: DynamicImage) -> Self {
    Self {
      image: image.to_rgb8(),
    }
  }
}

impl RasterImage {
  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.image.dimensions()
  }

  pub fn pixel_count(&self) -> u64 {
    self.width() as u64 * self.height() as u64
  }

  pub fn is_empty(&self) -> bool {
    self.pixel_count() == 0
  }

  pub fn as_rgb(&self) -> &RgbImage {
    &self.image
  }

  pub fn into_rgb(self) -> RgbImage {
    self.image
  }

  pub fn to_gray(&self) -> GrayImage {
    image::imageops::grayscale(&self.image)
  }
}

/// Base64 载荷解码器
#[derive(Debug, Clone, Copy)]
pub struct Base64Decoder {
  max_pixels: u64,
}

impl Default for Base64Decoder {
  fn default() -> Self {
    Self {
      max_pixels: DEFAULT_MAX_PIXELS,
    }
  }
}

impl Base64Decoder {
  pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
    self.max_pixels = max_pixels;
    self
  }

  pub fn max_pixels(&self) -> u64 {
    self.max_pixels
  }

  /// 将 Base64（可带 data URI 前缀）解码为 RGB 图像。
  ///
  /// 缺失的 `=` 填充会自动补齐；URL 形式的载荷直接拒绝。
  pub fn decode(&self, payload: &str) -> Result<RasterImage, DecodeError> {
    let payload = payload.trim();
    if payload.is_empty() {
      return Err(DecodeError::Empty);
    }
    if is_url(payload) {
      warn!("图像载荷是 URL 而不是 Base64 数据");
      return Err(DecodeError::UrlPayload);
    }

    let body = normalize_base64(strip_data_uri(payload));
    if body.is_empty() {
      return Err(DecodeError::Empty);
    }
    let bytes = STANDARD.decode(body.as_bytes())?;
    debug!("Base64 解码完成: {:.2} KB", bytes.len() as f64 / 1024.0);

    // 先读取尺寸，避免解码超大图像
    let (width, height) = ImageReader::new(Cursor::new(&bytes))
      .with_guessed_format()?
      .into_dimensions()?;
    if width == 0 || height == 0 {
      return Err(DecodeError::InvalidDimensions { width, height });
    }
    if width as u64 * height as u64 > self.max_pixels {
      return Err(DecodeError::TooLarge {
        width,
        height,
        max: self.max_pixels,
      });
    }

    let image = ImageReader::new(Cursor::new(&bytes))
      .with_guessed_format()?
      .decode()?;
    debug!("图像解码完成: {}x{} {:?}", width, height, image.color());

    Ok(RasterImage::from(image))
  }
}

/// 使用默认配置解码
pub fn decode(payload: &str) -> Result<RasterImage, DecodeError> {
  Base64Decoder::default().decode(payload)
}

fn is_url(payload: &str) -> bool {
  let head = payload.get(..8).unwrap_or(payload).to_ascii_lowercase();
  head.starts_with("http://") || head.starts_with("https://")
}

// "data:image/jpeg;base64,<data>" 只保留第一个逗号之后的部分
fn strip_data_uri(payload: &str) -> &str {
  match payload.split_once(',') {
    Some((prefix, data)) if prefix.contains("base64") => data,
    _ => payload,
  }
}

fn normalize_base64(body: &str) -> String {
  let mut normalized: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
  let remainder = normalized.len() % 4;
  if remainder != 0 {
    normalized.extend(std::iter::repeat_n('=', 4 - remainder));
  }
  normalized
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{GrayImage, ImageFormat, Luma, Rgb, Rgba, RgbaImage};

  fn encode_png(image: DynamicImage) -> String {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    STANDARD.encode(buf.into_inner())
  }

  fn red_square() -> String {
    encode_png(DynamicImage::ImageRgb8(RgbImage::from_pixel(
      8,
      6,
      Rgb([255, 0, 0]),
    )))
  }

  #[test]
  fn decodes_plain_base64() {
    let image = decode(&red_square()).unwrap();
    assert_eq!(image.dimensions(), (8, 6));
    assert_eq!(image.as_rgb().get_pixel(3, 3), &Rgb([255, 0, 0]));
  }

  #[test]
  fn strips_data_uri_prefix() {
    let payload = format!("data:image/png;base64,{}", red_square());
    assert_eq!(decode(&payload).unwrap().dimensions(), (8, 6));
  }

  #[test]
  fn tolerates_missing_padding_and_line_breaks() {
    let encoded = red_square();
    let trimmed = encoded.trim_end_matches('=');
    let wrapped: String = trimmed
      .as_bytes()
      .chunks(60)
      .map(|c| std::str::from_utf8(c).unwrap())
      .collect::<Vec<_>>()
      .join("\n");
    assert_eq!(decode(&wrapped).unwrap().dimensions(), (8, 6));
  }

  #[test]
  fn rejects_urls() {
    assert!(matches!(
      decode("https://res.cloudinary.com/demo/image/upload/sample.jpg"),
      Err(DecodeError::UrlPayload)
    ));
    assert!(matches!(
      decode("HTTP://example.com/a.png"),
      Err(DecodeError::UrlPayload)
    ));
  }

  #[test]
  fn rejects_empty_and_invalid_payloads() {
    assert!(matches!(decode("   "), Err(DecodeError::Empty)));
    assert!(matches!(decode("data:image/png;base64,"), Err(DecodeError::Empty)));
    assert!(matches!(decode("!!not base64!!"), Err(DecodeError::Base64(_))));
  }

  #[test]
  fn rejects_bytes_that_are_not_an_image() {
    let payload = STANDARD.encode(b"definitely not a picture");
    assert!(decode(&payload).is_err());
  }

  #[test]
  fn coerces_gray_and_rgba_to_rgb() {
    let gray = encode_png(DynamicImage::ImageLuma8(GrayImage::from_pixel(
      4,
      4,
      Luma([77]),
    )));
    let image = decode(&gray).unwrap();
    assert_eq!(image.as_rgb().get_pixel(0, 0), &Rgb([77, 77, 77]));

    let rgba = encode_png(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
      4,
      4,
      Rgba([10, 20, 30, 0]),
    )));
    let image = decode(&rgba).unwrap();
    assert_eq!(image.as_rgb().get_pixel(1, 1), &Rgb([10, 20, 30]));
  }

  #[test]
  fn enforces_pixel_budget() {
    let decoder = Base64Decoder::default().with_max_pixels(16);
    assert!(matches!(
      decoder.decode(&red_square()),
      Err(DecodeError::TooLarge {
        width: 8,
        height: 6,
        ..
      })
    ));
  }
}
