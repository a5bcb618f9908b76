// 该文件是 Qingjie （清洁） 项目的一部分。
// src/frame.rs - Letterbox NCHW 推理帧
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

use image::{RgbImage, imageops::FilterType};
use ndarray::{Array3, Array4, Axis};
use thiserror::Error;

const RGB_CHANNELS: usize = 3;

/// 填充边框的灰度值
pub const LETTERBOX_FILL: u8 = 114;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("图像尺寸无效: {0}x{1}")]
  InvalidDimensions(u32, u32),
}

/// Letterbox 变换参数，用于把推理空间坐标映射回原图
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub scale: f32,
  pub pad_x: u32,
  pub pad_y: u32,
  pub orig_w: u32,
  pub orig_h: u32,
}

impl Letterbox {
  pub fn new(orig_w: u32, orig_h: u32, size: u32) -> Result<Self, FrameError> {
    if orig_w == 0 || orig_h == 0 || size == 0 {
      return Err(FrameError::InvalidDimensions(orig_w, orig_h));
    }
    let scale = (size as f32 / orig_w as f32).min(size as f32 / orig_h as f32);
    let (new_w, new_h) = Self::resized(orig_w, orig_h, scale, size);
    Ok(Self {
      scale,
      pad_x: (size - new_w) / 2,
      pad_y: (size - new_h) / 2,
      orig_w,
      orig_h,
    })
  }

  fn resized(orig_w: u32, orig_h: u32, scale: f32, size: u32) -> (u32, u32) {
    let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, size);
    (new_w, new_h)
  }

  /// 缩放后（未填充）的图像尺寸
  pub fn content_size(&self, size: u32) -> (u32, u32) {
    Self::resized(self.orig_w, self.orig_h, self.scale, size)
  }

  /// 将 letterbox 空间的 [x1, y1, x2, y2] 映射回原图像素坐标
  pub fn unmap_box(&self, bbox: [f32; 4]) -> [f32; 4] {
    let (w, h) = (self.orig_w as f32, self.orig_h as f32);
    let x = |v: f32| ((v - self.pad_x as f32) / self.scale).clamp(0.0, w);
    let y = |v: f32| ((v - self.pad_y as f32) / self.scale).clamp(0.0, h);
    [x(bbox[0]), y(bbox[1]), x(bbox[2]), y(bbox[3])]
  }
}

/// 边长为 `S` 的正方形 NCHW 浮点帧，像素归一化到 [0, 1]
#[derive(Debug, Clone)]
pub struct LetterboxFrame<const S: u32> {
  data: Array4<f32>,
  letterbox: Letterbox,
}

impl<const S: u32> LetterboxFrame<S> {
  /// 保持宽高比缩放到 `S`x`S`，其余部分填充灰色
  pub fn from_image(image: &RgbImage) -> Result<Self, FrameError> {
    let (orig_w, orig_h) = image.dimensions();
    let letterbox = Letterbox::new(orig_w, orig_h, S)?;
    let (new_w, new_h) = letterbox.content_size(S);

    let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let size = S as usize;
    let mut canvas = Array3::<f32>::from_elem(
      (RGB_CHANNELS, size, size),
      LETTERBOX_FILL as f32 / 255.0,
    );
    let (off_x, off_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
    for (x, y, pixel) in resized.enumerate_pixels() {
      let (cx, cy) = (off_x + x as usize, off_y + y as usize);
      for c in 0..RGB_CHANNELS {
        canvas[[c, cy, cx]] = pixel[c] as f32 / 255.0;
      }
    }

    Ok(Self {
      data: canvas.insert_axis(Axis(0)),
      letterbox,
    })
  }

  pub fn size(&self) -> usize {
    S as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn letterbox(&self) -> Letterbox {
    self.letterbox
  }

  pub fn as_nchw(&self) -> &Array4<f32> {
    &self.data
  }

  pub fn into_parts(self) -> (Array4<f32>, Letterbox) {
    (self.data, self.letterbox)
  }
}
