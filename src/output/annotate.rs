// 该文件是 Qingjie （清洁） 项目的一部分。
// src/output/annotate.rs - 在照片上绘制检测框并保存
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

use std::path::PathBuf;

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use tracing::{debug, info};

use crate::{
  input::RasterImage,
  output::{OutputError, Render},
  verdict::VerificationVerdict,
};

const BOX_THICKNESS: i32 = 2;
const PALETTE_SIZE: usize = 12;

pub struct AnnotatedImageOutput {
  path: PathBuf,
  colors: Vec<Rgb<u8>>,
}

impl AnnotatedImageOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    let colors = (0..PALETTE_SIZE)
      .map(|i| hsv_to_rgb(i as f32 / PALETTE_SIZE as f32 * 360.0, 0.8, 0.9))
      .collect();
    Self {
      path: path.into(),
      colors,
    }
  }

  /// 绘制所有带框的检测项，返回绘制的框数
  pub fn annotate(&self, image: &mut RgbImage, verdict: &VerificationVerdict) -> usize {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let mut drawn = 0;

    for (idx, item) in verdict.detected_items.iter().enumerate() {
      let Some(bbox) = item.bbox else {
        continue;
      };
      let x_min = (bbox[0].floor() as i32).clamp(0, w - 1);
      let y_min = (bbox[1].floor() as i32).clamp(0, h - 1);
      let x_max = (bbox[2].ceil() as i32).clamp(0, w - 1);
      let y_max = (bbox[3].ceil() as i32).clamp(0, h - 1);
      if x_min >= x_max || y_min >= y_max {
        continue;
      }

      let color = self.colors[idx % self.colors.len()];
      // 边框加粗为 2 像素
      for t in 0..BOX_THICKNESS {
        let width = x_max - x_min - 2 * t;
        let height = y_max - y_min - 2 * t;
        if width <= 0 || height <= 0 {
          break;
        }
        let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32 + 1, height as u32 + 1);
        draw_hollow_rect_mut(image, rect, color);
      }
      debug!("绘制 {} {:.2}: {:?}", item.label, item.confidence, bbox);
      drawn += 1;
    }

    drawn
  }
}

impl Render<RasterImage, VerificationVerdict> for AnnotatedImageOutput {
  type Error = OutputError;

  fn render_result(&self, frame: &RasterImage, result: &VerificationVerdict) -> Result<(), Self::Error> {
    let mut image = frame.as_rgb().clone();
    let drawn = self.annotate(&mut image, result);
    image.save(&self.path)?;
    info!("标注图像已保存: {}（{} 个框）", self.path.display(), drawn);
    Ok(())
  }
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}
