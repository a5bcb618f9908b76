// 该文件是 Qingjie （清洁） 项目的一部分。
// src/heuristic.rs - 基于图像复杂度的启发式垃圾判定
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

use image::{GrayImage, RgbImage};
use imageproc::{
  filter::laplacian_filter,
  gradients::{horizontal_sobel, vertical_sobel},
};
use tracing::{debug, warn};

use crate::{
  config::{HeuristicConfig, Strictness},
  input::RasterImage,
};

/// 三项图像复杂度指标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStats {
  /// Canny 边缘像素占比
  pub edge_density: f64,
  /// RGB 原始值方差
  pub color_variance: f64,
  /// 拉普拉斯响应方差
  pub texture_variance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicVerdict {
  pub is_garbage: bool,
  pub confidence: f32,
  /// 超过阈值的指标个数（0..=3）
  pub score: u8,
  pub stats: Option<ImageStats>,
}

impl HeuristicVerdict {
  fn rejected() -> Self {
    Self {
      is_garbage: false,
      confidence: 0.0,
      score: 0,
      stats: None,
    }
  }
}

/// tan(22.5°)，梯度方向量化到 0°/45°/90°/135° 四个区间
const TAN_22_5: f32 = 0.414_213_57;
/// tan(67.5°)
const TAN_67_5: f32 = 2.414_213_6;

/// Canny 边缘像素占比
///
/// 直接在灰度图上做 3x3 Sobel（不预先模糊），梯度幅值取 L1 范数 `|gx| + |gy|`，
/// 经非极大值抑制后以 `low`/`high` 双阈值做 8 邻域滞后连接。
pub fn edge_density(gray: &GrayImage, low: f32, high: f32) -> f64 {
  let total = gray.width() as u64 * gray.height() as u64;
  if total == 0 {
    return 0.0;
  }
  let count = canny_edges(gray, low, high).into_iter().filter(|&e| e).count();
  count as f64 / total as f64
}

/// 返回逐像素（行优先）的边缘标记
fn canny_edges(gray: &GrayImage, low: f32, high: f32) -> Vec<bool> {
  let (w, h) = (gray.width() as usize, gray.height() as usize);
  let gx = horizontal_sobel(gray);
  let gy = vertical_sobel(gray);
  let (gx, gy) = (gx.as_raw(), gy.as_raw());
  let magnitude: Vec<f32> = gx
    .iter()
    .zip(gy.iter())
    .map(|(&x, &y)| (x as i32).abs() as f32 + (y as i32).abs() as f32)
    .collect();

  // 图像外的幅值视为 0
  let mag = |x: isize, y: isize| -> f32 {
    if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
      0.0
    } else {
      magnitude[y as usize * w + x as usize]
    }
  };

  // 非极大值抑制：0 = 非边缘，1 = 弱边缘，2 = 强边缘
  let mut class = vec![0u8; w * h];
  for y in 0..h {
    for x in 0..w {
      let i = y * w + x;
      let m = magnitude[i];
      if m <= low {
        continue;
      }
      let (dx, dy) = (gx[i] as f32, gy[i] as f32);
      let (ax, ay) = (dx.abs(), dy.abs());
      let (xi, yi) = (x as isize, y as isize);
      let is_max = if ay < ax * TAN_22_5 {
        m > mag(xi - 1, yi) && m >= mag(xi + 1, yi)
      } else if ay > ax * TAN_67_5 {
        m > mag(xi, yi - 1) && m >= mag(xi, yi + 1)
      } else {
        let s = if (dx < 0.0) != (dy < 0.0) { -1 } else { 1 };
        m > mag(xi - s, yi - 1) && m > mag(xi + s, yi + 1)
      };
      if is_max {
        class[i] = if m > high { 2 } else { 1 };
      }
    }
  }

  // 滞后连接：从强边缘出发，沿 8 邻域吸收弱边缘
  let mut edges = vec![false; w * h];
  let mut stack: Vec<usize> = (0..w * h).filter(|&i| class[i] == 2).collect();
  for &i in &stack {
    edges[i] = true;
  }
  while let Some(i) = stack.pop() {
    let (x, y) = ((i % w) as isize, (i / w) as isize);
    for ny in y - 1..=y + 1 {
      for nx in x - 1..=x + 1 {
        if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
          continue;
        }
        let j = ny as usize * w + nx as usize;
        if class[j] == 1 && !edges[j] {
          edges[j] = true;
          stack.push(j);
        }
      }
    }
  }
  edges
}

/// 全部 RGB 分量的方差
pub fn color_variance(rgb: &RgbImage) -> f64 {
  variance(rgb.as_raw().iter().map(|&v| v as f64))
}

/// 拉普拉斯（二阶导数）响应的方差
pub fn texture_variance(gray: &GrayImage) -> f64 {
  let response = laplacian_filter(gray);
  variance(response.as_raw().iter().map(|&v| v as f64))
}

fn variance(values: impl Iterator<Item = f64>) -> f64 {
  let (mut n, mut sum, mut sum_sq) = (0u64, 0.0f64, 0.0f64);
  for v in values {
    n += 1;
    sum += v;
    sum_sq += v * v;
  }
  if n == 0 {
    return 0.0;
  }
  let mean = sum / n as f64;
  (sum_sq / n as f64 - mean * mean).max(0.0)
}

impl HeuristicConfig {
  /// 计算三项指标；空图像返回 `None`
  pub fn stats(&self, image: &RasterImage) -> Option<ImageStats> {
    if image.is_empty() {
      return None;
    }
    let gray = image.to_gray();
    Some(ImageStats {
      edge_density: edge_density(&gray, self.canny_low, self.canny_high),
      color_variance: color_variance(image.as_rgb()),
      texture_variance: texture_variance(&gray),
    })
  }

  /// 根据指标计算得分与结论
  pub fn judge(&self, stats: ImageStats) -> HeuristicVerdict {
    let score = [
      stats.edge_density > self.edge_density_cutoff,
      stats.color_variance > self.color_variance_cutoff,
      stats.texture_variance > self.texture_variance_cutoff,
    ]
    .into_iter()
    .filter(|&hit| hit)
    .count() as u8;

    let blend = score as f32 / 3.0 + 0.3;
    let is_garbage = match self.strictness {
      Strictness::Strict => score >= 2,
      Strictness::Lenient => blend >= 0.5,
    };

    HeuristicVerdict {
      is_garbage,
      confidence: blend.min(self.max_confidence),
      score,
      stats: Some(stats),
    }
  }

  pub fn classify(&self, image: &RasterImage) -> HeuristicVerdict {
    let Some(stats) = self.stats(image) else {
      warn!("图像为空，启发式判定直接拒绝");
      return HeuristicVerdict::rejected();
    };
    let verdict = self.judge(stats);
    debug!(
      "启发式判定: 边缘密度={:.4}, 颜色方差={:.1}, 纹理方差={:.1}, 得分={}, 结论={}",
      stats.edge_density, stats.color_variance, stats.texture_variance, verdict.score, verdict.is_garbage
    );
    verdict
  }
}

/// 使用默认阈值（严格模式）判定，返回 `(是否垃圾, 置信度)`
pub fn heuristic_classify(image: &RasterImage) -> (bool, f32) {
  let verdict = HeuristicConfig::default().classify(image);
  (verdict.is_garbage, verdict.confidence)
}
