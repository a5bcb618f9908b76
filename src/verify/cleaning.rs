// 该文件是 Qingjie （清洁） 项目的一部分。
// src/verify/cleaning.rs - 清理前后对比
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

use image::{GrayImage, RgbImage, imageops::FilterType};
use tracing::{debug, info, warn};

use super::Verifier;
use crate::{
  heuristic::edge_density,
  input::{DecodeError, RasterImage},
  model::{DetectResult, DetectorError, Model},
  verdict::{AREA_CLEANED, AREA_NOT_CLEANED, CleaningVerdict},
};

/// 灰度逐像素差异得到的相似度（百分比）
pub fn gray_similarity(before: &GrayImage, after: &GrayImage) -> f64 {
  let pixels = before.as_raw().len();
  if pixels == 0 {
    return 100.0;
  }
  let sum: u64 = before
    .as_raw()
    .iter()
    .zip(after.as_raw())
    .map(|(&a, &b)| a.abs_diff(b) as u64)
    .sum();
  100.0 - sum as f64 / (pixels as f64 * 255.0) * 100.0
}

impl<M> Verifier<M>
where
  M: Model<Input = RgbImage, Output = DetectResult, Error = DetectorError>,
{
  /// 核验清理前后的两张 Base64 照片
  pub fn verify_cleaning(&self, before: &str, after: &str) -> CleaningVerdict {
    let decoded = self
      .decoder
      .decode(before)
      .and_then(|before| Ok((before, self.decoder.decode(after)?)));
    match decoded {
      Ok((before, after)) => self.compare(&before, &after),
      Err(e) => {
        warn!("清理照片解码失败: {}", e);
        CleaningVerdict::failed(e)
      }
    }
  }

  /// 比较两张已解码的图像
  pub fn compare(&self, before: &RasterImage, after: &RasterImage) -> CleaningVerdict {
    if before.is_empty() || after.is_empty() {
      let (width, height) = if before.is_empty() { before.dimensions() } else { after.dimensions() };
      return CleaningVerdict::failed(DecodeError::InvalidDimensions { width, height });
    }

    // 尺寸不同时把清理后照片缩放到清理前的尺寸
    let aligned;
    let after = if after.dimensions() != before.dimensions() {
      debug!(
        "对齐图像尺寸: {:?} -> {:?}",
        after.dimensions(),
        before.dimensions()
      );
      aligned = RasterImage::from(image::imageops::resize(
        after.as_rgb(),
        before.width(),
        before.height(),
        FilterType::Nearest,
      ));
      &aligned
    } else {
      after
    };

    let before_gray = before.to_gray();
    let after_gray = after.to_gray();

    let similarity = gray_similarity(&before_gray, &after_gray);
    let difference = 100.0 - similarity;
    let cleaning = &self.config.cleaning;
    let mut is_cleaned = difference > cleaning.difference_threshold;

    let heuristic = &self.config.heuristic;
    let before_edges = edge_density(&before_gray, heuristic.canny_low, heuristic.canny_high);
    let after_edges = edge_density(&after_gray, heuristic.canny_low, heuristic.canny_high);
    let clutter_reduced = after_edges < before_edges * cleaning.edge_ratio;
    debug!(
      "清理对比: 相似度={:.2}, 差异={:.2}, 边缘密度 {:.4} -> {:.4}",
      similarity, difference, before_edges, after_edges
    );
    is_cleaned |= clutter_reduced;

    let before_result = self.run_detector(before);
    let after_result = self.run_detector(after);
    let counts_before = before_result.as_ref().map_or(0, DetectResult::len);
    let counts_after = after_result.as_ref().map_or(0, DetectResult::len);

    if let (Some(before_result), Some(after_result)) = (&before_result, &after_result) {
      if !before_result.is_empty() {
        let objects_removed = after_result.is_empty()
          || after_result.top_score() < before_result.top_score() * cleaning.detector_score_ratio;
        if objects_removed {
          debug!("检测器确认物体已移除: {} -> {}", counts_before, counts_after);
        }
        is_cleaned |= objects_removed;
      }
    }

    info!(
      "清理核验: is_cleaned={}, 差异={:.2}%, 检测数 {} -> {}",
      is_cleaned, difference, counts_before, counts_after
    );

    CleaningVerdict {
      is_cleaned,
      similarity,
      difference,
      detector_counts_before: counts_before,
      detector_counts_after: counts_after,
      message: if is_cleaned { AREA_CLEANED } else { AREA_NOT_CLEANED }.to_string(),
    }
  }
}
