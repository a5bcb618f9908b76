// 该文件是 Qingjie （清洁） 项目的一部分。
// src/verify/garbage.rs - 垃圾照片核验
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

use image::RgbImage;
use tracing::{info, warn};

use super::Verifier;
use crate::{
  category::WasteCategory,
  input::{DecodeError, RasterImage},
  model::{DetectResult, DetectorError, Model},
  verdict::{
    DetectedItem, GARBAGE_NOT_FOUND, VerdictSource, VerificationVerdict, WASTE_AREA_LABEL, round2,
  },
};

impl<M> Verifier<M>
where
  M: Model<Input = RgbImage, Output = DetectResult, Error = DetectorError>,
{
  /// 核验一张 Base64 编码的垃圾照片
  pub fn verify_garbage(&self, payload: &str) -> VerificationVerdict {
    match self.decoder.decode(payload) {
      Ok(image) => self.verify_garbage_image(&image),
      Err(e) => {
        warn!("图像解码失败: {}", e);
        VerificationVerdict::rejected(e)
      }
    }
  }

  /// 核验已解码的图像
  pub fn verify_garbage_image(&self, image: &RasterImage) -> VerificationVerdict {
    if image.is_empty() {
      let (width, height) = image.dimensions();
      return VerificationVerdict::rejected(DecodeError::InvalidDimensions { width, height });
    }

    let verdict = match self.run_detector(image) {
      Some(result) if !result.is_empty() => detector_verdict(&result),
      _ => self.heuristic_verdict(image),
    };
    info!(
      "垃圾核验: is_garbage={}, confidence={:.2}, 类别={:?}, 来源={:?}",
      verdict.is_garbage, verdict.confidence, verdict.waste_type, verdict.source
    );
    verdict
  }

  fn heuristic_verdict(&self, image: &RasterImage) -> VerificationVerdict {
    let heuristic = self.config.heuristic.classify(image);
    if heuristic.is_garbage {
      VerificationVerdict {
        is_garbage: true,
        confidence: heuristic.confidence,
        waste_type: Some(WasteCategory::Mixed),
        detected_items: vec![DetectedItem {
          label: WASTE_AREA_LABEL.to_string(),
          confidence: round2(heuristic.confidence),
          bbox: None,
        }],
        message: "Waste area detected (basic detection)".to_string(),
        source: VerdictSource::Heuristic,
      }
    } else {
      VerificationVerdict {
        is_garbage: false,
        confidence: heuristic.confidence,
        waste_type: Some(WasteCategory::Mixed),
        detected_items: Vec::new(),
        message: GARBAGE_NOT_FOUND.to_string(),
        source: VerdictSource::Heuristic,
      }
    }
  }
}

fn detector_verdict(result: &DetectResult) -> VerificationVerdict {
  let category = result.category();

  let mut labels: Vec<&str> = Vec::new();
  for label in result.labels() {
    if !labels.contains(&label) {
      labels.push(label);
    }
  }

  VerificationVerdict {
    is_garbage: true,
    confidence: result.top_score().clamp(0.0, 1.0),
    waste_type: Some(category),
    detected_items: result.items.iter().map(DetectedItem::from).collect(),
    message: format!("Garbage detected ({}): {}", category, labels.join(", ")),
    source: VerdictSource::Detector,
  }
}
