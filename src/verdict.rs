// 该文件是 Qingjie （清洁） 项目的一部分。
// src/verdict.rs - 核验结论
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

use serde::{Deserialize, Serialize};

use crate::{category::WasteCategory, model::DetectItem};

pub const GARBAGE_NOT_FOUND: &str = "No garbage detected. Please take a clearer photo of waste area.";
pub const AREA_CLEANED: &str = "Area successfully cleaned!";
pub const AREA_NOT_CLEANED: &str = "Please ensure the area is properly cleaned.";
pub const WASTE_AREA_LABEL: &str = "waste area";

/// 保留两位小数
pub(crate) fn round2(value: f32) -> f32 {
  (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedItem {
  pub label: String,
  pub confidence: f32,
  #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
  pub bbox: Option<[f32; 4]>,
}

impl From<&DetectItem> for DetectedItem {
  fn from(item: &DetectItem) -> Self {
    Self {
      label: item.label().to_string(),
      confidence: round2(item.score),
      bbox: Some(item.bbox),
    }
  }
}

/// 结论来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerdictSource {
  Detector,
  Heuristic,
  /// 输入无法解码
  #[default]
  Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationVerdict {
  pub is_garbage: bool,
  pub confidence: f32,
  #[serde(rename = "wasteType")]
  pub waste_type: Option<WasteCategory>,
  pub detected_items: Vec<DetectedItem>,
  pub message: String,
  #[serde(skip)]
  pub source: VerdictSource,
}

impl VerificationVerdict {
  /// 输入解码或处理失败时的结论
  pub fn rejected(reason: impl std::fmt::Display) -> Self {
    Self {
      is_garbage: false,
      confidence: 0.0,
      waste_type: None,
      detected_items: Vec::new(),
      message: format!("Error processing image: {}", reason),
      source: VerdictSource::Rejected,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningVerdict {
  pub is_cleaned: bool,
  pub similarity: f64,
  pub difference: f64,
  pub detector_counts_before: usize,
  pub detector_counts_after: usize,
  pub message: String,
}

impl CleaningVerdict {
  pub fn failed(reason: impl std::fmt::Display) -> Self {
    Self {
      is_cleaned: false,
      similarity: 0.0,
      difference: 0.0,
      detector_counts_before: 0,
      detector_counts_after: 0,
      message: format!("Error processing images: {}", reason),
    }
  }
}
