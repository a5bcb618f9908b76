// 该文件是 Qingjie （清洁） 项目的一部分。
// src/config.rs - 核验阈值配置
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

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::input::DEFAULT_MAX_PIXELS;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("配置文件读取错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("配置文件格式错误: {0}")]
  Json(#[from] serde_json::Error),
}

/// 启发式判定的接受策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
  /// 三项指标中至少两项超过阈值
  #[default]
  Strict,
  /// 置信度混合值 `score / 3 + 0.3` 不低于 0.5，即至少一项指标
  Lenient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
  pub strictness: Strictness,
  /// Canny 低阈值（8 位灰度）
  pub canny_low: f32,
  /// Canny 高阈值（8 位灰度）
  pub canny_high: f32,
  pub edge_density_cutoff: f64,
  pub color_variance_cutoff: f64,
  pub texture_variance_cutoff: f64,
  /// 置信度上限
  pub max_confidence: f32,
}

impl Default for HeuristicConfig {
  fn default() -> Self {
    Self {
      strictness: Strictness::Strict,
      canny_low: 50.0,
      canny_high: 150.0,
      edge_density_cutoff: 0.15,
      color_variance_cutoff: 3000.0,
      texture_variance_cutoff: 150.0,
      max_confidence: 0.85,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
  pub confidence_threshold: f32,
  pub iou_threshold: f32,
  /// 进入 NMS 的候选框上限
  pub max_nms_candidates: usize,
  /// ONNX Runtime 算子内线程数
  pub intra_threads: usize,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: 0.35,
      iou_threshold: 0.45,
      max_nms_candidates: 300,
      intra_threads: 4,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
  /// 差异百分比超过该值即视为已清理
  pub difference_threshold: f64,
  /// 清理后边缘密度低于清理前的该比例即视为杂物减少
  pub edge_ratio: f64,
  /// 清理后最高检测分数低于清理前的该比例即视为物体消失
  pub detector_score_ratio: f32,
}

impl Default for CleaningConfig {
  fn default() -> Self {
    Self {
      difference_threshold: 30.0,
      edge_ratio: 0.7,
      detector_score_ratio: 0.4,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
  pub heuristic: HeuristicConfig,
  pub detector: DetectorConfig,
  pub cleaning: CleaningConfig,
  pub max_pixels: u64,
}

impl Default for VerifyConfig {
  fn default() -> Self {
    Self {
      heuristic: HeuristicConfig::default(),
      detector: DetectorConfig::default(),
      cleaning: CleaningConfig::default(),
      max_pixels: DEFAULT_MAX_PIXELS,
    }
  }
}

impl VerifyConfig {
  /// 从 JSON 文件读取配置，缺失字段取默认值
  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    info!("读取配置文件: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
  }

  pub fn strictness(mut self, strictness: Strictness) -> Self {
    self.heuristic.strictness = strictness;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_json_keeps_defaults() {
    let config: VerifyConfig =
      serde_json::from_str(r#"{"heuristic": {"strictness": "lenient"}, "cleaning": {"edge_ratio": 0.5}}"#)
        .unwrap();
    assert_eq!(config.heuristic.strictness, Strictness::Lenient);
    assert_eq!(config.heuristic.canny_high, 150.0);
    assert_eq!(config.cleaning.edge_ratio, 0.5);
    assert_eq!(config.cleaning.difference_threshold, 30.0);
    assert_eq!(config.detector, DetectorConfig::default());
  }

  #[test]
  fn reads_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("qingjie.json");
    std::fs::write(&path, r#"{"max_pixels": 1024, "detector": {"confidence_threshold": 0.5}}"#).unwrap();
    let config = VerifyConfig::from_json_file(&path).unwrap();
    assert_eq!(config.max_pixels, 1024);
    assert_eq!(config.detector.confidence_threshold, 0.5);
    assert_eq!(config.detector.iou_threshold, 0.45);
  }

  #[test]
  fn malformed_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
      VerifyConfig::from_json_file(&path),
      Err(ConfigError::Json(_))
    ));
  }
}
