// 该文件是 Qingjie （清洁） 项目的一部分。
// src/model.rs - 模型
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

use std::sync::Arc;

use image::RgbImage;
use thiserror::Error;

use crate::{category::WasteCategory, frame::FrameError};

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 类别编号对应的 COCO 名称，越界时返回 "unknown"
pub fn coco_label(class_id: u32) -> &'static str {
  COCO_CLASSES
    .get(class_id as usize)
    .copied()
    .unwrap_or("unknown")
}

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

impl<M: Model> Model for Arc<M> {
  type Input = M::Input;
  type Output = M::Output;
  type Error = M::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.as_ref().infer(input)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，原图像素坐标
}

impl DetectItem {
  pub fn label(&self) -> &'static str {
    coco_label(self.class_id)
  }
}

/// 检测结果，按置信度降序排列
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn new(mut items: Vec<DetectItem>) -> Self {
    items.sort_by(|a, b| b.score.total_cmp(&a.score));
    Self {
      items: items.into_boxed_slice(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  /// 最高置信度的检测
  pub fn top(&self) -> Option<&DetectItem> {
    self.items.first()
  }

  pub fn top_score(&self) -> f32 {
    self.top().map(|item| item.score).unwrap_or(0.0)
  }

  pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.items.iter().map(DetectItem::label)
  }

  pub fn category(&self) -> WasteCategory {
    WasteCategory::from_labels(self.labels())
  }
}

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("检测器不可用")]
  Unavailable,
  #[error("模型下载错误: {0}")]
  Download(String),
  #[error("模型加载错误: {0}")]
  Load(String),
  #[error("推理错误: {0}")]
  Inference(String),
  #[error("模型输出形状无效: {0:?}")]
  OutputShape(Vec<i64>),
  #[error("模型路径错误: {0}")]
  ModelPath(String),
  #[error("模型摘要不匹配: 期望 {expected}, 实际 {actual}")]
  Digest { expected: String, actual: String },
  #[error("预处理错误: {0}")]
  Frame(#[from] FrameError),
  #[error("文件读写错误: {0}")]
  Io(#[from] std::io::Error),
}

impl From<ort::Error> for DetectorError {
  fn from(err: ort::Error) -> Self {
    DetectorError::Inference(err.to_string())
  }
}

/// 不做任何检测的空模型，核验只走启发式路径
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDetector;

impl Model for NoDetector {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = DetectorError;

  fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
    Err(DetectorError::Unavailable)
  }
}

mod handle;
pub mod nms;
mod yolo;
pub use self::handle::{DEFAULT_MODEL_URL, DetectorBuilder, DetectorHandle, DetectorState};
pub use self::yolo::{YOLO_INPUT_SIZE, YoloFrame, YoloOnnx};

#[cfg(test)]
mod tests {
  use super::*;

  fn item(class_id: u32, score: f32) -> DetectItem {
    DetectItem {
      class_id,
      score,
      bbox: [0.0, 0.0, 10.0, 10.0],
    }
  }

  #[test]
  fn result_is_sorted_by_score() {
    let result = DetectResult::new(vec![item(39, 0.4), item(61, 0.9), item(46, 0.6)]);
    assert_eq!(result.top().map(DetectItem::label), Some("toilet"));
    assert_eq!(
      result.labels().collect::<Vec<_>>(),
      vec!["toilet", "banana", "bottle"]
    );
    assert_eq!(result.category(), WasteCategory::Sewage);
  }

  #[test]
  fn label_lookup_is_bounded() {
    assert_eq!(coco_label(0), "person");
    assert_eq!(coco_label(71), "sink");
    assert_eq!(coco_label(80), "unknown");
  }

  #[test]
  fn no_detector_is_unavailable() {
    let image = RgbImage::new(4, 4);
    assert!(matches!(
      NoDetector.infer(&image),
      Err(DetectorError::Unavailable)
    ));
    assert!(Arc::new(NoDetector).infer(&image).is_err());
    assert_eq!(DetectResult::default().top_score(), 0.0);
  }
}
