// 该文件是 Qingjie （清洁） 项目的一部分。
// src/model/yolo.rs - YOLO ONNX 检测模型
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

use std::{
  path::Path,
  sync::{Mutex, PoisonError},
};

use image::RgbImage;
use ndarray::{Array2, ArrayView2};
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::TensorRef,
};
use tracing::{debug, info};

use crate::{
  config::DetectorConfig,
  frame::{Letterbox, LetterboxFrame},
  model::{DetectItem, DetectResult, DetectorError, Model, nms::non_max_suppression},
};

pub const YOLO_INPUT_SIZE: u32 = 640;
const YOLO_BOX_DIMS: usize = 4;

pub type YoloFrame = LetterboxFrame<YOLO_INPUT_SIZE>;

/// 单阶段 YOLO 检测器（ONNX Runtime，CPU）
///
/// 输出为逐锚点的 `[cx, cy, w, h, class scores...]`，不含 objectness。
pub struct YoloOnnx {
  session: Mutex<Session>,
  config: DetectorConfig,
}

impl YoloOnnx {
  pub fn from_file(path: impl AsRef<Path>, config: DetectorConfig) -> Result<Self, DetectorError> {
    let path = path.as_ref();
    info!("加载模型文件: {}", path.display());
    if let Ok(meta) = std::fs::metadata(path) {
      debug!("模型文件大小: {:.2} MB", meta.len() as f64 / (1024.0 * 1024.0));
    }

    let session = Session::builder()
      .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
      .and_then(|b| b.with_intra_threads(config.intra_threads))
      .and_then(|b| b.commit_from_file(path))
      .map_err(|e| DetectorError::Load(format!("{}: {}", path.display(), e)))?;
    info!("模型加载完成");

    Ok(Self {
      session: Mutex::new(session),
      config,
    })
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn detect(&self, image: &RgbImage) -> Result<DetectResult, DetectorError> {
    let frame = YoloFrame::from_image(image)?;
    let (tensor, letterbox) = frame.into_parts();
    let input = TensorRef::from_array_view(&tensor)?;

    // 推理失败不会影响后续调用，锁中毒时继续使用内部会话
    let raw = {
      let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
      debug!("执行模型推理");
      let outputs = session.run(ort::inputs![input])?;
      let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
      decode_output(shape, data)?
    };
    debug!("模型输出: {} 个锚点, {} 维特征", raw.nrows(), raw.ncols());

    let items = postprocess(raw.view(), &letterbox, &self.config);
    debug!("检测到 {} 个物体", items.len());
    Ok(DetectResult::new(items))
  }
}

impl Model for YoloOnnx {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = DetectorError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.detect(input)
  }
}

/// 将 `[1, 4+C, N]` 或 `[1, N, 4+C]` 输出整理为 `[N, 4+C]`
fn decode_output(shape: &[i64], data: &[f32]) -> Result<Array2<f32>, DetectorError> {
  let invalid = || DetectorError::OutputShape(shape.to_vec());
  let dims = match shape {
    [1, a, b] | [a, b] => (*a, *b),
    _ => return Err(invalid()),
  };
  let (a, b) = match dims {
    (a, b) if a > 0 && b > 0 => (a as usize, b as usize),
    _ => return Err(invalid()),
  };
  let view = ArrayView2::from_shape((a, b), data).map_err(|_| invalid())?;

  // 锚点数总是远大于特征维度
  let anchors_first = if a >= b { view } else { view.reversed_axes() };
  if anchors_first.ncols() <= YOLO_BOX_DIMS {
    return Err(invalid());
  }
  Ok(anchors_first.to_owned())
}

/// 置信度过滤、NMS，并映射回原图坐标
fn postprocess(raw: ArrayView2<f32>, letterbox: &Letterbox, config: &DetectorConfig) -> Vec<DetectItem> {
  let mut candidates = Vec::new();
  for row in raw.rows() {
    let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
    let Some((class_id, score)) = row
      .iter()
      .skip(YOLO_BOX_DIMS)
      .copied()
      .enumerate()
      .max_by(|a, b| a.1.total_cmp(&b.1))
    else {
      continue;
    };

    if !score.is_finite() || score <= config.confidence_threshold {
      continue;
    }
    if ![cx, cy, w, h].iter().all(|v| v.is_finite()) || w <= 0.0 || h <= 0.0 {
      continue;
    }

    candidates.push(DetectItem {
      class_id: class_id as u32,
      score,
      bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
    });
  }
  debug!("置信度过滤后候选框: {}", candidates.len());

  non_max_suppression(candidates, config.iou_threshold, config.max_nms_candidates)
    .into_iter()
    .map(|item| DetectItem {
      bbox: letterbox.unmap_box(item.bbox),
      ..item
    })
    .collect()
}
