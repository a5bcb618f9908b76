// 该文件是 Qingjie （清洁） 项目的一部分。
// src/verify.rs - 核验入口
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
use tracing::{debug, error};

use crate::{
  config::VerifyConfig,
  input::{Base64Decoder, RasterImage},
  model::{DetectResult, DetectorError, DetectorHandle, Model, NoDetector},
};

mod cleaning;
mod garbage;

/// 照片核验器。
///
/// 检测模型可选；模型不可用或推理失败时退回启发式判定。
/// 所有入口都返回结论，不向调用方返回错误。
pub struct Verifier<M = DetectorHandle> {
  model: M,
  config: VerifyConfig,
  decoder: Base64Decoder,
}

impl Verifier<NoDetector> {
  /// 只使用启发式判定的核验器
  pub fn heuristic_only(config: VerifyConfig) -> Self {
    Verifier::new(NoDetector, config)
  }
}

impl<M> Verifier<M>
where
  M: Model<Input = RgbImage, Output = DetectResult, Error = DetectorError>,
{
  pub fn new(model: M, config: VerifyConfig) -> Self {
    let decoder = Base64Decoder::default().with_max_pixels(config.max_pixels);
    Self {
      model,
      config,
      decoder,
    }
  }

  pub fn config(&self) -> &VerifyConfig {
    &self.config
  }

  pub fn model(&self) -> &M {
    &self.model
  }

  /// 运行检测器；任何失败都只影响本次调用
  fn run_detector(&self, image: &RasterImage) -> Option<DetectResult> {
    match self.model.infer(image.as_rgb()) {
      Ok(result) => {
        debug!("检测器返回 {} 个物体", result.len());
        Some(result)
      }
      Err(DetectorError::Unavailable) => {
        debug!("检测器不可用，跳过");
        None
      }
      Err(e) => {
        error!("检测器推理失败，本次请求退回启发式判定: {}", e);
        None
      }
    }
  }
}

#[cfg(feature = "async")]
mod spawn {
  use std::sync::Arc;

  use image::RgbImage;

  use super::Verifier;
  use crate::{
    model::{DetectResult, DetectorError, Model},
    verdict::{CleaningVerdict, VerificationVerdict},
  };

  impl<M> Verifier<M>
  where
    M: Model<Input = RgbImage, Output = DetectResult, Error = DetectorError> + Send + Sync + 'static,
  {
    /// 在 tokio 阻塞线程池上执行 [`Verifier::verify_garbage`]
    pub async fn verify_garbage_async(self: Arc<Self>, payload: String) -> VerificationVerdict {
      tokio::task::spawn_blocking(move || self.verify_garbage(&payload))
        .await
        .unwrap_or_else(VerificationVerdict::rejected)
    }

    /// 在 tokio 阻塞线程池上执行 [`Verifier::verify_cleaning`]
    pub async fn verify_cleaning_async(self: Arc<Self>, before: String, after: String) -> CleaningVerdict {
      tokio::task::spawn_blocking(move || self.verify_cleaning(&before, &after))
        .await
        .unwrap_or_else(CleaningVerdict::failed)
    }
  }
}
