// 该文件是 Qingjie （清洁） 项目的一部分。
// src/lib.rs - 库主文件
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

//! 垃圾上报照片核验核心。
//!
//! 两条对外操作：[`Verifier::verify_garbage`] 判断照片是否为垃圾现场，
//! [`Verifier::verify_cleaning`] 比较清理前后照片判断是否已清理。
//! 两者都不会向调用方返回错误，失败只体现在结论字段与提示信息中。

pub mod category;
pub mod config;
pub mod frame;
pub mod heuristic;
pub mod input;
pub mod model;
pub mod output;
pub mod verdict;
pub mod verify;

pub use category::WasteCategory;
pub use config::{Strictness, VerifyConfig};
pub use heuristic::heuristic_classify;
pub use input::{Base64Decoder, DecodeError, RasterImage};
pub use model::{DetectorBuilder, DetectorHandle, Model, NoDetector};
pub use verdict::{CleaningVerdict, DetectedItem, VerificationVerdict};
pub use verify::Verifier;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}
