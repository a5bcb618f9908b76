// 该文件是 Qingjie （清洁） 项目的一部分。
// src/model/handle.rs - 检测器句柄（延迟加载、只初始化一次）
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
  path::{Path, PathBuf},
  sync::OnceLock,
};

use image::RgbImage;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use super::yolo::YoloOnnx;
use crate::{
  FromUrl,
  config::DetectorConfig,
  model::{DetectResult, DetectorError, Model},
};

/// 默认 YOLOv8n COCO 权重
///
/// 首次下载时记录 SHA-256 摘要，之后缓存文件必须与之一致。
/// 需要锁定到确定版本时在地址后附加 `#sha256=<摘要>`。
pub const DEFAULT_MODEL_URL: &str =
  "https://github.com/jahongir7174/YOLOv8-onnx/raw/refs/heads/master/weights/v8_n.onnx";

/// 自动下载的模型大小上限（50MB）
pub const MAX_MODEL_BYTES: u64 = 50 * 1024 * 1024;

const CACHE_DIR_ENV: &str = "QINGJIE_CACHE_DIR";
const FALLBACK_MODEL_NAME: &str = "model.onnx";
const DIGEST_FRAGMENT: &str = "sha256=";
const DIGEST_EXTENSION: &str = "sha256";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ModelLocation {
  Local(PathBuf),
  Remote(Url),
}

/// 模型缓存目录：`QINGJIE_CACHE_DIR`，否则为系统缓存目录下的 `qingjie/models`
pub fn default_cache_dir() -> PathBuf {
  if let Some(dir) = std::env::var_os(CACHE_DIR_ENV) {
    return PathBuf::from(dir);
  }
  dirs::cache_dir()
    .unwrap_or_else(std::env::temp_dir)
    .join("qingjie")
    .join("models")
}

#[derive(Debug, Clone)]
pub struct DetectorBuilder {
  location: ModelLocation,
  sha256: Option<String>,
  cache_dir: Option<PathBuf>,
  config: DetectorConfig,
}

impl FromUrl for DetectorBuilder {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let sha256 = match url.fragment() {
      None => None,
      Some(fragment) => match fragment.strip_prefix(DIGEST_FRAGMENT) {
        Some(digest) => Some(parse_digest(digest)?),
        None => {
          return Err(DetectorError::ModelPath(format!(
            "无法识别的模型地址片段: #{}",
            fragment
          )));
        }
      },
    };
    let mut url = url.clone();
    url.set_fragment(None);

    let location = match url.scheme() {
      "file" => {
        let path = url
          .to_file_path()
          .map_err(|_| DetectorError::ModelPath(format!("无效的本地模型路径: {}", url)))?;
        ModelLocation::Local(path)
      }
      "http" | "https" => ModelLocation::Remote(url),
      scheme => {
        return Err(DetectorError::ModelPath(format!(
          "模型地址必须使用 file、http 或 https 方案，实际为 {}",
          scheme
        )));
      }
    };

    Ok(DetectorBuilder {
      location,
      sha256,
      cache_dir: None,
      config: DetectorConfig::default(),
    })
  }
}

impl DetectorBuilder {
  /// 锁定模型文件的 SHA-256 摘要（十六进制）
  pub fn sha256(mut self, digest: &str) -> Result<Self, DetectorError> {
    self.sha256 = Some(parse_digest(digest)?);
    Ok(self)
  }

  pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cache_dir = Some(dir.into());
    self
  }

  pub fn config(mut self, config: DetectorConfig) -> Self {
    self.config = config;
    self
  }

  /// 构建句柄；模型在第一次使用时才加载
  pub fn build(self) -> DetectorHandle {
    let cache_dir = self.cache_dir.unwrap_or_else(default_cache_dir);
    debug!("检测器模型位置: {:?}, 缓存目录: {}", self.location, cache_dir.display());
    DetectorHandle {
      location: self.location,
      sha256: self.sha256,
      cache_dir,
      config: self.config,
      session: OnceLock::new(),
    }
  }
}

/// 检测器句柄的加载状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
  /// 尚未尝试加载
  Pending,
  Ready,
  /// 加载失败，句柄生命周期内不再重试
  Unavailable,
}

/// 共享的检测器句柄。
///
/// 推理会话在第一次 [`DetectorHandle::acquire`] 时构建，并发调用者等待同一次初始化的结果。
/// 加载失败会被记住，之后的调用直接返回不可用。
pub struct DetectorHandle {
  location: ModelLocation,
  sha256: Option<String>,
  cache_dir: PathBuf,
  config: DetectorConfig,
  session: OnceLock<Option<YoloOnnx>>,
}

impl DetectorHandle {
  pub fn acquire(&self) -> Option<&YoloOnnx> {
    self
      .session
      .get_or_init(|| match self.load() {
        Ok(model) => Some(model),
        Err(e) => {
          warn!("检测器不可用，将只使用启发式判定: {}", e);
          None
        }
      })
      .as_ref()
  }

  pub fn state(&self) -> DetectorState {
    match self.session.get() {
      None => DetectorState::Pending,
      Some(Some(_)) => DetectorState::Ready,
      Some(None) => DetectorState::Unavailable,
    }
  }

  pub fn cache_dir(&self) -> &Path {
    &self.cache_dir
  }

  fn load(&self) -> Result<YoloOnnx, DetectorError> {
    let path = self.resolve()?;
    YoloOnnx::from_file(path, self.config.clone())
  }

  fn resolve(&self) -> Result<PathBuf, DetectorError> {
    match &self.location {
      ModelLocation::Local(path) => {
        if !path.is_file() {
          return Err(DetectorError::ModelPath(format!(
            "模型文件不存在: {}",
            path.display()
          )));
        }
        if let Some(expected) = &self.sha256 {
          check_digest(expected, &file_digest(path)?)?;
        }
        Ok(path.clone())
      }
      ModelLocation::Remote(url) => {
        let name = url
          .path_segments()
          .and_then(|mut segments| segments.next_back())
          .filter(|name| !name.is_empty())
          .unwrap_or(FALLBACK_MODEL_NAME);
        let path = self.cache_dir.join(name);
        let record = path.with_extension(DIGEST_EXTENSION);

        if path.is_file() {
          let actual = file_digest(&path)?;
          let expected = match &self.sha256 {
            Some(digest) => Some(digest.clone()),
            None => std::fs::read_to_string(&record)
              .ok()
              .map(|digest| digest.trim().to_ascii_lowercase()),
          };
          match expected {
            Some(expected) if expected != actual => {
              warn!("缓存的模型文件摘要不一致，重新下载: {}", path.display());
            }
            Some(_) => {
              info!("使用缓存的模型文件: {}", path.display());
              return Ok(path);
            }
            None => {
              // 旧缓存没有摘要记录，以当前内容为准
              std::fs::write(&record, &actual)?;
              info!("使用缓存的模型文件: {}, sha256={}", path.display(), actual);
              return Ok(path);
            }
          }
        }

        let (size, digest) = download_weights(url, &path, self.sha256.as_deref())?;
        std::fs::write(&record, &digest)?;
        info!(
          "模型下载完成: {:.2} MB, sha256={}",
          size as f64 / (1024.0 * 1024.0),
          digest
        );
        Ok(path)
      }
    }
  }
}

fn parse_digest(digest: &str) -> Result<String, DetectorError> {
  let digest = digest.trim().to_ascii_lowercase();
  if digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit()) {
    Ok(digest)
  } else {
    Err(DetectorError::ModelPath(format!(
      "SHA-256 摘要应为 64 位十六进制: {}",
      digest
    )))
  }
}

fn check_digest(expected: &str, actual: &str) -> Result<(), DetectorError> {
  if expected == actual {
    Ok(())
  } else {
    Err(DetectorError::Digest {
      expected: expected.to_string(),
      actual: actual.to_string(),
    })
  }
}

fn file_digest(path: &Path) -> Result<String, DetectorError> {
  let mut file = std::fs::File::open(path)?;
  let mut hasher = Sha256::new();
  std::io::copy(&mut file, &mut hasher)?;
  Ok(hex::encode(hasher.finalize()))
}

impl Model for DetectorHandle {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = DetectorError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.acquire().ok_or(DetectorError::Unavailable)?.detect(input)
  }
}

/// 下载权重到 `dest`，先写入临时文件再重命名；返回大小与 SHA-256 摘要
#[cfg(feature = "download")]
fn download_weights(url: &Url, dest: &Path, expected: Option<&str>) -> Result<(u64, String), DetectorError> {
  use std::io::Read;
  use std::time::Duration;

  let download_err = |e: reqwest::Error| DetectorError::Download(e.to_string());

  info!("下载模型权重: {} -> {}", url, dest.display());
  if let Some(parent) = dest.parent() {
    std::fs::create_dir_all(parent)?;
  }

  let client = reqwest::blocking::Client::builder()
    .timeout(Duration::from_secs(120))
    .build()
    .map_err(download_err)?;
  let response = client
    .get(url.as_str())
    .send()
    .and_then(|r| r.error_for_status())
    .map_err(download_err)?;

  if let Some(len) = response.content_length() {
    if len > MAX_MODEL_BYTES {
      return Err(DetectorError::Download(format!(
        "模型文件过大: {} 字节（上限 {}）",
        len, MAX_MODEL_BYTES
      )));
    }
  }

  let mut bytes = Vec::new();
  response.take(MAX_MODEL_BYTES + 1).read_to_end(&mut bytes)?;
  let size = bytes.len() as u64;
  if size > MAX_MODEL_BYTES {
    return Err(DetectorError::Download(format!(
      "模型文件过大: 超过 {} 字节",
      MAX_MODEL_BYTES
    )));
  }

  let digest = hex::encode(Sha256::digest(&bytes));
  if let Some(expected) = expected {
    check_digest(expected, &digest)?;
  }

  let partial = dest.with_extension("part");
  std::fs::write(&partial, &bytes)?;
  std::fs::rename(&partial, dest)?;
  Ok((size, digest))
}

#[cfg(not(feature = "download"))]
fn download_weights(url: &Url, _dest: &Path, _expected: Option<&str>) -> Result<(u64, String), DetectorError> {
  Err(DetectorError::Download(format!(
    "未启用 download 特性，无法下载 {}",
    url
  )))
}
