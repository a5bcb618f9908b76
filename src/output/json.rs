// 该文件是 Qingjie （清洁） 项目的一部分。
// src/output/json.rs - JSON 结论输出
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
  fs::File,
  io::{BufWriter, Write},
  path::PathBuf,
};

use serde::Serialize;
use tracing::info;
use url::Url;

use crate::{FromUrl, output::OutputError};

/// 结论写入目标：`stdout:` 或 `file:///path/verdict.json`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonOutput {
  Stdout,
  File(PathBuf),
}

impl FromUrl for JsonOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      "stdout" => Ok(JsonOutput::Stdout),
      "file" => url
        .to_file_path()
        .map(JsonOutput::File)
        .map_err(|_| OutputError::SchemeMismatch(format!("无效的文件路径: {}", url))),
      scheme => Err(OutputError::SchemeMismatch(format!(
        "期望输出方式 'stdout' 或 'file', 实际输出方式 '{}'",
        scheme
      ))),
    }
  }
}

impl JsonOutput {
  pub fn write<T: Serialize>(&self, value: &T) -> Result<(), OutputError> {
    match self {
      JsonOutput::Stdout => {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        serde_json::to_writer_pretty(&mut lock, value)?;
        writeln!(lock)?;
      }
      JsonOutput::File(path) => {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writeln!(writer)?;
        writer.flush()?;
        info!("结论已写入: {}", path.display());
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::verdict::CleaningVerdict;

  #[test]
  fn parses_output_urls() {
    assert_eq!(
      JsonOutput::from_url(&Url::parse("stdout:").unwrap()).unwrap(),
      JsonOutput::Stdout
    );
    assert_eq!(
      JsonOutput::from_url(&Url::parse("file:///tmp/verdict.json").unwrap()).unwrap(),
      JsonOutput::File(PathBuf::from("/tmp/verdict.json"))
    );
    assert!(JsonOutput::from_url(&Url::parse("rtsp://camera/1").unwrap()).is_err());
  }

  #[test]
  fn writes_verdict_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("verdict.json");
    let output = JsonOutput::File(path.clone());
    output.write(&CleaningVerdict::failed("boom")).unwrap();

    let value: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["is_cleaned"], false);
    assert_eq!(value["message"], "Error processing images: boom");
  }
}
