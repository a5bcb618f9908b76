// 该文件是 Qingjie （清洁） 项目的一部分。
// src/main.rs - 命令行主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::path::Path;

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use clap::Parser;
use image::RgbImage;
use tracing::info;
use tracing_subscriber::EnvFilter;

use qingjie::{
  DetectorBuilder, FromUrl, NoDetector, Verifier, VerifyConfig,
  category::{WasteCategory, points_for},
  input,
  model::{DetectResult, DetectorError, Model},
  output::{AnnotatedImageOutput, JsonOutput, Render},
};

use args::{Args, Command};

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let mut config = match &args.config {
    Some(path) => VerifyConfig::from_json_file(path)
      .with_context(|| format!("无法读取配置文件: {}", path.display()))?,
    None => VerifyConfig::default(),
  };
  if let Some(strictness) = args.strictness {
    config = config.strictness(strictness);
  }

  let output = JsonOutput::from_url(&args.output)?;

  if args.no_detector {
    info!("已禁用检测模型");
    return run(&args.command, Verifier::new(NoDetector, config), &output);
  }

  info!("模型地址: {}", args.model);
  let mut builder = DetectorBuilder::from_url(&args.model)?.config(config.detector.clone());
  if let Some(dir) = &args.cache_dir {
    builder = builder.cache_dir(dir);
  }
  run(&args.command, Verifier::new(builder.build(), config), &output)
}

fn run<M>(command: &Command, verifier: Verifier<M>, output: &JsonOutput) -> Result<()>
where
  M: Model<Input = RgbImage, Output = DetectResult, Error = DetectorError>,
{
  match command {
    Command::Garbage { image, annotate } => {
      let payload = read_base64(image)?;
      let now = std::time::Instant::now();
      let verdict = verifier.verify_garbage(&payload);
      info!("核验完成，耗时: {:.2?}", now.elapsed());

      if let Some(path) = annotate {
        let frame = input::decode(&payload).context("无法解码照片")?;
        AnnotatedImageOutput::new(path).render_result(&frame, &verdict)?;
      }
      output.write(&verdict)?;
    }
    Command::Cleaning { before, after } => {
      let before = read_base64(before)?;
      let after = read_base64(after)?;
      let now = std::time::Instant::now();
      let verdict = verifier.verify_cleaning(&before, &after);
      info!("核验完成，耗时: {:.2?}", now.elapsed());
      output.write(&verdict)?;
    }
    Command::Points { category } => {
      let points = points_for(category);
      let known = category.parse::<WasteCategory>().ok();
      output.write(&serde_json::json!({
        "category": known.map(WasteCategory::as_str).unwrap_or(category.as_str()),
        "known": known.is_some(),
        "points": points,
      }))?;
    }
  }
  Ok(())
}

fn read_base64(path: &Path) -> Result<String> {
  let bytes = std::fs::read(path).with_context(|| format!("无法读取文件: {}", path.display()))?;
  Ok(STANDARD.encode(bytes))
}
