// 该文件是 Qingjie （清洁） 项目的一部分。
// src/args.rs - 命令行参数
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

use qingjie::{Strictness, model::DEFAULT_MODEL_URL};

/// Qingjie 垃圾上报照片核验
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测模型地址（file:///path/model.onnx 或 https://...），可附加 #sha256=<摘要> 锁定版本
  #[arg(long, value_name = "URL", default_value = DEFAULT_MODEL_URL, global = true)]
  pub model: Url,

  /// 模型缓存目录
  #[arg(long, value_name = "DIR", env = "QINGJIE_CACHE_DIR", global = true)]
  pub cache_dir: Option<PathBuf>,

  /// 不加载检测模型，只使用启发式判定
  #[arg(long, global = true)]
  pub no_detector: bool,

  /// 启发式判定策略，覆盖配置文件
  #[arg(long, value_enum, global = true)]
  pub strictness: Option<Strictness>,

  /// JSON 配置文件
  #[arg(long, value_name = "FILE", global = true)]
  pub config: Option<PathBuf>,

  /// 结论输出位置（stdout: 或 file:///path/verdict.json）
  #[arg(long, value_name = "URL", default_value = "stdout:", global = true)]
  pub output: Url,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 核验一张垃圾照片
  Garbage {
    /// 照片文件
    #[arg(long, value_name = "FILE")]
    image: PathBuf,

    /// 保存绘制了检测框的照片
    #[arg(long, value_name = "FILE")]
    annotate: Option<PathBuf>,
  },
  /// 比较清理前后的照片
  Cleaning {
    /// 清理前照片
    #[arg(long, value_name = "FILE")]
    before: PathBuf,

    /// 清理后照片
    #[arg(long, value_name = "FILE")]
    after: PathBuf,
  },
  /// 查询垃圾类别的积分
  Points {
    /// 类别名（plastic、organic、mixed、toxic、sewage）
    category: String,
  },
}
