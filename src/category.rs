// 该文件是 Qingjie （清洁） 项目的一部分。
// src/category.rs - 垃圾类别与积分
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

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 未知类别的默认积分
pub const DEFAULT_POINTS: u32 = 10;

// COCO 类别到垃圾类别的映射集合
const PLASTIC_LABELS: &[&str] = &["bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl"];
const ORGANIC_LABELS: &[&str] = &[
  "banana", "apple", "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake",
];
const SEWAGE_LABELS: &[&str] = &["toilet", "sink"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WasteCategory {
  Plastic,
  Organic,
  Mixed,
  Toxic,
  Sewage,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown waste category: {0}")]
pub struct ParseCategoryError(String);

impl WasteCategory {
  pub const ALL: [WasteCategory; 5] = [
    WasteCategory::Plastic,
    WasteCategory::Organic,
    WasteCategory::Mixed,
    WasteCategory::Toxic,
    WasteCategory::Sewage,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      WasteCategory::Plastic => "plastic",
      WasteCategory::Organic => "organic",
      WasteCategory::Mixed => "mixed",
      WasteCategory::Toxic => "toxic",
      WasteCategory::Sewage => "sewage",
    }
  }

  /// 清理该类别垃圾奖励的积分
  pub fn points(self) -> u32 {
    match self {
      WasteCategory::Plastic => 10,
      WasteCategory::Organic => 20,
      WasteCategory::Mixed => 30,
      WasteCategory::Toxic => 50,
      WasteCategory::Sewage => 100,
    }
  }

  /// 根据一张图像中全部检测到的类别名推断垃圾类别。
  ///
  /// 优先级：污水 > 有机与塑料并存（混合）> 仅有机 > 仅塑料 >
  /// 超过两种不同物体（混合）> 默认混合。
  /// COCO 中没有对应有毒垃圾的类别，因此检测结果永远不会得到 `Toxic`。
  pub fn from_labels<'a, I>(labels: I) -> Self
  where
    I: IntoIterator<Item = &'a str>,
  {
    let labels: BTreeSet<&str> = labels.into_iter().collect();
    let has = |set: &[&str]| labels.iter().any(|label| set.contains(label));

    let sewage = has(SEWAGE_LABELS);
    let organic = has(ORGANIC_LABELS);
    let plastic = has(PLASTIC_LABELS);

    if sewage {
      WasteCategory::Sewage
    } else if organic && plastic {
      WasteCategory::Mixed
    } else if organic {
      WasteCategory::Organic
    } else if plastic {
      WasteCategory::Plastic
    } else {
      // 超过两种不同物体，或只有少量无法归类的物体，都按混合处理
      WasteCategory::Mixed
    }
  }
}

impl fmt::Display for WasteCategory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for WasteCategory {
  type Err = ParseCategoryError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let name = s.trim().to_ascii_lowercase();
    WasteCategory::ALL
      .into_iter()
      .find(|category| category.as_str() == name)
      .ok_or_else(|| ParseCategoryError(s.to_string()))
  }
}

/// 按类别名查询积分，未知类别按默认积分计算
pub fn points_for(name: &str) -> u32 {
  name
    .parse::<WasteCategory>()
    .map(WasteCategory::points)
    .unwrap_or(DEFAULT_POINTS)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sewage_wins_over_everything() {
    let labels = ["bottle", "banana", "toilet", "cup", "person"];
    assert_eq!(WasteCategory::from_labels(labels), WasteCategory::Sewage);
    assert_eq!(WasteCategory::from_labels(["sink"]), WasteCategory::Sewage);
  }

  #[test]
  fn organic_with_plastic_is_mixed() {
    assert_eq!(
      WasteCategory::from_labels(["apple", "bottle"]),
      WasteCategory::Mixed
    );
  }

  #[test]
  fn single_family_maps_to_its_category() {
    assert_eq!(
      WasteCategory::from_labels(["pizza", "person", "pizza"]),
      WasteCategory::Organic
    );
    assert_eq!(
      WasteCategory::from_labels(["cup", "fork", "chair"]),
      WasteCategory::Plastic
    );
  }

  #[test]
  fn unmatched_objects_default_to_mixed() {
    assert_eq!(WasteCategory::from_labels(["person"]), WasteCategory::Mixed);
    assert_eq!(
      WasteCategory::from_labels(["chair", "tv", "book"]),
      WasteCategory::Mixed
    );
    assert_eq!(
      WasteCategory::from_labels(std::iter::empty::<&str>()),
      WasteCategory::Mixed
    );
  }

  #[test]
  fn points_table() {
    assert_eq!(WasteCategory::Plastic.points(), 10);
    assert_eq!(WasteCategory::Organic.points(), 20);
    assert_eq!(WasteCategory::Mixed.points(), 30);
    assert_eq!(WasteCategory::Toxic.points(), 50);
    assert_eq!(WasteCategory::Sewage.points(), 100);
    assert_eq!(points_for(" Sewage "), 100);
    assert_eq!(points_for("radioactive"), DEFAULT_POINTS);
  }

  #[test]
  fn parses_and_serializes_lowercase_names() {
    assert_eq!("TOXIC".parse::<WasteCategory>(), Ok(WasteCategory::Toxic));
    assert!("glass".parse::<WasteCategory>().is_err());
    assert_eq!(
      serde_json::to_string(&WasteCategory::Organic).unwrap(),
      "\"organic\""
    );
    assert_eq!(WasteCategory::Sewage.to_string(), "sewage");
  }
}
