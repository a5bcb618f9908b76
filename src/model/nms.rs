// 该文件是 Qingjie （清洁） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use super::DetectItem;

/// 计算两个 [x1, y1, x2, y2] 边界框的 IoU
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 贪心非极大值抑制（不区分类别）。
///
/// 按置信度降序，只保留前 `max_candidates` 个候选；
/// 依次保留最高者，并丢弃与其 IoU 超过 `iou_threshold` 的其余候选。
pub fn non_max_suppression(
  mut items: Vec<DetectItem>,
  iou_threshold: f32,
  max_candidates: usize,
) -> Vec<DetectItem> {
  items.sort_by(|a, b| b.score.total_cmp(&a.score));
  items.truncate(max_candidates);

  let mut suppressed = vec![false; items.len()];
  let mut kept = Vec::new();

  for i in 0..items.len() {
    if suppressed[i] {
      continue;
    }
    for j in (i + 1)..items.len() {
      if !suppressed[j] && iou(&items[i].bbox, &items[j].bbox) > iou_threshold {
        suppressed[j] = true;
      }
    }
    kept.push(items[i].clone());
  }

  kept
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(score: f32, bbox: [f32; 4]) -> DetectItem {
    DetectItem {
      class_id: 39,
      score,
      bbox,
    }
  }

  #[test]
  fn iou_of_identical_and_disjoint_boxes() {
    let a = [0.0, 0.0, 10.0, 10.0];
    assert_eq!(iou(&a, &a), 1.0);
    assert_eq!(iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
    // 半重叠：交集 50，并集 150
    assert!((iou(&a, &[5.0, 0.0, 15.0, 10.0]) - 1.0 / 3.0).abs() < 1e-6);
  }

  #[test]
  fn overlapping_pair_keeps_the_higher_score() {
    let low = item(0.6, [1.0, 1.0, 11.0, 11.0]);
    let high = item(0.9, [0.0, 0.0, 10.0, 10.0]);
    assert!(iou(&low.bbox, &high.bbox) > 0.45);

    let kept = non_max_suppression(vec![low, high.clone()], 0.45, 300);
    assert_eq!(kept, vec![high]);
  }

  #[test]
  fn distant_boxes_both_survive() {
    let a = item(0.5, [0.0, 0.0, 10.0, 10.0]);
    let b = item(0.7, [50.0, 50.0, 60.0, 60.0]);
    let kept = non_max_suppression(vec![a, b], 0.45, 300);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].score, 0.7);
  }

  #[test]
  fn candidate_cap_drops_lowest_scores() {
    let items = (0..10)
      .map(|i| item(i as f32 / 10.0, [i as f32 * 100.0, 0.0, i as f32 * 100.0 + 10.0, 10.0]))
      .collect();
    let kept = non_max_suppression(items, 0.45, 3);
    let scores: Vec<f32> = kept.iter().map(|d| d.score).collect();
    assert_eq!(scores, vec![0.9, 0.8, 0.7]);
  }
}
