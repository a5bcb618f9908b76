// 该文件是 Qingjie （清洁） 项目的一部分。
// tests/verify.rs - 核验入口端到端测试
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

use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rand::{Rng, SeedableRng, rngs::StdRng};

use qingjie::{
  NoDetector, Verifier, VerifyConfig, WasteCategory,
  model::{DetectItem, DetectResult, DetectorError, Model},
};

fn encode(image: RgbImage) -> String {
  let mut buf = Cursor::new(Vec::new());
  DynamicImage::ImageRgb8(image)
    .write_to(&mut buf, ImageFormat::Png)
    .unwrap();
  STANDARD.encode(buf.into_inner())
}

fn noise(width: u32, height: u32, seed: u64) -> RgbImage {
  let mut rng = StdRng::seed_from_u64(seed);
  RgbImage::from_fn(width, height, |_, _| {
    Rgb([rng.random(), rng.random(), rng.random()])
  })
}

/// 8x8 色块噪声，边缘集中在色块分界
fn blocky_noise(size: u32, seed: u64) -> RgbImage {
  let mut rng = StdRng::seed_from_u64(seed);
  let blocks = size / 8;
  let palette: Vec<Rgb<u8>> = (0..blocks * blocks)
    .map(|_| Rgb([rng.random(), rng.random(), rng.random()]))
    .collect();
  RgbImage::from_fn(size, size, |x, y| {
    palette[((y / 8) * blocks + x / 8) as usize]
  })
}

fn white() -> RgbImage {
  RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]))
}

fn heuristic() -> Verifier<NoDetector> {
  Verifier::heuristic_only(VerifyConfig::default())
}

struct Fixed(Vec<DetectItem>);

impl Model for Fixed {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = DetectorError;

  fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
    Ok(DetectResult::new(self.0.clone()))
  }
}

struct Broken;

impl Model for Broken {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = DetectorError;

  fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
    Err(DetectorError::Inference("session exploded".to_string()))
  }
}

#[test]
fn noise_is_garbage_and_white_is_not() {
  let verifier = heuristic();

  let verdict = verifier.verify_garbage(&encode(noise(128, 128, 42)));
  assert!(verdict.is_garbage);
  assert!(verdict.confidence >= 0.5);
  assert_eq!(verdict.waste_type, Some(WasteCategory::Mixed));
  assert_eq!(verdict.detected_items.len(), 1);
  assert_eq!(verdict.detected_items[0].label, "waste area");
  assert!(verdict.detected_items[0].bbox.is_none());

  let verdict = verifier.verify_garbage(&encode(white()));
  assert!(!verdict.is_garbage);
  assert_eq!(verdict.waste_type, Some(WasteCategory::Mixed));
  assert!(verdict.detected_items.is_empty());
  assert_eq!(
    verdict.message,
    "No garbage detected. Please take a clearer photo of waste area."
  );
}

#[test]
fn failing_detector_falls_back_to_heuristic() {
  let verifier = Verifier::new(Broken, VerifyConfig::default());
  let verdict = verifier.verify_garbage(&encode(noise(96, 96, 3)));
  assert!(verdict.is_garbage);
  assert_eq!(verdict.waste_type, Some(WasteCategory::Mixed));

  let cleaning = verifier.verify_cleaning(&encode(white()), &encode(white()));
  assert!(!cleaning.is_cleaned);
  assert_eq!(cleaning.detector_counts_before, 0);
}

#[test]
fn sewage_detection_wins() {
  let verifier = Verifier::new(
    Fixed(vec![
      DetectItem {
        class_id: 39, // bottle
        score: 0.92,
        bbox: [1.0, 1.0, 20.0, 40.0],
      },
      DetectItem {
        class_id: 61, // toilet
        score: 0.61,
        bbox: [30.0, 10.0, 90.0, 80.0],
      },
    ]),
    VerifyConfig::default(),
  );
  let verdict = verifier.verify_garbage(&encode(white()));
  assert!(verdict.is_garbage);
  assert_eq!(verdict.waste_type, Some(WasteCategory::Sewage));
  assert_eq!(verdict.confidence, 0.92);
  assert_eq!(verdict.detected_items[1].label, "toilet");
  assert_eq!(verdict.detected_items[1].bbox, Some([30.0, 10.0, 90.0, 80.0]));
  assert!(verdict.message.contains("sewage"));
}

#[test]
fn identical_photos_are_not_cleaned() {
  let payload = encode(noise(64, 64, 9));
  let verdict = heuristic().verify_cleaning(&payload, &payload);
  assert!(!verdict.is_cleaned);
  assert_eq!(verdict.similarity, 100.0);
  assert_eq!(verdict.difference, 0.0);
  assert_eq!(verdict.message, "Please ensure the area is properly cleaned.");
}

#[test]
fn painted_over_clutter_is_cleaned() {
  let before = blocky_noise(256, 11);
  let mut after = before.clone();
  for y in 16..240 {
    for x in 16..240 {
      after.put_pixel(x, y, Rgb([128, 128, 128]));
    }
  }
  let verdict = heuristic().verify_cleaning(&encode(before), &encode(after));
  assert!(verdict.is_cleaned);
  assert_eq!(verdict.message, "Area successfully cleaned!");
}

#[test]
fn lenient_payload_forms_are_accepted() {
  let verifier = heuristic();
  let encoded = encode(noise(64, 64, 5));

  let data_uri = format!("data:image/png;base64,{}", encoded);
  assert!(verifier.verify_garbage(&data_uri).is_garbage);

  let unpadded = encoded.trim_end_matches('=');
  let verdict = verifier.verify_garbage(unpadded);
  assert!(!verdict.message.starts_with("Error processing image"));
}

#[test]
fn url_payload_is_rejected_softly() {
  let verdict = heuristic().verify_garbage("https://res.cloudinary.com/demo/image/upload/dump.jpg");
  assert!(!verdict.is_garbage);
  assert_eq!(verdict.confidence, 0.0);
  assert_eq!(verdict.waste_type, None);
  assert!(verdict.message.starts_with("Error processing image: "));

  let cleaning = heuristic().verify_cleaning("", "");
  assert!(!cleaning.is_cleaned);
  assert_eq!(cleaning.similarity, 0.0);
}

#[test]
fn verdict_json_uses_wire_names() {
  let verdict = heuristic().verify_garbage(&encode(noise(64, 64, 1)));
  let value = serde_json::to_value(&verdict).unwrap();
  assert_eq!(value["is_garbage"], true);
  assert_eq!(value["wasteType"], "mixed");
  assert!(value["detected_items"].is_array());
  assert!(value.get("source").is_none());

  let cleaning = heuristic().verify_cleaning(&encode(white()), &encode(white()));
  let value = serde_json::to_value(&cleaning).unwrap();
  for key in [
    "is_cleaned",
    "similarity",
    "difference",
    "message",
    "detector_counts_before",
    "detector_counts_after",
  ] {
    assert!(value.get(key).is_some(), "missing {}", key);
  }
}

#[cfg(feature = "async")]
#[tokio::test]
async fn async_wrappers_match_sync_results() {
  use std::sync::Arc;

  let verifier = Arc::new(heuristic());
  let payload = encode(noise(64, 64, 21));
  let sync = verifier.verify_garbage(&payload);
  let verdict = Arc::clone(&verifier).verify_garbage_async(payload.clone()).await;
  assert_eq!(verdict, sync);

  let cleaning = verifier
    .verify_cleaning_async(payload.clone(), payload)
    .await;
  assert_eq!(cleaning.similarity, 100.0);
}
