// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// tests/end_to_end.rs - 端到端测试
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

use std::sync::Mutex;

use serde_json::Value;
use subwindow::{
  config::ModelConfig,
  dataset::{Example, load_examples},
  feature::{joint_score, psi, score},
  geometry::{BBox, overlap},
  image::PointCloud,
  inference::InferenceAdapter,
  label::Label,
  loss::{LossKind, loss},
  oracle::ExhaustiveOracle,
  output::Render,
  task::{ClassifyTask, SeedTask, Task, ViolationTask},
};

const WEIGHTS: [f64; 3] = [0.0, 1.0, -1.0];

fn three_points() -> PointCloud {
  PointCloud::from_points(&[(0, 0, 1), (5, 5, 2), (9, 9, 1)])
    .unwrap()
    .with_id("000001")
}

fn config() -> ModelConfig {
  ModelConfig::builder().numbins(3).build().unwrap()
}

fn gt() -> BBox {
  BBox::new(0, 0, 5, 5).with_score(1.0)
}

#[test]
fn three_point_scenario() {
  let image = three_points();
  let config = config();
  let label = Label::Positive(vec![gt()]);

  let features = psi(&image, &BBox::new(0, 0, 5, 5), &config).unwrap();
  assert_eq!(features.to_dense(), vec![0, 1, 1]);
  assert_eq!(loss(&label, &BBox::new(0, 0, 5, 5), LossKind::OneMinusOverlap), 0.0);
  assert_eq!(loss(&label, &BBox::new(6, 6, 9, 9), LossKind::OneMinusOverlap), 1.0);

  for bbox in [BBox::new(0, 0, 5, 5), BBox::new(3, 1, 4, 8), BBox::new(9, 9, 9, 9)] {
    assert_eq!(loss(&Label::Negative, &bbox, LossKind::OneMinusOverlap), 1.0);
  }
}

#[test]
fn exhaustive_search_score_matches_objective() {
  let image = three_points();
  let config = config();
  let label = Label::Positive(vec![gt()]);
  let model = InferenceAdapter::new(ExhaustiveOracle::default(), &config).with_verify(true);

  let bbox = model.find_most_violated(&image, &WEIGHTS, &label).unwrap();
  let expected = joint_score(&image, &bbox, &WEIGHTS, &label, &config).unwrap();
  assert!((bbox.score - expected).abs() < 1e-9);
  // 只含 (9, 9) 且与真值不相交的框：w·psi = 1，损失 = 1
  assert!((bbox.score - 2.0).abs() < 1e-9);
  assert_eq!(overlap(&gt(), &bbox), 0.0);
}

#[test]
fn negative_example_hides_constant_loss_from_search() {
  let image = three_points();
  let config = config();
  let model = InferenceAdapter::new(ExhaustiveOracle::default(), &config);

  let bbox = model.find_most_violated(&image, &WEIGHTS, &Label::Negative).unwrap();
  let plain = score(&image, &bbox, &WEIGHTS, &config).unwrap();
  assert!((bbox.score - 1.0).abs() < 1e-9);
  assert!((bbox.score - plain).abs() < 1e-9);
}

#[test]
fn batch_keeps_input_order() {
  let config = config();
  let model = InferenceAdapter::new(ExhaustiveOracle::default(), &config);
  let examples = vec![
    Example {
      image: three_points(),
      label: Label::Positive(vec![gt()]),
    },
    Example {
      image: three_points(),
      label: Label::Unknown,
    },
    Example {
      image: three_points(),
      label: Label::Negative,
    },
  ];

  let results = model.find_most_violated_batch(&examples, &WEIGHTS);
  let scores: Vec<f64> = results.into_iter().map(|r| r.unwrap().score).collect();
  assert!((scores[0] - 2.0).abs() < 1e-9);
  assert!((scores[1] - 1.0).abs() < 1e-9);
  assert!((scores[2] - 1.0).abs() < 1e-9);
}

#[derive(Default)]
struct Collect(Mutex<Vec<(Option<String>, BBox)>>);

impl Render<PointCloud, BBox> for Collect {
  type Error = std::io::Error;

  fn render_result(&self, input: &PointCloud, result: &BBox) -> Result<(), Self::Error> {
    let mut seen = self.0.lock().unwrap();
    seen.push((input.id().map(str::to_string), *result));
    Ok(())
  }

  fn finish(&self) -> Result<(), Self::Error> {
    Ok(())
  }
}

#[test]
fn classify_task_renders_every_image() {
  let config = config();
  let model = InferenceAdapter::new(ExhaustiveOracle::default(), &config).with_verify(true);
  let examples = vec![
    Example {
      image: three_points(),
      label: Label::Negative,
    },
    Example {
      image: PointCloud::from_points(&[(0, 0, 2), (1, 1, 1)]).unwrap().with_id("000002"),
      label: Label::Negative,
    },
  ];
  let output = Collect::default();

  ClassifyTask::new(&WEIGHTS)
    .run_task(examples.as_slice(), &model, &output)
    .unwrap();

  let seen = output.0.into_inner().unwrap();
  assert_eq!(seen.len(), 2);
  assert_eq!(seen[0].0.as_deref(), Some("000001"));
  assert!((seen[0].1.score - 1.0).abs() < 1e-9);
  assert_eq!(seen[1].0.as_deref(), Some("000002"));
  assert!(seen[1].1.contains(1, 1) && !seen[1].1.contains(0, 0));
  assert!((seen[1].1.score - 1.0).abs() < 1e-9);
}

#[test]
fn seed_task_writes_one_constraint_per_positive_box() {
  let examples = vec![
    Example {
      image: three_points(),
      label: Label::Positive(vec![gt()]),
    },
    Example {
      image: three_points(),
      label: Label::Negative,
    },
  ];
  let mut buffer = Vec::new();
  SeedTask
    .run_task(examples.as_slice(), &config(), &mut buffer)
    .unwrap();

  let text = String::from_utf8(buffer).unwrap();
  let lines: Vec<Value> = text
    .lines()
    .map(|l| serde_json::from_str(l).unwrap())
    .collect();
  assert_eq!(lines.len(), 1);
  assert_eq!(lines[0]["slack_id"], 100_003);
  assert_eq!(lines[0]["rhs"], 1.0);
  assert_eq!(lines[0]["dim"], 3);
  assert_eq!(lines[0]["features"], serde_json::json!([[1, 1], [2, 1]]));
}

#[test]
fn violation_task_runs_from_files() {
  let root = std::env::temp_dir().join(format!("subwindow-e2e-{}", std::process::id()));
  let clouds = root.join("clouds");
  std::fs::create_dir_all(&clouds).unwrap();
  std::fs::write(clouds.join("000001.clst"), "0 0 1\n5 5 2\n9 9 1\n").unwrap();
  std::fs::write(clouds.join("000002.clst"), "0 0 1\n5 5 2\n9 9 1\n").unwrap();
  let labels = root.join("train.txt");
  std::fs::write(&labels, "000001 0 0 5 5\n000002\n").unwrap();

  let examples = load_examples(&labels, &[clouds]).unwrap();
  let config = config();
  let model = InferenceAdapter::new(ExhaustiveOracle::default(), &config).with_verify(true);
  let mut buffer = Vec::new();
  ViolationTask::new(&WEIGHTS)
    .with_chunk_size(1)
    .run_task(examples.as_slice(), &model, &mut buffer)
    .unwrap();

  let text = String::from_utf8(buffer).unwrap();
  let lines: Vec<Value> = text
    .lines()
    .map(|l| serde_json::from_str(l).unwrap())
    .collect();
  assert_eq!(lines.len(), 2);

  assert_eq!(lines[0]["id"], "000001");
  assert_eq!(lines[0]["loss"], 1.0);
  assert_eq!(lines[0]["w_psi"], 1.0);
  assert_eq!(lines[0]["score"], 2.0);

  // 负样本：搜索得分不含损失，本地损失恒为 1
  assert_eq!(lines[1]["id"], "000002");
  assert_eq!(lines[1]["loss"], 1.0);
  assert_eq!(lines[1]["score"], 1.0);

  std::fs::remove_dir_all(&root).unwrap();
}
