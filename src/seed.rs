// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/seed.rs - 初始约束
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

use tracing::info;

use crate::{
  config::ModelConfig,
  dataset::Example,
  feature::{FeatureError, FeatureVector, psi},
};

/// 初始约束的松弛变量编号偏移，与每轮迭代使用的 `1..=n` 不相交
pub const SEED_SLACK_OFFSET: usize = 100_000;

/// 间隔约束 `w · features >= rhs - xi_{slack_id}`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
  pub features: FeatureVector,
  pub rhs: f64,
  pub slack_id: usize,
  pub cost_factor: f64,
}

/// 初始约束共用的松弛变量编号
pub fn seed_slack_id(sample_len: usize) -> usize {
  sample_len + 1 + SEED_SLACK_OFFSET
}

/// 为每个正样本框生成 “F(x, box) - F(x, 无框) >= 1 - xi” 约束
///
/// 这些约束在训练全程保留，修正权重全零时损失增强搜索的退化起点。
/// 负样本不生成约束。
pub fn seed_constraints(
  sample: &[Example],
  config: &ModelConfig,
) -> Result<Vec<Constraint>, FeatureError> {
  let slack_id = seed_slack_id(sample.len());
  let mut constraints = Vec::new();

  for example in sample {
    for bbox in example.label.boxes() {
      constraints.push(Constraint {
        features: psi(&example.image, bbox, config)?,
        rhs: 1.0,
        slack_id,
        cost_factor: 1.0,
      });
    }
  }

  info!(
    "生成 {} 条初始约束，松弛变量编号 {}",
    constraints.len(),
    slack_id
  );
  Ok(constraints)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{geometry::BBox, image::PointCloud, label::Label};

  fn image() -> PointCloud {
    PointCloud::from_points(&[(0, 0, 1), (5, 5, 2), (9, 9, 1)]).unwrap()
  }

  #[test]
  fn only_positive_boxes_are_seeded() {
    let config = ModelConfig::builder().numbins(3).build().unwrap();
    let sample = vec![
      Example {
        image: image(),
        label: Label::Positive(vec![BBox::new(0, 0, 5, 5), BBox::new(6, 6, 9, 9)]),
      },
      Example {
        image: image(),
        label: Label::Negative,
      },
      Example {
        image: image(),
        label: Label::Unknown,
      },
    ];

    let constraints = seed_constraints(&sample, &config).unwrap();
    assert_eq!(constraints.len(), 2);
    assert_eq!(constraints[0].features.to_dense(), vec![0, 1, 1]);
    assert_eq!(constraints[1].features.to_dense(), vec![0, 1, 0]);
    for c in &constraints {
      assert_eq!(c.rhs, 1.0);
      assert_eq!(c.cost_factor, 1.0);
      assert_eq!(c.slack_id, 100_004);
      assert!(c.slack_id > sample.len());
    }
  }

  #[test]
  fn negative_only_sample_seeds_nothing() {
    let config = ModelConfig::builder().numbins(3).build().unwrap();
    let sample = vec![Example {
      image: image(),
      label: Label::Negative,
    }];
    assert!(seed_constraints(&sample, &config).unwrap().is_empty());
  }
}
