// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/inference.rs - 损失增强推理适配器
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

use std::error::Error as StdError;

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  config::ModelConfig,
  dataset::Example,
  feature::{FeatureError, joint_score},
  geometry::BBox,
  image::PointCloud,
  label::Label,
  loss::LossKind,
  oracle::{InferenceOracle, OracleRequest, PackingError, RequestError},
};

/// 搜索结果与重新计算的目标值允许的误差
pub const SCORE_TOLERANCE: f64 = 1e-4;

#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("打包错误: {0}")]
  Packing(#[from] PackingError),
  #[error("特征错误: {0}")]
  Feature(#[from] FeatureError),
  #[error("搜索失败: {0}")]
  Oracle(Box<dyn StdError + Send + Sync>),
  #[error("搜索结果 {bbox} 不在 {width}x{height} 图像内")]
  ContractViolation { bbox: BBox, width: i32, height: i32 },
  #[error("搜索实现不支持损失 {0:?}")]
  UnsupportedLoss(LossKind),
}

impl From<RequestError> for InferenceError {
  fn from(err: RequestError) -> Self {
    match err {
      RequestError::Packing(e) => InferenceError::Packing(e),
      RequestError::Feature(e) => InferenceError::Feature(e),
    }
  }
}

/// 把权重、点云和真值打包交给搜索实现，再把结果解包成 [`BBox`]
///
/// 适配器本身不保存搜索状态，也不重试；搜索失败直接返回给调用方。
pub struct InferenceAdapter<'a, O> {
  oracle: O,
  config: &'a ModelConfig,
  verify: bool,
}

impl<'a, O: InferenceOracle> InferenceAdapter<'a, O> {
  pub fn new(oracle: O, config: &'a ModelConfig) -> Self {
    Self {
      oracle,
      config,
      verify: false,
    }
  }

  /// 开启后会在本地重新计算 `w·psi + Delta` 并与搜索结果比较
  pub fn with_verify(mut self, verify: bool) -> Self {
    self.verify = verify;
    self
  }

  pub fn config(&self) -> &ModelConfig {
    self.config
  }

  /// 最违反约束的框：`argmax_y w·psi(x, y) + Delta(label, y)`
  pub fn find_most_violated(
    &self,
    image: &PointCloud,
    weights: &[f64],
    label: &Label,
  ) -> Result<BBox, InferenceError> {
    let loss_kind = self.config.loss();
    if !self.oracle.supports_loss(loss_kind) {
      return Err(InferenceError::UnsupportedLoss(loss_kind));
    }

    let request = OracleRequest::new(image, weights, label, self.config)?;

    let now = std::time::Instant::now();
    let raw = self
      .oracle
      .search(&request)
      .map_err(|e| InferenceError::Oracle(Box::new(e)))?;
    debug!(
      "图像 {} 搜索完成，耗时: {:.2?}",
      image.id().unwrap_or("<unnamed>"),
      now.elapsed()
    );

    let bbox = BBox::from(raw);
    let clamped = bbox.clamp_to(image.width(), image.height());
    let inside = (clamped.left, clamped.top, clamped.right, clamped.bottom)
      == (bbox.left, bbox.top, bbox.right, bbox.bottom);
    if !bbox.is_legal() || !inside {
      return Err(InferenceError::ContractViolation {
        bbox,
        width: image.width(),
        height: image.height(),
      });
    }

    if self.verify {
      self.check_score(image, weights, &request, &bbox)?;
    }

    Ok(bbox)
  }

  /// 测试阶段的分类：无真值，返回权重得分最高的框
  pub fn classify(&self, image: &PointCloud, weights: &[f64]) -> Result<BBox, InferenceError> {
    self.find_most_violated(image, weights, &Label::Unknown)
  }

  fn check_score(
    &self,
    image: &PointCloud,
    weights: &[f64],
    request: &OracleRequest,
    bbox: &BBox,
  ) -> Result<(), InferenceError> {
    // 负样本的 gt_count 为 0，搜索库看不到固定损失 1，按它实际看到的标签比较
    let expected = joint_score(image, bbox, weights, &request.visible_label(), self.config)?;
    if (expected - bbox.score).abs() >= SCORE_TOLERANCE {
      warn!(
        "图像 {} 的搜索得分与本地重算不一致: {:.6} != {:.6}",
        image.id().unwrap_or("<unnamed>"),
        bbox.score,
        expected
      );
    }
    Ok(())
  }
}

impl<O: InferenceOracle + Sync> InferenceAdapter<'_, O> {
  /// 对一批样本分别求最违反约束的框；每个样本的失败互不影响
  ///
  /// 权重在整批调用期间只读共享。
  pub fn find_most_violated_batch(
    &self,
    examples: &[Example],
    weights: &[f64],
  ) -> Vec<Result<BBox, InferenceError>> {
    #[cfg(feature = "parallel")]
    {
      use rayon::prelude::*;
      examples
        .par_iter()
        .map(|e| self.find_most_violated(&e.image, weights, &e.label))
        .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
      examples
        .iter()
        .map(|e| self.find_most_violated(&e.image, weights, &e.label))
        .collect()
    }
  }
}
