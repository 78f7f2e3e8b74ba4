// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/feature.rs - 联合特征映射 Psi(x, y)
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

use thiserror::Error;
use tracing::warn;

use crate::{
  config::{ClusterPolicy, ModelConfig},
  geometry::BBox,
  image::PointCloud,
  label::Label,
  loss::loss,
};

#[derive(Error, Debug, PartialEq)]
pub enum FeatureError {
  #[error("聚类编号 {cluster} 超出范围 [0, {numbins})")]
  ClusterOutOfRange { cluster: i32, numbins: usize },
  #[error("权重向量长度不匹配: 期望 {expected}, 实际 {actual}")]
  WeightLength { expected: usize, actual: usize },
}

/// 稀疏直方图特征，下标升序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureVector {
  dim: usize,
  indices: Vec<usize>,
  values: Vec<u32>,
}

impl FeatureVector {
  pub fn zeros(dim: usize) -> Self {
    Self {
      dim,
      indices: Vec::new(),
      values: Vec::new(),
    }
  }

  /// 由稠密计数构造，丢弃零项
  pub fn from_dense(counts: &[u32]) -> Self {
    let (indices, values) = counts
      .iter()
      .enumerate()
      .filter(|(_, v)| **v > 0)
      .map(|(i, v)| (i, *v))
      .unzip();
    Self {
      dim: counts.len(),
      indices,
      values,
    }
  }

  pub fn dim(&self) -> usize {
    self.dim
  }

  /// 非零项个数
  pub fn nnz(&self) -> usize {
    self.indices.len()
  }

  pub fn is_zero(&self) -> bool {
    self.indices.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
    self.indices.iter().copied().zip(self.values.iter().copied())
  }

  pub fn to_dense(&self) -> Vec<u32> {
    let mut dense = vec![0; self.dim];
    for (i, v) in self.iter() {
      dense[i] = v;
    }
    dense
  }

  pub fn dot(&self, weights: &[f64]) -> Result<f64, FeatureError> {
    if weights.len() != self.dim {
      return Err(FeatureError::WeightLength {
        expected: self.dim,
        actual: weights.len(),
      });
    }
    Ok(self.iter().map(|(i, v)| weights[i] * v as f64).sum())
  }
}

/// 将聚类编号映射到直方图下标，按配置截断或报错
///
/// 返回 `(下标, 是否截断)`。
pub(crate) fn clip_cluster(cluster: i32, config: &ModelConfig) -> Result<(usize, bool), FeatureError> {
  let numbins = config.numbins();
  if cluster >= 0 && (cluster as usize) < numbins {
    return Ok((cluster as usize, false));
  }
  match config.cluster_policy() {
    ClusterPolicy::Fail => Err(FeatureError::ClusterOutOfRange { cluster, numbins }),
    ClusterPolicy::Clip => Ok(((cluster.max(0) as usize).min(numbins - 1), true)),
  }
}

pub(crate) fn warn_clipped(image: &PointCloud, clipped: usize, numbins: usize) {
  if clipped > 0 {
    warn!(
      "图像 {} 中有 {} 个点的聚类编号超出 [0, {})，已截断",
      image.id().unwrap_or("<unnamed>"),
      clipped,
      numbins
    );
  }
}

/// 图像限制在框内的视觉词直方图
///
/// 非法框或不含任何点的框得到全零向量。
pub fn psi(image: &PointCloud, bbox: &BBox, config: &ModelConfig) -> Result<FeatureVector, FeatureError> {
  if !bbox.is_legal() {
    return Ok(FeatureVector::zeros(config.size_psi()));
  }

  let mut counts = vec![0u32; config.size_psi()];
  let mut clipped = 0usize;
  for (_, _, c) in image.points_in(bbox) {
    let (bin, was_clipped) = clip_cluster(c, config)?;
    counts[bin] += 1;
    clipped += usize::from(was_clipped);
  }
  warn_clipped(image, clipped, config.numbins());

  Ok(FeatureVector::from_dense(&counts))
}

/// 线性打分 `w · psi(x, y)`
pub fn score(
  image: &PointCloud,
  bbox: &BBox,
  weights: &[f64],
  config: &ModelConfig,
) -> Result<f64, FeatureError> {
  psi(image, bbox, config)?.dot(weights)
}

/// 损失增强目标 `w · psi(x, y) + Delta(y*, y)`
pub fn joint_score(
  image: &PointCloud,
  bbox: &BBox,
  weights: &[f64],
  label: &Label,
  config: &ModelConfig,
) -> Result<f64, FeatureError> {
  Ok(score(image, bbox, weights, config)? + loss(label, bbox, config.loss()))
}
