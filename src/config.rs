// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/config.rs - 模型参数配置
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

use clap::ValueEnum;
use thiserror::Error;

use crate::loss::LossKind;

/// 视觉词典大小（直方图维度）
pub const DEFAULT_NUMBINS: usize = 3000;
/// 空间金字塔层数，目前固定为 1
pub const DEFAULT_NUMLEVELS: usize = 1;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("numbins 必须大于 0")]
  ZeroBins,
  #[error("numlevels 必须大于 0")]
  ZeroLevels,
  #[error("numbins 超出外部接口范围: {0}")]
  TooManyBins(usize),
}

/// 聚类编号超出 `[0, numbins)` 时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ClusterPolicy {
  /// 截断到最近的合法编号，并输出警告
  Clip,
  /// 直接报错
  #[default]
  Fail,
}

/// 模型参数，训练开始前构造一次，之后只读
///
/// 训练与测试共用同一个实例。
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
  numbins: usize,
  numlevels: usize,
  cluster_policy: ClusterPolicy,
  loss: LossKind,
}

impl Default for ModelConfig {
  fn default() -> Self {
    Self {
      numbins: DEFAULT_NUMBINS,
      numlevels: DEFAULT_NUMLEVELS,
      cluster_policy: ClusterPolicy::default(),
      loss: LossKind::default(),
    }
  }
}

impl ModelConfig {
  pub fn builder() -> ModelConfigBuilder {
    ModelConfigBuilder::default()
  }

  pub fn numbins(&self) -> usize {
    self.numbins
  }

  pub fn numlevels(&self) -> usize {
    self.numlevels
  }

  pub fn cluster_policy(&self) -> ClusterPolicy {
    self.cluster_policy
  }

  pub fn loss(&self) -> LossKind {
    self.loss
  }

  /// 特征向量维度；无空间金字塔时等于 numbins
  pub fn size_psi(&self) -> usize {
    self.numbins
  }
}

#[derive(Debug, Clone, Default)]
pub struct ModelConfigBuilder {
  inner: ModelConfig,
}

impl ModelConfigBuilder {
  pub fn numbins(mut self, numbins: usize) -> Self {
    self.inner.numbins = numbins;
    self
  }

  pub fn numlevels(mut self, numlevels: usize) -> Self {
    self.inner.numlevels = numlevels;
    self
  }

  pub fn cluster_policy(mut self, policy: ClusterPolicy) -> Self {
    self.inner.cluster_policy = policy;
    self
  }

  pub fn loss(mut self, loss: LossKind) -> Self {
    self.inner.loss = loss;
    self
  }

  pub fn build(self) -> Result<ModelConfig, ConfigError> {
    if self.inner.numbins == 0 {
      return Err(ConfigError::ZeroBins);
    }
    if self.inner.numlevels == 0 {
      return Err(ConfigError::ZeroLevels);
    }
    // 外部库以 C int 接收 numbins
    if self.inner.numbins > i32::MAX as usize {
      return Err(ConfigError::TooManyBins(self.inner.numbins));
    }
    Ok(self.inner)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_visual_word_codebook() {
    let config = ModelConfig::default();
    assert_eq!(config.numbins(), 3000);
    assert_eq!(config.numlevels(), 1);
    assert_eq!(config.size_psi(), 3000);
    assert_eq!(config.cluster_policy(), ClusterPolicy::Fail);
    assert_eq!(config.loss(), LossKind::OneMinusOverlap);
  }

  #[test]
  fn builder_rejects_zero_sizes() {
    assert_eq!(
      ModelConfig::builder().numbins(0).build(),
      Err(ConfigError::ZeroBins)
    );
    assert_eq!(
      ModelConfig::builder().numlevels(0).build(),
      Err(ConfigError::ZeroLevels)
    );
  }

  #[test]
  fn builder_overrides_fields() {
    let config = ModelConfig::builder()
      .numbins(3)
      .cluster_policy(ClusterPolicy::Clip)
      .loss(LossKind::ZeroOne)
      .build()
      .unwrap();
    assert_eq!(config.numbins(), 3);
    assert_eq!(config.cluster_policy(), ClusterPolicy::Clip);
    assert_eq!(config.loss(), LossKind::ZeroOne);
  }
}
