// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/loss.rs - 结构化损失 Delta(y, y')
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

use crate::{
  geometry::{BBox, overlap},
  label::Label,
};

/// 由最大交并比到损失值的映射
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LossKind {
  /// `1 - o`
  #[default]
  OneMinusOverlap,
  /// `max(1 - 2o, 0)`，50% 重叠以上不计损失
  Tolerant,
  /// VOC 式 0-1 损失：`o >= 0.5` 为 0，否则为 1
  ZeroOne,
}

impl LossKind {
  pub fn apply(self, overlap: f64) -> f64 {
    match self {
      LossKind::OneMinusOverlap => 1.0 - overlap,
      LossKind::Tolerant => (1.0 - 2.0 * overlap).max(0.0),
      LossKind::ZeroOne => {
        if overlap >= 0.5 {
          0.0
        } else {
          1.0
        }
      }
    }
  }
}

/// 候选框相对真值标签的损失
///
/// - `Unknown`（测试阶段）：0
/// - `Negative`：固定为 1，任何预测框都是完全错误的
/// - `Positive`：取与所有真值框的最大交并比，只要命中最近的一个实例即可
pub fn loss(label: &Label, candidate: &BBox, kind: LossKind) -> f64 {
  match label {
    Label::Unknown => 0.0,
    Label::Negative => 1.0,
    Label::Positive(boxes) => {
      let max_overlap = boxes
        .iter()
        .map(|gt| overlap(gt, candidate))
        .fold(0.0, f64::max);
      kind.apply(max_overlap)
    }
  }
}
