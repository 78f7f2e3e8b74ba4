// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/label.rs - 真值标签
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

use crate::geometry::BBox;

/// 单个样本的真值标签
///
/// 外部搜索库用框的分数符号区分正负样本；在本 crate 内部统一使用该枚举，
/// 只有打包给外部库时（见 [`crate::oracle::pack_ground_truth`]）才转换回带符号的扁平表示。
#[derive(Debug, Clone, PartialEq)]
pub enum Label {
  /// 图像中含有目标，至少一个真值框
  Positive(Vec<BBox>),
  /// 图像中不含目标
  Negative,
  /// 无监督信息（测试阶段）
  Unknown,
}

impl Label {
  /// 由若干正样本框构造标签，空列表视为 `Unknown`
  pub fn positive(boxes: Vec<BBox>) -> Self {
    if boxes.is_empty() {
      Label::Unknown
    } else {
      Label::Positive(boxes)
    }
  }

  pub fn is_positive(&self) -> bool {
    matches!(self, Label::Positive(_))
  }

  pub fn boxes(&self) -> &[BBox] {
    match self {
      Label::Positive(boxes) => boxes,
      _ => &[],
    }
  }

  /// 用于打分的代表框：正样本的第一个真值框
  pub fn representative(&self) -> Option<&BBox> {
    self.boxes().first()
  }

  /// 从分数带符号的框列表还原标签，只看第一个框的分数
  pub fn from_signed(boxes: &[BBox]) -> Self {
    match boxes.first() {
      None => Label::Unknown,
      Some(first) if first.score < 0.0 => Label::Negative,
      Some(_) => Label::Positive(boxes.to_vec()),
    }
  }

  /// 转换为分数带符号的框列表：正样本分数为 1，负样本为哨兵框 `[0,0,0,0]` 分数 -1
  pub fn to_signed(&self) -> Vec<BBox> {
    match self {
      Label::Positive(boxes) => boxes.iter().map(|b| b.with_score(1.0)).collect(),
      Label::Negative => vec![BBox::new(0, 0, 0, 0).with_score(-1.0)],
      Label::Unknown => Vec::new(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn signed_round_trip_keeps_kind() {
    let pos = Label::Positive(vec![BBox::new(1, 2, 3, 4), BBox::new(5, 6, 7, 8)]);
    assert_eq!(Label::from_signed(&pos.to_signed()), Label::Positive(pos.to_signed()));
    assert_eq!(Label::from_signed(&Label::Negative.to_signed()), Label::Negative);
    assert_eq!(Label::from_signed(&Label::Unknown.to_signed()), Label::Unknown);
  }

  #[test]
  fn negative_sentinel_is_decided_by_first_box() {
    let boxes = [
      BBox::new(0, 0, 0, 0).with_score(-1.0),
      BBox::new(1, 1, 2, 2).with_score(1.0),
    ];
    assert_eq!(Label::from_signed(&boxes), Label::Negative);
  }

  #[test]
  fn representative_is_first_positive_box() {
    let label = Label::positive(vec![BBox::new(1, 1, 2, 2), BBox::new(3, 3, 4, 4)]);
    assert_eq!(label.representative(), Some(&BBox::new(1, 1, 2, 2)));
    assert_eq!(Label::Negative.representative(), None);
    assert_eq!(Label::positive(Vec::new()), Label::Unknown);
  }
}
