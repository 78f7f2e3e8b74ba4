// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/geometry.rs - 矩形框几何运算
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

use std::fmt;

/// 轴对齐矩形框，四条边界均为闭区间
///
/// `left == right && top == bottom` 的框面积为 1。
/// `left > right` 或 `top > bottom` 的框是非法框，面积视为 0，但它仍然是合法的值。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
  pub left: i32,
  pub top: i32,
  pub right: i32,
  pub bottom: i32,
  pub score: f64,
}

impl BBox {
  pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
    Self {
      left,
      top,
      right,
      bottom,
      score: 0.0,
    }
  }

  pub fn with_score(mut self, score: f64) -> Self {
    self.score = score;
    self
  }

  pub fn is_legal(&self) -> bool {
    self.left <= self.right && self.top <= self.bottom
  }

  /// 点 (x, y) 是否落在框内（含边界）
  pub fn contains(&self, x: i32, y: i32) -> bool {
    x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
  }

  /// 将框裁剪到 `[0, width) x [0, height)` 内
  pub fn clamp_to(&self, width: i32, height: i32) -> Self {
    Self {
      left: self.left.max(0),
      top: self.top.max(0),
      right: self.right.min(width - 1),
      bottom: self.bottom.min(height - 1),
      score: self.score,
    }
  }

  pub fn area(&self) -> i64 {
    area(self)
  }
}

impl fmt::Display for BBox {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "[{}, {}, {}, {}] ({:.4})",
      self.left, self.top, self.right, self.bottom, self.score
    )
  }
}

/// 闭区间面积；非法框返回 0
pub fn area(bbox: &BBox) -> i64 {
  if !bbox.is_legal() {
    return 0;
  }
  (bbox.right as i64 - bbox.left as i64 + 1) * (bbox.bottom as i64 - bbox.top as i64 + 1)
}

/// 两框的交集，结果可能是非法框
pub fn intersection(a: &BBox, b: &BBox) -> BBox {
  BBox::new(
    a.left.max(b.left),
    a.top.max(b.top),
    a.right.min(b.right),
    a.bottom.min(b.bottom),
  )
}

/// 交并比 (IoU)，取值 [0, 1]
///
/// 并集不是矩形，但其面积等于 `area(a) + area(b) - area(a ∩ b)`。
pub fn overlap(a: &BBox, b: &BBox) -> f64 {
  let inter = intersection(a, b);
  if !inter.is_legal() {
    return 0.0;
  }
  let inter_area = area(&inter);
  let union_area = area(a) + area(b) - inter_area;
  if union_area <= 0 {
    return 0.0;
  }
  inter_area as f64 / union_area as f64
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn legal_boxes_have_positive_area() {
    let boxes = [
      BBox::new(0, 0, 0, 0),
      BBox::new(3, 4, 3, 9),
      BBox::new(-5, -5, 5, 5),
      BBox::new(10, 20, 30, 40),
    ];
    for b in boxes {
      assert!(b.is_legal());
      assert!(area(&b) >= 1, "expected positive area for {}", b);
    }
    assert_eq!(area(&BBox::new(0, 0, 0, 0)), 1);
    assert_eq!(area(&BBox::new(0, 0, 5, 5)), 36);
  }

  #[test]
  fn illegal_boxes_have_zero_area() {
    for b in [
      BBox::new(5, 0, 4, 10),
      BBox::new(0, 5, 10, 4),
      BBox::new(9, 9, 0, 0),
    ] {
      assert!(!b.is_legal());
      assert_eq!(area(&b), 0, "illegal box {} must have zero area", b);
    }
  }

  #[test]
  fn overlap_with_itself_is_one() {
    for b in [
      BBox::new(0, 0, 0, 0),
      BBox::new(1, 2, 30, 40),
      BBox::new(-3, -3, 3, 3),
    ] {
      assert!((overlap(&b, &b) - 1.0).abs() < 1e-12);
    }
  }

  #[test]
  fn overlap_is_symmetric() {
    let pairs = [
      (BBox::new(0, 0, 9, 9), BBox::new(5, 5, 14, 14)),
      (BBox::new(0, 0, 3, 3), BBox::new(0, 0, 7, 1)),
      (BBox::new(2, 2, 4, 4), BBox::new(10, 10, 12, 12)),
    ];
    for (a, b) in pairs {
      assert_eq!(overlap(&a, &b), overlap(&b, &a));
    }
  }

  #[test]
  fn partial_overlap_matches_hand_computation() {
    // 交集 5x5=25，并集 100+100-25=175
    let a = BBox::new(0, 0, 9, 9);
    let b = BBox::new(5, 5, 14, 14);
    assert!((overlap(&a, &b) - 25.0 / 175.0).abs() < 1e-12);
  }

  #[test]
  fn disjoint_boxes_do_not_overlap() {
    let a = BBox::new(0, 0, 5, 5);
    let b = BBox::new(6, 6, 9, 9);
    assert!(!intersection(&a, &b).is_legal());
    assert_eq!(overlap(&a, &b), 0.0);
  }

  #[test]
  fn illegal_box_never_overlaps() {
    let a = BBox::new(0, 0, 5, 5);
    let bad = BBox::new(4, 4, 2, 2);
    assert_eq!(overlap(&a, &bad), 0.0);
    assert_eq!(overlap(&bad, &bad), 0.0);
  }

  #[test]
  fn contains_is_inclusive() {
    let b = BBox::new(0, 0, 5, 5);
    assert!(b.contains(0, 0));
    assert!(b.contains(5, 5));
    assert!(!b.contains(6, 5));
    assert!(!b.contains(-1, 0));
  }

  #[test]
  fn clamp_keeps_box_inside_image() {
    let b = BBox::new(-2, -3, 20, 30).with_score(0.5);
    let c = b.clamp_to(10, 12);
    assert_eq!((c.left, c.top, c.right, c.bottom), (0, 0, 9, 11));
    assert_eq!(c.score, 0.5);
  }
}
