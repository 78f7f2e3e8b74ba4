// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/image.rs - 视觉词点云
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

use crate::geometry::BBox;

#[derive(Error, Debug, PartialEq)]
pub enum PointCloudError {
  #[error("点云为空")]
  Empty,
  #[error("坐标数组长度不一致: x={x}, y={y}, c={c}")]
  LengthMismatch { x: usize, y: usize, c: usize },
  #[error("第 {index} 个点坐标为负: ({x}, {y})")]
  NegativeCoordinate { index: usize, x: i32, y: i32 },
  #[error("第 {index} 个点坐标过大: ({x}, {y})")]
  CoordinateOverflow { index: usize, x: i32, y: i32 },
}

/// 以视觉词点云表示的图像
///
/// 每个点有像素坐标 (x, y) 和聚类编号 c。宽高由坐标最大值推出，构造后不可变。
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
  id: Option<String>,
  x: Vec<i32>,
  y: Vec<i32>,
  c: Vec<i32>,
  width: i32,
  height: i32,
}

impl PointCloud {
  pub fn new(x: Vec<i32>, y: Vec<i32>, c: Vec<i32>) -> Result<Self, PointCloudError> {
    if x.len() != y.len() || x.len() != c.len() {
      return Err(PointCloudError::LengthMismatch {
        x: x.len(),
        y: y.len(),
        c: c.len(),
      });
    }
    if x.is_empty() {
      return Err(PointCloudError::Empty);
    }
    if let Some(index) = x.iter().zip(&y).position(|(&px, &py)| px < 0 || py < 0) {
      return Err(PointCloudError::NegativeCoordinate {
        index,
        x: x[index],
        y: y[index],
      });
    }

    // 宽高为最大坐标加 1，必须仍在 i32 内
    if let Some(index) = x
      .iter()
      .zip(&y)
      .position(|(&px, &py)| px == i32::MAX || py == i32::MAX)
    {
      return Err(PointCloudError::CoordinateOverflow {
        index,
        x: x[index],
        y: y[index],
      });
    }

    let width = x.iter().copied().max().unwrap_or(0) + 1;
    let height = y.iter().copied().max().unwrap_or(0) + 1;

    Ok(Self {
      id: None,
      x,
      y,
      c,
      width,
      height,
    })
  }

  /// 由 `(x, y, c)` 三元组构造
  pub fn from_points(points: &[(i32, i32, i32)]) -> Result<Self, PointCloudError> {
    let x = points.iter().map(|p| p.0).collect();
    let y = points.iter().map(|p| p.1).collect();
    let c = points.iter().map(|p| p.2).collect();
    Self::new(x, y, c)
  }

  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    self.id = Some(id.into());
    self
  }

  pub fn id(&self) -> Option<&str> {
    self.id.as_deref()
  }

  pub fn len(&self) -> usize {
    self.x.len()
  }

  pub fn is_empty(&self) -> bool {
    self.x.is_empty()
  }

  pub fn width(&self) -> i32 {
    self.width
  }

  pub fn height(&self) -> i32 {
    self.height
  }

  pub fn xs(&self) -> &[i32] {
    &self.x
  }

  pub fn ys(&self) -> &[i32] {
    &self.y
  }

  pub fn clusters(&self) -> &[i32] {
    &self.c
  }

  /// 覆盖整幅图像的框
  pub fn full_box(&self) -> BBox {
    BBox::new(0, 0, self.width - 1, self.height - 1)
  }

  pub fn points(&self) -> impl Iterator<Item = (i32, i32, i32)> + '_ {
    self
      .x
      .iter()
      .zip(&self.y)
      .zip(&self.c)
      .map(|((&x, &y), &c)| (x, y, c))
  }

  /// 落在框内（含边界）的点
  pub fn points_in<'a>(&'a self, bbox: &'a BBox) -> impl Iterator<Item = (i32, i32, i32)> + 'a {
    self.points().filter(move |&(x, y, _)| bbox.contains(x, y))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn size_is_derived_from_max_coordinates() {
    let cloud = PointCloud::from_points(&[(0, 0, 1), (5, 5, 2), (9, 7, 1)]).unwrap();
    assert_eq!(cloud.len(), 3);
    assert_eq!(cloud.width(), 10);
    assert_eq!(cloud.height(), 8);
    assert_eq!(cloud.full_box(), BBox::new(0, 0, 9, 7));
  }

  #[test]
  fn rejects_malformed_clouds() {
    assert_eq!(PointCloud::from_points(&[]), Err(PointCloudError::Empty));
    assert_eq!(
      PointCloud::new(vec![1, 2], vec![1], vec![0, 0]),
      Err(PointCloudError::LengthMismatch { x: 2, y: 1, c: 2 })
    );
    assert_eq!(
      PointCloud::from_points(&[(0, 0, 0), (-1, 3, 0)]),
      Err(PointCloudError::NegativeCoordinate {
        index: 1,
        x: -1,
        y: 3
      })
    );
  }

  #[test]
  fn rejects_coordinates_without_room_for_size() {
    assert_eq!(
      PointCloud::from_points(&[(0, 0, 0), (i32::MAX, 0, 1)]),
      Err(PointCloudError::CoordinateOverflow {
        index: 1,
        x: i32::MAX,
        y: 0
      })
    );
    assert!(matches!(
      PointCloud::from_points(&[(2, i32::MAX, 1)]),
      Err(PointCloudError::CoordinateOverflow { index: 0, .. })
    ));
    let edge = PointCloud::from_points(&[(i32::MAX - 1, 0, 0)]).unwrap();
    assert_eq!(edge.width(), i32::MAX);
  }

  #[test]
  fn points_in_box_are_inclusive() {
    let cloud = PointCloud::from_points(&[(0, 0, 1), (5, 5, 2), (9, 9, 1)]).unwrap();
    let inside: Vec<_> = cloud.points_in(&BBox::new(0, 0, 5, 5)).collect();
    assert_eq!(inside, vec![(0, 0, 1), (5, 5, 2)]);
  }
}
