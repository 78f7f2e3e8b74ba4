// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/lib.rs - 库主文件
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

//! 结构化输出 SVM 目标定位中的损失增强推理与联合特征映射。
//!
//! 切平面训练器每轮给出权重向量，本库负责：
//! - 框的几何运算与损失 `Delta`（[`geometry`], [`loss`]）
//! - 框内视觉词直方图 `psi`（[`feature`]）
//! - 按外部分支定界库的数值约定打包请求并解包结果（[`oracle`], [`inference`]）
//! - 训练开始时的初始约束（[`seed`]）

pub mod config;
pub mod dataset;
pub mod feature;
pub mod geometry;
pub mod image;
pub mod inference;
pub mod label;
pub mod loss;
pub mod oracle;
pub mod output;
pub mod seed;
pub mod task;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}
