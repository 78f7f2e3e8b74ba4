// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/output.rs - 预测结果输出
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
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, geometry::BBox, image::PointCloud};

pub trait Render<Input, Output>: Sized {
  type Error;
  fn render_result(&self, input: &Input, result: &Output) -> Result<(), Self::Error>;
  fn finish(&self) -> Result<(), Self::Error>;
}

mod line_file;
pub use self::line_file::{LineFileOutput, StdoutOutput};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("输出路径无效: {0}")]
  InvalidPath(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 预测记录格式：`score left top right bottom`，与 VOC 提交格式一致
///
/// 分数总是带小数点输出（`2.0` 而非 `2`）。`with_id` 为真时在行首加上图像编号。
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictionRecord {
  pub with_id: bool,
}

impl PredictionRecord {
  pub fn format(&self, image: &PointCloud, bbox: &BBox) -> String {
    let record = format!(
      "{:?} {} {} {} {}",
      bbox.score, bbox.left, bbox.top, bbox.right, bbox.bottom
    );
    match (self.with_id, image.id()) {
      (true, Some(id)) => format!("{} {}", id, record),
      _ => record,
    }
  }

  fn from_query(url: &Url) -> Self {
    PredictionRecord {
      with_id: url.query_pairs().any(|(k, _)| k == "with_id"),
    }
  }
}

pub enum OutputWrapper {
  LineFile(LineFileOutput),
  Stdout(StdoutOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LineFileOutput::SCHEME => Ok(OutputWrapper::LineFile(LineFileOutput::from_url(url)?)),
      StdoutOutput::SCHEME => Ok(OutputWrapper::Stdout(StdoutOutput::from_url(url)?)),
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Render<PointCloud, BBox> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, input: &PointCloud, result: &BBox) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::LineFile(output) => output.render_result(input, result),
      OutputWrapper::Stdout(output) => output.render_result(input, result),
    }
  }

  fn finish(&self) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::LineFile(output) => output.finish(),
      OutputWrapper::Stdout(output) => output.finish(),
    }
  }
}
