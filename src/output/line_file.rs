// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/output/line_file.rs - 逐行文本输出
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

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::PathBuf,
  sync::{Mutex, PoisonError},
};

use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  geometry::BBox,
  image::PointCloud,
  output::{OutputError, PredictionRecord, Render},
};

/// 写入文本文件，每个预测一行
pub struct LineFileOutput {
  path: PathBuf,
  record: PredictionRecord,
  writer: Mutex<BufWriter<File>>,
}

impl FromUrlWithScheme for LineFileOutput {
  const SCHEME: &'static str = "file";
}

impl FromUrl for LineFileOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch(url.scheme().to_string()));
    }

    let path = url
      .to_file_path()
      .map_err(|_| OutputError::InvalidPath(url.to_string()))?;
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let file = File::create(&path)?;
    info!("预测结果写入 {}", path.display());

    Ok(LineFileOutput {
      path,
      record: PredictionRecord::from_query(url),
      writer: Mutex::new(BufWriter::new(file)),
    })
  }
}

impl LineFileOutput {
  pub fn path(&self) -> &PathBuf {
    &self.path
  }
}

impl Render<PointCloud, BBox> for LineFileOutput {
  type Error = OutputError;

  fn render_result(&self, input: &PointCloud, result: &BBox) -> Result<(), Self::Error> {
    let line = self.record.format(input, result);
    let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
    writeln!(writer, "{}", line)?;
    Ok(())
  }

  fn finish(&self) -> Result<(), Self::Error> {
    let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
    writer.flush()?;
    Ok(())
  }
}

/// 写到标准输出
#[derive(Debug, Default)]
pub struct StdoutOutput {
  record: PredictionRecord,
}

impl FromUrlWithScheme for StdoutOutput {
  const SCHEME: &'static str = "stdout";
}

impl FromUrl for StdoutOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch(url.scheme().to_string()));
    }
    Ok(StdoutOutput {
      record: PredictionRecord::from_query(url),
    })
  }
}

impl Render<PointCloud, BBox> for StdoutOutput {
  type Error = OutputError;

  fn render_result(&self, input: &PointCloud, result: &BBox) -> Result<(), Self::Error> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", self.record.format(input, result))?;
    Ok(())
  }

  fn finish(&self) -> Result<(), Self::Error> {
    std::io::stdout().lock().flush()?;
    Ok(())
  }
}
