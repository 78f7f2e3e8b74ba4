// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/dataset.rs - 训练/测试样本读取
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::{
  geometry::BBox,
  image::{PointCloud, PointCloudError},
  label::Label,
};

#[derive(Error, Debug)]
pub enum DatasetError {
  #[error("I/O 错误 {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("{path} 第 {line} 行格式错误: {reason}")]
  Parse {
    path: PathBuf,
    line: usize,
    reason: String,
  },
  #[error("找不到图像 {0} 的点云文件")]
  MissingCloud(String),
  #[error("点云 {path} 无效: {source}")]
  Cloud {
    path: PathBuf,
    source: PointCloudError,
  },
}

/// 一个训练或测试样本
#[derive(Debug, Clone)]
pub struct Example {
  pub image: PointCloud,
  pub label: Label,
}

/// 标签文件中的一条记录
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEntry {
  pub id: String,
  pub boxes: Vec<BBox>,
}

impl LabelEntry {
  pub fn label(&self) -> Label {
    if self.boxes.is_empty() {
      Label::Negative
    } else {
      Label::Positive(self.boxes.clone())
    }
  }
}

fn strip_comment(line: &str) -> &str {
  match line.find('#') {
    Some(pos) => &line[..pos],
    None => line,
  }
}

fn read_to_string(path: &Path) -> Result<String, DatasetError> {
  std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
    path: path.to_path_buf(),
    source,
  })
}

/// 数字 ID 按数值比较（`5` 与 `000005` 相同），其余按字符串比较
fn same_id(a: &str, b: &str) -> bool {
  match (a.parse::<u64>(), b.parse::<u64>()) {
    (Ok(a), Ok(b)) => a == b,
    _ => a == b,
  }
}

/// 解析 VOC 风格的标签文本
///
/// 每行 `ID [left top right bottom]`，只有 ID 表示负样本图像。
/// 相邻且 ID 相同的行合并为一个含多个框的正样本。
pub fn parse_labels(text: &str, path: &Path) -> Result<Vec<LabelEntry>, DatasetError> {
  let mut entries: Vec<LabelEntry> = Vec::new();

  for (lineno, line) in text.lines().enumerate() {
    let tokens: Vec<&str> = strip_comment(line).split_whitespace().collect();
    if tokens.is_empty() {
      continue;
    }
    let parse_err = |reason: String| DatasetError::Parse {
      path: path.to_path_buf(),
      line: lineno + 1,
      reason,
    };

    let id = tokens[0].to_string();
    let bbox = match tokens.len() {
      1 => None,
      5 => {
        let mut coords = [0i32; 4];
        for (slot, token) in coords.iter_mut().zip(&tokens[1..]) {
          *slot = token
            .parse()
            .map_err(|_| parse_err(format!("坐标无效: {}", token)))?;
        }
        Some(BBox::new(coords[0], coords[1], coords[2], coords[3]).with_score(1.0))
      }
      n => return Err(parse_err(format!("期望 1 或 5 个字段，实际 {} 个", n))),
    };

    match entries.last_mut() {
      Some(last) if same_id(&last.id, &id) => {
        if let Some(b) = bbox {
          last.boxes.push(b);
        }
      }
      _ => entries.push(LabelEntry {
        id,
        boxes: bbox.into_iter().collect(),
      }),
    }
  }

  Ok(entries)
}

/// 解析点云文本，每行 `x y c`，数值可以写成浮点数，按整数截断
pub fn parse_cloud(text: &str, path: &Path) -> Result<PointCloud, DatasetError> {
  let (mut xs, mut ys, mut cs) = (Vec::new(), Vec::new(), Vec::new());

  for (lineno, line) in text.lines().enumerate() {
    let tokens: Vec<&str> = strip_comment(line).split_whitespace().collect();
    if tokens.is_empty() {
      continue;
    }
    if tokens.len() < 3 {
      return Err(DatasetError::Parse {
        path: path.to_path_buf(),
        line: lineno + 1,
        reason: format!("期望至少 3 列，实际 {} 列", tokens.len()),
      });
    }
    let mut values = [0i32; 3];
    for (slot, token) in values.iter_mut().zip(&tokens) {
      let parse_err = |reason: String| DatasetError::Parse {
        path: path.to_path_buf(),
        line: lineno + 1,
        reason,
      };
      let v: f64 = token
        .parse()
        .map_err(|_| parse_err(format!("数值无效: {}", token)))?;
      if !v.is_finite() || v < i32::MIN as f64 || v > i32::MAX as f64 {
        return Err(parse_err(format!("数值超出 i32 范围: {}", token)));
      }
      *slot = v as i32;
    }
    xs.push(values[0]);
    ys.push(values[1]);
    cs.push(values[2]);
  }

  PointCloud::new(xs, ys, cs).map_err(|source| DatasetError::Cloud {
    path: path.to_path_buf(),
    source,
  })
}

/// 按 `<dir>/<ID 补零到 6 位>.clst` 在各目录中依次查找点云文件
pub fn cloud_path(id: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
  let name = match id.parse::<u64>() {
    Ok(n) => format!("{:06}.clst", n),
    Err(_) => format!("{}.clst", id),
  };
  dirs.iter().map(|d| d.join(&name)).find(|p| p.is_file())
}

/// 读取标签文件及其引用的全部点云
pub fn load_examples(label_file: &Path, cloud_dirs: &[PathBuf]) -> Result<Vec<Example>, DatasetError> {
  let entries = parse_labels(&read_to_string(label_file)?, label_file)?;
  info!("读取标签文件 {}: {} 个样本", label_file.display(), entries.len());

  let mut examples = Vec::with_capacity(entries.len());
  for entry in entries {
    let path = cloud_path(&entry.id, cloud_dirs).ok_or_else(|| DatasetError::MissingCloud(entry.id.clone()))?;
    debug!("读取点云 {}", path.display());
    let image = parse_cloud(&read_to_string(&path)?, &path)?.with_id(entry.id.clone());
    examples.push(Example {
      label: entry.label(),
      image,
    });
  }

  let positives = examples.iter().filter(|e| e.label.is_positive()).count();
  info!(
    "共 {} 个样本，其中正样本 {} 个",
    examples.len(),
    positives
  );
  Ok(examples)
}
