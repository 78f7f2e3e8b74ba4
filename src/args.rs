// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

use subwindow::{
  config::{ClusterPolicy, ConfigError, DEFAULT_NUMBINS, DEFAULT_NUMLEVELS, ModelConfig},
  loss::LossKind,
};

/// Subwindow 参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 对测试图像求得分最高的框
  Classify {
    #[command(flatten)]
    data: DataArgs,
    #[command(flatten)]
    search: SearchArgs,
    /// 输出路径
    /// 支持格式:
    /// - stdout:
    /// - file:///path/to/pred.txt（追加 `?with_id` 在行首写图像编号）
    #[arg(long, value_name = "OUTPUT", default_value = "stdout:")]
    output: Url,
  },
  /// 输出训练开始时的初始约束（JSON 行）
  Seed {
    #[command(flatten)]
    data: DataArgs,
    /// 输出文件，缺省写到标准输出
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
  },
  /// 对训练样本求最违反约束的框（JSON 行）
  Violate {
    #[command(flatten)]
    data: DataArgs,
    #[command(flatten)]
    search: SearchArgs,
    /// 每块样本数，块之间响应 Ctrl-C
    #[arg(long, default_value_t = 64, value_name = "COUNT")]
    chunk_size: usize,
    /// 输出文件，缺省写到标准输出
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
  },
}

/// 数据与特征参数
#[derive(clap::Args, Debug)]
pub struct DataArgs {
  /// 标签文件，每行 `ID [left top right bottom]`
  #[arg(long, value_name = "FILE")]
  pub labels: PathBuf,
  /// 点云目录，按顺序查找 `ID.clst`
  #[arg(long, value_name = "DIR", required = true, num_args = 1..)]
  pub clouds: Vec<PathBuf>,
  /// 视觉词数量
  #[arg(long, default_value_t = DEFAULT_NUMBINS)]
  pub numbins: usize,
  /// 空间金字塔层数
  #[arg(long, default_value_t = DEFAULT_NUMLEVELS)]
  pub numlevels: usize,
  /// 视觉词编号越界时的处理方式
  #[arg(long, value_enum, default_value_t = ClusterPolicy::Fail)]
  pub cluster_policy: ClusterPolicy,
  /// 损失函数
  #[arg(long, value_enum, default_value_t = LossKind::OneMinusOverlap)]
  pub loss: LossKind,
}

impl DataArgs {
  pub fn model_config(&self) -> Result<ModelConfig, ConfigError> {
    ModelConfig::builder()
      .numbins(self.numbins)
      .numlevels(self.numlevels)
      .cluster_policy(self.cluster_policy)
      .loss(self.loss)
      .build()
  }
}

/// 搜索参数
#[derive(clap::Args, Debug)]
pub struct SearchArgs {
  /// 搜索实现
  /// 支持格式:
  /// - exhaustive://（可选 `?max_candidates=N&loss=tolerant`）
  /// - ess://（需要 libess 特性）
  /// 均可追加 `timeout_ms=N`
  #[arg(long, value_name = "ORACLE", default_value = "exhaustive://")]
  pub oracle: Url,
  /// 权重文件（JSON 数组）
  #[arg(long, value_name = "FILE")]
  pub weights: PathBuf,
  /// 本地重算目标值并与搜索结果比较
  #[arg(long)]
  pub verify: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn violate_defaults() {
    let args = Args::try_parse_from([
      "subwindow",
      "violate",
      "--labels",
      "train.txt",
      "--clouds",
      "a",
      "b",
      "--weights",
      "w.json",
    ])
    .unwrap();
    match args.command {
      Command::Violate {
        data,
        search,
        chunk_size,
        output,
      } => {
        assert_eq!(data.clouds, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(data.numbins, 3000);
        assert_eq!(data.cluster_policy, ClusterPolicy::Fail);
        assert_eq!(search.oracle.scheme(), "exhaustive");
        assert!(!search.verify);
        assert_eq!(chunk_size, 64);
        assert!(output.is_none());
      }
      other => panic!("unexpected command: {:?}", other),
    }
  }

  #[test]
  fn classify_requires_weights() {
    assert!(
      Args::try_parse_from(["subwindow", "classify", "--labels", "t.txt", "--clouds", "c"]).is_err()
    );
  }
}
