// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/task.rs - 批处理任务
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
  io::{BufReader, Write},
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Instant,
};

use serde_json::json;
use tracing::{info, warn};

use crate::{
  config::ModelConfig,
  dataset::Example,
  feature::score,
  geometry::BBox,
  image::PointCloud,
  inference::InferenceAdapter,
  loss::loss,
  oracle::InferenceOracle,
  output::Render,
  seed::seed_constraints,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 从 JSON 数组读取权重向量
pub fn read_weights(path: &Path) -> anyhow::Result<Vec<f64>> {
  let file = std::fs::File::open(path)?;
  let weights: Vec<f64> = serde_json::from_reader(BufReader::new(file))?;
  info!("读取权重 {}: {} 维", path.display(), weights.len());
  Ok(weights)
}

/// 测试阶段：对每个样本求得分最高的框并输出
pub struct ClassifyTask<'w> {
  weights: &'w [f64],
}

impl<'w> ClassifyTask<'w> {
  pub fn new(weights: &'w [f64]) -> Self {
    Self { weights }
  }
}

impl<'w, 'a, Or, R> Task<&[Example], &InferenceAdapter<'a, Or>, &R> for ClassifyTask<'w>
where
  Or: InferenceOracle,
  R: Render<PointCloud, BBox>,
  R::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: &[Example],
    model: &InferenceAdapter<'a, Or>,
    output: &R,
  ) -> Result<(), Self::Error> {
    info!("开始分类 {} 个样本...", input.len());
    let now = Instant::now();
    for (index, example) in input.iter().enumerate() {
      let bbox = model.classify(&example.image, self.weights)?;
      info!(
        "({}) 图像 {}: {}",
        index,
        example.image.id().unwrap_or("<unnamed>"),
        bbox
      );
      output.render_result(&example.image, &bbox)?;
    }
    output.finish()?;
    info!("分类完成，耗时: {:.2?}", now.elapsed());
    Ok(())
  }
}

/// 输出初始约束，每条一行 JSON
#[derive(Debug, Default)]
pub struct SeedTask;

impl<W: Write> Task<&[Example], &ModelConfig, W> for SeedTask {
  type Error = anyhow::Error;

  fn run_task(self, input: &[Example], model: &ModelConfig, mut output: W) -> Result<(), Self::Error> {
    let constraints = seed_constraints(input, model)?;
    for c in &constraints {
      let features: Vec<_> = c.features.iter().map(|(i, v)| json!([i, v])).collect();
      let line = json!({
        "slack_id": c.slack_id,
        "rhs": c.rhs,
        "cost_factor": c.cost_factor,
        "dim": c.features.dim(),
        "features": features,
      });
      writeln!(output, "{}", line)?;
    }
    output.flush()?;
    Ok(())
  }
}

/// 对训练样本求最违反约束的框，每个样本一行 JSON
///
/// 按块并行搜索，块之间检查 Ctrl-C，收到中断后输出已完成的部分并退出。
pub struct ViolationTask<'w> {
  weights: &'w [f64],
  chunk_size: usize,
  interruptible: bool,
}

impl<'w> ViolationTask<'w> {
  pub fn new(weights: &'w [f64]) -> Self {
    Self {
      weights,
      chunk_size: 64,
      interruptible: false,
    }
  }

  pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
    self.chunk_size = chunk_size.max(1);
    self
  }

  /// 安装 Ctrl-C 处理器；每个进程只能安装一次
  pub fn interruptible(mut self, interruptible: bool) -> Self {
    self.interruptible = interruptible;
    self
  }
}

impl<'w, 'a, Or, W> Task<&[Example], &InferenceAdapter<'a, Or>, W> for ViolationTask<'w>
where
  Or: InferenceOracle + Sync,
  W: Write,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: &[Example],
    model: &InferenceAdapter<'a, Or>,
    mut output: W,
  ) -> Result<(), Self::Error> {
    let stop = Arc::new(AtomicBool::new(false));
    if self.interruptible {
      let flag = Arc::clone(&stop);
      ctrlc::set_handler(move || {
        info!("收到中断信号，当前块完成后退出...");
        flag.store(true, Ordering::SeqCst);
      })?;
    }

    let config = model.config();
    let mut total_loss = 0.0;
    let mut done = 0usize;

    for chunk in input.chunks(self.chunk_size) {
      if stop.load(Ordering::SeqCst) {
        warn!("中断信号接收，已处理 {} / {} 个样本", done, input.len());
        break;
      }

      let now = Instant::now();
      let results = model.find_most_violated_batch(chunk, self.weights);
      for (example, result) in chunk.iter().zip(results) {
        let bbox = result?;
        let delta = loss(&example.label, &bbox, config.loss());
        let w_psi = score(&example.image, &bbox, self.weights, config)?;
        total_loss += delta;
        let line = json!({
          "id": example.image.id(),
          "box": [bbox.left, bbox.top, bbox.right, bbox.bottom],
          "score": bbox.score,
          "loss": delta,
          "w_psi": w_psi,
        });
        writeln!(output, "{}", line)?;
      }
      done += chunk.len();
      info!("已处理 {} / {} 个样本，本块耗时: {:.2?}", done, input.len(), now.elapsed());
    }

    output.flush()?;
    if done > 0 {
      info!("平均损失: {:.4}", total_loss / done as f64);
    }
    Ok(())
  }
}
