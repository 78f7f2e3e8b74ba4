// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::Path,
};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use subwindow::{
  FromUrl,
  dataset::load_examples,
  inference::InferenceAdapter,
  oracle::OracleWrapper,
  output::OutputWrapper,
  task::{ClassifyTask, SeedTask, Task, ViolationTask, read_weights},
};

use args::{Args, Command};

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
  Ok(match path {
    Some(path) => {
      info!("输出路径: {}", path.display());
      Box::new(BufWriter::new(File::create(path)?))
    }
    None => Box::new(std::io::stdout().lock()),
  })
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  match args.command {
    Command::Classify {
      data,
      search,
      output,
    } => {
      let config = data.model_config()?;
      let examples = load_examples(&data.labels, &data.clouds)?;
      let weights = read_weights(&search.weights)?;
      info!("搜索实现: {}", search.oracle);
      let oracle = OracleWrapper::from_url(&search.oracle)?;
      let model = InferenceAdapter::new(oracle, &config).with_verify(search.verify);
      let output = OutputWrapper::from_url(&output)?;
      ClassifyTask::new(&weights).run_task(examples.as_slice(), &model, &output)?;
    }
    Command::Seed { data, output } => {
      let config = data.model_config()?;
      let examples = load_examples(&data.labels, &data.clouds)?;
      SeedTask.run_task(examples.as_slice(), &config, open_output(output.as_deref())?)?;
    }
    Command::Violate {
      data,
      search,
      chunk_size,
      output,
    } => {
      let config = data.model_config()?;
      let examples = load_examples(&data.labels, &data.clouds)?;
      let weights = read_weights(&search.weights)?;
      info!("搜索实现: {}", search.oracle);
      let oracle = OracleWrapper::from_url(&search.oracle)?;
      let model = InferenceAdapter::new(oracle, &config).with_verify(search.verify);
      ViolationTask::new(&weights)
        .with_chunk_size(chunk_size)
        .interruptible(true)
        .run_task(examples.as_slice(), &model, open_output(output.as_deref())?)?;
    }
  }

  Ok(())
}
