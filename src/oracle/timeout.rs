// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/oracle/timeout.rs - 带超时保护的搜索
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
  sync::{Arc, mpsc},
  thread,
  time::Duration,
};

use tracing::{error, warn};

use crate::{
  loss::LossKind,
  oracle::{InferenceOracle, OracleError, OracleRequest, RawBox},
};

/// 在独立线程中调用内部搜索，超时即报错
///
/// 超时后工作线程不会被强行终止，它的结果会被丢弃。超时对该样本是致命错误，不会回退到其他框。
pub struct TimeoutOracle<O> {
  inner: Arc<O>,
  timeout: Duration,
}

impl<O> TimeoutOracle<O> {
  pub fn new(inner: O, timeout: Duration) -> Self {
    Self {
      inner: Arc::new(inner),
      timeout,
    }
  }
}

impl<O> InferenceOracle for TimeoutOracle<O>
where
  O: InferenceOracle + Send + Sync + 'static,
{
  type Error = OracleError;

  fn search(&self, request: &OracleRequest) -> Result<RawBox, Self::Error> {
    let (tx, rx) = mpsc::channel();
    let inner = Arc::clone(&self.inner);
    let request = request.clone();

    thread::Builder::new()
      .name("oracle-search".to_string())
      .spawn(move || {
        let _ = tx.send(inner.search(&request));
      })?;

    match rx.recv_timeout(self.timeout) {
      Ok(Ok(raw)) => Ok(raw),
      Ok(Err(e)) => Err(OracleError::Backend(Box::new(e))),
      Err(mpsc::RecvTimeoutError::Timeout) => {
        warn!("搜索超过 {:?} 未返回", self.timeout);
        Err(OracleError::Timeout(self.timeout))
      }
      Err(mpsc::RecvTimeoutError::Disconnected) => {
        error!("搜索线程异常退出");
        Err(OracleError::WorkerPanicked)
      }
    }
  }

  fn supports_loss(&self, kind: LossKind) -> bool {
    self.inner.supports_loss(kind)
  }
}
