// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/oracle/ess.rs - 外部分支定界搜索库 (libess)
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

use std::ffi::{c_double, c_int};

use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  oracle::{InferenceOracle, OracleError, OracleRequest, RawBox},
};

#[link(name = "ess")]
unsafe extern "C" {
  fn pyramid_search_structured(
    numpoints: c_int,
    width: c_int,
    height: c_int,
    xpos: *const c_double,
    ypos: *const c_double,
    clst: *const c_double,
    numclusters: c_int,
    numlevels: c_int,
    weights: *const c_double,
    num_gt_boxes: c_int,
    gt_boxes: *const c_double,
  ) -> RawBox;
}

/// 通过 C ABI 调用 libess 的损失增强分支定界搜索
#[derive(Debug, Clone, Default)]
pub struct EssOracle;

impl FromUrlWithScheme for EssOracle {
  const SCHEME: &'static str = "ess";
}

impl FromUrl for EssOracle {
  type Error = OracleError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OracleError::SchemeMismatch(url.scheme().to_string()));
    }
    Ok(EssOracle)
  }
}

impl InferenceOracle for EssOracle {
  type Error = OracleError;

  fn search(&self, request: &OracleRequest) -> Result<RawBox, Self::Error> {
    request.validate()?;
    if request.x.is_empty() {
      error!("空点云不能交给 libess");
      return Err(OracleError::InvalidParameter("空点云".to_string()));
    }

    debug!(
      "调用 libess: {} 个点, {}x{}, {} 个真值框",
      request.point_count(),
      request.width,
      request.height,
      request.gt_count
    );

    // SAFETY: validate() 保证了各缓冲区长度与计数参数一致，
    // 搜索库只读取这些缓冲区，且调用期间 request 保持借用。
    let raw = unsafe {
      pyramid_search_structured(
        request.point_count(),
        request.width,
        request.height,
        request.x.as_ptr(),
        request.y.as_ptr(),
        request.c.as_ptr(),
        request.numbins,
        request.numlevels,
        request.weights.as_ptr(),
        request.gt_count,
        request.gt_boxes.as_ptr(),
      )
    };

    if !raw.score.is_finite() {
      error!("libess 返回了非有限分数: {:?}", raw);
      return Err(OracleError::InvalidResult(format!("非有限分数 {}", raw.score)));
    }
    Ok(raw)
  }
}
