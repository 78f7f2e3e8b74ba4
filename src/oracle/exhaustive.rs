// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/oracle/exhaustive.rs - 穷举子窗口搜索
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

use clap::ValueEnum;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  geometry::BBox,
  label::Label,
  loss::{LossKind, loss},
  oracle::{InferenceOracle, OracleError, OracleRequest, RawBox},
};

/// 默认候选框数量上限，约对应 100x100 的图像
const DEFAULT_MAX_CANDIDATES: u128 = 30_000_000;

/// 枚举图像内所有轴对齐框的参考实现
///
/// 用二维前缀和在 O(1) 内求每个框的 `w·psi`，再加上由打包真值重建的损失。
/// 复杂度为 O(W²H²)，只适合小图像和测试；大图像请使用分支定界库。
#[derive(Debug, Clone)]
pub struct ExhaustiveOracle {
  loss: LossKind,
  max_candidates: u128,
}

impl Default for ExhaustiveOracle {
  fn default() -> Self {
    Self {
      loss: LossKind::default(),
      max_candidates: DEFAULT_MAX_CANDIDATES,
    }
  }
}

impl ExhaustiveOracle {
  pub fn with_loss(mut self, loss: LossKind) -> Self {
    self.loss = loss;
    self
  }

  pub fn with_max_candidates(mut self, max_candidates: u128) -> Self {
    self.max_candidates = max_candidates;
    self
  }

  fn candidate_count(width: i32, height: i32) -> u128 {
    let w = width.max(0) as u128;
    let h = height.max(0) as u128;
    (w * (w + 1) / 2) * (h * (h + 1) / 2)
  }
}

impl FromUrlWithScheme for ExhaustiveOracle {
  const SCHEME: &'static str = "exhaustive";
}

impl FromUrl for ExhaustiveOracle {
  type Error = OracleError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OracleError::SchemeMismatch(url.scheme().to_string()));
    }

    let mut oracle = ExhaustiveOracle::default();
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "max_candidates" => {
          let limit = v
            .parse()
            .map_err(|_| OracleError::InvalidParameter(format!("max_candidates={}", v)))?;
          oracle = oracle.with_max_candidates(limit);
        }
        "loss" => {
          let kind = LossKind::from_str(&v, true)
            .map_err(|_| OracleError::InvalidParameter(format!("loss={}", v)))?;
          oracle = oracle.with_loss(kind);
        }
        _ => {}
      }
    }
    Ok(oracle)
  }
}

/// 每个格点权重的二维前缀和，`(width+1) x (height+1)`
struct IntegralScore {
  stride: usize,
  table: Vec<f64>,
}

impl IntegralScore {
  fn build(request: &OracleRequest) -> Result<Self, OracleError> {
    let width = request.width.max(0) as usize;
    let height = request.height.max(0) as usize;
    let stride = width + 1;
    let mut table = vec![0.0; stride * (height + 1)];

    for ((&x, &y), &c) in request.x.iter().zip(&request.y).zip(&request.c) {
      let (xi, yi, ci) = (x as i64, y as i64, c as i64);
      if xi < 0 || yi < 0 || xi as usize >= width || yi as usize >= height {
        return Err(OracleError::InvalidParameter(format!(
          "点 ({}, {}) 超出图像 {}x{}",
          x, y, width, height
        )));
      }
      let weight = usize::try_from(ci)
        .ok()
        .and_then(|ci| request.weights.get(ci))
        .ok_or_else(|| OracleError::InvalidParameter(format!("聚类编号 {} 无对应权重", c)))?;
      table[(yi as usize + 1) * stride + xi as usize + 1] += weight;
    }

    for y in 1..=height {
      for x in 1..=width {
        table[y * stride + x] +=
          table[(y - 1) * stride + x] + table[y * stride + x - 1] - table[(y - 1) * stride + x - 1];
      }
    }

    Ok(Self { stride, table })
  }

  /// 闭区间框内权重之和
  fn sum(&self, left: usize, top: usize, right: usize, bottom: usize) -> f64 {
    let s = self.stride;
    self.table[(bottom + 1) * s + right + 1] - self.table[top * s + right + 1]
      - self.table[(bottom + 1) * s + left]
      + self.table[top * s + left]
  }
}

impl InferenceOracle for ExhaustiveOracle {
  type Error = OracleError;

  fn search(&self, request: &OracleRequest) -> Result<RawBox, Self::Error> {
    request.validate()?;

    let count = Self::candidate_count(request.width, request.height);
    if count > self.max_candidates {
      return Err(OracleError::TooManyCandidates {
        count,
        limit: self.max_candidates,
      });
    }
    debug!(
      "穷举搜索 {}x{} 图像，共 {} 个候选框",
      request.width, request.height, count
    );

    let integral = IntegralScore::build(request)?;
    let label = Label::from_signed(&request.ground_truth());
    let (width, height) = (request.width as usize, request.height as usize);

    let mut best: Option<RawBox> = None;
    for top in 0..height {
      for bottom in top..height {
        for left in 0..width {
          for right in left..width {
            let bbox = BBox::new(left as i32, top as i32, right as i32, bottom as i32);
            let score = integral.sum(left, top, right, bottom) + loss(&label, &bbox, self.loss);
            if best.is_none_or(|b| score > b.score) {
              best = Some(RawBox::from(bbox.with_score(score)));
            }
          }
        }
      }
    }

    best.ok_or_else(|| OracleError::InvalidParameter("图像尺寸为空".to_string()))
  }

  fn supports_loss(&self, kind: LossKind) -> bool {
    kind == self.loss
  }
}
