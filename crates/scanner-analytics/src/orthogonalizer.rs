//! Gram-Schmidt 직교화기.
//!
//! 현재 사이클 횡단면(panel) 전체에서 보조 팩터를 모멘텀 코어와
//! 앞서 처리된 잔차에 대해 순서대로 잔차화합니다.
//!
//! # 순서
//!
//! Technical → Volume → Quality → Social
//!
//! 각 팩터는 (절편, 모멘텀, 이전 잔차들)이 생성하는 부분공간으로의 투영을 제거한 값이 됩니다.
//! 따라서 잔차는 평균 0이며, 패널 전체에서 모멘텀 및 이전 잔차와 내적이 0입니다.
//!
//! # 보호 불변식
//!
//! 모멘텀 열은 `&[f64]` 공유 참조로만 전달되며 잔차화 대상이 되지 않습니다.
//!
//! # 비정상 값
//!
//! NaN/Inf 값은 투영 계산에서 제외되고 해당 행의 잔차는 0, `degraded`로 표시됩니다.
//! 유효 값이 2개 미만이거나 분산이 0인 열은 퇴화(degenerate) 열로 보고 잔차를 0으로 둡니다.

use scanner_core::{FactorKind, FactorSet, OrthogonalFactorSet, Symbol};
use serde::{Deserialize, Serialize};

use crate::correlation::{dot, masked_correlation};
use crate::indicators::sample_variance;

/// 분산/노름 판정 기준.
const EPSILON: f64 = 1e-12;

/// 직교화 입력 패널 (보조 팩터 스칼라 열).
#[derive(Debug, Clone, PartialEq)]
pub struct FactorPanel {
    symbols: Vec<Symbol>,
    technical: Vec<f64>,
    volume: Vec<f64>,
    quality: Vec<f64>,
    social: Vec<f64>,
}

impl FactorPanel {
    /// 팩터 집합 목록으로 패널을 구성합니다. 행 순서는 입력 순서를 따릅니다.
    pub fn from_sets(sets: &[FactorSet]) -> Self {
        let column = |kind: FactorKind| -> Vec<f64> {
            sets.iter()
                .map(|s| s.secondary_scalar(kind).unwrap_or(f64::NAN))
                .collect()
        };
        Self {
            symbols: sets.iter().map(|s| s.symbol.clone()).collect(),
            technical: column(FactorKind::Technical),
            volume: column(FactorKind::Volume),
            quality: column(FactorKind::Quality),
            social: column(FactorKind::Social),
        }
    }

    /// 열 값으로 직접 구성합니다 (모든 열의 길이가 같아야 함).
    pub fn from_columns(
        symbols: Vec<Symbol>,
        technical: Vec<f64>,
        volume: Vec<f64>,
        quality: Vec<f64>,
        social: Vec<f64>,
    ) -> Option<Self> {
        let n = symbols.len();
        if [technical.len(), volume.len(), quality.len(), social.len()]
            .iter()
            .any(|len| *len != n)
        {
            return None;
        }
        Some(Self {
            symbols,
            technical,
            volume,
            quality,
            social,
        })
    }

    /// 행 수.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// 비어 있는지 여부.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// 심볼 목록.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// 보조 팩터 열. 모멘텀은 패널에 포함되지 않으므로 `None`.
    pub fn column(&self, kind: FactorKind) -> Option<&[f64]> {
        match kind {
            FactorKind::Momentum => None,
            FactorKind::Technical => Some(&self.technical),
            FactorKind::Volume => Some(&self.volume),
            FactorKind::Quality => Some(&self.quality),
            FactorKind::Social => Some(&self.social),
        }
    }
}

/// 팩터별 직교화 진단.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorDiagnostics {
    /// 팩터 종류
    pub kind: FactorKind,
    /// 투영에 사용된 행 수
    pub valid_rows: usize,
    /// 퇴화 열 여부
    pub degenerate: bool,
    /// 제거된 성분의 노름
    pub projection_magnitude: f64,
    /// 잔차와 모멘텀의 상관계수 (정의 불가 시 None)
    pub momentum_correlation: Option<f64>,
}

/// 직교화 품질 진단.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrthogonalityDiagnostics {
    /// 팩터별 진단 (처리 순서)
    pub factors: Vec<FactorDiagnostics>,
    /// 모멘텀 열 퇴화 여부
    pub momentum_degenerate: bool,
    /// 모멘텀이 비트 단위로 보존되었는지 여부
    pub momentum_preserved: bool,
    /// 잔차-모멘텀 상관계수 절대값 최대
    pub max_abs_correlation: f64,
}

/// 직교화 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct OrthogonalizationResult {
    /// 행별 직교화 팩터 (패널 순서)
    pub rows: Vec<OrthogonalFactorSet>,
    /// 품질 진단
    pub diagnostics: OrthogonalityDiagnostics,
}

/// Gram-Schmidt 직교화기.
#[derive(Debug, Clone, Default)]
pub struct Orthogonalizer;

impl Orthogonalizer {
    /// 새 직교화기를 생성합니다.
    pub fn new() -> Self {
        Self
    }

    /// 패널을 순서대로 잔차화합니다.
    ///
    /// # 인자
    /// * `momentum` - 모멘텀 코어 열 (기준으로만 사용, 변경되지 않음)
    /// * `panel` - 보조 팩터 패널 (`momentum`과 행 순서가 같아야 함)
    pub fn orthogonalize(&self, momentum: &[f64], panel: &FactorPanel) -> OrthogonalizationResult {
        let n = panel.len().min(momentum.len());
        let momentum_bits: Vec<u64> = momentum.iter().map(|v| v.to_bits()).collect();

        let momentum_mask: Vec<bool> = (0..n).map(|i| momentum[i].is_finite()).collect();
        let momentum_degenerate = is_degenerate(&momentum[..n], &momentum_mask);

        let mut rows: Vec<OrthogonalFactorSet> = (0..n)
            .map(|i| OrthogonalFactorSet {
                degraded: if momentum_mask[i] {
                    Vec::new()
                } else {
                    FactorKind::RESIDUAL_ORDER.to_vec()
                },
                ..Default::default()
            })
            .collect();
        let mut usable_factor = vec![false; n];
        let mut residuals: Vec<Vec<f64>> = Vec::with_capacity(FactorKind::RESIDUAL_ORDER.len());
        let mut diagnostics = Vec::with_capacity(FactorKind::RESIDUAL_ORDER.len());

        for kind in FactorKind::RESIDUAL_ORDER {
            let column = panel.column(kind).unwrap_or(&[]);
            let mask: Vec<bool> = (0..n)
                .map(|i| momentum_mask[i] && column.get(i).is_some_and(|v| v.is_finite()))
                .collect();

            for i in 0..n {
                if momentum_mask[i] && !mask[i] {
                    rows[i].degraded.push(kind);
                }
            }

            let valid_rows = mask.iter().filter(|m| **m).count();
            let degenerate = is_degenerate(&column[..n.min(column.len())], &mask);

            let (residual, projection_magnitude) = if degenerate {
                (vec![0.0; n], 0.0)
            } else {
                residualize(column, momentum, &residuals, &mask)
            };

            if !degenerate {
                for i in 0..n {
                    if mask[i] {
                        usable_factor[i] = true;
                    }
                }
            }

            let momentum_correlation = if degenerate {
                None
            } else {
                masked_correlation(&residual, &momentum[..n], &mask)
            };

            tracing::trace!(
                factor = %kind,
                valid_rows,
                degenerate,
                projection = projection_magnitude,
                "팩터 잔차화"
            );

            for (row, value) in rows.iter_mut().zip(&residual) {
                row.set_residual(kind, *value);
            }
            diagnostics.push(FactorDiagnostics {
                kind,
                valid_rows,
                degenerate,
                projection_magnitude,
                momentum_correlation,
            });
            residuals.push(residual);
        }

        for (i, row) in rows.iter_mut().enumerate() {
            row.valid_for_scoring = momentum_mask[i] && !momentum_degenerate && usable_factor[i];
        }

        let max_abs_correlation = diagnostics
            .iter()
            .filter_map(|d| d.momentum_correlation)
            .map(f64::abs)
            .fold(0.0, f64::max);
        let momentum_preserved = momentum
            .iter()
            .zip(&momentum_bits)
            .all(|(v, bits)| v.to_bits() == *bits);

        OrthogonalizationResult {
            rows,
            diagnostics: OrthogonalityDiagnostics {
                factors: diagnostics,
                momentum_degenerate,
                momentum_preserved,
                max_abs_correlation,
            },
        }
    }
}

/// 마스크 위치의 값이 2개 미만이거나 분산이 0이면 퇴화 열.
fn is_degenerate(values: &[f64], mask: &[bool]) -> bool {
    let selected: Vec<f64> = values
        .iter()
        .zip(mask)
        .filter(|(_, keep)| **keep)
        .map(|(v, _)| *v)
        .collect();
    match sample_variance(&selected) {
        Some(var) => !(var.is_finite() && var > EPSILON),
        None => true,
    }
}

/// 마스크 밖의 값을 0으로 둔 벡터.
fn restrict(values: &[f64], mask: &[bool]) -> Vec<f64> {
    mask.iter()
        .enumerate()
        .map(|(i, keep)| if *keep { values[i] } else { 0.0 })
        .collect()
}

/// 수정 Gram-Schmidt로 기저를 정규직교화하고 `target`에서 투영을 제거합니다.
///
/// 기저 후보는 (절편, 모멘텀, 이전 잔차들)을 마스크로 제한한 벡터입니다.
/// 노름이 거의 0인 후보(이미 생성된 부분공간에 속하는 벡터)는 건너뜁니다.
///
/// # 반환
/// (잔차, 제거된 성분의 노름)
fn residualize(
    target: &[f64],
    momentum: &[f64],
    prior: &[Vec<f64>],
    mask: &[bool],
) -> (Vec<f64>, f64) {
    let ones: Vec<f64> = mask.iter().map(|keep| if *keep { 1.0 } else { 0.0 }).collect();
    let mut candidates = vec![ones, restrict(momentum, mask)];
    candidates.extend(prior.iter().map(|r| restrict(r, mask)));

    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(candidates.len());
    for mut v in candidates {
        let original = dot(&v, &v);
        if original <= EPSILON {
            continue;
        }
        // 재직교화 2회로 수치 오차를 줄임
        for _ in 0..2 {
            for q in &basis {
                let coef = dot(&v, q);
                v.iter_mut().zip(q).for_each(|(x, qx)| *x -= coef * qx);
            }
        }
        let norm2 = dot(&v, &v);
        if norm2 <= EPSILON * original {
            continue;
        }
        let norm = norm2.sqrt();
        v.iter_mut().for_each(|x| *x /= norm);
        basis.push(v);
    }

    let original = restrict(target, mask);
    let mut residual = original.clone();
    for _ in 0..2 {
        for q in &basis {
            let coef = dot(&residual, q);
            residual.iter_mut().zip(q).for_each(|(x, qx)| *x -= coef * qx);
        }
    }

    let removed: f64 = original
        .iter()
        .zip(&residual)
        .map(|(o, r)| (o - r).powi(2))
        .sum::<f64>()
        .sqrt();

    (residual, removed)
}
