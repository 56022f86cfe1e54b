//! 게이트/가드 증거 및 판정.
//!
//! 모든 게이트와 가드는 결과와 무관하게 `{ok, value, threshold, name}` 증거를 남깁니다.
//! 데이터 오류(역전된 호가창 등)는 `fault` 센티널로 구분되어,
//! "조건 미달로 거절"과 "잘못된 데이터로 거절"을 소비자가 구별할 수 있습니다.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 잘못된 데이터로 인한 게이트 실패 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateFault {
    /// 매수 최우선 호가 >= 매도 최우선 호가
    CrossedBook,
    /// 호가창 한쪽이 비어 있음
    EmptyBook,
    /// 제3자 집계 데이터
    AggregatorSource,
    /// NaN/Inf 또는 음수 가격 등 비정상 입력
    NonFiniteInput,
    /// 계산에 필요한 이력 부족
    InsufficientHistory,
    /// 점수 산출 최소 조건 미충족
    InvalidForScoring,
}

impl fmt::Display for GateFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GateFault::CrossedBook => "crossed_book",
            GateFault::EmptyBook => "empty_book",
            GateFault::AggregatorSource => "aggregator_source",
            GateFault::NonFiniteInput => "non_finite_input",
            GateFault::InsufficientHistory => "insufficient_history",
            GateFault::InvalidForScoring => "invalid_for_scoring",
        };
        f.write_str(s)
    }
}

/// 게이트/가드 증거 (불변).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateEvidence {
    /// 게이트 이름
    pub name: String,
    /// 통과 여부
    pub ok: bool,
    /// 반올림된 측정값 (데이터 오류 시 `None`)
    pub value: Option<f64>,
    /// 적용된 임계값 (반올림 후)
    pub threshold: f64,
    /// 판정에 영향을 주는지 여부 (false면 감사용 세부 정보)
    pub blocking: bool,
    /// 데이터 오류 센티널
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<GateFault>,
}

impl GateEvidence {
    /// 판정에 영향을 주는 일반 증거.
    pub fn check(name: impl Into<String>, value: f64, threshold: f64, ok: bool) -> Self {
        Self {
            name: name.into(),
            ok,
            value: Some(value),
            threshold,
            blocking: true,
            fault: None,
        }
    }

    /// 데이터 오류로 실패한 증거.
    pub fn faulted(name: impl Into<String>, threshold: f64, fault: GateFault) -> Self {
        Self {
            name: name.into(),
            ok: false,
            value: None,
            threshold,
            blocking: true,
            fault: Some(fault),
        }
    }

    /// 판정에 영향을 주지 않는 세부 증거.
    pub fn detail(name: impl Into<String>, value: f64, threshold: f64, ok: bool) -> Self {
        Self {
            blocking: false,
            ..Self::check(name, value, threshold, ok)
        }
    }

    /// 세부 증거로 전환합니다.
    pub fn into_detail(self) -> Self {
        Self {
            blocking: false,
            ..self
        }
    }

    /// 판정을 막는 실패인지 여부.
    pub fn is_blocking_failure(&self) -> bool {
        self.blocking && !self.ok
    }
}

/// 최종 판정.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    /// 모든 차단 증거 통과
    Pass,
    /// 하나 이상의 차단 증거 실패
    Reject,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Pass => write!(f, "PASS"),
            Decision::Reject => write!(f, "REJECT"),
        }
    }
}

/// 거절 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// 유효한 수치로 기준 미달
    Merits,
    /// 데이터 오류 센티널 포함
    DataFault,
}

impl Decision {
    /// 증거 집합에서 판정과 거절 유형을 도출합니다.
    pub fn from_evidence(evidence: &[GateEvidence]) -> (Decision, Option<RejectionKind>) {
        let failures: Vec<&GateEvidence> =
            evidence.iter().filter(|e| e.is_blocking_failure()).collect();

        if failures.is_empty() {
            return (Decision::Pass, None);
        }

        let kind = if failures.iter().any(|e| e.fault.is_some()) {
            RejectionKind::DataFault
        } else {
            RejectionKind::Merits
        };
        (Decision::Reject, Some(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_all_pass() {
        let evidence = vec![
            GateEvidence::check("score", 82.0, 75.0, true),
            GateEvidence::detail("fatigue_relaxation", 0.0, 0.0, false),
        ];
        assert_eq!(Decision::from_evidence(&evidence), (Decision::Pass, None));
    }

    #[test]
    fn test_decision_merits_vs_fault() {
        let merits = vec![GateEvidence::check("vadr", 1.2, 1.8, false)];
        assert_eq!(
            Decision::from_evidence(&merits),
            (Decision::Reject, Some(RejectionKind::Merits))
        );

        let fault = vec![
            GateEvidence::check("vadr", 1.2, 1.8, false),
            GateEvidence::faulted("spread_bps", 50.0, GateFault::CrossedBook),
        ];
        assert_eq!(
            Decision::from_evidence(&fault),
            (Decision::Reject, Some(RejectionKind::DataFault))
        );
    }

    #[test]
    fn test_evidence_serialization() {
        let faulted = GateEvidence::faulted("spread_bps", 50.0, GateFault::CrossedBook);
        let json = serde_json::to_value(&faulted).unwrap();
        assert_eq!(json["value"], serde_json::Value::Null);
        assert_eq!(json["fault"], "crossed_book");
        assert_eq!(json["ok"], false);

        let ok = GateEvidence::check("spread_bps", 50.0, 50.0, true);
        let json = serde_json::to_value(&ok).unwrap();
        assert!(json.get("fault").is_none());
        assert_eq!(serde_json::to_string(&Decision::Pass).unwrap(), "\"PASS\"");
    }
}
