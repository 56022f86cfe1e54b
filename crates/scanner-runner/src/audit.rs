//! 사이클 감사 기록 작성기.
//!
//! 사이클마다 두 파일을 남깁니다:
//! - `<prefix>-<cycle_id>.ndjson`: 순위순 후보 한 줄에 하나 (거절 포함, 전체 증거)
//! - `<prefix>-<cycle_id>-top.json`: Top-N 요약
//!
//! 두 파일 모두 임시 파일에 쓰고 동기화한 뒤 이름을 바꿔 공개합니다.
//! 읽는 쪽은 완성된 파일만 보게 되며, 취소된 사이클은 아무 파일도 남기지 않습니다.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use scanner_core::{RegimeLabel, RegimeSnapshot, ScannerError, TopNEntry};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::pipeline::{CycleReport, ExcludedSymbol};
use crate::stats::CycleStats;

const TMP_SUFFIX: &str = ".tmp";

/// Top-N 요약 파일 형식.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopNSummary {
    /// 사이클 ID
    pub cycle_id: String,
    /// 평가 시각
    pub as_of: DateTime<Utc>,
    /// 감지된 레짐
    pub regime: RegimeSnapshot,
    /// 적용된 프로필
    pub profile: RegimeLabel,
    /// Top-N 항목
    pub top_n: Vec<TopNEntry>,
    /// 제외된 심볼
    #[serde(default)]
    pub excluded: Vec<ExcludedSymbol>,
    /// 사이클 통계
    pub stats: CycleStats,
}

impl From<&CycleReport> for TopNSummary {
    fn from(report: &CycleReport) -> Self {
        Self {
            cycle_id: report.cycle_id.clone(),
            as_of: report.as_of,
            regime: report.regime.clone(),
            profile: report.profile,
            top_n: report.top_n.clone(),
            excluded: report.excluded.clone(),
            stats: report.stats.clone(),
        }
    }
}

/// 사이클 하나의 감사 파일 경로.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditPaths {
    /// 후보 NDJSON
    pub records: PathBuf,
    /// Top-N 요약
    pub top: PathBuf,
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

/// 감사 기록 작성기.
#[derive(Debug, Clone)]
pub struct AuditWriter {
    dir: PathBuf,
    prefix: String,
}

impl AuditWriter {
    /// 새 작성기를 생성합니다.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// 출력 디렉토리.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 사이클 ID에 대한 최종 파일 경로.
    pub fn paths(&self, cycle_id: &str) -> AuditPaths {
        AuditPaths {
            records: self.dir.join(format!("{}-{cycle_id}.ndjson", self.prefix)),
            top: self.dir.join(format!("{}-{cycle_id}-top.json", self.prefix)),
        }
    }

    /// 사이클 결과를 원자적으로 기록합니다.
    ///
    /// 두 파일을 임시 경로에 모두 쓴 뒤 후보 NDJSON, 요약 순으로 이름을 바꿉니다.
    /// 요약 공개가 실패하면 후보 파일만 남고 요약 임시 파일은 삭제됩니다.
    /// 요약 파일이 있으면 같은 사이클의 후보 파일도 항상 있습니다.
    ///
    /// # 에러
    /// - 파일 시스템 오류: `ScannerError::Io` (남은 임시 파일은 삭제됨)
    /// - 공개 전에 취소됨: `ScannerError::Cancelled` (임시 파일은 삭제됨)
    pub async fn write_cycle(
        &self,
        report: &CycleReport,
        cancel: &CancellationToken,
    ) -> Result<AuditPaths> {
        let paths = self.paths(&report.cycle_id);
        let records_tmp = tmp_path(&paths.records);
        let top_tmp = tmp_path(&paths.top);

        tokio::fs::create_dir_all(&self.dir).await?;

        let staged = self.stage(report, &records_tmp, &top_tmp).await;
        if let Err(e) = staged {
            Self::discard(&[&records_tmp, &top_tmp]).await;
            return Err(e);
        }

        if cancel.is_cancelled() {
            Self::discard(&[&records_tmp, &top_tmp]).await;
            return Err(ScannerError::Cancelled(format!(
                "사이클 {} 기록 전 취소됨",
                report.cycle_id
            )));
        }

        // 요약은 후보 파일 뒤에 공개
        if let Err(e) = tokio::fs::rename(&records_tmp, &paths.records).await {
            Self::discard(&[&records_tmp, &top_tmp]).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&top_tmp, &paths.top).await {
            Self::discard(&[&top_tmp]).await;
            return Err(e.into());
        }

        tracing::info!(
            cycle_id = %report.cycle_id,
            records = %paths.records.display(),
            candidates = report.candidates.len(),
            "감사 기록 완료"
        );
        Ok(paths)
    }

    async fn stage(&self, report: &CycleReport, records_tmp: &Path, top_tmp: &Path) -> Result<()> {
        let mut buffer = Vec::new();
        for candidate in &report.candidates {
            serde_json::to_writer(&mut buffer, candidate)?;
            buffer.push(b'\n');
        }
        Self::write_synced(records_tmp, &buffer).await?;

        let summary = serde_json::to_vec_pretty(&TopNSummary::from(report))?;
        Self::write_synced(top_tmp, &summary).await
    }

    async fn write_synced(path: &Path, content: &[u8]) -> Result<()> {
        let mut file = tokio::fs::File::create(path).await?;
        file.write_all(content).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn discard(paths: &[&Path]) {
        for path in paths {
            if let Err(e) = tokio::fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "임시 파일 삭제 실패");
                }
            }
        }
    }
}
