//! 로테이션 CSV 싱크
//!
//! 활성 파일 하나와 백업 목록을 소유합니다.
//!
//! # 로테이션 규칙
//! - append 전에 대기 중인 바이트가 `max_size_bytes`를 넘기게 하거나
//!   활성 파일 나이가 `max_age_days`를 넘으면 먼저 로테이션합니다.
//! - 헤더만 있는 파일은 로테이션하지 않습니다 (빈 백업 방지).
//! - 로테이션: flush, close, 타임스탬프 이름으로 rename, 새 파일 열기, 헤더 기록.
//! - 로테이션 후 개수/기간 보존 정책에 따라 오래된 백업을 삭제합니다.
//!
//! 모든 append는 `sync_data`로 디스크까지 내려간 뒤 반환합니다.

mod backup;
mod csv;

pub use csv::{CSV_HEADER, format_timestamp};

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, info, warn};
use trapsink_core::error::SinkError;
use trapsink_core::metrics as m;
use trapsink_core::pipeline::TrapSink;
use trapsink_core::types::TrapRow;

use crate::config::RotationPolicy;
use backup::{Backup, BackupNaming};

/// 벽시계 공급자. 테스트에서 시간을 고정하거나 앞당길 때 교체합니다.
pub type Clock = Arc<dyn Fn() -> SystemTime + Send + Sync>;

/// 싱크 상태 스냅샷
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkState {
    /// 활성 파일 경로
    pub active_file_path: PathBuf,
    /// 활성 파일에 flush된 바이트 수
    pub current_size_bytes: u64,
    /// 백업 파일 (오래된 순)
    pub backup_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
enum RotateReason {
    Size,
    Age,
}

impl RotateReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Age => "age",
        }
    }
}

/// 크기/기간/개수 기반 로테이션 CSV 싱크
pub struct RotatingCsvSink {
    path: PathBuf,
    naming: BackupNaming,
    policy: RotationPolicy,
    /// 로테이션 실패 후에는 `None`이며 다음 append에서 다시 엽니다.
    file: Option<File>,
    current_size: u64,
    opened_at: SystemTime,
    backups: Vec<Backup>,
    clock: Clock,
    closed: bool,
}

impl std::fmt::Debug for RotatingCsvSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingCsvSink")
            .field("path", &self.path)
            .field("policy", &self.policy)
            .field("current_size", &self.current_size)
            .field("backups", &self.backups.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl RotatingCsvSink {
    /// 활성 파일을 열고 기존 백업을 찾습니다.
    ///
    /// 비어 있지 않은 기존 파일에는 헤더 없이 이어서 씁니다.
    pub fn open(path: impl Into<PathBuf>, policy: RotationPolicy) -> Result<Self, SinkError> {
        Self::with_clock(path, policy, Arc::new(SystemTime::now))
    }

    /// 시계를 지정해 싱크를 엽니다.
    pub fn with_clock(
        path: impl Into<PathBuf>,
        policy: RotationPolicy,
        clock: Clock,
    ) -> Result<Self, SinkError> {
        let path = path.into();
        let naming = BackupNaming::for_path(&path);

        std::fs::create_dir_all(naming.dir()).map_err(|e| SinkError::Open {
            path: naming.dir().display().to_string(),
            source: e,
        })?;

        let backups = naming.discover().map_err(|e| SinkError::Open {
            path: naming.dir().display().to_string(),
            source: e,
        })?;

        let now = clock();
        let mut sink = Self {
            path,
            naming,
            policy,
            file: None,
            current_size: 0,
            opened_at: now,
            backups,
            clock,
            closed: false,
        };
        sink.open_active(now)?;
        sink.prune(now);

        info!(
            path = %sink.path.display(),
            size = sink.current_size,
            backups = sink.backups.len(),
            max_size_bytes = sink.policy.max_size_bytes,
            max_backups = sink.policy.max_backups,
            max_age_days = sink.policy.max_age_days,
            "CSV sink opened"
        );
        Ok(sink)
    }

    /// 활성 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 현재 상태 스냅샷
    pub fn state(&self) -> SinkState {
        SinkState {
            active_file_path: self.path.clone(),
            current_size_bytes: self.current_size,
            backup_files: self.backups.iter().map(|b| b.path.clone()).collect(),
        }
    }

    /// 정규 경로의 파일을 append 모드로 열고, 비어 있으면 헤더를 씁니다.
    ///
    /// 마지막 줄바꿈 뒤에 남은 불완전한 행은 잘라냅니다.
    fn open_active(&mut self, now: SystemTime) -> Result<(), SinkError> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.open_error(e))?;
        let metadata = file.metadata().map_err(|e| self.open_error(e))?;

        let len = trim_partial_row(&mut file, metadata.len()).map_err(|e| self.write_error(e))?;
        if len < metadata.len() {
            warn!(
                path = %self.path.display(),
                discarded = metadata.len() - len,
                "discarded incomplete trailing row"
            );
        }

        if len == 0 {
            file.write_all(CSV_HEADER.as_bytes())
                .and_then(|()| file.sync_data())
                .map_err(|e| self.write_error(e))?;
            self.current_size = CSV_HEADER.len() as u64;
            self.opened_at = now;
        } else {
            // 재시작 시 나이는 파일 생성 시각 기준, 지원하지 않는 플랫폼은 수정 시각
            self.current_size = len;
            self.opened_at = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or(now);
        }

        self.file = Some(file);
        metrics::gauge!(m::SINK_ACTIVE_FILE_BYTES).set(self.current_size as f64);
        Ok(())
    }

    fn rotation_due(&self, pending: u64, now: SystemTime) -> Option<RotateReason> {
        // 헤더만 있는 파일은 로테이션하지 않음
        if self.current_size <= CSV_HEADER.len() as u64 {
            return None;
        }

        if let Some(max_age) = self.policy.max_age() {
            let age = now.duration_since(self.opened_at).unwrap_or_default();
            if age > max_age {
                return Some(RotateReason::Age);
            }
        }

        let max = self.policy.max_size_bytes;
        if max > 0 && self.current_size.saturating_add(pending) > max {
            return Some(RotateReason::Size);
        }

        None
    }

    fn rotate(&mut self, now: SystemTime, reason: RotateReason) -> Result<(), SinkError> {
        self.retire_active(now, reason)?;
        self.open_active(now).map_err(|e| SinkError::Rotate {
            path: self.path.display().to_string(),
            reason: format!("reopen failed: {}", e),
        })
    }

    /// 활성 파일을 닫고 백업 이름으로 옮긴 뒤 보존 정책을 적용합니다.
    ///
    /// 이후 재생성이 실패해도 백업 목록은 이미 정책 안에 있습니다.
    fn retire_active(&mut self, now: SystemTime, reason: RotateReason) -> Result<(), SinkError> {
        if let Some(file) = self.file.take() {
            file.sync_all().map_err(|e| self.write_error(e))?;
        }

        let backup = self.naming.next_backup(now);
        std::fs::rename(&self.path, &backup.path).map_err(|e| SinkError::Rotate {
            path: self.path.display().to_string(),
            reason: format!("rename to {}: {}", backup.path.display(), e),
        })?;

        info!(
            backup = %backup.path.display(),
            size = self.current_size,
            reason = reason.as_str(),
            "rotated CSV file"
        );
        metrics::counter!(m::SINK_ROTATIONS_TOTAL, m::LABEL_REASON => reason.as_str()).increment(1);
        self.backups.push(backup);
        self.prune(now);
        Ok(())
    }

    /// 보존 기간과 개수를 넘는 백업을 삭제합니다. 삭제 실패는 경고만 남깁니다.
    fn prune(&mut self, now: SystemTime) {
        let mut expired: Vec<Backup> = Vec::new();

        if let Some(max_age) = self.policy.max_age() {
            let (old, keep): (Vec<Backup>, Vec<Backup>) = std::mem::take(&mut self.backups)
                .into_iter()
                .partition(|b| now.duration_since(b.rotated_at).unwrap_or_default() > max_age);
            expired.extend(old);
            self.backups = keep;
        }

        let max = self.policy.max_backups;
        if max > 0 && self.backups.len() > max {
            let excess = self.backups.len() - max;
            expired.extend(self.backups.drain(..excess));
        }

        for backup in expired {
            match std::fs::remove_file(&backup.path) {
                Ok(()) => {
                    debug!(path = %backup.path.display(), "removed old backup");
                    metrics::counter!(m::SINK_BACKUPS_PRUNED_TOTAL).increment(1);
                }
                Err(e) => warn!(
                    path = %backup.path.display(),
                    error = %e,
                    "failed to remove old backup"
                ),
            }
        }
    }

    fn open_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Open {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn write_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Write {
            path: self.path.display().to_string(),
            source,
        }
    }
}

/// 마지막 줄바꿈 뒤의 바이트를 잘라내고 남은 길이를 반환합니다.
///
/// 줄바꿈이 전혀 없으면 헤더도 완성되지 않은 파일이므로 0으로 만듭니다.
fn trim_partial_row(file: &mut File, len: u64) -> std::io::Result<u64> {
    const CHUNK: u64 = 4096;

    let mut buf = [0u8; CHUNK as usize];
    let mut end = len;
    let mut keep = 0;
    while end > 0 {
        let start = end.saturating_sub(CHUNK);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|&b| b == b'\n') {
            keep = start + pos as u64 + 1;
            break;
        }
        end = start;
    }

    if keep < len {
        file.set_len(keep)?;
    }
    Ok(keep)
}

impl TrapSink for RotatingCsvSink {
    fn append(&mut self, rows: &[TrapRow]) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        if rows.is_empty() {
            return Ok(());
        }

        let mut buf = String::with_capacity(rows.len() * 96);
        for row in rows {
            csv::write_row(&mut buf, row);
        }

        let now = (self.clock)();
        if self.file.is_none() {
            self.open_active(now)?;
        }
        if let Some(reason) = self.rotation_due(buf.len() as u64, now) {
            self.rotate(now, reason)?;
        }

        let Some(file) = self.file.as_mut() else {
            return Err(SinkError::Closed);
        };
        let result = file.write_all(buf.as_bytes()).and_then(|()| file.sync_data());
        if let Err(e) = result {
            // 일부만 기록된 행을 버림. 실패하면 다음 open_active가 잘라냄
            if let Err(trim) = file.set_len(self.current_size) {
                warn!(path = %self.path.display(), error = %trim, "failed to discard partial row");
            }
            self.file = None;
            return Err(self.write_error(e));
        }

        self.current_size += buf.len() as u64;
        metrics::gauge!(m::SINK_ACTIVE_FILE_BYTES).set(self.current_size as f64);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(file) = self.file.take() {
            file.sync_all().map_err(|e| self.write_error(e))?;
        }
        debug!(path = %self.path.display(), "CSV sink closed");
        Ok(())
    }
}
