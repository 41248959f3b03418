//! 백업 파일 이름 규칙과 탐색
//!
//! 백업 이름: `<stem>-<UTC %Y-%m-%dT%H-%M-%S%.3f>[-<seq>].<ext>`
//! `seq`는 같은 밀리초에 이름이 겹칠 때만 붙습니다.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";

/// `2026-10-16T12-00-00.000`의 길이
const TIMESTAMP_LEN: usize = 23;

/// 로테이션으로 생긴 백업 파일
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Backup {
    pub path: PathBuf,
    /// 이름에 새겨진 로테이션 시각
    pub rotated_at: SystemTime,
    /// 같은 시각 내 순번 (0 = 접미사 없음)
    pub seq: u32,
}

/// 활성 파일 경로에서 백업 이름 규칙을 만듭니다.
#[derive(Debug, Clone)]
pub(crate) struct BackupNaming {
    dir: PathBuf,
    stem: String,
    /// 점을 포함한 확장자 (없으면 빈 문자열)
    ext: String,
}

impl BackupNaming {
    pub fn for_path(active: &Path) -> Self {
        let dir = match active.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = active
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = active
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        Self { dir, stem, ext }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `at` 시각의 백업 경로. `seq`가 0이면 순번 접미사를 붙이지 않습니다.
    pub fn backup_path(&self, at: SystemTime, seq: u32) -> PathBuf {
        let ts = DateTime::<Utc>::from(at).format(TIMESTAMP_FORMAT);
        let name = if seq == 0 {
            format!("{}-{}{}", self.stem, ts, self.ext)
        } else {
            format!("{}-{}-{}{}", self.stem, ts, seq, self.ext)
        };
        self.dir.join(name)
    }

    /// 존재하지 않는 백업 경로를 고릅니다.
    pub fn next_backup(&self, at: SystemTime) -> Backup {
        let mut seq = 0;
        loop {
            let path = self.backup_path(at, seq);
            if !path.exists() {
                return Backup {
                    path,
                    rotated_at: truncate_to_millis(at),
                    seq,
                };
            }
            seq += 1;
        }
    }

    /// 파일 이름이 백업 규칙에 맞으면 (시각, 순번)을 반환합니다.
    pub fn parse(&self, file_name: &str) -> Option<(SystemTime, u32)> {
        let middle = file_name
            .strip_prefix(self.stem.as_str())?
            .strip_prefix('-')?
            .strip_suffix(self.ext.as_str())?;
        let ts = middle.get(..TIMESTAMP_LEN)?;
        let rest = middle.get(TIMESTAMP_LEN..)?;

        let seq = if rest.is_empty() {
            0
        } else {
            let digits = rest.strip_prefix('-')?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok()?
        };

        let naive = NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).ok()?;
        Some((naive.and_utc().into(), seq))
    }

    /// 디렉토리에서 기존 백업을 찾아 오래된 순으로 정렬합니다.
    pub fn discover(&self) -> std::io::Result<Vec<Backup>> {
        let mut backups = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some((rotated_at, seq)) = self.parse(name) {
                backups.push(Backup {
                    path: entry.path(),
                    rotated_at,
                    seq,
                });
            }
        }
        backups.sort_by_key(|b| (b.rotated_at, b.seq));
        debug!(
            dir = %self.dir.display(),
            count = backups.len(),
            "discovered existing backups"
        );
        Ok(backups)
    }
}

/// 이름에 밀리초까지만 남으므로 메모리상 시각도 맞춰 둡니다.
fn truncate_to_millis(at: SystemTime) -> SystemTime {
    let dt = DateTime::<Utc>::from(at);
    DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())
        .map(SystemTime::from)
        .unwrap_or(at)
}
