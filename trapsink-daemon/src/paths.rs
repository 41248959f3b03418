//! Resolution of configured file paths.
//!
//! Relative `csv_path` and `log_file` values are anchored at the directory
//! that holds the daemon binary, so output lands next to the executable no
//! matter which working directory the service manager uses.

use std::path::{Path, PathBuf};

/// Directory containing the running executable, if it can be determined.
pub fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// Anchor a relative path at `base`. Absolute paths, and any path when
/// `base` is unknown, are returned unchanged.
pub fn resolve_from_exe_dir(path: &str, base: Option<&Path>) -> PathBuf {
    let path = PathBuf::from(path);
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_is_anchored_at_base() {
        let base = Path::new("/opt/trapsink/bin");
        assert_eq!(
            resolve_from_exe_dir("snmp_traps.csv", Some(base)),
            PathBuf::from("/opt/trapsink/bin/snmp_traps.csv")
        );
        assert_eq!(
            resolve_from_exe_dir("logs/service.log", Some(base)),
            PathBuf::from("/opt/trapsink/bin/logs/service.log")
        );
    }

    #[test]
    fn absolute_path_is_kept() {
        assert_eq!(
            resolve_from_exe_dir("/var/lib/trapsink/traps.csv", Some(Path::new("/opt"))),
            PathBuf::from("/var/lib/trapsink/traps.csv")
        );
        assert_eq!(
            resolve_from_exe_dir("traps.csv", None),
            PathBuf::from("traps.csv")
        );
    }

    #[test]
    fn exe_dir_is_known_for_test_binary() {
        let dir = exe_dir().expect("test binary has a parent directory");
        assert!(dir.is_absolute());
    }
}
