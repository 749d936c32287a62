use std::path::{Path, PathBuf};
use tddctx_core::paths::find_project_root;

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `TDDCTX_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` to the first directory holding a project marker
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_from(&cwd)
}

fn resolve_from(cwd: &Path) -> PathBuf {
    find_project_root(cwd).unwrap_or_else(|| cwd.to_path_buf())
}
