use crate::config::MetricsConfig;
use crate::snapshot::CodeMetrics;
use std::path::Path;
use walkdir::WalkDir;

/// Count source files and lines under `root`.
///
/// Hidden entries and the configured ignore directories are skipped.
pub fn analyze_codebase(root: &Path, config: &MetricsConfig) -> CodeMetrics {
    let mut metrics = CodeMetrics::default();

    let entries = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.') && !config.ignore_dirs.iter().any(|d| *d == name)
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file());

    for entry in entries {
        let path = entry.path();
        let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
            continue;
        };
        if !config.extensions.iter().any(|x| x.eq_ignore_ascii_case(&ext)) {
            continue;
        }

        metrics.total_files += 1;
        if let Ok(text) = std::fs::read_to_string(path) {
            metrics.total_lines += text.lines().count() as u64;
        }

        let name = entry.file_name().to_string_lossy().to_lowercase();
        if matches!(ext.as_str(), "ts" | "tsx") {
            metrics.typescript_files += 1;
        }
        if matches!(ext.as_str(), "tsx" | "jsx") || name.contains("component") {
            metrics.component_files += 1;
        }
        if name.contains("test") || name.contains("spec") {
            metrics.test_files += 1;
        }
    }

    tracing::debug!(
        files = metrics.total_files,
        lines = metrics.total_lines,
        "analyzed codebase"
    );
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn counts_by_category() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/index.ts", "a\nb\nc\n");
        write(root, "src/App.tsx", "x\ny\n");
        write(root, "src/util.js", "one\n");
        write(root, "src/Button.component.js", "one\n");
        write(root, "src/api.test.ts", "t\n");
        write(root, "README.md", "ignored\n");

        let m = analyze_codebase(root, &MetricsConfig::default());
        assert_eq!(m.total_files, 5);
        assert_eq!(m.total_lines, 8);
        assert_eq!(m.typescript_files, 3);
        assert_eq!(m.component_files, 2);
        assert_eq!(m.test_files, 1);
    }

    #[test]
    fn skips_hidden_and_ignored_dirs() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, ".cache/gen.ts", "x\n");
        write(root, "node_modules/lib/index.js", "x\n");
        write(root, "dist/bundle.js", "x\n");
        write(root, "src/main.ts", "x\n");

        let m = analyze_codebase(root, &MetricsConfig::default());
        assert_eq!(m.total_files, 1);
    }

    #[test]
    fn extensions_are_configurable() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/lib.rs", "fn main() {}\n");
        write(root, "src/app.ts", "x\n");
        let config = MetricsConfig {
            extensions: vec!["rs".to_string()],
            ..MetricsConfig::default()
        };
        let m = analyze_codebase(root, &config);
        assert_eq!(m.total_files, 1);
        assert_eq!(m.typescript_files, 0);
    }
}
