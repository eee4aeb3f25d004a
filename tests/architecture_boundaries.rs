use std::fs;
use std::path::{Path, PathBuf};

const PORTABLE_MODULES: &[&str] = &[
    "src/system/cpu.rs",
    "src/system/memory.rs",
    "src/system/procfs.rs",
    "src/system/resolver.rs",
    "src/system/source.rs",
    "src/system/ticks.rs",
];

fn rs_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|s| s.to_str()) == Some("rs") {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

fn rel(path: &Path) -> String {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let rel = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string();
    rel.replace('\\', "/")
}

#[test]
fn portable_modules_do_not_reach_into_platform_code() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut violations = Vec::new();

    for module in PORTABLE_MODULES {
        let file = root.join(module);
        let content = fs::read_to_string(&file).unwrap_or_default();
        assert!(!content.is_empty(), "{module} is missing or empty");
        for forbidden in ["platform::", "sysinfo::", "libc::", "windows_sys::", "libproc::"] {
            if content.contains(forbidden) {
                violations.push(format!(
                    "{} uses forbidden path `{}`",
                    rel(&file),
                    forbidden
                ));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Portable/platform boundary violations:\n{}",
        violations.join("\n")
    );
}

#[test]
fn target_os_cfg_is_scoped_to_system_platform() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut violations = Vec::new();

    for file in rs_files(&root) {
        let content = fs::read_to_string(&file).unwrap_or_default();
        if !content.contains("target_os") {
            continue;
        }

        let rel_path = rel(&file);
        if !rel_path.starts_with("src/system/platform/") {
            violations.push(format!(
                "{} contains `target_os` cfg but is outside allowed boundary",
                rel_path
            ));
        }
    }

    assert!(
        violations.is_empty(),
        "Unexpected target_os cfg usage:\n{}",
        violations.join("\n")
    );
}

#[test]
fn native_ffi_is_scoped_to_system_platform() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut violations = Vec::new();

    for file in rs_files(&root) {
        let content = fs::read_to_string(&file).unwrap_or_default();
        if !content.contains("extern \"C\"") {
            continue;
        }
        let rel_path = rel(&file);
        if !rel_path.starts_with("src/system/platform/") {
            violations.push(format!("{} declares foreign functions", rel_path));
        }
    }

    assert!(
        violations.is_empty(),
        "Foreign function declarations outside platform code:\n{}",
        violations.join("\n")
    );
}
