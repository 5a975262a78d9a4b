use std::{env, fs, path::PathBuf, process};

/// Installs a test logger once per test binary.
pub fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Writes `text` to a fresh file in the temp directory.
#[allow(dead_code)]
pub fn temp_file(name: &str, text: &str) -> PathBuf {
    let path = env::temp_dir().join(format!("confbind-{}-{name}", process::id()));
    fs::write(&path, text).unwrap();
    path
}
