use std::fs;
use std::io;
use std::path::Path;

/// Writes an export, creating the parent directory when needed.
pub fn write_export(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, text)
}

pub fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_export_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");

        write_export(&path, "100,5,T4_BAG").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "100,5,T4_BAG");
    }
}
