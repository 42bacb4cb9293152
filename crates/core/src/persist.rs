use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::{LoglensError, Result};

/// Writes `value` as pretty-printed JSON (two-space indent), creating the
/// parent directory first.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| LoglensError::Io(format!("failed creating {}: {e}", parent.display())))?;
    }
    let file = File::create(path)
        .map_err(|e| LoglensError::Io(format!("failed creating {}: {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| LoglensError::Io(format!("failed writing {}: {e}", path.display())))?;
    writer
        .flush()
        .map_err(|e| LoglensError::Io(format!("failed writing {}: {e}", path.display())))
}
