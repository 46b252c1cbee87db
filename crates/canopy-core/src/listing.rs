//! Listing files in a directory by extension.

use std::path::Path;

use tracing::debug;

use crate::error::{CanopyError, Result};

/// Names of regular files in `dir` ending with `extension` (e.g. `".tif"`),
/// sorted. Matching is case-sensitive and not recursive.
pub fn list_files_with_extension(dir: impl AsRef<Path>, extension: &str) -> Result<Vec<String>> {
    let dir = dir.as_ref();
    let open_err = |source| CanopyError::Open {
        path: dir.to_path_buf(),
        source,
    };
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(open_err)? {
        let entry = entry.map_err(open_err)?;
        if !entry.file_type().map_err(open_err)?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(extension) {
            names.push(name);
        }
    }
    names.sort();
    debug!(dir = %dir.display(), extension, n_files = names.len(), "files listed");
    Ok(names)
}

/// Write one name per line.
pub fn write_file_list(path: impl AsRef<Path>, names: &[String]) -> Result<()> {
    let path = path.as_ref();
    let csv_err = |source| CanopyError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;
    for name in names {
        wtr.write_record([name]).map_err(csv_err)?;
    }
    wtr.flush().map_err(|source| CanopyError::Create {
        path: path.to_path_buf(),
        source,
    })
}
