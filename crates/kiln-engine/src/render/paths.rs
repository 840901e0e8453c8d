//! Destination path normalization

use camino::Utf8PathBuf;

/// Normalize a rendered destination into a path relative to the output root.
///
/// Leading `/` and `./` are dropped, backslashes become `/` and empty
/// segments collapse. Parent segments, newlines and empty results are rejected.
pub fn normalize_destination(rendered: &str) -> Result<Utf8PathBuf, String> {
    if rendered.contains(['\n', '\r', '\0']) {
        return Err(format!(
            "destination {:?} contains a control character",
            rendered
        ));
    }

    let unified = rendered.trim().replace('\\', "/");
    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(format!(
                    "destination '{}' escapes the output directory",
                    rendered
                ))
            }
            s if s.ends_with(':') && segments.is_empty() => {
                return Err(format!("destination '{}' must be relative", rendered))
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(format!("destination {:?} renders to an empty path", rendered));
    }

    Ok(Utf8PathBuf::from(segments.join("/")))
}
