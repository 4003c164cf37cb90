use std::{
    ffi::{OsStr, OsString},
    path::PathBuf,
    sync::LazyLock,
};

use regex::Regex;

pub trait KinedlPathExt {
    /// Append an extension after the existing one.
    ///
    /// `video.mp4` with `enc` becomes `video.mp4.enc`.
    fn append_extension<T: AsRef<OsStr>>(&mut self, extension: T);
}

impl KinedlPathExt for PathBuf {
    fn append_extension<T: AsRef<OsStr>>(&mut self, extension: T) {
        let mut filename = OsString::new();
        if let Some(name) = self.file_name() {
            filename.push(name);
        }
        filename.push(".");
        filename.push(extension);

        self.set_file_name(filename);
    }
}

static RESERVED_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap()
});

/// Turn a job title into something usable as a file name on every platform.
pub fn sanitize_file_name(title: &str) -> String {
    let name = RESERVED_CHARS.replace_all(title, "_");
    // Windows refuses names ending in a dot or space
    let name = name.trim().trim_end_matches(['.', ' ']);
    if name.is_empty() {
        "untitled".to_string()
    } else {
        name.to_string()
    }
}
