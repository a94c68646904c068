use crate::error::{Error, Result};
use crate::types::{ResourceKind, ANIMATION_EXTENSIONS, FONT_EXTENSIONS};
use std::path::{Component, Path, PathBuf};

/// Longest path, in characters, the cache will store or hand out.
pub const MAX_PATH_LEN: usize = 260;

const RESOURCES_DIR: &str = "resources";

/// Derive the watched root for `kind` from the configuration file location:
/// `<config dir>/resources/<fonts|animations>`.
pub fn resource_root(config_file: &Path, kind: ResourceKind) -> Result<PathBuf> {
    let config_dir = match config_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => return Err(Error::InvalidConfigPath(config_file.to_path_buf())),
    };

    let resources = build_path(config_dir, RESOURCES_DIR)?;
    build_path(&resources, kind.folder_name())
}

/// Join `name` onto `base`, refusing to produce a path longer than [`MAX_PATH_LEN`].
pub fn build_path(base: &Path, name: &str) -> Result<PathBuf> {
    let path = base.join(name);
    ensure_path_len(&path)?;
    Ok(path)
}

pub fn ensure_path_len(path: &Path) -> Result<()> {
    let len = path.as_os_str().to_string_lossy().chars().count();
    if len > MAX_PATH_LEN {
        return Err(Error::PathTooLong {
            path: path.to_path_buf(),
            len,
            max: MAX_PATH_LEN,
        });
    }
    Ok(())
}

/// `/`-separated path of `path` below `base`, used as a stable match key.
pub fn relative_key(path: &Path, base: &Path) -> String {
    let relative = pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf());

    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(os_str) => Some(os_str.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[inline]
pub fn has_extension(file_name: &str, extensions: &[&str]) -> bool {
    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some(ext) => extensions.iter().any(|allowed| ext.eq_ignore_ascii_case(allowed)),
        None => false,
    }
}

/// Whether a change to `path` can affect either cache. Names without a dot
/// are usually directories, so they count as relevant. Everything after the
/// last dot is the extension, which makes dotfiles like `.DS_Store` irrelevant.
pub fn is_relevant_change(path: &Path) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };

    match file_name.rsplit_once('.') {
        Some((_, ext)) => FONT_EXTENSIONS
            .iter()
            .chain(ANIMATION_EXTENSIONS)
            .any(|allowed| ext.eq_ignore_ascii_case(allowed)),
        None => true,
    }
}

/// Turn the stored font setting (for example `%LOCALAPPDATA%\App\resources\fonts\sub\Bold.ttf`)
/// into the relative key the font cache matches on. Settings that do not start
/// with `prefix` name a font outside the watched folder and yield `None`.
pub fn font_identifier_from_setting(setting: &str, prefix: &str) -> Option<String> {
    if prefix.is_empty() || setting.len() < prefix.len() {
        return None;
    }

    let (head, rest) = setting.split_at_checked(prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) || rest.is_empty() {
        return None;
    }

    Some(rest.replace('\\', "/"))
}
