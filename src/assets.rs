// src/assets.rs
//
// Resolution of Flutter asset keys (e.g. "assets/audio/Master.bank") to
// files on disk.

use std::path::{Path, PathBuf};

use log::debug;

/// Searches asset roots in order for a relative bank path.
#[derive(Debug, Clone, Default)]
pub struct AssetResolver {
    roots: Vec<PathBuf>,
}

impl AssetResolver {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// `extra` roots first, then the platform's bundled-asset locations.
    pub fn with_platform_defaults(extra: &[PathBuf]) -> Self {
        let mut roots = extra.to_vec();
        roots.extend(platform_asset_roots());
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// First existing `<root>/<asset>`, or `asset` unchanged when no root has
    /// it (e.g. a debug run whose working directory is the project root).
    /// Absolute paths are returned as given.
    pub fn resolve(&self, asset: &str) -> PathBuf {
        let raw = Path::new(asset);
        if raw.is_absolute() {
            return raw.to_path_buf();
        }

        for root in &self.roots {
            let candidate = root.join(raw);
            if candidate.exists() {
                debug!("resolve_asset: {} -> {}", asset, candidate.display());
                return candidate;
            }
        }

        debug!("resolve_asset: {} not found under asset roots, using as-is", asset);
        raw.to_path_buf()
    }
}

/// Where a Flutter app bundles its assets, relative to the running executable.
pub fn platform_asset_roots() -> Vec<PathBuf> {
    let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    else {
        return Vec::new();
    };
    asset_roots_for(&exe_dir)
}

#[cfg(target_os = "macos")]
fn asset_roots_for(exe_dir: &Path) -> Vec<PathBuf> {
    // <App>.app/Contents/MacOS/<exe>
    let contents = exe_dir.join("..");
    vec![
        contents.join("Resources").join("flutter_assets"),
        contents
            .join("Frameworks")
            .join("App.framework")
            .join("Resources")
            .join("flutter_assets"),
    ]
}

#[cfg(target_os = "ios")]
fn asset_roots_for(exe_dir: &Path) -> Vec<PathBuf> {
    vec![
        exe_dir
            .join("Frameworks")
            .join("App.framework")
            .join("flutter_assets"),
    ]
}

// Android hands bank bytes over the channel; assets never touch the filesystem.
#[cfg(target_os = "android")]
fn asset_roots_for(_exe_dir: &Path) -> Vec<PathBuf> {
    Vec::new()
}

#[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "android")))]
fn asset_roots_for(exe_dir: &Path) -> Vec<PathBuf> {
    vec![exe_dir.join("data").join("flutter_assets")]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_against_first_matching_root() {
        let empty = tempfile::tempdir().unwrap();
        let assets = tempfile::tempdir().unwrap();
        let bank = assets.path().join("audio").join("Master.bank");
        std::fs::create_dir_all(bank.parent().unwrap()).unwrap();
        std::fs::write(&bank, b"event:/A\n").unwrap();

        let resolver = AssetResolver::new(vec![
            empty.path().to_path_buf(),
            assets.path().to_path_buf(),
        ]);
        assert_eq!(resolver.resolve("audio/Master.bank"), bank);
    }

    #[test]
    fn test_falls_back_to_raw_path() {
        let empty = tempfile::tempdir().unwrap();
        let resolver = AssetResolver::new(vec![empty.path().to_path_buf()]);
        assert_eq!(
            resolver.resolve("assets/audio/Missing.bank"),
            PathBuf::from("assets/audio/Missing.bank")
        );
    }

    #[test]
    fn test_absolute_paths_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let abs = dir.path().join("Master.bank");
        let resolver = AssetResolver::new(vec![PathBuf::from("unused")]);
        assert_eq!(resolver.resolve(abs.to_str().unwrap()), abs);
    }

    #[test]
    fn test_extra_roots_come_first() {
        let resolver = AssetResolver::with_platform_defaults(&[PathBuf::from("/opt/assets")]);
        assert_eq!(resolver.roots()[0], PathBuf::from("/opt/assets"));
    }
}
