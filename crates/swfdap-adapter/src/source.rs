//! Mapping of runtime script paths to client source descriptors.

use std::path::{Path, PathBuf};

use swfdap_core::SourceFile;
use swfdap_protocol::Source;

const FRAMEWORKS_UNIX: &str = "/frameworks/projects/";
const FRAMEWORKS_WINDOWS: &str = "\\frameworks\\projects\\";

/// Builds [`Source`] values, remapping framework sources compiled on
/// another machine into the local SDK.
#[derive(Debug, Clone, Default)]
pub struct SourceMapper {
    sdk_home: Option<PathBuf>,
}

impl SourceMapper {
    pub fn new(sdk_home: Option<PathBuf>) -> Self {
        Self { sdk_home }
    }

    /// Rewrites `path` under the SDK home when it points into the SDK
    /// framework sources and the rewritten file exists; otherwise returns
    /// it unchanged.
    pub fn transform_path(&self, path: &str) -> String {
        let Some(sdk_home) = &self.sdk_home else {
            return path.to_string();
        };
        let tail = [FRAMEWORKS_UNIX, FRAMEWORKS_WINDOWS]
            .iter()
            .find_map(|marker| path.find(marker).map(|at| &path[at + 1..]));
        let Some(tail) = tail else {
            return path.to_string();
        };
        let mut candidate = sdk_home.clone();
        for part in tail.split(['/', '\\']).filter(|p| !p.is_empty()) {
            candidate.push(part);
        }
        if candidate.is_file() {
            candidate.to_string_lossy().into_owned()
        } else {
            path.to_string()
        }
    }

    pub fn to_source(&self, file: &SourceFile) -> Source {
        let path = self.transform_path(&file.full_path);
        let name = Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.name.clone());
        Source {
            name: Some(name),
            path: Some(path),
            source_reference: None,
        }
    }
}
