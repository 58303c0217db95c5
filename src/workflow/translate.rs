//! Vantage output path -> local path and Adstream folder.

use path_clean::PathClean;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::config::{AppConfig, PathRoot};
use crate::workflow::types::Destination;

/// Why a path does not lead to an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    /// File sits in the staging directory
    Staging,
    /// No Adstream folder configured for this taxonomy folder
    Unmapped { folder: String },
    /// No parent directory to derive a folder from
    Malformed,
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::Staging => f.write_str("file is in the staging folder"),
            Skip::Unmapped { folder } => write!(f, "no Adstream folder mapped for {:?}", folder),
            Skip::Malformed => f.write_str("path has no parent folder"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub folder_key: String,
    pub file_name: String,
    pub destination: Destination,
}

pub struct PathTranslator {
    roots: Vec<PathRoot>,
    staging_folder: String,
    folders: BTreeMap<String, String>,
}

impl PathTranslator {
    pub fn new(
        roots: Vec<PathRoot>,
        staging_folder: impl Into<String>,
        folders: BTreeMap<String, String>,
    ) -> Self {
        Self {
            roots,
            staging_folder: staging_folder.into(),
            folders,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.paths.roots.clone(),
            config.paths.staging_folder.clone(),
            config.adstream.folders.clone(),
        )
    }

    pub fn translate(&self, source_path: &str) -> Result<Translation, Skip> {
        let (folder_key, file_name) = split_folder_and_file(source_path).ok_or(Skip::Malformed)?;

        if folder_key.eq_ignore_ascii_case(&self.staging_folder) {
            return Err(Skip::Staging);
        }

        let container_id = self
            .folders
            .get(folder_key)
            .ok_or_else(|| Skip::Unmapped {
                folder: folder_key.to_string(),
            })?
            .clone();

        Ok(Translation {
            folder_key: folder_key.to_string(),
            file_name: file_name.to_string(),
            destination: Destination {
                local_path: self.local_path(source_path),
                container_id,
            },
        })
    }

    /// Rewrite the source path into a slash separated path for this host.
    pub fn local_path(&self, source_path: &str) -> PathBuf {
        let slashed = to_slashes(source_path);

        for root in &self.roots {
            let prefix = to_slashes(&root.prefix);
            let prefix = prefix.trim_end_matches('/');
            if let Some(rest) = strip_prefix_ignore_case(&slashed, prefix) {
                if rest.is_empty() || rest.starts_with('/') {
                    let mount = root.mount.trim_end_matches(['/', '\\']);
                    return PathBuf::from(format!("{}/{}", mount, rest.trim_start_matches('/')))
                        .clean();
                }
            }
        }

        if is_unc(&slashed) {
            // Cleaning would fold the leading `//` into a single root
            let body: Vec<&str> = slashed.split('/').filter(|c| !c.is_empty()).collect();
            PathBuf::from(format!("//{}", body.join("/")))
        } else {
            PathBuf::from(slashed).clean()
        }
    }
}

fn to_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

fn is_unc(slashed: &str) -> bool {
    slashed.starts_with("//")
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        s.get(prefix.len()..)
    } else {
        None
    }
}

/// Immediate parent directory name and file name, for either separator.
fn split_folder_and_file(source_path: &str) -> Option<(&str, &str)> {
    let parts: Vec<&str> = source_path
        .split(['\\', '/'])
        .filter(|c| !c.is_empty())
        .collect();
    let (&file_name, rest) = parts.split_last()?;
    let &folder = rest.last()?;
    // A bare drive designator is not a folder
    if folder.ends_with(':') {
        return None;
    }
    Some((folder, file_name))
}
