use serde::Serialize;

/// Whether a resource is a stored object or a virtual directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceKind {
    File,
    Directory,
}

/// A file or virtual directory as returned to callers.
///
/// Descriptors are projections of the object store computed per request;
/// `path` + `name` (+ `/` for directories) gives the resource's path
/// relative to the user's root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    /// Parent directory, empty or ending with `/`
    pub path: String,
    /// Last segment, without a trailing slash
    pub name: String,
    /// Byte length; `None` for directories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
}

impl Resource {
    /// Describe the file at `relative` (a root-relative key)
    pub fn file(relative: &str, size: u64) -> Self {
        let (path, name) = split_parent(relative);
        Resource {
            path: path.to_string(),
            name: name.to_string(),
            size: Some(size),
            kind: ResourceKind::File,
        }
    }

    /// Describe the directory at `relative`; a trailing slash is optional.
    /// The empty path describes the user's root.
    pub fn directory(relative: &str) -> Self {
        let (path, name) = split_parent(relative.trim_end_matches('/'));
        Resource {
            path: path.to_string(),
            name: name.to_string(),
            size: None,
            kind: ResourceKind::Directory,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ResourceKind::Directory
    }

    /// Root-relative path; directories end with `/`
    pub fn relative_path(&self) -> String {
        match self.kind {
            ResourceKind::File => format!("{}{}", self.path, self.name),
            ResourceKind::Directory if self.name.is_empty() => self.path.clone(),
            ResourceKind::Directory => format!("{}{}/", self.path, self.name),
        }
    }
}

fn split_parent(relative: &str) -> (&str, &str) {
    match relative.rfind('/') {
        Some(i) => (&relative[..=i], &relative[i + 1..]),
        None => ("", relative),
    }
}
