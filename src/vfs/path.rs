/// A location inside the user's drive as the shell sees it.
///
/// Shell paths look like Unix paths (`/docs/reports`) and may use `.` and
/// `..`; those are folded lexically here, so what reaches the
/// [`PathResolver`](super::PathResolver) is always a clean relative path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VirtualPath {
    /// Path segments below the drive root (e.g. ["docs", "reports"])
    segments: Vec<String>,
}

impl VirtualPath {
    /// The drive root
    pub fn root() -> Self {
        VirtualPath::default()
    }

    /// Parse a path string, folding `.` and `..` (which stops at the root)
    pub fn parse(path: &str) -> Self {
        VirtualPath::root().join(path)
    }

    /// Get the path segments
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Check if this path is the drive root
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Get the parent path
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            None
        } else {
            let mut parent_segments = self.segments.clone();
            parent_segments.pop();
            Some(VirtualPath {
                segments: parent_segments,
            })
        }
    }

    /// Get the last segment (filename)
    pub fn filename(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    /// Resolve `other` against this path. A leading `/` restarts from the root.
    pub fn join(&self, other: &str) -> Self {
        let mut new_segments = if other.starts_with('/') {
            Vec::new()
        } else {
            self.segments.clone()
        };

        for segment in other.split('/') {
            if segment.is_empty() || segment == "." {
                continue;
            } else if segment == ".." {
                new_segments.pop();
            } else {
                new_segments.push(segment.to_string());
            }
        }

        VirtualPath {
            segments: new_segments,
        }
    }

    /// Relative path for a file operation (`docs/a.txt`, empty for the root)
    pub fn as_file(&self) -> String {
        self.segments.join("/")
    }

    /// Relative path for a directory operation (`docs/`, empty for the root)
    pub fn as_dir(&self) -> String {
        if self.segments.is_empty() {
            String::new()
        } else {
            format!("{}/", self.segments.join("/"))
        }
    }
}

impl std::fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}
