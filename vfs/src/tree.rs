//! In-memory virtual directory tree.
//!
//! Directories live in an arena and are addressed by [`DirId`]. Besides its named
//! children, every directory carries the two tagged links `.` and `..`; the root's
//! `..` leads back to the root. Recursive operations skip the tagged links.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::path::vpath_cmp;

/// Classification of a file, which decides the per-user root it is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Data,
    Config,
    Cache,
}

/// Precedence of the source a file was discovered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Primary,
    Secondary,
}

/// A file of the virtual tree, mapped to a real absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    name: String,
    path: PathBuf,
    kind: AssetKind,
    priority: Priority,
}

impl AssetFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, kind: AssetKind, priority: Priority) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind,
            priority,
        }
    }

    /// Single path component naming the file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Real absolute path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    pub(crate) fn set_kind(&mut self, kind: AssetKind) {
        self.kind = kind;
    }
}

/// Index of a directory in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirLink {
    Current,
    Parent,
    Child(DirId),
}

#[derive(Debug)]
struct DirEntry {
    name: String,
    link: DirLink,
}

#[derive(Debug)]
struct AssetDir {
    parent: Option<DirId>,
    entries: Vec<DirEntry>,
    files: Vec<AssetFile>,
}

impl AssetDir {
    fn new(parent: Option<DirId>) -> Self {
        Self {
            parent,
            entries: vec![
                DirEntry {
                    name: ".".into(),
                    link: DirLink::Current,
                },
                DirEntry {
                    name: "..".into(),
                    link: DirLink::Parent,
                },
            ],
            files: Vec::new(),
        }
    }

    fn children(&self) -> impl Iterator<Item = (&str, DirId)> {
        self.entries.iter().filter_map(|e| match e.link {
            DirLink::Child(id) => Some((e.name.as_str(), id)),
            DirLink::Current | DirLink::Parent => None,
        })
    }
}

/// Outcome of inserting a scanned file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    Added,
    Overridden,
    Kept,
}

/// The merged virtual directory tree.
#[derive(Debug)]
pub struct AssetTree {
    dirs: Vec<AssetDir>,
}

impl Default for AssetTree {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetTree {
    pub fn new() -> Self {
        Self {
            dirs: vec![AssetDir::new(None)],
        }
    }

    pub fn root(&self) -> DirId {
        DirId(0)
    }

    fn dir(&self, id: DirId) -> &AssetDir {
        &self.dirs[id.0]
    }

    fn dir_mut(&mut self, id: DirId) -> &mut AssetDir {
        &mut self.dirs[id.0]
    }

    fn resolve(&self, from: DirId, link: DirLink) -> DirId {
        match link {
            DirLink::Current => from,
            DirLink::Parent => self.dir(from).parent.unwrap_or(from),
            DirLink::Child(id) => id,
        }
    }

    /// Looks up a directory entry by name, including `.` and `..`.
    pub fn child(&self, dir: DirId, name: &str) -> Option<DirId> {
        self.dir(dir)
            .entries
            .iter()
            .find(|e| vpath_cmp(&e.name, name) == Ordering::Equal)
            .map(|e| self.resolve(dir, e.link))
    }

    /// Returns the named subdirectory, creating it if needed.
    pub fn make_dir(&mut self, dir: DirId, name: &str) -> DirId {
        if let Some(existing) = self.child(dir, name) {
            return existing;
        }

        let id = DirId(self.dirs.len());
        self.dirs.push(AssetDir::new(Some(dir)));
        let entry = DirEntry {
            name: name.to_string(),
            link: DirLink::Child(id),
        };
        let entries = &mut self.dir_mut(dir).entries;
        let at = entries
            .iter()
            .position(|e| {
                matches!(e.link, DirLink::Child(_)) && vpath_cmp(&e.name, name) == Ordering::Greater
            })
            .unwrap_or(entries.len());
        entries.insert(at, entry);
        id
    }

    /// Walks a chain of components from the root.
    pub fn find_dir<'a>(&self, components: impl IntoIterator<Item = &'a str>) -> Option<DirId> {
        components
            .into_iter()
            .try_fold(self.root(), |dir, name| self.child(dir, name))
    }

    /// Walks a chain of components from the root, creating missing directories.
    pub fn make_dirs<'a>(&mut self, components: impl IntoIterator<Item = &'a str>) -> DirId {
        let mut dir = self.root();
        for name in components {
            dir = self.make_dir(dir, name);
        }
        dir
    }

    fn file_index(&self, dir: DirId, name: &str) -> Result<usize, usize> {
        self.dir(dir)
            .files
            .binary_search_by(|f| vpath_cmp(&f.name, name))
    }

    /// Binary-searches the files of a sorted directory.
    pub fn find_file(&self, dir: DirId, name: &str) -> Option<&AssetFile> {
        let index = self.file_index(dir, name).ok()?;
        Some(&self.dir(dir).files[index])
    }

    pub(crate) fn find_file_mut(&mut self, dir: DirId, name: &str) -> Option<&mut AssetFile> {
        let index = self.file_index(dir, name).ok()?;
        Some(&mut self.dir_mut(dir).files[index])
    }

    /// Adds a file discovered by a scan, applying source precedence.
    ///
    /// A primary file overrides a secondary one of the same name; nothing else
    /// replaces an existing entry. The directory is left unsorted until
    /// [`sort`](Self::sort) runs.
    pub fn insert_scanned(&mut self, dir: DirId, file: AssetFile) -> Insert {
        let files = &mut self.dir_mut(dir).files;
        match files
            .iter()
            .position(|f| vpath_cmp(&f.name, &file.name) == Ordering::Equal)
        {
            None => {
                files.push(file);
                Insert::Added
            }
            Some(i)
                if file.priority == Priority::Primary
                    && files[i].priority == Priority::Secondary =>
            {
                files[i] = AssetFile {
                    name: std::mem::take(&mut files[i].name),
                    ..file
                };
                Insert::Overridden
            }
            Some(_) => Insert::Kept,
        }
    }

    /// Adds a file to a sorted directory, keeping it sorted.
    ///
    /// Returns `false` if a file of that name already exists.
    pub fn insert_sorted(&mut self, dir: DirId, file: AssetFile) -> bool {
        match self.file_index(dir, &file.name) {
            Ok(_) => false,
            Err(at) => {
                self.dir_mut(dir).files.insert(at, file);
                true
            }
        }
    }

    /// Sorts files and subdirectory links of every directory by the vpath comparator.
    pub fn sort(&mut self) {
        for dir in &mut self.dirs {
            dir.files.sort_by(|a, b| vpath_cmp(&a.name, &b.name));
            dir.entries.sort_by(|a, b| match (a.link, b.link) {
                (DirLink::Child(_), DirLink::Child(_)) => vpath_cmp(&a.name, &b.name),
                (DirLink::Child(_), _) => Ordering::Greater,
                (_, DirLink::Child(_)) => Ordering::Less,
                _ => Ordering::Equal,
            });
        }
    }

    /// Files directly inside `dir`, in stored order.
    pub fn files(&self, dir: DirId) -> &[AssetFile] {
        &self.dir(dir).files
    }

    /// Named subdirectories of `dir`, skipping `.` and `..`.
    pub fn subdirs(&self, dir: DirId) -> impl Iterator<Item = (&str, DirId)> {
        self.dir(dir).children()
    }

    /// Whether no file exists anywhere below `dir`.
    pub fn is_empty_below(&self, dir: DirId) -> bool {
        self.dir(dir).files.is_empty() && self.subdirs(dir).all(|(_, id)| self.is_empty_below(id))
    }

    /// Whether the tree holds no file at all.
    pub fn is_empty(&self) -> bool {
        self.is_empty_below(self.root())
    }

    /// Number of files below `dir`, recursively.
    pub fn count_files(&self, dir: DirId) -> usize {
        self.dir(dir).files.len()
            + self
                .subdirs(dir)
                .map(|(_, id)| self.count_files(id))
                .sum::<usize>()
    }

    /// Number of directories, the root included.
    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, path: &str, priority: Priority) -> AssetFile {
        AssetFile::new(name, path, AssetKind::Data, priority)
    }

    #[test]
    fn root_links_point_to_itself() {
        let tree = AssetTree::new();
        let root = tree.root();
        assert_eq!(tree.child(root, "."), Some(root));
        assert_eq!(tree.child(root, ".."), Some(root));
        assert!(tree.is_empty());
    }

    #[test]
    fn parent_links_resolve() {
        let mut tree = AssetTree::new();
        let levels = tree.make_dir(tree.root(), "levels");
        let act = tree.make_dir(levels, "act1");
        assert_eq!(tree.child(act, ".."), Some(levels));
        assert_eq!(tree.child(act, "."), Some(act));
        assert_eq!(tree.find_dir(["LEVELS", "Act1"]), Some(act));
        assert_eq!(tree.find_dir(["levels", "act2"]), None);
    }

    #[test]
    fn make_dir_reuses_existing() {
        let mut tree = AssetTree::new();
        let a = tree.make_dir(tree.root(), "images");
        let b = tree.make_dir(tree.root(), "IMAGES");
        assert_eq!(a, b);
        assert_eq!(tree.dir_count(), 2);
        assert_eq!(tree.subdirs(tree.root()).count(), 1);
    }

    #[test]
    fn precedence_rules() {
        let mut tree = AssetTree::new();
        let root = tree.root();
        assert_eq!(tree.insert_scanned(root, file("a.png", "/sec/a.png", Priority::Secondary)), Insert::Added);
        assert_eq!(tree.insert_scanned(root, file("A.PNG", "/pri/a.png", Priority::Primary)), Insert::Overridden);
        assert_eq!(tree.insert_scanned(root, file("a.png", "/pri2/a.png", Priority::Primary)), Insert::Kept);
        assert_eq!(tree.insert_scanned(root, file("a.png", "/sec2/a.png", Priority::Secondary)), Insert::Kept);

        tree.sort();
        let found = tree.find_file(root, "a.png").unwrap();
        assert_eq!(found.path(), Path::new("/pri/a.png"));
        assert_eq!(found.priority(), Priority::Primary);
    }

    #[test]
    fn sorted_lookup_and_insert() {
        let mut tree = AssetTree::new();
        let root = tree.root();
        for name in ["zeta", "Alpha", "mid", "beta"] {
            tree.insert_scanned(root, file(name, name, Priority::Primary));
        }
        tree.sort();
        let names: Vec<&str> = tree.files(root).iter().map(|f| f.name()).collect();
        assert_eq!(names, ["Alpha", "beta", "mid", "zeta"]);

        assert!(tree.insert_sorted(root, file("gamma", "gamma", Priority::Primary)));
        assert!(!tree.insert_sorted(root, file("GAMMA", "gamma", Priority::Primary)));
        assert!(tree.find_file(root, "Gamma").is_some());
        assert!(tree.find_file(root, "delta").is_none());
    }

    #[test]
    fn counting_skips_links() {
        let mut tree = AssetTree::new();
        let root = tree.root();
        let a = tree.make_dir(root, "a");
        let b = tree.make_dir(a, "b");
        tree.insert_scanned(b, file("x", "x", Priority::Primary));
        tree.insert_scanned(root, file("y", "y", Priority::Primary));
        assert_eq!(tree.count_files(root), 2);
        assert!(!tree.is_empty_below(a));
        let empty = tree.make_dir(root, "empty");
        assert!(tree.is_empty_below(empty));
    }

    #[test]
    fn sort_keeps_links_first() {
        let mut tree = AssetTree::new();
        let root = tree.root();
        tree.make_dir(root, "b");
        tree.make_dir(root, "a");
        tree.sort();
        let names: Vec<&str> = tree.subdirs(root).map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(tree.child(root, ".."), Some(root));
    }
}
