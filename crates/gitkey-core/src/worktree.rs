use std::path::{Path, PathBuf};

/// Nearest ancestor of `start` (inclusive) containing a `.git` entry.
pub fn find_work_tree(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finds_repository_from_nested_directory() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("repo");
        let nested = repo.join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir(repo.join(".git")).unwrap();
        assert_eq!(find_work_tree(&nested), Some(repo));
    }

    #[test]
    fn gitfile_counts_as_repository() {
        // worktrees and submodules use a `.git` file
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".git"), b"gitdir: elsewhere").unwrap();
        assert_eq!(find_work_tree(dir.path()), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn stops_at_filesystem_root() {
        let dir = tempdir().unwrap();
        let plain = dir.path().join("plain");
        std::fs::create_dir_all(&plain).unwrap();
        // Only meaningful when no ancestor of the temp dir is a repository.
        if find_work_tree(dir.path()).is_none() {
            assert_eq!(find_work_tree(&plain), None);
        }
    }
}
