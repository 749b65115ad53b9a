//! Whole-entry filesystem moves and removals.

use camino::Utf8Path;
use std::fs;
use std::io;

/// Remove `path`, recursing into real directories.
///
/// Symbolic links are removed as links, never followed.
pub(crate) fn remove_entry(path: &Utf8Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Relocate `source` to `dest`, which must not exist.
///
/// Tries a rename first and falls back to copy-then-delete, for example
/// when the staging area and the destination sit on different
/// filesystems. A failed copy removes whatever it wrote, so `dest` is
/// either complete or absent.
pub(crate) fn move_entry(source: &Utf8Path, dest: &Utf8Path) -> io::Result<()> {
    match fs::rename(source, dest) {
        Ok(()) => return Ok(()),
        Err(err) => log::debug!("rename {source} -> {dest} failed ({err}); copying instead"),
    }

    if let Err(err) = copy_tree(source, dest) {
        if dest.exists()
            && let Err(cleanup) = remove_entry(dest)
        {
            log::warn!("failed to remove partial copy at {dest}: {cleanup}");
        }
        return Err(err);
    }
    if let Err(err) = remove_entry(source) {
        log::debug!("copied {source} but could not remove it: {err}");
    }
    Ok(())
}

fn copy_tree(source: &Utf8Path, dest: &Utf8Path) -> io::Result<()> {
    let meta = fs::metadata(source)?;
    if !meta.is_dir() {
        fs::copy(source, dest)?;
        return Ok(());
    }

    fs::create_dir(dest)?;
    for entry in source.read_dir_utf8()? {
        let entry = entry?;
        copy_tree(entry.path(), &dest.join(entry.file_name()))?;
    }
    fs::set_permissions(dest, meta.permissions())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn workspace() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
        (temp, root)
    }

    #[test]
    fn remove_entry_handles_files_and_directories() {
        let (_temp, root) = workspace();
        let file = root.join("settings.php");
        let dir = root.join("core");
        fs::write(&file, b"x").expect("write file");
        fs::create_dir_all(dir.join("misc")).expect("create dir");
        fs::write(dir.join("misc/a.js"), b"a").expect("write nested");

        remove_entry(&file).expect("remove file");
        remove_entry(&dir).expect("remove dir");

        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn remove_entry_reports_missing_paths() {
        let (_temp, root) = workspace();
        let err = remove_entry(&root.join("absent")).expect_err("missing");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn move_entry_relocates_whole_tree() {
        let (_temp, root) = workspace();
        let source = root.join("staged/core");
        fs::create_dir_all(source.join("includes")).expect("create");
        fs::write(source.join("includes/bootstrap.inc"), b"boot").expect("write");
        let dest = root.join("site/core");
        fs::create_dir_all(root.join("site")).expect("create dest parent");

        move_entry(&source, &dest).expect("move");

        assert!(!source.exists());
        assert_eq!(
            fs::read(dest.join("includes/bootstrap.inc")).expect("read"),
            b"boot"
        );
    }

    #[test]
    fn copy_tree_duplicates_nested_content() {
        let (_temp, root) = workspace();
        let source = root.join("a");
        fs::create_dir_all(source.join("b/c")).expect("create");
        fs::write(source.join("b/c/d.txt"), b"d").expect("write");
        fs::write(source.join("top.txt"), b"t").expect("write");

        copy_tree(&source, &root.join("copy")).expect("copy");

        assert_eq!(fs::read(root.join("copy/b/c/d.txt")).expect("read"), b"d");
        assert_eq!(fs::read(root.join("copy/top.txt")).expect("read"), b"t");
        assert!(source.exists());
    }

    #[test]
    fn failed_move_leaves_no_partial_destination() {
        let (_temp, root) = workspace();
        let dest = root.join("site/core");

        let err = move_entry(&root.join("missing"), &dest).expect_err("nothing to move");

        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!dest.exists());
    }
}
