//! Per-case working directories.

use crate::matrix::variables::{VariableSet, VARS_FILE_NAME};
use crate::shared::logging;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Entries never carried over into a clone: terraform's own caches and any
/// state left behind by earlier local runs.
const SKIPPED_ENTRIES: [&str; 3] = [".terraform", ".terraform.lock.hcl", VARS_FILE_NAME];

/// Covers `terraform.tfstate`, its backups and the `terraform.tfstate.d/`
/// workspace states.
const STATE_PREFIX: &str = "terraform.tfstate";

fn is_skipped(name: &OsStr) -> bool {
    name.to_str()
        .is_some_and(|n| SKIPPED_ENTRIES.contains(&n) || n.starts_with(STATE_PREFIX))
}

enum Backing {
    Isolated(TempDir),
    Kept,
    InPlace(PathBuf),
}

/// The directory one case runs terraform in.
///
/// Isolated workspaces are removed on drop unless kept; in-place workspaces
/// only remove the variables file they wrote.
pub struct CaseWorkspace {
    dir: PathBuf,
    backing: Backing,
}

impl CaseWorkspace {
    /// Clone `module_dir` into a fresh scratch directory and write `vars` there.
    pub fn isolated(module_dir: &Path, vars: &VariableSet, keep: bool) -> io::Result<Self> {
        if !module_dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("module directory not found: {}", module_dir.display()),
            ));
        }

        let scratch = tempfile::Builder::new().prefix("tfmatrix-").tempdir()?;
        let module_name = module_dir
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "module".into());
        let dir = scratch.path().join(module_name);
        copy_module(module_dir, &dir)?;
        vars.write_to_dir(&dir)?;

        let backing = if keep {
            let root = scratch.keep();
            logging::info(&format!("Keeping working directory {}", root.display()));
            Backing::Kept
        } else {
            Backing::Isolated(scratch)
        };

        Ok(Self { dir, backing })
    }

    /// Run directly in `module_dir`. Only safe when cases run one at a time.
    pub fn in_place(module_dir: &Path, vars: &VariableSet) -> io::Result<Self> {
        let vars_file = vars.write_to_dir(module_dir)?;
        Ok(Self {
            dir: module_dir.to_path_buf(),
            backing: Backing::InPlace(vars_file),
        })
    }

    /// Prepare a workspace on the blocking pool so large module trees do not
    /// stall the runtime.
    pub async fn prepare(
        module_dir: &Path,
        vars: &VariableSet,
        isolate: bool,
        keep: bool,
    ) -> io::Result<Self> {
        let module_dir = module_dir.to_path_buf();
        let vars = vars.clone();
        tokio::task::spawn_blocking(move || {
            if isolate {
                Self::isolated(&module_dir, &vars, keep)
            } else {
                Self::in_place(&module_dir, &vars)
            }
        })
        .await
        .map_err(io::Error::other)?
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Path that survives the run, for keep-workdirs mode.
    pub fn kept_path(&self) -> Option<&Path> {
        match self.backing {
            Backing::Kept => Some(&self.dir),
            _ => None,
        }
    }
}

impl Drop for CaseWorkspace {
    fn drop(&mut self) {
        match &self.backing {
            Backing::InPlace(vars_file) => {
                if let Err(e) = std::fs::remove_file(vars_file) {
                    logging::warn(&format!(
                        "Failed to remove {}: {}",
                        vars_file.display(),
                        e
                    ));
                }
            }
            Backing::Isolated(scratch) => {
                logging::debug(&format!("Removing {}", scratch.path().display()));
            }
            Backing::Kept => {}
        }
    }
}

/// Recursive copy of a module source tree. Symlinks are recreated, never
/// followed.
fn copy_module(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    let walker = WalkDir::new(from)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_skipped(entry.file_name()));

    for entry in walker {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let target = to.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(source)?, target)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> io::Result<()> {
    // Only file links can be materialized without following a directory cycle
    match fs::metadata(source) {
        Ok(meta) if meta.is_file() => fs::copy(source, target).map(|_| ()),
        _ => {
            logging::debug(&format!("Skipping link {}", source.display()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn module() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.tf"), "resource \"aws_vpc\" \"this\" {}").unwrap();
        fs::write(dir.path().join("variables.tf"), "variable \"vpc_cidr\" {}").unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        fs::write(dir.path().join("templates/user_data.sh"), "#!/bin/sh").unwrap();
        fs::create_dir_all(dir.path().join(".terraform/providers")).unwrap();
        fs::write(dir.path().join(".terraform.lock.hcl"), "").unwrap();
        fs::write(dir.path().join("terraform.tfstate"), "{}").unwrap();
        fs::write(dir.path().join("terraform.tfstate.1700000000.backup"), "{}").unwrap();
        fs::create_dir_all(dir.path().join("terraform.tfstate.d/dev")).unwrap();
        fs::write(dir.path().join("terraform.tfstate.d/dev/terraform.tfstate"), "{}").unwrap();
        dir
    }

    #[test]
    fn test_isolated_clone_skips_caches() {
        let source = module();
        let vars = VariableSet::new().set("vpc_cidr", "10.0.0.0/16");

        let workspace = CaseWorkspace::isolated(source.path(), &vars, false).unwrap();
        let dir = workspace.path();

        assert_ne!(dir, source.path());
        assert!(dir.join("main.tf").exists());
        assert!(dir.join("templates/user_data.sh").exists());
        assert!(dir.join(VARS_FILE_NAME).exists());
        assert!(!dir.join(".terraform").exists());
        assert!(!dir.join(".terraform.lock.hcl").exists());
        assert!(!dir.join("terraform.tfstate").exists());
        assert!(!dir.join("terraform.tfstate.1700000000.backup").exists());
        assert!(!dir.join("terraform.tfstate.d").exists());
        assert!(workspace.kept_path().is_none());

        // the module itself is untouched
        assert!(!source.path().join(VARS_FILE_NAME).exists());
    }

    #[test]
    fn test_isolated_clone_removed_on_drop() {
        let source = module();
        let workspace =
            CaseWorkspace::isolated(source.path(), &VariableSet::new(), false).unwrap();
        let dir = workspace.path().to_path_buf();
        assert!(dir.exists());
        drop(workspace);
        assert!(!dir.exists());
    }

    #[test]
    fn test_kept_clone_survives_drop() {
        let source = module();
        let workspace =
            CaseWorkspace::isolated(source.path(), &VariableSet::new(), true).unwrap();
        let dir = workspace.kept_path().unwrap().to_path_buf();
        drop(workspace);
        assert!(dir.join("main.tf").exists());
        fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_two_clones_do_not_share_directories() {
        let source = module();
        let a = CaseWorkspace::isolated(source.path(), &VariableSet::new().set("n", 1), false)
            .unwrap();
        let b = CaseWorkspace::isolated(source.path(), &VariableSet::new().set("n", 2), false)
            .unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_in_place_removes_vars_file() {
        let source = module();
        let workspace =
            CaseWorkspace::in_place(source.path(), &VariableSet::new().set("a", 1)).unwrap();
        assert_eq!(workspace.path(), source.path());
        assert!(source.path().join(VARS_FILE_NAME).exists());
        drop(workspace);
        assert!(!source.path().join(VARS_FILE_NAME).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_recreated_not_followed() {
        let source = module();
        std::os::unix::fs::symlink(".", source.path().join("self")).unwrap();
        std::os::unix::fs::symlink("main.tf", source.path().join("alias.tf")).unwrap();

        let workspace =
            CaseWorkspace::isolated(source.path(), &VariableSet::new(), false).unwrap();
        let dir = workspace.path();

        let link = fs::symlink_metadata(dir.join("self")).unwrap();
        assert!(link.file_type().is_symlink());
        assert_eq!(fs::read_link(dir.join("self")).unwrap(), PathBuf::from("."));
        assert_eq!(
            fs::read_to_string(dir.join("alias.tf")).unwrap(),
            "resource \"aws_vpc\" \"this\" {}"
        );
    }

    #[tokio::test]
    async fn test_prepare_off_runtime() {
        let source = module();
        let vars = VariableSet::new().set("vpc_cidr", "10.0.0.0/16");

        let workspace = CaseWorkspace::prepare(source.path(), &vars, true, false)
            .await
            .unwrap();
        assert_ne!(workspace.path(), source.path());
        assert!(workspace.path().join(VARS_FILE_NAME).exists());

        let in_place = CaseWorkspace::prepare(source.path(), &vars, false, false)
            .await
            .unwrap();
        assert_eq!(in_place.path(), source.path());
    }

    #[test]
    fn test_missing_module_directory() {
        let result = CaseWorkspace::isolated(Path::new("/no/such/module"), &VariableSet::new(), false);
        assert!(result.is_err());
    }
}
