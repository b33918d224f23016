use std::env;
use std::ffi::{CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const PATH_KEY: &str = "PATH";

fn is_executable(path: &Path) -> bool {
	path.metadata().map_or(false, |m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

fn to_cstring(path: &Path) -> Option<CString> {
	CString::new(path.as_os_str().as_bytes()).ok()
}

/// Resolves a program name the way `execvp` would: names containing a
/// slash are taken as paths, anything else is searched for in `PATH`.
pub fn lookup(name: &str) -> Option<CString> {
	if name.is_empty() {
		return None;
	}
	if name.contains('/') {
		return to_cstring(Path::new(name));
	}
	let paths = env::var_os(PATH_KEY)?;
	env::split_paths(&paths)
		.map(|dir: PathBuf| dir.join(OsStr::new(name)))
		.find(|candidate| is_executable(candidate))
		.and_then(|found| to_cstring(&found))
}
