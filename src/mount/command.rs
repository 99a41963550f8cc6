//! Argument vectors for the external mount tooling.

use std::path::Path;

/// Name used to find running instances of `executable` (its file name).
#[must_use]
pub fn executable_name(executable: &Path) -> String {
    executable
        .file_name()
        .unwrap_or(executable.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// Lists mounts whose source is `name`; exits 0 when there is at least one.
#[must_use]
pub fn find_mounts(name: &str) -> Vec<String> {
    vec!["findmnt".into(), name.into()]
}

/// Terminates every process called `name`.
#[must_use]
pub fn kill_all(name: &str) -> Vec<String> {
    vec!["killall".into(), name.into()]
}

/// Overlay option binding the mount to its backing directory.
#[must_use]
pub fn subdir_option(data_dir: &Path) -> String {
    format!("-omodules=subdir,subdir={}", data_dir.display())
}

/// Starts the service daemonized over `mount_point`.
#[must_use]
pub fn mount(executable: &Path, mount_point: &Path, data_dir: &Path) -> Vec<String> {
    vec![
        executable.display().to_string(),
        mount_point.display().to_string(),
        subdir_option(data_dir),
    ]
}

/// Starts the service in the foreground with FUSE debugging, detached through
/// the shell so its output lands in `log` rather than the capture pipe.
#[must_use]
pub fn mount_debug(executable: &Path, mount_point: &Path, data_dir: &Path, log: &Path) -> Vec<String> {
    let script = format!(
        "{} -f -d {} {} > {} 2>&1 &",
        shell_quote(&executable.display().to_string()),
        shell_quote(&mount_point.display().to_string()),
        shell_quote(&subdir_option(data_dir)),
        shell_quote(&log.display().to_string()),
    );
    vec!["sh".into(), "-c".into(), script]
}

/// Detaches the filesystem mounted at `mount_point`.
#[must_use]
pub fn unmount(mount_point: &Path) -> Vec<String> {
    vec!["fusermount".into(), "-u".into(), mount_point.display().to_string()]
}

/// Single-quotes `word` for `sh`.
fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_binds_the_data_directory() {
        let argv = mount(Path::new("charybdefs"), Path::new("/mnt/faulty"), Path::new("/srv/data"));
        assert_eq!(argv, vec!["charybdefs", "/mnt/faulty", "-omodules=subdir,subdir=/srv/data"]);
    }

    #[test]
    fn debug_mount_redirects_to_the_log() {
        let argv = mount_debug(
            Path::new("/opt/charybdefs"),
            Path::new("/mnt/it's faulty"),
            Path::new("/srv/data"),
            Path::new("/tmp/service.log"),
        );
        assert_eq!(argv[..2], ["sh", "-c"]);
        assert_eq!(
            argv[2],
            "'/opt/charybdefs' -f -d '/mnt/it'\\''s faulty' '-omodules=subdir,subdir=/srv/data' > '/tmp/service.log' 2>&1 &"
        );
    }

    #[test]
    fn stale_instance_commands_use_the_file_name() {
        let name = executable_name(Path::new("/usr/local/bin/charybdefs"));
        assert_eq!(name, "charybdefs");
        assert_eq!(find_mounts(&name), vec!["findmnt", "charybdefs"]);
        assert_eq!(kill_all(&name), vec!["killall", "charybdefs"]);
        assert_eq!(unmount(Path::new("/mnt/faulty")), vec!["fusermount", "-u", "/mnt/faulty"]);
    }
}
