//! PID/port file bookkeeping for `start`/`stop`/`status` (spec.md §6.3
//! `daemon.pid`, `daemon.port`).

use std::path::Path;

use oak_ci_infrastructure::config::ProjectPaths;

pub fn write(paths: &ProjectPaths, port: u16) -> anyhow::Result<()> {
    std::fs::create_dir_all(paths.oak_dir())?;
    std::fs::write(paths.pid_file(), std::process::id().to_string())?;
    std::fs::write(paths.port_file(), port.to_string())?;
    Ok(())
}

pub fn clear(paths: &ProjectPaths) {
    let _ = std::fs::remove_file(paths.pid_file());
    let _ = std::fs::remove_file(paths.port_file());
}

pub fn read_pid(paths: &ProjectPaths) -> Option<u32> {
    read_number(&paths.pid_file())
}

pub fn read_port(paths: &ProjectPaths) -> Option<u16> {
    read_number(&paths.port_file())
}

fn read_number<T: std::str::FromStr>(path: &Path) -> Option<T> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Whether a process with `pid` is still alive. Shells out to `kill -0`
/// rather than pulling in a signals crate for one check.
#[cfg(unix)]
pub fn is_running(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_running(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
pub fn terminate(pid: u32) -> anyhow::Result<()> {
    let status = std::process::Command::new("kill").args(["-TERM", &pid.to_string()]).status()?;
    if !status.success() {
        anyhow::bail!("kill -TERM {pid} failed");
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn terminate(_pid: u32) -> anyhow::Result<()> {
    anyhow::bail!("stopping a daemon by pid is only supported on unix targets")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips_pid_and_port() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        write(&paths, 4242).unwrap();

        assert_eq!(read_pid(&paths), Some(std::process::id()));
        assert_eq!(read_port(&paths), Some(4242));
    }

    #[test]
    fn clear_removes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        write(&paths, 1).unwrap();
        clear(&paths);

        assert_eq!(read_pid(&paths), None);
        assert_eq!(read_port(&paths), None);
    }

    #[test]
    fn missing_files_read_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        assert_eq!(read_pid(&paths), None);
    }

    #[cfg(unix)]
    #[test]
    fn current_process_is_running() {
        assert!(is_running(std::process::id()));
    }
}
