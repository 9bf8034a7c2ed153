use std::path::{Path, PathBuf};

const SNAP_SOCKET: &str = "/var/snap/lxd/common/lxd/unix.socket";
const DEFAULT_SOCKET: &str = "/var/lib/lxd/unix.socket";

/// Default config file: `~/.config/lxd-mcp/config.toml`
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/etc"))
        .join("lxd-mcp")
        .join("config.toml")
}

/// LXD unix socket when none is configured: `$LXD_DIR/unix.socket`, then the
/// snap socket if present, then the distribution default.
pub fn lxd_socket() -> PathBuf {
    socket_for(std::env::var_os("LXD_DIR").map(PathBuf::from), Path::new(SNAP_SOCKET))
}

fn socket_for(lxd_dir: Option<PathBuf>, snap: &Path) -> PathBuf {
    if let Some(dir) = lxd_dir
        && !dir.as_os_str().is_empty()
    {
        return dir.join("unix.socket");
    }
    if snap.exists() {
        return snap.to_path_buf();
    }
    PathBuf::from(DEFAULT_SOCKET)
}
