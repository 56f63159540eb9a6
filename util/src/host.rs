//! Host platform utility functions

use std::path::PathBuf;

/// Environment variable pointing at the root of the software workspace.
pub const SW_ROOT_ENV_VAR: &str = "TRAJ_TRACK_SW_ROOT";

/// Get the root directory of the software, as given by `TRAJ_TRACK_SW_ROOT`.
pub fn get_sw_root() -> Result<PathBuf, std::env::VarError> {
    std::env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
