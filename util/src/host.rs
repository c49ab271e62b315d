//! Host platform (linux for example) utility functions

use std::path::PathBuf;

use uname;

/// Environment variable giving the root of the software tree, under which
/// the `params` and `sessions` directories live.
pub const SW_ROOT_ENV_VAR: &str = "PLUTO_SW_ROOT";

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<uname::Info> {
    uname::uname()
}

/// Get the root directory of the software tree from `PLUTO_SW_ROOT`.
pub fn get_pluto_sw_root() -> Result<PathBuf, std::env::VarError> {
    std::env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
