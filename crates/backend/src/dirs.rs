use std::path::PathBuf;

/// Get the root directory holding groups, domain records and proxy links
///
/// Respects the following environment variables (in order of precedence):
/// 1. DFB_DIR - explicit root override
/// 2. dirs::home_dir() joined with `.dfb`
pub fn default_root_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("DFB_DIR") {
    return PathBuf::from(dir);
  }

  default_home_dir().join(".dfb")
}

/// Get the directory new domains are created under
///
/// Respects the following environment variables (in order of precedence):
/// 1. DFB_HOME - explicit home override
/// 2. dirs::home_dir() - platform default
pub fn default_home_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("DFB_HOME") {
    return PathBuf::from(dir);
  }

  dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Get the default data directory, used for daemon log files
///
/// Respects the following environment variables (in order of precedence):
/// 1. DATA_DIR - explicit data directory override
/// 2. XDG_DATA_HOME - standard XDG data home directory
/// 3. dirs::data_local_dir() - platform default
///
/// Must not resolve to a directory under the root, every directory there is
/// read as a group.
pub fn default_data_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("DATA_DIR") {
    return PathBuf::from(dir);
  }

  if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
    return PathBuf::from(xdg_data).join("dfb");
  }

  dirs::data_local_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join("dfb")
}

/// Get the default directory for per-run temporary files (exclusion lists)
pub fn default_temp_dir() -> PathBuf {
  std::env::temp_dir()
}
