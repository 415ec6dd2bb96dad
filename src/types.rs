// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Why/where an application is being launched.
///
/// Launch types are one of the dimensions hooks filter on: most hooks only
/// make sense for an interactive `Local` launch, while farm jobs run
/// unattended.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LaunchType {
    /// Application is launched on the local machine.
    #[default]
    Local,
    /// Render job on the farm.
    FarmRender,
    /// Post-render publish job on the farm.
    FarmPublish,
    /// Launched on a remote machine.
    Remote,
    /// Launched for automated publishing.
    Automated,
}

impl LaunchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchType::Local => "local",
            LaunchType::FarmRender => "farm-render",
            LaunchType::FarmPublish => "farm-publish",
            LaunchType::Remote => "remote",
            LaunchType::Automated => "automated",
        }
    }
}

impl fmt::Display for LaunchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LaunchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "local" => Ok(LaunchType::Local),
            "farm-render" => Ok(LaunchType::FarmRender),
            "farm-publish" => Ok(LaunchType::FarmPublish),
            "remote" => Ok(LaunchType::Remote),
            "automated" => Ok(LaunchType::Automated),
            other => Err(format!(
                "invalid launch type: {other} (expected one of local, farm-render, \
                 farm-publish, remote, automated)"
            )),
        }
    }
}

/// Default environment group used when a launch doesn't name one.
pub const DEFAULT_ENV_GROUP: &str = "default";

/// Platform name used by hook platform filters: `windows`, `linux` or `darwin`.
pub fn current_platform_name() -> &'static str {
    if cfg!(windows) {
        "windows"
    } else if cfg!(target_os = "macos") {
        "darwin"
    } else {
        "linux"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_type_round_trips_through_str() {
        for lt in [
            LaunchType::Local,
            LaunchType::FarmRender,
            LaunchType::FarmPublish,
            LaunchType::Remote,
            LaunchType::Automated,
        ] {
            assert_eq!(lt.as_str().parse::<LaunchType>().unwrap(), lt);
        }
        assert_eq!("farm_render".parse::<LaunchType>().unwrap(), LaunchType::FarmRender);
        assert!("cloud".parse::<LaunchType>().is_err());
    }
}
