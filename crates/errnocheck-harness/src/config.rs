//! Run configuration.
//!
//! A `Config` describes everything a run needs besides the scenario table:
//! the block device backing the read-only mount, the unprivileged account,
//! and how often to loop.
//!
//! ## Example
//!
//! ```ignore
//! use errnocheck_harness::Config;
//!
//! let config = Config::new()
//!     .device("/dev/loop0")
//!     .fs_type("ext2")
//!     .iterations(10)
//!     .timing(true);
//! ```
//!
//! ## Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `copies` | 1 |
//! | `iterations` | 1 (0 loops until interrupted) |
//! | `duration` | none |
//! | `pause` | none |
//! | `fs_type` | `ext4` |
//! | `user` | `nobody` |
//! | `errno_logging` / `timing` | false |

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_FS_TYPE: &str = "ext4";
pub const DEFAULT_USER: &str = "nobody";

/// How the scenario loop decides when to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Looping {
    /// Run the table this many times.
    Count(u32),
    /// Run the table until this much time has elapsed.
    Duration(Duration),
    /// Run until a signal arrives.
    Forever,
}

impl Looping {
    /// Whether iteration `index` (0-based) should run given `elapsed` time.
    pub fn should_run(&self, index: u32, elapsed: Duration) -> bool {
        match *self {
            Looping::Count(n) => index < n,
            Looping::Duration(d) => elapsed < d,
            Looping::Forever => true,
        }
    }
}

/// Complete run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub copies: u32,
    pub errno_logging: bool,
    pub iterations: u32,
    pub duration: Option<Duration>,
    pub pause: Option<Duration>,
    pub timing: bool,
    pub fs_type: String,
    pub device: Option<PathBuf>,
    pub user: String,
    /// Parent directory of the scratch directory. System temp dir if unset.
    pub scratch_base: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            copies: 1,
            errno_logging: false,
            iterations: 1,
            duration: None,
            pause: None,
            timing: false,
            fs_type: DEFAULT_FS_TYPE.into(),
            device: None,
            user: DEFAULT_USER.into(),
            scratch_base: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copies(mut self, copies: u32) -> Self {
        self.copies = copies;
        self
    }

    pub fn errno_logging(mut self, enabled: bool) -> Self {
        self.errno_logging = enabled;
        self
    }

    pub fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Loop for a fixed wall-clock time. Overrides `iterations`.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn pause(mut self, pause: Duration) -> Self {
        self.pause = Some(pause);
        self
    }

    pub fn timing(mut self, enabled: bool) -> Self {
        self.timing = enabled;
        self
    }

    pub fn fs_type(mut self, fs_type: impl Into<String>) -> Self {
        self.fs_type = fs_type.into();
        self
    }

    pub fn device(mut self, device: impl Into<PathBuf>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn scratch_base(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_base = Some(dir.into());
        self
    }

    pub fn looping(&self) -> Looping {
        match (self.duration, self.iterations) {
            (Some(d), _) => Looping::Duration(d),
            (None, 0) => Looping::Forever,
            (None, n) => Looping::Count(n),
        }
    }

    /// Check the configuration and return the device to format.
    pub fn validate(&self) -> Result<&PathBuf, ConfigError> {
        if self.copies != 1 {
            return Err(ConfigError::UnsupportedCopies(self.copies));
        }
        if self.fs_type.is_empty() {
            return Err(ConfigError::EmptyFsType);
        }
        if self.user.is_empty() {
            return Err(ConfigError::EmptyUser);
        }
        match &self.device {
            None => Err(ConfigError::MissingDevice),
            Some(d) if d.as_os_str().is_empty() => Err(ConfigError::MissingDevice),
            Some(d) => Ok(d),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = Config::new();
        assert_eq!(config.copies, 1);
        assert_eq!(config.fs_type, "ext4");
        assert_eq!(config.user, "nobody");
        assert_eq!(config.looping(), Looping::Count(1));
    }

    #[test]
    fn config_builder() {
        let config = Config::new()
            .device("/dev/loop3")
            .fs_type("ext2")
            .iterations(5)
            .pause(Duration::from_millis(10))
            .errno_logging(true)
            .timing(true);

        assert_eq!(config.device, Some(PathBuf::from("/dev/loop3")));
        assert_eq!(config.fs_type, "ext2");
        assert_eq!(config.looping(), Looping::Count(5));
        assert_eq!(config.pause, Some(Duration::from_millis(10)));
        assert!(config.errno_logging && config.timing);
    }

    #[test]
    fn device_is_required() {
        assert_eq!(Config::new().validate(), Err(ConfigError::MissingDevice));
        assert_eq!(
            Config::new().device("").validate(),
            Err(ConfigError::MissingDevice)
        );
        assert!(Config::new().device("/dev/loop0").validate().is_ok());
    }

    #[test]
    fn multiple_copies_rejected() {
        let config = Config::new().device("/dev/loop0").copies(4);
        assert_eq!(config.validate(), Err(ConfigError::UnsupportedCopies(4)));
    }

    #[test]
    fn duration_overrides_iterations() {
        let config = Config::new().iterations(3).duration(Duration::from_secs(2));
        assert_eq!(config.looping(), Looping::Duration(Duration::from_secs(2)));
    }

    #[test]
    fn zero_iterations_loops_forever() {
        assert_eq!(Config::new().iterations(0).looping(), Looping::Forever);
    }

    #[test]
    fn looping_should_run() {
        assert!(Looping::Count(2).should_run(1, Duration::ZERO));
        assert!(!Looping::Count(2).should_run(2, Duration::ZERO));
        let d = Looping::Duration(Duration::from_secs(1));
        assert!(d.should_run(100, Duration::from_millis(999)));
        assert!(!d.should_run(0, Duration::from_secs(1)));
        assert!(Looping::Forever.should_run(u32::MAX, Duration::MAX));
    }
}
