//! Kiosk configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::KioskError;

/// Environment variable overriding the configuration file path
pub const CONFIG_ENV: &str = "VOTECHAIN_CONFIG";

/// Environment variable overriding the backend host
pub const BACKEND_URL_ENV: &str = "VOTECHAIN_BACKEND_URL";

/// Kiosk configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// Base URL of the VoteChain backend
    pub backend_url: String,

    /// Deadlines for every bounded wait
    pub timeouts: Timeouts,

    /// Input sampling and debounce
    pub input: InputSettings,

    /// Session policy
    pub session: SessionSettings,

    /// File sink for logs while the console panel owns the terminal
    pub log_file: Option<PathBuf>,

    /// Simulated hardware
    pub simulator: SimulatorSettings,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:3000".to_string(),
            timeouts: Timeouts::default(),
            input: InputSettings::default(),
            session: SessionSettings::default(),
            log_file: None,
            simulator: SimulatorSettings::default(),
        }
    }
}

/// Deadlines, stored in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "millis")]
    pub check_in: Duration,
    #[serde(with = "millis")]
    pub vote: Duration,
    #[serde(with = "millis")]
    pub receipt_lookup: Duration,
    #[serde(with = "millis")]
    pub admin_poll: Duration,
    #[serde(with = "millis")]
    pub enrollment_report: Duration,
    /// Overall budget for national ID entry, measured from session start
    #[serde(with = "millis")]
    pub id_entry: Duration,
    /// Inactivity window for every state past ID entry
    #[serde(with = "millis")]
    pub session_idle: Duration,
    #[serde(with = "millis")]
    pub finger_scan: Duration,
    #[serde(with = "millis")]
    pub enrollment_scan: Duration,
    #[serde(with = "millis")]
    pub finger_removal: Duration,
    /// How long to poll for a receipt code after a confirmed vote
    #[serde(with = "millis")]
    pub receipt_window: Duration,
    #[serde(with = "millis")]
    pub receipt_poll_interval: Duration,
    /// How long to wait for the progress reporter to stop
    #[serde(with = "millis")]
    pub reporter_grace: Duration,
    /// Reset-button wait between admin polls on the idle screen
    #[serde(with = "millis")]
    pub idle_wait: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            check_in: Duration::from_secs(5),
            vote: Duration::from_secs(90),
            receipt_lookup: Duration::from_secs(5),
            admin_poll: Duration::from_millis(500),
            enrollment_report: Duration::from_secs(5),
            id_entry: Duration::from_secs(60),
            session_idle: Duration::from_secs(60),
            finger_scan: Duration::from_secs(10),
            enrollment_scan: Duration::from_secs(15),
            finger_removal: Duration::from_secs(10),
            receipt_window: Duration::from_secs(60),
            receipt_poll_interval: Duration::from_secs(1),
            reporter_grace: Duration::from_secs(1),
            idle_wait: Duration::from_millis(500),
        }
    }
}

/// Input sampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Consecutive asserted samples before a press is accepted
    pub debounce_samples: u8,
    #[serde(with = "millis")]
    pub settle: Duration,
    /// How long a finger must rest on the sensor before the image is used
    #[serde(with = "millis")]
    pub finger_hold: Duration,
    pub national_id_max_len: usize,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            debounce_samples: 2,
            settle: Duration::from_millis(200),
            finger_hold: Duration::from_millis(1500),
            national_id_max_len: votechain_core::NATIONAL_ID_MAX_LEN,
        }
    }
}

/// Session policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub finger_attempts: u32,
    /// Automatic check-in retries on network failure
    pub check_in_retries: u32,
    #[serde(with = "millis")]
    pub reporter_cadence: Duration,
    /// Time each page of an alternating receipt stays up
    #[serde(with = "millis")]
    pub receipt_page: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            finger_attempts: votechain_core::MAX_FINGER_ATTEMPTS,
            check_in_retries: 0,
            reporter_cadence: Duration::from_millis(125),
            receipt_page: Duration::from_secs(3),
        }
    }
}

/// One template preloaded into the simulated sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededTemplate {
    /// Storage slot on the sensor
    pub location: u16,
    /// Simulated finger (F1-F9 on the console) that matches it
    pub finger: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    pub templates: Vec<SeededTemplate>,
    /// How long a console finger press stays on the sensor
    #[serde(with = "millis")]
    pub touch_duration: Duration,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            templates: (1..=5)
                .map(|n| SeededTemplate {
                    location: n,
                    finger: n,
                })
                .collect(),
            touch_duration: Duration::from_millis(2500),
        }
    }
}

impl KioskConfig {
    /// Configuration path: `VOTECHAIN_CONFIG`, else the user config directory
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("/etc"))
                    .join("votechain")
                    .join("kiosk.json")
            })
    }

    /// Default log file when none is configured
    pub fn default_log_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("votechain")
            .join("kiosk.log")
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from `path`, writing the defaults there first if it does not exist
    pub fn load_or_create(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Apply `VOTECHAIN_BACKEND_URL`, if set
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                self.backend_url = url;
            }
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        let url = self.backend_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(KioskError::Config(format!(
                "backend_url must be an http(s) URL, got {:?}",
                self.backend_url
            )));
        }
        if self.input.poll_interval.is_zero() {
            return Err(KioskError::Config("input.poll_interval must be non-zero".into()));
        }
        if self.session.reporter_cadence.is_zero() {
            return Err(KioskError::Config(
                "session.reporter_cadence must be non-zero".into(),
            ));
        }
        let max_len = self.input.national_id_max_len;
        if max_len == 0 || max_len > votechain_core::NATIONAL_ID_MAX_LEN {
            return Err(KioskError::Config(format!(
                "input.national_id_max_len must be 1..={}, got {}",
                votechain_core::NATIONAL_ID_MAX_LEN,
                max_len
            )));
        }
        if self.session.finger_attempts == 0 {
            return Err(KioskError::Config(
                "session.finger_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Backend URL without a trailing slash
    pub fn backend_base(&self) -> &str {
        self.backend_url.trim().trim_end_matches('/')
    }

    /// Create the log file's directory if it doesn't exist
    pub fn ensure_directories(&self) -> crate::Result<()> {
        if let Some(parent) = self.log_file.as_deref().and_then(Path::parent) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// Serde adapter storing a `Duration` as whole milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
