//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for the PrintGlow system. The settings blob
//! is postcard-encoded and stored under a single key; writes are atomic
//! per `nvs_commit()`, so a power cut mid-save leaves the previous
//! settings intact.
//!
//! On the host the same adapter runs against an in-memory map so the
//! service layer can be integration-tested unchanged.

use log::info;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::LedSettings;

#[cfg(not(target_os = "espidf"))]
use std::cell::RefCell;
#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

const CONFIG_NAMESPACE: &str = "printglow";
const CONFIG_KEY: &str = "ledcfg";

/// Upper bound for the stored settings blob.
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsConfigAdapter {
    #[cfg(target_os = "espidf")]
    nvs: core::cell::RefCell<EspNvs<NvsDefault>>,
    #[cfg(not(target_os = "espidf"))]
    store: RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsConfigAdapter {
    /// Create the adapter and open the NVS namespace.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            let partition =
                EspDefaultNvsPartition::take().map_err(|_| ConfigError::IoError)?;
            let nvs = EspNvs::new(partition, CONFIG_NAMESPACE, true)
                .map_err(|_| ConfigError::IoError)?;
            info!("NvsConfigAdapter: ESP-IDF NVS namespace '{CONFIG_NAMESPACE}' open");
            Ok(Self {
                nvs: core::cell::RefCell::new(nvs),
            })
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("NvsConfigAdapter: simulation backend ('{CONFIG_NAMESPACE}')");
            Ok(Self {
                store: RefCell::new(HashMap::new()),
            })
        }
    }
}

impl ConfigPort for NvsConfigAdapter {
    fn load(&self) -> Result<LedSettings, ConfigError> {
        let raw: Option<Vec<u8>>;

        #[cfg(target_os = "espidf")]
        {
            let nvs = self.nvs.borrow();
            let mut buf = [0u8; MAX_BLOB_SIZE];
            raw = nvs
                .get_raw(CONFIG_KEY, &mut buf)
                .map_err(|_| ConfigError::IoError)?
                .map(<[u8]>::to_vec);
        }

        #[cfg(not(target_os = "espidf"))]
        {
            raw = self.store.borrow().get(CONFIG_KEY).cloned();
        }

        let Some(bytes) = raw else {
            return Err(ConfigError::NotFound);
        };
        postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)
    }

    fn save(&self, settings: &LedSettings) -> Result<(), ConfigError> {
        validate_settings(settings)?;

        let bytes = postcard::to_allocvec(settings).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::StorageFull);
        }

        #[cfg(target_os = "espidf")]
        {
            self.nvs
                .borrow_mut()
                .set_raw(CONFIG_KEY, &bytes)
                .map_err(|_| ConfigError::IoError)?;
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(CONFIG_KEY.to_string(), bytes);
        }

        info!("settings saved ({} state colours)", settings.colors.len());
        Ok(())
    }
}

/// Range-check every field before it reaches flash. Invalid values are
/// rejected, not clamped, so a buggy configuration client cannot wedge
/// the strip into an unusable state.
fn validate_settings(settings: &LedSettings) -> Result<(), ConfigError> {
    if !(1..=300).contains(&settings.led_count) {
        return Err(ConfigError::ValidationFailed("led_count must be 1-300"));
    }
    if settings.global_brightness == 0 {
        return Err(ConfigError::ValidationFailed(
            "global_brightness must be 1-255",
        ));
    }
    if settings.night_brightness == 0 {
        return Err(ConfigError::ValidationFailed(
            "night_brightness must be 1-255",
        ));
    }
    if !(1..=120).contains(&settings.idle_timeout_minutes) {
        return Err(ConfigError::ValidationFailed(
            "idle_timeout_minutes must be 1-120",
        ));
    }
    for dir in [
        settings.rainbow_direction,
        settings.idle_direction,
        settings.printing_direction,
        settings.download_direction,
    ] {
        if dir != 1 && dir != -1 {
            return Err(ConfigError::ValidationFailed(
                "direction flags must be 1 or -1",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_before_save_reports_not_found() {
        let nvs = NvsConfigAdapter::new().unwrap();
        assert!(matches!(nvs.load(), Err(ConfigError::NotFound)));
    }

    #[test]
    fn save_load_roundtrip() {
        let nvs = NvsConfigAdapter::new().unwrap();
        let mut settings = LedSettings::default();
        settings.led_count = 144;
        settings.night_mode_enabled = true;
        nvs.save(&settings).unwrap();

        let loaded = nvs.load().unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let nvs = NvsConfigAdapter::new().unwrap();

        let mut bad = LedSettings::default();
        bad.led_count = 0;
        assert!(matches!(
            nvs.save(&bad),
            Err(ConfigError::ValidationFailed(_))
        ));

        bad = LedSettings::default();
        bad.led_count = 301;
        assert!(nvs.save(&bad).is_err());

        bad = LedSettings::default();
        bad.printing_direction = 0;
        assert!(nvs.save(&bad).is_err());

        bad = LedSettings::default();
        bad.global_brightness = 0;
        assert!(nvs.save(&bad).is_err());

        // Nothing was persisted by the failed attempts.
        assert!(matches!(nvs.load(), Err(ConfigError::NotFound)));
    }
}
