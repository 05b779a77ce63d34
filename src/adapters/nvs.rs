//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the SmartMed
//! dispenser.
//!
//! - Config validation: all fields are range-checked before persistence.
//! - Namespace isolation: slots live under `"<namespace>::<key>"` in the
//!   simulation backend and in real NVS namespaces on target.
//! - Atomic writes: ESP-IDF NVS commits are atomic per nvs_commit().

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::DeviceConfig;
use log::info;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// NVS namespace shared by the config blob and the reminder slots.
pub const NAMESPACE: &str = "smartmed";
const CONFIG_KEY: &str = "syscfg";

/// Upper bound on a single stored value (reminder list, history).
#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 64 * 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self::empty())
    }

    /// Adapter with no flash init.  On target this still talks to NVS;
    /// on the host it is a fresh in-memory store.
    fn empty() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NUL-terminated copy of an NVS name (max 15 chars).
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns_buf = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

pub(crate) fn validate_config(cfg: &DeviceConfig) -> Result<(), ConfigError> {
    let t = &cfg.dispense;
    if cfg.device_name.is_empty() {
        return Err(ConfigError::ValidationFailed("device_name must not be empty"));
    }
    if !(100..=60_000).contains(&cfg.scheduler_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "scheduler_interval_ms must be 100–60000",
        ));
    }
    if !(1..=1000).contains(&cfg.loop_interval_ms) {
        return Err(ConfigError::ValidationFailed("loop_interval_ms must be 1–1000"));
    }
    if cfg.start_now_lead_ms > 10_000 {
        return Err(ConfigError::ValidationFailed("start_now_lead_ms must be 0–10000"));
    }
    if !(1..=100).contains(&t.max_bursts) {
        return Err(ConfigError::ValidationFailed("max_bursts must be 1–100"));
    }
    if !(1..=1000).contains(&t.burst_ms) {
        return Err(ConfigError::ValidationFailed("burst_ms must be 1–1000"));
    }
    if t.drop_poll_ms == 0 || t.drop_poll_ms > t.drop_window_ms {
        return Err(ConfigError::ValidationFailed(
            "drop_poll_ms must be 1–drop_window_ms",
        ));
    }
    if t.pause_poll_ms == 0 || t.pause_poll_ms > t.pause_ms {
        return Err(ConfigError::ValidationFailed("pause_poll_ms must be 1–pause_ms"));
    }
    if !(1..=10).contains(&t.hand_cycles) {
        return Err(ConfigError::ValidationFailed("hand_cycles must be 1–10"));
    }
    if !(1000..=300_000).contains(&t.hand_cycle_ms) {
        return Err(ConfigError::ValidationFailed("hand_cycle_ms must be 1000–300000"));
    }
    if t.cue_on_ms == 0 || t.cue_on_ms + t.cue_off_ms > t.hand_cycle_ms {
        return Err(ConfigError::ValidationFailed(
            "cue period must be non-zero and fit in hand_cycle_ms",
        ));
    }
    if t.fail_settle_ms > 10_000 || t.outcome_settle_ms > 10_000 {
        return Err(ConfigError::ValidationFailed("settle delays must be 0–10000"));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        let bytes = self.read(NAMESPACE, CONFIG_KEY).map_err(|e| match e {
            StorageError::NotFound => ConfigError::NotFound,
            StorageError::Full => ConfigError::StorageFull,
            StorageError::IoError => ConfigError::IoError,
        })?;
        let cfg: DeviceConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(NAMESPACE, CONFIG_KEY);
            self.store.borrow_mut().insert(key, bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(NAMESPACE, true, |handle| {
                set_blob(handle, CONFIG_KEY, &bytes)
            });
            match result {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(ConfigError::StorageFull),
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}

/// `nvs_set_blob` + `nvs_commit` on an open handle.
#[cfg(target_os = "espidf")]
fn set_blob(handle: nvs_handle_t, key: &str, data: &[u8]) -> Result<(), i32> {
    let key_buf = NvsAdapter::c_name(key);
    let ret = unsafe {
        nvs_set_blob(
            handle,
            key_buf.as_ptr() as *const _,
            data.as_ptr() as *const _,
            data.len(),
        )
    };
    if ret != ESP_OK {
        return Err(ret);
    }
    let ret = unsafe { nvs_commit(handle) };
    if ret != ESP_OK {
        return Err(ret);
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
fn storage_error(code: i32) -> StorageError {
    if code == ESP_ERR_NVS_NOT_FOUND {
        StorageError::NotFound
    } else if code == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
        StorageError::Full
    } else {
        StorageError::IoError
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store
                .borrow()
                .get(&composite)
                .cloned()
                .ok_or(StorageError::NotFound)
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key_buf = Self::c_name(key);
                let mut size: usize = 0;

                // First call: get size
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        core::ptr::null_mut(),
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                if size > MAX_BLOB_SIZE {
                    return Err(ESP_ERR_NVS_INVALID_LENGTH);
                }

                let mut buf = vec![0u8; size];
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                buf.truncate(size);
                Ok(buf)
            });
            // A namespace that was never written cannot be opened read-only.
            result.map_err(storage_error)
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            Self::with_nvs_handle(namespace, true, |handle| set_blob(handle, key, data))
                .map_err(storage_error)
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().remove(&composite);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let key_buf = Self::c_name(key);
                let ret = unsafe { nvs_erase_key(handle, key_buf.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(storage_error)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow().contains_key(&composite)
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key_buf = Self::c_name(key);
                let ret = unsafe {
                    nvs_find_key(handle, key_buf.as_ptr() as *const _, core::ptr::null_mut())
                };
                Ok(ret == ESP_OK)
            });
            result.unwrap_or(false)
        }
    }
}

impl Default for NvsAdapter {
    /// Last-resort fallback when flash init fails: on the host an empty
    /// in-memory store, on target an adapter whose writes will error.
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::empty())
    }
}
