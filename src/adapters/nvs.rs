//! NVS-backed [`ConfigPort`].
//!
//! The node configuration is stored as one postcard blob under
//! `soilsense/nodecfg`. Nothing stored means first boot: defaults are used.
//! On the host the blob lives in memory so tests exercise the same
//! encode/validate path.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::NodeConfig;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE: &[u8] = b"soilsense\0";
#[cfg(target_os = "espidf")]
const CONFIG_KEY: &[u8] = b"nodecfg\0";
#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsConfigStore {
    #[cfg(not(target_os = "espidf"))]
    blob: std::sync::Mutex<Option<Vec<u8>>>,
}

impl NvsConfigStore {
    /// Initialise NVS flash, erasing it if the partition layout changed.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NVS: initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NVS: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            blob: std::sync::Mutex::new(None),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self
            .blob
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, bytes: Vec<u8>) -> Result<(), ConfigError> {
        *self
            .blob
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(bytes);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn with_handle<T>(
        write: bool,
        f: impl FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
    ) -> Result<T, esp_err_t> {
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        // SAFETY: namespace is a static NUL-terminated string.
        let ret = unsafe { nvs_open(CONFIG_NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let result = Self::with_handle(false, |handle| {
            let mut size: usize = 0;
            // First call sizes the blob.
            let ret = unsafe {
                nvs_get_blob(handle, CONFIG_KEY.as_ptr() as *const _, core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(handle, CONFIG_KEY.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        });
        match result {
            Ok(buf) => Ok(Some(buf)),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
            Err(ESP_ERR_NVS_INVALID_LENGTH) => Err(ConfigError::Corrupted),
            Err(e) => {
                warn!("NVS: read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, bytes: Vec<u8>) -> Result<(), ConfigError> {
        Self::with_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(handle, CONFIG_KEY.as_ptr() as *const _, bytes.as_ptr() as *const _, bytes.len())
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            match unsafe { nvs_commit(handle) } {
                ESP_OK => Ok(()),
                e => Err(e),
            }
        })
        .map_err(|e| {
            warn!("NVS: write error {}", e);
            ConfigError::IoError
        })
    }
}

impl ConfigPort for NvsConfigStore {
    fn load(&self) -> Result<NodeConfig, ConfigError> {
        match self.read_blob()? {
            Some(bytes) => {
                let config = NodeConfig::from_postcard(&bytes)?;
                config.validate()?;
                info!("NVS: loaded config ({} bytes)", bytes.len());
                Ok(config)
            }
            None => {
                info!("NVS: no stored config, using defaults");
                Ok(NodeConfig::default())
            }
        }
    }

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = config.to_postcard()?;
        let len = bytes.len();
        self.write_blob(bytes)?;
        info!("NVS: config saved ({} bytes)", len);
        Ok(())
    }
}
