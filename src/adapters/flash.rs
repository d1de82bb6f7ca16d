//! OTA partition access on ESP-IDF.
//!
//! Writes go through `esp-ota`; partition lookup, boot selection and the
//! running image's descriptor use the raw IDF calls `esp-ota` does not
//! expose.

use core::ffi::CStr;

use esp_idf_svc::sys::{
    esp_app_get_description, esp_ota_get_next_update_partition, esp_ota_set_boot_partition,
    esp_partition_t, ESP_OK,
};
use log::{info, warn};

use crate::app::ports::{FlashError, FlashPort, Region, WriteSession};
use crate::command::bounded::truncated;
use crate::ota::image::VERSION_LEN;
use crate::ota::AppVersion;

#[derive(Debug, Default, Clone, Copy)]
pub struct OtaFlash;

impl OtaFlash {
    /// Confirm the running image so the bootloader does not roll back.
    pub fn mark_running_valid(&self) {
        match esp_ota::mark_app_valid() {
            Ok(()) => info!("OTA: running image marked valid"),
            Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
        }
    }

    fn next_partition() -> Option<&'static esp_partition_t> {
        // SAFETY: IDF returns a pointer into the static partition table or null.
        unsafe { esp_ota_get_next_update_partition(core::ptr::null()).as_ref() }
    }
}

impl FlashPort for OtaFlash {
    fn running_version(&self) -> AppVersion {
        // SAFETY: the app descriptor is a static in the running image.
        let desc = unsafe { &*esp_app_get_description() };
        let mut raw = [0u8; VERSION_LEN];
        for (dst, src) in raw.iter_mut().zip(desc.version.iter()) {
            *dst = *src as u8;
        }
        AppVersion::from_bytes(raw)
    }

    fn acquire_target_region(&self) -> Result<Region, FlashError> {
        let part = Self::next_partition().ok_or(FlashError::NoPartition)?;
        // SAFETY: partition labels are NUL-terminated fixed arrays.
        let label = unsafe { CStr::from_ptr(part.label.as_ptr()) };
        Ok(Region {
            label: truncated(label.to_str().unwrap_or("ota")),
            address: part.address,
            size: part.size,
        })
    }

    fn begin_write(&self, _region: &Region) -> Result<Box<dyn WriteSession + '_>, FlashError> {
        let update = esp_ota::OtaUpdate::begin().map_err(|e| {
            warn!("OTA: esp-ota begin failed: {:?}", e);
            FlashError::BeginFailed
        })?;
        Ok(Box::new(EspOtaSession { update }))
    }

    fn select_boot_region(&self, region: &Region) -> Result<(), FlashError> {
        let part = Self::next_partition().ok_or(FlashError::NoPartition)?;
        if part.address != region.address {
            warn!("OTA: target partition moved (0x{:08x} != 0x{:08x})", part.address, region.address);
            return Err(FlashError::BootSelectFailed);
        }
        // SAFETY: `part` comes from the partition table and was just written.
        let ret = unsafe { esp_ota_set_boot_partition(part) };
        if ret != ESP_OK {
            warn!("OTA: set boot partition failed ({})", ret);
            return Err(FlashError::BootSelectFailed);
        }
        Ok(())
    }

    fn restart(&self) -> ! {
        esp_ota::restart()
    }
}

struct EspOtaSession {
    update: esp_ota::OtaUpdate,
}

impl WriteSession for EspOtaSession {
    fn write(&mut self, data: &[u8]) -> Result<(), FlashError> {
        self.update.write(data).map_err(|e| {
            warn!("OTA: esp-ota write failed: {:?}", e);
            FlashError::WriteFailed
        })
    }

    fn finalize(self: Box<Self>) -> Result<(), FlashError> {
        // esp_ota_end only fails on image validation once writes succeeded.
        self.update.finalize().map(|_| ()).map_err(|e| {
            warn!("OTA: esp-ota finalize failed: {:?}", e);
            FlashError::ValidationFailed
        })
    }

    fn abort(self: Box<Self>) {
        // Dropping an unfinished esp-ota update aborts it.
        drop(self);
        warn!("OTA: write session aborted");
    }
}
