//! One-shot GPIO and ADC initialisation, raw level writes and ADC reads.
//!
//! Uses raw ESP-IDF sys calls on target. On the host every write lands in
//! a simulated pin register that tests can read back; ADC reads are
//! simulated by the sensor drivers themselves.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    AdcInitFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
        }
    }
}

// ── GPIO Outputs ──────────────────────────────────────────────

/// Configure `pins` as push-pull outputs and drive each to `initial` level.
#[cfg(target_os = "espidf")]
pub fn init_outputs(pins: &[(i32, bool)]) -> Result<(), HwInitError> {
    for &(pin, initial) in pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: plain register configuration from the init path.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        gpio_write(pin, initial);
    }
    log::info!("hw_init: {} GPIO outputs configured", pins.len());
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_outputs(pins: &[(i32, bool)]) -> Result<(), HwInitError> {
    for &(pin, initial) in pins {
        gpio_write(pin, initial);
    }
    log::info!("hw_init(sim): {} GPIO outputs configured", pins.len());
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level on a pin configured by init_outputs().
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
static SIM_LEVELS: core::sync::atomic::AtomicU64 = core::sync::atomic::AtomicU64::new(0);

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) {
    use core::sync::atomic::Ordering;
    let mask = 1u64 << pin;
    if high {
        SIM_LEVELS.fetch_or(mask, Ordering::AcqRel);
    } else {
        SIM_LEVELS.fetch_and(!mask, Ordering::AcqRel);
    }
}

/// Last level written to `pin` (simulation only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_level(pin: i32) -> bool {
    SIM_LEVELS.load(core::sync::atomic::Ordering::Acquire) & (1u64 << pin) != 0
}

// ── ADC (oneshot) ─────────────────────────────────────────────

/// ADC1 unit handle, created once by [`init_adc`].
#[cfg(target_os = "espidf")]
static ADC1_HANDLE: core::sync::atomic::AtomicPtr<adc_oneshot_unit_ctx_t> =
    core::sync::atomic::AtomicPtr::new(core::ptr::null_mut());

/// Create the ADC1 unit (first call only) and configure `channel` for a
/// 12-bit read over the full 0..3.3 V range.
#[cfg(target_os = "espidf")]
pub fn init_adc(channel: u32) -> Result<(), HwInitError> {
    use core::sync::atomic::Ordering;

    let mut handle = ADC1_HANDLE.load(Ordering::Acquire);
    if handle.is_null() {
        let init_cfg = adc_oneshot_unit_init_cfg_t {
            unit_id: adc_unit_t_ADC_UNIT_1,
            ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
            ..Default::default()
        };
        // SAFETY: init_cfg outlives the call; the handle is written once.
        let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
        ADC1_HANDLE.store(handle, Ordering::Release);
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    // SAFETY: handle was created above and is never freed.
    let ret = unsafe { adc_oneshot_config_channel(handle, channel, &chan_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }
    log::info!("hw_init: ADC1 channel {} configured", channel);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_adc(channel: u32) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ADC1 channel {} configured", channel);
    Ok(())
}

/// One raw 12-bit sample; 0 if the unit is missing or the read fails.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> u16 {
    let handle = ADC1_HANDLE.load(core::sync::atomic::Ordering::Acquire);
    if handle.is_null() {
        return 0;
    }
    let mut raw: i32 = 0;
    // SAFETY: handle comes from init_adc() and lives for the program.
    let ret = unsafe { adc_oneshot_read(handle, channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return 0;
    }
    raw.clamp(0, 4095) as u16
}
