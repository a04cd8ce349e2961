//! ESP-IDF GPIO interrupt controller.
//!
//! Every attached pin shares one trampoline.  The trampoline only raises the
//! line in [`PENDING_LINES`]; the main loop drains it through
//! `InterruptRegistry::dispatch_pending`, so scripted callbacks never run in
//! ISR context.

use esp_idf_svc::sys::*;
use log::{info, warn};

use crate::app::ports::InterruptHal;
use crate::interrupts::PendingLines;
use crate::pins::{PhysicalPin, PinMode, TriggerMode};

/// Lines raised by the GPIO ISR, drained by the main loop.
pub static PENDING_LINES: PendingLines = PendingLines::new();

/// Header position (D0..D7, TX, RX, A0..A7) → ESP32 GPIO on the bring-up board.
const ESP_GPIO: [i32; 18] = [
    4, 5, 12, 13, 14, 15, 16, 17, // D0..D7
    1, 3, // TX, RX
    36, 39, 25, 26, 32, 33, 34, 35, // A0..A7
];

fn gpio_num(pin: PhysicalPin) -> Option<i32> {
    ESP_GPIO.get(usize::from(pin.0)).copied()
}

unsafe extern "C" fn exti_trampoline(arg: *mut core::ffi::c_void) {
    // The line number travels in the argument pointer.
    PENDING_LINES.raise(arg as usize as u8);
}

#[derive(Debug, Default)]
pub struct EspGpioInterrupts;

impl EspGpioInterrupts {
    /// Install the per-pin ISR service.  Already-installed is fine.
    pub fn install() -> Result<Self, EspError> {
        // SAFETY: gpio_install_isr_service only allocates the dispatch
        // table; ESP_ERR_INVALID_STATE means another component did it first.
        let ret = unsafe { gpio_install_isr_service(0) };
        if ret != ESP_ERR_INVALID_STATE {
            EspError::convert(ret)?;
        }
        info!("gpio: ISR service ready");
        Ok(Self)
    }
}

impl InterruptHal for EspGpioInterrupts {
    fn set_pin_mode(&self, pin: PhysicalPin, mode: PinMode) {
        let Some(num) = gpio_num(pin) else { return };
        let (dir, pull) = match mode {
            PinMode::Input => (gpio_mode_t_GPIO_MODE_INPUT, gpio_pull_mode_t_GPIO_FLOATING),
            PinMode::InputPullUp => (gpio_mode_t_GPIO_MODE_INPUT, gpio_pull_mode_t_GPIO_PULLUP_ONLY),
            PinMode::InputPullDown => (gpio_mode_t_GPIO_MODE_INPUT, gpio_pull_mode_t_GPIO_PULLDOWN_ONLY),
            PinMode::AfOutputDrain => (gpio_mode_t_GPIO_MODE_OUTPUT_OD, gpio_pull_mode_t_GPIO_FLOATING),
            PinMode::Output | PinMode::AfOutputPushPull => {
                (gpio_mode_t_GPIO_MODE_OUTPUT, gpio_pull_mode_t_GPIO_FLOATING)
            }
            PinMode::AnalogInput | PinMode::AnalogOutput => {
                (gpio_mode_t_GPIO_MODE_DISABLE, gpio_pull_mode_t_GPIO_FLOATING)
            }
        };
        // SAFETY: num comes from the board table, so it is a valid pad.
        unsafe {
            gpio_set_direction(num, dir);
            gpio_set_pull_mode(num, pull);
        }
    }

    fn attach_interrupt(&self, pin: PhysicalPin, line: u8, mode: TriggerMode) {
        let Some(num) = gpio_num(pin) else {
            warn!("gpio: {pin} has no ESP32 pad");
            return;
        };
        let edge = match mode {
            TriggerMode::RisingFalling => gpio_int_type_t_GPIO_INTR_ANYEDGE,
            TriggerMode::Rising => gpio_int_type_t_GPIO_INTR_POSEDGE,
            TriggerMode::Falling => gpio_int_type_t_GPIO_INTR_NEGEDGE,
        };
        // SAFETY: the ISR service is installed by `install`; the trampoline
        // only does one atomic OR on a static.
        unsafe {
            gpio_isr_handler_remove(num);
            gpio_set_intr_type(num, edge);
            gpio_isr_handler_add(num, Some(exti_trampoline), usize::from(line) as *mut core::ffi::c_void);
            gpio_intr_enable(num);
        }
    }

    fn detach_interrupt(&self, pin: PhysicalPin) {
        let Some(num) = gpio_num(pin) else { return };
        // SAFETY: removing a handler that was never added is a no-op.
        unsafe {
            gpio_intr_disable(num);
            gpio_isr_handler_remove(num);
        }
    }

    fn enable_all(&self) {
        // SAFETY: paired with disable_all by InterruptGate.
        unsafe { esp_intr_noniram_enable() };
    }

    fn disable_all(&self) {
        // SAFETY: masks non-IRAM interrupts on this core until enable_all.
        unsafe { esp_intr_noniram_disable() };
    }
}
