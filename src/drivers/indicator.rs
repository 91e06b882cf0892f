//! Front-panel fault indicator driver.

use embedded_hal::digital::OutputPin;

use crate::app::ports::IndicatorPort;

/// Fault LED, active high. The protection supervisor re-asserts the
/// level on every sweep, so the driver de-duplicates pin writes.
pub struct FaultLed<P: OutputPin> {
    pin: P,
    asserted: bool,
}

impl<P: OutputPin> FaultLed<P> {
    pub fn new(mut pin: P) -> Self {
        let _ = pin.set_low();
        Self {
            pin,
            asserted: false,
        }
    }

    pub fn asserted(&self) -> bool {
        self.asserted
    }
}

impl<P: OutputPin> IndicatorPort for FaultLed<P> {
    fn set_fault(&mut self, asserted: bool) {
        if self.asserted == asserted {
            return;
        }
        let result = if asserted {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        let _ = result;
        self.asserted = asserted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    struct SimPin {
        high: bool,
    }

    impl embedded_hal::digital::ErrorType for SimPin {
        type Error = Infallible;
    }

    impl OutputPin for SimPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            Ok(())
        }
    }

    #[test]
    fn tracks_asserted_level() {
        let mut led = FaultLed::new(SimPin { high: true });
        assert!(!led.pin.high);

        led.set_fault(true);
        assert!(led.pin.high);
        assert!(led.asserted());

        led.set_fault(false);
        assert!(!led.pin.high);
    }
}
