use std::{io, result};
use vmm_sys_util::eventfd::EventFd;

/// Interrupt output of a device. The device computes the logical level and
/// the line decides how to deliver it.
pub trait InterruptLine: Send {
    /// Drives a level triggered (INTx) line.
    fn set_level(&mut self, level: bool);

    /// Sends one message signalled interrupt.
    fn msi_notify(&mut self);
}

/// Level triggered interrupt delivered through a pair of eventfds. The
/// trigger fd is raised on assertion and the resample fd is signalled by the
/// interrupt controller once the guest has acknowledged it.
pub struct IrqLevelEvent {
    trigger_event: EventFd,
    resample_event: EventFd,
    msi_event: Option<EventFd>,
    level: bool,
}

type Result<T> = result::Result<T, io::Error>;

impl IrqLevelEvent {
    pub fn new() -> Result<Self> {
        let trigger_event = EventFd::new(libc::EFD_NONBLOCK)?;
        let resample_event = EventFd::new(libc::EFD_NONBLOCK)?;
        Ok(IrqLevelEvent {
            trigger_event, resample_event, msi_event: None, level: false,
        })
    }

    /// Adds an eventfd used for MSI delivery.
    pub fn with_msi(mut self) -> Result<Self> {
        self.msi_event = Some(EventFd::new(libc::EFD_NONBLOCK)?);
        Ok(self)
    }

    pub fn try_clone(&self) -> Result<IrqLevelEvent> {
        let trigger_event = self.trigger_event.try_clone()?;
        let resample_event = self.resample_event.try_clone()?;
        let msi_event = match self.msi_event {
            Some(ref ev) => Some(ev.try_clone()?),
            None => None,
        };
        Ok(IrqLevelEvent {
            trigger_event,
            resample_event,
            msi_event,
            level: self.level,
        })
    }

    pub fn trigger_event(&self) -> &EventFd {
        &self.trigger_event
    }

    pub fn resample_event(&self) -> &EventFd {
        &self.resample_event
    }

    pub fn msi_event(&self) -> Option<&EventFd> {
        self.msi_event.as_ref()
    }

    pub fn level(&self) -> bool {
        self.level
    }

    pub fn trigger(&self) -> Result<()> {
        self.trigger_event.write(1)
    }

    pub fn wait_resample(&self) -> Result<()> {
        let _ = self.resample_event.read()?;
        Ok(())
    }

    /// Called from the event loop when the resample fd is readable. A line
    /// which is still asserted after the guest EOI is raised again.
    pub fn handle_resample(&self) -> Result<()> {
        self.wait_resample()?;
        if self.level {
            self.trigger()?;
        }
        Ok(())
    }
}

impl InterruptLine for IrqLevelEvent {
    fn set_level(&mut self, level: bool) {
        if level && !self.level {
            if let Err(e) = self.trigger() {
                warn!("failed to signal irq trigger event: {}", e);
            }
        }
        self.level = level;
    }

    fn msi_notify(&mut self) {
        match self.msi_event {
            Some(ref ev) => {
                if let Err(e) = ev.write(1) {
                    warn!("failed to signal msi event: {}", e);
                }
            }
            None => warn!("msi notify without an msi event"),
        }
    }
}
