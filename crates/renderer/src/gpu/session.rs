use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::driver::{DriverObject, DriverResult, ErrorCode, GpuDriver};
use crate::error::{NovaError, Result};

/// The one driver context of the process.
///
/// Components hold an `Rc` to the session so they can issue destroy calls from
/// `Drop`; the session itself is released only after the last of them.
pub struct GpuSession {
    driver: RefCell<Box<dyn GpuDriver>>,
}

impl GpuSession {
    pub fn open(driver: Box<dyn GpuDriver>) -> Rc<Self> {
        tracing::debug!("opened GPU session");
        Rc::new(Self {
            driver: RefCell::new(driver),
        })
    }

    /// Borrows the driver for a single call.
    ///
    /// Keep the borrow to one statement: drops of other components borrow the
    /// driver again.
    pub fn driver(&self) -> RefMut<'_, dyn GpuDriver> {
        RefMut::map(self.driver.borrow_mut(), |driver| driver.as_mut())
    }

    pub fn error_string(&self, code: ErrorCode) -> String {
        match self.driver.try_borrow() {
            Ok(driver) => driver.error_string(code),
            Err(_) => code.to_string(),
        }
    }

    /// Converts a driver status into [`NovaError::DriverOperation`].
    pub fn check<T>(&self, result: DriverResult<T>, context: &str) -> Result<T> {
        result.map_err(|code| NovaError::DriverOperation {
            context: context.to_string(),
            message: self.error_string(code),
        })
    }

    /// Like [`check`](Self::check) for object creation.
    pub fn check_alloc<T>(&self, result: DriverResult<T>, context: &str) -> Result<T> {
        result.map_err(|code| NovaError::ResourceAllocation {
            context: context.to_string(),
            message: self.error_string(code),
        })
    }

    pub fn check_link<T>(&self, result: DriverResult<T>, context: &str) -> Result<T> {
        result.map_err(|code| NovaError::PipelineLink {
            context: context.to_string(),
            message: self.error_string(code),
        })
    }

    /// Teardown path: failures are logged, never propagated out of `Drop`.
    pub(crate) fn warn_on_error(&self, result: DriverResult<()>, context: &str) {
        if let Err(code) = result {
            tracing::warn!(
                error = %self.error_string(code),
                "{context} failed during teardown"
            );
        }
    }

    fn destroy<H: DriverObject>(&self, handle: H) {
        match self.driver.try_borrow_mut() {
            Ok(mut driver) => handle.destroy(driver.as_mut()),
            Err(_) => tracing::warn!(?handle, "driver busy; leaking GPU object"),
        }
    }
}

impl Drop for GpuSession {
    fn drop(&mut self) {
        tracing::debug!("closed GPU session");
    }
}

/// A driver object destroyed when the guard goes out of scope.
pub struct Owned<H: DriverObject> {
    session: Rc<GpuSession>,
    handle: H,
}

impl<H: DriverObject> Owned<H> {
    pub fn new(session: &Rc<GpuSession>, handle: H) -> Self {
        Self {
            session: Rc::clone(session),
            handle,
        }
    }

    pub fn handle(&self) -> H {
        self.handle
    }

    pub fn session(&self) -> &Rc<GpuSession> {
        &self.session
    }
}

impl<H: DriverObject> fmt::Debug for Owned<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Owned").field(&self.handle).finish()
    }
}

impl<H: DriverObject> Drop for Owned<H> {
    fn drop(&mut self) {
        self.session.destroy(self.handle);
    }
}
