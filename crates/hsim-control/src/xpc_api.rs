//! [`SignalBus`] over the vendor xPC Target host API.
//!
//! Every call is followed by a last-error check; a pending error is turned
//! into [`TransportError::Hardware`] with the vendor message.

#![allow(unsafe_code)]

use hsim_transport::{BusAddress, SignalBus, TransportError};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use tracing::{debug, info};
use xpc_sys as ffi;

/// Open connection to an xPC target.
#[derive(Debug)]
pub struct XpcApiBus {
    port: c_int,
    endpoint: String,
    open: bool,
}

fn c_string(operation: &str, value: &str) -> Result<CString, TransportError> {
    CString::new(value).map_err(|_| TransportError::Hardware {
        operation: operation.to_string(),
        code: -1,
        message: format!("'{value}' contains a NUL byte"),
    })
}

/// Error pending in the API, if any.
fn last_error(operation: &str) -> Result<(), TransportError> {
    // SAFETY: xPCGetLastError has no preconditions.
    let code = unsafe { ffi::xPCGetLastError() };
    if code == ffi::ENOERR {
        return Ok(());
    }
    let mut buf = [0 as c_char; ffi::XPC_MESSAGE_LEN];
    // SAFETY: buf is XPC_MESSAGE_LEN bytes, the documented maximum message length.
    let message = unsafe {
        ffi::xPCErrorMsg(code, buf.as_mut_ptr());
        CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned()
    };
    Err(TransportError::Hardware {
        operation: operation.to_string(),
        code,
        message,
    })
}

impl XpcApiBus {
    /// Load the API and open a TCP/IP connection to `ip_address:ip_port`.
    pub fn open(ip_address: &str, ip_port: &str) -> Result<Self, TransportError> {
        // SAFETY: xPCInitAPI has no preconditions.
        if unsafe { ffi::xPCInitAPI() } != 0 {
            return Err(TransportError::Hardware {
                operation: "xPCInitAPI".to_string(),
                code: -1,
                message: "unable to load xPC Target API".to_string(),
            });
        }
        let addr = c_string("xPCOpenTcpIpPort", ip_address)?;
        let port_str = c_string("xPCOpenTcpIpPort", ip_port)?;
        // SAFETY: both pointers are valid NUL-terminated strings for the call.
        let port = unsafe { ffi::xPCOpenTcpIpPort(addr.as_ptr(), port_str.as_ptr()) };
        if let Err(err) = last_error("xPCOpenTcpIpPort") {
            // SAFETY: the API was initialised above.
            unsafe { ffi::xPCFreeAPI() };
            return Err(err);
        }
        let endpoint = format!("{ip_address}:{ip_port}");
        info!(%endpoint, "xPC target port opened");
        Ok(Self {
            port,
            endpoint,
            open: true,
        })
    }
}

impl SignalBus for XpcApiBus {
    fn app_name(&mut self) -> Result<String, TransportError> {
        let mut buf = [0 as c_char; ffi::XPC_MESSAGE_LEN];
        // SAFETY: buf holds the maximum application name length.
        unsafe { ffi::xPCGetAppName(self.port, buf.as_mut_ptr()) };
        last_error("xPCGetAppName")?;
        // SAFETY: the API NUL-terminates the name on success.
        Ok(unsafe { CStr::from_ptr(buf.as_ptr()) }.to_string_lossy().into_owned())
    }

    fn unload_app(&mut self) -> Result<(), TransportError> {
        // SAFETY: port is open.
        unsafe { ffi::xPCUnloadApp(self.port) };
        last_error("xPCUnloadApp")
    }

    fn load_app(&mut self, path: &str, name: &str) -> Result<(), TransportError> {
        let path = c_string("xPCLoadApp", path)?;
        let name = c_string("xPCLoadApp", name)?;
        // SAFETY: port is open and both strings outlive the call.
        unsafe { ffi::xPCLoadApp(self.port, path.as_ptr(), name.as_ptr()) };
        last_error("xPCLoadApp")
    }

    fn start_app(&mut self) -> Result<(), TransportError> {
        // SAFETY: port is open.
        unsafe { ffi::xPCStartApp(self.port) };
        last_error("xPCStartApp")
    }

    fn stop_app(&mut self) -> Result<(), TransportError> {
        // SAFETY: port is open.
        unsafe { ffi::xPCStopApp(self.port) };
        last_error("xPCStopApp")
    }

    fn sample_time(&mut self) -> Result<f64, TransportError> {
        // SAFETY: port is open.
        let value = unsafe { ffi::xPCGetSampleTime(self.port) };
        last_error("xPCGetSampleTime").map(|()| value)
    }

    fn stop_time(&mut self) -> Result<f64, TransportError> {
        // SAFETY: port is open.
        let value = unsafe { ffi::xPCGetStopTime(self.port) };
        last_error("xPCGetStopTime").map(|()| value)
    }

    fn param_index(&mut self, block: &str, param: &str) -> Result<BusAddress, TransportError> {
        let block_c = c_string("xPCGetParamIdx", block)?;
        let param_c = c_string("xPCGetParamIdx", param)?;
        // SAFETY: port is open and both strings outlive the call.
        let index = unsafe { ffi::xPCGetParamIdx(self.port, block_c.as_ptr(), param_c.as_ptr()) };
        last_error(&format!("xPCGetParamIdx({block})"))?;
        debug!(block, param, index, "resolved parameter");
        Ok(BusAddress(index))
    }

    fn signal_index(&mut self, name: &str) -> Result<BusAddress, TransportError> {
        let name_c = c_string("xPCGetSignalIdx", name)?;
        // SAFETY: port is open and the string outlives the call.
        let index = unsafe { ffi::xPCGetSignalIdx(self.port, name_c.as_ptr()) };
        last_error(&format!("xPCGetSignalIdx({name})"))?;
        debug!(signal = name, index, "resolved signal");
        Ok(BusAddress(index))
    }

    fn set_param(&mut self, addr: BusAddress, values: &[f64]) -> Result<(), TransportError> {
        // SAFETY: values holds the parameter's width, sized from the negotiated channel count.
        unsafe { ffi::xPCSetParam(self.port, addr.0, values.as_ptr()) };
        last_error("xPCSetParam")
    }

    fn signal(&mut self, addr: BusAddress) -> Result<f64, TransportError> {
        // SAFETY: port is open.
        let value = unsafe { ffi::xPCGetSignal(self.port, addr.0) };
        last_error("xPCGetSignal").map(|()| value)
    }

    fn signals(&mut self, addrs: &[BusAddress], out: &mut [f64]) -> Result<(), TransportError> {
        if addrs.len() != out.len() {
            return Err(TransportError::Protocol(format!(
                "{} signals requested into {} slots",
                addrs.len(),
                out.len()
            )));
        }
        let ids: Vec<c_int> = addrs.iter().map(|a| a.0).collect();
        let count = c_int::try_from(ids.len())
            .map_err(|_| TransportError::Protocol("too many signals".to_string()))?;
        // SAFETY: ids and out both hold `count` elements.
        unsafe { ffi::xPCGetSignals(self.port, count, ids.as_ptr(), out.as_mut_ptr()) };
        last_error("xPCGetSignals")
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            // SAFETY: port was opened by this bus and is closed exactly once.
            unsafe {
                ffi::xPCClosePort(self.port);
                ffi::xPCFreeAPI();
            }
            info!(endpoint = %self.endpoint, "xPC target port closed");
        }
    }
}

impl Drop for XpcApiBus {
    fn drop(&mut self) {
        self.close();
    }
}
