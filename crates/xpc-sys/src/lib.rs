//! Low-level FFI declarations for the xPC Target host API.
//!
//! The host API talks to a real-time target machine over TCP/IP: it loads,
//! starts and stops the target application, and reads and writes its block
//! parameters and signals by index.
//!
//! # Safety
//!
//! All functions are `unsafe` direct FFI declarations. The API keeps a
//! process-global last-error code: callers must check [`xPCGetLastError`]
//! after every call. For a safe wrapper, use the `hsim-control` crate with
//! its `xpc-sdk` feature.
//!
//! # Features
//!
//! - `xpc-sdk`: link against the vendor `xpcapi` library. Without this
//!   feature the declarations exist but nothing is linked.

#![allow(non_snake_case)]
#![allow(unsafe_code)]

use std::os::raw::{c_char, c_double, c_int};

/// Size of buffers passed to [`xPCErrorMsg`] and [`xPCGetAppName`].
pub const XPC_MESSAGE_LEN: usize = 256;

/// Value returned by [`xPCGetLastError`] when no error is pending.
pub const ENOERR: c_int = 0;

extern "C" {
    /// Load the API library. Returns non-zero on failure.
    pub fn xPCInitAPI() -> c_int;

    /// Release the API library.
    pub fn xPCFreeAPI();

    /// Open a TCP/IP connection and return its port handle.
    pub fn xPCOpenTcpIpPort(ipAddress: *const c_char, ipPort: *const c_char) -> c_int;

    /// Close a port handle.
    pub fn xPCClosePort(port: c_int);

    /// Error code of the last call, or [`ENOERR`].
    pub fn xPCGetLastError() -> c_int;

    /// Write the message for `errorNumber` into `errorMessage`.
    pub fn xPCErrorMsg(errorNumber: c_int, errorMessage: *mut c_char) -> *mut c_char;

    /// Write the loaded application name into `modelName`.
    pub fn xPCGetAppName(port: c_int, modelName: *mut c_char) -> *mut c_char;

    /// Unload the current application.
    pub fn xPCUnloadApp(port: c_int);

    /// Load application `filename` from `pathstr`.
    pub fn xPCLoadApp(port: c_int, pathstr: *const c_char, filename: *const c_char);

    /// Start the loaded application.
    pub fn xPCStartApp(port: c_int);

    /// Stop the running application.
    pub fn xPCStopApp(port: c_int);

    /// Sample time in seconds.
    pub fn xPCGetSampleTime(port: c_int) -> c_double;

    /// Stop time in seconds.
    pub fn xPCGetStopTime(port: c_int) -> c_double;

    /// Index of parameter `parameter` of block `block`.
    pub fn xPCGetParamIdx(port: c_int, block: *const c_char, parameter: *const c_char) -> c_int;

    /// Index of signal `sigName`.
    pub fn xPCGetSignalIdx(port: c_int, sigName: *const c_char) -> c_int;

    /// Write a parameter. `paramValue` must hold the parameter's full width.
    pub fn xPCSetParam(port: c_int, paramIndex: c_int, paramValue: *const c_double);

    /// Read one signal.
    pub fn xPCGetSignal(port: c_int, sigNum: c_int) -> c_double;

    /// Read `numSignals` signals into `values`.
    pub fn xPCGetSignals(
        port: c_int,
        numSignals: c_int,
        signals: *const c_int,
        values: *mut c_double,
    ) -> c_int;
}
