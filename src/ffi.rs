//! FFI bindings for Synheart Pulse
//!
//! This module provides C-compatible functions for calling Pulse from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `pulse_free_string`.
//!
//! Sessions created here run on host time: every call carries a timestamp
//! (Unix milliseconds) and the host's own timer calls `pulse_session_tick`.
//! Session events queue on the handle until `pulse_session_poll_events`
//! drains them.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::slice;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::confidence::{self, ConfidenceInputs};
use crate::config::MonitorConfig;
use crate::decoder::PacketDecoder;
use crate::events::CollectingSink;
use crate::pipeline::MonitoringSession;
use crate::scheduler::{ManualClock, ManualScheduler};
use crate::types::PhysiologicalBaseline;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Helper to borrow a byte buffer; an empty slice for NULL or zero length
unsafe fn bytes<'a>(data: *const u8, len: usize) -> &'a [u8] {
    if data.is_null() || len == 0 {
        &[]
    } else {
        slice::from_raw_parts(data, len)
    }
}

fn timestamp(ms: i64) -> Option<DateTime<Utc>> {
    let ts = Utc.timestamp_millis_opt(ms).single();
    if ts.is_none() {
        set_last_error(&format!("Invalid timestamp: {}", ms));
    }
    ts
}

// ============================================================================
// Stateless API
// ============================================================================

/// Decode one heart-rate-measurement payload into BeatSample JSON.
///
/// # Safety
/// - `data` must point to `len` readable bytes (or be NULL with `len` 0).
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_decode_packet(
    data: *const u8,
    len: usize,
    timestamp_ms: i64,
) -> *mut c_char {
    clear_last_error();

    let Some(ts) = timestamp(timestamp_ms) else {
        return ptr::null_mut();
    };

    match PacketDecoder::decode(bytes(data, len), ts).and_then(|s| Ok(serde_json::to_string(&s)?)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Score session confidence from a ConfidenceInputs JSON object.
///
/// # Safety
/// - `inputs_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_confidence_score(inputs_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(inputs_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let inputs: ConfidenceInputs = match serde_json::from_str(&json_str) {
        Ok(inputs) => inputs,
        Err(e) => {
            set_last_error(&format!("Invalid confidence inputs: {}", e));
            return ptr::null_mut();
        }
    };

    match serde_json::to_string(&confidence::score(&inputs)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Monitoring Session API
// ============================================================================

/// Opaque handle to a MonitoringSession driven by host time
pub struct PulseSessionHandle {
    session: MonitoringSession,
    clock: ManualClock,
    events: Arc<CollectingSink>,
}

/// Create and start a monitoring session.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string, or NULL for defaults.
/// - Returns a pointer that must be freed with `pulse_session_free`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_session_new(
    config_json: *const c_char,
    start_ms: i64,
) -> *mut PulseSessionHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        MonitorConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match MonitorConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let Some(start) = timestamp(start_ms) else {
        return ptr::null_mut();
    };
    let clock = ManualClock::new(start);
    let events = Arc::new(CollectingSink::new());

    let session = match MonitoringSession::new(
        config,
        Arc::new(clock.clone()),
        Box::new(ManualScheduler::new()),
        events.clone(),
    ) {
        Ok(session) => session,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };
    if let Err(e) = session.start() {
        set_last_error(&e.to_string());
        return ptr::null_mut();
    }

    Box::into_raw(Box::new(PulseSessionHandle {
        session,
        clock,
        events,
    }))
}

/// Set the waking baseline used for sleep and stress classification.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_session_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn pulse_session_set_baseline(
    handle: *mut PulseSessionHandle,
    heart_rate_bpm: f64,
    rmssd_ms: f64,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let baseline = PhysiologicalBaseline::new(heart_rate_bpm, rmssd_ms);
    match (*handle).session.set_baseline(baseline) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Ingest one raw payload received at `timestamp_ms`.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_session_new`.
/// - `data` must point to `len` readable bytes.
/// - Returns 0 on success, -1 on error (malformed payload, stopped session).
#[no_mangle]
pub unsafe extern "C" fn pulse_session_ingest(
    handle: *mut PulseSessionHandle,
    data: *const u8,
    len: usize,
    timestamp_ms: i64,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &*handle;
    let Some(ts) = timestamp(timestamp_ms) else {
        return -1;
    };
    handle.clock.set(ts);

    match handle.session.ingest_payload(bytes(data, len)) {
        Ok(_) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Run one processing tick at `timestamp_ms`.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_session_new`.
/// - Returns 1 when a timeslice was recorded, 0 when the tick was skipped,
///   -1 on error.
#[no_mangle]
pub unsafe extern "C" fn pulse_session_tick(handle: *mut PulseSessionHandle, timestamp_ms: i64) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &*handle;
    if handle.session.is_stopped() {
        set_last_error("Monitoring session already stopped");
        return -1;
    }
    let Some(ts) = timestamp(timestamp_ms) else {
        return -1;
    };
    handle.clock.set(ts);

    match handle.session.tick() {
        Some(_) => 1,
        None => 0,
    }
}

/// Stop the session at `timestamp_ms` and return the SessionReport JSON.
///
/// Calling again returns the same report.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_session_new`.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_session_stop(
    handle: *mut PulseSessionHandle,
    timestamp_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &*handle;
    if !handle.session.is_stopped() {
        let Some(ts) = timestamp(timestamp_ms) else {
            return ptr::null_mut();
        };
        handle.clock.set(ts);
    }

    match handle.session.stop().to_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Drain queued session events as a JSON array, oldest first.
///
/// Returns `[]` when nothing happened since the last poll. Events still
/// queued after `pulse_session_stop` (including `session_completed`) can be
/// polled until the handle is freed.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_session_new`.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_session_poll_events(handle: *mut PulseSessionHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let events = (*handle).events.take();
    match serde_json::to_string(&events) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a monitoring session.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_session_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_session_free(handle: *mut PulseSessionHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Free a string returned by Pulse functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Pulse function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Pulse function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn pulse_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Pulse library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn pulse_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    const START_MS: i64 = 1_709_330_400_000;

    /// u8 HR with one interval
    fn payload(hr: u8, rr_raw: u16) -> Vec<u8> {
        let [lo, hi] = rr_raw.to_le_bytes();
        vec![0x10, hr, lo, hi]
    }

    #[test]
    fn test_ffi_decode_packet() {
        let data = payload(62, 1024);
        unsafe {
            let result = pulse_decode_packet(data.as_ptr(), data.len(), START_MS);
            assert!(!result.is_null());
            let json = CStr::from_ptr(result).to_str().unwrap();
            assert!(json.contains("\"heart_rate_bpm\":62"));
            assert!(json.contains("1000.0"));
            pulse_free_string(result);
        }
    }

    #[test]
    fn test_ffi_decode_error() {
        unsafe {
            let result = pulse_decode_packet(ptr::null(), 0, START_MS);
            assert!(result.is_null());
            let error = pulse_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());
        }
    }

    #[test]
    fn test_ffi_confidence_score() {
        let inputs = CString::new(
            r#"{"disconnects":0,"session_hours":1.0,"coverage_percent":95.0,"state_transitions":2}"#,
        )
        .unwrap();
        unsafe {
            let result = pulse_confidence_score(inputs.as_ptr());
            assert!(!result.is_null());
            let json = CStr::from_ptr(result).to_str().unwrap();
            assert!(json.contains("\"is_reliable\":true"));
            pulse_free_string(result);

            let bad = CString::new("not json").unwrap();
            assert!(pulse_confidence_score(bad.as_ptr()).is_null());
            assert!(!pulse_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_session_lifecycle() {
        unsafe {
            let handle = pulse_session_new(ptr::null(), START_MS);
            assert!(!handle.is_null());
            assert_eq!(pulse_session_set_baseline(handle, 60.0, 40.0), 0);
            assert_eq!(pulse_session_set_baseline(handle, 0.0, 40.0), -1);
            let error = CStr::from_ptr(pulse_last_error()).to_str().unwrap();
            assert!(error.contains("baseline"));

            // 48 bpm, intervals alternating 1226/1274 ms
            for i in 0..300i64 {
                let rr_ms = if i % 2 == 0 { 1226.0 } else { 1274.0 };
                let raw = (rr_ms * 1024.0 / 1000.0_f64).round() as u16;
                let data = payload(48, raw);
                let rc = pulse_session_ingest(handle, data.as_ptr(), data.len(), START_MS + (i + 1) * 1000);
                assert_eq!(rc, 0);
            }
            assert_eq!(pulse_session_tick(handle, START_MS + 300_000), 1);

            let report = pulse_session_stop(handle, START_MS + 310_000);
            assert!(!report.is_null());
            let json = CStr::from_ptr(report).to_str().unwrap();
            assert!(json.contains("\"phase\":\"deep\""));
            pulse_free_string(report);

            assert_eq!(pulse_session_tick(handle, START_MS + 600_000), -1);
            let empty = [0u8; 0];
            assert_eq!(pulse_session_ingest(handle, empty.as_ptr(), 0, START_MS + 600_000), -1);

            pulse_session_free(handle);
        }
    }

    fn poll(handle: *mut PulseSessionHandle) -> Vec<serde_json::Value> {
        unsafe {
            let result = pulse_session_poll_events(handle);
            assert!(!result.is_null());
            let events = serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            pulse_free_string(result);
            events
        }
    }

    #[test]
    fn test_ffi_poll_events_drains_queue() {
        unsafe {
            let handle = pulse_session_new(ptr::null(), START_MS);
            assert!(!handle.is_null());
            assert!(poll(handle).is_empty());
            assert_eq!(pulse_session_set_baseline(handle, 60.0, 40.0), 0);

            for i in 0..300i64 {
                let rr_ms = if i % 2 == 0 { 1226.0 } else { 1274.0 };
                let raw = (rr_ms * 1024.0 / 1000.0_f64).round() as u16;
                let data = payload(48, raw);
                pulse_session_ingest(handle, data.as_ptr(), data.len(), START_MS + (i + 1) * 1000);
            }
            assert_eq!(pulse_session_tick(handle, START_MS + 300_000), 1);

            let events = poll(handle);
            let kinds: Vec<&str> = events.iter().filter_map(|e| e["type"].as_str()).collect();
            assert!(kinds.contains(&"phase_changed"));
            assert!(kinds.contains(&"timeslice_recorded"));
            assert!(poll(handle).is_empty());

            let report = pulse_session_stop(handle, START_MS + 310_000);
            pulse_free_string(report);
            let events = poll(handle);
            assert_eq!(events.last().unwrap()["type"], "session_completed");

            assert!(pulse_session_poll_events(ptr::null_mut()).is_null());
            pulse_session_free(handle);
        }
    }

    #[test]
    fn test_ffi_oversized_duration_rejected() {
        let config = CString::new(r#"{"stress":{"window_secs":10000000000000}}"#).unwrap();
        unsafe {
            let handle = pulse_session_new(config.as_ptr(), START_MS);
            assert!(handle.is_null());
            let error = CStr::from_ptr(pulse_last_error()).to_str().unwrap();
            assert!(error.contains("window_secs"));
        }
    }

    #[test]
    fn test_ffi_invalid_config() {
        let config = CString::new(r#"{"buffer":{"capacity":0}}"#).unwrap();
        unsafe {
            let handle = pulse_session_new(config.as_ptr(), START_MS);
            assert!(handle.is_null());
            let error = CStr::from_ptr(pulse_last_error()).to_str().unwrap();
            assert!(error.contains("capacity"));
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = pulse_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
