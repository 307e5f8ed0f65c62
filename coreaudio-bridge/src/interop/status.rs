//! Native status codes and the outcome type every fallible call returns.
//!
//! A [`Status`] wraps a [`HRESULT`]: zero and positive values are success
//! (possibly with a qualifier such as `S_FALSE`), negative values are
//! failures. The value is carried bit-for-bit; nothing in this crate
//! rewrites a code.

use super::error::ForeignCallFailed;
use std::fmt;
use windows_core::HRESULT;

/// An HRESULT as returned across the interface boundary.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Status(pub HRESULT);

const fn hr(code: u32) -> Status {
    Status(HRESULT(code as i32))
}

impl Status {
    pub const S_OK: Status = hr(0x0000_0000);
    pub const S_FALSE: Status = hr(0x0000_0001);
    pub const E_NOTIMPL: Status = hr(0x8000_4001);
    pub const E_NOINTERFACE: Status = hr(0x8000_4002);
    pub const E_POINTER: Status = hr(0x8000_4003);
    pub const E_FAIL: Status = hr(0x8000_4005);
    pub const E_UNEXPECTED: Status = hr(0x8000_FFFF);
    pub const E_BOUNDS: Status = hr(0x8000_000B);
    pub const E_OUTOFMEMORY: Status = hr(0x8007_000E);
    pub const E_INVALIDARG: Status = hr(0x8007_0057);
    /// `HRESULT_FROM_WIN32(ERROR_NOT_FOUND)`
    pub const E_NOTFOUND: Status = hr(0x8007_0490);
    pub const CO_E_NOTINITIALIZED: Status = hr(0x8004_01F0);
    pub const STG_E_ACCESSDENIED: Status = hr(0x8003_0005);
    pub const AUDCLNT_E_DEVICE_INVALIDATED: Status = hr(0x8889_0004);

    pub const fn is_success(self) -> bool {
        self.0.is_ok()
    }

    pub const fn is_failure(self) -> bool {
        self.0.is_err()
    }

    /// The raw code reinterpreted as unsigned, the way HRESULTs are usually written.
    pub const fn code(self) -> u32 {
        self.0 .0 as u32
    }

    pub const fn hresult(self) -> HRESULT {
        self.0
    }

    /// Symbolic name for the codes this crate knows about.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::S_OK => "S_OK",
            Self::S_FALSE => "S_FALSE",
            Self::E_NOTIMPL => "E_NOTIMPL",
            Self::E_NOINTERFACE => "E_NOINTERFACE",
            Self::E_POINTER => "E_POINTER",
            Self::E_FAIL => "E_FAIL",
            Self::E_UNEXPECTED => "E_UNEXPECTED",
            Self::E_BOUNDS => "E_BOUNDS",
            Self::E_OUTOFMEMORY => "E_OUTOFMEMORY",
            Self::E_INVALIDARG => "E_INVALIDARG",
            Self::E_NOTFOUND => "E_NOTFOUND",
            Self::CO_E_NOTINITIALIZED => "CO_E_NOTINITIALIZED",
            Self::STG_E_ACCESSDENIED => "STG_E_ACCESSDENIED",
            Self::AUDCLNT_E_DEVICE_INVALIDATED => "AUDCLNT_E_DEVICE_INVALIDATED",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{:#010X} ({name})", self.code()),
            None => write!(f, "{:#010X}", self.code()),
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({self})")
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Self(HRESULT(code))
    }
}

impl From<HRESULT> for Status {
    fn from(hr: HRESULT) -> Self {
        Self(hr)
    }
}

impl From<Status> for HRESULT {
    fn from(status: Status) -> Self {
        status.0
    }
}

impl From<windows_core::Error> for Status {
    fn from(error: windows_core::Error) -> Self {
        Self(error.code())
    }
}

/// The result of one fallible foreign call: a status plus a payload that is
/// only present when the status is success-or-better.
///
/// Expected failures (interface not supported, index out of range, device
/// not found) are ordinary values of this type. Escalating one into a panic
/// is the caller's choice, made by calling [`unwrap`](Self::unwrap).
#[must_use]
#[derive(Clone, PartialEq)]
pub struct StatusOutcome<T> {
    status: Status,
    payload: Option<T>,
}

impl<T> StatusOutcome<T> {
    /// Package a status with the payload produced by `payload`.
    ///
    /// The thunk always runs, on failure paths too, so it must only read
    /// back output storage. Its value is discarded unless `status >= 0`.
    pub fn new(status: Status, payload: impl FnOnce() -> T) -> Self {
        let value = payload();
        Self {
            status,
            payload: status.is_success().then_some(value),
        }
    }

    pub fn success(payload: T) -> Self {
        Self {
            status: Status::S_OK,
            payload: Some(payload),
        }
    }

    /// A failed outcome. A non-negative `status` has no payload to go with
    /// it, so it is recorded as `E_UNEXPECTED`.
    pub fn failure(status: Status) -> Self {
        let status = if status.is_success() {
            Status::E_UNEXPECTED
        } else {
            status
        };
        Self {
            status,
            payload: None,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Return the payload, panicking with the status if the call failed.
    #[track_caller]
    pub fn unwrap(self) -> T {
        match self.payload {
            Some(value) => value,
            None => panic!("{}", ForeignCallFailed::new(self.status)),
        }
    }

    pub fn try_unwrap(self) -> Result<T, ForeignCallFailed> {
        let status = self.status;
        self.payload.ok_or(ForeignCallFailed::new(status))
    }

    pub fn ok(self) -> Option<T> {
        self.payload
    }

    pub fn unwrap_or(self, default: T) -> T {
        self.payload.unwrap_or(default)
    }

    pub fn unwrap_or_else(self, f: impl FnOnce(Status) -> T) -> T {
        let status = self.status;
        self.payload.unwrap_or_else(|| f(status))
    }

    /// Transform the payload, keeping the status.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StatusOutcome<U> {
        StatusOutcome {
            status: self.status,
            payload: self.payload.map(f),
        }
    }

    /// Chain a further fallible call onto a successful outcome.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> StatusOutcome<U>) -> StatusOutcome<U> {
        match self.payload {
            Some(value) => f(value),
            None => StatusOutcome::failure(self.status),
        }
    }

    pub fn as_ref(&self) -> StatusOutcome<&T> {
        StatusOutcome {
            status: self.status,
            payload: self.payload.as_ref(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StatusOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Some(value) => f
                .debug_struct("StatusOutcome")
                .field("status", &self.status)
                .field("payload", value)
                .finish(),
            None => f
                .debug_struct("StatusOutcome")
                .field("status", &self.status)
                .finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    proptest! {
        #[test]
        fn success_tracks_sign(code in any::<i32>(), payload in any::<u32>()) {
            let outcome = StatusOutcome::new(Status::from(code), || payload);
            prop_assert_eq!(outcome.is_success(), code >= 0);
            prop_assert_eq!(outcome.status(), Status::from(code));
        }

        #[test]
        fn unwrap_returns_payload_on_success(code in 0..=i32::MAX, payload in any::<u64>()) {
            prop_assert_eq!(StatusOutcome::new(Status::from(code), || payload).unwrap(), payload);
        }

        #[test]
        fn failure_never_yields_stale_payload(code in i32::MIN..0, payload in any::<u64>()) {
            let outcome = StatusOutcome::new(Status::from(code), || payload);
            prop_assert_eq!(outcome.clone().ok(), None);
            prop_assert_eq!(
                outcome.clone().try_unwrap(),
                Err(ForeignCallFailed::new(Status::from(code)))
            );
            let unwrapped = std::panic::catch_unwind(move || outcome.unwrap());
            prop_assert!(unwrapped.is_err());
        }
    }

    #[test]
    #[should_panic(expected = "E_NOINTERFACE")]
    fn test_unwrap_failure_panics_with_status() {
        StatusOutcome::new(Status::E_NOINTERFACE, || 7u32).unwrap();
    }

    #[test]
    fn test_payload_thunk_runs_on_failure() {
        let mut evaluated = false;
        let outcome = StatusOutcome::new(Status::E_FAIL, || evaluated = true);
        assert!(evaluated);
        assert!(outcome.is_failure());
    }

    #[test]
    fn test_s_false_is_success() {
        let outcome = StatusOutcome::new(Status::S_FALSE, || "kept");
        assert!(outcome.is_success());
        assert_eq!(outcome.unwrap(), "kept");
    }

    #[test]
    fn test_failure_with_success_code_is_unexpected() {
        let outcome = StatusOutcome::<()>::failure(Status::S_OK);
        assert_eq!(outcome.status(), Status::E_UNEXPECTED);
    }

    #[test]
    fn test_map_and_then_keep_status() {
        let mapped = StatusOutcome::new(Status::S_FALSE, || 2).map(|v| v * 10);
        assert_eq!(mapped.status(), Status::S_FALSE);
        assert_eq!(mapped.unwrap(), 20);

        let chained = StatusOutcome::<u32>::failure(Status::E_POINTER)
            .and_then(|v| StatusOutcome::success(v + 1));
        assert_eq!(chained.status(), Status::E_POINTER);
        assert_eq!(chained.unwrap_or(0), 0);
    }

    #[test]
    fn test_hresult_conversions_keep_bits() {
        let status = Status::from(HRESULT(0x8889_0004_u32 as i32));
        assert_eq!(status, Status::AUDCLNT_E_DEVICE_INVALIDATED);
        assert_eq!(HRESULT::from(status).0 as u32, 0x8889_0004);

        let error = windows_core::Error::from(HRESULT(0x8000_4002_u32 as i32));
        assert_eq!(Status::from(error), Status::E_NOINTERFACE);
    }

    #[rstest]
    #[case(Status::S_OK, "0x00000000 (S_OK)")]
    #[case(Status::E_NOINTERFACE, "0x80004002 (E_NOINTERFACE)")]
    #[case(Status::E_NOTFOUND, "0x80070490 (E_NOTFOUND)")]
    #[case(Status::from(0x8000_1234_u32 as i32), "0x80001234")]
    fn test_display(#[case] status: Status, #[case] expected: &str) {
        assert_eq!(status.to_string(), expected);
    }
}
