//! Windows-only entry points: the COM apartment and the root factory.
//!
//! Everything past object creation goes through the platform-independent
//! [`interop`](crate::interop) layer.

pub mod com;

pub use com::{create_instance, ComGuard, CLSID_MM_DEVICE_ENUMERATOR, CLSID_POLICY_CONFIG_CLIENT};
