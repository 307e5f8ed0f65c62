//! Plumbing shared by every callback bridge.
//!
//! A bridge is an `#[implement]` object exposing a foreign notification
//! interface. The foreign subsystem calls it on threads this
//! crate does not own; [`guard`] keeps handler panics from crossing back
//! over the boundary, and [`Registration`] ties the foreign side's
//! reference to a value the caller holds until it unregisters.

use super::handle::{interface_name, Handle};
use super::status::{Status, StatusOutcome};
use std::any::Any;
use std::fmt;
use std::mem::ManuallyDrop;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use windows_core::Interface;

/// Extract a human-readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return msg;
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg;
    }
    "non-string panic payload"
}

/// Run handler code for one inbound notification.
///
/// The foreign caller always receives `S_OK`: it does not interpret
/// failures from notification methods. A panic in `f` is caught and logged.
pub fn guard(event: &'static str, f: impl FnOnce()) -> Status {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        tracing::error!(
            event,
            message = panic_message(payload.as_ref()),
            "Notification handler panicked; panic contained at the bridge"
        );
    }
    Status::S_OK
}

/// An interface that accepts clients of interface `C` through one
/// register and one unregister entry point.
pub trait NotificationSource<C: Interface>: Interface {
    fn register(source: &Handle<Self>, client: &Handle<C>) -> Status;

    fn unregister(source: &Handle<Self>, client: &Handle<C>) -> Status;
}

/// A registered bridge. Hold it for as long as notifications are wanted.
///
/// [`unregister`](Self::unregister) ends the registration and reports the
/// foreign status. A registration that is dropped instead unregisters
/// itself and logs a warning.
pub struct Registration<S, C>
where
    S: NotificationSource<C>,
    C: Interface,
{
    source: Handle<S>,
    client: Handle<C>,
}

impl<S, C> Registration<S, C>
where
    S: NotificationSource<C>,
    C: Interface,
{
    /// Hand `client` to the source. On failure the client is released
    /// immediately; the source never saw it.
    pub fn register(source: &Handle<S>, client: Handle<C>) -> StatusOutcome<Self> {
        let status = S::register(source, &client);
        if status.is_failure() {
            tracing::warn!(
                source = interface_name::<S>(),
                client = interface_name::<C>(),
                %status,
                "Notification registration failed"
            );
            return StatusOutcome::failure(status);
        }

        tracing::debug!(
            source = interface_name::<S>(),
            client = interface_name::<C>(),
            "Notification client registered"
        );
        StatusOutcome::new(status, || Self {
            source: source.clone(),
            client,
        })
    }

    /// End the registration. The token is consumed whatever the status.
    ///
    /// Notifications already in flight may still reach the handler after
    /// this returns.
    pub fn unregister(self) -> StatusOutcome<()> {
        let this = ManuallyDrop::new(self);
        // Each field is moved out exactly once and `this` is never dropped.
        let (source, client) = unsafe { (ptr::read(&this.source), ptr::read(&this.client)) };
        Self::unregister_client(&source, &client)
    }

    fn unregister_client(source: &Handle<S>, client: &Handle<C>) -> StatusOutcome<()> {
        let status = S::unregister(source, client);
        if status.is_failure() {
            tracing::warn!(
                source = interface_name::<S>(),
                client = interface_name::<C>(),
                %status,
                "Notification unregistration failed"
            );
        } else {
            tracing::debug!(
                source = interface_name::<S>(),
                client = interface_name::<C>(),
                "Notification client unregistered"
            );
        }
        StatusOutcome::new(status, || ())
    }
}

impl<S, C> Drop for Registration<S, C>
where
    S: NotificationSource<C>,
    C: Interface,
{
    fn drop(&mut self) {
        tracing::warn!(
            source = interface_name::<S>(),
            client = interface_name::<C>(),
            "Registration dropped while registered; unregistering"
        );
        let _ = Self::unregister_client(&self.source, &self.client);
    }
}

impl<S, C> fmt::Debug for Registration<S, C>
where
    S: NotificationSource<C>,
    C: Interface,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("source", &self.source)
            .field("client", &self.client)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_contains_panic() {
        let status = guard("OnTest", || panic!("handler exploded"));
        assert_eq!(status, Status::S_OK);
    }

    #[test]
    fn test_guard_runs_handler() {
        let mut ran = false;
        assert_eq!(guard("OnTest", || ran = true), Status::S_OK);
        assert!(ran);
    }

    #[test]
    fn test_panic_message() {
        let payload = panic::catch_unwind(|| panic!("{} {}", "formatted", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 1");
        let payload = panic::catch_unwind(|| std::panic::panic_any(7u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
