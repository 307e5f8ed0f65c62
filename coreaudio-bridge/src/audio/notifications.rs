//! Notification bridges for endpoint, volume and audio-effects changes.
//!
//! Each bridge is an `#[implement]` object exposing a callback interface.
//! The audio subsystem calls it on its own threads; the bridge decodes the
//! raw arguments, hands them to a Rust handler inside [`guard`], and
//! returns `S_OK` whatever the handler does.

use super::device::{DataFlow, DeviceEvent, DeviceState, Role};
use super::effects::EffectsPropertyStoreType;
use super::interfaces::{
    AudioVolumeNotificationData, IAudioEndpointVolumeCallback, IAudioEndpointVolumeCallback_Impl,
    IAudioEndpointVolumeCallback_Vtbl, IAudioSystemEffectsPropertyChangeNotificationClient,
    IAudioSystemEffectsPropertyChangeNotificationClient_Impl, IAudioSystemEffectsPropertyChangeNotificationClient_Vtbl,
    IMMNotificationClient, IMMNotificationClient_Impl, IMMNotificationClient_Vtbl,
};
use super::property_store::PropertyKey;
use crate::interop::memory::wide_to_string;
use crate::interop::{guard, Handle, GUID};
use std::ptr;
use std::sync::mpsc::{Receiver, Sender};
use windows_core::{implement, HRESULT};

/// Receives endpoint notifications. Every method defaults to doing nothing.
///
/// Methods run on threads owned by the audio subsystem and must not block
/// for long. A panic is caught and logged at the bridge.
pub trait DeviceNotificationHandler: Send + Sync {
    fn device_state_changed(&self, _device_id: &str, _new_state: DeviceState) {}

    fn device_added(&self, _device_id: &str) {}

    fn device_removed(&self, _device_id: &str) {}

    /// `device_id` is `None` when the flow/role has no default any more.
    fn default_device_changed(&self, _flow: DataFlow, _role: Role, _device_id: Option<&str>) {}

    fn property_value_changed(&self, _device_id: &str, _key: PropertyKey) {}
}

impl DeviceNotificationHandler for Sender<DeviceEvent> {
    fn device_state_changed(&self, device_id: &str, new_state: DeviceState) {
        let _ = self.send(DeviceEvent::DeviceStateChanged {
            device_id: device_id.to_string(),
            new_state,
        });
    }

    fn device_added(&self, device_id: &str) {
        let _ = self.send(DeviceEvent::DeviceAdded {
            device_id: device_id.to_string(),
        });
    }

    fn device_removed(&self, device_id: &str) {
        let _ = self.send(DeviceEvent::DeviceRemoved {
            device_id: device_id.to_string(),
        });
    }

    fn default_device_changed(&self, flow: DataFlow, role: Role, device_id: Option<&str>) {
        let _ = self.send(DeviceEvent::DefaultDeviceChanged {
            flow,
            role,
            device_id: device_id.map(str::to_string),
        });
    }

    fn property_value_changed(&self, device_id: &str, key: PropertyKey) {
        let _ = self.send(DeviceEvent::PropertyValueChanged {
            device_id: device_id.to_string(),
            key,
        });
    }
}

/// Forwards every endpoint notification to a closure as a [`DeviceEvent`].
pub struct EventForwarder<F>(pub F);

impl<F> DeviceNotificationHandler for EventForwarder<F>
where
    F: Fn(DeviceEvent) + Send + Sync,
{
    fn device_state_changed(&self, device_id: &str, new_state: DeviceState) {
        (self.0)(DeviceEvent::DeviceStateChanged {
            device_id: device_id.to_string(),
            new_state,
        });
    }

    fn device_added(&self, device_id: &str) {
        (self.0)(DeviceEvent::DeviceAdded {
            device_id: device_id.to_string(),
        });
    }

    fn device_removed(&self, device_id: &str) {
        (self.0)(DeviceEvent::DeviceRemoved {
            device_id: device_id.to_string(),
        });
    }

    fn default_device_changed(&self, flow: DataFlow, role: Role, device_id: Option<&str>) {
        (self.0)(DeviceEvent::DefaultDeviceChanged {
            flow,
            role,
            device_id: device_id.map(str::to_string),
        });
    }

    fn property_value_changed(&self, device_id: &str, key: PropertyKey) {
        (self.0)(DeviceEvent::PropertyValueChanged {
            device_id: device_id.to_string(),
            key,
        });
    }
}

/// Creates an event channel for use as a [`DeviceNotificationHandler`].
pub fn create_event_channel() -> (Sender<DeviceEvent>, Receiver<DeviceEvent>) {
    std::sync::mpsc::channel()
}

#[implement(IMMNotificationClient)]
struct DeviceNotificationBridge {
    handler: Box<dyn DeviceNotificationHandler>,
}

/// Wrap a handler in an `IMMNotificationClient` object.
pub fn device_notification_client<H>(handler: H) -> Handle<IMMNotificationClient>
where
    H: DeviceNotificationHandler + 'static,
{
    let client: IMMNotificationClient = DeviceNotificationBridge {
        handler: Box::new(handler),
    }
    .into();
    Handle::new(client)
}

// Null IDs are passed to handlers as empty strings.
unsafe fn device_id(raw: *const u16) -> String {
    wide_to_string(raw).unwrap_or_default()
}

impl IMMNotificationClient_Impl for DeviceNotificationBridge_Impl {
    unsafe fn OnDeviceStateChanged(&self, id: *const u16, new_state: u32) -> HRESULT {
        guard("OnDeviceStateChanged", || {
            let id = device_id(id);
            self.handler
                .device_state_changed(&id, DeviceState::from_bits_retain(new_state));
        })
        .into()
    }

    unsafe fn OnDeviceAdded(&self, id: *const u16) -> HRESULT {
        guard("OnDeviceAdded", || self.handler.device_added(&device_id(id))).into()
    }

    unsafe fn OnDeviceRemoved(&self, id: *const u16) -> HRESULT {
        guard("OnDeviceRemoved", || self.handler.device_removed(&device_id(id))).into()
    }

    unsafe fn OnDefaultDeviceChanged(&self, flow: i32, role: i32, id: *const u16) -> HRESULT {
        guard("OnDefaultDeviceChanged", || {
            let (Some(flow), Some(role)) = (DataFlow::from_raw(flow), Role::from_raw(role)) else {
                tracing::warn!(flow, role, "Ignoring default device change with unknown flow or role");
                return;
            };
            let id = wide_to_string(id);
            self.handler.default_device_changed(flow, role, id.as_deref());
        })
        .into()
    }

    unsafe fn OnPropertyValueChanged(&self, id: *const u16, key: PropertyKey) -> HRESULT {
        guard("OnPropertyValueChanged", || {
            self.handler.property_value_changed(&device_id(id), key)
        })
        .into()
    }
}

/// A decoded `AUDIO_VOLUME_NOTIFICATION_DATA`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeNotification {
    /// The context passed by whoever made the change; zero if none was given
    pub event_context: GUID,
    pub muted: bool,
    pub master_volume: f32,
    pub channel_volumes: Vec<f32>,
}

impl VolumeNotification {
    /// # Safety
    ///
    /// `data` must point at a notification block followed by `channels`
    /// channel volumes.
    unsafe fn from_raw(data: *const AudioVolumeNotificationData) -> Self {
        let header = &*data;
        let first = ptr::addr_of!((*data).channel_volumes) as *const f32;
        let channel_volumes = std::slice::from_raw_parts(first, header.channels as usize).to_vec();
        Self {
            event_context: header.event_context,
            muted: header.muted != 0,
            master_volume: header.master_volume,
            channel_volumes,
        }
    }
}

/// Receives endpoint volume notifications.
pub trait VolumeNotificationHandler: Send + Sync {
    fn on_notify(&self, notification: &VolumeNotification);
}

impl<F> VolumeNotificationHandler for F
where
    F: Fn(&VolumeNotification) + Send + Sync,
{
    fn on_notify(&self, notification: &VolumeNotification) {
        self(notification)
    }
}

#[implement(IAudioEndpointVolumeCallback)]
struct VolumeCallbackBridge {
    handler: Box<dyn VolumeNotificationHandler>,
}

/// Wrap a handler in an `IAudioEndpointVolumeCallback` object.
pub fn volume_callback<H>(handler: H) -> Handle<IAudioEndpointVolumeCallback>
where
    H: VolumeNotificationHandler + 'static,
{
    let callback: IAudioEndpointVolumeCallback = VolumeCallbackBridge {
        handler: Box::new(handler),
    }
    .into();
    Handle::new(callback)
}

impl IAudioEndpointVolumeCallback_Impl for VolumeCallbackBridge_Impl {
    unsafe fn OnNotify(&self, data: *const AudioVolumeNotificationData) -> HRESULT {
        guard("OnNotify", || {
            if data.is_null() {
                tracing::warn!("Volume notification without data");
                return;
            }
            self.handler.on_notify(&VolumeNotification::from_raw(data));
        })
        .into()
    }
}

/// Receives audio-effects property changes.
pub trait EffectsPropertyChangeHandler: Send + Sync {
    fn property_changed(&self, store_type: EffectsPropertyStoreType, key: PropertyKey);
}

impl<F> EffectsPropertyChangeHandler for F
where
    F: Fn(EffectsPropertyStoreType, PropertyKey) + Send + Sync,
{
    fn property_changed(&self, store_type: EffectsPropertyStoreType, key: PropertyKey) {
        self(store_type, key)
    }
}

#[implement(IAudioSystemEffectsPropertyChangeNotificationClient)]
struct EffectsPropertyChangeBridge {
    handler: Box<dyn EffectsPropertyChangeHandler>,
}

/// Wrap a handler in an `IAudioSystemEffectsPropertyChangeNotificationClient` object.
pub fn effects_property_change_client<H>(handler: H) -> Handle<IAudioSystemEffectsPropertyChangeNotificationClient>
where
    H: EffectsPropertyChangeHandler + 'static,
{
    let client: IAudioSystemEffectsPropertyChangeNotificationClient = EffectsPropertyChangeBridge {
        handler: Box::new(handler),
    }
    .into();
    Handle::new(client)
}

impl IAudioSystemEffectsPropertyChangeNotificationClient_Impl for EffectsPropertyChangeBridge_Impl {
    unsafe fn OnPropertyChanged(&self, store_type: i32, key: PropertyKey) -> HRESULT {
        guard("OnPropertyChanged", || {
            let Some(store_type) = EffectsPropertyStoreType::from_raw(store_type) else {
                tracing::warn!(store_type, %key, "Ignoring effects property change for unknown store");
                return;
            };
            self.handler.property_changed(store_type, key);
        })
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::interfaces::IMMDeviceEnumerator;
    use crate::audio::property_store::PKEY_DEVICE_FRIENDLY_NAME;
    use crate::fake::{FakeAudioSystem, FakeDevice};
    use crate::interop::{NotificationSource, Status};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn system() -> FakeAudioSystem {
        FakeAudioSystem::builder()
            .device(FakeDevice::render("spk", "Speakers").channels(2))
            .device(FakeDevice::capture("mic", "Microphone"))
            .build()
    }

    #[test]
    fn test_state_change_is_translated() {
        let system = system();
        let (tx, rx) = create_event_channel();
        let registration = system
            .enumerator()
            .register_endpoint_notification_callback(tx)
            .unwrap();

        let statuses = system.notify_device_state_changed("spk", 1);
        assert_eq!(statuses, vec![Status::S_OK]);
        assert_eq!(
            rx.try_recv().unwrap(),
            DeviceEvent::DeviceStateChanged {
                device_id: "spk".to_string(),
                new_state: DeviceState::ACTIVE,
            }
        );

        registration.unregister().unwrap();
    }

    #[test]
    fn test_every_notification_kind() {
        let system = system();
        let (tx, rx) = create_event_channel();
        let registration = system
            .enumerator()
            .register_endpoint_notification_callback(tx)
            .unwrap();

        system.notify_device_added("usb");
        system.notify_device_removed("usb");
        system.notify_default_device_changed(DataFlow::Capture as i32, Role::Communications as i32, Some("mic"));
        system.notify_default_device_changed(DataFlow::Render as i32, Role::Console as i32, None);
        system.notify_property_value_changed("spk", PKEY_DEVICE_FRIENDLY_NAME);

        let events: Vec<DeviceEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                DeviceEvent::DeviceAdded {
                    device_id: "usb".to_string()
                },
                DeviceEvent::DeviceRemoved {
                    device_id: "usb".to_string()
                },
                DeviceEvent::DefaultDeviceChanged {
                    flow: DataFlow::Capture,
                    role: Role::Communications,
                    device_id: Some("mic".to_string()),
                },
                DeviceEvent::DefaultDeviceChanged {
                    flow: DataFlow::Render,
                    role: Role::Console,
                    device_id: None,
                },
                DeviceEvent::PropertyValueChanged {
                    device_id: "spk".to_string(),
                    key: PKEY_DEVICE_FRIENDLY_NAME,
                },
            ]
        );
        registration.unregister().unwrap();
    }

    #[test]
    fn test_unknown_role_is_not_dispatched() {
        let system = system();
        let (tx, rx) = create_event_channel();
        let _registration = system
            .enumerator()
            .register_endpoint_notification_callback(tx)
            .unwrap();

        let statuses = system.notify_default_device_changed(0, 9, Some("spk"));
        assert_eq!(statuses, vec![Status::S_OK]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_no_delivery_after_unregister() {
        let system = system();
        let (tx, rx) = create_event_channel();
        let registration = system
            .enumerator()
            .register_endpoint_notification_callback(tx)
            .unwrap();
        assert_eq!(system.endpoint_client_count(), 1);

        registration.unregister().unwrap();
        assert_eq!(system.endpoint_client_count(), 0);

        assert!(system.notify_device_added("late").is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_registration_unregisters() {
        let system = system();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let registration = system
            .enumerator()
            .register_endpoint_notification_callback(EventForwarder(move |_event| {
                seen.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        system.notify_device_added("one");
        drop(registration);
        system.notify_device_added("two");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(system.endpoint_client_count(), 0);
        // The bridge, and with it the closure, has been released.
        assert_eq!(Arc::strong_count(&calls), 1);
    }

    #[test]
    fn test_handler_panic_is_contained() {
        struct Exploding;

        impl DeviceNotificationHandler for Exploding {
            fn device_added(&self, _device_id: &str) {
                panic!("handler failure");
            }
        }

        let system = system();
        let registration = system
            .enumerator()
            .register_endpoint_notification_callback(Exploding)
            .unwrap();

        assert_eq!(system.notify_device_added("boom"), vec![Status::S_OK]);
        // The bridge is still usable afterwards.
        assert_eq!(system.notify_device_added("again"), vec![Status::S_OK]);
        registration.unregister().unwrap();
    }

    #[test]
    fn test_unregister_unknown_client() {
        let system = system();
        let enumerator = system.enumerator();
        let client = device_notification_client(EventForwarder(|_| {}));
        let status = IMMDeviceEnumerator::unregister(enumerator.handle(), &client);
        assert_eq!(status, Status::E_NOTFOUND);
    }

    #[test]
    fn test_notifications_from_another_thread() {
        let system = Arc::new(system());
        let (tx, rx) = create_event_channel();
        let registration = system
            .enumerator()
            .register_endpoint_notification_callback(tx)
            .unwrap();

        let remote = system.clone();
        std::thread::spawn(move || {
            remote.notify_device_removed("spk");
        })
        .join()
        .unwrap();

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            DeviceEvent::DeviceRemoved {
                device_id: "spk".to_string()
            }
        );
        registration.unregister().unwrap();
    }

    #[test]
    fn test_volume_notification_echoes_context() {
        let system = system();
        let context = GUID::from_u128(0x2F4C8E1A_5B7D_4C3E_9A0F_1D2E3F405162);
        let volume = system
            .enumerator()
            .default_speaker()
            .unwrap()
            .activate_endpoint_volume()
            .unwrap()
            .with_event_context(context);

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let registration = volume
            .register_control_change_notify(move |n: &VolumeNotification| {
                sink.lock().unwrap().push(n.clone());
            })
            .unwrap();

        volume.set_master_volume_level_scalar(0.5).unwrap();
        volume.set_mute(true).unwrap();
        registration.unregister().unwrap();
        volume.set_mute(false).unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].event_context, context);
        assert!((received[0].master_volume - 0.5).abs() < 1e-6);
        assert_eq!(received[0].channel_volumes.len(), 2);
        assert!(!received[0].muted);
        assert!(received[1].muted);
    }

    #[test]
    fn test_volume_notification_without_context() {
        let system = system();
        let volume = system
            .enumerator()
            .default_speaker()
            .unwrap()
            .activate_endpoint_volume()
            .unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let tx = Mutex::new(tx);
        let _registration = volume
            .register_control_change_notify(move |n: &VolumeNotification| {
                let _ = tx.lock().unwrap().send(n.event_context);
            })
            .unwrap();

        volume.volume_step_up().unwrap();
        assert_eq!(rx.try_recv().unwrap(), GUID::zeroed());
    }

    #[test]
    fn test_volume_client_count_follows_registration() {
        let system = system();
        let volume = system
            .enumerator()
            .default_speaker()
            .unwrap()
            .activate_endpoint_volume()
            .unwrap();
        assert_eq!(system.volume_client_count("spk"), 0);

        let registration = volume
            .register_control_change_notify(|_: &VolumeNotification| {})
            .unwrap();
        assert_eq!(system.volume_client_count("spk"), 1);

        registration.unregister().unwrap();
        assert_eq!(system.volume_client_count("spk"), 0);
    }

    #[test]
    fn test_volume_registration_on_removed_device_releases_handler() {
        let system = system();
        let volume = system
            .enumerator()
            .default_speaker()
            .unwrap()
            .activate_endpoint_volume()
            .unwrap();
        system.remove_device("spk");

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let outcome = volume.register_control_change_notify(move |_: &VolumeNotification| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(outcome.status(), Status::AUDCLNT_E_DEVICE_INVALIDATED);
        assert!(outcome.ok().is_none());
        // The bridge was never handed over, so the closure is gone already.
        assert_eq!(Arc::strong_count(&calls), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
