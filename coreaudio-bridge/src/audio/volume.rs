//! Volume control using IAudioEndpointVolume.
//!
//! Provides master and per-channel volume, mute, stepping, and change
//! notifications for an endpoint. Every mutating call carries the
//! wrapper's event context, which the subsystem echoes back in the
//! resulting [`VolumeNotification`](super::VolumeNotification).

use super::device::{HardwareSupport, VolumeRange, VolumeStepInfo};
use super::interfaces::{IAudioEndpointVolume, IAudioEndpointVolumeCallback, IAudioEndpointVolumeEx};
use super::notifications::{self, VolumeNotificationHandler};
use crate::interop::{Handle, NotificationSource, Registration, Status, StatusOutcome, GUID};
use std::ptr;

/// A registered volume notification bridge.
pub type VolumeNotificationRegistration = Registration<IAudioEndpointVolume, IAudioEndpointVolumeCallback>;

impl NotificationSource<IAudioEndpointVolumeCallback> for IAudioEndpointVolume {
    fn register(source: &Handle<Self>, client: &Handle<IAudioEndpointVolumeCallback>) -> Status {
        unsafe { source.RegisterControlChangeNotify(client.as_raw()) }.into()
    }

    fn unregister(source: &Handle<Self>, client: &Handle<IAudioEndpointVolumeCallback>) -> Status {
        unsafe { source.UnregisterControlChangeNotify(client.as_raw()) }.into()
    }
}

fn context_ptr(context: &Option<GUID>) -> *const GUID {
    context.as_ref().map_or(ptr::null(), |guid| guid as *const GUID)
}

fn range((min_db, max_db, increment_db): (f32, f32, f32)) -> VolumeRange {
    VolumeRange {
        min_db,
        max_db,
        increment_db,
    }
}

/// Volume controller for one endpoint.
#[derive(Debug, Clone)]
pub struct AudioEndpointVolume {
    handle: Handle<IAudioEndpointVolume>,
    event_context: Option<GUID>,
}

impl AudioEndpointVolume {
    pub fn from_handle(handle: Handle<IAudioEndpointVolume>) -> Self {
        Self {
            handle,
            event_context: None,
        }
    }

    pub fn with_event_context(mut self, context: GUID) -> Self {
        self.event_context = Some(context);
        self
    }

    pub fn event_context(&self) -> Option<GUID> {
        self.event_context
    }

    /// Set or clear the token passed with every mutating call. `None`
    /// passes a null context.
    pub fn set_event_context(&mut self, context: Option<GUID>) {
        self.event_context = context;
    }

    pub fn handle(&self) -> &Handle<IAudioEndpointVolume> {
        &self.handle
    }

    pub fn channel_count(&self) -> StatusOutcome<u32> {
        self.handle
            .call(|volume, out: &mut u32| unsafe { volume.GetChannelCount(out) }, |n| n)
    }

    /// Master level in decibels.
    pub fn master_volume_level(&self) -> StatusOutcome<f32> {
        self.handle
            .call(|volume, out: &mut f32| unsafe { volume.GetMasterVolumeLevel(out) }, |v| v)
    }

    pub fn set_master_volume_level(&self, level_db: f32) -> StatusOutcome<()> {
        let context = context_ptr(&self.event_context);
        self.handle
            .call_status(|volume| unsafe { volume.SetMasterVolumeLevel(level_db, context) })
    }

    /// Master level as a scalar in `0.0..=1.0`.
    pub fn master_volume_level_scalar(&self) -> StatusOutcome<f32> {
        self.handle
            .call(|volume, out: &mut f32| unsafe { volume.GetMasterVolumeLevelScalar(out) }, |v| v)
    }

    /// Out-of-range values are rejected by the subsystem with `E_INVALIDARG`.
    pub fn set_master_volume_level_scalar(&self, level: f32) -> StatusOutcome<()> {
        let context = context_ptr(&self.event_context);
        self.handle
            .call_status(|volume| unsafe { volume.SetMasterVolumeLevelScalar(level, context) })
    }

    pub fn channel_volume_level(&self, channel: u32) -> StatusOutcome<f32> {
        self.handle.call(
            |volume, out: &mut f32| unsafe { volume.GetChannelVolumeLevel(channel, out) },
            |v| v,
        )
    }

    pub fn set_channel_volume_level(&self, channel: u32, level_db: f32) -> StatusOutcome<()> {
        let context = context_ptr(&self.event_context);
        self.handle
            .call_status(|volume| unsafe { volume.SetChannelVolumeLevel(channel, level_db, context) })
    }

    pub fn channel_volume_level_scalar(&self, channel: u32) -> StatusOutcome<f32> {
        self.handle.call(
            |volume, out: &mut f32| unsafe { volume.GetChannelVolumeLevelScalar(channel, out) },
            |v| v,
        )
    }

    pub fn set_channel_volume_level_scalar(&self, channel: u32, level: f32) -> StatusOutcome<()> {
        let context = context_ptr(&self.event_context);
        self.handle
            .call_status(|volume| unsafe { volume.SetChannelVolumeLevelScalar(channel, level, context) })
    }

    pub fn mute(&self) -> StatusOutcome<bool> {
        self.handle
            .call(|volume, out: &mut i32| unsafe { volume.GetMute(out) }, |muted| muted != 0)
    }

    pub fn set_mute(&self, muted: bool) -> StatusOutcome<()> {
        let context = context_ptr(&self.event_context);
        self.handle
            .call_status(|volume| unsafe { volume.SetMute(i32::from(muted), context) })
    }

    /// Toggle the mute state. Returns the new state.
    pub fn toggle_mute(&self) -> StatusOutcome<bool> {
        self.mute().and_then(|current| {
            let new_state = !current;
            self.set_mute(new_state).map(|()| new_state)
        })
    }

    pub fn volume_step_info(&self) -> StatusOutcome<VolumeStepInfo> {
        self.handle.call(
            |volume, out: &mut (u32, u32)| unsafe { volume.GetVolumeStepInfo(&mut out.0, &mut out.1) },
            |(step, step_count)| VolumeStepInfo { step, step_count },
        )
    }

    pub fn volume_step_up(&self) -> StatusOutcome<()> {
        let context = context_ptr(&self.event_context);
        self.handle
            .call_status(|volume| unsafe { volume.VolumeStepUp(context) })
    }

    pub fn volume_step_down(&self) -> StatusOutcome<()> {
        let context = context_ptr(&self.event_context);
        self.handle
            .call_status(|volume| unsafe { volume.VolumeStepDown(context) })
    }

    pub fn hardware_support(&self) -> StatusOutcome<HardwareSupport> {
        self.handle.call(
            |volume, out: &mut u32| unsafe { volume.QueryHardwareSupport(out) },
            HardwareSupport::from_bits_retain,
        )
    }

    pub fn volume_range(&self) -> StatusOutcome<VolumeRange> {
        self.handle.call(
            |volume, out: &mut (f32, f32, f32)| unsafe {
                volume.GetVolumeRange(&mut out.0, &mut out.1, &mut out.2)
            },
            range,
        )
    }

    /// The extended interface, when the endpoint implements it.
    pub fn ex(&self) -> StatusOutcome<AudioEndpointVolumeEx> {
        self.handle
            .query_capability::<IAudioEndpointVolumeEx>()
            .map(AudioEndpointVolumeEx::from_handle)
    }

    /// Wrap `handler` in a volume callback bridge and register it.
    pub fn register_control_change_notify<H>(
        &self,
        handler: H,
    ) -> StatusOutcome<VolumeNotificationRegistration>
    where
        H: VolumeNotificationHandler + 'static,
    {
        Registration::register(&self.handle, notifications::volume_callback(handler))
    }
}

/// Wrapper around `IAudioEndpointVolumeEx`.
#[derive(Debug, Clone)]
pub struct AudioEndpointVolumeEx {
    handle: Handle<IAudioEndpointVolumeEx>,
}

impl AudioEndpointVolumeEx {
    pub fn from_handle(handle: Handle<IAudioEndpointVolumeEx>) -> Self {
        Self { handle }
    }

    /// Decibel range of a single channel.
    pub fn volume_range_channel(&self, channel: u32) -> StatusOutcome<VolumeRange> {
        self.handle.call(
            |volume, out: &mut (f32, f32, f32)| unsafe {
                volume.GetVolumeRangeChannel(channel, &mut out.0, &mut out.1, &mut out.2)
            },
            range,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeAudioSystem, FakeDevice};
    use pretty_assertions::assert_eq;

    fn speaker_volume() -> (FakeAudioSystem, AudioEndpointVolume) {
        let system = FakeAudioSystem::builder()
            .device(FakeDevice::render("spk", "Speakers").channels(2))
            .build();
        let volume = system
            .enumerator()
            .default_speaker()
            .unwrap()
            .activate_endpoint_volume()
            .unwrap();
        (system, volume)
    }

    #[test]
    fn test_master_scalar_round_trip() {
        let (_system, volume) = speaker_volume();
        volume.set_master_volume_level_scalar(0.10).unwrap();
        let level = volume.master_volume_level_scalar().unwrap();
        assert!((level - 0.10).abs() < 1e-6, "level was {level}");
    }

    #[test]
    fn test_scalar_out_of_range_is_rejected() {
        let (_system, volume) = speaker_volume();
        let outcome = volume.set_master_volume_level_scalar(1.5);
        assert_eq!(outcome.status(), Status::E_INVALIDARG);
        assert!((volume.master_volume_level_scalar().unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mute_and_toggle() {
        let (_system, volume) = speaker_volume();
        volume.set_mute(true).unwrap();
        assert!(volume.mute().unwrap());
        volume.set_mute(false).unwrap();
        assert!(!volume.mute().unwrap());
        assert!(volume.toggle_mute().unwrap());
        assert!(volume.mute().unwrap());
    }

    #[test]
    fn test_channel_levels() {
        let (_system, volume) = speaker_volume();
        assert_eq!(volume.channel_count().unwrap(), 2);
        volume.set_channel_volume_level_scalar(1, 0.25).unwrap();
        assert!((volume.channel_volume_level_scalar(1).unwrap() - 0.25).abs() < 1e-6);
        assert_eq!(
            volume.channel_volume_level_scalar(2).status(),
            Status::E_INVALIDARG
        );
    }

    #[test]
    fn test_step_info_and_range() {
        let (_system, volume) = speaker_volume();
        let range = volume.volume_range().unwrap();
        assert!(range.min_db < range.max_db);
        assert!(range.increment_db > 0.0);

        volume.set_master_volume_level_scalar(0.0).unwrap();
        assert_eq!(volume.volume_step_info().unwrap().step, 0);
        volume.volume_step_up().unwrap();
        let info = volume.volume_step_info().unwrap();
        assert_eq!(info.step, 1);
        assert!(info.step_count > 1);
        volume.volume_step_down().unwrap();
        assert_eq!(volume.volume_step_info().unwrap().step, 0);
    }

    #[test]
    fn test_decibel_level_tracks_scalar() {
        let (_system, volume) = speaker_volume();
        let range = volume.volume_range().unwrap();
        volume.set_master_volume_level(range.min_db).unwrap();
        assert!(volume.master_volume_level_scalar().unwrap().abs() < 1e-6);
        volume.set_master_volume_level(range.max_db).unwrap();
        assert!((volume.master_volume_level_scalar().unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_hardware_support() {
        let (_system, volume) = speaker_volume();
        let support = volume.hardware_support().unwrap();
        assert!(support.contains(HardwareSupport::VOLUME | HardwareSupport::MUTE));
    }

    #[test]
    fn test_extended_interface() {
        let (_system, volume) = speaker_volume();
        let ex = volume.ex().unwrap();
        let range = ex.volume_range_channel(0).unwrap();
        assert_eq!(range, volume.volume_range().unwrap());
        assert_eq!(ex.volume_range_channel(5).status(), Status::E_INVALIDARG);
    }
}
