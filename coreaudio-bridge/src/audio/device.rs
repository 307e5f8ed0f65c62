//! Audio endpoint data models.
//!
//! Plain values that cross the interface boundary as integers: data-flow
//! directions, device roles, state masks, and the small structs returned
//! by the endpoint volume methods.

use super::property_store::PropertyKey;
use bitflags::bitflags;
use std::fmt;

/// Direction of audio data through an endpoint (maps to `EDataFlow`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DataFlow {
    /// Playback: speakers, headphones
    Render = 0,

    /// Recording: microphones, line-in
    Capture = 1,

    /// Both directions; only valid as an enumeration filter
    All = 2,
}

impl DataFlow {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Render),
            1 => Some(Self::Capture),
            2 => Some(Self::All),
            _ => None,
        }
    }
}

impl fmt::Display for DataFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Render => "render",
            Self::Capture => "capture",
            Self::All => "all",
        })
    }
}

/// Audio device role (maps to `ERole`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Role {
    /// Used by games, system sounds, most general applications
    Console = 0,

    /// Used by music players, video players
    Multimedia = 1,

    /// Used by Teams, Zoom, Discord, and other VoIP applications
    Communications = 2,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Console, Role::Multimedia, Role::Communications];

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Console),
            1 => Some(Self::Multimedia),
            2 => Some(Self::Communications),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Console => "console",
            Self::Multimedia => "multimedia",
            Self::Communications => "communications",
        })
    }
}

bitflags! {
    /// Device state flags (`DEVICE_STATE_*`). Also used as the filter mask
    /// for endpoint enumeration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceState: u32 {
        const ACTIVE = 0x1;
        const DISABLED = 0x2;
        const NOT_PRESENT = 0x4;
        const UNPLUGGED = 0x8;
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.contains(Self::ACTIVE) {
            "active"
        } else if self.contains(Self::DISABLED) {
            "disabled"
        } else if self.contains(Self::UNPLUGGED) {
            "unplugged"
        } else if self.contains(Self::NOT_PRESENT) {
            "not present"
        } else {
            "unknown"
        };
        f.write_str(label)
    }
}

bitflags! {
    /// What an endpoint implements in hardware (`ENDPOINT_HARDWARE_SUPPORT_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HardwareSupport: u32 {
        const VOLUME = 0x1;
        const MUTE = 0x2;
        const METER = 0x4;
    }
}

bitflags! {
    /// Execution contexts accepted for activation (`CLSCTX_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClsCtx: u32 {
        const INPROC_SERVER = 0x1;
        const INPROC_HANDLER = 0x2;
        const LOCAL_SERVER = 0x4;
        const REMOTE_SERVER = 0x10;
        const ALL = Self::INPROC_SERVER.bits()
            | Self::INPROC_HANDLER.bits()
            | Self::LOCAL_SERVER.bits()
            | Self::REMOTE_SERVER.bits();
    }
}

impl Default for ClsCtx {
    fn default() -> Self {
        Self::ALL
    }
}

/// Physical form of an endpoint, read from `PKEY_AudioEndpoint_FormFactor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EndpointFormFactor {
    RemoteNetworkDevice = 0,
    Speakers = 1,
    LineLevel = 2,
    Headphones = 3,
    Microphone = 4,
    Headset = 5,
    Handset = 6,
    UnknownDigitalPassthrough = 7,
    Spdif = 8,
    DigitalAudioDisplayDevice = 9,
    Unknown = 10,
}

impl EndpointFormFactor {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::RemoteNetworkDevice,
            1 => Self::Speakers,
            2 => Self::LineLevel,
            3 => Self::Headphones,
            4 => Self::Microphone,
            5 => Self::Headset,
            6 => Self::Handset,
            7 => Self::UnknownDigitalPassthrough,
            8 => Self::Spdif,
            9 => Self::DigitalAudioDisplayDevice,
            _ => Self::Unknown,
        }
    }
}

/// Volume step position, from `GetVolumeStepInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeStepInfo {
    /// Current step, in `0..step_count`
    pub step: u32,
    pub step_count: u32,
}

/// Volume range in decibels, from `GetVolumeRange` / `GetVolumeRangeChannel`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeRange {
    pub min_db: f32,
    pub max_db: f32,
    pub increment_db: f32,
}

/// Events from the endpoint notification bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// A new audio device was connected
    DeviceAdded { device_id: String },

    /// An audio device was disconnected
    DeviceRemoved { device_id: String },

    /// Device state changed (active, disabled, not present, unplugged)
    DeviceStateChanged {
        device_id: String,
        new_state: DeviceState,
    },

    /// Default device changed for a flow and role
    DefaultDeviceChanged {
        flow: DataFlow,
        role: Role,
        device_id: Option<String>, // None if no default device
    },

    /// A device property changed
    PropertyValueChanged { device_id: String, key: PropertyKey },
}
