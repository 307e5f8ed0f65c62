//! Sample programs for coreaudio-bridge.
//!
//! ```text
//! coreaudio-samples list --json
//! coreaudio-samples set-volume 0.25
//! coreaudio-samples mute-all
//! coreaudio-samples watch --seconds 60
//! ```
//!
//! Pass `--fake` to run against the in-process subsystem instead of the
//! real one; that is the only mode available off Windows.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use coreaudio_bridge::audio::{
    create_event_channel, DataFlow, DeviceEvent, DeviceState, MMDevice, MMDeviceEnumerator, Role,
    VolumeNotification,
};
use coreaudio_bridge::fake::{FakeAudioSystem, FakeDevice};
use coreaudio_bridge::interop::{StatusOutcome, GUID};
use serde::Serialize;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Correlates volume changes made by this program with the notifications
/// they produce.
const SAMPLES_CONTEXT: GUID = GUID::from_u128(0x6B1F3C2A_94D7_4E58_B0A3_2C7D8E9F1A40);

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Use the in-process fake subsystem
    #[arg(long, global = true)]
    fake: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List render and capture endpoints in every state.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Set the default speaker's master volume (scalar, 0.0 to 1.0).
    SetVolume {
        #[arg(default_value_t = 0.10)]
        level: f32,
    },
    /// Mute every active speaker.
    MuteAll,
    /// Log endpoint and default-speaker volume notifications.
    Watch {
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },
}

/// One row of `list --json`.
#[derive(Debug, Serialize)]
struct EndpointInfo {
    id: String,
    name: Option<String>,
    description: Option<String>,
    flow: String,
    state: String,
    is_default: bool,
    volume: Option<f32>,
    muted: Option<bool>,
}

/// Where the enumerator comes from. Keeps the COM apartment or the fake
/// alive for as long as the program runs.
enum Subsystem {
    Fake(FakeAudioSystem),
    #[cfg(windows)]
    Native(coreaudio_bridge::platform::ComGuard),
}

impl Subsystem {
    fn open(fake: bool, multithreaded: bool) -> Result<Self> {
        if fake {
            return Ok(Self::Fake(demo_system()));
        }
        #[cfg(windows)]
        {
            use coreaudio_bridge::platform::ComGuard;
            let guard = if multithreaded {
                ComGuard::multithreaded()
            } else {
                ComGuard::new()
            };
            Ok(Self::Native(guard.context("COM initialization failed")?))
        }
        #[cfg(not(windows))]
        {
            let _ = multithreaded;
            bail!("the native audio subsystem is only available on Windows; pass --fake")
        }
    }

    fn fake(&self) -> Option<&FakeAudioSystem> {
        match self {
            Self::Fake(system) => Some(system),
            #[cfg(windows)]
            Self::Native(_) => None,
        }
    }

    fn enumerator(&self) -> Result<MMDeviceEnumerator> {
        match self {
            Self::Fake(system) => Ok(system.enumerator()),
            #[cfg(windows)]
            Self::Native(_) => MMDeviceEnumerator::create().context("creating the device enumerator"),
        }
    }
}

fn demo_system() -> FakeAudioSystem {
    FakeAudioSystem::builder()
        .device(FakeDevice::render("{0.0.0.00000000}.{speakers}", "Speakers (Realtek Audio)"))
        .device(FakeDevice::render("{0.0.0.00000000}.{headphones}", "Headphones (USB Audio)"))
        .device(
            FakeDevice::render("{0.0.0.00000000}.{hdmi}", "Display Audio")
                .state(DeviceState::UNPLUGGED),
        )
        .device(FakeDevice::capture("{0.0.1.00000000}.{mic}", "Microphone Array").peaks(&[0.12]))
        .build()
}

/// Escalate a failed outcome into an `anyhow` error naming `what`.
fn check<T>(outcome: StatusOutcome<T>, what: &str) -> Result<T> {
    outcome.try_unwrap().with_context(|| what.to_string())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let args = Args::parse();
    let multithreaded = matches!(args.command, Command::Watch { .. });
    let subsystem = Subsystem::open(args.fake, multithreaded)?;
    let enumerator = subsystem.enumerator()?;

    match args.command {
        Command::List { json } => list(&enumerator, json),
        Command::SetVolume { level } => set_volume(&enumerator, level),
        Command::MuteAll => mute_all(&enumerator),
        Command::Watch { seconds } => watch(&subsystem, &enumerator, Duration::from_secs(seconds)),
    }
}

fn describe(device: &MMDevice, flow: DataFlow, default_id: Option<&str>) -> Result<EndpointInfo> {
    let id = check(device.id(), "reading endpoint id")?;
    let state = check(device.state(), "reading endpoint state")?;

    // Property and volume reads fail on endpoints that are not active.
    let (volume, muted) = if state.contains(DeviceState::ACTIVE) {
        match device.activate_endpoint_volume().ok() {
            Some(volume) => (volume.master_volume_level_scalar().ok(), volume.mute().ok()),
            None => (None, None),
        }
    } else {
        (None, None)
    };

    Ok(EndpointInfo {
        is_default: default_id == Some(id.as_str()),
        id,
        name: device.friendly_name().ok(),
        description: device.description().ok(),
        flow: flow.to_string(),
        state: state.to_string(),
        volume,
        muted,
    })
}

fn list(enumerator: &MMDeviceEnumerator, json: bool) -> Result<()> {
    let mut rows = Vec::new();
    for flow in [DataFlow::Render, DataFlow::Capture] {
        let default_id = enumerator
            .default_audio_endpoint(flow, Role::Multimedia)
            .ok()
            .and_then(|device| device.id().ok());
        let devices = check(enumerator.enum_audio_endpoints(flow, DeviceState::all()), "enumerating endpoints")?;
        for device in &devices {
            rows.push(describe(&device?, flow, default_id.as_deref())?);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    for row in &rows {
        let marker = if row.is_default { "*" } else { " " };
        let volume = row
            .volume
            .map(|v| format!("{:>3.0}%", v * 100.0))
            .unwrap_or_else(|| "   -".to_string());
        let muted = if row.muted == Some(true) { " (muted)" } else { "" };
        println!(
            "{marker} {:<8} {:<12} {volume}{muted}  {}  {}",
            row.flow,
            row.state,
            row.name.as_deref().unwrap_or("<unnamed>"),
            row.id
        );
    }
    Ok(())
}

fn set_volume(enumerator: &MMDeviceEnumerator, level: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&level) {
        bail!("volume must be between 0.0 and 1.0, got {level}");
    }
    let speaker = check(enumerator.default_speaker(), "no default speaker")?;
    let volume = check(speaker.activate_endpoint_volume(), "activating endpoint volume")?
        .with_event_context(SAMPLES_CONTEXT);
    check(volume.set_master_volume_level_scalar(level), "setting master volume")?;

    let name = speaker.friendly_name().unwrap_or_else(|_| "default speaker".to_string());
    let now = check(volume.master_volume_level_scalar(), "reading master volume")?;
    tracing::info!(device = %name, volume = now, "Master volume set");
    Ok(())
}

fn mute_all(enumerator: &MMDeviceEnumerator) -> Result<()> {
    let speakers = check(enumerator.speakers(), "enumerating speakers")?;
    let mut muted = 0;
    for device in &speakers {
        let device = device?;
        let name = device.friendly_name().unwrap_or_else(|_| "<unnamed>".to_string());
        let outcome = device
            .activate_endpoint_volume()
            .and_then(|volume| volume.with_event_context(SAMPLES_CONTEXT).set_mute(true));
        if outcome.is_success() {
            muted += 1;
            tracing::info!(device = %name, "Muted");
        } else {
            tracing::warn!(device = %name, status = %outcome.status(), "Failed to mute");
        }
    }
    println!("Muted {muted} of {} speakers", speakers.count());
    Ok(())
}

fn log_volume(notification: &VolumeNotification) {
    let ours = notification.event_context == SAMPLES_CONTEXT;
    tracing::info!(
        volume = notification.master_volume,
        muted = notification.muted,
        channels = ?notification.channel_volumes,
        ours,
        "Volume changed"
    );
}

fn log_device_event(event: &DeviceEvent) {
    match event {
        DeviceEvent::DeviceAdded { device_id } => tracing::info!(%device_id, "Device added"),
        DeviceEvent::DeviceRemoved { device_id } => tracing::info!(%device_id, "Device removed"),
        DeviceEvent::DeviceStateChanged { device_id, new_state } => {
            tracing::info!(%device_id, state = %new_state, "Device state changed")
        }
        DeviceEvent::DefaultDeviceChanged { flow, role, device_id } => {
            tracing::info!(%flow, %role, device_id = device_id.as_deref().unwrap_or("<none>"), "Default device changed")
        }
        DeviceEvent::PropertyValueChanged { device_id, key } => {
            tracing::debug!(%device_id, pid = key.pid, "Property changed")
        }
    }
}

fn watch(subsystem: &Subsystem, enumerator: &MMDeviceEnumerator, duration: Duration) -> Result<()> {
    let (tx, rx) = create_event_channel();
    let endpoints = check(enumerator.register_endpoint_notification_callback(tx), "registering endpoint notifications")?;

    let speaker = check(enumerator.default_speaker(), "no default speaker")?;
    let volume = check(speaker.activate_endpoint_volume(), "activating endpoint volume")?
        .with_event_context(SAMPLES_CONTEXT);
    let volume_registration = check(
        volume.register_control_change_notify(log_volume),
        "registering volume notifications",
    )?;
    tracing::info!(seconds = duration.as_secs(), "Watching for audio changes");

    if let Some(system) = subsystem.fake() {
        simulate(system, enumerator, &volume)?;
    }

    let deadline = Instant::now() + duration;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(event) => log_device_event(&event),
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!("Notification channel closed");
                break;
            }
        }
    }

    check(volume_registration.unregister(), "unregistering volume notifications")?;
    check(endpoints.unregister(), "unregistering endpoint notifications")?;
    Ok(())
}

/// Drive a few changes through the fake so `watch --fake` has something
/// to show.
fn simulate(
    system: &FakeAudioSystem,
    enumerator: &MMDeviceEnumerator,
    volume: &coreaudio_bridge::audio::AudioEndpointVolume,
) -> Result<()> {
    check(volume.set_master_volume_level_scalar(0.5), "setting master volume")?;
    check(volume.toggle_mute(), "toggling mute")?;

    system.set_device_state("{0.0.0.00000000}.{hdmi}", DeviceState::ACTIVE);
    let headphones = check(enumerator.device("{0.0.0.00000000}.{headphones}"), "finding headphones")?;
    let headphones_id = check(headphones.id(), "reading endpoint id")?;
    check(
        system.policy_config().set_default_endpoint_for_all_roles(&headphones_id),
        "changing the default speaker",
    )?;
    Ok(())
}
