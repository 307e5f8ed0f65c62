//! Peak metering using IAudioMeterInformation.

use super::device::HardwareSupport;
use super::interfaces::IAudioMeterInformation;
use crate::interop::{Handle, StatusOutcome};

/// Level meter for one endpoint.
#[derive(Debug, Clone)]
pub struct AudioMeterInformation {
    handle: Handle<IAudioMeterInformation>,
}

impl AudioMeterInformation {
    pub fn from_handle(handle: Handle<IAudioMeterInformation>) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &Handle<IAudioMeterInformation> {
        &self.handle
    }

    /// Current peak level (0.0 to 1.0).
    pub fn peak_value(&self) -> StatusOutcome<f32> {
        self.handle
            .call(|meter, out: &mut f32| unsafe { meter.GetPeakValue(out) }, |v| v)
    }

    pub fn metering_channel_count(&self) -> StatusOutcome<u32> {
        self.handle
            .call(|meter, out: &mut u32| unsafe { meter.GetMeteringChannelCount(out) }, |n| n)
    }

    /// Peak values for all channels. A failing channel count is reported
    /// with its own status.
    pub fn channels_peak_values(&self) -> StatusOutcome<Vec<f32>> {
        self.metering_channel_count().and_then(|count| {
            self.handle.call(
                |meter, peaks: &mut Vec<f32>| {
                    peaks.resize(count as usize, 0.0);
                    unsafe { meter.GetChannelsPeakValues(count, peaks.as_mut_ptr()) }
                },
                |peaks| peaks,
            )
        })
    }

    pub fn hardware_support(&self) -> StatusOutcome<HardwareSupport> {
        self.handle.call(
            |meter, out: &mut u32| unsafe { meter.QueryHardwareSupport(out) },
            HardwareSupport::from_bits_retain,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeAudioSystem, FakeDevice};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_peaks_per_channel() {
        let system = FakeAudioSystem::builder()
            .device(FakeDevice::capture("mic", "Microphone").channels(2).peaks(&[0.5, 0.25]))
            .build();
        let meter = system
            .enumerator()
            .default_microphone()
            .unwrap()
            .activate_meter_information()
            .unwrap();

        assert_eq!(meter.metering_channel_count().unwrap(), 2);
        assert_eq!(meter.channels_peak_values().unwrap(), vec![0.5, 0.25]);
        assert_eq!(meter.peak_value().unwrap(), 0.5);
        assert!(meter.hardware_support().unwrap().contains(HardwareSupport::METER));
    }

    #[test]
    fn test_silent_device() {
        let system = FakeAudioSystem::builder()
            .device(FakeDevice::render("spk", "Speakers"))
            .build();
        let meter = system
            .enumerator()
            .default_speaker()
            .unwrap()
            .activate_meter_information()
            .unwrap();
        assert_eq!(meter.peak_value().unwrap(), 0.0);
        assert!(meter.channels_peak_values().unwrap().iter().all(|&p| p == 0.0));
    }
}
