//! Audio device enumeration over the default cpal host.
//!
//! Devices are identified by their cpal name; `None` always means the host's
//! default device of that direction.

use cpal::traits::{DeviceTrait, HostTrait};

use backmask_core::models::audio_models::{AudioDevice, DeviceKind};
use backmask_core::models::error::AudioError;

/// Lists and resolves input and output devices.
pub struct DeviceEnumerator {
    host: cpal::Host,
}

impl DeviceEnumerator {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// List input (microphone) devices.
    pub fn list_input_devices(&self) -> Result<Vec<AudioDevice>, AudioError> {
        let default_name = self.host.default_input_device().and_then(|d| d.name().ok());
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::DeviceUnavailable(format!("failed to list input devices: {}", e)))?;
        Ok(describe_all(devices, DeviceKind::Input, default_name.as_deref()))
    }

    /// List output (speaker/headphone) devices.
    pub fn list_output_devices(&self) -> Result<Vec<AudioDevice>, AudioError> {
        let default_name = self.host.default_output_device().and_then(|d| d.name().ok());
        let devices = self
            .host
            .output_devices()
            .map_err(|e| AudioError::DeviceUnavailable(format!("failed to list output devices: {}", e)))?;
        Ok(describe_all(devices, DeviceKind::Output, default_name.as_deref()))
    }

    /// Resolve an input device by name, or the default one.
    pub fn find_input(&self, name: Option<&str>) -> Option<cpal::Device> {
        match name {
            None => self.host.default_input_device(),
            Some(name) => self
                .host
                .input_devices()
                .ok()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false)),
        }
    }

    /// Resolve an output device by name, or the default one.
    pub fn find_output(&self, name: Option<&str>) -> Option<cpal::Device> {
        match name {
            None => self.host.default_output_device(),
            Some(name) => self
                .host
                .output_devices()
                .ok()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false)),
        }
    }
}

impl Default for DeviceEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_all(
    devices: impl Iterator<Item = cpal::Device>,
    kind: DeviceKind,
    default_name: Option<&str>,
) -> Vec<AudioDevice> {
    devices
        .filter_map(|d| d.name().ok())
        .map(|name| describe(name, kind, default_name))
        .collect()
}

/// Build the device record for a named cpal device.
pub(crate) fn describe(name: String, kind: DeviceKind, default_name: Option<&str>) -> AudioDevice {
    AudioDevice {
        id: name.clone(),
        is_default: default_name == Some(name.as_str()),
        name,
        kind,
    }
}

/// Record for a provider that has not resolved a concrete device.
pub(crate) fn describe_configured(name: Option<&str>, kind: DeviceKind) -> AudioDevice {
    match name {
        Some(name) => describe(name.to_string(), kind, None),
        None => {
            let (id, label) = match kind {
                DeviceKind::Input => ("default-input", "Default Microphone"),
                DeviceKind::Output => ("default-output", "Default Speaker"),
            };
            AudioDevice {
                id: id.into(),
                name: label.into(),
                kind,
                is_default: true,
            }
        }
    }
}
