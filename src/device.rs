//! Capture device snapshots and identification.

use std::sync::Arc;

use serde::{Serialize, Serializer};

/// Unique identifier for a capture device.
///
/// `DeviceId` is a lightweight, cloneable identifier backed by `Arc<str>`,
/// so cloning is a pointer copy with no heap allocation.
///
/// # Example
///
/// ```
/// use camera_bridge::DeviceId;
///
/// let cam = DeviceId::new("FaceTime HD Camera");
/// assert_eq!(cam, DeviceId::new("FaceTime HD Camera"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(Arc<str>);

impl DeviceId {
    /// Creates a new device ID from a string.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for DeviceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Kind of media a capture device produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Camera devices.
    Video,
    /// Microphone devices.
    Audio,
}

impl MediaKind {
    /// Parses a `deviceType` argument from the wire.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }
}

/// Physical position of a capture device, when the platform reports one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePosition {
    /// Front-facing (user side).
    Front,
    /// Back-facing (world side).
    Back,
    /// External device (USB camera, external microphone).
    External,
    /// Position not reported by the platform.
    #[default]
    Unspecified,
}

/// A point-in-time snapshot of a capture device.
///
/// Snapshots are owned by the platform's discovery API and may go stale when
/// hardware is hot-plugged; staleness is tolerated, not actively invalidated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureDevice {
    /// Unique device identifier.
    pub device_id: DeviceId,
    /// Display name in the user's locale.
    pub localized_name: String,
    /// Device manufacturer.
    pub manufacturer: String,
    /// Media kind (video or audio).
    #[serde(rename = "deviceType")]
    pub kind: MediaKind,
    /// Physical position, if reported.
    pub position: DevicePosition,
}

impl CaptureDevice {
    /// Creates a device snapshot with an unspecified position.
    pub fn new(
        device_id: impl Into<DeviceId>,
        localized_name: impl Into<String>,
        manufacturer: impl Into<String>,
        kind: MediaKind,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            localized_name: localized_name.into(),
            manufacturer: manufacturer.into(),
            kind,
            position: DevicePosition::Unspecified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_equality() {
        let a = DeviceId::new("cam0");
        let b = DeviceId::new("cam0");
        let c = DeviceId::new("cam1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_device_id_display() {
        let id = DeviceId::new("Built-in Microphone");
        assert_eq!(format!("{id}"), "Built-in Microphone");
    }

    #[test]
    fn test_device_id_from_string() {
        let id: DeviceId = String::from("cam0").into();
        assert_eq!(id.as_str(), "cam0");
    }

    #[test]
    fn test_media_kind_parse() {
        assert_eq!(MediaKind::parse("video"), Some(MediaKind::Video));
        assert_eq!(MediaKind::parse("audio"), Some(MediaKind::Audio));
        assert_eq!(MediaKind::parse("display"), None);
    }

    #[test]
    fn test_capture_device_serializes_wire_names() {
        let dev = CaptureDevice::new("cam0", "FaceTime HD Camera", "Apple Inc.", MediaKind::Video);
        let json = serde_json::to_value(&dev).unwrap();
        assert_eq!(json["deviceId"], "cam0");
        assert_eq!(json["localizedName"], "FaceTime HD Camera");
        assert_eq!(json["deviceType"], "video");
        assert_eq!(json["position"], "unspecified");
    }
}
