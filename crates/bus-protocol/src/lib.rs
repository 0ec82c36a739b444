// bus-protocol: Wire types for the bus-tracking relay.
//
// Every message is a single JSON object carried in a WebSocket text frame.
// serde_json writes non-ASCII codepoints as raw UTF-8, so route names like
// "7я" round-trip without \uXXXX escaping.

pub mod validate;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Message type tags
// ---------------------------------------------------------------------------

/// The `msgType` tags of the browser-facing protocol.
pub mod msg_types {
    pub const NEW_BOUNDS: &str = "newBounds";
    pub const BUSES: &str = "Buses";
    pub const ERRORS: &str = "Errors";
}

// ---------------------------------------------------------------------------
// Emulator -> Server
// ---------------------------------------------------------------------------

/// A single position sample for one vehicle.
///
/// ```json
/// {"busId":"120-000","lat":55.75,"lng":37.62,"route":"120"}
/// ```
///
/// Sent by the emulator on the ingest port and echoed inside fleet
/// snapshots.  `bus_id` is the vehicle identity; the fleet map keeps the
/// latest sample per id (last-writer-wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    #[serde(rename = "busId")]
    pub bus_id: String,
    /// WGS84 latitude in decimal degrees.
    pub lat: f64,
    /// WGS84 longitude in decimal degrees.
    pub lng: f64,
    /// Name of the route the bus is serving.
    pub route: String,
}

// ---------------------------------------------------------------------------
// Browser -> Server
// ---------------------------------------------------------------------------

/// The validated payload of a `newBounds` frame: a complete viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south_lat: f64,
    pub north_lat: f64,
    pub west_lng: f64,
    pub east_lng: f64,
}

/// A browser session's viewport.  All four bounds start unset; filtering
/// only happens once a valid `newBounds` frame has set them all.
///
/// Inverted bounds (`south_lat >= north_lat`) are not detected; such a
/// viewport simply filters everything out.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowBounds {
    pub south_lat: Option<f64>,
    pub north_lat: Option<f64>,
    pub west_lng: Option<f64>,
    pub east_lng: Option<f64>,
}

impl WindowBounds {
    /// Whether the coordinate lies strictly inside the viewport.
    /// Always false while any bound is unset.
    pub fn is_inside(&self, lat: f64, lng: f64) -> bool {
        match (self.south_lat, self.north_lat, self.west_lng, self.east_lng) {
            (Some(south), Some(north), Some(west), Some(east)) => {
                south < lat && lat < north && west < lng && lng < east
            }
            _ => false,
        }
    }

    /// True while at least one bound is unset.
    pub fn is_none(&self) -> bool {
        self.south_lat.is_none()
            || self.north_lat.is_none()
            || self.west_lng.is_none()
            || self.east_lng.is_none()
    }

    /// Replace all four bounds with the values of a validated frame.
    pub fn update(&mut self, bounds: Bounds) {
        self.south_lat = Some(bounds.south_lat);
        self.north_lat = Some(bounds.north_lat);
        self.west_lng = Some(bounds.west_lng);
        self.east_lng = Some(bounds.east_lng);
    }
}

// ---------------------------------------------------------------------------
// Server -> Browser
// ---------------------------------------------------------------------------

/// A fleet snapshot pushed to one browser session.
///
/// ```json
/// {"msgType":"Buses","buses":[{"busId":"120-000",...}]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    #[serde(rename = "msgType")]
    pub msg_type: String,
    pub buses: Vec<Bus>,
}

impl FleetSnapshot {
    pub fn new(buses: Vec<Bus>) -> Self {
        Self {
            msg_type: msg_types::BUSES.to_owned(),
            buses,
        }
    }
}

/// The canonical error document, sent back to whichever peer produced an
/// invalid frame.  Never forwarded downstream.
///
/// ```json
/// {"errors":["Requires valid JSON"],"msgType":"Errors"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorsDocument {
    pub errors: Vec<String>,
    #[serde(rename = "msgType")]
    pub msg_type: String,
}

impl ErrorsDocument {
    pub fn single(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            msg_type: msg_types::ERRORS.to_owned(),
        }
    }

    /// The document as canonical JSON text.
    pub fn to_json(&self) -> String {
        serde_json::json!({ "errors": self.errors, "msgType": self.msg_type }).to_string()
    }
}
