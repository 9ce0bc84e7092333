use serde::{Deserialize, Serialize};

use crate::volume::Volume;

/// Envelope for every REST response.  `success` is authoritative; clients
/// must not rely on the HTTP status code alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Player status as seen by polling clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusData {
    pub station: Option<String>,
    pub stream: Option<String>,
    pub paused: bool,
    pub currently_streaming: bool,
    /// Stream name announced by the decoder (ICY name), if any yet.
    pub stream_name: Option<String>,
    pub song: Option<String>,
    pub volume: Volume,
}

impl StatusData {
    /// True when audio is flowing (streaming and not paused).
    pub fn is_playing(&self) -> bool {
        self.currently_streaming && !self.paused
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSummary {
    pub name: String,
    pub ui_name: String,
    pub streams: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDetail {
    pub station: String,
    pub name: String,
    pub url: String,
    pub art: Option<String>,
    pub desc: Option<String>,
    /// Live metadata, only present while this stream is the one streaming.
    pub meta_name: Option<String>,
    pub meta_song: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundStream {
    pub station: String,
    pub stream: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub stream_name: Option<String>,
    pub song: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexData {
    pub name: String,
    pub version: String,
}

// ── requests ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectRequest {
    pub station: String,
    #[serde(default)]
    pub stream: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayRequest {
    #[serde(default)]
    pub station: Option<String>,
    #[serde(default)]
    pub stream: Option<String>,
}

/// Raw integer so that out-of-range values reach the server's validation
/// instead of failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeRequest {
    pub value: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationQuery {
    #[serde(default)]
    pub station: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamQuery {
    pub station: String,
    pub stream: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindQuery {
    pub query: String,
    #[serde(default)]
    pub station: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NowPlayingQuery {
    #[serde(default)]
    pub wait: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_shape() {
        let resp: ApiResponse<StatusData> = ApiResponse::err("unknown station 'x'");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "error": "unknown station 'x'" })
        );
    }

    #[test]
    fn test_status_field_names() {
        let status = StatusData {
            station: Some("favs".into()),
            stream: Some("WCPE Classical".into()),
            paused: false,
            currently_streaming: true,
            stream_name: None,
            song: Some("".into()),
            volume: Volume::new(11000).unwrap(),
        };
        let json = serde_json::to_value(ApiResponse::ok(status)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["currently_streaming"], true);
        assert_eq!(json["data"]["stream"], "WCPE Classical");
        assert_eq!(json["data"]["song"], "");
        assert!(json["data"]["stream_name"].is_null());
        assert_eq!(json["data"]["volume"], 11000);
    }

    #[test]
    fn test_play_request_fields_optional() {
        let req: PlayRequest = serde_json::from_str("{}").unwrap();
        assert!(req.station.is_none() && req.stream.is_none());
    }
}
