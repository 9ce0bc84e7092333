//! Thin HTTP client for the REST API, shared by the CLI and the terminal UI.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::protocol::{
    ApiResponse, FoundStream, IndexData, NowPlaying, PlayRequest, SelectRequest, StationSummary,
    StatusData, StreamDetail, VolumeRequest,
};
use crate::volume::Volume;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("cannot reach radio server: {0}")]
    Connection(#[source] reqwest::Error),
    #[error("{0}")]
    Api(String),
    #[error("malformed server response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("server response carried no data")]
    MissingData,
}

impl ClientError {
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn index(&self) -> Result<IndexData, ClientError> {
        self.get("/", &[]).await
    }

    pub async fn status(&self) -> Result<StatusData, ClientError> {
        self.get("/api/status", &[]).await
    }

    pub async fn stations(&self) -> Result<Vec<StationSummary>, ClientError> {
        self.get("/api/stations", &[]).await
    }

    pub async fn station(&self, name: &str) -> Result<StationSummary, ClientError> {
        self.get("/api/station", &[("name", name)]).await
    }

    pub async fn streams(&self, station: Option<&str>) -> Result<Vec<String>, ClientError> {
        match station {
            Some(station) => self.get("/api/streams", &[("station", station)]).await,
            None => self.get("/api/streams", &[]).await,
        }
    }

    pub async fn stream(&self, station: &str, stream: &str) -> Result<StreamDetail, ClientError> {
        self.get("/api/stream", &[("station", station), ("stream", stream)])
            .await
    }

    pub async fn find(&self, query: &str, station: Option<&str>) -> Result<FoundStream, ClientError> {
        match station {
            Some(station) => {
                self.get("/api/find", &[("query", query), ("station", station)])
                    .await
            }
            None => self.get("/api/find", &[("query", query)]).await,
        }
    }

    /// With `wait`, the server holds the request until the first metadata
    /// arrives or its timeout elapses.
    pub async fn now_playing(&self, wait: bool) -> Result<NowPlaying, ClientError> {
        let wait = if wait { "true" } else { "false" };
        self.get("/api/now_playing", &[("wait", wait)]).await
    }

    pub async fn select(&self, station: &str, stream: Option<&str>) -> Result<StatusData, ClientError> {
        let body = SelectRequest {
            station: station.to_string(),
            stream: stream.map(str::to_string),
        };
        self.post("/api/set", Some(&body)).await
    }

    pub async fn play(
        &self,
        station: Option<&str>,
        stream: Option<&str>,
    ) -> Result<StatusData, ClientError> {
        let body = PlayRequest {
            station: station.map(str::to_string),
            stream: stream.map(str::to_string),
        };
        self.post("/api/play", Some(&body)).await
    }

    pub async fn pause(&self) -> Result<StatusData, ClientError> {
        self.post::<StatusData, ()>("/api/pause", None).await
    }

    pub async fn stop(&self) -> Result<StatusData, ClientError> {
        self.post::<StatusData, ()>("/api/stop", None).await
    }

    pub async fn set_volume(&self, volume: Volume) -> Result<StatusData, ClientError> {
        let body = VolumeRequest {
            value: i64::from(volume),
        };
        self.post("/api/volume", Some(&body)).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await
            .map_err(ClientError::Connection)?;
        unwrap_envelope(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError> {
        let mut req = self.http.post(format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await.map_err(ClientError::Connection)?;
        unwrap_envelope(resp).await
    }
}

/// The body flag decides success; the HTTP status is only informative.
async fn unwrap_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let envelope: ApiResponse<T> = resp.json().await.map_err(ClientError::Decode)?;
    if envelope.success {
        envelope.data.ok_or(ClientError::MissingData)
    } else {
        Err(ClientError::Api(
            envelope.error.unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}
