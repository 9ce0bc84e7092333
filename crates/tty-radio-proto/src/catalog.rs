//! In-memory station registry.
//!
//! Stations keep the order they were loaded in, streams keep file order.  The
//! catalog is immutable once built; lookups hand out borrows.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::protocol::StationSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub name: String,
    pub url: String,
    /// Album/station art shown by the UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub art: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Machine key, e.g. `favs` or `soma`.
    pub name: String,
    pub ui_name: String,
    pub streams: Vec<Stream>,
}

impl Station {
    pub fn stream(&self, name: &str) -> Option<&Stream> {
        self.streams.iter().find(|s| s.name == name)
    }

    pub fn summary(&self) -> StationSummary {
        StationSummary {
            name: self.name.clone(),
            ui_name: self.ui_name.clone(),
            streams: self.streams.iter().map(|s| s.name.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown station '{0}'")]
    UnknownStation(String),
    #[error("unknown stream '{stream}' in station '{station}'")]
    UnknownStream { station: String, stream: String },
    #[error("cannot find a stream matching '{0}'")]
    NoMatch(String),
    #[error("cannot find a stream matching '{query}' in station '{station}'")]
    NoMatchInStation { query: String, station: String },
    #[error("duplicate station '{0}'")]
    DuplicateStation(String),
    #[error("duplicate stream '{stream}' in station '{station}'")]
    DuplicateStream { station: String, stream: String },
}

#[derive(Debug, Clone, Default)]
pub struct StationCatalog {
    stations: Vec<Station>,
}

impl StationCatalog {
    pub fn new(stations: Vec<Station>) -> Result<Self, CatalogError> {
        let mut station_names = HashSet::new();
        for station in &stations {
            if !station_names.insert(station.name.as_str()) {
                return Err(CatalogError::DuplicateStation(station.name.clone()));
            }
            let mut stream_names = HashSet::new();
            for stream in &station.streams {
                if !stream_names.insert(stream.name.as_str()) {
                    return Err(CatalogError::DuplicateStream {
                        station: station.name.clone(),
                        stream: stream.name.clone(),
                    });
                }
            }
        }
        Ok(Self { stations })
    }

    pub fn get_station(&self, name: &str) -> Result<&Station, CatalogError> {
        self.stations
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| CatalogError::UnknownStation(name.to_string()))
    }

    pub fn list_stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn summaries(&self) -> Vec<StationSummary> {
        self.stations.iter().map(Station::summary).collect()
    }

    pub fn stream(&self, station: &str, stream: &str) -> Result<(&Station, &Stream), CatalogError> {
        let st = self.get_station(station)?;
        let s = st.stream(stream).ok_or_else(|| CatalogError::UnknownStream {
            station: station.to_string(),
            stream: stream.to_string(),
        })?;
        Ok((st, s))
    }

    /// Stream names of one station, or of every station in catalog order.
    pub fn stream_names(&self, station: Option<&str>) -> Result<Vec<String>, CatalogError> {
        match station {
            Some(name) => Ok(self
                .get_station(name)?
                .streams
                .iter()
                .map(|s| s.name.clone())
                .collect()),
            None => Ok(self
                .stations
                .iter()
                .flat_map(|st| st.streams.iter().map(|s| s.name.clone()))
                .collect()),
        }
    }

    /// First stream whose name contains `query`, ignoring case and whitespace.
    pub fn find_stream(
        &self,
        query: &str,
        station_filter: Option<&str>,
    ) -> Result<(&Station, &Stream), CatalogError> {
        let not_found = || match station_filter {
            Some(station) => CatalogError::NoMatchInStation {
                query: query.to_string(),
                station: station.to_string(),
            },
            None => CatalogError::NoMatch(query.to_string()),
        };

        if let Some(station) = station_filter {
            self.get_station(station)?;
        }
        let needle = normalize(query);
        if needle.is_empty() {
            return Err(not_found());
        }

        self.stations
            .iter()
            .filter(|st| station_filter.map_or(true, |f| f == st.name))
            .find_map(|st| {
                st.streams
                    .iter()
                    .find(|s| normalize(&s.name).contains(&needle))
                    .map(|s| (st, s))
            })
            .ok_or_else(not_found)
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(name: &str) -> Stream {
        Stream {
            name: name.to_string(),
            url: format!("http://example.com/{}", name.replace(' ', "_")),
            art: None,
            desc: None,
        }
    }

    fn catalog() -> StationCatalog {
        StationCatalog::new(vec![
            Station {
                name: "favs".into(),
                ui_name: "Favorites".into(),
                streams: vec![stream("BAGeL Radio"), stream("WCPE Classical")],
            },
            Station {
                name: "soma".into(),
                ui_name: "SomaFM".into(),
                streams: vec![stream("Groove Salad"), stream("Bagel Beats")],
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_find_stream_ignores_case_and_spacing() {
        let c = catalog();
        let (st, s) = c.find_stream("bagel", None).unwrap();
        assert_eq!((st.name.as_str(), s.name.as_str()), ("favs", "BAGeL Radio"));

        let (_, s) = c.find_stream("bag elra DIO", None).unwrap();
        assert_eq!(s.name, "BAGeL Radio");

        let (_, s) = c.find_stream("groovesalad", None).unwrap();
        assert_eq!(s.name, "Groove Salad");
    }

    #[test]
    fn test_find_stream_with_station_filter() {
        let c = catalog();
        let (st, s) = c.find_stream("bagel", Some("soma")).unwrap();
        assert_eq!((st.name.as_str(), s.name.as_str()), ("soma", "Bagel Beats"));

        assert_eq!(
            c.find_stream("groove", Some("favs")).unwrap_err(),
            CatalogError::NoMatchInStation {
                query: "groove".into(),
                station: "favs".into()
            }
        );
        assert_eq!(
            c.find_stream("bagel", Some("nope")).unwrap_err(),
            CatalogError::UnknownStation("nope".into())
        );
    }

    #[test]
    fn test_find_stream_not_found() {
        let c = catalog();
        assert_eq!(
            c.find_stream("ewqrewrwer", None).unwrap_err(),
            CatalogError::NoMatch("ewqrewrwer".into())
        );
        assert!(c.find_stream("   ", None).is_err());
    }

    #[test]
    fn test_lookup_and_listing_order() {
        let c = catalog();
        let names: Vec<_> = c.list_stations().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["favs", "soma"]);
        assert_eq!(
            c.stream_names(None).unwrap(),
            ["BAGeL Radio", "WCPE Classical", "Groove Salad", "Bagel Beats"]
        );
        assert_eq!(c.stream_names(Some("favs")).unwrap().len(), 2);
        assert!(c.stream_names(Some("ewqrewrwer")).is_err());
        assert!(c.stream("favs", "WCPE Classical").is_ok());
        assert!(matches!(
            c.stream("favs", "Groove Salad"),
            Err(CatalogError::UnknownStream { .. })
        ));
    }

    #[test]
    fn test_rejects_duplicates() {
        let dup_stream = StationCatalog::new(vec![Station {
            name: "favs".into(),
            ui_name: "Favorites".into(),
            streams: vec![stream("A"), stream("A")],
        }]);
        assert!(matches!(dup_stream, Err(CatalogError::DuplicateStream { .. })));

        let station = Station {
            name: "favs".into(),
            ui_name: "Favorites".into(),
            streams: vec![],
        };
        let dup_station = StationCatalog::new(vec![station.clone(), station]);
        assert_eq!(
            dup_station.unwrap_err(),
            CatalogError::DuplicateStation("favs".into())
        );
    }
}
