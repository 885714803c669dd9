// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Catalog search against the provider's Web API.

use std::fmt;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::token::provider::{classify_failure, ProviderError};

pub const DEFAULT_SEARCH_LIMIT: u32 = 20;
pub const MAX_SEARCH_LIMIT: u32 = 50;

/// Kind of catalog item a search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Track,
    Playlist,
    Album,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Playlist => "playlist",
            Self::Album => "album",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "track" => Some(Self::Track),
            "playlist" => Some(Self::Playlist),
            "album" => Some(Self::Album),
            _ => None,
        }
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search request parameters refused before reaching the provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidSearch {
    #[error("search query is required")]
    EmptyQuery,
    #[error("type must be one of track, playlist, album (got {0:?})")]
    UnknownKind(String),
}

/// A validated search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub q: String,
    pub kind: SearchKind,
    pub limit: u32,
}

impl SearchQuery {
    /// Validate raw query-string values. A missing limit defaults to 20; any
    /// other value is clamped into `1..=50`.
    pub fn parse(q: Option<&str>, kind: Option<&str>, limit: Option<u32>) -> Result<Self, InvalidSearch> {
        let q = q.map(str::trim).filter(|q| !q.is_empty()).ok_or(InvalidSearch::EmptyQuery)?;
        let raw_kind = kind.unwrap_or_default();
        let kind =
            SearchKind::parse(raw_kind).ok_or_else(|| InvalidSearch::UnknownKind(raw_kind.to_owned()))?;
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT);
        Ok(Self { q: q.to_owned(), kind, limit })
    }
}

/// One search hit, flattened for the admin UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    pub id: String,
    pub name: String,
    pub uri: String,
    #[serde(rename = "type")]
    pub kind: SearchKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Response body of `GET /api/v1/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    #[serde(rename = "type")]
    pub kind: SearchKind,
    pub results: Vec<SearchItem>,
    pub total: usize,
}

impl SearchResults {
    pub fn new(query: &SearchQuery, results: Vec<SearchItem>) -> Self {
        Self { query: query.q.clone(), kind: query.kind, total: results.len(), results }
    }
}

/// Catalog search collaborator.
///
/// Object-safe for use as `Arc<dyn MediaCatalog>`.
pub trait MediaCatalog: Send + Sync {
    fn search<'a>(
        &'a self,
        access_token: &'a str,
        query: &'a SearchQuery,
    ) -> BoxFuture<'a, Result<Vec<SearchItem>, ProviderError>>;
}

/// Spotify Web API search client.
pub struct SpotifyCatalog {
    http: reqwest::Client,
    search_url: Url,
}

impl SpotifyCatalog {
    pub fn new(api_url: &str) -> anyhow::Result<Self> {
        let search_url = Url::parse(&format!("{}/search", api_url.trim_end_matches('/')))?;
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { http, search_url })
    }
}

impl MediaCatalog for SpotifyCatalog {
    fn search<'a>(
        &'a self,
        access_token: &'a str,
        query: &'a SearchQuery,
    ) -> BoxFuture<'a, Result<Vec<SearchItem>, ProviderError>> {
        async move {
            let limit = query.limit.to_string();
            let resp = self
                .http
                .get(self.search_url.clone())
                .bearer_auth(access_token)
                .query(&[("q", query.q.as_str()), ("type", query.kind.as_str()), ("limit", &limit)])
                .send()
                .await
                .map_err(|e| ProviderError::Network(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(classify_failure(status, &text));
            }

            let body = resp
                .json::<SearchBody>()
                .await
                .map_err(|e| ProviderError::Network(format!("undecodable search response: {e}")))?;
            Ok(body.into_items(query.kind))
        }
        .boxed()
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchBody {
    tracks: Option<Page>,
    playlists: Option<Page>,
    albums: Option<Page>,
}

#[derive(Debug, Default, Deserialize)]
struct Page {
    // Playlist pages may carry nulls for items the caller cannot see.
    #[serde(default)]
    items: Vec<Option<RawItem>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawItem {
    id: String,
    name: String,
    uri: String,
    #[serde(default)]
    images: Vec<Image>,
    #[serde(default)]
    artists: Vec<Named>,
    album: Option<AlbumRef>,
    description: Option<String>,
    owner: Option<Owner>,
    tracks: Option<TrackCount>,
    total_tracks: Option<u64>,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumRef {
    name: String,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Owner {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackCount {
    total: u64,
}

impl SearchBody {
    pub(crate) fn into_items(self, kind: SearchKind) -> Vec<SearchItem> {
        let page = match kind {
            SearchKind::Track => self.tracks,
            SearchKind::Playlist => self.playlists,
            SearchKind::Album => self.albums,
        };
        page.map(|p| p.items)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .map(|raw| raw.into_item(kind))
            .collect()
    }
}

impl RawItem {
    fn into_item(self, kind: SearchKind) -> SearchItem {
        let image = self
            .images
            .first()
            .or_else(|| self.album.as_ref().and_then(|a| a.images.first()))
            .map(|i| i.url.clone());
        let artists = (!self.artists.is_empty())
            .then(|| self.artists.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join(", "));

        let (artist, album, description) = match kind {
            SearchKind::Track => (
                Some(artists.unwrap_or_else(|| "Unknown Artist".to_owned())),
                Some(self.album.map(|a| a.name).unwrap_or_else(|| "Unknown Album".to_owned())),
                None,
            ),
            SearchKind::Playlist => {
                let description = self.description.filter(|d| !d.is_empty()).or_else(|| {
                    self.tracks.map(|t| format!("{} tracks", t.total))
                });
                let owner = self.owner.and_then(|o| o.display_name);
                (Some(owner.unwrap_or_else(|| "Unknown Owner".to_owned())), None, description)
            }
            SearchKind::Album => {
                let year = self
                    .release_date
                    .as_deref()
                    .and_then(|d| d.split('-').next())
                    .filter(|y| !y.is_empty())
                    .unwrap_or("Unknown Year");
                let description = format!("{} tracks, {year}", self.total_tracks.unwrap_or(0));
                (Some(artists.unwrap_or_else(|| "Unknown Artist".to_owned())), None, Some(description))
            }
        };

        SearchItem { id: self.id, name: self.name, uri: self.uri, kind, image, artist, album, description }
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
