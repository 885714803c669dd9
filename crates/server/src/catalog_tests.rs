// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use super::{InvalidSearch, SearchBody, SearchKind, SearchQuery};

#[yare::parameterized(
    defaults_limit   = { Some("daft punk"), Some("track"),    None,      Some((SearchKind::Track, 20)) },
    clamps_high      = { Some("daft punk"), Some("album"),    Some(500), Some((SearchKind::Album, 50)) },
    clamps_zero      = { Some("daft punk"), Some("playlist"), Some(0),   Some((SearchKind::Playlist, 1)) },
    blank_query      = { Some("   "),       Some("track"),    None,      None },
    missing_query    = { None,              Some("track"),    None,      None },
    unknown_type     = { Some("daft punk"), Some("artist"),   None,      None },
    missing_type     = { Some("daft punk"), None,             None,      None },
)]
fn query_validation(q: Option<&str>, kind: Option<&str>, limit: Option<u32>, want: Option<(SearchKind, u32)>) {
    let got = SearchQuery::parse(q, kind, limit).ok().map(|s| (s.kind, s.limit));
    assert_eq!(got, want);
}

#[test]
fn query_is_trimmed() {
    let parsed = SearchQuery::parse(Some("  around the world "), Some("track"), None);
    assert_eq!(parsed.map(|s| s.q), Ok("around the world".to_owned()));
}

#[test]
fn empty_query_is_reported_before_type() {
    assert_eq!(SearchQuery::parse(Some(""), Some("artist"), None), Err(InvalidSearch::EmptyQuery));
}

fn body(value: serde_json::Value) -> anyhow::Result<SearchBody> {
    Ok(serde_json::from_value(value)?)
}

#[test]
fn tracks_join_artists_and_fall_back_to_album_art() -> anyhow::Result<()> {
    let items = body(json!({
        "tracks": {"items": [{
            "id": "t1",
            "name": "One More Time",
            "uri": "spotify:track:t1",
            "artists": [{"name": "Daft Punk"}, {"name": "Romanthony"}],
            "album": {"name": "Discovery", "images": [{"url": "https://i.scdn.co/image/disc"}]}
        }], "total": 1}
    }))?
    .into_items(SearchKind::Track);

    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.kind, SearchKind::Track);
    assert_eq!(item.artist.as_deref(), Some("Daft Punk, Romanthony"));
    assert_eq!(item.album.as_deref(), Some("Discovery"));
    assert_eq!(item.image.as_deref(), Some("https://i.scdn.co/image/disc"));
    assert_eq!(item.description, None);
    Ok(())
}

#[test]
fn playlists_skip_hidden_items_and_describe_track_count() -> anyhow::Result<()> {
    let items = body(json!({
        "playlists": {"items": [
            null,
            {
                "id": "p1",
                "name": "Focus",
                "uri": "spotify:playlist:p1",
                "description": "",
                "owner": {"display_name": "spotify"},
                "tracks": {"total": 42},
                "images": [{"url": "https://i.scdn.co/image/focus"}]
            }
        ]}
    }))?
    .into_items(SearchKind::Playlist);

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].artist.as_deref(), Some("spotify"));
    assert_eq!(items[0].description.as_deref(), Some("42 tracks"));
    assert_eq!(items[0].image.as_deref(), Some("https://i.scdn.co/image/focus"));
    Ok(())
}

#[test]
fn albums_describe_tracks_and_release_year() -> anyhow::Result<()> {
    let items = body(json!({
        "albums": {"items": [
            {"id": "a1", "name": "Discovery", "uri": "spotify:album:a1",
             "artists": [{"name": "Daft Punk"}], "total_tracks": 14, "release_date": "2001-03-12"},
            {"id": "a2", "name": "Untitled", "uri": "spotify:album:a2"}
        ]}
    }))?
    .into_items(SearchKind::Album);

    let described: Vec<_> = items.iter().map(|i| (i.artist.as_deref(), i.description.as_deref())).collect();
    assert_eq!(
        described,
        vec![
            (Some("Daft Punk"), Some("14 tracks, 2001")),
            (Some("Unknown Artist"), Some("0 tracks, Unknown Year")),
        ]
    );
    Ok(())
}

#[test]
fn missing_page_yields_no_items() -> anyhow::Result<()> {
    let items = body(json!({"tracks": {"items": []}}))?.into_items(SearchKind::Album);
    assert!(items.is_empty());
    Ok(())
}

#[test]
fn results_serialize_type_field() -> anyhow::Result<()> {
    let query = SearchQuery::parse(Some("focus"), Some("playlist"), None)?;
    let results = super::SearchResults::new(&query, Vec::new());
    let value = serde_json::to_value(&results)?;
    assert_eq!(value, json!({"query": "focus", "type": "playlist", "results": [], "total": 0}));
    Ok(())
}
