//! Shared test harness: music resources and storage contract tests
//!
//! Provides `Artist`, `Album` and `Song` resources (plus the `SongResponse`
//! wrapper) used across the integration tests, and the `storage_tests!`
//! macro that validates any `Storage<Album>` implementation.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//! use storage_harness::*;
//! ```

#![allow(dead_code)]

#[macro_use]
pub mod storage_tests;

use nestapi::prelude::*;

// ---------------------------------------------------------------------------
// Artist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    #[serde(flatten)]
    pub resource: DefaultResource,
    #[serde(default)]
    pub name: String,
}

impl Render for Artist {}

impl Resource for Artist {
    fn identity(&self) -> &DefaultResource {
        &self.resource
    }

    fn identity_mut(&mut self) -> &mut DefaultResource {
        &mut self.resource
    }

    fn patch(&mut self, partial: Self) -> ApiResult<()> {
        if !partial.name.is_empty() {
            self.name = partial.name;
        }
        Ok(())
    }
}

pub fn artist(name: &str) -> Artist {
    Artist {
        name: name.to_string(),
        ..Artist::default()
    }
}

// ---------------------------------------------------------------------------
// Album
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Album {
    #[serde(flatten)]
    pub resource: DefaultResource,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: u32,
}

impl Render for Album {}

impl Resource for Album {
    fn identity(&self) -> &DefaultResource {
        &self.resource
    }

    fn identity_mut(&mut self) -> &mut DefaultResource {
        &mut self.resource
    }

    fn bind(&mut self, ctx: &RequestContext) -> ApiResult<()> {
        if self.title.is_empty() && *ctx.method() != Method::PATCH {
            return Err(ApiError::invalid("missing required 'title' field"));
        }
        Ok(())
    }

    fn patch(&mut self, partial: Self) -> ApiResult<()> {
        if !partial.title.is_empty() {
            self.title = partial.title;
        }
        if partial.year != 0 {
            self.year = partial.year;
        }
        Ok(())
    }
}

pub fn album(title: &str, year: u32) -> Album {
    Album {
        title: title.to_string(),
        year,
        ..Album::default()
    }
}

/// Album with a fixed ID, ready to store directly
pub fn stored_album(id: &str, title: &str, year: u32) -> Album {
    Album {
        resource: DefaultResource::with_id(id),
        ..album(title, year)
    }
}

// ---------------------------------------------------------------------------
// Song and its response wrapper
// ---------------------------------------------------------------------------

/// Songs do not support PATCH
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Song {
    #[serde(flatten)]
    pub resource: DefaultResource,
    #[serde(default)]
    pub title: String,
}

impl Render for Song {}

impl Resource for Song {
    fn identity(&self) -> &DefaultResource {
        &self.resource
    }

    fn identity_mut(&mut self) -> &mut DefaultResource {
        &mut self.resource
    }
}

pub fn song(title: &str) -> Song {
    Song {
        title: title.to_string(),
        ..Song::default()
    }
}

/// Song as served: includes the title of the album it belongs to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongResponse {
    #[serde(flatten)]
    pub song: Song,
    #[serde(default)]
    pub album_title: String,
}

impl SongResponse {
    pub fn id(&self) -> &str {
        self.song.id()
    }
}

impl Render for SongResponse {}

/// `artists -> {albums -> songs}` with songs wrapped in `SongResponse`
pub fn music_api() -> Api<Artist> {
    let songs = Api::new("songs", "/songs", Song::default).set_response_wrapper(
        |song: Song, ctx: &RequestContext| SongResponse {
            album_title: ctx
                .resource::<Album>("albums")
                .map(|album| album.title.clone())
                .unwrap_or_default(),
            song,
        },
    );

    let albums = Api::new("albums", "/albums", Album::default)
        .nest(songs)
        .unwrap();

    Api::new("artists", "/artists", Artist::default)
        .nest(albums)
        .unwrap()
}
