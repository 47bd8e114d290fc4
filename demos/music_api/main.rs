//! Music catalog example
//!
//! Serves `artists -> albums -> songs`, then drives it with the typed client:
//! - Every album and song URL is scoped by its parents
//! - Songs are answered with the title of their album attached
//! - `GET /artists?name=...` filters artists by name
//!
//! Run with `cargo run --example music_api`; `NESTAPI_ADDRESS` picks the port.

use anyhow::Result;
use nestapi::prelude::*;
use nestapi::server::init_tracing;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Artist {
    #[serde(flatten)]
    resource: DefaultResource,
    #[serde(default)]
    name: String,
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

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Album {
    #[serde(flatten)]
    resource: DefaultResource,
    #[serde(default)]
    title: String,
}

impl Render for Album {}

impl Resource for Album {
    fn identity(&self) -> &DefaultResource {
        &self.resource
    }

    fn identity_mut(&mut self) -> &mut DefaultResource {
        &mut self.resource
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Song {
    #[serde(flatten)]
    resource: DefaultResource,
    #[serde(default)]
    title: String,
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

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SongResponse {
    #[serde(flatten)]
    song: Song,
    #[serde(default)]
    album_title: String,
}

impl Render for SongResponse {}

fn music_api() -> Result<Api<Artist>> {
    let songs = Api::new("songs", "/songs", Song::default).set_response_wrapper(
        |song: Song, ctx: &RequestContext| SongResponse {
            album_title: ctx
                .resource::<Album>("albums")
                .map(|album| album.title.clone())
                .unwrap_or_default(),
            song,
        },
    );

    let albums = Api::new("albums", "/albums", Album::default).nest(songs)?;

    let artists = Api::new("artists", "/artists", Artist::default)
        .set_get_all_filter(|ctx: &RequestContext| {
            let name = ctx.query("name").map(str::to_string);
            Ok(move |artist: &Artist| name.as_deref().is_none_or(|n| artist.name == n))
        })
        .nest(albums)?;

    Ok(artists)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info,nestapi=debug");

    let api = music_api()?;
    let config = ServerConfig {
        address: "127.0.0.1:0".to_string(),
        ..ServerConfig::default()
    }
    .with_env_overrides()?;

    let handle = Server::new(&api)?.with_config(config).spawn().await?;
    tracing::info!(url = %handle.url(), "music API listening");

    let artists = api.client(&handle.url());
    let albums = artists.sub_client::<Album>("/albums");
    let songs = albums.sub_client::<SongResponse>("/songs");

    let artist = artists
        .post(
            &Artist {
                name: "Artist1".to_string(),
                ..Artist::default()
            },
            &[],
        )
        .await?;
    let album = albums
        .post(
            &Album {
                title: "Album1".to_string(),
                ..Album::default()
            },
            &[artist.id()],
        )
        .await?;
    let song = songs
        .post(
            &SongResponse {
                song: Song {
                    title: "Song1".to_string(),
                    ..Song::default()
                },
                ..SongResponse::default()
            },
            &[artist.id(), album.id()],
        )
        .await?;
    tracing::info!(
        song = %song.song.title,
        album = %song.album_title,
        "created song"
    );

    let found = artists.get_all(&[("name", "Artist1")], &[]).await?;
    tracing::info!(count = found.items.len(), "artists named Artist1");

    if let Err(err) = albums.get("missing", &[artist.id()]).await {
        tracing::info!(%err, "lookup of a missing album failed as expected");
    }

    handle.stop().await
}
