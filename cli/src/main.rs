#![warn(clippy::nursery, clippy::pedantic)]
#![deny(unsafe_code)]

// PasteGate CLI Client
// Copyright (C) 2021  Edward Shen
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use pastegate_common::client::{Event, HttpService, Session};
use pastegate_common::draft::PasteDraft;
use pastegate_common::{id_from_input, Url, ViewerRoute, DEFAULT_API_URL, DEFAULT_VIEWER_PREFIX};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::render::{render_state, with_spinner};

mod render;

#[derive(Parser)]
struct Opts {
    /// Base URL of the paste service API.
    #[clap(long, env = "PASTEGATE_API", default_value = DEFAULT_API_URL)]
    api: Url,
    /// Origin used for shareable viewer links. Without it, links point at
    /// the viewer served next to the API.
    #[clap(long, env = "PASTEGATE_ORIGIN")]
    origin: Option<Url>,
    /// Path prefix of viewer links.
    #[clap(long, default_value = DEFAULT_VIEWER_PREFIX)]
    prefix: String,
    #[clap(subcommand)]
    action: Action,
}

#[derive(Parser)]
enum Action {
    /// Create a paste from a file, or from stdin if no file is given.
    Create {
        /// Seconds until the paste expires.
        #[clap(short, long)]
        ttl: Option<String>,
        /// Number of times the paste may be viewed.
        #[clap(short, long)]
        max_views: Option<String>,
        path: Option<PathBuf>,
    },
    /// View a paste. Viewing spends one of its views, so it must be confirmed.
    View {
        /// The paste identifier, or a viewer link.
        id: String,
    },
    /// Follow a viewer link, spending a view without further confirmation.
    Open { link: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();

    let route = match opts.origin {
        Some(origin) => ViewerRoute::new(origin, &opts.prefix)?,
        None => ViewerRoute::beside_api(&opts.api, &opts.prefix)?,
    };
    debug!(api = %opts.api, viewer = %route.link(""), "Using paste service");
    let service = HttpService::new(opts.api)?;
    let session = Session::new(service, route);

    match opts.action {
        Action::Create {
            ttl,
            max_views,
            path,
        } => handle_create(session, ttl, max_views, path).await,
        Action::View { id } => handle_view(session, id).await,
        Action::Open { link } => handle_open(session, &link).await,
    }?;

    Ok(())
}

async fn handle_create(
    mut session: Session<HttpService>,
    ttl: Option<String>,
    max_views: Option<String>,
    path: Option<PathBuf>,
) -> Result<()> {
    let content = if let Some(path) = path {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    } else {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read paste from stdin")?;
        buffer
    };

    let draft = PasteDraft {
        content,
        ttl_seconds: ttl,
        max_views,
    };

    let handle = with_spinner("Creating paste", session.submit(&draft)).await?;

    println!("{}", handle.url);

    if let Some(remaining) = session.estimate(&handle.id) {
        eprintln!("This paste can be viewed {}.", render::times(remaining));
    }

    Ok(())
}

async fn handle_view(mut session: Session<HttpService>, input: String) -> Result<()> {
    let id = id_from_input(&input).ok_or_else(|| anyhow!("No paste identifier in {:?}", input))?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut event = Event::Request(id.clone());
    loop {
        let state = if matches!(&event, Event::Request(_)) && session.is_armed_for(&id) {
            with_spinner("Fetching paste", session.handle(event)).await.clone()
        } else {
            session.handle(event).await.clone()
        };

        if render_state(&state, session.estimate(&id))? {
            return Ok(());
        }

        event = tokio::select! {
            line = lines.next_line() => match line.context("Failed to read from stdin")? {
                Some(_) => Event::Request(id.clone()),
                None => bail!("Stopped before the paste was viewed"),
            },
            Some(event) = session.next_event() => event,
        };
    }
}

async fn handle_open(mut session: Session<HttpService>, link: &str) -> Result<()> {
    let id = id_from_input(link).ok_or_else(|| anyhow!("No paste identifier in {:?}", link))?;
    let state = with_spinner("Fetching paste", session.follow_link(&id))
        .await
        .cloned()
        .ok_or_else(|| anyhow!("No paste identifier in {:?}", link))?;

    render_state(&state, session.estimate(&id))?;
    Ok(())
}
