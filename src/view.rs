//! View-model projection. A pure function of player state; renderers consume
//! the result and hold no business rules of their own.

use serde::Serialize;

use crate::channels::{ChannelFilter, StatusCounts, StatusFilter};
use crate::models::{Channel, Theme};
use crate::playback::NowPlaying;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelRow {
    pub name: String,
    pub url: String,
    pub logo: String,
    /// Empty while the status is unknown
    pub status: &'static str,
    pub favorite: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupView {
    pub name: String,
    pub channels: Vec<ChannelRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusBar {
    pub counts: StatusCounts,
    pub filter: StatusFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowPlayingView {
    pub name: String,
    pub logo: Option<String>,
    pub quality: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub index: usize,
    pub source: String,
    pub timestamp: String,
    /// URL sources can be reloaded; files must be supplied again
    pub reloadable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewModel {
    pub groups: Vec<GroupView>,
    pub status_bar: StatusBar,
    pub now_playing: Option<NowPlayingView>,
    pub notification: Option<String>,
    pub theme: Theme,
}

pub fn project(state: &AppState, playing: Option<&NowPlaying>, filter: &ChannelFilter) -> ViewModel {
    let selected_url = playing.map(|p| p.url.as_str());

    let groups = state
        .filtered_view(filter)
        .into_iter()
        .map(|group| GroupView {
            name: group.name.to_string(),
            channels: group
                .channels
                .into_iter()
                .map(|c| channel_row(c, selected_url))
                .collect(),
        })
        .collect();

    ViewModel {
        groups,
        status_bar: StatusBar {
            counts: state.counts(),
            filter: filter.status,
        },
        now_playing: playing.map(|p| NowPlayingView {
            name: p.name.clone(),
            logo: Some(p.logo.clone()).filter(|l| !l.is_empty()),
            quality: p.quality.label(),
        }),
        notification: state.notifier().current().map(str::to_string),
        theme: state.theme(),
    }
}

fn channel_row(channel: &Channel, selected_url: Option<&str>) -> ChannelRow {
    ChannelRow {
        name: channel.name.clone(),
        url: channel.url.clone(),
        logo: channel.display_logo().to_string(),
        status: channel.status.label(),
        favorite: channel.favorite,
        selected: selected_url == Some(channel.url.as_str()),
    }
}

pub fn project_history(state: &AppState) -> Vec<HistoryRow> {
    state
        .uploads()
        .iter()
        .enumerate()
        .map(|(index, entry)| HistoryRow {
            index,
            source: entry.source.clone(),
            timestamp: entry.timestamp.clone(),
            reloadable: entry.is_remote(),
        })
        .collect()
}
