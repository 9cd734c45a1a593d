// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;

use time::OffsetDateTime;
use time::macros::format_description;

/// Timestamp layout used throughout the state document and operator output.
pub const STAMP_LAYOUT: &'static [time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

pub fn now_stamp() -> String {
    OffsetDateTime::now_utc()
        .format(STAMP_LAYOUT)
        .unwrap_or_else(|_| "1970-01-01 00:00:00".into())
}

pub fn current_user() -> String {
    whoami::username()
}

pub fn current_host() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".into())
}

/// Snapshot of the invoking environment, captured once per command.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub user: String,
    pub host: String,
    pub dir: PathBuf,
    pub time: String,
}

impl Invocation {
    pub fn capture() -> Self {
        Self {
            user: current_user(),
            host: current_host(),
            dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            time: now_stamp(),
        }
    }
}
