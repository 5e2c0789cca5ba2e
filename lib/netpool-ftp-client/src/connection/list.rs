/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use crate::transfer::FtpLineDataReceiver;

/// Entry names from `NLST`.
#[derive(Default)]
pub(super) struct NameList {
    names: Vec<String>,
}

impl NameList {
    pub(super) fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub(super) fn into_names(self) -> Vec<String> {
        self.names
    }
}

impl FtpLineDataReceiver for NameList {
    fn recv_line(&mut self, line: &str) {
        // some servers reply with the full path of each entry
        let name = line.rsplit('/').next().unwrap_or(line);
        if !matches!(name, "" | "." | "..") {
            self.names.push(name.to_string());
        }
    }
}

/// Entry types from a unix style `LIST`. Lines in other formats are skipped.
#[derive(Default)]
pub(super) struct DirectoryList {
    entries: Vec<(String, bool)>,
}

impl DirectoryList {
    pub(super) fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(name, is_dir)| (name.as_str(), *is_dir))
    }
}

/// Split off the 8 leading fields of a `ls -l` line and return the type
/// character and the name.
fn parse_unix_line(line: &str) -> Option<(char, &str)> {
    let type_char = line.chars().next()?;
    let mut rest = line;
    for _ in 0..8 {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace)?;
        rest = &rest[end..];
    }
    let name = rest.trim_start();
    if name.is_empty() {
        None
    } else {
        Some((type_char, name))
    }
}

impl FtpLineDataReceiver for DirectoryList {
    fn recv_line(&mut self, line: &str) {
        let Some((type_char, name)) = parse_unix_line(line) else {
            return;
        };
        let is_dir = match type_char {
            'd' => true,
            '-' => false,
            // links and devices say nothing about the target
            _ => return,
        };
        if !matches!(name, "." | "..") {
            self.entries.push((name.to_string(), is_dir));
        }
    }
}
