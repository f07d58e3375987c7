// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    env,
    path::{Path, PathBuf},
};

use serde::Deserialize;

/// A YAML representation of the recording configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Recording {
    /// Where captures are written. Defaults to the system temp directory.
    directory: Option<PathBuf>,
}

impl Recording {
    pub fn new(directory: &Path) -> Recording {
        Recording {
            directory: Some(directory.to_path_buf()),
        }
    }

    pub fn directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(env::temp_dir)
    }
}
