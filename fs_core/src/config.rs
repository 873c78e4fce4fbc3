/*
 * Copyright 2024 Luc Lenôtre
 *
 * This file is part of Maestro.
 *
 * Maestro is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Maestro is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Maestro. If not, see <https://www.gnu.org/licenses/>.
 */

//! Runtime cluster configuration.
//!
//! A cluster's server list, instance UUID and block-layout constants are
//! all runtime values rather than anything compiled in, so loading one is
//! just `serde` + `toml` over an ordinary `std::fs::read_to_string` +
//! `toml::from_str` call.

use crate::layout::DiskLayout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Default path a deployment's config file is expected at.
pub const DEFAULT_PATH: &str = "cluster.toml";

/// Everything a client needs to attach to a running cluster: where the
/// block servers are, the instance UUID stamped into block 0 at
/// bootstrap, and the four layout constants the superblock is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// `host:port` of each block server, in server-index order.
    pub servers: Vec<String>,
    /// Instance UUID, as 4 bytes.
    pub uuid: [u8; 4],
    /// The four on-disk layout constants.
    #[serde(flatten)]
    pub layout: DiskLayout,
}

impl ClusterConfig {
    /// Reads and parses a config file from disk.
    pub fn read(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Serializes this config back to TOML text, for tests and for a
    /// `dfs-init` invocation that wants to persist the config it just
    /// bootstrapped with.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("ClusterConfig always serializes")
    }
}
