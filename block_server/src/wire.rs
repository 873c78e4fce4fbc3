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

//! Wire format for the block-server RPC (spec §6).
//!
//! Transport choice is explicitly out of scope for this core (spec §1), so
//! the format here is deliberately the simplest thing that satisfies the
//! six procedures: one JSON value per line over a TCP stream, one
//! request in, one response out, no pipelining.

use crate::error::{BlockServerError, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

/// One of the six RPCs in spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    Get { b: u32 },
    Put { b: u32, data: Vec<u8> },
    GetChecksum { b: u32 },
    PutChecksum { b: u32, checksum: String },
    GetFlag,
    SetFlag,
    ReadSetBlock { b: u32, data: Vec<u8> },
}

/// Reply to a [`Request`]. `Error` carries a message rather than unwinding
/// the connection, so a single bad request does not tear down the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Bytes(Vec<u8>),
    Checksum(String),
    Flag(bool),
    Ok,
    Error(String),
}

/// Writes `msg` as one JSON line, per the framing this module defines.
pub fn write_message<T: Serialize, W: Write>(w: &mut W, msg: &T) -> Result<()> {
    let mut line = serde_json::to_vec(msg)?;
    line.push(b'\n');
    w.write_all(&line)?;
    w.flush()?;
    Ok(())
}

/// Reads one JSON line and decodes it as `T`. Returns `Ok(None)` on a
/// clean EOF (the peer closed the connection between requests).
pub fn read_message<T: for<'de> Deserialize<'de>, R: BufRead>(r: &mut R) -> Result<Option<T>> {
    let mut line = String::new();
    let n = r.read_line(&mut line)?;
    if n == 0 {
        return Ok(None);
    }
    let value = serde_json::from_str(line.trim_end()).map_err(BlockServerError::from)?;
    Ok(Some(value))
}
