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

//! TCP-backed [`BlockServerApi`], the client half of [`crate::wire`].
//!
//! One persistent connection per server, request/response, no retries and
//! no timeout budget: spec §5 explicitly forbids hidden retries here, since
//! they would change the per-server counters the upper layers rely on to
//! decide whether to rebuild.

use crate::api::BlockServerApi;
use crate::error::{BlockServerError, Result};
use crate::wire::{read_message, write_message, Request, Response};
use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Mutex;

/// A connection to a remote `block_serverd` process.
pub struct RemoteBlockServer {
    addr: String,
    conn: Mutex<Option<(BufReader<TcpStream>, BufWriter<TcpStream>)>>,
}

impl RemoteBlockServer {
    /// Connects eagerly so construction fails fast if the server is down.
    pub fn connect<A: ToSocketAddrs + ToString>(addr: A) -> Result<Self> {
        let addr_str = addr.to_string();
        let stream = TcpStream::connect(addr)?;
        let reader = BufReader::new(stream.try_clone()?);
        let writer = BufWriter::new(stream);
        Ok(Self {
            addr: addr_str,
            conn: Mutex::new(Some((reader, writer))),
        })
    }

    fn roundtrip(&self, req: &Request) -> Result<Response> {
        let mut guard = self.conn.lock().unwrap();
        let (reader, writer) = guard.as_mut().ok_or_else(|| {
            BlockServerError::Protocol(format!("connection to {} already poisoned", self.addr))
        })?;
        write_message(writer, req)?;
        let resp: Option<Response> = read_message(reader)?;
        resp.ok_or_else(|| {
            BlockServerError::Protocol(format!("{} closed the connection", self.addr))
        })
    }
}

impl BlockServerApi for RemoteBlockServer {
    fn get(&self, b: u32) -> Result<Vec<u8>> {
        match self.roundtrip(&Request::Get { b })? {
            Response::Bytes(data) => Ok(data),
            Response::Error(e) => Err(BlockServerError::Protocol(e)),
            other => Err(BlockServerError::Protocol(format!("unexpected reply {other:?}"))),
        }
    }

    fn put(&self, b: u32, data: &[u8]) -> Result<()> {
        match self.roundtrip(&Request::Put {
            b,
            data: data.to_vec(),
        })? {
            Response::Ok => Ok(()),
            Response::Error(e) => Err(BlockServerError::Protocol(e)),
            other => Err(BlockServerError::Protocol(format!("unexpected reply {other:?}"))),
        }
    }

    fn get_checksum(&self, b: u32) -> Result<String> {
        match self.roundtrip(&Request::GetChecksum { b })? {
            Response::Checksum(c) => Ok(c),
            Response::Error(e) => Err(BlockServerError::Protocol(e)),
            other => Err(BlockServerError::Protocol(format!("unexpected reply {other:?}"))),
        }
    }

    fn put_checksum(&self, b: u32, checksum: &str) -> Result<()> {
        match self.roundtrip(&Request::PutChecksum {
            b,
            checksum: checksum.to_string(),
        })? {
            Response::Ok => Ok(()),
            Response::Error(e) => Err(BlockServerError::Protocol(e)),
            other => Err(BlockServerError::Protocol(format!("unexpected reply {other:?}"))),
        }
    }

    fn get_flag(&self) -> Result<bool> {
        match self.roundtrip(&Request::GetFlag)? {
            Response::Flag(f) => Ok(f),
            Response::Error(e) => Err(BlockServerError::Protocol(e)),
            other => Err(BlockServerError::Protocol(format!("unexpected reply {other:?}"))),
        }
    }

    fn set_flag(&self) -> Result<()> {
        match self.roundtrip(&Request::SetFlag)? {
            Response::Ok => Ok(()),
            Response::Error(e) => Err(BlockServerError::Protocol(e)),
            other => Err(BlockServerError::Protocol(format!("unexpected reply {other:?}"))),
        }
    }

    fn read_set_block(&self, b: u32, data: &[u8]) -> Result<Vec<u8>> {
        match self.roundtrip(&Request::ReadSetBlock {
            b,
            data: data.to_vec(),
        })? {
            Response::Bytes(prev) => Ok(prev),
            Response::Error(e) => Err(BlockServerError::Protocol(e)),
            other => Err(BlockServerError::Protocol(format!("unexpected reply {other:?}"))),
        }
    }
}
