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

//! A block server holds one shard of the logical disk (spec §4.1): a flat
//! array of fixed-size blocks, a parallel array of MD5 checksums, and a
//! one-shot init flag. This crate is the whole of component C1: the
//! in-process implementation ([`local::LocalBlockServer`]), the trait both
//! it and the network client implement ([`api::BlockServerApi`]), and the
//! wire format connecting the two ([`wire`], [`remote::RemoteBlockServer`]).

mod api;
mod error;
mod local;
mod remote;
mod wire;

pub use api::BlockServerApi;
pub use error::{BlockServerError, Result};
pub use local::LocalBlockServer;
pub use remote::RemoteBlockServer;
pub use wire::{read_message, write_message, Request, Response};

/// Applies `req` to `server` and produces the matching [`Response`],
/// turning any error into `Response::Error` instead of propagating it —
/// used by `block_serverd` so one malformed or failing request does not
/// take down the connection.
pub fn dispatch(server: &LocalBlockServer, req: Request) -> Response {
    let result = (|| -> Result<Response> {
        Ok(match req {
            Request::Get { b } => Response::Bytes(server.get(b)?),
            Request::Put { b, data } => {
                server.put(b, &data)?;
                Response::Ok
            }
            Request::GetChecksum { b } => Response::Checksum(server.get_checksum(b)?),
            Request::PutChecksum { b, checksum } => {
                server.put_checksum(b, &checksum)?;
                Response::Ok
            }
            Request::GetFlag => Response::Flag(server.get_flag()?),
            Request::SetFlag => {
                server.set_flag()?;
                Response::Ok
            }
            Request::ReadSetBlock { b, data } => {
                Response::Bytes(server.read_set_block(b, &data)?)
            }
        })
    })();
    result.unwrap_or_else(|e| Response::Error(e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dispatch_round_trips_put_then_get() {
        let server = LocalBlockServer::new(2, 4);
        assert!(matches!(
            dispatch(
                &server,
                Request::Put {
                    b: 0,
                    data: vec![1, 2, 3, 4]
                }
            ),
            Response::Ok
        ));
        assert!(matches!(
            dispatch(&server, Request::Get { b: 0 }),
            Response::Bytes(v) if v == vec![1, 2, 3, 4]
        ));
    }

    #[test]
    fn dispatch_handles_flag_and_checksum_requests() {
        let server = LocalBlockServer::new(1, 4);
        assert!(matches!(dispatch(&server, Request::GetFlag), Response::Flag(false)));
        assert!(matches!(dispatch(&server, Request::SetFlag), Response::Ok));
        assert!(matches!(dispatch(&server, Request::GetFlag), Response::Flag(true)));
        assert!(matches!(
            dispatch(&server, Request::GetChecksum { b: 0 }),
            Response::Checksum(_)
        ));
    }
}
