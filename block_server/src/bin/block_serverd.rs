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

//! Standalone block-server process (component C1). One `LocalBlockServer`
//! behind the line-delimited JSON protocol in [`block_server::wire`],
//! one thread per connection.

use block_server::{dispatch, read_message, write_message, LocalBlockServer, Request};
use clap::Parser;
use log::{debug, info, warn};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

/// Holds one shard of the cluster's logical disk and answers the six
/// block-server RPCs over TCP.
#[derive(Parser, Debug)]
#[command(name = "block_serverd", version, about)]
struct Args {
    /// Address to listen on, e.g. `127.0.0.1:9000`.
    #[arg(long, default_value = "127.0.0.1:9000")]
    addr: String,

    /// Number of shard-blocks this server holds.
    #[arg(long, default_value_t = 128)]
    num_blocks: usize,

    /// Size in bytes of each block.
    #[arg(long, default_value_t = 128)]
    block_size: usize,

    /// If set, this shard-block index is born corrupt (fault injection,
    /// spec §4.1). Kept separate from the block index comparison bug the
    /// original had — see spec §9's "Open question — corruption
    /// injection": here the flag genuinely damages the block instead of
    /// silently doing nothing.
    #[arg(long)]
    damage_block: Option<usize>,
}

fn handle_connection(stream: TcpStream, server: Arc<LocalBlockServer>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());
    let reader_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!("failed to clone stream for {peer}: {e}");
            return;
        }
    };
    let mut reader = std::io::BufReader::new(reader_stream);
    let mut writer = std::io::BufWriter::new(stream);
    loop {
        let req: Option<Request> = match read_message(&mut reader) {
            Ok(r) => r,
            Err(e) => {
                warn!("{peer}: malformed request: {e}");
                break;
            }
        };
        let Some(req) = req else {
            debug!("{peer}: connection closed");
            break;
        };
        let resp = dispatch(&server, req);
        if let Err(e) = write_message(&mut writer, &resp) {
            warn!("{peer}: failed to reply: {e}");
            break;
        }
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let server = Arc::new(LocalBlockServer::with_damaged_block(
        args.num_blocks,
        args.block_size,
        args.damage_block,
    ));
    let listener = TcpListener::bind(&args.addr).expect("failed to bind block server address");
    info!(
        "block_serverd listening on {} ({} blocks x {} bytes, damaged={:?})",
        args.addr, args.num_blocks, args.block_size, args.damage_block
    );
    for incoming in listener.incoming() {
        match incoming {
            Ok(stream) => {
                let server = Arc::clone(&server);
                std::thread::spawn(move || handle_connection(stream, server));
            }
            Err(e) => warn!("accept failed: {e}"),
        }
    }
}
