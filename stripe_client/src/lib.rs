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

//! Component C2: maps a logical block number onto an (N-1)-data + 1-parity
//! stripe across `N` [`block_server::BlockServerApi`] handles, with
//! MD5-verified reads, XOR rebuild-on-mismatch, and read-modify-write
//! parity updates on writes (spec §4.2).

mod client;
mod counters;
mod mapping;

pub use block_server::{BlockServerApi, BlockServerError, Result};
pub use client::{DumpError, StripeClient};
pub use counters::Counters;
pub use mapping::{data_server, parity_server, parity_server_for_shard, row, shard_index};
