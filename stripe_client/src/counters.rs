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

//! Per-server `puts`/`gets` counters (spec §4.2's observability note,
//! supplemented per SPEC_FULL §11 with a `Display` mirroring the
//! original's `RSM_PrintBlockStoreCounters`).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// One counter pair per server, indexed the same way as the server list.
pub struct Counters {
    puts: Vec<AtomicU64>,
    gets: Vec<AtomicU64>,
}

impl Counters {
    pub fn new(num_servers: usize) -> Self {
        Self {
            puts: (0..num_servers).map(|_| AtomicU64::new(0)).collect(),
            gets: (0..num_servers).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub(crate) fn record_get(&self, server: u32) {
        self.gets[server as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_put(&self, server: u32) {
        self.puts[server as usize].fetch_add(1, Ordering::Relaxed);
    }

    /// Number of `get`s counted against `server` (rebuild fetches excluded).
    pub fn gets(&self, server: u32) -> u64 {
        self.gets[server as usize].load(Ordering::Relaxed)
    }

    /// Number of `put`s counted against `server`.
    pub fn puts(&self, server: u32) -> u64 {
        self.puts[server as usize].load(Ordering::Relaxed)
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "server  puts  gets")?;
        for i in 0..self.puts.len() {
            writeln!(f, "{i:>6}  {:>4}  {:>4}", self.puts(i as u32), self.gets(i as u32))?;
        }
        Ok(())
    }
}
