// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

mod error;
mod flat;
mod without_turn_around;

pub use error::{AStarError, DEFAULT_STEP_LIMIT};
pub use flat::find_route;
pub use without_turn_around::find_route_without_turn_around;
