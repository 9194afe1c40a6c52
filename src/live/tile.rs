// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Slippy-map tile math (Web Mercator, <https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames>).

use std::f64::consts::PI;

/// Converts a position into the `(x, y)` tile coordinates containing it at zoom `z`.
pub(super) fn position_to_tile(lat: f64, lon: f64, z: u8) -> (u32, u32) {
    let n = 2f64.powi(z as i32);
    let x = ((lon + 180.0) / 360.0 * n).floor().clamp(0.0, n - 1.0) as u32;
    let lat_rad = lat.to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n)
        .floor()
        .clamp(0.0, n - 1.0) as u32;
    (x, y)
}

fn tile_x_to_lon(x: i64, z: u8) -> f64 {
    let n = 2f64.powi(z as i32);
    x as f64 / n * 360.0 - 180.0
}

fn tile_y_to_lat(y: i64, z: u8) -> f64 {
    let n = 2f64.powi(z as i32);
    let unit = 1.0 - 2.0 * y as f64 / n;
    (unit * PI).sinh().atan().to_degrees()
}

/// Returns the `(left, bottom, right, top)` bounding box of a tile, in degrees.
pub(super) fn tile_bbox(x: u32, y: u32, z: u8) -> (f64, f64, f64, f64) {
    let left = tile_x_to_lon(x as i64, z);
    let right = tile_x_to_lon(x as i64 + 1, z);
    let top = tile_y_to_lat(y as i64, z);
    let bottom = tile_y_to_lat(y as i64 + 1, z);
    (left, bottom, right, top)
}

/// Returns the tile itself plus its 8 neighbours, clamped at the poles and
/// wrapping around the antimeridian.
pub(super) fn neighbour_ring(x: u32, y: u32, z: u8) -> Vec<(u32, u32)> {
    let n = 1i64 << z;
    let mut ring = Vec::with_capacity(9);

    for dy in -1..=1i64 {
        let ny = y as i64 + dy;
        if ny < 0 || ny >= n {
            continue;
        }
        for dx in -1..=1i64 {
            let nx = (x as i64 + dx).rem_euclid(n);
            ring.push((nx as u32, ny as u32));
        }
    }

    ring
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_to_tile_picks_the_right_quadrant() {
        // Northeast quadrant at zoom 1 is tile (1, 0).
        assert_eq!(position_to_tile(45.0, 90.0, 1), (1, 0));
        // Southwest quadrant at zoom 1 is tile (0, 1).
        assert_eq!(position_to_tile(-45.0, -90.0, 1), (0, 1));
    }

    #[test]
    fn tile_bbox_round_trips_through_position_to_tile() {
        let (x, y) = position_to_tile(52.2297, 21.0122, 15);
        let (left, bottom, right, top) = tile_bbox(x, y, 15);
        assert!(left <= 21.0122 && 21.0122 <= right);
        assert!(bottom <= 52.2297 && 52.2297 <= top);
    }

    #[test]
    fn neighbour_ring_has_nine_tiles_away_from_edges() {
        let ring = neighbour_ring(100, 100, 10);
        assert_eq!(ring.len(), 9);
        assert!(ring.contains(&(100, 100)));
    }

    #[test]
    fn neighbour_ring_wraps_antimeridian() {
        let n = 1u32 << 10;
        let ring = neighbour_ring(0, 100, 10);
        assert!(ring.contains(&(n - 1, 100)), "must wrap to the last column");
    }

    #[test]
    fn neighbour_ring_clamps_at_poles() {
        let ring = neighbour_ring(0, 0, 3);
        assert!(ring.iter().all(|&(_, y)| y < (1 << 3)));
        assert!(!ring.iter().any(|&(_, y)| y as i64 == -1));
    }
}
