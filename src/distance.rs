// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

/// Mean radius of Earth, in metres.
/// Source: https://en.wikipedia.org/wiki/Earth_radius#Arithmetic_mean_radius
const EARTH_RADIUS: f64 = 6371008.8;

/// Mean diameter of Earth, in metres.
/// Source: https://en.wikipedia.org/wiki/Earth_radius#Arithmetic_mean_radius
const EARTH_DIAMETER: f64 = EARTH_RADIUS + EARTH_RADIUS;

/// Calculates the great-circle distance between two lat-lon positions
/// on Earth using the [haversine formula](https://en.wikipedia.org/wiki/Haversine_formula).
/// Returns the result in metres.
pub fn earth_distance(lat1: f32, lon1: f32, lat2: f32, lon2: f32) -> f32 {
    let lat1 = (lat1 as f64).to_radians();
    let lon1 = (lon1 as f64).to_radians();
    let lat2 = (lat2 as f64).to_radians();
    let lon2 = (lon2 as f64).to_radians();

    let sin_dlat_half = ((lat2 - lat1) * 0.5).sin();
    let sin_dlon_half = ((lon2 - lon1) * 0.5).sin();

    let h = sin_dlat_half * sin_dlat_half + lat1.cos() * lat2.cos() * sin_dlon_half * sin_dlon_half;

    (EARTH_DIAMETER * h.sqrt().asin()) as f32
}

/// Euclidean distance between two lat-lon positions, treating degrees as a flat
/// plane. Only useful for ordering candidates against each other (e.g. as a
/// pruning bound in [KDTree](crate::KDTree)) — never as a real-world distance,
/// since a degree of longitude shrinks towards the poles.
pub fn euclidean_distance(lat1: f32, lon1: f32, lat2: f32, lon2: f32) -> f32 {
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    (dlat * dlat + dlon * dlon).sqrt()
}

/// Taxicab (Manhattan) distance between two lat-lon positions, in degrees.
pub fn taxicab_distance(lat1: f32, lon1: f32, lat2: f32, lon2: f32) -> f32 {
    (lat2 - lat1).abs() + (lon2 - lon1).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTRUM: (f32, f32) = (52.23024, 21.01062);
    const STADION: (f32, f32) = (52.23852, 21.0446);
    const FALENICA: (f32, f32) = (52.16125, 21.21147);

    #[test]
    fn centrum_stadion() {
        let d = earth_distance(CENTRUM.0, CENTRUM.1, STADION.0, STADION.1);
        assert_eq!(d, 2490.49);
    }

    #[test]
    fn centrum_falenica() {
        let d = earth_distance(CENTRUM.0, CENTRUM.1, FALENICA.0, FALENICA.1);
        assert_eq!(d, 15692.482);
    }

    #[test]
    fn euclidean_is_pythagorean() {
        assert_eq!(euclidean_distance(0.0, 0.0, 3.0, 4.0), 5.0);
        assert_eq!(euclidean_distance(1.0, 1.0, 1.0, 1.0), 0.0);
    }

    #[test]
    fn taxicab_sums_absolute_deltas() {
        assert_eq!(taxicab_distance(0.0, 0.0, 3.0, -4.0), 7.0);
        assert_eq!(taxicab_distance(1.0, 1.0, 1.0, 1.0), 0.0);
    }
}
