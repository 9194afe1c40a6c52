// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

mod profile;
mod reader;

pub use profile::{
    Penalty, Profile, BICYCLE_PROFILE, BUS_PROFILE, CAR_PROFILE, FOOT_PROFILE,
    HIGHWAY_PROFILE, NON_MOTORROAD_HIGHWAY_PROFILE, RAILWAY_PROFILE, SKELETON_PROFILE,
    SUBWAY_PROFILE, TRAM_PROFILE,
};
pub use reader::{
    add_features_from_buffer, add_features_from_file, add_features_from_io, Error, FileFormat,
    Options,
};
