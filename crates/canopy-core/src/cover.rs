//! Cover classes and foliage projective cover (FPC).

use serde::Serialize;

use crate::raster::Raster;

/// Vegetation cover classes produced by the classifier. `0` is background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CoverClass {
    WoodyGreen = 1,
    NonWoodyGreen = 2,
    BareNpv = 3,
    Shadow = 4,
    BranchTrunk = 5,
}

impl CoverClass {
    pub const ALL: [CoverClass; 5] = [
        CoverClass::WoodyGreen,
        CoverClass::NonWoodyGreen,
        CoverClass::BareNpv,
        CoverClass::Shadow,
        CoverClass::BranchTrunk,
    ];

    pub fn label(self) -> u8 {
        self as u8
    }

    pub fn from_label(label: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }

    pub fn name(self) -> &'static str {
        match self {
            CoverClass::WoodyGreen => "woody green",
            CoverClass::NonWoodyGreen => "non-woody green",
            CoverClass::BareNpv => "bare / non-photosynthetic",
            CoverClass::Shadow => "shadow",
            CoverClass::BranchTrunk => "branch / trunk",
        }
    }
}

/// One row of the results table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FpcRecord {
    pub site: String,
    pub fpc: f64,
}

/// Percentage of non-background pixels in band 0 labelled woody green.
/// A raster with no labelled pixels has FPC 0.
pub fn foliage_projective_cover(classified: &Raster) -> f64 {
    let (mut valid, mut woody) = (0usize, 0usize);
    for &v in classified.band(0) {
        if v != 0.0 {
            valid += 1;
            if v == CoverClass::WoodyGreen.label() as f32 {
                woody += 1;
            }
        }
    }
    if valid == 0 {
        return 0.0;
    }
    woody as f64 / valid as f64 * 100.0
}
