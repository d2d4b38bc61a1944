// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Config Image
//!
//! Each core is handed the base address of its image in SDRAM. The image starts with a region
//! table from which every other structure is located:
//!
//! ```text
//! word 0        magic 0xAD130AD6
//! word 1 + i    byte offset of region i from the image base (0 = region absent)
//! ```
//!
//! A region extends to the start of the next region or to the end of the image; of two regions
//! sharing an offset the lower-numbered one is empty. Region 0 is
//! always the system region `[timerPeriodMicros, simulationTicks, appWord...]`.

use crate::error::{Result, RuntimeError};
use core::fmt::Debug;
use core::marker::PhantomData;
use neurocore_hal::{MemoryRegion, Sdram};
use tracing::debug;

/// Word 0 of every image
pub const IMAGE_MAGIC: u32 = 0xAD13_0AD6;

/// Region index type of one role's image
pub trait RegionId: Copy + Debug + PartialEq + 'static {
    /// Every region in table order
    const ALL: &'static [Self];
    const COUNT: usize = Self::ALL.len();

    fn index(self) -> usize;

    fn name(self) -> &'static str;
}

/// Define a role's region table as an enum implementing [`RegionId`]
#[macro_export]
macro_rules! define_region_table {
    (
        $(#[$meta:meta])*
        $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $index:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                $variant = $index,
            )*
        }

        impl $crate::config::RegionId for $name {
            const ALL: &'static [Self] = &[$($name::$variant),*];

            fn index(self) -> usize {
                self as usize
            }

            fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)*
                }
            }
        }
    };
}

/// Placement of an image in SDRAM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageLocation {
    pub base: u32,
    pub len_bytes: u32,
}

impl ImageLocation {
    pub fn end(&self) -> u32 {
        self.base + self.len_bytes
    }
}

/// Fail with `RegionTooShort` unless `region` holds `needed` words
pub fn ensure_len(region: &MemoryRegion, name: &'static str, needed: u32) -> Result<()> {
    if region.len_words() < needed {
        return Err(RuntimeError::RegionTooShort {
            region: name,
            needed,
            available: region.len_words(),
        });
    }
    Ok(())
}

/// Parsed region table of one role image
#[derive(Debug, Clone)]
pub struct ConfigImage<R: RegionId> {
    location: ImageLocation,
    regions: Vec<Option<MemoryRegion>>,
    _marker: PhantomData<R>,
}

impl<R: RegionId> ConfigImage<R> {
    /// Validate the header and resolve every region's extent
    pub fn parse(sdram: &Sdram, location: ImageLocation) -> Result<Self> {
        let header_words = 1 + R::COUNT as u32;
        let image = sdram.region(location.base, location.len_bytes)?;
        ensure_len(&image, "header", header_words)?;

        let magic = image.read(0)?;
        if magic != IMAGE_MAGIC {
            return Err(RuntimeError::ConfigHeaderInvalid {
                found: magic,
                expected: IMAGE_MAGIC,
            });
        }

        let mut offsets = vec![0u32; R::COUNT];
        image.read_slice(1, &mut offsets)?;

        let mut regions = Vec::with_capacity(R::COUNT);
        for (i, (id, &offset)) in R::ALL.iter().zip(&offsets).enumerate() {
            if offset == 0 {
                regions.push(None);
                continue;
            }
            if offset & 3 != 0 || offset < header_words * 4 || offset > location.len_bytes {
                return Err(RuntimeError::RegionOffsetInvalid {
                    region: id.name(),
                    offset,
                });
            }
            // A later region sharing this offset makes this one empty
            let end = offsets
                .iter()
                .enumerate()
                .filter(|&(j, &other)| other > offset || (other == offset && j > i))
                .map(|(_, &other)| other)
                .min()
                .unwrap_or(location.len_bytes)
                .min(location.len_bytes);
            let region = image.sub_region(offset / 4, (end - offset) / 4)?;
            debug!(
                region = id.name(),
                base = format_args!("0x{:08x}", region.base()),
                words = region.len_words(),
                "Resolved region"
            );
            regions.push(Some(region));
        }

        Ok(Self {
            location,
            regions,
            _marker: PhantomData,
        })
    }

    pub fn location(&self) -> ImageLocation {
        self.location
    }

    pub fn region(&self, id: R) -> Option<&MemoryRegion> {
        self.regions.get(id.index()).and_then(Option::as_ref)
    }

    pub fn require(&self, id: R) -> Result<&MemoryRegion> {
        self.region(id)
            .ok_or(RuntimeError::MissingRegion { region: id.name() })
    }

    /// Number of regions present
    pub fn present(&self) -> usize {
        self.regions.iter().filter(|r| r.is_some()).count()
    }
}

/// System region contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemRegion {
    pub timer_period_us: u32,
    /// `u32::MAX` runs until stopped
    pub simulation_ticks: u32,
    pub app_words: Vec<u32>,
}

impl SystemRegion {
    pub const RUN_FOREVER: u32 = u32::MAX;

    /// Parse the common header and `app_words` role-specific words
    pub fn parse(region: &MemoryRegion, app_words: usize) -> Result<Self> {
        ensure_len(region, "System", 2 + app_words as u32)?;
        let mut cursor = region.cursor();
        let timer_period_us = cursor.read_u32()?;
        let simulation_ticks = cursor.read_u32()?;
        let app_words = cursor.read_words(app_words as u32)?;
        if timer_period_us == 0 {
            return Err(RuntimeError::invalid("timer period", "must be non-zero"));
        }
        Ok(Self {
            timer_period_us,
            simulation_ticks,
            app_words,
        })
    }

    pub fn to_words(&self) -> Vec<u32> {
        let mut words = vec![self.timer_period_us, self.simulation_ticks];
        words.extend_from_slice(&self.app_words);
        words
    }

    pub fn runs_forever(&self) -> bool {
        self.simulation_ticks == Self::RUN_FOREVER
    }

    /// True once `tick` has reached the simulation budget
    pub fn is_finished(&self, tick: u32) -> bool {
        !self.runs_forever() && tick >= self.simulation_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    define_region_table! {
        TestRegion {
            System = 0,
            Data = 1,
            Spare = 2,
        }
    }

    fn write_image(sdram: &Sdram, words: &[u32]) -> ImageLocation {
        let len_bytes = words.len() as u32 * 4;
        let base = sdram.allocate(len_bytes).unwrap();
        sdram.write_words(base, words).unwrap();
        ImageLocation { base, len_bytes }
    }

    #[test]
    fn test_region_extents_follow_offsets() {
        let sdram = Sdram::new(1024);
        sdram.allocate(16).unwrap();
        // header (4 words), system (3 words), data (2 words)
        let location = write_image(
            &sdram,
            &[IMAGE_MAGIC, 16, 28, 0, 1000, 10, 7, 0xAA, 0xBB],
        );
        let image = ConfigImage::<TestRegion>::parse(&sdram, location).unwrap();
        assert_eq!(image.present(), 2);
        let system = image.require(TestRegion::System).unwrap();
        assert_eq!(system.len_words(), 3);
        assert_eq!(system.base(), location.base + 16);
        assert_eq!(image.require(TestRegion::Data).unwrap().to_vec().unwrap(), vec![0xAA, 0xBB]);
        assert!(matches!(
            image.require(TestRegion::Spare),
            Err(RuntimeError::MissingRegion { region: "Spare" })
        ));

        let parsed = SystemRegion::parse(system, 1).unwrap();
        assert_eq!(parsed.timer_period_us, 1000);
        assert_eq!(parsed.app_words, vec![7]);
        assert!(parsed.is_finished(10));
        assert!(!parsed.is_finished(9));
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let sdram = Sdram::new(256);
        let location = write_image(&sdram, &[0xDEAD_BEEF, 0, 0, 0]);
        assert!(matches!(
            ConfigImage::<TestRegion>::parse(&sdram, location),
            Err(RuntimeError::ConfigHeaderInvalid { found: 0xDEAD_BEEF, .. })
        ));
    }

    #[test]
    fn test_misaligned_offset_is_rejected() {
        let sdram = Sdram::new(256);
        let location = write_image(&sdram, &[IMAGE_MAGIC, 18, 0, 0, 0, 0]);
        assert!(matches!(
            ConfigImage::<TestRegion>::parse(&sdram, location),
            Err(RuntimeError::RegionOffsetInvalid { region: "System", .. })
        ));
    }

    #[test]
    fn test_run_forever_never_finishes() {
        let system = SystemRegion {
            timer_period_us: 1000,
            simulation_ticks: SystemRegion::RUN_FOREVER,
            app_words: vec![],
        };
        assert!(!system.is_finished(u32::MAX - 1));
    }

    #[test]
    fn test_short_system_region() {
        let sdram = Sdram::new(64);
        let region = sdram.region(0, 8).unwrap();
        region.write_slice(0, &[1000, 5]).unwrap();
        assert!(matches!(
            SystemRegion::parse(&region, 3),
            Err(RuntimeError::RegionTooShort { needed: 5, .. })
        ));
    }
}
