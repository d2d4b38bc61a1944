// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Input Buffers
//!
//! Each synapse processor (or current source) feeding a neuron processor owns a slab pair of
//! accumulated weights for a contiguous neuron range and one receptor:
//!
//! ```text
//! region:     [n, descriptor × n]
//! descriptor: {buf0, buf1, startNeuron, numNeurons, receptorType, leftShiftToS1615: i32}
//! ```
//!
//! Slab contents are raw ring-buffer sums in the producer's weight format; `leftShiftToS1615`
//! rescales them to S1615 (negative shifts right).

use crate::config::ensure_len;
use crate::error::{Result, RuntimeError};
use crate::slab::SlabPair;
use neurocore_hal::{Dtcm, MemoryRegion};
use neurocore_npu_neural::S1615;

const DESCRIPTOR_WORDS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputBufferDescriptor {
    pub slabs: SlabPair,
    pub start_neuron: u32,
    pub num_neurons: u32,
    pub receptor: u32,
    pub left_shift_to_s1615: i32,
}

impl InputBufferDescriptor {
    /// Rescale one slab word to S1615
    #[inline]
    pub fn to_s1615(&self, raw: u32) -> S1615 {
        let value = raw as i32;
        if self.left_shift_to_s1615 >= 0 {
            value.wrapping_shl(self.left_shift_to_s1615 as u32)
        } else {
            value >> (-self.left_shift_to_s1615).min(31)
        }
    }

    /// Neuron index of word `i` of the slab
    #[inline]
    pub fn neuron(&self, i: usize) -> usize {
        self.start_neuron as usize + i
    }

    fn to_words(self) -> [u32; DESCRIPTOR_WORDS as usize] {
        [
            self.slabs.buffers[0],
            self.slabs.buffers[1],
            self.start_neuron,
            self.num_neurons,
            self.receptor,
            self.left_shift_to_s1615 as u32,
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputBuffers {
    descriptors: Vec<InputBufferDescriptor>,
}

impl InputBuffers {
    pub fn read(region: &MemoryRegion, num_neurons: usize, dtcm: &mut Dtcm) -> Result<Self> {
        ensure_len(region, "InputBuffer", 1)?;
        let mut cursor = region.cursor();
        let count = cursor.read_u32()?;
        ensure_len(region, "InputBuffer", 1 + DESCRIPTOR_WORDS * count)?;

        let mut descriptors = dtcm.alloc_default::<InputBufferDescriptor>(count as usize)?;
        for (i, d) in descriptors.iter_mut().enumerate() {
            *d = InputBufferDescriptor {
                slabs: SlabPair::read(&mut cursor)?,
                start_neuron: cursor.read_u32()?,
                num_neurons: cursor.read_u32()?,
                receptor: cursor.read_u32()?,
                left_shift_to_s1615: cursor.read_i32()?,
            };
            if d.start_neuron as usize + d.num_neurons as usize > num_neurons {
                return Err(RuntimeError::invalid(
                    "input buffer",
                    format!(
                        "descriptor {i} covers neurons {}..{} of {num_neurons}",
                        d.start_neuron,
                        d.start_neuron + d.num_neurons
                    ),
                ));
            }
        }
        Ok(Self { descriptors })
    }

    pub fn to_words(descriptors: &[InputBufferDescriptor]) -> Vec<u32> {
        let mut words = vec![descriptors.len() as u32];
        for d in descriptors {
            words.extend_from_slice(&d.to_words());
        }
        words
    }

    pub fn descriptors(&self) -> &[InputBufferDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, index: usize) -> Option<&InputBufferDescriptor> {
        self.descriptors.get(index)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Largest slab, which sizes the DMA buffers
    pub fn max_neurons(&self) -> usize {
        self.descriptors
            .iter()
            .map(|d| d.num_neurons as usize)
            .max()
            .unwrap_or(0)
    }
}
