// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Back propagation of post-synaptic spikes
//!
//! The neuron processor sets one bit per neuron that spiked during tick `t` and DMAs the
//! bit-vector to slab `t % 2`. During tick `t + 1` each synapse processor reads slab
//! `(t + 2) % 2` (equivalently `t % 2`) and records the spikes against tick `t`.
//!
//! ```text
//! output region: [enabled, buf0, buf1]
//! input region:  [n, {buf0, buf1, startNeuron, numWords} × n]
//! ```

use crate::config::ensure_len;
use crate::error::{Result, RuntimeError};
use crate::slab::SlabPair;
use neurocore_hal::{DmaDirection, DmaTag, Dtcm, MemoryRegion, Platform, Sdram};
use neurocore_npu_neural::bitfield;
use tracing::error;

/// Neuron processors a synapse processor can receive back propagation from
pub const MAX_BACK_PROPAGATION_INPUTS: usize = 4;

/// Slab pair carrying one neuron population's bit-vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackPropagationSlabs {
    pub pair: SlabPair,
    pub num_words: u32,
}

impl BackPropagationSlabs {
    /// Reserve two slabs large enough for `num_neurons` bits
    pub fn allocate(sdram: &Sdram, num_neurons: usize) -> Result<Self> {
        let num_words = bitfield::words_for(num_neurons) as u32;
        Ok(Self {
            pair: SlabPair::allocate(sdram, num_words)?,
            num_words,
        })
    }
}

/// Neuron-processor side: collects this tick's spikes and ships them to SDRAM
#[derive(Debug)]
pub struct BackPropagationOutput {
    slabs: BackPropagationSlabs,
    /// `None` while the bit-vector is owned by an in-flight DMA
    bits: Option<Vec<u32>>,
}

impl BackPropagationOutput {
    /// `None` when the region is absent or disabled
    pub fn read(
        region: Option<&MemoryRegion>,
        num_neurons: usize,
        dtcm: &mut Dtcm,
    ) -> Result<Option<Self>> {
        let Some(region) = region else {
            return Ok(None);
        };
        ensure_len(region, "BackPropagationOutput", 3)?;
        let mut cursor = region.cursor();
        if !cursor.read_bool()? {
            return Ok(None);
        }
        let pair = SlabPair::read(&mut cursor)?;
        let num_words = bitfield::words_for(num_neurons);
        Ok(Some(Self {
            slabs: BackPropagationSlabs {
                pair,
                num_words: num_words as u32,
            },
            bits: Some(dtcm.alloc(num_words, 0)?),
        }))
    }

    pub fn layout(slabs: Option<&BackPropagationSlabs>) -> Vec<u32> {
        match slabs {
            Some(s) => vec![1, s.pair.buffers[0], s.pair.buffers[1]],
            None => vec![0, 0, 0],
        }
    }

    pub fn slabs(&self) -> &BackPropagationSlabs {
        &self.slabs
    }

    #[inline]
    pub fn record_spike(&mut self, neuron: usize) {
        match &mut self.bits {
            Some(bits) => bitfield::set_bit(bits, neuron),
            None => error!(neuron, "Back propagation spike while transfer in flight"),
        }
    }

    /// DMA this tick's bit-vector to its slab
    pub fn transfer(&mut self, tick: u32, tag: DmaTag, platform: &mut dyn Platform) {
        if let Some(bits) = self.bits.take() {
            platform.dma_transfer(tag, self.slabs.pair.write_slab(tick), bits, DmaDirection::Write);
        }
    }

    /// Take the bit-vector back from the DMA engine, cleared for the next tick
    pub fn transfer_done(&mut self, mut bits: Vec<u32>) {
        bitfield::clear_all(&mut bits);
        self.bits = Some(bits);
    }

    pub fn in_flight(&self) -> bool {
        self.bits.is_none()
    }
}

/// Synapse-processor side descriptor of one back-propagation source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackPropagationInput {
    pub slabs: BackPropagationSlabs,
    /// Index of the source's first neuron within this processor's post-synaptic population
    pub start_neuron: u32,
}

impl BackPropagationInput {
    /// Start the DMA of the slab holding the previous tick's spikes
    pub fn fetch(&self, tick: u32, tag: DmaTag, mut buffer: Vec<u32>, platform: &mut dyn Platform) {
        buffer.resize(self.slabs.num_words as usize, 0);
        platform.dma_transfer(tag, self.slabs.pair.read_slab(tick), buffer, DmaDirection::Read);
    }

    /// Post-synaptic neuron indices set in a fetched bit-vector
    pub fn spiking_neurons<'a>(&'a self, bits: &'a [u32]) -> impl Iterator<Item = u32> + 'a {
        bitfield::iter_set(bits).map(move |bit| self.start_neuron + bit as u32)
    }
}

/// All back-propagation sources of a synapse processor
#[derive(Debug, Clone, Default)]
pub struct BackPropagationInputs {
    inputs: heapless::Vec<BackPropagationInput, MAX_BACK_PROPAGATION_INPUTS>,
}

impl BackPropagationInputs {
    pub fn read(region: Option<&MemoryRegion>) -> Result<Self> {
        let mut inputs = heapless::Vec::new();
        let Some(region) = region else {
            return Ok(Self { inputs });
        };
        ensure_len(region, "BackPropagationInput", 1)?;
        let mut cursor = region.cursor();
        let count = cursor.read_u32()?;
        ensure_len(region, "BackPropagationInput", 1 + 4 * count)?;
        for _ in 0..count {
            let pair = SlabPair::read(&mut cursor)?;
            let start_neuron = cursor.read_u32()?;
            let num_words = cursor.read_u32()?;
            let input = BackPropagationInput {
                slabs: BackPropagationSlabs { pair, num_words },
                start_neuron,
            };
            inputs.push(input).map_err(|_| {
                RuntimeError::invalid(
                    "back propagation inputs",
                    format!("{count} exceeds the limit of {MAX_BACK_PROPAGATION_INPUTS}"),
                )
            })?;
        }
        Ok(Self { inputs })
    }

    pub fn to_words(inputs: &[BackPropagationInput]) -> Vec<u32> {
        let mut words = vec![inputs.len() as u32];
        for input in inputs {
            words.extend_from_slice(&[
                input.slabs.pair.buffers[0],
                input.slabs.pair.buffers[1],
                input.start_neuron,
                input.slabs.num_words,
            ]);
        }
        words
    }

    pub fn get(&self, index: usize) -> Option<&BackPropagationInput> {
        self.inputs.get(index)
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Largest slab among the inputs, in words
    pub fn max_words(&self) -> usize {
        self.inputs
            .iter()
            .map(|i| i.slabs.num_words as usize)
            .max()
            .unwrap_or(0)
    }
}
