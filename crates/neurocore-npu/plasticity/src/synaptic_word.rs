// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Synaptic word and control half-word encoding
//!
//! ```text
//! synaptic word:   weight << (D + I) | delay << I | index
//! control (STDP):  delay << I | index                      (16 bits)
//! ```

use neurocore_npu_runtime::ring_buffer::{DEFAULT_DELAY_BITS, DEFAULT_INDEX_BITS};

/// Decoded synapse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Synapse {
    pub index: u32,
    pub delay: u32,
    pub weight: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynapticWordFormat {
    pub delay_bits: u32,
    pub index_bits: u32,
    /// Weights are sign-extended and may be negative
    pub signed_weights: bool,
}

impl Default for SynapticWordFormat {
    fn default() -> Self {
        Self {
            delay_bits: DEFAULT_DELAY_BITS,
            index_bits: DEFAULT_INDEX_BITS,
            signed_weights: false,
        }
    }
}

impl SynapticWordFormat {
    pub fn new(delay_bits: u32, index_bits: u32, signed_weights: bool) -> Self {
        Self {
            delay_bits,
            index_bits,
            signed_weights,
        }
    }

    #[inline(always)]
    fn weight_shift(&self) -> u32 {
        self.delay_bits + self.index_bits
    }

    #[inline(always)]
    pub fn index(&self, word: u32) -> u32 {
        word & ((1 << self.index_bits) - 1)
    }

    #[inline(always)]
    pub fn delay(&self, word: u32) -> u32 {
        (word >> self.index_bits) & ((1 << self.delay_bits) - 1)
    }

    #[inline(always)]
    pub fn decode(&self, word: u32) -> Synapse {
        let weight = if self.signed_weights {
            (word as i32) >> self.weight_shift()
        } else {
            (word >> self.weight_shift()) as i32
        };
        Synapse {
            index: self.index(word),
            delay: self.delay(word),
            weight,
        }
    }

    pub fn encode(&self, synapse: Synapse) -> u32 {
        ((synapse.weight as u32) << self.weight_shift())
            | ((synapse.delay & ((1 << self.delay_bits) - 1)) << self.index_bits)
            | self.index(synapse.index)
    }

    /// Control half-word of a plastic synapse
    pub fn encode_control(&self, index: u32, delay: u32) -> u16 {
        (((delay & ((1 << self.delay_bits) - 1)) << self.index_bits) | self.index(index)) as u16
    }

    /// Negative weights are dropped unless weights are signed
    #[inline(always)]
    pub fn clamp_weight(&self, weight: i32) -> i32 {
        if self.signed_weights {
            weight
        } else {
            weight.max(0)
        }
    }
}

/// Delays below one tick would land in the slot already handed to the neuron processor
#[inline(always)]
pub fn clamp_delay(delay: u32) -> u32 {
    delay.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_layout() {
        let format = SynapticWordFormat::default();
        let word = format.encode(Synapse {
            index: 3,
            delay: 2,
            weight: 0x400,
        });
        assert_eq!(word, (0x400 << 13) | (2 << 10) | 3);
        assert_eq!(
            format.decode(word),
            Synapse {
                index: 3,
                delay: 2,
                weight: 0x400
            }
        );
    }

    #[test]
    fn test_signed_weights_sign_extend() {
        let signed = SynapticWordFormat::new(3, 10, true);
        let word = signed.encode(Synapse {
            index: 1,
            delay: 1,
            weight: -5,
        });
        assert_eq!(signed.decode(word).weight, -5);
        assert_eq!(signed.clamp_weight(-5), -5);

        let unsigned = SynapticWordFormat::default();
        assert!(unsigned.decode(word).weight > 0);
        assert_eq!(unsigned.clamp_weight(-5), 0);
    }

    #[test]
    fn test_zero_delay_is_clamped() {
        assert_eq!(clamp_delay(0), 1);
        assert_eq!(clamp_delay(5), 5);
    }

    #[test]
    fn test_control_half_word() {
        let format = SynapticWordFormat::default();
        let control = format.encode_control(17, 3);
        assert_eq!(format.index(control as u32), 17);
        assert_eq!(format.delay(control as u32), 3);
    }
}
