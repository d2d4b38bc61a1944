// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Region tables of the four roles

use crate::define_region_table;
use neurocore_npu_neural::Recordable;

define_region_table! {
    /// Synapse processor image
    SynapseRegion {
        System = 0,
        KeyLookup = 1,
        SynapticMatrix = 2,
        Plasticity = 3,
        OutputBuffer = 4,
        DelayBuffer = 5,
        BackPropagationInput = 6,
        Profiler = 7,
        Statistics = 8,
    }
}

define_region_table! {
    /// Neuron processor image
    NeuronRegion {
        System = 0,
        Neuron = 1,
        Synapse = 2,
        InputBuffer = 3,
        BackPropagationOutput = 4,
        Flush = 5,
        IntrinsicPlasticity = 6,
        SpikeRecording = 7,
        AnalogueRecording0 = 8,
        AnalogueRecording1 = 9,
        AnalogueRecording2 = 10,
        AnalogueRecording3 = 11,
        Profiler = 12,
        Statistics = 13,
    }
}

impl NeuronRegion {
    /// Analogue recording region of one channel
    pub fn analogue(channel: Recordable) -> Self {
        match channel {
            Recordable::MembraneVoltage => Self::AnalogueRecording0,
            Recordable::ExcInput => Self::AnalogueRecording1,
            Recordable::InhInput => Self::AnalogueRecording2,
            Recordable::ExtCurrent => Self::AnalogueRecording3,
        }
    }
}

define_region_table! {
    /// Spike source image; exactly one of `SpikeSource` (Poisson) and `ArraySource` is present
    SpikeSourceRegion {
        System = 0,
        SpikeSource = 1,
        Flush = 2,
        SpikeRecording = 3,
        Profiler = 4,
        Statistics = 5,
        ArraySource = 6,
    }
}

define_region_table! {
    /// Current input image
    CurrentInputRegion {
        System = 0,
        PoissonSource = 1,
        OutputBuffer = 2,
        OutputWeight = 3,
        SpikeRecording = 4,
        Profiler = 5,
    }
}
