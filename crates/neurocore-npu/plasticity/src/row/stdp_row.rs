// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # STDP Rows
//!
//! ```text
//! [numSynapses, delayExtTick, delayExtOffset, lastUpdateTick, lastPreTick,
//!  preTrace × R, plasticWeight × n, control × n (u16, two per word, low half first)]
//! ```
//!
//! Every fetch brings each synapse up to date with the post-synaptic spikes that arrived
//! since the row was last processed, then (unless the fetch is a flush) with the
//! pre-synaptic spike itself. The updated words from `lastUpdateTick` onward are written back.
//!
//! ## Plasticity region
//!
//! ```text
//! [timingRule, weightRule, numPostNeurons, timing parameters..., weight parameters...]
//! ```

use super::{encode_header, read_header, RowOutcome, RowProcessor, ROW_HEADER_WORDS};
use crate::error::{PlasticityError, Result};
use crate::post_events::{PostEvent, PostEventHistory};
use crate::synaptic_word::{clamp_delay, SynapticWordFormat};
use crate::timing::{NearestPairTiming, PairTiming, TimingDependence, Vogels2011Timing};
use crate::weight::{AdditiveWeight, MultiplicativeWeight, WeightDependence};
use neurocore_hal::{Dtcm, MemoryRegion};
use neurocore_npu_neural::WeightFormat;
use neurocore_npu_runtime::config::ensure_len;
use neurocore_npu_runtime::{RingBuffer, RowOffsetLength};
use tracing::{debug, trace};

const LAST_UPDATE_TICK: usize = 3;
const LAST_PRE_TICK: usize = 4;
const STDP_HEADER_WORDS: usize = 5;

/// Post-synaptic events remembered per neuron, sentinel included
pub const POST_HISTORY_SIZE: usize = 16;

/// Timing rule identifiers in the plasticity region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TimingRule {
    Pair = 0,
    NearestPair = 1,
    Vogels2011 = 2,
}

impl TimingRule {
    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            0 => Ok(Self::Pair),
            1 => Ok(Self::NearestPair),
            2 => Ok(Self::Vogels2011),
            _ => Err(PlasticityError::UnknownRule { kind: "timing", id }),
        }
    }
}

pub trait TimingRuleId {
    const RULE: TimingRule;
}

impl TimingRuleId for PairTiming {
    const RULE: TimingRule = TimingRule::Pair;
}

impl TimingRuleId for NearestPairTiming {
    const RULE: TimingRule = TimingRule::NearestPair;
}

impl TimingRuleId for Vogels2011Timing {
    const RULE: TimingRule = TimingRule::Vogels2011;
}

/// Weight rule identifiers in the plasticity region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum WeightRule {
    Additive = 0,
    Multiplicative = 1,
}

impl WeightRule {
    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            0 => Ok(Self::Additive),
            1 => Ok(Self::Multiplicative),
            _ => Err(PlasticityError::UnknownRule { kind: "weight", id }),
        }
    }
}

pub trait WeightRuleId {
    const RULE: WeightRule;
}

impl WeightRuleId for AdditiveWeight {
    const RULE: WeightRule = WeightRule::Additive;
}

impl WeightRuleId for MultiplicativeWeight {
    const RULE: WeightRule = WeightRule::Multiplicative;
}

/// Rule pair named by a plasticity region
pub fn read_rules(region: &MemoryRegion) -> Result<(TimingRule, WeightRule)> {
    ensure_len(region, "Plasticity", 3)?;
    Ok((
        TimingRule::from_id(region.read(0)?)?,
        WeightRule::from_id(region.read(1)?)?,
    ))
}

/// One plastic synapse, as encoded into a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlasticSynapse {
    pub index: u32,
    pub delay: u32,
    pub weight: i32,
}

/// Word positions within an STDP row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StdpRowLayout {
    num_synapses: usize,
    pre_trace: usize,
    plastic: usize,
    control: usize,
    words: usize,
}

impl StdpRowLayout {
    fn new(num_synapses: usize, pre_trace_words: usize) -> Self {
        let pre_trace = STDP_HEADER_WORDS;
        let plastic = pre_trace + pre_trace_words;
        let control = plastic + num_synapses;
        Self {
            num_synapses,
            pre_trace,
            plastic,
            control,
            words: control + num_synapses.div_ceil(2),
        }
    }

    #[inline(always)]
    fn control(&self, row: &[u32], j: usize) -> u32 {
        (row[self.control + j / 2] >> (16 * (j % 2))) & 0xFFFF
    }
}

pub struct StdpRowProcessor<T, W, const H: usize = POST_HISTORY_SIZE>
where
    T: TimingDependence,
    W: WeightDependence,
{
    timing: T,
    weight: W,
    format: SynapticWordFormat,
    history: Vec<PostEventHistory<T::PostTrace, H>>,
}

impl<T, W, const H: usize> StdpRowProcessor<T, W, H>
where
    T: TimingDependence + TimingRuleId,
    W: WeightDependence + WeightRuleId,
{
    pub fn new(timing: T, weight: W, format: SynapticWordFormat, num_post_neurons: usize) -> Self {
        Self {
            timing,
            weight,
            format,
            history: vec![PostEventHistory::new(); num_post_neurons],
        }
    }

    /// Parse the plasticity region for this rule pair
    pub fn read(
        region: &MemoryRegion,
        format: SynapticWordFormat,
        weight_format: WeightFormat,
        dtcm: &mut Dtcm,
    ) -> Result<Self> {
        let (timing_rule, weight_rule) = read_rules(region)?;
        if timing_rule != T::RULE || weight_rule != W::RULE {
            return Err(PlasticityError::UnknownRule {
                kind: "rule pair",
                id: ((timing_rule as u32) << 16) | weight_rule as u32,
            });
        }
        let mut cursor = region.cursor();
        cursor.skip(2)?;
        let num_post_neurons = cursor.read_u32()? as usize;
        let timing = T::read(&mut cursor)?;
        let weight = W::read(&mut cursor, weight_format)?;
        dtcm.charge(num_post_neurons * core::mem::size_of::<PostEventHistory<T::PostTrace, H>>())?;
        debug!(
            timing = ?timing_rule,
            weight = ?weight_rule,
            num_post_neurons,
            "STDP rows configured"
        );
        Ok(Self::new(timing, weight, format, num_post_neurons))
    }

    /// Region words for this rule pair
    pub fn region_words(timing: &T, weight: &W, num_post_neurons: usize) -> Vec<u32> {
        let mut words = vec![T::RULE as u32, W::RULE as u32, num_post_neurons as u32];
        words.extend(timing.to_words());
        words.extend(weight.to_words());
        words
    }

    /// Encode a fresh row with no spikes seen yet
    pub fn encode_row(
        format: &SynapticWordFormat,
        synapses: &[PlasticSynapse],
        extension: Option<(u32, RowOffsetLength)>,
    ) -> Vec<u32> {
        let layout = StdpRowLayout::new(synapses.len(), T::PRE_TRACE_WORDS);
        let mut words = vec![0u32; layout.words];
        words[..ROW_HEADER_WORDS].copy_from_slice(&encode_header(synapses.len(), extension));
        for (j, s) in synapses.iter().enumerate() {
            words[layout.plastic + j] = s.weight as u32;
            let control = format.encode_control(s.index, s.delay) as u32;
            words[layout.control + j / 2] |= control << (16 * (j % 2));
        }
        words
    }

    /// Plastic weights of a row
    pub fn weights(row: &[u32]) -> Vec<i32> {
        let n = row.first().copied().unwrap_or(0) as usize;
        let layout = StdpRowLayout::new(n, T::PRE_TRACE_WORDS);
        row.get(layout.plastic..layout.control)
            .map(|w| w.iter().map(|&w| w as i32).collect())
            .unwrap_or_default()
    }

    pub fn last_update_tick(row: &[u32]) -> u32 {
        row.get(LAST_UPDATE_TICK).copied().unwrap_or(0)
    }

    pub fn last_pre_tick(row: &[u32]) -> u32 {
        row.get(LAST_PRE_TICK).copied().unwrap_or(0)
    }

    pub fn history(&self, neuron: usize) -> Option<&PostEventHistory<T::PostTrace, H>> {
        self.history.get(neuron)
    }

    pub fn timing(&self) -> &T {
        &self.timing
    }

    pub fn weight(&self) -> &W {
        &self.weight
    }
}

impl<T, W, const H: usize> RowProcessor for StdpRowProcessor<T, W, H>
where
    T: TimingDependence + TimingRuleId,
    W: WeightDependence + WeightRuleId,
{
    fn name(&self) -> &'static str {
        "stdp"
    }

    fn row_words(&self, num_synapses: u32) -> u32 {
        let words = StdpRowLayout::new(num_synapses as usize, T::PRE_TRACE_WORDS).words;
        u32::try_from(words).unwrap_or(u32::MAX)
    }

    fn process_row(
        &mut self,
        tick: u32,
        row: &mut [u32],
        flush: bool,
        ring: &mut RingBuffer,
    ) -> Result<RowOutcome> {
        let (num_synapses, delay_extension) =
            read_header(row, tick, flush, |n| self.row_words(n))?;
        let layout = StdpRowLayout::new(num_synapses, T::PRE_TRACE_WORDS);
        let mut outcome = RowOutcome {
            delay_extension,
            write_back_from: Some(LAST_UPDATE_TICK),
            weights_deposited: 0,
        };

        let last_update = row[LAST_UPDATE_TICK];
        let last_pre = row[LAST_PRE_TICK];
        let trace_words = layout.pre_trace..layout.plastic;
        let last_pre_trace = T::read_pre_trace(&row[trace_words.clone()]);

        row[LAST_UPDATE_TICK] = tick;
        let pre_trace = if flush {
            last_pre_trace
        } else {
            let trace = self.timing.add_pre_spike(tick, last_pre, last_pre_trace);
            row[LAST_PRE_TICK] = tick;
            T::write_pre_trace(trace, &mut row[trace_words]);
            trace
        };

        for j in 0..layout.num_synapses {
            let control = layout.control(row, j);
            let index = self.format.index(control);
            let dendritic = self.format.delay(control);
            let mut state = self.weight.initial_state(row[layout.plastic + j] as i32);

            if let Some(history) = self.history.get(index as usize) {
                let window = history.window(
                    last_update.saturating_sub(dendritic),
                    tick.saturating_sub(dendritic),
                );
                let mut last_post = window.prev().map(|e| PostEvent {
                    time: e.time + dendritic,
                    trace: e.trace,
                });
                for event in window.events() {
                    let delayed = event.time + dendritic;
                    if let Some(update) = self.timing.apply_post_spike(
                        delayed,
                        event.trace,
                        last_pre,
                        last_pre_trace,
                        last_post,
                    ) {
                        self.weight.apply(&mut state, update);
                    }
                    last_post = Some(PostEvent {
                        time: delayed,
                        trace: event.trace,
                    });
                }
                if !flush {
                    if let Some(update) = self.timing.apply_pre_spike(
                        tick,
                        pre_trace,
                        last_pre,
                        last_pre_trace,
                        last_post,
                    ) {
                        self.weight.apply(&mut state, update);
                    }
                }
            }

            let weight = self.weight.final_weight(state);
            if !flush {
                ring.add_weight(
                    tick.wrapping_add(clamp_delay(dendritic)),
                    index,
                    self.format.clamp_weight(weight),
                );
                outcome.weights_deposited += 1;
            }
            row[layout.plastic + j] = weight as u32;
        }

        trace!(tick, num_synapses, flush, "STDP row processed");
        Ok(outcome)
    }

    fn add_post_synaptic_spike(&mut self, tick: u32, neuron: u32) {
        if let Some(history) = self.history.get_mut(neuron as usize) {
            let last = history.last();
            let trace = self.timing.add_post_spike(tick, last.time, last.trace);
            history.add(tick, trace);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurocore_hal::Sdram;
    use neurocore_npu_neural::S1615_ONE;

    type Nearest = StdpRowProcessor<NearestPairTiming, AdditiveWeight>;

    fn processor() -> Nearest {
        StdpRowProcessor::new(
            NearestPairTiming::new(20 * S1615_ONE, 20 * S1615_ONE),
            AdditiveWeight::new(0, 0x4_0000, 0x0100_0000, 0x0100_0000),
            SynapticWordFormat::default(),
            32,
        )
    }

    fn row() -> Vec<u32> {
        Nearest::encode_row(
            &SynapticWordFormat::default(),
            &[
                PlasticSynapse { index: 4, delay: 1, weight: 0x2_0000 },
                PlasticSynapse { index: 9, delay: 2, weight: 0x1000 },
                PlasticSynapse { index: 4, delay: 3, weight: 0x10 },
            ],
            None,
        )
    }

    #[test]
    fn test_row_words() {
        let p = processor();
        assert_eq!(p.row_words(3), 5 + 3 + 2);
        assert_eq!(row().len(), 10);
        let pair = StdpRowProcessor::<PairTiming, AdditiveWeight>::new(
            PairTiming::new(S1615_ONE, S1615_ONE),
            AdditiveWeight::new(0, 1, 0, 0),
            SynapticWordFormat::default(),
            1,
        );
        assert_eq!(pair.row_words(4), 5 + 1 + 4 + 2);
    }

    #[test]
    fn test_corrupt_synapse_count_rejected() {
        let mut p = processor();
        let mut corrupt = row();
        corrupt[0] = u32::MAX;
        let mut ring = RingBuffer::new(3, 10);
        assert_eq!(p.row_words(u32::MAX), u32::MAX);
        assert!(matches!(
            p.process_row(1, &mut corrupt, false, &mut ring),
            Err(PlasticityError::RowTooShort { .. })
        ));
    }

    #[test]
    fn test_write_back_idempotent_without_events() {
        let mut p = processor();
        let mut ring = RingBuffer::new(3, 10);
        let mut words = row();
        let before = Nearest::weights(&words);

        let outcome = p.process_row(50, &mut words, true, &mut ring).unwrap();
        assert_eq!(outcome.write_back_from, Some(3));
        assert_eq!(outcome.weights_deposited, 0);
        assert_eq!(Nearest::weights(&words), before);
        assert_eq!(Nearest::last_update_tick(&words), 50);
        assert_eq!(Nearest::last_pre_tick(&words), 0);

        // A second pass is a no-op apart from the tick
        let snapshot = words.clone();
        p.process_row(60, &mut words, true, &mut ring).unwrap();
        assert_eq!(&words[4..], &snapshot[4..]);
        assert_eq!(words[3], 60);
    }

    #[test]
    fn test_pre_spike_deposits_current_weights() {
        let mut p = processor();
        let mut ring = RingBuffer::new(3, 10);
        let mut words = row();
        let outcome = p.process_row(300, &mut words, false, &mut ring).unwrap();
        assert_eq!(outcome.weights_deposited, 3);
        assert_eq!(Nearest::last_pre_tick(&words), 300);
        assert_eq!(ring.output_slice(301)[4], 0x2_0000);
        assert_eq!(ring.output_slice(302)[9], 0x1000);
        assert_eq!(ring.output_slice(303)[4], 0x10);
    }

    #[test]
    fn test_post_then_pre_depresses() {
        let mut p = processor();
        let mut ring = RingBuffer::new(3, 10);
        let mut words = row();
        p.process_row(300, &mut words, false, &mut ring).unwrap();
        p.add_post_synaptic_spike(500, 4);
        p.process_row(502, &mut words, false, &mut ring).unwrap();

        let weights = Nearest::weights(&words);
        // Post arrives at 501 through the one-tick dendrite: depression by e^(-1/20)
        let depression = p.timing().tau_minus.get(1);
        assert_eq!(weights[0], 0x2_0000 - ((depression * 0x400) >> 11));
        // Neuron 9 never spiked
        assert_eq!(weights[1], 0x1000);
        assert!(p.history(4).unwrap().times().contains(&500));
    }

    #[test]
    fn test_region_round_trip() {
        let timing = NearestPairTiming::new(20 * S1615_ONE, 10 * S1615_ONE);
        let weight = AdditiveWeight::new(0, 0x4_0000, 0x0100_0000, 0x0200_0000);
        let words = Nearest::region_words(&timing, &weight, 64);
        let sdram = Sdram::new(4096);
        let region = sdram.region(0, words.len() as u32 * 4).unwrap();
        region.write_slice(0, &words).unwrap();

        let p = Nearest::read(
            &region,
            SynapticWordFormat::default(),
            WeightFormat::new(15),
            &mut Dtcm::default(),
        )
        .unwrap();
        assert_eq!(p.weight(), &weight);
        assert_eq!(p.timing().tau_minus, timing.tau_minus);
        assert!(p.history(63).is_some() && p.history(64).is_none());

        let wrong = StdpRowProcessor::<PairTiming, AdditiveWeight>::read(
            &region,
            SynapticWordFormat::default(),
            WeightFormat::new(15),
            &mut Dtcm::default(),
        );
        assert!(matches!(wrong, Err(PlasticityError::UnknownRule { .. })));
    }
}
