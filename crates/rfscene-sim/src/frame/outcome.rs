//! Per-segment results

use rfscene_core::stages::{EmptySegment, SegmentAnnotation, Transmission};
use rfscene_core::types::{EntityId, SignalSegment};

/// Result of producing one segment
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentOutcome {
    Produced(SignalSegment),
    Empty { reason: String },
}

impl SegmentOutcome {
    pub fn empty(reason: impl Into<String>) -> Self {
        SegmentOutcome::Empty { reason: reason.into() }
    }

    pub fn is_produced(&self) -> bool {
        matches!(self, SegmentOutcome::Produced(_))
    }

    pub fn segment(&self) -> Option<&SignalSegment> {
        match self {
            SegmentOutcome::Produced(segment) => Some(segment),
            SegmentOutcome::Empty { .. } => None,
        }
    }
}

/// Segment outcomes of one transmitter, in segment order
#[derive(Debug, Clone, PartialEq)]
pub struct TransmitterOutcome {
    pub tx_id: EntityId,
    pub outcomes: Vec<SegmentOutcome>,
}

impl TransmitterOutcome {
    /// Antenna count of the last segment that produced samples
    pub fn final_antenna_count(&self) -> Option<usize> {
        self.outcomes
            .iter()
            .rev()
            .find_map(SegmentOutcome::segment)
            .map(|s| s.num_antennas)
    }

    pub fn produced_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_produced()).count()
    }

    /// Split into the transmission of produced segments and the empty ones
    pub fn into_parts(self) -> (Transmission, Vec<EmptySegment>) {
        let mut segments = Vec::new();
        let mut empty = Vec::new();
        for (segment_index, outcome) in self.outcomes.into_iter().enumerate() {
            match outcome {
                SegmentOutcome::Produced(segment) => segments.push((segment_index, segment)),
                SegmentOutcome::Empty { reason } => empty.push(EmptySegment {
                    tx_id: self.tx_id,
                    segment_index,
                    reason,
                }),
            }
        }
        (
            Transmission {
                tx_id: self.tx_id,
                segments,
            },
            empty,
        )
    }
}

pub fn segment_annotation(segment_index: usize, segment: &SignalSegment) -> SegmentAnnotation {
    SegmentAnnotation {
        segment_index,
        modulator: segment.modulator,
        start_time: segment.start_time,
        duration: segment.duration(),
        carrier_frequency: segment.carrier_frequency,
        bandwidth: segment.bandwidth,
        symbol_rate: segment.symbol_rate,
    }
}
