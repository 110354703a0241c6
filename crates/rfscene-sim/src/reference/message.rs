//! Random message payloads

use rand::rngs::StdRng;
use rand::Rng;
use rfscene_core::stages::{MessageSource, StageError, StageResult};
use rfscene_core::types::{FrameId, Message};
use tracing::trace;

/// Uniform random payload bits
pub struct RandomMessageSource {
    rng: StdRng,
}

impl RandomMessageSource {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }
}

impl MessageSource for RandomMessageSource {
    fn generate(
        &mut self,
        frame_id: FrameId,
        type_id: u32,
        segment_index: usize,
        length: usize,
        symbol_rate: f64,
    ) -> StageResult<Message> {
        if !(symbol_rate.is_finite() && symbol_rate > 0.0) {
            return Err(StageError::InvalidInput(format!(
                "symbol rate {} is not positive",
                symbol_rate
            )));
        }
        let data: Vec<u8> = (0..length).map(|_| self.rng.gen_range(0..=1u8)).collect();
        trace!(frame_id, segment_index, bits = length, "message generated");
        Ok(Message {
            data,
            type_id,
            segment_index,
            length,
            symbol_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_message_bits() {
        let mut source = RandomMessageSource::new(StdRng::seed_from_u64(1));
        let msg = source.generate(1, 2, 0, 100, 1000.0).unwrap();
        assert_eq!(msg.data.len(), 100);
        assert!(msg.data.iter().all(|&b| b <= 1));
        assert!(msg.data.iter().any(|&b| b == 1));
        assert_eq!(msg.type_id, 2);
    }

    #[test]
    fn test_zero_length_is_empty() {
        let mut source = RandomMessageSource::new(StdRng::seed_from_u64(1));
        let msg = source.generate(1, 0, 0, 0, 1000.0).unwrap();
        assert!(msg.is_empty());
    }

    #[test]
    fn test_bad_symbol_rate_rejected() {
        let mut source = RandomMessageSource::new(StdRng::seed_from_u64(1));
        assert!(source.generate(1, 0, 0, 10, 0.0).is_err());
    }
}
