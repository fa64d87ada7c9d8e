//! Averaged analog energy readings.

use crate::utils::config::NodeConfig;

/// One-shot analog-to-digital conversion.
pub trait AnalogInput {
    /// Block until a conversion on `channel` completes and return the raw code.
    fn read_raw(
        &mut self,
        channel: u8,
    ) -> u16;
}

/// Averages many raw conversions into one logical reading to suppress noise.
pub struct EnergySampler<A> {
    adc: A,
    channel: u8,
    depth: u16,
}

impl<A: AnalogInput> EnergySampler<A> {
    pub fn new(
        adc: A,
        channel: u8,
        depth: u16,
    ) -> Self {
        EnergySampler {
            adc,
            channel,
            depth: depth.max(1),
        }
    }

    /// Sampler on the configured channel and averaging depth.
    pub fn from_config(
        adc: A,
        config: &NodeConfig,
    ) -> Self {
        Self::new(adc, config.adc_channel, config.sample_depth)
    }

    /// Arithmetic mean of `depth` raw readings.
    pub fn read_averaged(&mut self) -> u16 {
        let mut sum: u32 = 0;
        for _ in 0..self.depth {
            sum += u32::from(self.adc.read_raw(self.channel));
        }
        (sum / u32::from(self.depth)) as u16
    }
}
