use crate::error::PlayerError;
use crate::host::{AnalyserGraph, AudioGraphFactory};

/// Normalized distance of a time-domain byte from the 128 midline.
///
/// 0 and 128 map to 1 and 0; 255 maps to 127/128, not 1.
pub fn amplitude(sample: u8) -> f32 {
    (f32::from(sample) - 128.0).abs() / 128.0
}

/// Evenly sub-sample `bar_count` amplitudes out of an analyser buffer.
pub fn sample_bars(buffer: &[u8], bar_count: usize) -> Vec<f32> {
    if buffer.is_empty() {
        return vec![0.0; bar_count];
    }
    (0..bar_count)
        .map(|i| amplitude(buffer[i * buffer.len() / bar_count]))
        .collect()
}

// Live tap on the playback graph
pub struct SignalAnalyzer {
    graph: Box<dyn AnalyserGraph>,
    buffer: Vec<u8>,
}

impl SignalAnalyzer {
    pub fn attach(factory: &mut dyn AudioGraphFactory, fft_size: u32) -> Result<Self, PlayerError> {
        let graph = factory.build(fft_size)?;
        let bins = graph.bin_count();
        log::info!("audio graph ready ({bins} bins)");
        Ok(Self {
            graph,
            buffer: vec![128; bins],
        })
    }

    pub fn resume_if_suspended(&mut self) {
        if self.graph.is_suspended() {
            log::debug!("resuming suspended audio graph");
            self.graph.resume();
        }
    }

    /// Refresh the buffer from the graph and return it.
    pub fn read_amplitudes(&mut self) -> &[u8] {
        self.graph.read_time_domain(&mut self.buffer);
        &self.buffer
    }

    pub fn bin_count(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraphs;

    #[test]
    fn amplitude_matches_midline_distance() {
        let amps: Vec<f32> = [128u8, 0, 255, 64].iter().map(|&b| amplitude(b)).collect();
        assert_eq!(amps[0], 0.0);
        assert_eq!(amps[1], 1.0);
        assert!((amps[2] - 0.992_187_5).abs() < 1e-6);
        assert_eq!(amps[3], 0.5);
    }

    #[test]
    fn sampling_picks_evenly_spaced_bytes() {
        let buffer: Vec<u8> = (0..8).map(|i| 128 + i * 16).collect();
        let bars = sample_bars(&buffer, 4);
        let expected: Vec<f32> = [0usize, 2, 4, 6].iter().map(|&i| amplitude(buffer[i])).collect();
        assert_eq!(bars, expected);
    }

    #[test]
    fn sampling_an_empty_buffer_gives_silence() {
        assert_eq!(sample_bars(&[], 3), vec![0.0; 3]);
    }

    #[test]
    fn analyzer_buffer_is_half_the_transform() {
        let mut graphs = MemoryGraphs::default();
        let analyzer = SignalAnalyzer::attach(&mut graphs, 256).unwrap();
        assert_eq!(analyzer.bin_count(), 128);
        assert_eq!(graphs.built(), 1);
    }

    #[test]
    fn read_refreshes_from_the_graph() {
        let mut graphs = MemoryGraphs::default();
        let mut analyzer = SignalAnalyzer::attach(&mut graphs, 256).unwrap();
        assert!(analyzer.read_amplitudes().iter().all(|&b| b == 128));
        graphs.set_signal(vec![0, 255]);
        let data = analyzer.read_amplitudes();
        assert_eq!(data[0], 0);
        assert_eq!(data[1], 255);
    }

    #[test]
    fn suspended_graph_is_resumed() {
        let mut graphs = MemoryGraphs::default();
        graphs.set_suspended(true);
        let mut analyzer = SignalAnalyzer::attach(&mut graphs, 256).unwrap();
        analyzer.resume_if_suspended();
        assert!(!graphs.is_suspended());
    }

    #[test]
    fn failed_graph_is_reported() {
        let mut graphs = MemoryGraphs::default();
        graphs.fail_next_build();
        assert!(SignalAnalyzer::attach(&mut graphs, 256).is_err());
    }
}
