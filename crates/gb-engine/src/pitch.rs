//! Pitch-to-rate conversion for sample playback and the synth.

/// MIDI note of the A4 reference.
const REFERENCE_NOTE: f32 = 69.0;
/// Frequency of the A4 reference in Hz.
const REFERENCE_HZ: f32 = 440.0;

/// Playback rate multiplier for a pitch offset in semitones (12-TET).
pub fn semitone_ratio(semitones: f32) -> f32 {
    (semitones / 12.0).exp2()
}

/// Sample frames to advance per output frame.
///
/// Combines the pitch offset with the ratio between the sample's own rate
/// and the output rate.
pub fn playback_increment(semitones: f32, sample_rate: u32, output_rate: u32) -> f64 {
    if sample_rate == 0 || output_rate == 0 {
        return 0.0;
    }
    semitone_ratio(semitones) as f64 * sample_rate as f64 / output_rate as f64
}

/// Frequency in Hz of a (possibly fractional) MIDI note.
pub fn note_to_frequency(note: f32) -> f32 {
    REFERENCE_HZ * semitone_ratio(note - REFERENCE_NOTE)
}
