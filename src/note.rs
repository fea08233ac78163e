/// Register every voicing is built around (middle C)
pub const ANCHOR: i32 = 60;

/// Lowest note of a voicing stays within this many semitones of the anchor
const BAND: i32 = 6;

/// A note identity modulo one octave (C=0, B=11)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PitchClass(u8);

impl PitchClass {
    /// Wrap any semitone count onto 0..12
    pub fn new(semitone: i32) -> Self {
        PitchClass(semitone.rem_euclid(12) as u8)
    }

    pub fn semitone(self) -> i32 {
        self.0 as i32
    }
}

/// Frequency in Hz of a MIDI pitch (A4 = 440 Hz)
pub fn midi_to_freq(midi: i32) -> f64 {
    440.0 * 2.0_f64.powf((midi as f64 - 69.0) / 12.0)
}

const NAMES: [&str; 12] = ["C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B"];

/// Scientific pitch name, e.g. 60 is `C4` and 70 is `Bb4`
pub fn pitch_name(midi: i32) -> String {
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", NAMES[PitchClass::new(midi).semitone() as usize], octave)
}

/// Absolute pitch in the anchor octave whose pitch class is `root`
fn base_pitch(root: PitchClass) -> i32 {
    ANCHOR + (root.semitone() - ANCHOR.rem_euclid(12) + 12).rem_euclid(12)
}

/// Realize a chord as concrete MIDI pitches, sorted ascending.
///
/// The root-position chord is shifted by whole octaves until its lowest note
/// lies within a tritone of middle C. Each inversion step then lifts the
/// current lowest note an octave; counts past `intervals.len() - 1` keep
/// rotating, so `intervals.len()` steps give the original shape an octave up.
pub fn voice(root: PitchClass, intervals: &[u8], inversion: u32) -> Vec<i32> {
    let base = base_pitch(root);
    let mut offsets = intervals.to_vec();
    offsets.sort_unstable();
    let mut notes: Vec<i32> = offsets.iter().map(|&iv| base + iv as i32).collect();

    if notes.is_empty() {
        return notes;
    }

    while notes[0] > ANCHOR + BAND {
        notes.iter_mut().for_each(|n| *n -= 12);
    }
    while notes[0] < ANCHOR - BAND {
        notes.iter_mut().for_each(|n| *n += 12);
    }

    // Rotate one step at a time until the voicing fits in an octave. From
    // then on every `len` steps lift the whole chord exactly one octave.
    let mut remaining = inversion;
    while remaining > 0 && notes[notes.len() - 1] - notes[0] > 12 {
        rotate(&mut notes);
        remaining -= 1;
    }
    let len = notes.len() as u32;
    let lift = i32::try_from(remaining / len)
        .unwrap_or(i32::MAX)
        .saturating_mul(12);
    notes.iter_mut().for_each(|n| *n = n.saturating_add(lift));
    for _ in 0..remaining % len {
        rotate(&mut notes);
    }
    notes
}

/// Move the lowest note up an octave and re-sort
fn rotate(notes: &mut [i32]) {
    notes[0] = notes[0].saturating_add(12);
    notes.sort_unstable();
}

/// Distinct pitch classes of a voicing, in first-seen order
pub fn pitch_classes(pitches: &[i32]) -> Vec<PitchClass> {
    let mut pcs = Vec::with_capacity(pitches.len());
    for &p in pitches {
        let pc = PitchClass::new(p);
        if !pcs.contains(&pc) {
            pcs.push(pc);
        }
    }
    pcs
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAJOR: [u8; 3] = [0, 4, 7];
    const MAJ7: [u8; 4] = [0, 4, 7, 11];

    #[test]
    fn test_a4_frequency() {
        assert!((midi_to_freq(69) - 440.0).abs() < 0.01);
        assert!((midi_to_freq(60) - 261.63).abs() < 0.01);
    }

    #[test]
    fn test_pitch_names() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(70), "Bb4");
        assert_eq!(pitch_name(54), "F#3");
        assert_eq!(pitch_name(11), "B-1");
    }

    #[test]
    fn test_pitch_class_wraps() {
        assert_eq!(PitchClass::new(-1).semitone(), 11);
        assert_eq!(PitchClass::new(14).semitone(), 2);
    }

    #[test]
    fn test_c_major_root_position() {
        assert_eq!(voice(PitchClass::new(0), &MAJOR, 0), vec![60, 64, 67]);
    }

    #[test]
    fn test_high_roots_recentered_below_anchor() {
        // G would start at 67, above the band, so it drops an octave
        assert_eq!(voice(PitchClass::new(7), &MAJOR, 0), vec![55, 59, 62]);
        // F# sits exactly on the band edge and stays
        assert_eq!(voice(PitchClass::new(6), &MAJOR, 0), vec![66, 70, 73]);
    }

    #[test]
    fn test_unsorted_intervals() {
        assert_eq!(voice(PitchClass::new(0), &[7, 0, 4], 0), vec![60, 64, 67]);
    }

    #[test]
    fn test_inversions() {
        let c = PitchClass::new(0);
        assert_eq!(voice(c, &MAJOR, 1), vec![64, 67, 72]);
        assert_eq!(voice(c, &MAJOR, 2), vec![67, 72, 76]);
        // a full cycle gives the root position an octave up
        assert_eq!(voice(c, &MAJOR, 3), vec![72, 76, 79]);
    }

    #[test]
    fn test_root_position_lowest_note_is_root() {
        let shapes: [&[u8]; 4] = [&MAJOR, &MAJ7, &[0, 3, 6, 9], &[0, 2, 7]];
        for semi in 0..12 {
            for shape in shapes {
                let notes = voice(PitchClass::new(semi), shape, 0);
                assert_eq!(PitchClass::new(notes[0]), PitchClass::new(semi));
            }
        }
    }

    #[test]
    fn test_length_order_and_range() {
        for semi in 0..12 {
            for shape in [&MAJOR[..], &MAJ7[..], &[0, 12][..]] {
                let notes = voice(PitchClass::new(semi), shape, 0);
                assert_eq!(notes.len(), shape.len());
                assert!(notes.windows(2).all(|w| w[0] <= w[1]));
                assert!(notes.iter().all(|n| (54..=78).contains(n)), "{:?}", notes);
            }
        }
    }

    #[test]
    fn test_inversion_is_cyclic() {
        for semi in 0..12 {
            let root = PitchClass::new(semi);
            let len = MAJ7.len() as u32;
            let original = voice(root, &MAJ7, 0);
            for k in 0..len {
                // k steps, then len - k more: same shape one octave higher
                let cycled = voice(root, &MAJ7, k + (len - k));
                let shifted: Vec<i32> = original.iter().map(|n| n + 12).collect();
                assert_eq!(cycled, shifted);
            }
        }
    }

    #[test]
    fn test_wide_chord_rotates_step_by_step() {
        // add9 spans more than an octave, so a full cycle is not a plain shift
        let c = PitchClass::new(0);
        let add9 = [0, 4, 7, 14];
        assert_eq!(voice(c, &add9, 1), vec![64, 67, 72, 74]);
        assert_eq!(voice(c, &add9, 4), vec![74, 76, 79, 84]);
        assert_eq!(voice(c, &add9, 5), vec![76, 79, 84, 86]);
    }

    #[test]
    fn test_huge_inversion_returns_at_once() {
        let c = PitchClass::new(0);
        assert_eq!(voice(c, &MAJOR, 3 * 1000 + 1), vec![12064, 12067, 12072]);
        let notes = voice(c, &MAJOR, u32::MAX);
        assert_eq!(notes.len(), 3);
        assert!(notes.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_single_note_is_octave_transposition() {
        let c = PitchClass::new(0);
        assert_eq!(voice(c, &[0], 0), vec![60]);
        assert_eq!(voice(c, &[0], 2), vec![84]);
    }

    #[test]
    fn test_pitch_classes_dedup() {
        let pcs = pitch_classes(&[60, 64, 72, 67]);
        assert_eq!(
            pcs,
            vec![PitchClass::new(0), PitchClass::new(4), PitchClass::new(7)]
        );
    }
}
