//! Random exercise generation.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::config::ChordSpec;
use crate::error::EarError;
use crate::pool::{ChordTemplate, TemplatePool};

pub const MIN_CHORDS: usize = 1;
pub const MAX_CHORDS: usize = 16;
pub const DEFAULT_CHORDS: usize = 4;

/// A reference chord for orientation plus the chords to identify
#[derive(Debug, Clone, PartialEq)]
pub struct Exercise {
    pub reference: ChordSpec,
    pub sequence: Vec<ChordSpec>,
}

/// Clamp a requested chord count to 1..=16; zero means the default of 4
pub fn clamp_chord_count(n: usize) -> usize {
    if n == 0 {
        DEFAULT_CHORDS
    } else {
        n.clamp(MIN_CHORDS, MAX_CHORDS)
    }
}

/// Draw one chord: root, template and inversion each picked uniformly
fn draw<R: Rng + ?Sized>(roots: &[String], templates: &[ChordTemplate], rng: &mut R) -> ChordSpec {
    let root = &roots[rng.gen_range(0..roots.len())];
    let template = &templates[rng.gen_range(0..templates.len())];
    let inversion = template.inversions.choose(rng).copied().unwrap_or(0);
    ChordSpec {
        root: root.clone(),
        key: template.key.clone(),
        inversion,
    }
}

/// Generate a fresh exercise of `n` chords from whatever the pool allows.
///
/// Every chord, the reference included, is an independent draw, so repeats
/// are expected. Fails without touching anything when no root or no chord
/// type is enabled.
pub fn generate<R: Rng + ?Sized>(
    pool: &TemplatePool<'_>,
    n: usize,
    rng: &mut R,
) -> Result<Exercise, EarError> {
    let roots = pool.enabled_roots();
    if roots.is_empty() {
        return Err(EarError::NoRoots);
    }
    let templates = pool.enabled_templates();
    if templates.is_empty() {
        return Err(EarError::NoTemplates);
    }

    let reference = draw(&roots, &templates, rng);
    let sequence: Vec<ChordSpec> = (0..n).map(|_| draw(&roots, &templates, rng)).collect();
    debug!(
        roots = roots.len(),
        templates = templates.len(),
        chords = sequence.len(),
        "generated exercise"
    );
    Ok(Exercise { reference, sequence })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChordConfig, ChordKey};
    use crate::pool::Selection;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_clamp_chord_count() {
        assert_eq!(clamp_chord_count(0), 4);
        assert_eq!(clamp_chord_count(1), 1);
        assert_eq!(clamp_chord_count(8), 8);
        assert_eq!(clamp_chord_count(40), 16);
    }

    #[test]
    fn test_generate_draws_from_pool() {
        let config = ChordConfig::builtin().unwrap();
        let mut selection = Selection::from_defaults(&config);
        selection.root_text = "C, F#".into();
        selection.set_inversion(&config, "triads", 2, false);
        let pool = TemplatePool::new(&config, &selection);
        let mut rng = StdRng::seed_from_u64(7);

        let exercise = generate(&pool, 12, &mut rng).unwrap();
        assert_eq!(exercise.sequence.len(), 12);
        for spec in std::iter::once(&exercise.reference).chain(&exercise.sequence) {
            assert!(spec.root == "C" || spec.root == "F#");
            assert_eq!(spec.key.section_id, "triads");
            assert!(spec.inversion <= 1);
            assert!(config.voice_spec(spec).is_some());
        }
    }

    #[test]
    fn test_generate_is_deterministic_per_seed() {
        let config = ChordConfig::builtin().unwrap();
        let selection = Selection::from_defaults(&config);
        let pool = TemplatePool::new(&config, &selection);
        let a = generate(&pool, 6, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = generate(&pool, 6, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_generate_covers_every_choice() {
        let config = ChordConfig::builtin().unwrap();
        let mut selection = Selection::from_defaults(&config);
        selection.root_text = "C D".into();
        let pool = TemplatePool::new(&config, &selection);
        let exercise = generate(&pool, 16 * 20, &mut StdRng::seed_from_u64(1)).unwrap();

        let seen = |f: &dyn Fn(&ChordSpec) -> bool| exercise.sequence.iter().any(|s| f(s));
        assert!(seen(&|s| s.root == "C"));
        assert!(seen(&|s| s.root == "D"));
        for chord in ["maj", "min", "dim", "aug"] {
            assert!(seen(&|s| s.key == ChordKey::new("triads", chord)));
        }
        for inv in 0..3 {
            assert!(seen(&|s| s.inversion == inv));
        }
    }

    #[test]
    fn test_empty_inversion_list_defaults_to_root_position() {
        let config = ChordConfig::builtin().unwrap();
        let mut selection = Selection::from_defaults(&config);
        for inv in 0..3 {
            selection.set_inversion(&config, "triads", inv, false);
        }
        let pool = TemplatePool::new(&config, &selection);
        let exercise = generate(&pool, 10, &mut StdRng::seed_from_u64(3)).unwrap();
        assert!(exercise.sequence.iter().all(|s| s.inversion == 0));
    }

    #[test]
    fn test_refuses_without_templates() {
        let config = ChordConfig::builtin().unwrap();
        let mut selection = Selection::from_defaults(&config);
        selection.set_section(&config, "triads", false);
        let pool = TemplatePool::new(&config, &selection);
        let err = generate(&pool, 4, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, EarError::NoTemplates));
    }

    #[test]
    fn test_refuses_without_roots() {
        let mut config = ChordConfig::builtin().unwrap();
        config.roots.clear();
        let mut selection = Selection::from_defaults(&config);
        selection.root_text = "xyz".into();
        let pool = TemplatePool::new(&config, &selection);
        let err = generate(&pool, 4, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, EarError::NoRoots));
    }
}
