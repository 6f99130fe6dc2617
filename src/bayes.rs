use anyhow::{ensure, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, trace, warn};

use crate::corpus::{self, Song};

pub const DEFAULT_SMOOTHING: f64 = 1.01;

/// Only built through `Default` or [`with_smoothing`](Self::with_smoothing),
/// so the smoothing constant is always finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    smoothing: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}

impl ClassifierConfig {
    pub fn with_smoothing(smoothing: f64) -> Result<Self> {
        ensure!(
            smoothing.is_finite() && smoothing >= 0.0,
            "smoothing constant must be finite and non-negative, got {}",
            smoothing
        );
        Ok(ClassifierConfig { smoothing })
    }

    /// Added to every prior and to every positive likelihood before they are
    /// multiplied together.
    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }
}

/// Per-label statistics derived from the corpus.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelStats {
    pub song_count: usize,
    pub prior: f64,
    pub chord_counts: HashMap<String, usize>,
}

#[derive(Debug, Clone)]
struct TrainedModel {
    corpus_size: usize,
    vocabulary: BTreeSet<String>,
    labels: BTreeMap<String, LabelStats>,
}

impl TrainedModel {
    fn build(songs: &[Song]) -> Self {
        let mut vocabulary = BTreeSet::new();
        let mut labels: BTreeMap<String, LabelStats> = BTreeMap::new();

        // Count songs and chord occurrences per label:
        for song in songs {
            let stats = labels.entry(song.difficulty.clone()).or_default();
            stats.song_count += 1;

            for chord in &song.chords {
                vocabulary.insert(chord.clone());
                *stats.chord_counts.entry(chord.clone()).or_insert(0) += 1;
            }
        }

        // Calculate all of the priors. An empty corpus has no labels, so
        // there is nothing to divide here:
        let corpus_size = songs.len();
        for stats in labels.values_mut() {
            stats.prior = stats.song_count as f64 / corpus_size as f64;
        }

        TrainedModel {
            corpus_size,
            vocabulary,
            labels,
        }
    }

    // NOTE: the denominator is the whole corpus, not the label's song count.
    // Existing scores depend on this, so it is kept as is.
    fn likelihood(&self, stats: &LabelStats, chord: &str) -> f64 {
        match stats.chord_counts.get(chord) {
            Some(&count) if self.corpus_size > 0 => count as f64 / self.corpus_size as f64,
            _ => 0.0,
        }
    }
}

/// Scores chord sequences against difficulty labels learned from a corpus of
/// labeled songs.
///
/// Scores are unnormalized relative likelihoods. They only make sense when
/// compared against each other and do not sum to one.
#[derive(Debug, Clone, Default)]
pub struct ChordDifficultyClassifier {
    config: ClassifierConfig,
    songs: Vec<Song>,
    model: Option<TrainedModel>,
}

impl ChordDifficultyClassifier {
    pub fn new() -> Self {
        Self::with_config(ClassifierConfig::default())
    }

    pub fn with_config(config: ClassifierConfig) -> Self {
        ChordDifficultyClassifier {
            config,
            songs: Vec::new(),
            model: None,
        }
    }

    /// A classifier trained on the built-in reference corpus.
    pub fn reference() -> Result<Self> {
        let mut classifier = Self::new();
        for song in corpus::reference_songs()? {
            classifier.add_song(song);
        }
        classifier.train_all();
        Ok(classifier)
    }

    /// Appends a song to the corpus. Derived statistics stay untouched until
    /// the next [`train_all`](Self::train_all).
    pub fn add_song(&mut self, song: Song) {
        self.songs.push(song);
    }

    /// Rebuilds every derived statistic from the full corpus.
    pub fn train_all(&mut self) {
        if self.songs.is_empty() {
            warn!("training on an empty corpus, no labels will be known");
        }

        let model = TrainedModel::build(&self.songs);
        debug!(
            songs = model.corpus_size,
            labels = model.labels.len(),
            vocabulary = model.vocabulary.len(),
            "trained chord difficulty classifier"
        );
        self.model = Some(model);
    }

    /// Scores `chords` against every known label.
    ///
    /// Each score starts at `prior + smoothing` and is multiplied by
    /// `likelihood + smoothing` for every chord seen under that label. Chords
    /// never seen under a label are skipped. Returns an empty map before the
    /// first training pass.
    pub fn classify<S: AsRef<str>>(&self, chords: &[S]) -> BTreeMap<String, f64> {
        let Some(model) = &self.model else {
            return BTreeMap::new();
        };
        let smoothing = self.config.smoothing();

        model
            .labels
            .iter()
            .map(|(label, stats)| {
                let score = chords.iter().fold(stats.prior + smoothing, |score, chord| {
                    let likelihood = model.likelihood(stats, chord.as_ref());
                    if likelihood > 0.0 {
                        score * (likelihood + smoothing)
                    } else {
                        score
                    }
                });
                trace!(label = label.as_str(), score, "scored label");
                (label.clone(), score)
            })
            .collect()
    }

    /// The highest scoring label for `chords`, ties going to the smallest
    /// label. `None` when no label is known.
    pub fn predict<S: AsRef<str>>(&self, chords: &[S]) -> Option<(String, f64)> {
        self.classify(chords)
            .into_iter()
            .fold(None, |best, (label, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((label, score)),
            })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn label_priors(&self) -> BTreeMap<String, f64> {
        self.model
            .iter()
            .flat_map(|model| model.labels.iter())
            .map(|(label, stats)| (label.clone(), stats.prior))
            .collect()
    }

    pub fn prior(&self, label: &str) -> Option<f64> {
        self.label_stats(label).map(|stats| stats.prior)
    }

    pub fn label_stats(&self, label: &str) -> Option<&LabelStats> {
        self.model.as_ref()?.labels.get(label)
    }

    /// Distinct chords seen at the last training pass.
    pub fn vocabulary(&self) -> &BTreeSet<String> {
        static EMPTY: BTreeSet<String> = BTreeSet::new();
        self.model.as_ref().map_or(&EMPTY, |model| &model.vocabulary)
    }

    /// Occurrences of `chord` under `label` divided by the corpus size, or
    /// `None` if the chord was never seen under that label.
    pub fn likelihood(&self, label: &str, chord: &str) -> Option<f64> {
        let model = self.model.as_ref()?;
        let stats = model.labels.get(label)?;
        stats
            .chord_counts
            .contains_key(chord)
            .then(|| model.likelihood(stats, chord))
    }

    pub fn chord_count(&self, label: &str, chord: &str) -> usize {
        self.label_stats(label)
            .and_then(|stats| stats.chord_counts.get(chord))
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(songs: &[(&[&str], &str)]) -> ChordDifficultyClassifier {
        let mut classifier = ChordDifficultyClassifier::new();
        for (chords, label) in songs {
            classifier.add_song(Song::new(chords.iter().copied(), *label));
        }
        classifier.train_all();
        classifier
    }

    #[test]
    fn counts_every_chord_occurrence() {
        let classifier = classifier(&[(&["c", "c", "g"], "easy"), (&["c"], "hard")]);

        assert_eq!(classifier.chord_count("easy", "c"), 2);
        assert_eq!(classifier.chord_count("hard", "c"), 1);
        assert_eq!(classifier.chord_count("hard", "g"), 0);
        assert_eq!(classifier.likelihood("easy", "c"), Some(1.0));
        assert_eq!(classifier.likelihood("hard", "c"), Some(0.5));
        assert_eq!(classifier.likelihood("hard", "g"), None);
    }

    #[test]
    fn likelihood_divides_by_corpus_size() {
        let classifier = classifier(&[
            (&["a"], "easy"),
            (&["b"], "hard"),
            (&["b"], "hard"),
            (&["b"], "hard"),
        ]);

        // Three of three hard songs contain "b", but the corpus has four songs.
        assert_eq!(classifier.likelihood("hard", "b"), Some(0.75));
    }

    #[test]
    fn unseen_chords_are_skipped() {
        let classifier = classifier(&[(&["a"], "easy"), (&["b"], "hard")]);
        let scores = classifier.classify(&["b", "zzz"]);

        assert_eq!(scores["easy"], 0.5 + DEFAULT_SMOOTHING);
        assert_eq!(scores["hard"], (0.5 + DEFAULT_SMOOTHING) * (0.5 + DEFAULT_SMOOTHING));
    }

    #[test]
    fn repeated_input_chords_multiply_repeatedly() {
        let classifier = classifier(&[(&["a"], "easy")]);
        let once = classifier.classify(&["a"])["easy"];
        let twice = classifier.classify(&["a", "a"])["easy"];

        assert_eq!(twice, once * (1.0 + DEFAULT_SMOOTHING));
    }

    #[test]
    fn custom_smoothing_is_used() {
        let mut classifier =
            ChordDifficultyClassifier::with_config(ClassifierConfig::with_smoothing(0.0).unwrap());
        classifier.add_song(Song::new(["a"], "easy"));
        classifier.add_song(Song::new(["a", "b"], "hard"));
        classifier.train_all();

        let scores = classifier.classify(&["a", "b"]);
        assert_eq!(scores["easy"], 0.5 * 0.5);
        assert_eq!(scores["hard"], 0.5 * 0.5 * 0.5);
    }

    #[test]
    fn rejects_invalid_smoothing() {
        assert!(ClassifierConfig::with_smoothing(-2.0).is_err());
        assert!(ClassifierConfig::with_smoothing(-0.1).is_err());
        assert!(ClassifierConfig::with_smoothing(f64::NAN).is_err());
        assert!(ClassifierConfig::with_smoothing(f64::INFINITY).is_err());
        assert_eq!(ClassifierConfig::default().smoothing(), DEFAULT_SMOOTHING);
    }

    #[test]
    fn scores_stay_positive_for_any_accepted_smoothing() {
        for smoothing in [0.0, 0.5, DEFAULT_SMOOTHING, 1e6] {
            let config = ClassifierConfig::with_smoothing(smoothing).unwrap();
            let mut classifier = ChordDifficultyClassifier::with_config(config);
            classifier.add_song(Song::new(["a"], "easy"));
            classifier.add_song(Song::new(["b"], "hard"));
            classifier.train_all();

            assert_eq!(classifier.config().smoothing(), smoothing);
            for score in classifier.classify(&["a"]).values() {
                assert!(score.is_finite() && *score > 0.0, "smoothing {} gave {}", smoothing, score);
            }
        }
    }

    #[test]
    fn predict_breaks_ties_by_label() {
        let classifier = classifier(&[(&["a"], "medium"), (&["a"], "hard")]);
        let (label, _) = classifier.predict(&["a"]).unwrap();
        assert_eq!(label, "hard");
    }

    #[test]
    fn added_songs_wait_for_retraining() {
        let mut classifier = classifier(&[(&["a"], "easy")]);
        classifier.add_song(Song::new(["b"], "hard"));

        assert_eq!(classifier.len(), 2);
        assert!(classifier.prior("hard").is_none());
        assert!(!classifier.vocabulary().contains("b"));

        classifier.train_all();
        assert_eq!(classifier.prior("hard"), Some(0.5));
        assert_eq!(classifier.label_stats("easy").unwrap().song_count, 1);
    }
}
