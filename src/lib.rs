//! Naive Bayes style difficulty classification of songs from their chords.

pub mod bayes;
pub mod corpus;

pub use bayes::{ChordDifficultyClassifier, ClassifierConfig, LabelStats, DEFAULT_SMOOTHING};
pub use corpus::{Song, EASY, HARD, MEDIUM};
