use anyhow::{Context, Result};
use std::io;

/// Example difficulty labels. The classifier itself accepts any label string.
pub const EASY: &str = "easy";
pub const MEDIUM: &str = "medium";
pub const HARD: &str = "hard";

const REFERENCE_SONGS: &str = include_str!("../data/reference_songs.csv");

/// A labeled training song. Songs are never mutated once added to a classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub name: Option<String>,
    pub chords: Vec<String>,
    pub difficulty: String,
}

impl Song {
    /// An anonymous song.
    pub fn new<I, S>(chords: I, difficulty: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Song {
            name: None,
            chords: chords.into_iter().map(Into::into).collect(),
            difficulty: difficulty.into(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Reads songs from CSV with the header `name,difficulty,chords`.
///
/// Chords are whitespace separated inside the third field, and any further
/// fields are read as more chords. An empty name gives an anonymous song and
/// a missing chords field gives an empty song.
pub fn parse_songs<R: io::Read>(reader: R) -> Result<Vec<Song>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut songs = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read song record {}", i + 1))?;

        let name = record.get(0).unwrap_or_default();
        let difficulty = record
            .get(1)
            .filter(|difficulty| !difficulty.is_empty())
            .with_context(|| format!("csv record {} missing difficulty entry.", i + 1))?;
        let chords = record.iter().skip(2).flat_map(str::split_whitespace);

        let song = Song::new(chords, difficulty);
        songs.push(if name.is_empty() { song } else { song.named(name) });
    }

    Ok(songs)
}

/// The built-in nine song corpus, three songs per example label.
pub fn reference_songs() -> Result<Vec<Song>> {
    parse_songs(REFERENCE_SONGS.as_bytes()).context("embedded reference corpus is malformed")
}
