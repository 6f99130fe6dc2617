use anyhow::Result;
use chord_difficulty::{corpus, ChordDifficultyClassifier, ClassifierConfig, DEFAULT_SMOOTHING};
use clap::Parser;
use std::io;
use tracing::info;

const DEMO_SEQUENCES: [&[&str]; 2] = [
    &["d", "g", "e", "dm"],
    &["f#m7", "a", "dadd9", "dmaj7", "bm", "bm7", "d", "f#m"],
];

#[derive(Parser)]
#[command(name = "chord-difficulty")]
#[command(about = "Guess how hard a song is to play from its chords")]
#[command(version)]
struct Cli {
    /// Additive smoothing applied to priors and likelihoods
    #[arg(short, long, env = "CHORD_SMOOTHING", default_value_t = DEFAULT_SMOOTHING)]
    smoothing: f64,

    /// Chords to classify (e.g. `c g am f`). Runs the demo sequences when empty.
    chords: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    let mut classifier =
        ChordDifficultyClassifier::with_config(ClassifierConfig::with_smoothing(cli.smoothing)?);
    for song in corpus::reference_songs()? {
        classifier.add_song(song);
    }
    classifier.train_all();
    info!(
        songs = classifier.len(),
        vocabulary = classifier.vocabulary().len(),
        smoothing = cli.smoothing,
        "trained on reference corpus"
    );

    if cli.chords.is_empty() {
        for chords in DEMO_SEQUENCES {
            print_scores(&classifier, chords)?;
        }
    } else {
        print_scores(&classifier, &cli.chords)?;
    }

    Ok(())
}

fn print_scores<S: AsRef<str>>(classifier: &ChordDifficultyClassifier, chords: &[S]) -> Result<()> {
    let sequence = chords.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
    println!("# {}", sequence);

    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["label", "score"])?;
    for (label, score) in classifier.classify(chords) {
        writer.write_record([label, score.to_string()])?;
    }
    writer.flush()?;

    if let Some((label, _)) = classifier.predict(chords) {
        println!("=> {}\n", label);
    }

    Ok(())
}
