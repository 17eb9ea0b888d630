//! A party wrapped up as a puzzle.

use crate::party::{Party, Step};
use crate::text::{normalise, similarity};
use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// The clue is the last step of the party; the answer is the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    party: Party,
    original: String,
    clue: String,
}

impl Game {
    pub fn new(party: Party) -> Self {
        let original = party.first().text.clone();
        let clue = party.last().text.clone();
        Self {
            party,
            original,
            clue,
        }
    }

    /// Rebuild a game from stored steps; None if there are none
    pub fn from_steps(steps: Vec<Step>) -> Option<Self> {
        Party::from_steps(steps).map(Self::new)
    }

    pub fn steps(&self) -> &[Step] {
        self.party.steps()
    }

    /// The secret phrase players are trying to reconstruct
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The published, drifted phrase
    pub fn clue(&self) -> &str {
        &self.clue
    }

    /// Score a guess against the original. Exactly 1.0 means solved.
    pub fn play(&self, guess: &str) -> f64 {
        similarity(&normalise(guess), &normalise(&self.original))
    }
}

/// How an interactive game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Solved { guesses: u32 },
    /// Cancelled or ran out of input; the answer has been revealed
    Abandoned { guesses: u32 },
}

/// Play a game over a line-based terminal.
///
/// Prints the clue, then reads guesses until one is correct, `cancel` fires
/// or the input ends. The answer is revealed whenever the game is abandoned.
pub async fn play_interactive<R, W>(
    game: &Game,
    input: R,
    mut output: W,
    cancel: CancellationToken,
) -> Result<PlayOutcome>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut guesses: u32 = 0;

    write(&mut output, &format!("{}\n", game.clue())).await?;

    loop {
        write(&mut output, "guess: ").await?;

        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            line = lines.next_line() => line.context("Failed to read guess")?,
        };

        let Some(guess) = line else {
            write(
                &mut output,
                &format!("\nthe answer was: {}\n", game.original()),
            )
            .await?;
            return Ok(PlayOutcome::Abandoned { guesses });
        };

        guesses += 1;
        let score = game.play(guess.trim());
        if score == 1.0 {
            write(&mut output, "correct\n").await?;
            return Ok(PlayOutcome::Solved { guesses });
        }
        write(&mut output, &format!("incorrect; closeness: {}\n", score)).await?;
    }
}

async fn write<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output
        .write_all(text.as_bytes())
        .await
        .context("Failed to write to terminal")?;
    output.flush().await.context("Failed to flush terminal")
}
