//! The persisted, resumable game played in a social-platform thread.
//!
//! A session is either active or over. Every externally visible step
//! (publishing, answering a reply, timing out) is followed immediately by a
//! save, so a crash loses at most the reply being handled at that moment.

use crate::game::Game;
use crate::party::PartySource;
use crate::social::{ImageRenderer, Reply, SocialPlatform};
use crate::store::SessionStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::cmp::Ordering;
use tracing::{debug, info, warn};

/// The collaborators a session acts through.
pub struct Host<'a> {
    pub platform: &'a dyn SocialPlatform,
    pub renderer: Option<&'a dyn ImageRenderer>,
    pub store: &'a SessionStore,
    handle: String,
    mention: Regex,
}

impl<'a> Host<'a> {
    pub fn new(
        platform: &'a dyn SocialPlatform,
        renderer: Option<&'a dyn ImageRenderer>,
        store: &'a SessionStore,
        handle: &str,
    ) -> Result<Self> {
        let handle = handle.trim_start_matches('@').to_string();
        let mention = Regex::new(&format!(r"(?i)@{}\b", regex::escape(&handle)))
            .context("Failed to build mention pattern")?;
        Ok(Self {
            platform,
            renderer,
            store,
            handle,
            mention,
        })
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Whether `text` opens by mentioning the game account
    fn is_addressed(&self, text: &str) -> bool {
        self.mention
            .find(text)
            .map(|m| text[..m.start()].trim().is_empty())
            .unwrap_or(false)
    }

    /// The guess inside a reply, with mentions of the game account removed
    fn extract_guess(&self, text: &str) -> String {
        self.mention.replace_all(text, "").trim().to_string()
    }

    fn render(&self, steps: &[crate::party::Step]) -> Option<Vec<u8>> {
        let renderer = self.renderer?;
        match renderer.render(steps) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!("Failed to render image, posting text only: {:#}", e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotAddressed,
    NotInThread,
    AlreadyAnswered,
}

/// What handling one reply did
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    /// Already seen; nothing happened
    Duplicate,
    /// The session was already over; nothing happened
    GameOver,
    /// Marked seen without answering
    Ignored(IgnoreReason),
    /// Wrong guess, closeness reported (if the post went through)
    Feedback { score: f64, feedback_id: Option<String> },
    /// Correct guess; the session is now over
    Solved,
}

/// What one poll of an active session did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    AlreadyOver,
    TimedOut,
    Processed { replies: usize, solved: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    game: Game,
    thread_root_id: String,
    trigger_ids: Vec<String>,
    seen_ids: Vec<String>,
    deadline: DateTime<Utc>,
    over: bool,
}

impl Session {
    /// Reassemble a session from stored fields
    pub fn from_parts(
        game: Game,
        thread_root_id: String,
        mut trigger_ids: Vec<String>,
        seen_ids: Vec<String>,
        deadline: DateTime<Utc>,
        over: bool,
    ) -> Self {
        if !trigger_ids.contains(&thread_root_id) {
            trigger_ids.insert(0, thread_root_id.clone());
        }
        Self {
            game,
            thread_root_id,
            trigger_ids,
            seen_ids,
            deadline,
            over,
        }
    }

    /// Publish the clue for `game` and persist the new session.
    pub async fn create(
        game: Game,
        host: &Host<'_>,
        now: DateTime<Utc>,
        duration: Duration,
    ) -> Result<Self> {
        let deadline = now
            .checked_add_signed(duration)
            .context("Game deadline out of range")?;
        let steps = game.steps();
        let image = host.render(&steps[steps.len() - 1..]);
        let thread_root_id = host
            .platform
            .publish(game.clue(), image, None)
            .await
            .context("Failed to publish clue")?;

        let session = Self::from_parts(
            game,
            thread_root_id,
            Vec::new(),
            Vec::new(),
            deadline,
            false,
        );
        host.store.save(&session)?;

        info!(
            "Published clue '{}' as {} (game ends {})",
            session.game.clue(),
            session.thread_root_id,
            session.deadline
        );
        Ok(session)
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn thread_root_id(&self) -> &str {
        &self.thread_root_id
    }

    pub fn trigger_ids(&self) -> &[String] {
        &self.trigger_ids
    }

    pub fn seen_ids(&self) -> &[String] {
        &self.seen_ids
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    /// End the game if its deadline has passed. Returns whether it did.
    pub async fn check_timeout(&mut self, host: &Host<'_>, now: DateTime<Utc>) -> Result<bool> {
        if self.over || now <= self.deadline {
            return Ok(false);
        }

        let image = host.render(self.game.steps());
        host.platform
            .publish(
                &format!("Game over. The answer was {}", self.game.original()),
                image,
                Some(&self.thread_root_id),
            )
            .await
            .context("Failed to announce timeout")?;

        self.over = true;
        host.store.save(self)?;
        info!("Game {} timed out unsolved", self.thread_root_id);
        Ok(true)
    }

    /// Handle one reply from the thread.
    pub async fn handle_reply(&mut self, host: &Host<'_>, reply: &Reply) -> Result<ReplyOutcome> {
        if self.over {
            return Ok(ReplyOutcome::GameOver);
        }
        if self.seen_ids.contains(&reply.id) {
            debug!("Reply {} already handled", reply.id);
            return Ok(ReplyOutcome::Duplicate);
        }

        let outcome = if let Some(reason) = self.ignore_reason(host, reply) {
            debug!("Ignoring reply {}: {:?}", reply.id, reason);
            ReplyOutcome::Ignored(reason)
        } else {
            self.answer(host, reply).await?
        };

        self.seen_ids.push(reply.id.clone());
        host.store.save(self)?;
        Ok(outcome)
    }

    fn ignore_reason(&self, host: &Host<'_>, reply: &Reply) -> Option<IgnoreReason> {
        if !host.is_addressed(&reply.text) {
            return Some(IgnoreReason::NotAddressed);
        }
        match &reply.in_reply_to {
            Some(target) if self.trigger_ids.contains(target) => {}
            _ => return Some(IgnoreReason::NotInThread),
        }
        if self.trigger_ids.contains(&reply.id) {
            return Some(IgnoreReason::AlreadyAnswered);
        }
        None
    }

    async fn answer(&mut self, host: &Host<'_>, reply: &Reply) -> Result<ReplyOutcome> {
        let guess = host.extract_guess(&reply.text);
        let score = self.game.play(&guess);
        debug!("@{} guessed '{}' ({:.3})", reply.author_handle, guess, score);

        if score == 1.0 {
            let image = host.render(self.game.steps());
            host.platform
                .publish(
                    &format!(
                        "@{} Correct! I'll start a new game soon.",
                        reply.author_handle
                    ),
                    image,
                    Some(&reply.id),
                )
                .await
                .context("Failed to announce winner")?;

            if let Err(e) = host.platform.repost(&reply.id).await {
                warn!("Failed to repost winning reply {}: {:#}", reply.id, e);
            }

            self.trigger_ids.push(reply.id.clone());
            self.over = true;
            info!(
                "Game {} solved by @{}",
                self.thread_root_id, reply.author_handle
            );
            return Ok(ReplyOutcome::Solved);
        }

        self.trigger_ids.push(reply.id.clone());
        let feedback = host
            .platform
            .publish(
                &format!(
                    "@{} That's {:.1}% right.",
                    reply.author_handle,
                    score * 100.0
                ),
                None,
                Some(&reply.id),
            )
            .await;

        let feedback_id = match feedback {
            Ok(id) => {
                self.trigger_ids.push(id.clone());
                Some(id)
            }
            Err(e) => {
                warn!("Failed to post feedback for reply {}: {:#}", reply.id, e);
                None
            }
        };

        Ok(ReplyOutcome::Feedback { score, feedback_id })
    }

    /// One poll of an active session: the timeout check, then every new
    /// reply in the thread in the order it was written.
    pub async fn poll(&mut self, host: &Host<'_>, now: DateTime<Utc>) -> Result<PollOutcome> {
        if self.over {
            return Ok(PollOutcome::AlreadyOver);
        }
        if self.check_timeout(host, now).await? {
            return Ok(PollOutcome::TimedOut);
        }

        let mut replies = host
            .platform
            .fetch_replies_since(&self.thread_root_id)
            .await
            .context("Failed to fetch replies")?;
        replies.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| compare_ids(&a.id, &b.id))
        });

        let mut handled = 0;
        for reply in &replies {
            if self.over {
                break;
            }
            match self.handle_reply(host, reply).await? {
                ReplyOutcome::Duplicate | ReplyOutcome::GameOver => {}
                _ => handled += 1,
            }
        }

        Ok(PollOutcome::Processed {
            replies: handled,
            solved: self.over,
        })
    }
}

/// Numeric order for numeric ids, plain string order otherwise
fn compare_ids(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// What a poll cycle ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Created { thread_root_id: String },
    Resumed { thread_root_id: String, poll: PollOutcome },
}

/// One complete poll cycle: resume the latest unfinished session and poll
/// it, or start a new game if there is none.
pub async fn run_cycle(
    host: &Host<'_>,
    parties: &dyn PartySource,
    duration: Duration,
    now: DateTime<Utc>,
) -> Result<CycleOutcome> {
    match host.store.latest()? {
        Some(mut session) if !session.is_over() => {
            info!(
                "Resuming game {} ({} replies seen)",
                session.thread_root_id,
                session.seen_ids.len()
            );
            let poll = session.poll(host, now).await?;
            Ok(CycleOutcome::Resumed {
                thread_root_id: session.thread_root_id,
                poll,
            })
        }
        _ => {
            info!("No game in progress, generating a new party");
            let party = parties.generate().await?;
            let session = Session::create(Game::new(party), host, now, duration).await?;
            Ok(CycleOutcome::Created {
                thread_root_id: session.thread_root_id,
            })
        }
    }
}
