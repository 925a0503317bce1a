//! The feed intake flow: enter a URL, fetch and classify it, and optionally
//! persist it as a subscribed feed source.
//!
//! The flow is modeled as one explicit state machine ([`Intake`]) rather than
//! independent boolean flags, with an async driver ([`IntakeFlow`]) wiring it
//! to the HTTP client and the database. The split keeps every transition
//! synchronously testable while the driver owns the single suspension point.
//!
//! # Concurrency
//!
//! At most one fetch is in flight per intake: a second submission while
//! `Fetching` is rejected with [`IntakeError::Busy`]. Each fetch is stamped
//! with a generation counter; [`Intake::edit_url`] and [`Intake::cancel`]
//! bump it, so a completion that arrives for a superseded fetch is discarded
//! instead of being applied to state it no longer belongs to. Dropping the
//! future returned by [`IntakeFlow::submit`] cancels the underlying request.

use thiserror::Error;
use url::Url;

use crate::feed::{fetch_and_classify, FeedFormat, FetchError, FetchLimits, ParsedFeed};
use crate::storage::{Database, DatabaseError, NewFeedSource};
use crate::util::{validate_feed_url, UrlPolicy, UrlValidationError};

// ============================================================================
// States and Errors
// ============================================================================

/// The intake flow's current position.
///
/// `Idle → Fetching → {Classified, Failed}` with `Classified → Saved` as the
/// terminal success; editing the URL returns any non-terminal state to `Idle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeState {
    /// Waiting for a submission.
    Idle,
    /// Exactly one fetch-and-classify operation is outstanding.
    Fetching,
    /// The document classified as RSS; `title` is the effective title that a
    /// save would persist (channel title, or the user's custom title).
    Classified { title: String },
    /// The fetch failed; URL and title remain editable and a resubmission
    /// retries the fetch.
    Failed { message: String },
    /// A feed source was persisted.
    Saved { id: i64 },
}

/// Errors surfaced at the intake-flow boundary.
///
/// All of these are recoverable: none terminate the process, and the flow
/// remains usable after every one of them.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// The entered URL failed validation; no network call was attempted.
    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),
    /// A fetch is already outstanding.
    #[error("a fetch is already in progress")]
    Busy,
    /// Save was requested but nothing has been classified.
    #[error("nothing to save: no classified feed")]
    NotClassified,
    /// A fetch was requested but the current result is still pending a save.
    #[error("feed already classified; save it or edit the URL to start over")]
    AlreadyClassified,
    /// The flow already saved its feed source.
    #[error("feed source already saved")]
    Finished,
    /// The insert failed.
    #[error("failed to persist feed source: {0}")]
    Persist(#[source] DatabaseError),
}

/// Proof that a fetch was begun: carries the validated URL to fetch and the
/// generation it belongs to. Consumed by [`Intake::complete_fetch`].
#[derive(Debug)]
pub struct FetchTicket {
    generation: u64,
    url: Url,
}

impl FetchTicket {
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// What applying a fetch result did to the state machine.
#[derive(Debug)]
pub enum FetchOutcome {
    /// RSS: the flow is now `Classified` with this effective title.
    Classified { title: String },
    /// Atom or JSON Feed: informational only, the flow returned to `Idle`
    /// and no feed source may be created from this result.
    NotActionable { format: FeedFormat },
    /// The fetch failed; the flow is now `Failed`.
    Failed(FetchError),
    /// The result belonged to a superseded fetch and was discarded.
    Stale,
}

// ============================================================================
// State Machine
// ============================================================================

/// The pure intake state machine. No I/O: callers perform the fetch between
/// [`begin_fetch`](Self::begin_fetch) and
/// [`complete_fetch`](Self::complete_fetch), and the insert between
/// [`begin_save`](Self::begin_save) and [`complete_save`](Self::complete_save).
#[derive(Debug)]
pub struct Intake {
    state: IntakeState,
    url_input: String,
    custom_title: Option<String>,
    policy: UrlPolicy,
    generation: u64,
}

impl Intake {
    pub fn new(policy: UrlPolicy) -> Self {
        Self {
            state: IntakeState::Idle,
            url_input: String::new(),
            custom_title: None,
            policy,
            generation: 0,
        }
    }

    pub fn state(&self) -> &IntakeState {
        &self.state
    }

    pub fn url_input(&self) -> &str {
        &self.url_input
    }

    /// Replace the URL under intake. Any prior classification, failure, or
    /// save is abandoned and an in-flight fetch is superseded.
    pub fn edit_url(&mut self, url: &str) {
        self.url_input = url.to_string();
        self.generation += 1;
        self.state = IntakeState::Idle;
    }

    /// Record a user-entered title. A non-empty custom title takes precedence
    /// over the channel title and survives classification; an empty string
    /// clears it for future fetches.
    pub fn edit_title(&mut self, title: &str) {
        let trimmed = title.trim();
        self.custom_title = (!trimmed.is_empty()).then(|| trimmed.to_string());

        if let IntakeState::Classified { title: effective } = &mut self.state {
            if let Some(custom) = &self.custom_title {
                effective.clone_from(custom);
            }
        }
    }

    /// Validate the entered URL and move to `Fetching`.
    ///
    /// # Errors
    ///
    /// - [`IntakeError::InvalidUrl`] - the input is not a fetchable URL; no
    ///   network call may be made
    /// - [`IntakeError::Busy`] - a fetch is already outstanding
    /// - [`IntakeError::AlreadyClassified`] / [`IntakeError::Finished`] - the
    ///   flow has moved past fetching
    pub fn begin_fetch(&mut self) -> Result<FetchTicket, IntakeError> {
        match self.state {
            IntakeState::Fetching => Err(IntakeError::Busy),
            IntakeState::Classified { .. } => Err(IntakeError::AlreadyClassified),
            IntakeState::Saved { .. } => Err(IntakeError::Finished),
            IntakeState::Idle | IntakeState::Failed { .. } => {
                let url = validate_feed_url(&self.url_input, &self.policy)?;
                self.generation += 1;
                self.state = IntakeState::Fetching;
                Ok(FetchTicket {
                    generation: self.generation,
                    url,
                })
            }
        }
    }

    /// Apply the result of a fetch begun with [`begin_fetch`](Self::begin_fetch).
    ///
    /// A ticket whose generation no longer matches (the URL was edited or the
    /// fetch cancelled while it was in flight) is discarded without touching
    /// state, so a late-arriving result can never double-apply.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<ParsedFeed, FetchError>,
    ) -> FetchOutcome {
        if ticket.generation != self.generation
            || !matches!(self.state, IntakeState::Fetching)
        {
            tracing::debug!(
                generation = ticket.generation,
                current = self.generation,
                "Discarding result of superseded fetch"
            );
            return FetchOutcome::Stale;
        }

        match result {
            Ok(ParsedFeed::Rss { channel }) => {
                let derived = channel.title.unwrap_or_default();
                let title = self.custom_title.clone().unwrap_or(derived);
                tracing::info!(title = %title, "Classified as RSS");
                self.state = IntakeState::Classified {
                    title: title.clone(),
                };
                FetchOutcome::Classified { title }
            }
            Ok(other) => {
                let format = other.format();
                tracing::info!(format = %format, "Classified as non-RSS; not actionable");
                self.state = IntakeState::Idle;
                FetchOutcome::NotActionable { format }
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %self.url_input, "Feed fetch failed");
                self.state = IntakeState::Failed {
                    message: e.to_string(),
                };
                FetchOutcome::Failed(e)
            }
        }
    }

    /// Abandon an outstanding fetch. Its eventual completion will be stale.
    pub fn cancel(&mut self) {
        if matches!(self.state, IntakeState::Fetching) {
            self.generation += 1;
            self.state = IntakeState::Idle;
        }
    }

    /// Produce the record to persist. Only legal once `Classified`.
    pub fn begin_save(&self) -> Result<NewFeedSource, IntakeError> {
        match &self.state {
            IntakeState::Classified { title } => Ok(NewFeedSource {
                title: title.clone(),
                url: self.url_input.trim().to_string(),
            }),
            IntakeState::Fetching => Err(IntakeError::Busy),
            IntakeState::Saved { .. } => Err(IntakeError::Finished),
            IntakeState::Idle | IntakeState::Failed { .. } => Err(IntakeError::NotClassified),
        }
    }

    /// Record a completed insert. The flow is terminal after this.
    pub fn complete_save(&mut self, id: i64) {
        if matches!(self.state, IntakeState::Classified { .. }) {
            self.state = IntakeState::Saved { id };
        }
    }
}

// ============================================================================
// Async Driver
// ============================================================================

/// Outcome of one [`IntakeFlow::submit`] call.
#[derive(Debug)]
pub enum SubmitOutcome {
    Classified { title: String },
    NotActionable { format: FeedFormat },
    FetchFailed { message: String },
    Saved { id: i64 },
}

/// Drives an [`Intake`] against the HTTP client and the database.
///
/// `submit` mirrors the single action button of the flow: from `Idle` or
/// `Failed` it fetches and classifies; from `Classified` it persists exactly
/// one feed source.
pub struct IntakeFlow {
    intake: Intake,
    client: reqwest::Client,
    db: Database,
    limits: FetchLimits,
}

impl IntakeFlow {
    pub fn new(
        client: reqwest::Client,
        db: Database,
        policy: UrlPolicy,
        limits: FetchLimits,
    ) -> Self {
        Self {
            intake: Intake::new(policy),
            client,
            db,
            limits,
        }
    }

    pub fn state(&self) -> &IntakeState {
        &self.intake.state
    }

    pub fn edit_url(&mut self, url: &str) {
        self.intake.edit_url(url);
    }

    pub fn edit_title(&mut self, title: &str) {
        self.intake.edit_title(title);
    }

    pub fn cancel(&mut self) {
        self.intake.cancel();
    }

    /// Perform the next step of the flow.
    ///
    /// All state mutation happens on the caller's task after the one
    /// suspension point resolves; dropping this future cancels the request
    /// and leaves the flow in `Fetching` until [`cancel`](Self::cancel) or
    /// [`edit_url`](Self::edit_url) resets it.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, IntakeError> {
        if matches!(self.intake.state(), IntakeState::Classified { .. }) {
            let new_source = self.intake.begin_save()?;
            let id = self
                .db
                .insert_source(&new_source)
                .await
                .map_err(IntakeError::Persist)?;
            self.intake.complete_save(id);
            tracing::info!(id, title = %new_source.title, url = %new_source.url, "Feed source saved");
            return Ok(SubmitOutcome::Saved { id });
        }

        let ticket = self.intake.begin_fetch()?;
        let result = fetch_and_classify(&self.client, ticket.url(), &self.limits).await;

        match self.intake.complete_fetch(ticket, result) {
            FetchOutcome::Classified { title } => Ok(SubmitOutcome::Classified { title }),
            FetchOutcome::NotActionable { format } => Ok(SubmitOutcome::NotActionable { format }),
            FetchOutcome::Failed(e) => Ok(SubmitOutcome::FetchFailed {
                message: e.to_string(),
            }),
            // A ticket minted in this call cannot be superseded before the
            // await resolves; kept total rather than panicking.
            FetchOutcome::Stale => Ok(SubmitOutcome::FetchFailed {
                message: "fetch was superseded".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::RssChannel;
    use pretty_assertions::assert_eq;

    fn intake_with(url: &str) -> Intake {
        let mut intake = Intake::new(UrlPolicy::permissive());
        intake.edit_url(url);
        intake
    }

    fn rss(title: Option<&str>) -> ParsedFeed {
        ParsedFeed::Rss {
            channel: RssChannel {
                title: title.map(str::to_string),
                items: Vec::new(),
            },
        }
    }

    fn atom() -> ParsedFeed {
        ParsedFeed::Atom {
            title: Some("Atom Blog".to_string()),
        }
    }

    #[test]
    fn test_rss_with_title_classifies_with_exact_title() {
        let mut intake = intake_with("https://example.com/feed.xml");
        let ticket = intake.begin_fetch().unwrap();
        assert_eq!(*intake.state(), IntakeState::Fetching);

        let outcome = intake.complete_fetch(ticket, Ok(rss(Some("Example Feed"))));
        assert!(matches!(outcome, FetchOutcome::Classified { ref title } if title == "Example Feed"));
        assert_eq!(
            *intake.state(),
            IntakeState::Classified {
                title: "Example Feed".to_string()
            }
        );
    }

    #[test]
    fn test_rss_without_title_classifies_blank() {
        let mut intake = intake_with("https://example.com/feed.xml");
        let ticket = intake.begin_fetch().unwrap();
        intake.complete_fetch(ticket, Ok(rss(None)));
        assert_eq!(
            *intake.state(),
            IntakeState::Classified {
                title: String::new()
            }
        );
    }

    #[test]
    fn test_custom_title_survives_classification() {
        let mut intake = intake_with("https://example.com/feed.xml");
        intake.edit_title("My Custom Title");

        let ticket = intake.begin_fetch().unwrap();
        intake.complete_fetch(ticket, Ok(rss(Some("Example Feed"))));

        assert_eq!(
            *intake.state(),
            IntakeState::Classified {
                title: "My Custom Title".to_string()
            }
        );
    }

    #[test]
    fn test_non_rss_returns_to_idle() {
        let mut intake = intake_with("https://example.com/feed.xml");
        let ticket = intake.begin_fetch().unwrap();

        let outcome = intake.complete_fetch(ticket, Ok(atom()));
        assert!(matches!(
            outcome,
            FetchOutcome::NotActionable {
                format: FeedFormat::Atom
            }
        ));
        assert_eq!(*intake.state(), IntakeState::Idle);
        // Nothing to save from a non-RSS classification
        assert!(matches!(
            intake.begin_save(),
            Err(IntakeError::NotClassified)
        ));
    }

    #[test]
    fn test_fetch_failure_enters_failed_and_allows_retry() {
        let mut intake = intake_with("https://example.com/feed.xml");
        let ticket = intake.begin_fetch().unwrap();

        intake.complete_fetch(ticket, Err(FetchError::HttpStatus(500)));
        assert!(matches!(intake.state(), IntakeState::Failed { .. }));

        // URL unchanged, retry permitted
        let ticket = intake.begin_fetch().unwrap();
        intake.complete_fetch(ticket, Ok(rss(Some("Example Feed"))));
        assert!(matches!(intake.state(), IntakeState::Classified { .. }));
    }

    #[test]
    fn test_second_fetch_while_fetching_is_busy() {
        let mut intake = intake_with("https://example.com/feed.xml");
        let _ticket = intake.begin_fetch().unwrap();

        assert!(matches!(intake.begin_fetch(), Err(IntakeError::Busy)));
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let mut intake = intake_with("https://example.com/feed.xml");
        let old_ticket = intake.begin_fetch().unwrap();

        // User edits the URL while the fetch is outstanding
        intake.edit_url("https://other.example.com/feed.xml");
        assert_eq!(*intake.state(), IntakeState::Idle);

        let outcome = intake.complete_fetch(old_ticket, Ok(rss(Some("Old Feed"))));
        assert!(matches!(outcome, FetchOutcome::Stale));
        // The stale result was not applied
        assert_eq!(*intake.state(), IntakeState::Idle);
    }

    #[test]
    fn test_cancel_supersedes_outstanding_fetch() {
        let mut intake = intake_with("https://example.com/feed.xml");
        let ticket = intake.begin_fetch().unwrap();

        intake.cancel();
        assert_eq!(*intake.state(), IntakeState::Idle);

        let outcome = intake.complete_fetch(ticket, Ok(rss(Some("Example Feed"))));
        assert!(matches!(outcome, FetchOutcome::Stale));
        assert_eq!(*intake.state(), IntakeState::Idle);
    }

    #[test]
    fn test_save_rejected_outside_classified() {
        let mut intake = intake_with("https://example.com/feed.xml");
        assert!(matches!(
            intake.begin_save(),
            Err(IntakeError::NotClassified)
        ));

        let _ticket = intake.begin_fetch().unwrap();
        assert!(matches!(intake.begin_save(), Err(IntakeError::Busy)));
    }

    #[test]
    fn test_save_produces_entered_url_and_effective_title() {
        let mut intake = intake_with("https://example.com/feed.xml");
        let ticket = intake.begin_fetch().unwrap();
        intake.complete_fetch(ticket, Ok(rss(Some("Example Feed"))));

        let new_source = intake.begin_save().unwrap();
        assert_eq!(new_source.title, "Example Feed");
        assert_eq!(new_source.url, "https://example.com/feed.xml");

        intake.complete_save(7);
        assert_eq!(*intake.state(), IntakeState::Saved { id: 7 });
        assert!(matches!(intake.begin_fetch(), Err(IntakeError::Finished)));
        assert!(matches!(intake.begin_save(), Err(IntakeError::Finished)));
    }

    #[test]
    fn test_invalid_url_rejected_before_fetch() {
        for bad in ["", "   ", "https://exa mple.com/feed", "not-a-url"] {
            let mut intake = intake_with(bad);
            assert!(
                matches!(intake.begin_fetch(), Err(IntakeError::InvalidUrl(_))),
                "expected InvalidUrl for {bad:?}"
            );
            // Validation failure leaves the flow usable
            assert_eq!(*intake.state(), IntakeState::Idle);
        }
    }

    #[test]
    fn test_edit_url_resets_classified() {
        let mut intake = intake_with("https://example.com/feed.xml");
        let ticket = intake.begin_fetch().unwrap();
        intake.complete_fetch(ticket, Ok(rss(Some("Example Feed"))));
        assert!(matches!(intake.state(), IntakeState::Classified { .. }));

        intake.edit_url("https://other.example.com/feed.xml");
        assert_eq!(*intake.state(), IntakeState::Idle);
    }

    #[test]
    fn test_edit_title_updates_classified_state() {
        let mut intake = intake_with("https://example.com/feed.xml");
        let ticket = intake.begin_fetch().unwrap();
        intake.complete_fetch(ticket, Ok(rss(Some("Example Feed"))));

        intake.edit_title("Renamed");
        assert_eq!(
            *intake.state(),
            IntakeState::Classified {
                title: "Renamed".to_string()
            }
        );
    }
}
