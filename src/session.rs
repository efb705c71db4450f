use thiserror::Error;
use tracing::{debug, info, warn};

use crate::classify::{Classifier, Notification};
use crate::client::{AnswerPayload, FailureReason};
use crate::question::{self, Question, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
}

/// Identifies one submission; only the outstanding ticket can settle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("a question is already being answered")]
    Busy,
}

/// What happened when a response came back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    Answered,
    Failed(Option<Notification>),
    /// The ticket was not the outstanding one; nothing changed.
    Stale,
}

/// Form and submission lifecycle for the single question box.
///
/// Owns the input text, the inline validation message, the
/// Idle/Submitting flag and the current answer. At most one submission is
/// outstanding at a time.
#[derive(Debug, Default)]
pub struct Session {
    input: String,
    field_error: Option<ValidationError>,
    state: SubmissionState,
    outstanding: Option<Ticket>,
    next_ticket: u64,
    result: Option<AnswerPayload>,
    classifier: Classifier,
}

impl Session {
    pub fn new(classifier: Classifier) -> Self {
        Session {
            classifier,
            ..Default::default()
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn field_error(&self) -> Option<&ValidationError> {
        self.field_error.as_ref()
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn is_submitting(&self) -> bool {
        self.state == SubmissionState::Submitting
    }

    pub fn result(&self) -> Option<&AnswerPayload> {
        self.result.as_ref()
    }

    /// Once a message is showing, every edit re-runs validation.
    pub fn set_input(&mut self, value: String) {
        self.input = value;
        if self.field_error.is_some() {
            self.field_error = question::validate(&self.input).err();
        }
    }

    /// Idle -> Submitting. The caller must issue exactly one request for the
    /// returned question and settle it with the returned ticket.
    pub fn begin(&mut self) -> Result<(Ticket, Question), Rejected> {
        if self.is_submitting() {
            warn!("submission rejected: another question is in flight");
            return Err(Rejected::Busy);
        }

        let question = match question::validate(&self.input) {
            Ok(question) => question,
            Err(e) => {
                debug!(reason = %e, "question failed validation");
                self.field_error = Some(e.clone());
                return Err(Rejected::Invalid(e));
            }
        };

        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.field_error = None;
        self.state = SubmissionState::Submitting;
        self.outstanding = Some(ticket);
        info!(ticket = ticket.0, "submitting question");

        Ok((ticket, question))
    }

    /// Submitting -> Idle, once per ticket.
    ///
    /// Success replaces the answer and clears the input. Failure keeps the
    /// input and hands the reason to the classifier.
    pub fn settle(
        &mut self,
        ticket: Ticket,
        outcome: Result<AnswerPayload, FailureReason>,
    ) -> Settled {
        if self.outstanding != Some(ticket) {
            debug!(ticket = ticket.0, "ignoring settlement for a stale ticket");
            return Settled::Stale;
        }

        self.outstanding = None;
        self.state = SubmissionState::Idle;

        match outcome {
            Ok(payload) => {
                info!(
                    ticket = ticket.0,
                    links = payload.relevant_links.len(),
                    "answer received"
                );
                self.result = Some(payload);
                self.input.clear();
                Settled::Answered
            }
            Err(failure) => Settled::Failed(self.classifier.classify(&failure)),
        }
    }

    /// Abandon the outstanding submission, if any. Its late settlement
    /// becomes stale.
    pub fn cancel(&mut self) -> bool {
        match self.outstanding.take() {
            Some(ticket) => {
                info!(ticket = ticket.0, "submission cancelled");
                self.state = SubmissionState::Idle;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RATE_LIMITED;

    fn session_with(input: &str) -> Session {
        let mut session = Session::default();
        session.set_input(input.to_string());
        session
    }

    fn paris() -> AnswerPayload {
        AnswerPayload {
            answer: "**Paris**".to_string(),
            relevant_links: vec!["https://example.com/docs/geo".to_string()],
        }
    }

    #[test]
    fn test_short_question_never_submits() {
        let mut session = session_with("Hi");
        let err = session.begin().unwrap_err();
        assert_eq!(err, Rejected::Invalid(ValidationError::TooShort));
        assert_eq!(session.field_error().unwrap().to_string(), "Min length is 3");
        assert_eq!(session.state(), SubmissionState::Idle);
        assert_eq!(session.input(), "Hi");
    }

    #[test]
    fn test_second_submit_while_busy_is_rejected() {
        let mut session = session_with("What is the capital of France?");
        let (ticket, question) = session.begin().unwrap();
        assert_eq!(question.as_str(), "What is the capital of France?");
        assert!(session.is_submitting());

        assert_eq!(session.begin().unwrap_err(), Rejected::Busy);
        assert_eq!(session.settle(ticket, Ok(paris())), Settled::Answered);
        assert_eq!(session.state(), SubmissionState::Idle);
    }

    #[test]
    fn test_success_replaces_result_and_clears_input() {
        let mut session = session_with("What is the capital of France?");
        assert!(session.result().is_none());

        let (ticket, _) = session.begin().unwrap();
        session.settle(ticket, Ok(paris()));
        assert_eq!(session.result(), Some(&paris()));
        assert_eq!(session.input(), "");

        session.set_input("And of Italy?".to_string());
        let (ticket, _) = session.begin().unwrap();
        let rome = AnswerPayload {
            answer: "Rome".to_string(),
            relevant_links: Vec::new(),
        };
        session.settle(ticket, Ok(rome.clone()));
        assert_eq!(session.result(), Some(&rome));
    }

    #[test]
    fn test_failure_keeps_input_and_result() {
        let mut session = session_with("What is the capital of France?");
        let (ticket, _) = session.begin().unwrap();
        session.settle(ticket, Ok(paris()));

        session.set_input("Why is the sky blue?".to_string());
        let (ticket, _) = session.begin().unwrap();
        let settled = session.settle(
            ticket,
            Err(FailureReason::Status {
                status: 429,
                detail: None,
            }),
        );

        match settled {
            Settled::Failed(Some(notification)) => assert_eq!(notification.message, RATE_LIMITED),
            other => panic!("unexpected settlement: {:?}", other),
        }
        assert_eq!(session.input(), "Why is the sky blue?");
        assert_eq!(session.result(), Some(&paris()));
        assert_eq!(session.state(), SubmissionState::Idle);
    }

    #[test]
    fn test_settles_exactly_once() {
        let mut session = session_with("What is the capital of France?");
        let (ticket, _) = session.begin().unwrap();

        let failure = FailureReason::Network("reset".to_string());
        assert_eq!(session.settle(ticket, Err(failure.clone())), Settled::Failed(None));
        assert_eq!(session.settle(ticket, Err(failure)), Settled::Stale);
        assert_eq!(session.settle(ticket, Ok(paris())), Settled::Stale);
        assert!(session.result().is_none());
        assert_eq!(session.input(), "What is the capital of France?");
    }

    #[test]
    fn test_cancel_returns_to_idle_and_ignores_late_answer() {
        let mut session = session_with("What is the capital of France?");
        assert!(!session.cancel());

        let (first, _) = session.begin().unwrap();
        assert!(session.cancel());
        assert_eq!(session.state(), SubmissionState::Idle);

        let (second, _) = session.begin().unwrap();
        assert_ne!(first, second);
        assert_eq!(session.settle(first, Ok(paris())), Settled::Stale);
        assert!(session.is_submitting());
        assert_eq!(session.settle(second, Ok(paris())), Settled::Answered);
    }

    #[test]
    fn test_field_error_revalidates_on_edit() {
        let mut session = session_with("");
        assert_eq!(
            session.begin().unwrap_err(),
            Rejected::Invalid(ValidationError::Required)
        );

        session.set_input("Hi".to_string());
        assert_eq!(session.field_error(), Some(&ValidationError::TooShort));

        session.set_input("Hi!".to_string());
        assert_eq!(session.field_error(), None);

        // Without a prior error, edits stay quiet.
        session.set_input("H".to_string());
        assert_eq!(session.field_error(), None);
    }
}
