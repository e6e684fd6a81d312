//! The dispatch scheduler sends one message to each recipient in turn.
//!
//! Every recipient gets its own session through the [`Transport`]; a
//! failure is recorded against that recipient and the run moves on. Pauses
//! between attempts are driven by a [`PacingPolicy`] through a [`Pacer`].
//!
//! ```rust
//! use smtp_dispatch::{
//!     dispatch::{Dispatcher, PacingPolicy},
//!     message::MessageContent,
//!     transport::{
//!         smtp::{RelayCredentials, TransportSecurity},
//!         stub::StubTransport,
//!     },
//! };
//!
//! # fn main() -> Result<(), smtp_dispatch::Error> {
//! let relay = RelayCredentials::new(
//!     "relay.example.org",
//!     587,
//!     TransportSecurity::Upgrade,
//!     "noreply@example.org",
//!     "secret",
//! );
//! let content = MessageContent::new("Reminder", "Hello", "<p>Hello</p>");
//! let recipients = vec!["a@example.com".to_owned(), "b@example.com".to_owned()];
//!
//! let mut report: Vec<String> = Vec::new();
//! let mut dispatcher = Dispatcher::new(StubTransport::new_ok());
//! let summary = dispatcher.run(
//!     &recipients,
//!     &relay,
//!     &content,
//!     &PacingPolicy::default(),
//!     false,
//!     &mut report,
//! )?;
//!
//! assert_eq!(summary.delivered(), 2);
//! # Ok(())
//! # }
//! ```

use std::fmt::{self, Display};

pub use self::{
    pacing::{DelayPoint, Pacer, PacingPolicy, ThreadPacer},
    report::{ConsoleReport, Report},
};
use crate::{
    error::Error, message::MessageContent, transport::smtp::RelayCredentials, Transport,
};

mod pacing;
mod report;

/// Number of recipients listed by a dry run
pub const PREVIEW_LEN: usize = 5;

/// What happened to one recipient
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum DispatchOutcome {
    /// The relay accepted the message
    Delivered,
    /// The attempt failed, with the reason
    Failed(String),
}

/// A recipient the run could not deliver to
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct FailedRecipient {
    /// The address
    pub recipient: String,
    /// Why the attempt failed
    pub reason: String,
}

impl Display for FailedRecipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.recipient, self.reason)
    }
}

/// Totals of a run, folded from the outcome of every attempt
///
/// Outside dry runs `total == delivered + failed`.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct RunSummary {
    total: usize,
    delivered: usize,
    failures: Vec<FailedRecipient>,
    dry_run: bool,
}

impl RunSummary {
    /// The summary of a dry run over `total` recipients
    pub fn dry_run(total: usize) -> Self {
        RunSummary {
            total,
            dry_run: true,
            ..RunSummary::default()
        }
    }

    /// Folds one outcome in
    pub fn record(&mut self, recipient: &str, outcome: DispatchOutcome) {
        self.total += 1;
        match outcome {
            DispatchOutcome::Delivered => self.delivered += 1,
            DispatchOutcome::Failed(reason) => self.failures.push(FailedRecipient {
                recipient: recipient.to_owned(),
                reason,
            }),
        }
    }

    /// Recipients considered
    pub fn total(&self) -> usize {
        self.total
    }

    /// Recipients the relay accepted a message for
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Recipients whose attempt failed
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Failed recipients, in attempt order
    pub fn failures(&self) -> &[FailedRecipient] {
        &self.failures
    }

    /// Tells if this summarises a dry run
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Tells if no recipient failed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, DispatchOutcome)> for RunSummary {
    fn from_iter<I: IntoIterator<Item = (&'a str, DispatchOutcome)>>(iter: I) -> Self {
        let mut summary = RunSummary::default();
        for (recipient, outcome) in iter {
            summary.record(recipient, outcome);
        }
        summary
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total: {}, delivered: {}, failed: {}",
            self.total,
            self.delivered,
            self.failed()
        )?;
        if self.dry_run {
            f.write_str(" (dry run)")?;
        }
        for failure in &self.failures {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

/// Sends a run of messages, one recipient at a time
#[derive(Debug)]
pub struct Dispatcher<T, P = ThreadPacer> {
    transport: T,
    pacer: P,
}

impl<T> Dispatcher<T, ThreadPacer> {
    /// Creates a dispatcher sleeping the calling thread between attempts
    pub fn new(transport: T) -> Self {
        Dispatcher {
            transport,
            pacer: ThreadPacer,
        }
    }
}

impl<T, P> Dispatcher<T, P>
where
    T: Transport,
    T::Error: Display,
    P: Pacer,
{
    /// Creates a dispatcher with its own pacer
    pub fn with_pacer(transport: T, pacer: P) -> Self {
        Dispatcher { transport, pacer }
    }

    /// The transport messages go through
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Attempts every recipient once, in order
    ///
    /// Only an invalid `relay` fails the run, and it does so before any
    /// recipient is attempted. A dry run previews the content and sends
    /// nothing.
    pub fn run<R: Report + ?Sized>(
        &mut self,
        recipients: &[String],
        relay: &RelayCredentials,
        content: &MessageContent,
        pacing: &PacingPolicy,
        dry_run: bool,
        report: &mut R,
    ) -> Result<RunSummary, Error> {
        relay.validate()?;

        if dry_run {
            let summary = preview(recipients, content, report);
            report.summary(&summary);
            return Ok(summary);
        }

        let total = recipients.len();
        #[cfg(feature = "tracing")]
        tracing::info!(
            "dispatching to {total} recipient(s) through {}:{}",
            relay.host(),
            relay.port()
        );

        let mut summary = RunSummary::default();
        for (index, recipient) in recipients.iter().enumerate() {
            let attempt = index + 1;
            report.progress(&format!("[{attempt}/{total}] sending to {recipient}"));

            let outcome = self.attempt(relay, content, recipient);
            match outcome {
                DispatchOutcome::Delivered => {
                    report.progress(&format!("[{attempt}/{total}] delivered to {recipient}"));
                }
                DispatchOutcome::Failed(ref reason) => {
                    report.progress(&format!(
                        "[{attempt}/{total}] failed for {recipient}: {reason}"
                    ));
                }
            }
            summary.record(recipient, outcome);

            for (point, duration) in pacing.delay_points(attempt, total) {
                self.pacer.pause(point, duration);
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            "run finished, {} delivered, {} failed",
            summary.delivered(),
            summary.failed()
        );

        report.summary(&summary);
        Ok(summary)
    }

    fn attempt(
        &self,
        relay: &RelayCredentials,
        content: &MessageContent,
        recipient: &str,
    ) -> DispatchOutcome {
        let message = content.compose_for(relay, recipient);

        match self.transport.send(relay, &message) {
            Ok(_) => {
                #[cfg(feature = "tracing")]
                tracing::info!("delivered to {recipient}");
                DispatchOutcome::Delivered
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "sending {:?} to {recipient} failed: {err}",
                    content.subject()
                );
                DispatchOutcome::Failed(err.to_string())
            }
        }
    }
}

fn preview<R: Report + ?Sized>(
    recipients: &[String],
    content: &MessageContent,
    report: &mut R,
) -> RunSummary {
    let shown = recipients.len().min(PREVIEW_LEN);

    report.progress(&format!("dry run: subject {:?}", content.subject()));
    report.progress(&format!(
        "dry run: {} recipient(s), showing first {shown}:",
        recipients.len()
    ));
    for recipient in &recipients[..shown] {
        report.progress(&format!("  - {recipient}"));
    }

    RunSummary::dry_run(recipients.len())
}

#[cfg(test)]
mod test {
    use std::{cell::RefCell, time::Duration};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        error,
        transport::{
            smtp::{
                response::{Code, Response, Severity},
                TransportSecurity,
            },
            stub::StubTransport,
        },
        Envelope,
    };

    fn relay() -> RelayCredentials {
        RelayCredentials::new(
            "relay.example.org",
            587,
            TransportSecurity::Upgrade,
            "noreply@example.org",
            "s3cret",
        )
    }

    fn content() -> MessageContent {
        MessageContent::new("Reminder", "Hello", "<p>Hello</p>")
    }

    fn recipients(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("user{i}@example.com")).collect()
    }

    /// Events seen by the transport and the pacer, in order
    #[derive(Debug, PartialEq, Eq, Clone)]
    enum Event {
        Attempt(String),
        Pause(DelayPoint, Duration),
    }

    #[derive(Default)]
    struct Journal {
        events: RefCell<Vec<Event>>,
    }

    struct RecordingTransport<'a> {
        journal: &'a Journal,
        failing: Vec<&'static str>,
    }

    impl Transport for RecordingTransport<'_> {
        type Ok = Response;
        type Error = Error;

        fn send_raw(
            &self,
            _relay: &RelayCredentials,
            envelope: &Envelope,
            _email: &[u8],
        ) -> Result<Response, Error> {
            self.journal
                .events
                .borrow_mut()
                .push(Event::Attempt(envelope.to().to_owned()));

            if self.failing.iter().any(|failing| *failing == envelope.to()) {
                Err(error::protocol(
                    "AUTH LOGIN secret",
                    Some(Code::new(Severity::PermanentNegativeCompletion, 3, 5)),
                    "5.7.8 Authentication credentials invalid",
                ))
            } else {
                Ok(Response::new(
                    Code::new(Severity::PositiveCompletion, 5, 0),
                    vec!["Ok".to_owned()],
                ))
            }
        }
    }

    struct RecordingPacer<'a> {
        journal: &'a Journal,
    }

    impl Pacer for RecordingPacer<'_> {
        fn pause(&mut self, point: DelayPoint, duration: Duration) {
            self.journal
                .events
                .borrow_mut()
                .push(Event::Pause(point, duration));
        }
    }

    fn dispatcher<'a>(
        journal: &'a Journal,
        failing: Vec<&'static str>,
    ) -> Dispatcher<RecordingTransport<'a>, RecordingPacer<'a>> {
        Dispatcher::with_pacer(
            RecordingTransport { journal, failing },
            RecordingPacer { journal },
        )
    }

    #[test]
    fn one_batch_pause_for_twelve_recipients() {
        let journal = Journal::default();
        let pacing = PacingPolicy::new(Duration::ZERO, 10, Duration::from_secs(2)).unwrap();
        let recipients = recipients(12);

        let summary = dispatcher(&journal, vec![])
            .run(&recipients, &relay(), &content(), &pacing, false, &mut Vec::<String>::new())
            .unwrap();

        assert_eq!(summary.total(), 12);
        assert_eq!(summary.delivered(), 12);

        let events = journal.events.into_inner();
        let batch_pauses: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, event)| matches!(event, Event::Pause(DelayPoint::AfterBatch, _)))
            .map(|(position, _)| position)
            .collect();
        assert_eq!(batch_pauses.len(), 1);

        let pause = batch_pauses[0];
        let attempts_before = events[..pause]
            .iter()
            .filter(|event| matches!(event, Event::Attempt(_)))
            .count();
        assert_eq!(attempts_before, 10);
        assert_eq!(
            events[pause],
            Event::Pause(DelayPoint::AfterBatch, Duration::from_secs(2))
        );
        assert_eq!(
            events[pause + 1],
            Event::Attempt("user11@example.com".to_owned())
        );
    }

    #[test]
    fn pauses_strictly_between_attempts() {
        let journal = Journal::default();
        let pacing =
            PacingPolicy::new(Duration::from_millis(250), 2, Duration::from_secs(1)).unwrap();

        dispatcher(&journal, vec![])
            .run(&recipients(3), &relay(), &content(), &pacing, false, &mut Vec::<String>::new())
            .unwrap();

        assert_eq!(
            journal.events.into_inner(),
            vec![
                Event::Attempt("user1@example.com".to_owned()),
                Event::Pause(DelayPoint::AfterMessage, Duration::from_millis(250)),
                Event::Attempt("user2@example.com".to_owned()),
                Event::Pause(DelayPoint::AfterMessage, Duration::from_millis(250)),
                Event::Pause(DelayPoint::AfterBatch, Duration::from_secs(1)),
                Event::Attempt("user3@example.com".to_owned()),
            ]
        );
    }

    #[test]
    fn empty_run() {
        let journal = Journal::default();
        let mut report: Vec<String> = Vec::new();

        let summary = dispatcher(&journal, vec![])
            .run(&[], &relay(), &content(), &PacingPolicy::default(), false, &mut report)
            .unwrap();

        assert_eq!(summary, RunSummary::default());
        assert!(journal.events.into_inner().is_empty());
        assert_eq!(report, vec!["total: 0, delivered: 0, failed: 0".to_owned()]);
    }

    #[test]
    fn dry_run_sends_nothing() {
        let journal = Journal::default();
        let mut report: Vec<String> = Vec::new();

        let summary = dispatcher(&journal, vec![])
            .run(
                &recipients(3),
                &relay(),
                &content(),
                &PacingPolicy::default(),
                true,
                &mut report,
            )
            .unwrap();

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.delivered(), 0);
        assert_eq!(summary.failed(), 0);
        assert!(summary.is_dry_run());
        assert!(journal.events.into_inner().is_empty());
        assert_eq!(
            report,
            vec![
                "dry run: subject \"Reminder\"".to_owned(),
                "dry run: 3 recipient(s), showing first 3:".to_owned(),
                "  - user1@example.com".to_owned(),
                "  - user2@example.com".to_owned(),
                "  - user3@example.com".to_owned(),
                "total: 3, delivered: 0, failed: 0 (dry run)".to_owned(),
            ]
        );
    }

    #[test]
    fn dry_run_preview_is_capped() {
        let journal = Journal::default();
        let mut report: Vec<String> = Vec::new();

        dispatcher(&journal, vec![])
            .run(
                &recipients(8),
                &relay(),
                &content(),
                &PacingPolicy::default(),
                true,
                &mut report,
            )
            .unwrap();

        assert_eq!(report[1], "dry run: 8 recipient(s), showing first 5:");
        assert_eq!(
            report.iter().filter(|line| line.starts_with("  - ")).count(),
            PREVIEW_LEN
        );
    }

    #[test]
    fn failed_authentication_does_not_stop_the_run() {
        let journal = Journal::default();
        let mut report: Vec<String> = Vec::new();

        let summary = dispatcher(&journal, vec!["user2@example.com"])
            .run(
                &recipients(3),
                &relay(),
                &content(),
                &PacingPolicy::default(),
                false,
                &mut report,
            )
            .unwrap();

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.delivered(), 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.total(), summary.delivered() + summary.failed());
        assert_eq!(
            summary.failures(),
            &[FailedRecipient {
                recipient: "user2@example.com".to_owned(),
                reason: "protocol: AUTH LOGIN secret answered 535: \
                         5.7.8 Authentication credentials invalid"
                    .to_owned(),
            }]
        );

        let attempts = journal
            .events
            .into_inner()
            .into_iter()
            .filter(|event| matches!(event, Event::Attempt(_)))
            .count();
        assert_eq!(attempts, 3);
        assert!(report.contains(&"[3/3] delivered to user3@example.com".to_owned()));
        assert!(report.contains(
            &"[2/3] failed for user2@example.com: protocol: AUTH LOGIN secret answered 535: \
              5.7.8 Authentication credentials invalid"
                .to_owned()
        ));
    }

    #[test]
    fn invalid_relay_aborts_before_any_attempt() {
        let journal = Journal::default();
        let mut report: Vec<String> = Vec::new();
        let relay = RelayCredentials::new(
            "relay.example.org",
            587,
            TransportSecurity::Upgrade,
            "noreply@example.org",
            "",
        );

        let err = dispatcher(&journal, vec![])
            .run(
                &recipients(3),
                &relay,
                &content(),
                &PacingPolicy::default(),
                false,
                &mut report,
            )
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(journal.events.into_inner().is_empty());
        assert!(report.is_empty());
    }

    #[test]
    fn messages_are_composed_per_recipient() {
        let transport = StubTransport::new_ok();
        let mut dispatcher = Dispatcher::with_pacer(transport, ThreadPacer);

        dispatcher
            .run(
                &recipients(2),
                &relay().sender_name("Reminders"),
                &content(),
                &PacingPolicy::default(),
                false,
                &mut Vec::<String>::new(),
            )
            .unwrap();

        let messages = dispatcher.transport().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].0.from(), "noreply@example.org");
        assert_eq!(messages[1].0.to(), "user2@example.com");
        assert!(messages[1].1.contains("To: user2@example.com\r\n"));
        assert!(messages[0]
            .1
            .contains("From: \"Reminders\" <noreply@example.org>\r\n"));
    }

    #[test]
    fn summary_folds_outcomes() {
        let summary: RunSummary = [
            ("a@example.com", DispatchOutcome::Delivered),
            ("b@example.com", DispatchOutcome::Failed("connection: timed out".to_owned())),
            ("c@example.com", DispatchOutcome::Delivered),
        ]
        .into_iter()
        .collect();

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.delivered(), 2);
        assert!(!summary.is_success());
        assert_eq!(
            summary.to_string(),
            "total: 3, delivered: 2, failed: 1\n  b@example.com: connection: timed out"
        );
    }
}
