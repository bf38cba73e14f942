mod common;

use std::time::{Duration, Instant};

use common::{dispatcher, dispatcher_with, lines, throttled, ScriptedTransport, StubRenderer};
use mailshot::{Error, Halt, Shutdown};
use pretty_assertions::assert_eq;

const ALICE: &str = "Alice\tal@x.com";
const BOB: &str = "Bob\tbo@x.com";
const CAROL: &str = "Carol\tca@x.com";
const DAVE: &str = "Dave\tda@x.com";
const EVE: &str = "Eve\tev@x.com";

#[test]
fn budget_of_one_leaves_the_rest_untouched() {
    let mut d = dispatcher(1, ScriptedTransport::default());

    let report = d.dispatch(&lines(&[ALICE, BOB]), &[], &[]).unwrap();

    assert_eq!(report.newly_sent, lines(&[ALICE]));
    assert!(report.newly_bad.is_empty());
    assert_eq!(report.attempts, 1);
    assert_eq!(report.not_attempted, 1);
    assert_eq!(report.halt, Halt::BudgetExhausted);
    assert_eq!(d.transport().sent_to(), vec!["al@x.com"]);
}

#[test]
fn always_failing_transport_marks_recipient_bad() {
    let mut d = dispatcher(5, ScriptedTransport::always_failing());

    let report = d.dispatch(&lines(&[EVE]), &[], &[]).unwrap();

    assert!(report.newly_sent.is_empty());
    assert_eq!(report.newly_bad, lines(&[EVE]));
    assert_eq!(report.attempts, 1);
    assert_eq!(report.halt, Halt::Completed);
}

#[test]
fn already_sent_is_never_passed_to_the_transport() {
    let mut d = dispatcher(10, ScriptedTransport::default());

    let report = d
        .dispatch(&lines(&[ALICE, BOB, CAROL]), &lines(&[ALICE, CAROL]), &[])
        .unwrap();

    assert_eq!(d.transport().attempts, vec!["bo@x.com"]);
    assert_eq!(report.newly_sent, lines(&[BOB]));
    assert_eq!(report.skipped_already_sent, 2);
}

#[test]
fn skips_do_not_consume_budget() {
    let mut d = dispatcher(1, ScriptedTransport::default());

    let report = d
        .dispatch(
            &lines(&[ALICE, BOB, CAROL, DAVE]),
            &lines(&[ALICE]),
            &lines(&[BOB]),
        )
        .unwrap();

    assert_eq!(report.newly_sent, lines(&[CAROL]));
    assert_eq!(report.skipped_already_sent, 1);
    assert_eq!(report.skipped_bad, 1);
    assert_eq!(report.not_attempted, 1);
    assert_eq!(d.transport().attempts, vec!["ca@x.com"]);
}

#[test]
fn failure_is_isolated_and_consumes_budget() {
    let mut d = dispatcher(3, ScriptedTransport::failing_for(&["bo@x.com"]));

    let report = d
        .dispatch(&lines(&[ALICE, BOB, CAROL, DAVE]), &[], &[])
        .unwrap();

    assert_eq!(report.newly_sent, lines(&[ALICE, CAROL]));
    assert_eq!(report.newly_bad, lines(&[BOB]));
    assert_eq!(report.attempts, 3);
    assert_eq!(report.not_attempted, 1);
    assert_eq!(
        d.transport().attempts,
        vec!["al@x.com", "bo@x.com", "ca@x.com"]
    );
}

#[test]
fn budget_bounds_attempts_when_everything_fails() {
    let candidates = lines(&[ALICE, BOB, CAROL, DAVE, EVE]);
    for budget in 0..=6 {
        let mut d = dispatcher(budget, ScriptedTransport::always_failing());
        let report = d.dispatch(&candidates, &[], &[]).unwrap();
        assert!(report.newly_sent.len() + report.newly_bad.len() <= budget);
        assert_eq!(report.attempts, budget.min(candidates.len()));
    }
}

#[test]
fn zero_budget_attempts_nothing() {
    let mut d = dispatcher(0, ScriptedTransport::default());

    let report = d.dispatch(&lines(&[ALICE]), &[], &[]).unwrap();

    assert_eq!(report.attempts, 0);
    assert_eq!(report.not_attempted, 1);
    assert!(d.transport().attempts.is_empty());
}

#[test]
fn render_failure_lands_in_bad_set() {
    let mut d = dispatcher_with(
        5,
        StubRenderer::broken_for(&["Bob"]),
        ScriptedTransport::default(),
    );

    let report = d.dispatch(&lines(&[ALICE, BOB, CAROL]), &[], &[]).unwrap();

    assert_eq!(report.newly_sent, lines(&[ALICE, CAROL]));
    assert_eq!(report.newly_bad, lines(&[BOB]));
    assert_eq!(d.transport().attempts, vec!["al@x.com", "ca@x.com"]);
}

#[test]
fn duplicate_candidate_is_sent_once() {
    let mut d = dispatcher(5, ScriptedTransport::default());

    let report = d.dispatch(&lines(&[ALICE, BOB, ALICE]), &[], &[]).unwrap();

    assert_eq!(report.newly_sent, lines(&[ALICE, BOB]));
    assert_eq!(report.skipped_already_sent, 1);
    assert_eq!(report.attempts, 2);
}

#[test]
fn duplicate_of_a_failed_candidate_is_not_retried() {
    let mut d = dispatcher(5, ScriptedTransport::failing_for(&["bo@x.com"]));

    let report = d.dispatch(&lines(&[BOB, BOB]), &[], &[]).unwrap();

    assert_eq!(report.newly_bad, lines(&[BOB]));
    assert_eq!(report.skipped_bad, 1);
    assert_eq!(d.transport().attempts.len(), 1);
}

#[test]
fn identity_is_the_whole_line() {
    let renamed = "Alice Smith\tal@x.com";
    let mut d = dispatcher(5, ScriptedTransport::default());

    let report = d.dispatch(&lines(&[renamed]), &lines(&[ALICE]), &[]).unwrap();

    assert_eq!(report.newly_sent, lines(&[renamed]));
}

#[test]
fn message_is_personalised() {
    let mut d = dispatcher(5, ScriptedTransport::default());

    d.dispatch(&lines(&[BOB]), &[], &[]).unwrap();

    let mail = &d.transport().sent[0];
    assert_eq!(mail.to, "bo@x.com");
    assert_eq!(mail.to_name.as_deref(), Some("Bob"));
    assert_eq!(mail.from, "dora@example.com");
    assert_eq!(mail.from_name.as_deref(), Some("Dora"));
    assert_eq!(mail.subject, "Spring meetup");
    assert_eq!(mail.text, "Hi Bob, Dora");
}

#[test]
fn two_runs_mail_everyone_exactly_once() {
    let candidates = lines(&[ALICE, BOB, CAROL, DAVE, EVE]);
    let mut sent = Vec::new();
    let mut bad = Vec::new();

    for _ in 0..2 {
        let mut d = dispatcher(10, ScriptedTransport::failing_for(&["ca@x.com"]));
        let report = d.dispatch(&candidates, &sent, &bad).unwrap();
        sent.extend(report.newly_sent);
        bad.extend(report.newly_bad);
    }

    assert_eq!(sent, lines(&[ALICE, BOB, DAVE, EVE]));
    assert_eq!(bad, lines(&[CAROL]));
}

#[test]
fn malformed_line_aborts_with_progress() {
    let mut d = dispatcher(10, ScriptedTransport::failing_for(&["bo@x.com"]));
    let candidates = lines(&[ALICE, BOB, CAROL, "no tab here", DAVE]);

    let aborted = d
        .dispatch(&candidates, &lines(&[CAROL]), &[])
        .unwrap_err();

    assert!(matches!(aborted.error, Error::MalformedRecipient(_)));
    assert_eq!(aborted.report.newly_sent, lines(&[ALICE]));
    assert_eq!(aborted.report.newly_bad, lines(&[BOB]));
    assert_eq!(aborted.report.skipped_already_sent, 1);
    assert_eq!(d.transport().attempts, vec!["al@x.com", "bo@x.com"]);
}

#[test]
fn shutdown_stops_before_the_next_recipient() {
    let shutdown = Shutdown::new();
    shutdown.request();
    let mut d = dispatcher(10, ScriptedTransport::default()).with_shutdown(shutdown);

    let report = d.dispatch(&lines(&[ALICE, BOB]), &[], &[]).unwrap();

    assert_eq!(report.halt, Halt::Shutdown);
    assert_eq!(report.not_attempted, 2);
    assert!(d.transport().attempts.is_empty());
}

#[test]
fn events_follow_the_classification() {
    let mut d = dispatcher(2, ScriptedTransport::failing_for(&["ca@x.com"]));

    d.dispatch(
        &lines(&[ALICE, BOB, CAROL, DAVE, EVE]),
        &lines(&[ALICE]),
        &lines(&[BOB]),
    )
    .unwrap();

    assert_eq!(
        d.logger().events,
        vec![
            format!("skip-sent {ALICE}"),
            format!("skip-bad {BOB}"),
            format!("failed {CAROL}"),
            format!("sent {DAVE}"),
            "budget 1".to_string(),
            "finished 2".to_string(),
        ]
    );
}

const INTERVAL: Duration = Duration::from_millis(200);

#[test]
fn failures_are_not_followed_by_a_pause() {
    let mut d = throttled(10, ScriptedTransport::always_failing(), INTERVAL);

    let start = Instant::now();
    let report = d.dispatch(&lines(&[ALICE, BOB, CAROL]), &[], &[]).unwrap();

    assert_eq!(report.newly_bad.len(), 3);
    assert!(start.elapsed() < INTERVAL, "took {:?}", start.elapsed());
}

#[test]
fn skips_are_not_followed_by_a_pause() {
    let mut d = throttled(10, ScriptedTransport::default(), INTERVAL);

    let start = Instant::now();
    let report = d
        .dispatch(
            &lines(&[ALICE, BOB, CAROL]),
            &lines(&[ALICE, BOB]),
            &lines(&[CAROL]),
        )
        .unwrap();

    assert_eq!(report.attempts, 0);
    assert!(start.elapsed() < INTERVAL, "took {:?}", start.elapsed());
}

#[test]
fn every_success_is_followed_by_a_pause() {
    let mut d = throttled(10, ScriptedTransport::default(), INTERVAL);

    let start = Instant::now();
    let report = d.dispatch(&lines(&[ALICE, BOB, CAROL]), &[], &[]).unwrap();

    assert_eq!(report.newly_sent.len(), 3);
    assert!(start.elapsed() >= INTERVAL * 3, "took {:?}", start.elapsed());
}
