//! Interaction loop tests over stub collaborators

use iris_assistant::conversation::DEFAULT_PREAMBLE;
use iris_assistant::{CycleOutcome, Error};

mod common;

use common::{AudioEvent, Tally, StubMicrophone, assistant, ok};

const GREETING: &str = "Nice to see you again, how can I help?";
const FAREWELL: &str = "shutting down";

#[tokio::test]
async fn test_exit_speaks_farewell_once() {
    let tally = Tally::default();
    let mut iris = assistant(&tally, StubMicrophone::new(&tally), vec![ok("exit")], vec![]);

    iris.run_until(std::future::pending()).await;

    assert_eq!(tally.spoken(), vec![GREETING, FAREWELL]);
    assert!(tally.prompts().is_empty());
    assert_eq!(iris.session().history().len(), 1);
}

#[tokio::test]
async fn test_punctuated_exit_is_an_ordinary_turn() {
    let tally = Tally::default();
    let mut iris = assistant(
        &tally,
        StubMicrophone::new(&tally),
        vec![ok("Exit."), ok("exit")],
        vec![ok("Exit where?")],
    );

    iris.run_until(std::future::pending()).await;

    assert_eq!(tally.prompts().len(), 1);
    assert!(tally.prompts()[0].ends_with("\nHuman: Exit."));
    assert_eq!(tally.spoken(), vec![GREETING, "Exit where?", FAREWELL]);
    assert_eq!(iris.session().history().len(), 2);
}

#[tokio::test]
async fn test_cycle_replies_and_records_turn() {
    let tally = Tally::default();
    let mut iris = assistant(
        &tally,
        StubMicrophone::new(&tally),
        vec![ok("What time is it?")],
        vec![ok("It is noon.")],
    );

    let outcome = iris.run_cycle().await.unwrap();

    let CycleOutcome::Completed(turn) = outcome else {
        panic!("expected a completed turn");
    };
    assert_eq!(turn.user_utterance(), "What time is it?");
    assert_eq!(turn.assistant_reply(), "It is noon.");

    assert_eq!(
        tally.prompts(),
        vec![format!(
            "{DEFAULT_PREAMBLE}\nHuman: Hello, how are you?\nAI: I am an AI created by OpenAI.  \
             How can I help you today?\nHuman: What time is it?"
        )]
    );
    assert_eq!(tally.spoken(), vec!["It is noon."]);

    let history = iris.session().history();
    assert_eq!(history.len(), 2);
    assert_eq!(history.latest(), Some(&turn));
}

#[tokio::test]
async fn test_reply_played_after_working_loop_stops() {
    let tally = Tally::default();
    let mut iris = assistant(&tally, StubMicrophone::new(&tally), vec![ok("hi")], vec![ok("Hello!")]);

    iris.run_cycle().await.unwrap();

    let audio = tally.audio();
    assert_eq!(
        &audio[audio.len() - 2..],
        &[AudioEvent::Stop, AudioEvent::Speech("Hello!".to_string())]
    );
}

#[tokio::test]
async fn test_missed_capture_retries_without_wakeword() {
    let tally = Tally::default();
    let mut iris = assistant(
        &tally,
        StubMicrophone::failing(&tally, 1),
        vec![ok("Tell me a joke")],
        vec![ok("No.")],
    );

    let outcome = iris.run_cycle().await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Completed(_)));
    assert_eq!(tally.listens.get(), 2);
    // Only the first attempt waited for the wake word
    assert_eq!(tally.polls.get(), 2);
}

#[tokio::test]
async fn test_completion_error_is_not_recorded() {
    let tally = Tally::default();
    let mut iris = assistant(
        &tally,
        StubMicrophone::new(&tally),
        vec![ok("hi")],
        vec![Err(Error::Completion("rate limited".to_string()))],
    );

    let result = iris.run_cycle().await;

    assert!(matches!(result, Err(Error::Completion(_))));
    assert_eq!(iris.session().history().len(), 1);
    assert!(tally.spoken().is_empty());
}

#[tokio::test]
async fn test_loop_continues_after_failed_cycle() {
    let tally = Tally::default();
    let mut iris = assistant(
        &tally,
        StubMicrophone::new(&tally),
        vec![ok("hi"), ok("How are you?"), ok("exit")],
        vec![Err(Error::Completion("timeout".to_string())), ok("Fine.")],
    );

    iris.run_until(std::future::pending()).await;

    assert_eq!(tally.prompts().len(), 2);
    assert_eq!(tally.spoken(), vec![GREETING, "Fine.", FAREWELL]);

    // The failed turn is dropped, the next one is kept
    let history = iris.session().history();
    assert_eq!(history.len(), 2);
    assert_eq!(history.latest().map(|t| t.user_utterance()), Some("How are you?"));
}

#[tokio::test]
async fn test_shutdown_ends_loop_without_farewell() {
    let tally = Tally::default();
    let mut iris = assistant(&tally, StubMicrophone::new(&tally), vec![ok("hi")], vec![]);

    iris.run_until(std::future::ready(())).await;

    assert_eq!(tally.spoken(), vec![GREETING]);
    assert_eq!(tally.polls.get(), 0);
}
