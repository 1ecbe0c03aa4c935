//! Conversation state and prompt assembly tests

use iris_assistant::completion::clean_reply;
use iris_assistant::conversation::{
    ConversationHistory, ConversationTurn, DEFAULT_PREAMBLE, PromptTemplate, Session,
};

fn turn(i: usize) -> ConversationTurn {
    ConversationTurn::new(format!("question {i}"), format!("answer {i}"))
}

#[test]
fn test_seeded_prompt_exact() {
    let history = ConversationHistory::seeded(10).unwrap();
    let prompt = PromptTemplate::default().build(&history, "What time is it?");

    let expected = format!(
        "{DEFAULT_PREAMBLE}\nHuman: Hello, how are you?\nAI: I am an AI created by OpenAI.  \
         How can I help you today?\nHuman: What time is it?"
    );
    assert_eq!(prompt, expected);
}

#[test]
fn test_prompt_is_deterministic() {
    let mut session = Session::new(4, PromptTemplate::default()).unwrap();
    session.record(turn(1));

    let first = session.prompt_for("again");
    let second = session.prompt_for("again");
    assert_eq!(first, second);
}

#[test]
fn test_history_keeps_most_recent_in_order() {
    for capacity in [1, 2, 5, 10] {
        let mut history = ConversationHistory::new(capacity).unwrap();
        for i in 0..capacity * 3 {
            history.append(turn(i));
        }

        let kept = history.as_ordered_sequence();
        let expected: Vec<_> = (capacity * 2..capacity * 3).map(turn).collect();
        assert_eq!(kept, expected, "capacity {capacity}");
    }
}

#[test]
fn test_history_boundary() {
    let capacity = 4;
    let mut history = ConversationHistory::new(capacity).unwrap();

    for i in 0..capacity {
        history.append(turn(i));
    }
    assert_eq!(history.len(), capacity);
    assert_eq!(history.iter().next(), Some(&turn(0)));

    history.append(turn(capacity));
    assert_eq!(history.len(), capacity);
    assert_eq!(history.iter().next(), Some(&turn(1)));
    assert_eq!(history.latest(), Some(&turn(capacity)));
}

#[test]
fn test_seed_scrolls_out_of_prompt() {
    let mut session = Session::new(2, PromptTemplate::default()).unwrap();
    session.record(turn(1));
    session.record(turn(2));

    let prompt = session.prompt_for("next");
    assert!(!prompt.contains("Hello, how are you?"));
    assert!(prompt.contains("\nHuman: question 1\nAI: answer 1\nHuman: question 2\nAI: answer 2"));
}

#[test]
fn test_zero_capacity_rejected() {
    assert!(ConversationHistory::new(0).is_err());
    assert!(Session::new(0, PromptTemplate::default()).is_err());
}

#[test]
fn test_reply_cleanup() {
    assert_eq!(clean_reply("AI: The weather\nis sunny.AI:"), "The weatheris sunny.");
    assert_eq!(clean_reply(" Sure thing."), "Sure thing.");
    assert_eq!(clean_reply("\n\n"), "");
}
