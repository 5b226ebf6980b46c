//! Investigation tests against a live OpenAI-compatible provider.
//!
//! These tests are excluded from regular CI runs because they need network
//! access and an API key in `OPENAI_API_KEY` (or the variable named by
//! `provider.api_key_env` in the default config).
//!
//! Run with: `cargo test -p stepchat --test investigation_llm -- --ignored`

use stepchat::core::sentinel::status_token;
use stepchat::core::similarity::cosine_similarity;
use stepchat::core::types::Turn;
use stepchat::io::config::ProviderConfig;
use stepchat::io::provider::{ChatProvider, HttpProvider};
use stepchat::io::script::builtin_script;
use stepchat::walker::Walker;

#[test]
#[ignore = "requires network access and an API key"]
fn live_reply_carries_a_status_token() {
    let provider = HttpProvider::from_config(&ProviderConfig::default()).expect("provider");
    let mut walker = Walker::new(builtin_script()).expect("walker");
    walker.push_user("My kitchen sink is leaking.").expect("push");

    let advance = walker.advance(&provider).expect("advance");
    eprintln!("reply: {}", advance.message);
    assert!(status_token(&advance.message).is_some() || advance.message.contains("FAIL"));
}

#[test]
#[ignore = "requires network access and an API key"]
fn live_embeddings_rank_related_text_higher() {
    let provider = HttpProvider::from_config(&ProviderConfig::default()).expect("provider");
    let inputs = [
        "My sink is leaking".to_string(),
        "Water drips from the kitchen faucet".to_string(),
        "The stock market closed higher today".to_string(),
    ];
    let vectors = provider.embed(&inputs).expect("embed");

    let related = cosine_similarity(&vectors[0], &vectors[1]).expect("similarity");
    let unrelated = cosine_similarity(&vectors[0], &vectors[2]).expect("similarity");
    assert!(related > unrelated, "{related} <= {unrelated}");
}

#[test]
#[ignore = "requires network access and an API key"]
fn live_complete_returns_text() {
    let provider = HttpProvider::from_config(&ProviderConfig::default()).expect("provider");
    let reply = provider
        .complete(&[Turn::user("Say hello.")])
        .expect("complete");
    assert!(!reply.trim().is_empty());
}
