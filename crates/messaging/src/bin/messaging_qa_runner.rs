use std::env;
use std::sync::Arc;
use std::time::Duration;

use snafu::{OptionExt, ResultExt, Snafu};
use tokio::sync::Notify;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tradelink_gateway::{CompletionGateway, ScriptedGateway};
use tradelink_messaging::{
    ConversationId, EngineConfig, MessageStore, MessagingEngine, MessagingError,
    PendingFlags, Roster, SendOutcome, Sender, VoiceNote, DEFAULT_REPLY_ERROR_TEXT,
};

#[derive(Debug, Clone)]
struct RunnerArgs {
    scenario: Scenario,
}

#[derive(Debug, Clone, Copy)]
enum Scenario {
    SendHappyPath,
    ReplyFailure,
    BusyRejection,
    StaleSuggestions,
    Attachments,
    Selector,
    All,
}

impl Scenario {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "send_happy_path" => Some(Self::SendHappyPath),
            "reply_failure" => Some(Self::ReplyFailure),
            "busy_rejection" => Some(Self::BusyRejection),
            "stale_suggestions" => Some(Self::StaleSuggestions),
            "attachments" => Some(Self::Attachments),
            "selector" => Some(Self::Selector),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::SendHappyPath => "send_happy_path",
            Self::ReplyFailure => "reply_failure",
            Self::BusyRejection => "busy_rejection",
            Self::StaleSuggestions => "stale_suggestions",
            Self::Attachments => "attachments",
            Self::Selector => "selector",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Snafu)]
enum RunnerError {
    #[snafu(display("missing required --scenario argument"))]
    MissingScenario { stage: &'static str },
    #[snafu(display("missing value for argument '{arg}'"))]
    MissingArgumentValue {
        stage: &'static str,
        arg: &'static str,
    },
    #[snafu(display("unknown scenario '{raw}'"))]
    UnknownScenario { stage: &'static str, raw: String },
    #[snafu(display("unknown argument '{raw}'"))]
    UnknownArgument { stage: &'static str, raw: String },
    #[snafu(display("messaging call failed: {source}"))]
    Messaging {
        stage: &'static str,
        source: MessagingError,
    },
    #[snafu(display("scenario '{scenario}' failed: {reason}"))]
    ScenarioFailed {
        stage: &'static str,
        scenario: &'static str,
        reason: String,
    },
}

type RunnerResult<T> = Result<T, RunnerError>;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(error) = run().await {
        println!("runner_ok=false");
        eprintln!("runner_error={error}");
        std::process::exit(1);
    }
}

async fn run() -> RunnerResult<()> {
    let args = parse_args(env::args().skip(1))?;
    println!("scenario={}", args.scenario.name());

    match args.scenario {
        Scenario::SendHappyPath => run_send_happy_path().await,
        Scenario::ReplyFailure => run_reply_failure().await,
        Scenario::BusyRejection => run_busy_rejection().await,
        Scenario::StaleSuggestions => run_stale_suggestions().await,
        Scenario::Attachments => run_attachments().await,
        Scenario::Selector => run_selector().await,
        Scenario::All => run_all().await,
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> RunnerResult<RunnerArgs> {
    let mut scenario = None;
    let mut pending = args.into_iter();

    while let Some(argument) = pending.next() {
        match argument.as_str() {
            "--scenario" => {
                let value = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-scenario-value",
                    arg: "--scenario",
                })?;
                let parsed = Scenario::parse(&value).context(UnknownScenarioSnafu {
                    stage: "parse-args-scenario",
                    raw: value,
                })?;
                scenario = Some(parsed);
            }
            other => {
                return UnknownArgumentSnafu {
                    stage: "parse-args",
                    raw: other.to_string(),
                }
                .fail();
            }
        }
    }

    Ok(RunnerArgs {
        scenario: scenario.context(MissingScenarioSnafu { stage: "parse-args" })?,
    })
}

async fn run_all() -> RunnerResult<()> {
    run_send_happy_path().await?;
    run_reply_failure().await?;
    run_busy_rejection().await?;
    run_stale_suggestions().await?;
    run_attachments().await?;
    run_selector().await?;
    println!("runner_ok=true");
    Ok(())
}

fn conversation() -> ConversationId {
    ConversationId::new(1)
}

fn seeded_engine(gateway: Arc<ScriptedGateway>) -> Arc<MessagingEngine> {
    let store = Arc::new(MessageStore::new());
    for (conversation_id, drafts) in Roster::builtin_seed_messages() {
        store.seed(conversation_id, drafts);
    }
    Arc::new(MessagingEngine::with_store(
        store,
        Roster::builtin(),
        gateway as Arc<dyn CompletionGateway>,
        EngineConfig::default(),
    ))
}

fn check(scenario: &'static str, stage: &'static str, ok: bool, reason: &str) -> RunnerResult<()> {
    if ok {
        return Ok(());
    }
    ScenarioFailedSnafu {
        stage,
        scenario,
        reason: reason.to_string(),
    }
    .fail()
}

async fn wait_until(mut predicate: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    false
}

async fn run_send_happy_path() -> RunnerResult<()> {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push_reply("Next Tuesday.");
    gateway.push_suggestions(vec!["Thanks!", "Can you confirm the carrier?"]);
    let engine = seeded_engine(gateway);
    engine.select_conversation(conversation()).context(MessagingSnafu {
        stage: "scenario-happy-path-select",
    })?;
    let seeded = engine.messages(conversation()).len();

    let outcome = engine
        .send(conversation(), "When will the shipment arrive?")
        .await
        .context(MessagingSnafu {
            stage: "scenario-happy-path-send",
        })?;

    let messages = engine.messages(conversation());
    check(
        "send_happy_path",
        "scenario-happy-path-count",
        messages.len() == seeded + 2,
        "expected user message plus contact reply",
    )?;
    check(
        "send_happy_path",
        "scenario-happy-path-read",
        messages
            .iter()
            .filter(|message| message.sender == Sender::User)
            .all(|message| message.is_read),
        "all user messages should be read after the reply",
    )?;
    check(
        "send_happy_path",
        "scenario-happy-path-suggestions",
        engine.suggestions(conversation()).len() == 2,
        "published suggestion set should survive",
    )?;
    check(
        "send_happy_path",
        "scenario-happy-path-outcome",
        matches!(outcome, SendOutcome::Replied { .. }),
        "outcome should be Replied",
    )?;

    println!("send_happy_path_ok=true");
    Ok(())
}

async fn run_reply_failure() -> RunnerResult<()> {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push_reply_failure("backend unavailable");
    let engine = seeded_engine(gateway.clone());

    let outcome = engine
        .send(conversation(), "Are you there?")
        .await
        .context(MessagingSnafu {
            stage: "scenario-reply-failure-send",
        })?;

    let messages = engine.messages(conversation());
    let last = messages.last();
    check(
        "reply_failure",
        "scenario-reply-failure-notice",
        last.is_some_and(|message| {
            message.sender == Sender::Contact
                && message.body.as_text() == Some(DEFAULT_REPLY_ERROR_TEXT)
        }),
        "error notice should be the last message",
    )?;
    check(
        "reply_failure",
        "scenario-reply-failure-unread",
        messages
            .iter()
            .rev()
            .find(|message| message.sender == Sender::User)
            .is_some_and(|message| !message.is_read),
        "failed cycle must not mark the sent message read",
    )?;
    check(
        "reply_failure",
        "scenario-reply-failure-no-suggestion-call",
        gateway.suggestion_calls() == 0,
        "no suggestion call may run after a reply error",
    )?;
    check(
        "reply_failure",
        "scenario-reply-failure-outcome",
        matches!(outcome, SendOutcome::ReplyFailed { .. }),
        "outcome should be ReplyFailed",
    )?;

    println!("reply_failure_ok=true");
    Ok(())
}

async fn run_busy_rejection() -> RunnerResult<()> {
    let gateway = Arc::new(ScriptedGateway::new());
    let gate = Arc::new(Notify::new());
    gateway.gate_replies(gate.clone());
    gateway.push_reply("held");
    gateway.push_suggestions(vec![]);
    let engine = seeded_engine(gateway.clone());

    let background = engine.clone();
    let first = tokio::spawn(async move { background.send(conversation(), "first").await });
    let armed = {
        let gateway = gateway.clone();
        wait_until(move || gateway.reply_calls() == 1).await
    };
    check(
        "busy_rejection",
        "scenario-busy-armed",
        armed,
        "first send never reached the gateway",
    )?;

    let second = engine.send(conversation(), "second").await;
    check(
        "busy_rejection",
        "scenario-busy-rejected",
        matches!(second, Err(MessagingError::ConversationBusy { .. })),
        "second send should be rejected while a reply is in flight",
    )?;
    check(
        "busy_rejection",
        "scenario-busy-single-call",
        gateway.reply_calls() == 1,
        "rejected send must not hit the gateway",
    )?;

    gate.notify_one();
    let outcome = first.await.map_err(|join_error| {
        ScenarioFailedSnafu {
            stage: "scenario-busy-join",
            scenario: "busy_rejection",
            reason: join_error.to_string(),
        }
        .build()
    })?;
    check(
        "busy_rejection",
        "scenario-busy-first-completes",
        outcome.is_ok(),
        "first send should still complete",
    )?;

    println!("busy_rejection_ok=true");
    Ok(())
}

async fn run_stale_suggestions() -> RunnerResult<()> {
    let gateway = Arc::new(ScriptedGateway::new());
    let gate = Arc::new(Notify::new());
    gateway.gate_suggestions(gate.clone());
    gateway.push_reply("reply lands");
    gateway.push_suggestions(vec!["too late"]);
    let engine = seeded_engine(gateway.clone());
    engine.select_conversation(conversation()).context(MessagingSnafu {
        stage: "scenario-stale-select",
    })?;

    let background = engine.clone();
    let send_task = tokio::spawn(async move { background.send(conversation(), "hello").await });
    let armed = {
        let gateway = gateway.clone();
        wait_until(move || gateway.suggestion_calls() == 1).await
    };
    check(
        "stale_suggestions",
        "scenario-stale-armed",
        armed,
        "suggestion phase never started",
    )?;

    engine
        .select_conversation(ConversationId::new(2))
        .context(MessagingSnafu {
            stage: "scenario-stale-switch",
        })?;
    gate.notify_one();

    let outcome = send_task.await.map_err(|join_error| {
        ScenarioFailedSnafu {
            stage: "scenario-stale-join",
            scenario: "stale_suggestions",
            reason: join_error.to_string(),
        }
        .build()
    })?;
    check(
        "stale_suggestions",
        "scenario-stale-send-ok",
        outcome.is_ok(),
        "send itself should succeed",
    )?;
    check(
        "stale_suggestions",
        "scenario-stale-discarded",
        engine.suggestions(conversation()).is_empty(),
        "stale suggestion result must be discarded",
    )?;
    check(
        "stale_suggestions",
        "scenario-stale-idle",
        engine.pending_flags(conversation()) == PendingFlags::default(),
        "pipeline should be back to idle",
    )?;

    println!("stale_suggestions_ok=true");
    Ok(())
}

async fn run_attachments() -> RunnerResult<()> {
    let gateway = Arc::new(ScriptedGateway::new());
    let engine = seeded_engine(gateway.clone());
    let before = engine.messages(conversation()).len();

    engine
        .attach_file(
            conversation(),
            tradelink_messaging::FileAttachment::new("invoice.pdf", "application/pdf", 2_048),
        )
        .context(MessagingSnafu {
            stage: "scenario-attachments-file",
        })?;
    engine
        .attach_voice_note(conversation(), VoiceNote::new(12))
        .context(MessagingSnafu {
            stage: "scenario-attachments-voice",
        })?;

    check(
        "attachments",
        "scenario-attachments-count",
        engine.messages(conversation()).len() == before + 2,
        "both attachments should be appended",
    )?;
    check(
        "attachments",
        "scenario-attachments-no-gateway",
        gateway.reply_calls() == 0 && gateway.suggestion_calls() == 0,
        "attachments must never invoke the gateway",
    )?;

    println!("attachments_ok=true");
    Ok(())
}

async fn run_selector() -> RunnerResult<()> {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push_reply("sure");
    gateway.push_suggestions(vec!["chip"]);
    let engine = seeded_engine(gateway);
    engine.select_conversation(conversation()).context(MessagingSnafu {
        stage: "scenario-selector-select",
    })?;
    engine
        .send(conversation(), "quick one")
        .await
        .context(MessagingSnafu {
            stage: "scenario-selector-send",
        })?;
    let messages_before = engine.messages(conversation()).len();

    engine
        .select_conversation(ConversationId::new(2))
        .context(MessagingSnafu {
            stage: "scenario-selector-switch",
        })?;

    check(
        "selector",
        "scenario-selector-cleared",
        engine.suggestions(conversation()).is_empty(),
        "switching away should clear the previous suggestions",
    )?;
    check(
        "selector",
        "scenario-selector-store-intact",
        engine.messages(conversation()).len() == messages_before,
        "selection must not mutate the store",
    )?;

    println!("selector_ok=true");
    Ok(())
}
