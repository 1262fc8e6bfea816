//! Cause Support: supporter enrollment walk-through.
//!
//! Drives a cause page through mount, Support click, sign-in redirect and the
//! one-time survey against in-memory collaborators, using the configured
//! intent store so redirects can be exercised against Redis as well.

use std::sync::Arc;
use std::time::Duration;

use cause_cache::build_intent_store;
use cause_core::config::AppConfig;
use cause_core::event_bus::capture_sink;
use cause_core::types::{EnrollmentState, SurveyForm};
use cause_enrollment::memory::{
    demo_answers, demo_cause, demo_profile, InMemoryCauseDirectory, InMemoryJoinEndpoint,
    InMemoryProfileProvider,
};
use cause_enrollment::{EnrollmentServices, SupportPage};
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "cause-support")]
#[command(about = "Walk a visitor through supporter enrollment for a cause")]
#[command(version)]
struct Cli {
    /// Optional TOML config file
    #[arg(long)]
    config: Option<String>,

    /// Join code of the cause page to visit
    #[arg(long, default_value = "ABC123")]
    cause_code: String,

    /// Start with a signed-in viewer instead of an anonymous visitor
    #[arg(long, default_value_t = false)]
    signed_in: bool,

    /// The signed-in viewer has already taken the cause survey
    #[arg(long, default_value_t = false)]
    surveyed: bool,

    /// Make the first join call fail to exercise the retry path
    #[arg(long, default_value_t = false)]
    fail_join: bool,

    /// Intent storage scope (overrides config)
    #[arg(long, env = "CAUSE_SUPPORT__INTENT__SCOPE")]
    intent_scope: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cause_support=info,cause_enrollment=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Cause Support starting up");

    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(scope) = cli.intent_scope {
        config.intent.scope = scope;
    }

    info!(
        cause_code = %cli.cause_code,
        intent_backend = ?config.intent.backend,
        intent_key = %config.intent.storage_key(),
        "Configuration loaded"
    );

    let intents = build_intent_store(&config).await?;

    let directory = Arc::new(InMemoryCauseDirectory::new());
    directory.insert(demo_cause(&cli.cause_code));

    let endpoint = Arc::new(
        InMemoryJoinEndpoint::new(directory.clone()).with_latency(Duration::from_millis(50)),
    );
    if cli.fail_join {
        endpoint.fail_next(1);
    }

    let mut member = demo_profile("u-demo", "jordan@example.org", "Jordan Avery Reyes");
    member.has_taken_cause_survey = cli.surveyed;
    let profiles = Arc::new(if cli.signed_in {
        InMemoryProfileProvider::signed_in(member.clone())
    } else {
        InMemoryProfileProvider::anonymous()
    });

    let events = capture_sink();
    let services = EnrollmentServices::new(
        profiles.clone(),
        directory.clone(),
        endpoint.clone(),
        intents,
    )
    .with_event_sink(events.clone())
    .with_config(&config);

    let mut page = services.page(cli.cause_code.clone());
    report("mount", page.mount().await);
    report("support_clicked", page.support_clicked().await);

    if page.state() == EnrollmentState::PendingAuth {
        // Registration, email confirmation and the redirect back happen
        // outside this core; the page is rebuilt as it would be on return.
        page.teardown();
        profiles.sign_in(member.clone());
        profiles.confirm_email();
        info!(viewer_id = %member.id, "Viewer registered and confirmed email");

        page = services.page(cli.cause_code.clone());
        report("mount_after_redirect", page.mount().await);
    }

    if page.state() == EnrollmentState::PendingSurvey {
        report(
            "submit_survey",
            page.submit_survey(SurveyForm::from(demo_answers())).await,
        );
    }

    if page.state() == EnrollmentState::Error {
        info!(error = ?page.last_error(), "Retrying after failure");
        report("support_clicked_retry", page.support_clicked().await);
    }

    print_summary(&page, &events.kinds(), endpoint.call_count())?;
    Ok(())
}

fn report<E: std::fmt::Display>(step: &str, result: Result<EnrollmentState, E>) {
    match result {
        Ok(state) => info!(step, ?state, "Step complete"),
        Err(e) => warn!(step, error = %e, "Step failed"),
    }
}

fn print_summary(
    page: &SupportPage,
    events: &[cause_core::event_bus::EnrollmentEventKind],
    join_calls: usize,
) -> anyhow::Result<()> {
    let cause = page.cause();
    let summary = serde_json::json!({
        "causeCode": page.cause_code(),
        "state": page.state(),
        "callToAction": page.call_to_action(),
        "events": events,
        "joinCalls": join_calls,
        "supporterCount": cause.as_ref().map(|c| c.metrics.supporter_count),
        "supporterGoal": cause.as_ref().map(|c| c.supporter_goal),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
