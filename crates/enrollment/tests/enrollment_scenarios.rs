//! End-to-end enrollment scenarios against the in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use cause_cache::MemoryIntentStore;
use cause_core::event_bus::{capture_sink, CaptureSink, EnrollmentEventKind};
use cause_core::types::{
    Citizenship, EnrollmentState, Profile, SupporterRecord, SupporterRef, SurveyForm,
    VoterRegistration, VotingIntent,
};
use cause_core::IntentStore;
use cause_enrollment::memory::{
    demo_answers, demo_cause, demo_profile, InMemoryCauseDirectory, InMemoryJoinEndpoint,
    InMemoryProfileProvider,
};
use cause_enrollment::{EnrollmentServices, SupporterMatcher};

struct World {
    services: EnrollmentServices,
    profiles: Arc<InMemoryProfileProvider>,
    directory: Arc<InMemoryCauseDirectory>,
    endpoint: Arc<InMemoryJoinEndpoint>,
    intents: Arc<MemoryIntentStore>,
    events: Arc<CaptureSink>,
}

fn world(profiles: InMemoryProfileProvider) -> World {
    let directory = Arc::new(InMemoryCauseDirectory::new());
    directory.insert(demo_cause("ABC123"));
    let endpoint = Arc::new(
        InMemoryJoinEndpoint::new(directory.clone()).with_latency(Duration::from_millis(25)),
    );
    let profiles = Arc::new(profiles);
    let intents = Arc::new(MemoryIntentStore::new());
    let events = capture_sink();
    let services = EnrollmentServices::new(
        profiles.clone(),
        directory.clone(),
        endpoint.clone(),
        intents.clone(),
    )
    .with_event_sink(events.clone());

    World {
        services,
        profiles,
        directory,
        endpoint,
        intents,
        events,
    }
}

fn new_member() -> Profile {
    let mut profile = demo_profile("u-42", "grace@example.org", "Grace Brewster Hopper");
    profile.is_verified = false;
    profile
}

fn surveyed_member() -> Profile {
    let mut profile = demo_profile("u-7", "ada@example.org", "Ada Lovelace");
    profile.has_taken_cause_survey = true;
    profile
}

#[tokio::test]
async fn test_anonymous_support_survives_registration_redirect() {
    let w = world(InMemoryProfileProvider::anonymous());

    let page = w.services.page("ABC123");
    page.mount().await.unwrap();
    assert_eq!(page.support_clicked().await.unwrap(), EnrollmentState::PendingAuth);
    assert_eq!(w.intents.get().await.unwrap().unwrap().cause_code, "ABC123");
    assert!(w.intents.has_pending_intent().await.unwrap());
    page.teardown();

    // Registration and email confirmation happen on other pages.
    w.profiles.sign_in(new_member());
    w.profiles.confirm_email();

    let returned = w.services.page("ABC123");
    assert_eq!(returned.mount().await.unwrap(), EnrollmentState::PendingSurvey);
    assert_eq!(w.endpoint.call_count(), 0);
    assert!(w.intents.get().await.unwrap().is_none());
    assert_eq!(
        w.events.kinds(),
        vec![EnrollmentEventKind::ShowAuthPrompt, EnrollmentEventKind::ShowSurvey]
    );

    // Finishing the survey joins in the same pipeline.
    let state = returned
        .submit_survey(SurveyForm::from(demo_answers()))
        .await
        .unwrap();
    assert_eq!(state, EnrollmentState::Supporter);
    assert_eq!(w.endpoint.call_count(), 1);
    let requests = w.endpoint.requests();
    let (code, request) = &requests[0];
    assert_eq!(code, "ABC123");
    assert_eq!(request.first_name, "Grace");
    assert_eq!(request.last_name, "Brewster Hopper");
    assert!(w.profiles.current().unwrap().has_taken_cause_survey);
    // Once after saving the answers, once after the join.
    assert_eq!(w.profiles.refresh_count(), 2);
}

#[tokio::test]
async fn test_surveyed_viewer_joins_directly() {
    let w = world(InMemoryProfileProvider::signed_in(surveyed_member()));
    let page = w.services.page("ABC123");
    assert_eq!(page.mount().await.unwrap(), EnrollmentState::NotSupporter);
    assert!(page.call_to_action().enabled);

    assert_eq!(page.support_clicked().await.unwrap(), EnrollmentState::Supporter);

    let cta = page.call_to_action();
    assert!(!cta.enabled);
    assert_eq!(cta.label, "You are a supporter");
    assert_eq!(w.events.count_kind(EnrollmentEventKind::EnrollmentSucceeded), 1);

    // Supporter count comes from the refetched cause.
    assert_eq!(page.cause().unwrap().metrics.supporter_count, 1);
    assert_eq!(w.directory.fetch_count(), 2);
}

#[tokio::test]
async fn test_email_only_record_counts_as_supporter() {
    let w = world(InMemoryProfileProvider::signed_in(demo_profile(
        "u-1",
        "a@b.com",
        "Ada Lovelace",
    )));
    let mut cause = demo_cause("ABC123");
    cause.supporters.push(SupporterRef::Record(SupporterRecord {
        id: None,
        email: Some("a@b.com".to_string()),
        user: None,
    }));
    assert!(SupporterMatcher::match_cause(
        &cause,
        w.profiles.current().as_ref()
    ));
    w.directory.insert(cause);

    let page = w.services.page("ABC123");
    assert_eq!(page.mount().await.unwrap(), EnrollmentState::Supporter);
    assert!(page.already_enrolled());
    assert_eq!(page.call_to_action().label, "You are a supporter");
}

#[tokio::test]
async fn test_failed_survey_submit_never_joins() {
    let w = world(InMemoryProfileProvider::signed_in(new_member()));
    let page = w.services.page("ABC123");
    page.mount().await.unwrap();
    assert_eq!(page.support_clicked().await.unwrap(), EnrollmentState::PendingSurvey);

    w.profiles.fail_next_update(1);
    let err = page
        .submit_survey(SurveyForm::from(demo_answers()))
        .await
        .unwrap_err();
    assert!(err.is_network());

    assert!(!w.profiles.current().unwrap().has_taken_cause_survey);
    assert_eq!(w.endpoint.call_count(), 0);
    assert_eq!(page.state(), EnrollmentState::Error);
    assert!(page.call_to_action().enabled);
    assert!(page.last_error().unwrap().contains("Profile update"));
    assert_eq!(w.events.count_kind(EnrollmentEventKind::EnrollmentFailed), 1);

    // Support is still clickable and leads back to the survey.
    assert_eq!(page.support_clicked().await.unwrap(), EnrollmentState::PendingSurvey);
}

#[tokio::test]
async fn test_rapid_double_click_sends_one_join() {
    let w = world(InMemoryProfileProvider::signed_in(surveyed_member()));
    let page = w.services.page("ABC123");
    page.mount().await.unwrap();

    let (first, second) = tokio::join!(page.support_clicked(), page.support_clicked());

    assert_eq!(first.unwrap(), EnrollmentState::Supporter);
    assert!(second.is_ok());
    assert_eq!(w.endpoint.call_count(), 1);
    assert_eq!(page.state(), EnrollmentState::Supporter);
}

#[tokio::test]
async fn test_two_pages_share_the_join_guard() {
    let w = world(InMemoryProfileProvider::signed_in(surveyed_member()));
    let left = w.services.page("ABC123");
    let right = w.services.page("ABC123");
    left.mount().await.unwrap();
    right.mount().await.unwrap();

    let (a, b) = tokio::join!(left.support_clicked(), right.support_clicked());
    assert_eq!(a.unwrap(), EnrollmentState::Supporter);
    assert_eq!(b.unwrap(), EnrollmentState::Joining);
    assert_eq!(w.endpoint.call_count(), 1);

    // The other page catches up on its next mount.
    assert_eq!(right.mount().await.unwrap(), EnrollmentState::Supporter);
}

#[tokio::test]
async fn test_join_failure_after_survey_resumes_at_support() {
    let w = world(InMemoryProfileProvider::signed_in(new_member()));
    let page = w.services.page("ABC123");
    page.mount().await.unwrap();
    page.support_clicked().await.unwrap();

    w.endpoint.fail_next(1);
    assert!(page
        .submit_survey(SurveyForm::from(demo_answers()))
        .await
        .is_err());
    assert_eq!(page.state(), EnrollmentState::Error);
    // Answers were stored server-side, so the next click goes straight to join.
    assert!(page.viewer().has_taken_survey());

    assert_eq!(page.support_clicked().await.unwrap(), EnrollmentState::Supporter);
    assert_eq!(w.endpoint.call_count(), 2);
    assert_eq!(w.profiles.update_count(), 1);
}

#[tokio::test]
async fn test_incomplete_survey_form_is_rejected_before_any_call() {
    let w = world(InMemoryProfileProvider::signed_in(new_member()));
    let page = w.services.page("ABC123");
    page.mount().await.unwrap();
    page.support_clicked().await.unwrap();

    let form = SurveyForm {
        citizenship: Some(Citizenship::Citizen),
        is_voter: Some(VoterRegistration::Registered),
        will_vote: None,
    };
    assert!(page.submit_survey(form).await.is_err());
    assert_eq!(page.state(), EnrollmentState::PendingSurvey);
    assert_eq!(w.profiles.update_count(), 0);

    let complete = SurveyForm {
        will_vote: Some(VotingIntent::Undecided),
        ..SurveyForm::from(demo_answers())
    };
    assert_eq!(page.submit_survey(complete).await.unwrap(), EnrollmentState::Supporter);
}

#[tokio::test]
async fn test_other_tab_intent_is_consumed_by_last_writer() {
    // Two tabs share one storage scope; the later click overwrites the earlier.
    let w = world(InMemoryProfileProvider::anonymous());
    w.directory.insert(demo_cause("XYZ789"));

    let tab_a = w.services.page("ABC123");
    let tab_b = w.services.page("XYZ789");
    tab_a.mount().await.unwrap();
    tab_b.mount().await.unwrap();
    tab_a.support_clicked().await.unwrap();
    tab_b.support_clicked().await.unwrap();
    assert_eq!(w.intents.get().await.unwrap().unwrap().cause_code, "XYZ789");

    w.profiles.sign_in(surveyed_member());
    assert_eq!(tab_a.mount().await.unwrap(), EnrollmentState::NotSupporter);
    assert_eq!(tab_b.mount().await.unwrap(), EnrollmentState::Supporter);
    assert!(w.intents.get().await.unwrap().is_none());
}
