use super::common::*;
use crate::lending::collaborators::{DocumentStore, LifecycleEvent};
use crate::lending::error::EngineError;
use crate::lending::membership::{MembershipStatus, MembershipUpdate};
use crate::sequence::SequenceStore;

#[test]
fn submissions_receive_consecutive_display_ids() {
    let harness = harness();
    let memberships = harness.desk.memberships();

    let first = memberships
        .submit(membership_submission("Anitha"))
        .expect("first submitted");
    let second = memberships
        .submit(membership_submission("Bharathi"))
        .expect("second submitted");

    assert_eq!(first.display_id, "ZMID-0000001");
    assert_eq!(second.display_id, "ZMID-0000002");
    assert_eq!(first.status, MembershipStatus::Pending);
    assert_eq!(
        memberships
            .find_by_display_id("ZMID-0000002")
            .expect("found")
            .id,
        second.id
    );
}

#[test]
fn invalid_submission_consumes_no_identifier() {
    let harness = harness();
    let mut submission = membership_submission("Chitra");
    submission.personal_info.phone = "12-34".to_string();

    let err = harness
        .desk
        .memberships()
        .submit(submission)
        .expect_err("phone rejected");

    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(harness.sequences.current("membership").expect("peek"), 0);
}

#[test]
fn reviewed_membership_cannot_be_reviewed_again() {
    let harness = harness();
    let member = approved_member(&harness);

    let err = harness
        .desk
        .memberships()
        .reject(&member.id, "auditor", Some("duplicate".to_string()))
        .expect_err("already approved");

    match err {
        EngineError::InvalidTransition(transition) => {
            assert_eq!(transition.from, "approved");
            assert_eq!(transition.to, "rejected");
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }
    let stored = harness.desk.memberships().get(&member.id).expect("stored");
    assert_eq!(stored.status, MembershipStatus::Approved);
    assert_eq!(stored.reviewed_by.as_deref(), Some("branch-manager"));
}

#[test]
fn concurrent_reviews_commit_exactly_one_outcome() {
    let harness = harness();
    let member = harness
        .desk
        .memberships()
        .submit(membership_submission("Devi"))
        .expect("submitted");

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let desk = harness.desk.clone();
                let id = member.id;
                scope.spawn(move || {
                    if i % 2 == 0 {
                        desk.memberships().approve(&id, "officer-a")
                    } else {
                        desk.memberships().reject(&id, "officer-b", None)
                    }
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread finished"))
            .collect()
    });

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|err| matches!(err, EngineError::InvalidTransition(_))));

    let stored = harness.desk.memberships().get(&member.id).expect("stored");
    assert_eq!(stored.status, winners[0].status);
    assert_eq!(harness.notifier.events().len(), 1);
}

#[test]
fn details_are_editable_only_while_pending() {
    let harness = harness();
    let memberships = harness.desk.memberships();
    let member = memberships
        .submit(membership_submission("Eswari"))
        .expect("submitted");

    let mut personal_info = member.personal_info.clone();
    personal_info.occupation = Some("Vegetable vendor".to_string());
    let updated = memberships
        .update_details(
            &member.id,
            MembershipUpdate {
                personal_info: Some(personal_info.clone()),
                ..MembershipUpdate::default()
            },
        )
        .expect("pending membership editable");
    assert_eq!(updated.display_id, member.display_id);
    assert_eq!(
        updated.personal_info.occupation.as_deref(),
        Some("Vegetable vendor")
    );

    memberships
        .approve(&member.id, "branch-manager")
        .expect("approved");
    let err = memberships
        .update_details(
            &member.id,
            MembershipUpdate {
                personal_info: Some(personal_info),
                ..MembershipUpdate::default()
            },
        )
        .expect_err("approved membership frozen");
    assert!(matches!(err, EngineError::InvalidTransition(_)));
}

#[test]
fn document_urls_resolve_known_uploads_only() {
    let harness = harness();
    let photo = harness
        .documents
        .store("photo.jpg", b"\xff\xd8")
        .expect("uploaded");
    let mut submission = membership_submission("Fathima");
    submission.documents.photo = photo;

    let member = harness
        .desk
        .memberships()
        .submit(submission)
        .expect("submitted");
    let urls = harness
        .desk
        .memberships()
        .document_urls(&member.id)
        .expect("resolved");

    assert_eq!(urls.len(), 4);
    let photo_url = urls["photo"].as_deref().expect("photo stored");
    assert!(photo_url.starts_with("https://docs.microfin.test/"));
    assert!(urls["signature"].is_none());
}

#[test]
fn lookups_reject_malformed_display_ids() {
    let harness = harness();
    let err = harness
        .desk
        .memberships()
        .find_by_display_id("ZMID-12")
        .expect_err("malformed");
    assert!(matches!(err, EngineError::Validation(_)));

    let err = harness
        .desk
        .memberships()
        .find_by_display_id("ZMID-0000404")
        .expect_err("absent");
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[test]
fn review_notifications_follow_commit() {
    let harness = harness();
    let memberships = harness.desk.memberships();
    let rejected = memberships
        .submit(membership_submission("Gowri"))
        .expect("submitted");
    memberships
        .reject(&rejected.id, "branch-manager", Some("address unverifiable".to_string()))
        .expect("rejected");

    let events = harness.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, LifecycleEvent::MembershipRejected);
    assert_eq!(events[0].subject, "ZMID-0000001");
    assert_eq!(events[0].details["reason"], "address unverifiable");
    assert_eq!(
        memberships
            .list(Some(MembershipStatus::Rejected))
            .expect("listed")
            .len(),
        1
    );
}
