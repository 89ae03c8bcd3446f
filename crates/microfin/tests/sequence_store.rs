//! Durable counters: values survive a restart and never repeat.

use microfin::config::EngineConfig;
use microfin::identifier::IdentifierKind;
use microfin::lending::LendingDesk;
use microfin::sequence::{FileSequenceStore, SequenceStore};

#[test]
fn file_backed_counters_survive_restart() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("counters.json");

    {
        let store = FileSequenceStore::open(&path).expect("store opens");
        assert_eq!(store.next("loan").expect("first"), 1);
        assert_eq!(store.next("loan").expect("second"), 2);
    }

    let reopened = FileSequenceStore::open(&path).expect("store reopens");
    assert_eq!(reopened.current("loan").expect("peek"), 2);
    assert_eq!(reopened.next("loan").expect("third"), 3);
    assert_eq!(reopened.current("membership").expect("untouched"), 0);
}

#[test]
fn desk_issues_identifiers_from_the_configured_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("counters.json");
    let seeded = FileSequenceStore::open(&path).expect("store opens");
    seeded
        .reset_to(IdentifierKind::Membership.sequence_name(), 41)
        .expect("seeded");

    let config = EngineConfig {
        sequence_file: Some(path.clone()),
        ..EngineConfig::default()
    };
    let desk = LendingDesk::in_memory(&config).expect("desk wired");
    let submission = serde_json::from_value(serde_json::json!({
        "personal_info": {
            "full_name": "Nandhini",
            "date_of_birth": "1994-07-02",
            "phone": "9000011111"
        },
        "address": {
            "line1": "8 Canal Bank Road",
            "city": "Trichy",
            "state": "Tamil Nadu",
            "postal_code": "620001"
        },
        "documents": {
            "photo": "p",
            "identity_proof": "i",
            "address_proof": "a",
            "signature": "s"
        }
    }))
    .expect("valid payload");

    let member = desk.memberships().submit(submission).expect("submitted");
    assert_eq!(member.display_id, "ZMID-0000042");

    let reread = FileSequenceStore::open(&path).expect("store reopens");
    assert_eq!(reread.current("membership").expect("peek"), 42);
}
