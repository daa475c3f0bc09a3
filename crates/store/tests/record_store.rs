//! Record store integration tests.
//!
//! These tests drive the repository through full complaint lifecycles.

#![allow(clippy::unwrap_used)]

use campus_store::{ComplaintRepository, ComplaintStatus, NewComplaint, Resolution};

fn submission(title: &str, student_id: Option<&str>, is_anonymous: bool) -> NewComplaint {
    NewComplaint {
        title: title.to_string(),
        description: "details".to_string(),
        submitted_by: "Sam Student".to_string(),
        is_anonymous,
        student_id: student_id.map(String::from),
    }
}

#[test]
fn test_submission_order_is_preserved() {
    let mut repo = ComplaintRepository::default();
    let first = repo.submit(submission("Cafeteria Food Quality", None, true));
    let second = repo.submit(submission("Library Hours Extension", Some("s-1"), false));

    let titles: Vec<&str> = repo.all().iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Cafeteria Food Quality", "Library Hours Extension"]);
    assert_eq!(repo.all()[0].id, first.id);
    assert_eq!(repo.all()[1].id, second.id);
}

#[test]
fn test_order_survives_status_changes() {
    let mut repo = ComplaintRepository::default();
    let a = repo.submit(submission("A", None, false));
    let b = repo.submit(submission("B", None, false));
    let c = repo.submit(submission("C", None, false));

    repo.set_status(&b.id, Resolution::Resolved, None).unwrap();
    repo.set_status(&a.id, Resolution::Rejected, None).unwrap();

    let ids: Vec<&str> = repo.all().iter().map(|x| x.id.as_str()).collect();
    assert_eq!(ids, vec![a.id.as_str(), b.id.as_str(), c.id.as_str()]);
}

#[test]
fn test_anonymous_without_link_never_matches_submitter_query() {
    let mut repo = ComplaintRepository::default();
    let hidden = repo.submit(submission("Harassment", None, true));
    repo.submit(submission("Lab equipment", Some("s-1"), false));

    for candidate in ["s-1", "s-2", "", "Anonymous", "Sam Student", hidden.id.as_str()] {
        assert!(
            repo.find_by_student(candidate)
                .iter()
                .all(|c| c.id != hidden.id),
            "anonymous complaint leaked for {candidate:?}"
        );
    }
}

#[test]
fn test_resolve_then_reject_keeps_resolved() {
    let mut repo = ComplaintRepository::default();
    let complaint = repo.submit(submission("Hostel water", Some("s-3"), false));

    repo.set_status(&complaint.id, Resolution::Resolved, None).unwrap();
    assert!(repo.set_status(&complaint.id, Resolution::Rejected, None).is_err());
    assert!(repo.set_status(&complaint.id, Resolution::Resolved, None).is_err());

    assert_eq!(repo.get(&complaint.id).unwrap().status, ComplaintStatus::Resolved);
}

#[test]
fn test_ids_are_unique() {
    let mut repo = ComplaintRepository::default();
    let mut ids: Vec<String> = (0..200)
        .map(|i| repo.submit(submission(&format!("c{i}"), None, false)).id)
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 200);
}
