use kinedl::{queue::QueueError, JobId, JobQueue, JobRequest, JobState, Resolution};

fn request(title: &str) -> JobRequest {
    JobRequest::new(title, title.to_lowercase())
}

fn titles(queue: &JobQueue) -> Vec<String> {
    queue.snapshot().into_iter().map(|job| job.title).collect()
}

#[test]
fn test_append_then_remove() {
    let queue = JobQueue::new();
    queue.append([request("Existing 1"), request("Existing 2")]);
    let original = queue.len();
    let before = queue.snapshot();

    let ids = queue.append([request("A"), request("B"), request("C")]);
    assert_eq!(queue.len(), original + 3);
    assert_eq!(queue.pending_positions(), vec![0, 1, 2, 3, 4]);

    // position 3 is "B"
    let outcome = queue.remove(&[original + 1]);
    assert_eq!(outcome.removed, vec![ids[1]]);
    assert!(outcome.rejected.is_empty());

    assert_eq!(queue.len(), original + 2);
    assert_eq!(queue.get(original + 1).unwrap().title, "C");
    assert_eq!(queue.position_of(ids[2]), Some(original + 1));
    assert_eq!(queue.position_of(ids[1]), None);
    assert_eq!(queue.pending_positions(), vec![0, 1, 2, 3]);
    assert!(queue
        .pending_positions()
        .iter()
        .all(|&position| queue.get(position).unwrap().id != ids[1]));

    // unrelated entries are untouched
    for (position, job) in before.iter().enumerate() {
        let current = queue.get(position).unwrap();
        assert_eq!(current.id, job.id);
        assert_eq!(current.title, job.title);
        assert_eq!(current.state, JobState::Pending);
    }
}

#[test]
fn test_remove_batch_refers_to_positions_at_call_time() {
    let queue = JobQueue::new();
    queue.append(["A", "B", "C", "D"].map(request));

    let outcome = queue.remove(&[0, 2, 7]);
    assert_eq!(outcome.removed, vec![JobId(2), JobId(0)]);
    assert_eq!(outcome.rejected, vec![QueueError::NoSuchPosition(7)]);
    assert_eq!(titles(&queue), vec!["B", "D"]);
}

#[test]
fn test_set_resolution_before_run() {
    let queue = JobQueue::new();
    queue.append([request("A")]);

    queue.set_resolution(0, Resolution::new(1280, 720)).unwrap();
    assert_eq!(
        queue.get(0).unwrap().resolution,
        Some(Resolution::new(1280, 720))
    );
    assert_eq!(
        queue.set_resolution(1, Resolution::new(1280, 720)),
        Err(QueueError::NoSuchPosition(1))
    );
    assert!(!queue.is_running());
}
