use std::sync::Once;

use distiller_core::{
    update, JobCategory, JobCreate, JobType, Params, RejectReason, SessionEffect, SessionMsg,
    SessionState,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(distiller_logging::initialize_for_tests);
}

fn streaming_request(machine: &str) -> JobCreate {
    JobCreate {
        job_type: JobType::Streaming,
        scan_id: None,
        machine: machine.to_string(),
        params: Params::new(),
    }
}

fn submit(state: SessionState, can_run: bool) -> (SessionState, Vec<SessionEffect>) {
    update(
        state,
        SessionMsg::SubmitRequested {
            request: streaming_request("m1"),
            can_run,
        },
    )
}

fn running(job_id: u64) -> SessionState {
    let (state, _) = submit(SessionState::Idle, true);
    let (state, _) = update(state, SessionMsg::SubmitSucceeded { job_id });
    state
}

#[test]
fn submit_from_idle_starts_and_requests_creation() {
    init_logging();
    let (state, effects) = submit(SessionState::Idle, true);

    assert_eq!(state, SessionState::Starting);
    assert_eq!(effects, vec![SessionEffect::CreateJob(streaming_request("m1"))]);
    assert_eq!(state.active_session(), None);
}

#[test]
fn successful_creation_becomes_the_active_session() {
    init_logging();
    let state = running(42);
    assert_eq!(state, SessionState::Running { job_id: 42 });
    assert_eq!(state.active_session(), Some(42));
}

#[test]
fn failed_creation_returns_to_idle_without_a_session() {
    init_logging();
    let (state, _) = submit(SessionState::Idle, true);
    let (state, effects) = update(state, SessionMsg::SubmitFailed);

    assert_eq!(state, SessionState::Idle);
    assert!(effects.is_empty());
    assert_eq!(state.active_session(), None);
}

#[test]
fn submit_is_rejected_when_the_machine_cannot_run() {
    init_logging();
    let (state, effects) = submit(SessionState::Idle, false);

    assert_eq!(state, SessionState::Idle);
    assert_eq!(
        effects,
        vec![SessionEffect::Rejected(RejectReason::MachineUnavailable)]
    );
}

#[test]
fn submit_is_rejected_while_a_session_is_active() {
    init_logging();
    for active in [
        SessionState::Starting,
        SessionState::Running { job_id: 1 },
        SessionState::Cancelling { job_id: 1 },
    ] {
        let (state, effects) = submit(active, true);
        assert_eq!(state, active);
        assert_eq!(effects, vec![SessionEffect::Rejected(RejectReason::SessionActive)]);
    }
}

#[test]
fn cancel_flags_pending_immediately_and_requests_cancellation() {
    init_logging();
    let (state, effects) = update(running(7), SessionMsg::CancelRequested);

    assert_eq!(state, SessionState::Cancelling { job_id: 7 });
    assert!(state.pending_cancel());
    assert_eq!(state.active_session(), Some(7));
    assert_eq!(effects, vec![SessionEffect::CancelJob { job_id: 7 }]);
}

#[test]
fn cancel_without_session_is_rejected() {
    init_logging();
    let (state, effects) = update(SessionState::Idle, SessionMsg::CancelRequested);
    assert_eq!(state, SessionState::Idle);
    assert_eq!(
        effects,
        vec![SessionEffect::Rejected(RejectReason::NoActiveSession)]
    );
}

#[test]
fn repeated_cancel_keeps_the_outstanding_request() {
    init_logging();
    let (state, _) = update(running(7), SessionMsg::CancelRequested);
    let (state, effects) = update(state, SessionMsg::CancelRequested);
    assert_eq!(state, SessionState::Cancelling { job_id: 7 });
    assert!(effects.is_empty());
}

#[test]
fn terminal_observation_while_cancelling_clears_the_session() {
    init_logging();
    let (state, _) = update(running(7), SessionMsg::CancelRequested);
    let (state, _) = update(
        state,
        SessionMsg::JobObserved {
            job_id: 7,
            category: JobCategory::Running,
        },
    );
    assert!(state.pending_cancel(), "non-terminal updates keep cancelling");

    let (state, _) = update(
        state,
        SessionMsg::JobObserved {
            job_id: 7,
            category: JobCategory::Complete,
        },
    );
    assert_eq!(state, SessionState::Cancelled { job_id: 7 });
    assert!(!state.pending_cancel());
    assert_eq!(state.active_session(), None);
    assert!(state.accepts_submit());
}

#[test]
fn running_job_that_ends_on_its_own_returns_to_idle() {
    init_logging();
    let (state, _) = update(
        running(3),
        SessionMsg::JobObserved {
            job_id: 3,
            category: JobCategory::Failed,
        },
    );
    assert_eq!(state, SessionState::Idle);
}

#[test]
fn observations_of_other_jobs_are_ignored() {
    init_logging();
    let (state, effects) = update(
        running(3),
        SessionMsg::JobObserved {
            job_id: 99,
            category: JobCategory::Complete,
        },
    );
    assert_eq!(state, SessionState::Running { job_id: 3 });
    assert!(effects.is_empty());
}

#[test]
fn cancel_acknowledged_with_terminal_job_completes_cancellation() {
    init_logging();
    let (state, _) = update(running(5), SessionMsg::CancelRequested);
    let (state, effects) = update(
        state,
        SessionMsg::CancelAcknowledged {
            job_id: 5,
            category: JobCategory::Complete,
        },
    );
    assert_eq!(state, SessionState::Cancelled { job_id: 5 });
    assert!(effects.is_empty());
}

#[test]
fn failed_cancel_reverts_to_running() {
    init_logging();
    let (state, _) = update(running(5), SessionMsg::CancelRequested);
    let (state, _) = update(state, SessionMsg::CancelFailed { job_id: 5 });
    assert_eq!(state, SessionState::Running { job_id: 5 });
}

#[test]
fn late_cancel_response_does_not_clear_a_newer_session() {
    init_logging();
    // A (id 1) is cancelled and ends before its cancel response arrives.
    let (state, _) = update(running(1), SessionMsg::CancelRequested);
    let (state, _) = update(
        state,
        SessionMsg::JobObserved {
            job_id: 1,
            category: JobCategory::Complete,
        },
    );
    // B (id 2) starts.
    let (state, _) = submit(state, true);
    let (state, _) = update(state, SessionMsg::SubmitSucceeded { job_id: 2 });
    assert_eq!(state.active_session(), Some(2));

    let (state, effects) = update(
        state,
        SessionMsg::CancelAcknowledged {
            job_id: 1,
            category: JobCategory::Complete,
        },
    );
    assert_eq!(state, SessionState::Running { job_id: 2 });
    assert_eq!(effects, vec![SessionEffect::StaleCancelDiscarded { job_id: 1 }]);

    let (state, _) = update(state, SessionMsg::CancelFailed { job_id: 1 });
    assert_eq!(state, SessionState::Running { job_id: 2 });
}

#[test]
fn cancel_answer_after_the_job_was_seen_ending_is_not_stale() {
    init_logging();
    let (state, _) = update(running(1), SessionMsg::CancelRequested);
    let (state, _) = update(
        state,
        SessionMsg::JobObserved {
            job_id: 1,
            category: JobCategory::Failed,
        },
    );
    assert_eq!(state, SessionState::Cancelled { job_id: 1 });

    let (state, effects) = update(
        state,
        SessionMsg::CancelAcknowledged {
            job_id: 1,
            category: JobCategory::Failed,
        },
    );
    assert_eq!(state, SessionState::Cancelled { job_id: 1 });
    assert!(effects.is_empty());

    let (state, effects) = update(state, SessionMsg::CancelFailed { job_id: 1 });
    assert_eq!(state, SessionState::Cancelled { job_id: 1 });
    assert!(effects.is_empty());
}

#[test]
fn resumed_live_job_becomes_the_active_session() {
    init_logging();
    let (state, effects) = update(
        SessionState::Idle,
        SessionMsg::Resumed {
            job_id: 8,
            category: JobCategory::Running,
        },
    );
    assert_eq!(state, SessionState::Running { job_id: 8 });
    assert!(effects.is_empty());

    let (state, _) = update(state, SessionMsg::CancelRequested);
    assert_eq!(state, SessionState::Cancelling { job_id: 8 });
}

#[test]
fn resuming_never_replaces_a_session_or_revives_an_ended_job() {
    init_logging();
    let resume = |state, category| {
        update(
            state,
            SessionMsg::Resumed {
                job_id: 9,
                category,
            },
        )
        .0
    };
    assert_eq!(resume(SessionState::Idle, JobCategory::Complete), SessionState::Idle);
    assert_eq!(resume(running(3), JobCategory::Running), running(3));
    assert_eq!(
        resume(SessionState::Starting, JobCategory::Pending),
        SessionState::Starting
    );
}
