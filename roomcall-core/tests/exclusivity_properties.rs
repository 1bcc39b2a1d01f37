//! Property tests for single-call exclusivity and stale-event immunity

use proptest::prelude::*;
use roomcall_core::{
    CallHandle, MediaConstraints, MediaStream, PeerIdentityString, SessionPhase, SessionState,
};

const PEERS: [&str; 4] = ["P2", "P3", "P4", "P1"];

#[derive(Debug, Clone)]
enum Op {
    Incoming(usize),
    Dial(usize),
    /// Event for the n-th call ever seen (modulo count)
    Stream(usize),
    Close(usize),
    Error(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..PEERS.len()).prop_map(Op::Incoming),
        (0..PEERS.len()).prop_map(Op::Dial),
        any::<usize>().prop_map(Op::Stream),
        any::<usize>().prop_map(Op::Close),
        any::<usize>().prop_map(Op::Error),
    ]
}

fn ready() -> SessionState<PeerIdentityString> {
    let mut state = SessionState::new();
    state.on_registered(PeerIdentityString::new("P1"));
    state.on_media(MediaStream::from_constraints(&MediaConstraints::video_call()));
    state
}

fn stream() -> MediaStream {
    MediaStream::from_constraints(&MediaConstraints::video_call())
}

proptest! {
    #[test]
    fn at_most_one_call_and_stale_events_are_inert(ops in prop::collection::vec(op(), 1..60)) {
        let mut state = ready();
        let mut seen: Vec<CallHandle<PeerIdentityString>> = Vec::new();

        for op in ops {
            match op {
                Op::Incoming(i) => {
                    let call = CallHandle::inbound(PeerIdentityString::new(PEERS[i]));
                    let busy_with = state.remote_peer().cloned();
                    seen.push(call.clone());
                    state.on_incoming(call.clone());
                    let accepted = call.peer.as_str() != "P1"
                        && busy_with.as_ref().map_or(true, |peer| peer == &call.peer);
                    if accepted {
                        prop_assert_eq!(state.active_call().map(|c| c.id), Some(call.id));
                    } else {
                        prop_assert_eq!(state.remote_peer(), busy_with.as_ref());
                    }
                }
                Op::Dial(i) => {
                    let before = state.snapshot();
                    match state.check_dial(PEERS[i]) {
                        Ok(target) => {
                            let call = CallHandle::outbound(target);
                            seen.push(call.clone());
                            state.on_dialed(call.clone());
                            prop_assert_eq!(state.active_call().map(|c| c.id), Some(call.id));
                            prop_assert_eq!(state.phase(), SessionPhase::CallPending);
                        }
                        Err(_) => prop_assert_eq!(state.snapshot(), before),
                    }
                }
                Op::Stream(n) | Op::Close(n) | Op::Error(n) if seen.is_empty() => {
                    let _ = n;
                }
                Op::Stream(n) => {
                    let call = seen[n % seen.len()].clone();
                    let current = state.active_call().map(|c| c.id) == Some(call.id);
                    let before = state.snapshot();
                    state.on_stream(call.id, &call.peer, stream());
                    if current {
                        prop_assert_eq!(state.phase(), SessionPhase::InCall);
                    } else {
                        prop_assert_eq!(state.snapshot(), before);
                    }
                }
                Op::Close(n) | Op::Error(n) => {
                    let call = seen[n % seen.len()].clone();
                    let current = state.active_call().map(|c| c.id) == Some(call.id);
                    let before = state.snapshot();
                    if matches!(op, Op::Close(_)) {
                        state.on_call_closed(call.id, &call.peer);
                    } else {
                        state.on_call_error(call.id, &call.peer, "transport");
                    }
                    if current {
                        prop_assert!(state.remote_peer().is_none());
                        prop_assert_eq!(state.phase(), SessionPhase::ReadyIdle);
                    } else {
                        prop_assert_eq!(state.snapshot(), before);
                    }
                }
            }

            // slot and peer always agree
            let snap = state.snapshot();
            prop_assert_eq!(snap.remote_peer.is_some(), snap.call_id.is_some());
            prop_assert_eq!(snap.phase.is_in_call(), snap.call_id.is_some());
            prop_assert_ne!(snap.remote_peer.as_deref(), Some("P1"));
        }
    }

    #[test]
    fn teardown_twice_leaves_no_live_tracks(ops in prop::collection::vec(0..PEERS.len(), 0..8)) {
        let mut state = ready();
        let local = state.local_stream().cloned();
        let mut remotes = Vec::new();
        for i in ops {
            let call = CallHandle::inbound(PeerIdentityString::new(PEERS[i]));
            state.on_incoming(call.clone());
            let remote = stream();
            remotes.push(remote.clone());
            state.on_stream(call.id, &call.peer, remote);
        }

        state.teardown();
        prop_assert!(state.teardown().is_empty());
        prop_assert_eq!(local.map(|s| s.live_track_count()), Some(0));
        for remote in remotes {
            prop_assert_eq!(remote.live_track_count(), 0);
        }
    }
}
