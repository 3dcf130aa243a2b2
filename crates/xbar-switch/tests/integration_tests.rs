//! Integration tests for the capability switch coordinator
//!
//! These tests verify end-to-end behavior of the coordinator including:
//! - The three-phase capability exchange (START, APPLY, FINISH)
//! - Failure handling and rollback toward the old configuration
//! - Session staleness filtering across abandoned transactions
//! - Transaction timeout and recovery
//! - Multi-SIM reconfiguration and the keep-alive guard

use xbar_ril::{
    CapabilityPhase, CapabilityStatus, ModemError, ModemId, ModemRequest, ModemResponse, PhoneId,
    RadioAccessFamily, RadioCapability, SessionId,
};
use xbar_switch::{
    CapabilityCoordinator, CoordinatorConfig, MultiSimNotifier, PhoneDescriptor, SetOutcome,
    SlotStatus, SwitchError, SwitchEvent,
};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Everything the test modems claim to support
    pub fn all_supported() -> RadioAccessFamily {
        RadioAccessFamily::GROUP_2G
            | RadioAccessFamily::GROUP_3G
            | RadioAccessFamily::GROUP_4G
            | RadioAccessFamily::GROUP_5G
    }

    /// Create a coordinator with one phone per capability, modems
    /// named modem0, modem1, ...
    pub fn coordinator_with(caps: &[RadioAccessFamily]) -> CapabilityCoordinator {
        let mut coord = CapabilityCoordinator::new();
        for (i, raf) in caps.iter().enumerate() {
            coord.add_phone(PhoneDescriptor {
                capability: *raf,
                supported: all_supported(),
                modem_id: ModemId::new(&format!("modem{i}")),
            });
        }
        coord
    }

    /// Drain buffered requests and unwrap the capability payloads
    pub fn capability_requests(coord: &mut CapabilityCoordinator) -> Vec<RadioCapability> {
        coord
            .drain_requests()
            .into_iter()
            .map(|(_, req)| match req {
                ModemRequest::SetCapability { cap } => cap,
                other => panic!("expected SetCapability, got {other:?}"),
            })
            .collect()
    }

    /// Acknowledge a request successfully, echoing its payload
    pub fn ack(coord: &mut CapabilityCoordinator, cap: &RadioCapability) {
        coord.process_modem_response(ModemResponse::CapabilityAck {
            phone_id: cap.phone_id,
            cap: cap.clone(),
            error: None,
        });
    }

    /// Acknowledge a request with a modem error
    pub fn ack_err(coord: &mut CapabilityCoordinator, cap: &RadioCapability, error: ModemError) {
        coord.process_modem_response(ModemResponse::CapabilityAck {
            phone_id: cap.phone_id,
            cap: cap.clone(),
            error: Some(error),
        });
    }

    /// Send the unsolicited notification reporting an APPLY landed
    pub fn notify_applied(coord: &mut CapabilityCoordinator, cap: &RadioCapability) {
        let mut done = cap.clone();
        done.status = CapabilityStatus::Success;
        coord.process_modem_response(ModemResponse::CapabilityChanged {
            phone_id: cap.phone_id,
            cap: done,
            error: None,
        });
    }

    /// Send the unsolicited notification reporting an APPLY failed
    pub fn notify_fail(coord: &mut CapabilityCoordinator, cap: &RadioCapability) {
        let mut done = cap.clone();
        done.status = CapabilityStatus::Fail;
        coord.process_modem_response(ModemResponse::CapabilityChanged {
            phone_id: cap.phone_id,
            cap: done,
            error: None,
        });
    }

    /// Ack every START and return the APPLY requests that follow
    pub fn drive_to_apply(coord: &mut CapabilityCoordinator) -> Vec<RadioCapability> {
        let starts = capability_requests(coord);
        for cap in &starts {
            assert_eq!(cap.phase, CapabilityPhase::Start);
            ack(coord, cap);
        }
        capability_requests(coord)
    }

    /// Drive a started transaction all the way to a successful FINISH
    pub fn drive_success(coord: &mut CapabilityCoordinator) {
        let applies = drive_to_apply(coord);
        for cap in &applies {
            assert_eq!(cap.phase, CapabilityPhase::Apply);
            ack(coord, cap);
            notify_applied(coord, cap);
        }
        let finishes = capability_requests(coord);
        for cap in &finishes {
            assert_eq!(cap.phase, CapabilityPhase::Finish);
            ack(coord, cap);
        }
    }

    /// Check if events contain a CapabilitySetDone
    pub fn has_done(events: &[SwitchEvent]) -> bool {
        events
            .iter()
            .any(|e| matches!(e, SwitchEvent::CapabilitySetDone { .. }))
    }

    /// Check if events contain a CapabilitySetFailed
    pub fn has_failed(events: &[SwitchEvent]) -> bool {
        events
            .iter()
            .any(|e| matches!(e, SwitchEvent::CapabilitySetFailed))
    }

    /// Extract the capabilities reported by CapabilitySetDone
    pub fn done_capabilities(events: &[SwitchEvent]) -> Option<Vec<(PhoneId, RadioAccessFamily)>> {
        events.iter().find_map(|e| match e {
            SwitchEvent::CapabilitySetDone { capabilities } => Some(capabilities.clone()),
            _ => None,
        })
    }
}

// ============================================================================
// Three-Phase Transaction Tests
// ============================================================================

mod transaction_tests {
    use super::*;

    #[test]
    fn swap_runs_start_apply_finish() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        let outcome = coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        assert!(matches!(outcome, SetOutcome::Started { .. }));

        let starts = helpers::capability_requests(&mut coord);
        assert_eq!(starts.len(), 2);
        assert!(starts.iter().all(|c| c.phase == CapabilityPhase::Start));
        for cap in &starts {
            helpers::ack(&mut coord, cap);
        }

        let applies = helpers::capability_requests(&mut coord);
        assert_eq!(applies.len(), 2);
        assert!(applies.iter().all(|c| c.phase == CapabilityPhase::Apply));
        for cap in &applies {
            helpers::ack(&mut coord, cap);
            helpers::notify_applied(&mut coord, cap);
        }

        let finishes = helpers::capability_requests(&mut coord);
        assert_eq!(finishes.len(), 2);
        assert!(finishes.iter().all(|c| c.phase == CapabilityPhase::Finish));
        assert!(finishes
            .iter()
            .all(|c| c.status == CapabilityStatus::Success));
        for cap in &finishes {
            helpers::ack(&mut coord, cap);
        }

        let events = coord.drain_events();
        assert!(helpers::has_done(&events));
        assert!(!helpers::has_failed(&events));
        assert_eq!(
            helpers::done_capabilities(&events).unwrap(),
            vec![
                (PhoneId(0), RadioAccessFamily::GSM),
                (PhoneId(1), RadioAccessFamily::GROUP_4G),
            ]
        );

        assert_eq!(
            coord.capability_for(PhoneId(0)),
            Some(RadioAccessFamily::GSM)
        );
        assert_eq!(
            coord.capability_for(PhoneId(1)),
            Some(RadioAccessFamily::GROUP_4G)
        );
        // The modem bindings moved with the capabilities
        assert_eq!(
            coord.slot(PhoneId(0)).unwrap().modem_id,
            ModemId::new("modem1")
        );
        assert_eq!(
            coord.slot(PhoneId(1)).unwrap().modem_id,
            ModemId::new("modem0")
        );
        assert!(!coord.is_transaction_live());
    }

    #[test]
    fn swap_exchanges_logical_modems() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        helpers::drive_to_apply(&mut coord);

        // Each phone is moving onto the modem that held its requested
        // family before the swap
        let slot0 = coord.slot(PhoneId(0)).unwrap();
        let slot1 = coord.slot(PhoneId(1)).unwrap();
        assert_eq!(slot0.new_modem_id, ModemId::new("modem1"));
        assert_eq!(slot1.new_modem_id, ModemId::new("modem0"));
    }

    #[test]
    fn apply_carries_new_family_to_new_modem() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        let applies = helpers::drive_to_apply(&mut coord);

        let apply0 = applies.iter().find(|c| c.phone_id == PhoneId(0)).unwrap();
        assert_eq!(apply0.raf, RadioAccessFamily::GSM);
        assert_eq!(apply0.modem_id, ModemId::new("modem1"));
    }

    #[test]
    fn matching_request_is_a_no_op() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        let outcome = coord
            .set_capability(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM])
            .unwrap();
        assert_eq!(outcome, SetOutcome::NoChange);
        assert!(helpers::capability_requests(&mut coord).is_empty());
        assert!(!coord.is_guard_held());
    }

    #[test]
    fn busy_coordinator_rejects_new_requests() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        let err = coord
            .set_capability(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM])
            .unwrap_err();
        assert!(matches!(err, SwitchError::TransactionInProgress));
    }

    #[test]
    fn coordinator_accepts_again_after_completion() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        helpers::drive_success(&mut coord);
        coord.drain_events();

        // Swap back
        let outcome = coord
            .set_capability(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM])
            .unwrap();
        assert!(matches!(outcome, SetOutcome::Started { .. }));
        helpers::drive_success(&mut coord);
        assert!(helpers::has_done(&coord.drain_events()));
        assert_eq!(
            coord.capability_for(PhoneId(0)),
            Some(RadioAccessFamily::GROUP_4G)
        );
    }

    #[test]
    fn status_events_track_the_phases() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        helpers::drive_success(&mut coord);

        let statuses: Vec<SlotStatus> = coord
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                SwitchEvent::PhoneStatusChanged {
                    phone_id: PhoneId(0),
                    status,
                } => Some(status),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                SlotStatus::Starting,
                SlotStatus::Started,
                SlotStatus::Applying,
                SlotStatus::Success,
            ]
        );
    }
}

// ============================================================================
// Failure Handling Tests
// ============================================================================

mod failure_tests {
    use super::*;

    #[test]
    fn start_error_on_single_phone_aborts() {
        let mut coord = helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G]);

        coord.set_capability(&[RadioAccessFamily::GSM]).unwrap();
        let starts = helpers::capability_requests(&mut coord);
        helpers::ack_err(&mut coord, &starts[0], ModemError::ModemInternal);

        // No FINISH goes out; the transaction is simply dropped
        assert!(helpers::capability_requests(&mut coord).is_empty());
        assert!(helpers::has_failed(&coord.drain_events()));
        assert!(!coord.is_transaction_live());
        assert!(!coord.is_guard_held());
        assert_eq!(
            coord.capability_for(PhoneId(0)),
            Some(RadioAccessFamily::GROUP_4G)
        );
    }

    #[test]
    fn unsupported_request_aborts_even_multi_phone() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        let starts = helpers::capability_requests(&mut coord);
        helpers::ack_err(&mut coord, &starts[0], ModemError::RequestNotSupported);

        assert!(helpers::capability_requests(&mut coord).is_empty());
        assert!(helpers::has_failed(&coord.drain_events()));
        assert!(!coord.is_transaction_live());
    }

    #[test]
    fn start_error_multi_phone_finishes_with_old() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        let starts = helpers::capability_requests(&mut coord);
        helpers::ack(&mut coord, &starts[0]);
        helpers::ack_err(&mut coord, &starts[1], ModemError::ModemInternal);

        // APPLY is skipped; FINISH distributes the old configuration
        let finishes = helpers::capability_requests(&mut coord);
        assert_eq!(finishes.len(), 2);
        for cap in &finishes {
            assert_eq!(cap.phase, CapabilityPhase::Finish);
            assert_eq!(cap.status, CapabilityStatus::Fail);
        }
        let finish0 = finishes.iter().find(|c| c.phone_id == PhoneId(0)).unwrap();
        assert_eq!(finish0.raf, RadioAccessFamily::GROUP_4G);
        assert_eq!(finish0.modem_id, ModemId::new("modem0"));

        for cap in &finishes {
            helpers::ack(&mut coord, cap);
        }

        // Nothing was applied, so no rollback transaction follows
        assert!(helpers::capability_requests(&mut coord).is_empty());
        assert!(helpers::has_failed(&coord.drain_events()));
        assert!(!coord.is_transaction_live());
        assert!(!coord.is_guard_held());
        assert_eq!(
            coord.capability_for(PhoneId(0)),
            Some(RadioAccessFamily::GROUP_4G)
        );
        assert_eq!(coord.capability_for(PhoneId(1)), Some(RadioAccessFamily::GSM));
    }

    #[test]
    fn apply_notification_failure_fails_transaction() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        let applies = helpers::drive_to_apply(&mut coord);
        for cap in &applies {
            helpers::ack(&mut coord, cap);
        }
        helpers::notify_fail(&mut coord, &applies[0]);
        helpers::notify_fail(&mut coord, &applies[1]);

        let finishes = helpers::capability_requests(&mut coord);
        assert!(finishes
            .iter()
            .all(|c| c.status == CapabilityStatus::Fail));
        for cap in &finishes {
            helpers::ack(&mut coord, cap);
        }

        assert!(helpers::has_failed(&coord.drain_events()));
        assert!(!coord.is_transaction_live());
    }

    #[test]
    fn duplicate_modem_assignment_fails_the_exchange() {
        // Nobody holds 3G, so both phones resolve to an empty target
        // modem, which the assignment check treats as a collision
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GROUP_3G, RadioAccessFamily::GROUP_3G])
            .unwrap();
        let starts = helpers::capability_requests(&mut coord);
        for cap in &starts {
            helpers::ack(&mut coord, cap);
        }

        let finishes = helpers::capability_requests(&mut coord);
        assert!(finishes
            .iter()
            .all(|c| c.status == CapabilityStatus::Fail));
        for cap in &finishes {
            helpers::ack(&mut coord, cap);
        }

        let events = coord.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, SwitchEvent::Error { .. })));
        assert!(helpers::has_failed(&events));
        assert_eq!(
            coord.capability_for(PhoneId(0)),
            Some(RadioAccessFamily::GROUP_4G)
        );
    }

    #[test]
    fn duplicate_notification_counts_once() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        let applies = helpers::drive_to_apply(&mut coord);
        helpers::ack(&mut coord, &applies[0]);
        helpers::notify_applied(&mut coord, &applies[0]);
        // The same modem repeats itself; the barrier must not reach
        // zero before the second phone reports
        helpers::notify_applied(&mut coord, &applies[0]);

        assert!(helpers::capability_requests(&mut coord).is_empty());
        assert!(coord.is_transaction_live());

        helpers::ack(&mut coord, &applies[1]);
        helpers::notify_applied(&mut coord, &applies[1]);
        let finishes = helpers::capability_requests(&mut coord);
        assert_eq!(finishes.len(), 2);
    }
}

// ============================================================================
// Session Staleness Tests
// ============================================================================

mod session_tests {
    use super::*;

    #[test]
    fn stale_ack_changes_nothing() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        let starts = helpers::capability_requests(&mut coord);

        let mut stale = starts[0].clone();
        stale.session = SessionId(stale.session.0.wrapping_sub(1));
        helpers::ack(&mut coord, &stale);

        assert_eq!(
            coord.slot(PhoneId(0)).unwrap().status,
            SlotStatus::Starting
        );
        assert!(helpers::capability_requests(&mut coord).is_empty());
    }

    #[test]
    fn session_advances_between_transactions() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        let starts = helpers::capability_requests(&mut coord);
        let first = starts[0].session;
        // Abort the first round
        helpers::ack_err(&mut coord, &starts[0], ModemError::RequestNotSupported);
        coord.drain_events();

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        let second = helpers::capability_requests(&mut coord)[0].session;
        assert_ne!(first, second);
    }

    #[test]
    fn acks_from_an_aborted_transaction_are_ignored() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        let old_starts = helpers::capability_requests(&mut coord);

        // Abort by reconfiguring, then start a fresh transaction
        coord.reconfigure_phones(vec![
            PhoneDescriptor {
                capability: RadioAccessFamily::GROUP_4G,
                supported: helpers::all_supported(),
                modem_id: ModemId::new("modem0"),
            },
            PhoneDescriptor {
                capability: RadioAccessFamily::GSM,
                supported: helpers::all_supported(),
                modem_id: ModemId::new("modem1"),
            },
        ]);
        coord.drain_events();
        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        let new_starts = helpers::capability_requests(&mut coord);

        // A modem answering the aborted round must not advance the new one
        helpers::ack(&mut coord, &old_starts[0]);
        helpers::ack(&mut coord, &old_starts[1]);
        assert!(helpers::capability_requests(&mut coord).is_empty());

        for cap in &new_starts {
            helpers::ack(&mut coord, cap);
        }
        assert_eq!(helpers::capability_requests(&mut coord).len(), 2);
    }

    #[test]
    fn session_id_wraps_without_panicking() {
        assert_eq!(SessionId(i32::MAX).next(), SessionId(i32::MIN));
        assert_eq!(SessionId(-1).next(), SessionId(0));
    }
}

// ============================================================================
// Timeout Tests
// ============================================================================

mod timeout_tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn deadline_poll_before_timeout_is_quiet() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        helpers::capability_requests(&mut coord);

        coord.poll_deadline(Instant::now());
        assert!(helpers::capability_requests(&mut coord).is_empty());
        assert!(coord.is_transaction_live());
    }

    #[test]
    fn timeout_finishes_with_old_configuration() {
        let mut coord = CapabilityCoordinator::with_config(CoordinatorConfig { timeout_ms: 0 });
        coord.add_phone(PhoneDescriptor {
            capability: RadioAccessFamily::GROUP_4G,
            supported: helpers::all_supported(),
            modem_id: ModemId::new("modem0"),
        });
        coord.add_phone(PhoneDescriptor {
            capability: RadioAccessFamily::GSM,
            supported: helpers::all_supported(),
            modem_id: ModemId::new("modem1"),
        });

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        let starts = helpers::capability_requests(&mut coord);
        helpers::ack(&mut coord, &starts[0]);
        // The second phone never answers

        coord.poll_deadline(Instant::now());

        // FINISH goes out under a fresh session carrying the old state
        let finishes = helpers::capability_requests(&mut coord);
        assert_eq!(finishes.len(), 2);
        for cap in &finishes {
            assert_eq!(cap.phase, CapabilityPhase::Finish);
            assert_eq!(cap.status, CapabilityStatus::Fail);
            assert_ne!(cap.session, starts[0].session);
        }

        // The straggler's START ack is now stale
        helpers::ack(&mut coord, &starts[1]);
        assert!(helpers::capability_requests(&mut coord).is_empty());

        for cap in &finishes {
            helpers::ack(&mut coord, cap);
        }
        assert!(helpers::has_failed(&coord.drain_events()));
        assert!(!coord.is_transaction_live());
        assert!(!coord.is_guard_held());
        assert_eq!(
            coord.capability_for(PhoneId(0)),
            Some(RadioAccessFamily::GROUP_4G)
        );
    }

    #[test]
    fn timeout_for_an_old_session_is_ignored() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        let live = coord.session();
        helpers::capability_requests(&mut coord);

        coord.handle_timeout(SessionId(live.0.wrapping_sub(1)));
        assert!(helpers::capability_requests(&mut coord).is_empty());
        assert!(coord.is_transaction_live());
    }
}

// ============================================================================
// Rollback Tests
// ============================================================================

mod rollback_tests {
    use super::*;

    /// Fail one APPLY after the other landed, so rollback has real
    /// work to do
    fn fail_after_partial_apply(
        coord: &mut CapabilityCoordinator,
    ) -> Vec<RadioCapability> {
        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        let applies = helpers::drive_to_apply(coord);
        for cap in &applies {
            helpers::ack(coord, cap);
        }
        helpers::notify_applied(coord, &applies[0]);
        helpers::notify_fail(coord, &applies[1]);

        let finishes = helpers::capability_requests(coord);
        for cap in &finishes {
            assert_eq!(cap.status, CapabilityStatus::Fail);
            helpers::ack(coord, cap);
        }
        // complete_transaction has now started the rollback
        helpers::capability_requests(coord)
    }

    #[test]
    fn partial_apply_triggers_rollback_transaction() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        let rollback_starts = fail_after_partial_apply(&mut coord);

        assert_eq!(rollback_starts.len(), 2);
        assert!(rollback_starts
            .iter()
            .all(|c| c.phase == CapabilityPhase::Start));
        let start0 = rollback_starts
            .iter()
            .find(|c| c.phone_id == PhoneId(0))
            .unwrap();
        assert_eq!(start0.raf, RadioAccessFamily::GROUP_4G);
        // Rollback targets the binding captured at transaction start,
        // not the half-switched live state
        assert_eq!(start0.modem_id, ModemId::new("modem0"));

        let events = coord.drain_events();
        assert!(helpers::has_failed(&events));
        assert!(!helpers::has_done(&events));
    }

    #[test]
    fn rollback_restores_original_capabilities() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        let rollback_starts = fail_after_partial_apply(&mut coord);
        coord.drain_events();

        for cap in &rollback_starts {
            helpers::ack(&mut coord, cap);
        }
        let applies = helpers::capability_requests(&mut coord);
        for cap in &applies {
            helpers::ack(&mut coord, cap);
            helpers::notify_applied(&mut coord, cap);
        }
        let finishes = helpers::capability_requests(&mut coord);
        for cap in &finishes {
            helpers::ack(&mut coord, cap);
        }

        let events = coord.drain_events();
        assert_eq!(
            helpers::done_capabilities(&events).unwrap(),
            vec![
                (PhoneId(0), RadioAccessFamily::GROUP_4G),
                (PhoneId(1), RadioAccessFamily::GSM),
            ]
        );
        assert!(!coord.is_transaction_live());
        assert!(!coord.is_guard_held());
    }

    #[test]
    fn rollback_skipped_when_nothing_applied() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        let starts = helpers::capability_requests(&mut coord);
        helpers::ack_err(&mut coord, &starts[0], ModemError::ModemInternal);
        helpers::ack(&mut coord, &starts[1]);

        let finishes = helpers::capability_requests(&mut coord);
        for cap in &finishes {
            helpers::ack(&mut coord, cap);
        }

        // Live capabilities never moved, so there is nothing to revert
        assert!(helpers::capability_requests(&mut coord).is_empty());
        assert!(!coord.is_transaction_live());
    }

    #[test]
    fn guard_stays_held_through_rollback() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        let rollback_starts = fail_after_partial_apply(&mut coord);
        assert!(coord.is_guard_held());

        for cap in &rollback_starts {
            helpers::ack(&mut coord, cap);
        }
        let applies = helpers::capability_requests(&mut coord);
        for cap in &applies {
            helpers::ack(&mut coord, cap);
            helpers::notify_applied(&mut coord, cap);
        }
        assert!(coord.is_guard_held());

        let finishes = helpers::capability_requests(&mut coord);
        for cap in &finishes {
            helpers::ack(&mut coord, cap);
        }
        assert!(!coord.is_guard_held());
    }
}

// ============================================================================
// Reconfiguration and Multi-SIM Tests
// ============================================================================

mod reconfigure_tests {
    use super::*;

    fn descriptor(raf: RadioAccessFamily, modem: &str) -> PhoneDescriptor {
        PhoneDescriptor {
            capability: raf,
            supported: helpers::all_supported(),
            modem_id: ModemId::new(modem),
        }
    }

    #[test]
    fn growing_preserves_live_phones() {
        let mut coord = helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G]);

        coord.reconfigure_phones(vec![
            descriptor(RadioAccessFamily::GSM, "modem0"),
            descriptor(RadioAccessFamily::GSM, "modem1"),
        ]);

        assert_eq!(coord.phone_count(), 2);
        // The surviving slot keeps what it actually holds, not what
        // the new descriptor claims
        assert_eq!(
            coord.capability_for(PhoneId(0)),
            Some(RadioAccessFamily::GROUP_4G)
        );
        assert_eq!(coord.capability_for(PhoneId(1)), Some(RadioAccessFamily::GSM));
        assert!(coord
            .drain_events()
            .iter()
            .any(|e| matches!(e, SwitchEvent::PhonesReconfigured { count: 2 })));
    }

    #[test]
    fn shrinking_drops_the_tail() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord.reconfigure_phones(vec![descriptor(RadioAccessFamily::GROUP_4G, "modem0")]);

        assert_eq!(coord.phone_count(), 1);
        assert_eq!(coord.capability_for(PhoneId(1)), None);
    }

    #[test]
    fn reconfigure_aborts_live_transaction() {
        let mut coord =
            helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G, RadioAccessFamily::GSM]);

        coord
            .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
            .unwrap();
        helpers::capability_requests(&mut coord);

        coord.reconfigure_phones(vec![descriptor(RadioAccessFamily::GROUP_4G, "modem0")]);

        // Aborted outright: failed, no FINISH issued, guard released
        assert!(helpers::has_failed(&coord.drain_events()));
        assert!(helpers::capability_requests(&mut coord).is_empty());
        assert!(!coord.is_transaction_live());
        assert!(!coord.is_guard_held());
    }

    #[test]
    fn multisim_notifier_drives_reconfiguration() {
        use tokio::sync::mpsc;
        use xbar_fanout::SubscriberId;

        let mut notifier = MultiSimNotifier::new(1);
        let (tx, mut rx) = mpsc::unbounded_channel();
        notifier.subscribe(SubscriberId(7), tx);

        let mut coord = helpers::coordinator_with(&[RadioAccessFamily::GROUP_4G]);

        notifier.set_active_phone_count(2);
        let count = rx.try_recv().unwrap();
        let descriptors = (0..count)
            .map(|i| descriptor(RadioAccessFamily::GSM, &format!("modem{i}")))
            .collect();
        coord.reconfigure_phones(descriptors);

        assert_eq!(coord.phone_count(), 2);

        // Same count again stays quiet
        notifier.set_active_phone_count(2);
        assert!(rx.try_recv().is_err());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    // Strategy for a single named radio technology bit
    fn technology() -> impl Strategy<Value = RadioAccessFamily> {
        prop_oneof![
            Just(RadioAccessFamily::GSM),
            Just(RadioAccessFamily::GPRS),
            Just(RadioAccessFamily::EDGE),
            Just(RadioAccessFamily::UMTS),
            Just(RadioAccessFamily::HSDPA),
            Just(RadioAccessFamily::HSUPA),
            Just(RadioAccessFamily::HSPA),
            Just(RadioAccessFamily::HSPAP),
            Just(RadioAccessFamily::LTE),
            Just(RadioAccessFamily::LTE_CA),
            Just(RadioAccessFamily::NR),
        ]
    }

    // Strategy for a non-empty combination of technologies
    fn family() -> impl Strategy<Value = RadioAccessFamily> {
        proptest::collection::vec(technology(), 1..5).prop_map(|bits| {
            bits.into_iter()
                .fold(RadioAccessFamily::UNKNOWN, |acc, bit| acc | bit)
        })
    }

    proptest! {
        #[test]
        fn display_parse_roundtrip(raf in family()) {
            let text = raf.to_string();
            let parsed: RadioAccessFamily = text.parse().unwrap();
            prop_assert_eq!(parsed, raf);
        }

        #[test]
        fn swap_always_lands_on_request(a in family(), b in family()) {
            prop_assume!(a != b);

            let mut coord = helpers::coordinator_with(&[a, b]);
            coord.set_capability(&[b, a]).unwrap();
            helpers::drive_success(&mut coord);

            prop_assert!(helpers::has_done(&coord.drain_events()));
            prop_assert_eq!(coord.capability_for(PhoneId(0)), Some(b));
            prop_assert_eq!(coord.capability_for(PhoneId(1)), Some(a));
            prop_assert!(!coord.is_guard_held());
        }

        #[test]
        fn failed_exchange_preserves_capabilities(a in family(), b in family()) {
            prop_assume!(a != b);

            let mut coord = helpers::coordinator_with(&[a, b]);
            coord.set_capability(&[b, a]).unwrap();
            let starts = helpers::capability_requests(&mut coord);
            helpers::ack_err(&mut coord, &starts[0], ModemError::ModemInternal);
            helpers::ack(&mut coord, &starts[1]);
            for cap in &helpers::capability_requests(&mut coord) {
                helpers::ack(&mut coord, cap);
            }

            prop_assert_eq!(coord.capability_for(PhoneId(0)), Some(a));
            prop_assert_eq!(coord.capability_for(PhoneId(1)), Some(b));
            prop_assert!(!coord.is_transaction_live());
        }

        #[test]
        fn session_next_always_wraps_cleanly(s in any::<i32>()) {
            prop_assert_eq!(SessionId(s).next(), SessionId(s.wrapping_add(1)));
        }
    }
}
