use std::sync::Arc;

use qtoken_core::config::{REFERENCE_HOLDER_ID, REFERENCE_SECRET, REFERENCE_VERIFIER_ID};
use qtoken_core::{
    Bit, Holder, Issuer, ProtocolConfig, ProtocolError, ProtocolEvent, ProtocolSession,
    RecordingObserver, Role, Token, Verifier, VerificationReply, derive_role_rng, link_pair, mac,
};

fn reference_token() -> Token {
    Token::new("10110010".parse().unwrap(), "01101100".parse().unwrap()).unwrap()
}

fn reference_issuer() -> Issuer {
    Issuer::new(
        8,
        [(REFERENCE_HOLDER_ID, REFERENCE_SECRET)].into_iter().collect(),
    )
}

fn reference_holder() -> Holder {
    Holder::new(
        REFERENCE_HOLDER_ID,
        REFERENCE_SECRET,
        REFERENCE_VERIFIER_ID,
        8,
    )
}

#[test]
fn reference_scenario_accepts() {
    let m = mac(REFERENCE_SECRET, REFERENCE_VERIFIER_ID, 8);
    assert_eq!(m.to_string(), "00110000");

    let token = reference_token();
    let checked: Vec<usize> = (0..8)
        .filter(|&j| qtoken_core::Basis::from(m[j]) == token.bases()[j])
        .collect();
    assert_eq!(checked, vec![0, 2, 6, 7]);

    let mut issuer = reference_issuer();
    let description = issuer.issue_token(REFERENCE_HOLDER_ID, token.clone()).unwrap();
    let mut rng = derive_role_rng(b"reference-scenario", 0, b"holder");
    let holder = reference_holder();
    let receipt = holder.measure_token(&description, &mut rng).unwrap();
    for &j in &checked {
        assert_eq!(receipt.kappa[j], token.bits()[j]);
    }

    let verifier = Verifier::new(REFERENCE_VERIFIER_ID);
    let request = verifier.forward(holder.payment(&receipt));
    let reply = issuer.reply(&request);
    assert_eq!(reply, VerificationReply::verdict(true));
    let result = verifier.report(REFERENCE_HOLDER_ID, reply).unwrap();
    assert!(result.accepted);
}

#[test]
fn tampering_a_checked_position_rejects() {
    let mut issuer = reference_issuer();
    let description = issuer
        .issue_token(REFERENCE_HOLDER_ID, reference_token())
        .unwrap();
    let mut rng = derive_role_rng(b"tamper", 0, b"holder");
    let holder = reference_holder();
    let receipt = holder.measure_token(&description, &mut rng).unwrap();

    let mut payment = holder.payment(&receipt);
    payment.kappa = receipt.kappa.with_flipped(2).to_string();
    let request = Verifier::new(REFERENCE_VERIFIER_ID).forward(payment);
    let report = issuer.verify(&request).unwrap();
    assert_eq!(report.mismatched, vec![2]);
    assert!(!report.accepted());
}

#[test]
fn single_use_is_enforced_over_the_wire() {
    let mut issuer = reference_issuer();
    issuer
        .issue_token(REFERENCE_HOLDER_ID, reference_token())
        .unwrap();
    let request = Verifier::new(REFERENCE_VERIFIER_ID).forward(qtoken_core::PaymentMessage {
        holder_id: REFERENCE_HOLDER_ID.into(),
        kappa: "10110010".into(),
    });
    assert_eq!(issuer.reply(&request), VerificationReply::verdict(true));
    match issuer.reply(&request) {
        VerificationReply::Fault(report) => assert_eq!(report.fault, "NO_OUTSTANDING_TOKEN"),
        other => panic!("expected a fault, got {other:?}"),
    }
}

#[test]
fn session_tamper_at_checked_position_rejects() {
    // Whether position 0 is checked depends on the drawn token.
    let session = ProtocolSession::new(ProtocolConfig::reference())
        .unwrap()
        .with_tamper(0);
    let honest = ProtocolSession::new(ProtocolConfig::reference()).unwrap();
    let mut seen_checked = false;
    for run_index in 0..32 {
        let baseline = honest
            .run(REFERENCE_HOLDER_ID, b"session-tamper", run_index)
            .unwrap();
        let tampered = session
            .run(REFERENCE_HOLDER_ID, b"session-tamper", run_index)
            .unwrap();
        assert_eq!(baseline.receipt, tampered.receipt);
        if baseline.report.checked.contains(&0) {
            seen_checked = true;
            assert!(!tampered.accepted, "run {run_index} accepted a flipped bit");
            assert!(tampered.report.mismatched.contains(&0));
        } else {
            assert_eq!(tampered.accepted, baseline.accepted);
        }
    }
    assert!(seen_checked);
}

#[test]
fn honest_runs_accept_whenever_something_is_checked() {
    let config = ProtocolConfig::reference().with_lambda(32);
    let session = ProtocolSession::new(config).unwrap();
    for run_index in 0..16 {
        let outcome = session
            .run(REFERENCE_HOLDER_ID, b"honest-32", run_index)
            .unwrap();
        assert!(outcome.report.total_checked() > 0);
        assert!(outcome.accepted, "run {run_index} rejected an honest holder");
    }
}

#[test]
fn faults_reach_the_verifier_as_errors() {
    let (issuer_to_verifier, verifier_to_issuer) = link_pair(Role::Issuer, Role::Verifier);
    let (holder_to_verifier, verifier_to_holder) = link_pair(Role::Holder, Role::Verifier);
    let recorder = Arc::new(RecordingObserver::new());
    let verifier = Verifier::new(REFERENCE_VERIFIER_ID).with_observer(recorder.clone());

    holder_to_verifier
        .send(&qtoken_core::PaymentMessage {
            holder_id: "mallory".into(),
            kappa: "10110010".into(),
        })
        .unwrap();
    let issuer = std::thread::spawn(move || {
        let mut issuer = reference_issuer();
        let request = issuer_to_verifier.recv().unwrap();
        let reply = issuer.reply(&request);
        issuer_to_verifier.send(&reply).unwrap();
    });
    let err = verifier
        .run(&verifier_to_holder, &verifier_to_issuer)
        .unwrap_err();
    issuer.join().unwrap();

    assert!(matches!(err, ProtocolError::IssuerFault { ref code, .. } if code == "UNKNOWN_HOLDER"));
    assert!(recorder.events().iter().any(|e| matches!(
        e,
        ProtocolEvent::Fault {
            role: Role::Verifier,
            ..
        }
    )));
}

#[test]
fn mismatched_lambda_surfaces_as_malformed() {
    let mut issuer = Issuer::new(
        16,
        [(REFERENCE_HOLDER_ID, REFERENCE_SECRET)].into_iter().collect(),
    );
    let mut rng = derive_role_rng(b"lambda-mismatch", 0, b"issuer");
    let description = issuer.issue(REFERENCE_HOLDER_ID, &mut rng).unwrap();
    let err = reference_holder()
        .measure_token(&description, &mut rng)
        .unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::MalformedMessage {
            expected: 8,
            found: 16,
            ..
        }
    ));
}

#[test]
fn bit_flip_helper_matches_wire_flip() {
    let kappa: qtoken_core::BitString = "0101".parse().unwrap();
    assert_eq!(kappa.with_flipped(0)[0], Bit::One);
}
