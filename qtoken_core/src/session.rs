//! One complete three-party run: issuer, holder and verifier each on their
//! own thread, connected only by [`Link`]s.

use std::sync::Arc;
use std::thread::{self, ScopedJoinHandle};

use log::debug;
use serde::Serialize;

use crate::config::ProtocolConfig;
use crate::error::ProtocolError;
use crate::holder::{Holder, HolderReceipt};
use crate::issuer::{Issuer, VerificationReport};
use crate::messages::PaymentMessage;
use crate::rng::derive_role_rng;
use crate::trace::{NullObserver, ProtocolObserver, Role};
use crate::transport::{Link, link_pair};
use crate::verifier::Verifier;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionOutcome {
    pub holder_id: String,
    pub verifier_id: String,
    pub run_index: u64,
    pub accepted: bool,
    pub receipt: HolderReceipt,
    pub report: VerificationReport,
}

/// Aggregate over repeated independent runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct RunStatistics {
    pub runs: u64,
    pub accepted: u64,
    pub checked_positions: u64,
}

impl RunStatistics {
    pub fn record(&mut self, outcome: &SessionOutcome) {
        self.runs += 1;
        if outcome.accepted {
            self.accepted += 1;
        }
        self.checked_positions += outcome.report.total_checked() as u64;
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        self.accepted as f64 / self.runs as f64
    }

    pub fn mean_checked(&self) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        self.checked_positions as f64 / self.runs as f64
    }
}

/// Runs the protocol for holders listed in a [`ProtocolConfig`].
pub struct ProtocolSession {
    config: ProtocolConfig,
    observer: Arc<dyn ProtocolObserver>,
    tamper_position: Option<usize>,
}

impl ProtocolSession {
    pub fn new(config: ProtocolConfig) -> Result<Self, ProtocolError> {
        config.validate()?;
        Ok(Self {
            config,
            observer: Arc::new(NullObserver),
            tamper_position: None,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProtocolObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Flips κ[position] on the Holder → Verifier wire.
    pub fn with_tamper(mut self, position: usize) -> Self {
        self.tamper_position = Some(position);
        self
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Runs once; `seed` and `run_index` fix every random draw of the run.
    pub fn run(
        &self,
        holder_id: &str,
        seed: &[u8],
        run_index: u64,
    ) -> Result<SessionOutcome, ProtocolError> {
        let lambda = self.config.lambda;
        let verifier_id = self.config.verifier_id.as_str();
        let secret =
            self.config
                .secret_for(holder_id)
                .ok_or_else(|| ProtocolError::UnknownHolder {
                    holder_id: holder_id.to_string(),
                })?;

        let mut issuer = Issuer::new(lambda, self.config.secret_registry())
            .with_observer(self.observer.clone());
        let holder = Holder::new(holder_id, secret, verifier_id, lambda)
            .with_observer(self.observer.clone());
        let verifier = Verifier::new(verifier_id).with_observer(self.observer.clone());

        let (issuer_to_holder, holder_to_issuer) = link_pair(Role::Issuer, Role::Holder);
        let (issuer_to_verifier, verifier_to_issuer) = link_pair(Role::Issuer, Role::Verifier);
        let (holder_to_verifier, verifier_to_holder, relay) = match self.tamper_position {
            None => {
                let (holder_end, verifier_end) = link_pair(Role::Holder, Role::Verifier);
                (holder_end, verifier_end, None)
            }
            Some(position) => {
                let (holder_end, inbound) = link_pair(Role::Holder, Role::Verifier);
                let (outbound, verifier_end) = link_pair(Role::Holder, Role::Verifier);
                let relay = TamperRelay {
                    inbound,
                    outbound,
                    position,
                };
                (holder_end, verifier_end, Some(relay))
            }
        };

        let mut issuer_rng = derive_role_rng(seed, run_index, b"issuer");
        let mut holder_rng = derive_role_rng(seed, run_index, b"holder");
        debug!("session: run {run_index} for {holder_id} at {verifier_id} (λ={lambda})");

        let (issued, measured, verdict, relayed) = thread::scope(|scope| {
            let issuer_task = scope.spawn(move || {
                issuer.serve(
                    holder_id,
                    &issuer_to_holder,
                    &issuer_to_verifier,
                    &mut issuer_rng,
                )
            });
            let holder_task = scope
                .spawn(move || holder.run(&holder_to_issuer, &holder_to_verifier, &mut holder_rng));
            let verifier_task =
                scope.spawn(move || verifier.run(&verifier_to_holder, &verifier_to_issuer));
            let relay_task = relay.map(|relay| scope.spawn(move || relay.run()));
            (
                join(issuer_task, Role::Issuer.name()),
                join(holder_task, Role::Holder.name()),
                join(verifier_task, Role::Verifier.name()),
                relay_task.map(|task| join(task, "relay")),
            )
        });

        match (issued, measured, verdict, relayed) {
            (Ok(report), Ok(receipt), Ok(result), None | Some(Ok(()))) => Ok(SessionOutcome {
                holder_id: holder_id.to_string(),
                verifier_id: verifier_id.to_string(),
                run_index,
                accepted: result.accepted,
                receipt,
                report,
            }),
            (issued, measured, verdict, relayed) => {
                let errors = [
                    issued.err(),
                    measured.err(),
                    verdict.err(),
                    relayed.and_then(Result::err),
                ];
                Err(root_cause(errors.into_iter().flatten().collect()))
            }
        }
    }

    /// Runs `runs` independent sessions derived from one seed.
    pub fn run_many(
        &self,
        holder_id: &str,
        seed: &[u8],
        runs: u64,
    ) -> Result<RunStatistics, ProtocolError> {
        let mut stats = RunStatistics::default();
        for run_index in 0..runs {
            let outcome = self.run(holder_id, seed, run_index)?;
            stats.record(&outcome);
        }
        Ok(stats)
    }
}

/// Man-in-the-middle on the Holder → Verifier wire.
struct TamperRelay {
    inbound: Link,
    outbound: Link,
    position: usize,
}

impl TamperRelay {
    fn run(self) -> Result<(), ProtocolError> {
        let mut payment: PaymentMessage = self.inbound.recv()?;
        payment.kappa = flip_digit(&payment.kappa, self.position);
        debug!("relay: flipped kappa[{}] -> {}", self.position, payment.kappa);
        self.outbound.send(&payment)
    }
}

fn flip_digit(kappa: &str, position: usize) -> String {
    kappa
        .chars()
        .enumerate()
        .map(|(j, digit)| match (j == position, digit) {
            (true, '0') => '1',
            (true, '1') => '0',
            (_, other) => other,
        })
        .collect()
}

fn join<T>(
    handle: ScopedJoinHandle<'_, Result<T, ProtocolError>>,
    role: &'static str,
) -> Result<T, ProtocolError> {
    handle
        .join()
        .map_err(|_| ProtocolError::RoleFailed { role })?
}

/// A hang-up is usually the echo of a failure elsewhere; prefer the failure.
fn root_cause(mut errors: Vec<ProtocolError>) -> ProtocolError {
    let position = errors
        .iter()
        .position(|err| !matches!(err, ProtocolError::ChannelClosed { .. }))
        .unwrap_or(0);
    if errors.is_empty() {
        return ProtocolError::RoleFailed { role: "session" };
    }
    errors.swap_remove(position)
}
