//! Response uncloaking.
//!
//! A permitted query can still resolve, through CNAME/SVCB/HTTPS
//! indirection or through the addresses it lands on, to something the
//! deny lists cover. The [`Uncloaker`] inspects an upstream reply once,
//! before it reaches the client, and decides whether to pass it, block it
//! or strip it.

use ahash::AHashSet;
use std::fmt;
use std::net::IpAddr;

use super::message::{Message, RData, Record, RecordType, ResponseCode, CLASS_INET};
use super::synth::Synthesizer;
use crate::config::BlockPolicy;
use crate::matcher::normalize_name;
use crate::FilterSet;

/// The answer record that caused a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedRecord {
    pub record_type: RecordType,
    /// Indirection target without the root dot, or the address
    pub target: String,
}

impl fmt::Display for BlockedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.record_type, self.target)
    }
}

/// What the inspection did to a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UncloakOutcome {
    /// Not inspected: the reply was not a success or the query name is allow-listed
    Passed(Message),
    /// Inspected, nothing blocked
    Forwarded(Message),
    /// Replaced by a synthesized block response
    Blocked { reply: Message, record: BlockedRecord },
    /// Offending answers removed; `reply` is SERVFAIL if none survived
    Stripped { reply: Message, removed: usize },
}

impl UncloakOutcome {
    /// Check if the client gets something other than the upstream reply.
    pub fn is_blocked(&self) -> bool {
        matches!(
            self,
            UncloakOutcome::Blocked { .. } | UncloakOutcome::Stripped { .. }
        )
    }

    /// The reply to deliver.
    pub fn into_message(self) -> Message {
        match self {
            UncloakOutcome::Passed(reply) | UncloakOutcome::Forwarded(reply) => reply,
            UncloakOutcome::Blocked { reply, .. } | UncloakOutcome::Stripped { reply, .. } => {
                reply
            }
        }
    }
}

/// Uncloaker checks a reply's answers against a [`FilterSet`].
///
/// Under [`BlockPolicy::Nxdomain`] and [`BlockPolicy::Sinkhole`] the first
/// blocked record replaces the whole reply with a synthesized response.
/// Under [`BlockPolicy::Strip`] only the blocked records are removed,
/// together with the records owned by a removed CNAME/SVCB/HTTPS target.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uncloaker {
    synth: Synthesizer,
}

impl Uncloaker {
    pub fn new(synth: Synthesizer) -> Self {
        Self { synth }
    }

    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synth
    }

    /// Inspect `reply`, the upstream answer to `query`.
    ///
    /// `query_name` is the normalized name the query was decided on.
    pub fn inspect(
        &self,
        set: &FilterSet,
        query: &Message,
        query_name: &str,
        reply: Message,
    ) -> UncloakOutcome {
        if reply.rcode != ResponseCode::NoError || set.is_allowed_name(query_name) {
            return UncloakOutcome::Passed(reply);
        }

        if self.synth.policy() == BlockPolicy::Strip {
            let mut reply = reply;
            let mut marks = strip_marks(set, &reply.answers).into_iter();
            let removed = self
                .synth
                .strip(&mut reply, |_| marks.next().unwrap_or(false));
            return if removed == 0 {
                UncloakOutcome::Forwarded(reply)
            } else {
                UncloakOutcome::Stripped { reply, removed }
            };
        }

        match reply.answers.iter().find_map(|r| blocked_record(set, r)) {
            Some(record) => UncloakOutcome::Blocked {
                reply: self.synth.block(query),
                record,
            },
            None => UncloakOutcome::Forwarded(reply),
        }
    }
}

/// Mark the answers to strip, in answer order.
///
/// A record is stripped when it is blocked itself, or when its owner is
/// the target of a stripped indirection record. The second rule is applied
/// until nothing changes, so whole CNAME chains below a blocked target go.
fn strip_marks(set: &FilterSet, answers: &[Record]) -> Vec<bool> {
    let mut marks = vec![false; answers.len()];
    let mut blocked_owners: AHashSet<String> = AHashSet::new();

    loop {
        let mut changed = false;
        for (record, mark) in answers.iter().zip(marks.iter_mut()) {
            if *mark {
                continue;
            }
            let owner = normalize_name(&record.name);
            if !blocked_owners.contains(owner.as_ref()) && blocked_record(set, record).is_none() {
                continue;
            }
            *mark = true;
            changed = true;
            if let Some(target) = indirection_target(record) {
                blocked_owners.insert(normalize_name(target).into_owned());
            }
        }
        if !changed {
            return marks;
        }
    }
}

fn indirection_target(record: &Record) -> Option<&str> {
    match &record.data {
        RData::Cname(target) | RData::Svcb { target, .. } | RData::Https { target, .. } => {
            Some(target.as_str())
        }
        _ => None,
    }
}

/// Decide one answer record. Only class IN records carrying a target name
/// or an address are examined.
fn blocked_record(set: &FilterSet, record: &Record) -> Option<BlockedRecord> {
    if record.class != CLASS_INET {
        return None;
    }
    match &record.data {
        RData::Cname(target)
        | RData::Svcb { target, .. }
        | RData::Https { target, .. } => {
            let target = target.strip_suffix('.').unwrap_or(target.as_str());
            if target.is_empty() || !set.decide(target).is_blocked() {
                return None;
            }
            Some(BlockedRecord {
                record_type: record.record_type(),
                target: target.to_string(),
            })
        }
        RData::A(ip) => blocked_address(set, record, IpAddr::V4(*ip)),
        RData::Aaaa(ip) => blocked_address(set, record, IpAddr::V6(*ip)),
        _ => None,
    }
}

fn blocked_address(set: &FilterSet, record: &Record, ip: IpAddr) -> Option<BlockedRecord> {
    if set.decide_address(ip).is_blocked() {
        Some(BlockedRecord {
            record_type: record.record_type(),
            target: ip.to_string(),
        })
    } else {
        None
    }
}
