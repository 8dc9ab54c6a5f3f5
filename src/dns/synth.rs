//! Block response synthesis.

use std::net::{Ipv4Addr, Ipv6Addr};

use super::message::{Message, RData, Record, RecordType, ResponseCode, Soa};
use crate::config::{BlockPolicy, DEFAULT_BLOCK_TTL};

/// Serial of the synthetic SOA. Only negative caching reads it.
pub const SOA_SERIAL: u32 = 100500;
pub const SOA_REFRESH: u32 = 1800;
pub const SOA_RETRY: u32 = 900;
pub const SOA_EXPIRE: u32 = 604800;
pub const SOA_MINIMUM: u32 = 86400;

/// TTL of the synthetic SOA record, independent of the block TTL.
pub const SOA_TTL: u32 = 120;

/// Primary name server of the synthetic SOA.
pub const SOA_MNAME: &str = "fake-for-negative-caching.";

/// Builds the replies sent in place of blocked answers.
///
/// Every method is a pure function of the query, the policy and the TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Synthesizer {
    policy: BlockPolicy,
    ttl: u32,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new(BlockPolicy::default(), DEFAULT_BLOCK_TTL)
    }
}

impl Synthesizer {
    pub fn new(policy: BlockPolicy, ttl: u32) -> Self {
        Self { policy, ttl }
    }

    pub fn policy(&self) -> BlockPolicy {
        self.policy
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// The reply for a blocked query under the configured policy.
    ///
    /// [`BlockPolicy::Strip`] has nothing to strip from a query, so it
    /// answers NXDOMAIN.
    pub fn block(&self, query: &Message) -> Message {
        match self.policy {
            BlockPolicy::Sinkhole => self.sinkhole(query),
            BlockPolicy::Nxdomain | BlockPolicy::Strip => self.nxdomain(query),
        }
    }

    /// Authoritative NXDOMAIN with a synthetic SOA in the authority section.
    pub fn nxdomain(&self, query: &Message) -> Message {
        let mut reply = Message::reply_to(query, ResponseCode::NxDomain);
        reply.authoritative = true;
        reply.recursion_available = true;

        let zone = query.question().map(|q| q.name.as_str()).unwrap_or(".");
        reply.authority.push(self.soa(zone));
        reply
    }

    /// All-zeros address answer for A and AAAA, NXDOMAIN otherwise.
    pub fn sinkhole(&self, query: &Message) -> Message {
        let Some(question) = query.question() else {
            return self.nxdomain(query);
        };
        let data = match question.qtype {
            RecordType::A => RData::A(Ipv4Addr::UNSPECIFIED),
            RecordType::Aaaa => RData::Aaaa(Ipv6Addr::UNSPECIFIED),
            _ => return self.nxdomain(query),
        };

        let mut reply = Message::reply_to(query, ResponseCode::NoError);
        reply.authoritative = true;
        reply.recursion_available = true;
        reply
            .answers
            .push(Record::new(question.name.clone(), self.ttl, data));
        reply
    }

    /// Remove the answers `blocked` selects and return how many went.
    ///
    /// A reply that had answers and is left with none is turned into
    /// SERVFAIL, so clients retry instead of caching an empty success.
    pub fn strip<F>(&self, reply: &mut Message, mut blocked: F) -> usize
    where
        F: FnMut(&Record) -> bool,
    {
        let before = reply.answers.len();
        reply.answers.retain(|record| !blocked(record));
        let removed = before - reply.answers.len();

        if before > 0 && reply.answers.is_empty() {
            reply.rcode = ResponseCode::ServFail;
        }
        removed
    }

    fn soa(&self, zone: &str) -> Record {
        let rname = if zone == "." || zone.is_empty() {
            "hostmaster.".to_string()
        } else {
            format!("hostmaster.{}", zone)
        };
        let soa = Soa {
            mname: SOA_MNAME.to_string(),
            rname,
            serial: SOA_SERIAL,
            refresh: SOA_REFRESH,
            retry: SOA_RETRY,
            expire: SOA_EXPIRE,
            minimum: SOA_MINIMUM,
        };
        Record::new(zone, SOA_TTL, RData::Soa(soa))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nxdomain_carries_soa() {
        let synth = Synthesizer::new(BlockPolicy::Nxdomain, 3600);
        let query = Message::query(7, "ads.example.com.", RecordType::A);
        let reply = synth.block(&query);

        assert_eq!(reply.id, 7);
        assert_eq!(reply.rcode, ResponseCode::NxDomain);
        assert!(reply.authoritative);
        assert!(reply.recursion_available);
        assert!(reply.answers.is_empty());
        assert_eq!(reply.authority.len(), 1);

        let soa = &reply.authority[0];
        assert_eq!(soa.name, "ads.example.com.");
        assert_eq!(soa.ttl, SOA_TTL);
        assert_eq!(soa.ttl, 120);
        match &soa.data {
            RData::Soa(soa) => {
                assert_eq!(soa.mname, SOA_MNAME);
                assert_eq!(soa.rname, "hostmaster.ads.example.com.");
                assert_eq!(soa.serial, 100500);
                assert_eq!(soa.refresh, 1800);
                assert_eq!(soa.retry, 900);
                assert_eq!(soa.expire, 604800);
                assert_eq!(soa.minimum, 86400);
            }
            other => panic!("expected SOA, got {:?}", other),
        }
    }

    #[test]
    fn test_sinkhole_addresses() {
        let synth = Synthesizer::new(BlockPolicy::Sinkhole, 120);

        let reply = synth.block(&Message::query(1, "ads.example.com.", RecordType::A));
        assert_eq!(reply.rcode, ResponseCode::NoError);
        assert_eq!(
            reply.answers,
            vec![Record::new("ads.example.com.", 120, RData::A(Ipv4Addr::UNSPECIFIED))]
        );

        let reply = synth.block(&Message::query(2, "ads.example.com.", RecordType::Aaaa));
        assert_eq!(reply.answers[0].data, RData::Aaaa(Ipv6Addr::UNSPECIFIED));
        assert_eq!(reply.answers[0].ttl, 120);
    }

    #[test]
    fn test_sinkhole_falls_back_to_nxdomain() {
        let synth = Synthesizer::new(BlockPolicy::Sinkhole, 3600);

        let reply = synth.block(&Message::query(1, "ads.example.com.", RecordType::Other(16)));
        assert_eq!(reply.rcode, ResponseCode::NxDomain);
        assert!(reply.answers.is_empty());
        assert_eq!(reply.authority[0].record_type(), RecordType::Soa);

        let reply = synth.block(&Message::query(1, "ads.example.com.", RecordType::Cname));
        assert_eq!(reply.rcode, ResponseCode::NxDomain);
    }

    #[test]
    fn test_strip_policy_blocks_with_nxdomain() {
        let synth = Synthesizer::new(BlockPolicy::Strip, 3600);
        let reply = synth.block(&Message::query(1, "ads.example.com.", RecordType::A));
        assert_eq!(reply.rcode, ResponseCode::NxDomain);
    }

    #[test]
    fn test_root_zone_rname() {
        let synth = Synthesizer::default();
        let reply = synth.nxdomain(&Message::default());
        match &reply.authority[0].data {
            RData::Soa(soa) => assert_eq!(soa.rname, "hostmaster."),
            other => panic!("expected SOA, got {:?}", other),
        }
    }

    #[test]
    fn test_strip_to_empty_is_servfail() {
        let synth = Synthesizer::new(BlockPolicy::Strip, 3600);
        let query = Message::query(3, "cdn.example.com.", RecordType::A);
        let mut reply = Message::reply_to(&query, ResponseCode::NoError);
        reply
            .answers
            .push(Record::new("cdn.example.com.", 60, RData::A(Ipv4Addr::new(10, 0, 0, 1))));

        let removed = synth.strip(&mut reply, |_| true);
        assert_eq!(removed, 1);
        assert!(reply.answers.is_empty());
        assert_eq!(reply.rcode, ResponseCode::ServFail);
    }

    #[test]
    fn test_strip_keeps_survivors() {
        let synth = Synthesizer::new(BlockPolicy::Strip, 3600);
        let query = Message::query(3, "cdn.example.com.", RecordType::A);
        let mut reply = Message::reply_to(&query, ResponseCode::NoError);
        reply
            .answers
            .push(Record::new("cdn.example.com.", 60, RData::A(Ipv4Addr::new(10, 0, 0, 1))));
        reply
            .answers
            .push(Record::new("cdn.example.com.", 60, RData::A(Ipv4Addr::new(192, 0, 2, 1))));

        let removed = synth.strip(&mut reply, |r| r.data == RData::A(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(removed, 1);
        assert_eq!(reply.answers.len(), 1);
        assert_eq!(reply.rcode, ResponseCode::NoError);

        // Nothing to strip from an empty answer section
        let mut empty = Message::reply_to(&query, ResponseCode::NoError);
        assert_eq!(synth.strip(&mut empty, |_| true), 0);
        assert_eq!(empty.rcode, ResponseCode::NoError);
    }
}
