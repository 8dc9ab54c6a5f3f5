//! In-memory DNS message model.
//!
//! Wire parsing and serialization belong to the host. The host decodes a
//! message once into these types; the filter only ever reads and rebuilds
//! them.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// DNS class IN.
pub const CLASS_INET: u16 = 1;

/// Record types the filter distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Soa,
    Svcb,
    Https,
    Other(u16),
}

impl RecordType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            5 => RecordType::Cname,
            6 => RecordType::Soa,
            28 => RecordType::Aaaa,
            64 => RecordType::Svcb,
            65 => RecordType::Https,
            other => RecordType::Other(other),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::Cname => 5,
            RecordType::Soa => 6,
            RecordType::Aaaa => 28,
            RecordType::Svcb => 64,
            RecordType::Https => 65,
            RecordType::Other(other) => other,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::Aaaa => write!(f, "AAAA"),
            RecordType::Cname => write!(f, "CNAME"),
            RecordType::Soa => write!(f, "SOA"),
            RecordType::Svcb => write!(f, "SVCB"),
            RecordType::Https => write!(f, "HTTPS"),
            RecordType::Other(v) => write!(f, "TYPE{}", v),
        }
    }
}

/// Response codes used by the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResponseCode {
    #[default]
    NoError,
    FormErr,
    ServFail,
    NxDomain,
    NotImp,
    Refused,
    Other(u16),
}

impl ResponseCode {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => ResponseCode::NoError,
            1 => ResponseCode::FormErr,
            2 => ResponseCode::ServFail,
            3 => ResponseCode::NxDomain,
            4 => ResponseCode::NotImp,
            5 => ResponseCode::Refused,
            other => ResponseCode::Other(other),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            ResponseCode::NoError => 0,
            ResponseCode::FormErr => 1,
            ResponseCode::ServFail => 2,
            ResponseCode::NxDomain => 3,
            ResponseCode::NotImp => 4,
            ResponseCode::Refused => 5,
            ResponseCode::Other(other) => other,
        }
    }
}

/// SOA rdata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Soa {
    pub mname: String,
    pub rname: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

/// Record data, decoded only as far as filtering needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Cname(String),
    Svcb { priority: u16, target: String },
    Https { priority: u16, target: String },
    Soa(Soa),
    /// Anything else, kept opaque so it can be passed through unchanged
    Other { rtype: u16, data: Vec<u8> },
}

impl RData {
    pub fn record_type(&self) -> RecordType {
        match self {
            RData::A(_) => RecordType::A,
            RData::Aaaa(_) => RecordType::Aaaa,
            RData::Cname(_) => RecordType::Cname,
            RData::Svcb { .. } => RecordType::Svcb,
            RData::Https { .. } => RecordType::Https,
            RData::Soa(_) => RecordType::Soa,
            RData::Other { rtype, .. } => RecordType::from_u16(*rtype),
        }
    }
}

/// A resource record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub class: u16,
    pub ttl: u32,
    pub data: RData,
}

impl Record {
    /// A class IN record.
    pub fn new(name: impl Into<String>, ttl: u32, data: RData) -> Self {
        Self {
            name: name.into(),
            class: CLASS_INET,
            ttl,
            data,
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.data.record_type()
    }
}

/// A question entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: RecordType,
    pub qclass: u16,
}

impl Question {
    /// A class IN question.
    pub fn new(name: impl Into<String>, qtype: RecordType) -> Self {
        Self {
            name: name.into(),
            qtype,
            qclass: CLASS_INET,
        }
    }
}

/// A DNS message: header fields plus the four sections.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub id: u16,
    pub response: bool,
    pub opcode: u8,
    pub authoritative: bool,
    pub truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub rcode: ResponseCode,
    pub questions: Vec<Question>,
    pub answers: Vec<Record>,
    pub authority: Vec<Record>,
    pub additional: Vec<Record>,
}

impl Message {
    /// A recursive query with one question.
    pub fn query(id: u16, name: impl Into<String>, qtype: RecordType) -> Self {
        Self {
            id,
            recursion_desired: true,
            questions: vec![Question::new(name, qtype)],
            ..Self::default()
        }
    }

    /// An empty reply to `query`: same id, opcode, RD flag and question.
    pub fn reply_to(query: &Message, rcode: ResponseCode) -> Self {
        Self {
            id: query.id,
            response: true,
            opcode: query.opcode,
            recursion_desired: query.recursion_desired,
            rcode,
            questions: query.questions.clone(),
            ..Self::default()
        }
    }

    /// The first question, if any.
    pub fn question(&self) -> Option<&Question> {
        self.questions.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_codes() {
        assert_eq!(RecordType::from_u16(65), RecordType::Https);
        assert_eq!(RecordType::Svcb.as_u16(), 64);
        assert_eq!(RecordType::from_u16(16), RecordType::Other(16));
        assert_eq!(RecordType::Aaaa.to_string(), "AAAA");
        assert_eq!(RecordType::Other(16).to_string(), "TYPE16");
    }

    #[test]
    fn test_reply_to_copies_header() {
        let query = Message::query(0x1234, "example.com.", RecordType::A);
        let reply = Message::reply_to(&query, ResponseCode::NxDomain);

        assert_eq!(reply.id, 0x1234);
        assert!(reply.response);
        assert!(reply.recursion_desired);
        assert_eq!(reply.rcode, ResponseCode::NxDomain);
        assert_eq!(reply.questions, query.questions);
        assert!(reply.answers.is_empty());
    }

    #[test]
    fn test_other_rdata_type() {
        let rdata = RData::Other { rtype: 16, data: b"v=spf1".to_vec() };
        assert_eq!(rdata.record_type(), RecordType::Other(16));
    }
}
