//! DNS message handling: the message model, block response synthesis and
//! response uncloaking.

pub mod message;
pub mod synth;
pub mod uncloak;

pub use message::{Message, Question, RData, Record, RecordType, ResponseCode, Soa, CLASS_INET};
pub use synth::Synthesizer;
pub use uncloak::{BlockedRecord, UncloakOutcome, Uncloaker};
