//! DNS message construction and answer extraction
//!
//! Queries are standard recursive `A` lookups with a random 16-bit id.
//! Replies are decoded with `hickory-proto` and reduced to a single
//! [`AddressObservation`].

use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use spectrum_ddns_core::config::AnswerSelection;
use spectrum_ddns_core::{AddressObservation, Error, Result};
use std::net::IpAddr;
use std::str::FromStr;
use tracing::debug;

/// Append the root label if `hostname` lacks it
pub fn fully_qualified(hostname: &str) -> String {
    if hostname.ends_with('.') {
        hostname.to_string()
    } else {
        format!("{}.", hostname)
    }
}

/// Build an `A` query for `hostname` in wire format
///
/// # Returns
///
/// The message id together with the encoded query
pub fn build_query(hostname: &str) -> Result<(u16, Vec<u8>)> {
    let name = Name::from_str(&fully_qualified(hostname))
        .map_err(|e| Error::lookup_failed(hostname, format!("invalid hostname: {}", e)))?;

    let mut query = Query::new();
    query.set_name(name);
    query.set_query_type(RecordType::A);
    query.set_query_class(DNSClass::IN);

    let id = fastrand::u16(..);
    let mut message = Message::new(id, MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(query);

    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message
        .emit(&mut encoder)
        .map_err(|e| Error::lookup_failed(hostname, format!("failed to encode query: {}", e)))?;

    Ok((id, buf))
}

/// Message id of a raw reply, if it is long enough to carry one
pub fn reply_id(bytes: &[u8]) -> Option<u16> {
    match bytes {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

/// Decode a raw reply
pub fn parse_reply(hostname: &str, bytes: &[u8]) -> Result<Message> {
    Message::from_vec(bytes)
        .map_err(|e| Error::lookup_failed(hostname, format!("failed to decode reply: {}", e)))
}

/// Pick the address and TTL out of a decoded reply
///
/// A non-success response code is a lookup failure. A reply that carries no
/// `A` record at all (empty, or only CNAMEs and the like) has no records.
pub fn extract_answer(
    hostname: &str,
    message: &Message,
    selection: AnswerSelection,
) -> Result<AddressObservation> {
    let rcode = message.response_code();
    if rcode != ResponseCode::NoError {
        return Err(Error::lookup_failed(
            hostname,
            format!("server responded with {:?}", rcode),
        ));
    }

    let answers = message.answers();
    if answers.is_empty() {
        return Err(Error::no_records(hostname));
    }

    let mut addresses = answers.iter().filter_map(|record| match record.data() {
        RData::A(a) => Some(AddressObservation::new(IpAddr::V4(a.0), record.ttl())),
        _ => None,
    });

    let picked = match selection {
        AnswerSelection::Last => addresses.last(),
        AnswerSelection::First => addresses.next(),
    };

    match picked {
        Some(observation) => {
            debug!(
                hostname,
                answers = answers.len(),
                ip = %observation.ip,
                ttl = observation.ttl,
                "Picked A record"
            );
            Ok(observation)
        }
        None => {
            debug!(hostname, answers = answers.len(), "Reply carried no A record");
            Err(Error::no_records(hostname))
        }
    }
}
