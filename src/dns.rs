use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::{Name, RecordType};
use tokio::net::UdpSocket;

/// DNS response information extracted from a parsed message
#[derive(Debug)]
pub struct DnsResponse {
	pub rcode: ResponseCode,
}

/// Build a recursive A query for `host`.
///
/// Returns the serialized query bytes ready to send over UDP.
pub fn build_query(host: &str, txid: u16) -> Result<Vec<u8>> {
	let name = Name::from_ascii(host)
		.map_err(|e| anyhow!("invalid domain name '{}': {}", host, e))?;

	let mut message = Message::new();
	message.set_id(txid);
	message.set_recursion_desired(true);
	message.add_query(Query::query(name, RecordType::A));

	let bytes = message.to_vec()
		.map_err(|e| anyhow!("failed to serialize DNS query: {}", e))?;
	Ok(bytes)
}

/// Parse a DNS response, validating the transaction ID and extracting the rcode.
///
/// Returns an error if the response cannot be parsed or the txid does not match.
pub fn parse_response(bytes: &[u8], expected_txid: u16) -> Result<DnsResponse> {
	let message = Message::from_vec(bytes)
		.map_err(|e| anyhow!("failed to parse DNS response: {}", e))?;

	if message.id() != expected_txid {
		return Err(anyhow!(
			"txid mismatch: expected {}, got {}",
			expected_txid, message.id()
		));
	}

	if message.message_type() != MessageType::Response {
		return Err(anyhow!("received a query instead of a response"));
	}

	Ok(DnsResponse {
		rcode: message.response_code(),
	})
}

/// Ask `server` for the A record of `host` over UDP and time the answer.
///
/// Uses a dedicated socket per query so concurrent queries to the same
/// server never read each other's responses. Returns the round-trip time
/// of a NoError answer, or None on timeout, socket failure or an error rcode.
pub async fn timed_query(server: SocketAddr, host: &str, timeout: Duration) -> Option<Duration> {
	let txid: u16 = rand::random();
	let query_bytes = build_query(host, txid).ok()?;

	let bind_addr = if server.is_ipv4() {
		"0.0.0.0:0"
	} else {
		"[::]:0"
	};
	let socket = UdpSocket::bind(bind_addr).await.ok()?;

	let start = Instant::now();
	socket.send_to(&query_bytes, server).await.ok()?;

	// Retry recv on txid mismatch; 4096 bytes covers EDNS-sized answers
	let mut buf = vec![0u8; 4096];
	let max_retries = 3;
	for _ in 0..max_retries {
		let elapsed = start.elapsed();
		if elapsed >= timeout {
			break;
		}
		let remaining = timeout - elapsed;

		match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
			Ok(Ok((len, _src))) => {
				let latency = start.elapsed();
				match parse_response(&buf[..len], txid) {
					Ok(response) if response.rcode == ResponseCode::NoError => return Some(latency),
					Ok(_) => return None,
					Err(_) => continue,
				}
			}
			_ => break,
		}
	}
	None
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_build_a_query() {
		let bytes = build_query("example.com", 1234).unwrap();
		// DNS header is 12 bytes minimum
		assert!(bytes.len() >= 12);
		// txid in first two bytes (big-endian)
		assert_eq!(bytes[0], (1234 >> 8) as u8);
		assert_eq!(bytes[1], (1234 & 0xff) as u8);
		let message = Message::from_vec(&bytes).unwrap();
		assert!(message.recursion_desired());
		assert_eq!(message.queries()[0].query_type(), RecordType::A);
	}

	#[test]
	fn test_parse_valid_response() {
		let query_bytes = build_query("example.com", 9999).unwrap();
		let mut response = Message::from_vec(&query_bytes).unwrap();
		response.set_message_type(MessageType::Response);
		let response_bytes = response.to_vec().unwrap();

		let parsed = parse_response(&response_bytes, 9999).unwrap();
		assert_eq!(parsed.rcode, ResponseCode::NoError);
	}

	#[test]
	fn test_txid_mismatch() {
		let query_bytes = build_query("example.com", 1111).unwrap();
		let mut response = Message::from_vec(&query_bytes).unwrap();
		response.set_message_type(MessageType::Response);
		let response_bytes = response.to_vec().unwrap();

		let result = parse_response(&response_bytes, 2222);
		assert!(result.unwrap_err().to_string().contains("txid mismatch"));
	}

	#[test]
	fn test_query_is_not_a_response() {
		let query_bytes = build_query("example.com", 42).unwrap();
		assert!(parse_response(&query_bytes, 42).is_err());
	}

	#[test]
	fn test_truncated_buffer() {
		let bytes = vec![0u8; 5];
		assert!(parse_response(&bytes, 0).is_err());
	}

	#[tokio::test]
	async fn test_timed_query_against_local_responder() {
		let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
		let server_addr = server.local_addr().unwrap();
		tokio::spawn(async move {
			let mut buf = vec![0u8; 512];
			let (len, peer) = server.recv_from(&mut buf).await.unwrap();
			let mut reply = Message::from_vec(&buf[..len]).unwrap();
			reply.set_message_type(MessageType::Response);
			server.send_to(&reply.to_vec().unwrap(), peer).await.unwrap();
		});

		let latency = timed_query(server_addr, "example.com", Duration::from_secs(2)).await;
		assert!(latency.is_some());
	}

	#[tokio::test]
	async fn test_timed_query_times_out() {
		// bound but never answers
		let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
		let addr = silent.local_addr().unwrap();
		let latency = timed_query(addr, "example.com", Duration::from_millis(50)).await;
		assert!(latency.is_none());
	}
}
