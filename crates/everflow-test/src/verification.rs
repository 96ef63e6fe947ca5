//! Assertions on frames received by the [`Dataplane`].

use sonic_everflow_common::{EverflowResult, VerificationError};
use sonic_everflow_packet::{summarize, FieldPath, Frame, Mask, OUTER_HEADER_SIZE};
use sonic_everflow_types::{MacAddress, Stage};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::dataplane::Dataplane;

/// Waits for a frame matching `expected` on any of `ports`.
///
/// Frames that do not match are skipped. Returns the port and the frame.
pub async fn verify_packet_any_port(
    dataplane: &dyn Dataplane,
    expected: &Mask,
    ports: &[u32],
    timeout: Duration,
) -> EverflowResult<(u32, Vec<u8>)> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match dataplane.poll(ports, remaining).await? {
            Some((port, frame)) if expected.matches(&frame) => {
                info!(port, packet = %summarize(&frame), "Received packet");
                return Ok((port, frame));
            }
            Some((port, frame)) => {
                debug!(port, packet = %summarize(&frame), "Skipping non-matching packet");
            }
            None => break,
        }
        if remaining.is_zero() {
            break;
        }
    }

    Err(VerificationError::PacketNotReceived {
        ports: ports.to_vec(),
        expected: summarize(expected.template()),
    }
    .into())
}

/// Fails if a frame matching `expected` arrives on any of `ports` within
/// `timeout`.
pub async fn verify_no_packet_any(
    dataplane: &dyn Dataplane,
    expected: &Mask,
    ports: &[u32],
    timeout: Duration,
) -> EverflowResult<()> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match dataplane.poll(ports, remaining).await? {
            Some((port, frame)) if expected.matches(&frame) => {
                return Err(VerificationError::UnexpectedPacket {
                    port,
                    summary: summarize(&frame),
                }
                .into());
            }
            Some(_) => {}
            None => return Ok(()),
        }
        if remaining.is_zero() {
            return Ok(());
        }
    }
}

/// The mirrored frame carried at the end of `received`.
pub fn extract_mirror_payload(received: &[u8], payload_len: usize) -> Result<&[u8], VerificationError> {
    let min = OUTER_HEADER_SIZE.max(payload_len);
    if received.len() < min {
        return Err(VerificationError::TruncatedFrame {
            len: received.len(),
            min,
        });
    }
    Ok(&received[received.len() - payload_len..])
}

/// Compares a mirrored frame with the candidate that was sent.
///
/// Egress mirroring copies the frame after routing, so the candidate is
/// routed through `router_mac` first and the fields the next hop decides are
/// not compared.
pub fn verify_mirror_payload(
    candidate: &Frame,
    inner: &[u8],
    mirror_type: Stage,
    router_mac: MacAddress,
) -> EverflowResult<()> {
    let mut expected = candidate.clone();
    let mut ignored: &[FieldPath] = &[];
    if mirror_type == Stage::Egress {
        expected.route_through(router_mac);
        ignored = &[FieldPath::EthDst, FieldPath::IpChksum];
    }
    info!(packet = %expected.summary(), "Expected inner packet");

    let summary = expected.summary();
    let mut mask = Mask::new(expected.into_bytes());
    for field in ignored {
        mask.ignore_field(*field)?;
    }

    if mask.matches(inner) && inner.len() == mask.template().len() {
        Ok(())
    } else {
        Err(VerificationError::PayloadMismatch {
            expected: summary,
            received: summarize(inner),
        }
        .into())
    }
}
