#![no_main]

use libfuzzer_sys::fuzz_target;
use pong_net_client::protocol::{ClientMessage, FrameHeader, ServerMessage, HEADER_LEN};

fuzz_target!(|data: &[u8]| {
    // Walk the input as a stream of frames, the way the receive loop does.
    let mut rest = data;
    while let Ok(header) = FrameHeader::decode(rest) {
        let Some(body) = rest.get(HEADER_LEN..) else {
            break;
        };
        let len = (header.length as usize).min(body.len());
        let (payload, tail) = body.split_at(len);
        let _ = ServerMessage::decode(header.kind, payload);
        let _ = ClientMessage::decode(header.kind, payload);
        rest = tail;
    }
});
