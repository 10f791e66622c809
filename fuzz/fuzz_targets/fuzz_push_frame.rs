#![no_main]

use libfuzzer_sys::fuzz_target;
use live_match_client::framing::{self, Frame};
use live_match_client::protocol::ServerMessage;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Packet framing first, then the event payload for whatever decodes.
    if let Ok(Frame::Event { name, payload }) = framing::decode(text) {
        if let Ok(message) = ServerMessage::from_event(&name, payload) {
            let _ = message.match_id();
            let _ = message.to_frame();
        }
    }
});
