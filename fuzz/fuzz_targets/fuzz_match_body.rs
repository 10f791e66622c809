#![no_main]

use libfuzzer_sys::fuzz_target;
use live_match_client::api::{decode_match, decode_match_list};
use live_match_client::ResponseEnvelope;

fuzz_target!(|data: &[u8]| {
    for envelope in [ResponseEnvelope::Bare, ResponseEnvelope::Wrapped] {
        let _ = decode_match_list(envelope, data);
        let _ = decode_match(envelope, data);
    }
});
