//! Fuzz target for `ServerEvent::decode` and `ClientCommand::decode`
//!
//! Inbound bytes come from the network and are untrusted. This fuzzer feeds
//! arbitrary byte sequences to both decoders to find:
//! - Parser crashes or panics
//! - Unbounded allocation on oversized input
//! - Values that decode but fail to re-encode
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use murmur_proto::{ClientCommand, ServerEvent, MAX_EVENT_SIZE};

fuzz_target!(|data: &[u8]| {
    if let Ok(event) = ServerEvent::decode(data) {
        assert!(data.len() <= MAX_EVENT_SIZE);
        let bytes = event.encode().expect("decoded event re-encodes");
        assert_eq!(ServerEvent::decode(&bytes).expect("re-encoded event decodes"), event);
    }

    if let Ok(command) = ClientCommand::decode(data) {
        let bytes = command.encode().expect("decoded command re-encodes");
        assert_eq!(ClientCommand::decode(&bytes).expect("re-encoded command decodes"), command);
    }
});
