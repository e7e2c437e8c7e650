#![no_main]

//! Fuzz target for provider callback parsing.
//!
//! Callback bodies come from the network before any tenant is known, so
//! parsing and identifier extraction must never panic.

use libfuzzer_sys::fuzz_target;
use paybroker_gateway::{webhook::extract_tenant_reference, WebhookPayload};

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = WebhookPayload::parse(data) else {
        assert!(extract_tenant_reference(data).is_err());
        return;
    };

    if let Ok(reference) = extract_tenant_reference(data) {
        let raw = payload.reference().expect("routable payload carries a reference");
        assert!(raw.ends_with(&reference.original));
    }
});
