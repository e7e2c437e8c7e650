#![no_main]

//! Fuzz target for composite identifier handling.

use libfuzzer_sys::fuzz_target;
use paybroker_core::{
    reference::{embed, CompositeReference},
    TenantId,
};

fuzz_target!(|data: (i64, &str)| {
    let (tenant, original) = data;

    let composite = embed(TenantId(tenant), original);
    let parsed = CompositeReference::parse(&composite).expect("embedded reference parses");

    assert_eq!(parsed.tenant_id, TenantId(tenant));
    assert_eq!(parsed.original, original);

    let _ = CompositeReference::parse(original);
});
