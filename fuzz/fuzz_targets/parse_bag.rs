#![no_main]

use libfuzzer_sys::fuzz_target;
use time::OffsetDateTime;
use trustprobe_lib::{build_chain, evaluate_chain, parse_certificates, AnchorStore};

fuzz_target!(|data: &[u8]| {
    // Parsing and chain reconstruction must never panic, regardless of input.
    if let Ok(bag) = parse_certificates(data) {
        let mut anchors = AnchorStore::new();
        for (i, cert) in bag.iter().enumerate() {
            let _ = cert.subject();
            let _ = cert.serial_hex();
            let _ = cert.fingerprint_sha256();
            let _ = cert.chain_link();
            if i % 2 == 1 {
                anchors.add_trusted(format!("anchor-{}", i), cert.clone());
            }
        }
        let now = OffsetDateTime::now_utc();
        for leaf in &bag {
            let chain = build_chain(leaf, &bag);
            assert!(chain.len() <= bag.len());
            let _ = evaluate_chain(&chain, &anchors, now);
        }
    }
});
