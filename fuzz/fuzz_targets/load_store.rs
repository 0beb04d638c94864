#![no_main]

use libfuzzer_sys::fuzz_target;
use trustprobe_lib::store::jks;

fuzz_target!(|data: &[u8]| {
    // Container decoding must never panic.
    let _ = trustprobe_lib::load(data, "changeit");
    let _ = trustprobe_lib::extract_single_file(data);

    // Whatever JKS decodes must survive a re-encode with the same password.
    if let Ok(store) = jks::decode(data, "changeit") {
        let bytes = jks::encode(&store, "changeit");
        assert!(bytes.is_ok_and(|b| jks::decode(&b, "changeit").is_ok()));
    }
});
