#![no_main]
use elementfinder::encoding::safe_encode;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let once = safe_encode(s);
        assert_eq!(safe_encode(&once), once);
    }
});
