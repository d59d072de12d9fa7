#![no_main]
use elementfinder::ElementFinder;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Loading never panics, and neither does reading the result back.
    if let Ok(finder) = ElementFinder::from_bytes(data, Default::default()) {
        let _ = finder.content(".");
        let _ = finder.object("//*[1]");
        let _ = finder.remove("//p");
    }
});
