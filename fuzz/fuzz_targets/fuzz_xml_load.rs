#![no_main]
use elementfinder::{DocumentKind, ElementFinder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(finder) = ElementFinder::with_kind(s, DocumentKind::Xml) {
            let _ = finder.outer_content("/*");
            let _ = finder.object("/*/*");
        }
    }
});
