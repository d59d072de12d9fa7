#![no_main]
use elementfinder::ElementFinder;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(expr) = std::str::from_utf8(data) {
        if let Ok(finder) =
            ElementFinder::new("<div><p class=\"a\">one</p><p>two <b>2</b></p></div>")
        {
            // Any expression either matches something or is an error.
            let _ = finder.value(expr);
        }
    }
});
