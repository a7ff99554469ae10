#![no_main]

use libfuzzer_sys::fuzz_target;
use tddlive_syntax::{diagnostics, lexer, parser};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    match lexer::lex(source) {
        Ok(tokens) => {
            if let Err(errors) = parser::parse(&tokens) {
                // Rendering must never panic on any span the parser produced.
                for error in &errors {
                    let _ = diagnostics::format_error("fuzz.tdl", source, error);
                }
            }
        }
        Err(errors) => {
            for error in &errors {
                let _ = diagnostics::format_error("fuzz.tdl", source, error);
            }
        }
    }
});
