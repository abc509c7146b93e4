#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = comprobante::transport::CdrResponse::from_xml(s);
        let _ = comprobante::transport::parse_send_bill_response(s);
    }
});
