#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = comprobante::archive::unpack_first_xml(data);
});
